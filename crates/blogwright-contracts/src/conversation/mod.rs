//! Transcript of a generation session and the per-turn state machine.
//!
//! A generation turn starts `Pending`, moves to `Streaming` on its first event and is
//! sealed by a terminal event (`Complete` or `Failed`). A stream that ends without a
//! terminal event, or a transport failure, also seals the turn as `Failed`.

mod entry;

use crate::models::GenerationRequest;
use crate::stream::{StepEvent, StepStatus, StreamEvent};

pub use entry::{ContentFormat, EntryId, EntryPhase, Role, TranscriptEntry};

pub const FAILURE_MESSAGE: &str =
    "Sorry, something went wrong while generating your blog post. Please try again.";
pub const MISSING_TERMINAL_DETAIL: &str = "stream ended before a complete or error event";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversationError {
    #[error("transcript entry {0} does not exist")]
    UnknownEntry(EntryId),
    #[error("transcript entry {0} is sealed")]
    Sealed(EntryId),
    #[error("transcript entry {0} has no completed document")]
    NotComplete(EntryId),
}

/// What folding an event did to its entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Progress,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Default)]
pub struct Conversation {
    entries: Vec<TranscriptEntry>,
    next_id: EntryId,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn entry(&self, id: EntryId) -> Option<&TranscriptEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    /// The open generation turn, if any.
    pub fn in_flight(&self) -> Option<EntryId> {
        self.entries
            .iter()
            .rev()
            .find(|entry| entry.role == Role::Bot && entry.is_streaming())
            .map(|entry| entry.id)
    }

    pub fn latest_document(&self) -> Option<&TranscriptEntry> {
        self.entries.iter().rev().find(|entry| entry.has_document())
    }

    pub fn push_user(&mut self, text: &str) -> EntryId {
        self.push(Role::User, text.to_string())
    }

    pub fn push_system(&mut self, text: &str) -> EntryId {
        self.push(Role::System, text.to_string())
    }

    pub fn begin_generation(&mut self, request: &GenerationRequest) -> EntryId {
        let id = self.allocate_id();
        self.entries.push(TranscriptEntry::generation(id, request));
        id
    }

    pub fn apply(&mut self, id: EntryId, event: &StreamEvent) -> Result<Transition, ConversationError> {
        let entry = self.open_entry_mut(id)?;
        let transition = match event {
            StreamEvent::Connected { topic } => {
                entry.phase = EntryPhase::Streaming;
                entry.content = format!("Connected. Writing about \"{topic}\"...");
                Transition::Progress
            }
            StreamEvent::Step(step) => {
                entry.phase = EntryPhase::Streaming;
                entry.content = summarize_step(step);
                entry.reasoning_trace.push(step.clone());
                Transition::Progress
            }
            StreamEvent::StateUpdate { .. } => {
                entry.phase = EntryPhase::Streaming;
                Transition::Progress
            }
            StreamEvent::Complete { blog, is_complete } => {
                if !is_complete {
                    tracing::debug!(entry = id, "backend marked the document as partial");
                }
                entry.phase = EntryPhase::Complete;
                entry.format = ContentFormat::detect(blog);
                entry.content = blog.clone();
                if let Some(request) = entry.request.as_ref() {
                    entry.original_topic = Some(request.topic().to_string());
                    entry.audience = Some(request.target_audience());
                    entry.tone = Some(request.tone());
                    entry.section_count = Some(request.num_sections());
                }
                Transition::Completed
            }
            StreamEvent::Error { message } => {
                seal_failed(entry, message);
                Transition::Failed
            }
        };
        Ok(transition)
    }

    /// Seals an entry whose stream ended without a terminal event. Returns whether the
    /// entry was still open.
    pub fn end_of_stream(&mut self, id: EntryId) -> Result<bool, ConversationError> {
        self.fail_if_open(id, MISSING_TERMINAL_DETAIL)
    }

    pub fn fail_transport(&mut self, id: EntryId, detail: &str) -> Result<bool, ConversationError> {
        self.fail_if_open(id, detail)
    }

    /// Replaces a completed document, e.g. after an image was inserted.
    pub fn replace_document(&mut self, id: EntryId, html: String) -> Result<(), ConversationError> {
        let entry = self
            .entries
            .iter_mut()
            .find(|entry| entry.id == id)
            .ok_or(ConversationError::UnknownEntry(id))?;
        if !entry.has_document() {
            return Err(ConversationError::NotComplete(id));
        }
        entry.content = html;
        entry.format = ContentFormat::Html;
        Ok(())
    }

    fn fail_if_open(&mut self, id: EntryId, detail: &str) -> Result<bool, ConversationError> {
        match self.open_entry_mut(id) {
            Ok(entry) => {
                seal_failed(entry, detail);
                Ok(true)
            }
            Err(ConversationError::Sealed(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    fn open_entry_mut(&mut self, id: EntryId) -> Result<&mut TranscriptEntry, ConversationError> {
        let entry = self
            .entries
            .iter_mut()
            .find(|entry| entry.id == id)
            .ok_or(ConversationError::UnknownEntry(id))?;
        if entry.is_sealed() {
            return Err(ConversationError::Sealed(id));
        }
        Ok(entry)
    }

    fn push(&mut self, role: Role, content: String) -> EntryId {
        let id = self.allocate_id();
        self.entries.push(TranscriptEntry::message(id, role, content));
        id
    }

    fn allocate_id(&mut self) -> EntryId {
        self.next_id += 1;
        self.next_id
    }
}

fn seal_failed(entry: &mut TranscriptEntry, detail: &str) {
    entry.phase = EntryPhase::Failed;
    entry.format = ContentFormat::Text;
    entry.content = FAILURE_MESSAGE.to_string();
    entry.error_detail = Some(detail.to_string());
}

/// Progress line shown while a step is in flight.
pub fn summarize_step(step: &StepEvent) -> String {
    match step.status {
        StepStatus::Thinking => format!(
            "Thinking: {}\nPlanning: {} - {}",
            step.thought, step.action, step.action_input
        ),
        _ => format!(
            "Step {}: {} - {}",
            step.step, step.action, step.action_input
        ),
    }
}
