use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{GenerationRequest, TargetAudience, Tone};
use crate::stream::StepEvent;

pub type EntryId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Bot,
    System,
}

/// Lifecycle of one generation turn. `Complete` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryPhase {
    Pending,
    Streaming,
    Complete,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentFormat {
    Text,
    Html,
    Markdown,
}

impl ContentFormat {
    pub fn detect(content: &str) -> Self {
        if content.trim_start().starts_with('<') {
            Self::Html
        } else {
            Self::Markdown
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptEntry {
    pub id: EntryId,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub phase: EntryPhase,
    pub format: ContentFormat,
    pub reasoning_trace: Vec<StepEvent>,
    pub original_topic: Option<String>,
    pub audience: Option<TargetAudience>,
    pub tone: Option<Tone>,
    pub section_count: Option<u8>,
    pub error_detail: Option<String>,
    #[serde(skip)]
    pub(crate) request: Option<GenerationRequest>,
}

impl TranscriptEntry {
    pub(crate) fn message(id: EntryId, role: Role, content: String) -> Self {
        Self {
            id,
            role,
            content,
            timestamp: Utc::now(),
            phase: EntryPhase::Complete,
            format: ContentFormat::Text,
            reasoning_trace: Vec::new(),
            original_topic: None,
            audience: None,
            tone: None,
            section_count: None,
            error_detail: None,
            request: None,
        }
    }

    pub(crate) fn generation(id: EntryId, request: &GenerationRequest) -> Self {
        Self {
            phase: EntryPhase::Pending,
            request: Some(request.clone()),
            ..Self::message(id, Role::Bot, String::new())
        }
    }

    /// Pending counts as streaming: the turn is open until a terminal event arrives.
    pub fn is_streaming(&self) -> bool {
        matches!(self.phase, EntryPhase::Pending | EntryPhase::Streaming)
    }

    pub fn is_complete(&self) -> bool {
        self.phase == EntryPhase::Complete
    }

    pub fn is_error(&self) -> bool {
        self.phase == EntryPhase::Failed
    }

    pub fn is_sealed(&self) -> bool {
        !self.is_streaming()
    }

    /// True for a bot turn that finished with a generated document.
    pub fn has_document(&self) -> bool {
        self.role == Role::Bot && self.is_complete() && self.original_topic.is_some()
    }
}
