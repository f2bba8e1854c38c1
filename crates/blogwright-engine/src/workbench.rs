use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use blogwright_contracts::conversation::{
    Conversation, ConversationError, EntryId, TranscriptEntry, Transition,
};
use blogwright_contracts::document::{analyze_html, mutate, DropZone, ImageBlock, Mutation, Section};
use blogwright_contracts::images::{DragSlot, GeneratedImage, ImageGallery};
use blogwright_contracts::journal::SessionJournal;
use blogwright_contracts::markup::HeadingScope;
use blogwright_contracts::models::GenerationRequest;
use blogwright_contracts::session::SessionConfig;
use blogwright_contracts::stream::{DecodeSummary, StreamDecoder, StreamEvent};
use serde_json::{json, Map, Value};

use crate::api::{error_chain_text, ApiClient};
use crate::sourcing::{source_section_images, ImageSourcing, SectionBrief, SectionQuery};

/// Delay between a successful drop and its confirmation message.
pub const CONFIRMATION_DELAY: Duration = Duration::from_millis(1500);
pub const DEFAULT_SEARCH_LIMIT: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropOutcome {
    Inserted { entry_id: EntryId, zone: DropZone },
    /// The zone no longer exists in the document. Nothing changed.
    Stale,
}

/// How a batch of image requests went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageBatch {
    pub added: usize,
    pub failed_sections: usize,
}

#[derive(Debug)]
struct ActiveStream {
    entry_id: EntryId,
    decoder: StreamDecoder,
}

#[derive(Debug)]
struct PendingNotice {
    due: Instant,
    text: String,
}

/// Owns everything one generator screen works with: the transcript, the sections of the
/// latest document, the section selection, the image gallery and the drag slot.
///
/// All mutation goes through `&mut self`, so there is exactly one writer.
#[derive(Debug)]
pub struct Workbench {
    session: SessionConfig,
    journal: SessionJournal,
    scope: HeadingScope,
    conversation: Conversation,
    active: Option<ActiveStream>,
    sections: Vec<Section>,
    selected: BTreeSet<usize>,
    gallery: ImageGallery,
    drag: DragSlot,
    notices: Vec<PendingNotice>,
}

impl Workbench {
    /// The journal is best effort: a write that fails is logged and the workbench carries on.
    pub fn new(session: SessionConfig, journal: SessionJournal, scope: HeadingScope) -> Self {
        let bench = Self {
            session,
            journal,
            scope,
            conversation: Conversation::new(),
            active: None,
            sections: Vec::new(),
            selected: BTreeSet::new(),
            gallery: ImageGallery::new(),
            drag: DragSlot::default(),
            notices: Vec::new(),
        };
        bench.note(
            "session_started",
            json!({
                "heading_scope": bench.scope.to_string(),
                "screen": bench.session.initial_screen().as_str(),
            }),
        );
        bench
    }

    pub fn session(&self) -> &SessionConfig {
        &self.session
    }

    pub fn journal(&self) -> &SessionJournal {
        &self.journal
    }

    pub fn scope(&self) -> HeadingScope {
        self.scope
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn gallery(&self) -> &ImageGallery {
        &self.gallery
    }

    pub fn dragged_image(&self) -> Option<&str> {
        self.drag.current()
    }

    pub fn is_generating(&self) -> bool {
        self.conversation.in_flight().is_some()
    }

    pub fn latest_document(&self) -> Option<&TranscriptEntry> {
        self.conversation.latest_document()
    }

    /// Starts a generation turn. Only one may be in flight.
    pub fn submit(&mut self, request: &GenerationRequest) -> Result<EntryId> {
        if let Some(open) = self.conversation.in_flight() {
            bail!("a generation is already in progress (entry {open})");
        }
        let mut payload = serde_json::to_value(request)?;
        self.conversation.push_user(request.topic());
        let entry_id = self.conversation.begin_generation(request);
        self.active = Some(ActiveStream {
            entry_id,
            decoder: StreamDecoder::new(),
        });
        if let Value::Object(map) = &mut payload {
            map.insert("entry_id".to_string(), Value::from(entry_id));
        }
        self.note("generation_submitted", payload);
        Ok(entry_id)
    }

    /// Feeds raw response bytes for the open generation.
    pub fn ingest(&mut self, entry_id: EntryId, chunk: &[u8]) -> Result<()> {
        self.ingest_with(entry_id, chunk, &mut |_| {})
    }

    fn ingest_with(
        &mut self,
        entry_id: EntryId,
        chunk: &[u8],
        on_update: &mut dyn FnMut(&TranscriptEntry),
    ) -> Result<()> {
        let mut events = Vec::new();
        self.active_stream(entry_id)?
            .decoder
            .feed(chunk, |event| events.push(event));
        self.apply_events(entry_id, events, on_update);
        Ok(())
    }

    /// Closes the stream. A turn still open at this point failed.
    pub fn finish_stream(&mut self, entry_id: EntryId) -> Result<DecodeSummary> {
        self.finish_stream_with(entry_id, &mut |_| {})
    }

    fn finish_stream_with(
        &mut self,
        entry_id: EntryId,
        on_update: &mut dyn FnMut(&TranscriptEntry),
    ) -> Result<DecodeSummary> {
        let mut events = Vec::new();
        let summary = self
            .active_stream(entry_id)?
            .decoder
            .finish(|event| events.push(event));
        self.apply_events(entry_id, events, on_update);
        self.active = None;

        if self.conversation.end_of_stream(entry_id)? {
            tracing::warn!(entry = entry_id, "stream ended without a terminal event");
            self.note(
                "generation_failed",
                json!({
                    "entry_id": entry_id,
                    "reason": "missing_terminal_event",
                }),
            );
            if let Some(entry) = self.conversation.entry(entry_id) {
                on_update(entry);
            }
        }
        self.note(
            "stream_closed",
            json!({
                "entry_id": entry_id,
                "events": summary.events,
                "malformed": summary.malformed,
                "terminal_seen": summary.terminal_seen,
            }),
        );
        Ok(summary)
    }

    /// Seals the turn as failed after a transport error.
    pub fn fail_transport(&mut self, entry_id: EntryId, err: &anyhow::Error) -> Result<()> {
        let detail = error_chain_text(err, 512);
        if self
            .active
            .as_ref()
            .map(|active| active.entry_id == entry_id)
            .unwrap_or(false)
        {
            self.active = None;
        }
        if self.conversation.fail_transport(entry_id, &detail)? {
            tracing::warn!(entry = entry_id, error = %detail, "generation transport failed");
            self.note(
                "generation_failed",
                json!({
                    "entry_id": entry_id,
                    "reason": "transport",
                    "error": detail,
                }),
            );
        }
        Ok(())
    }

    /// Runs one generation end to end. Transport failures end up in the transcript; only a
    /// second submission is returned as an error.
    pub fn run_generation<F>(
        &mut self,
        api: &ApiClient,
        request: &GenerationRequest,
        mut on_update: F,
    ) -> Result<EntryId>
    where
        F: FnMut(&TranscriptEntry),
    {
        let entry_id = self.submit(request)?;
        let streamed = api.stream_blog(request, |chunk| {
            self.ingest_with(entry_id, chunk, &mut on_update)
        });
        match streamed {
            Ok(_) => {
                self.finish_stream_with(entry_id, &mut on_update)?;
            }
            Err(err) => {
                self.fail_transport(entry_id, &err)?;
                if let Some(entry) = self.conversation.entry(entry_id) {
                    on_update(entry);
                }
            }
        }
        Ok(entry_id)
    }

    pub fn toggle_section(&mut self, index: usize) -> Result<bool> {
        if index >= self.sections.len() {
            bail!(
                "section {index} does not exist ({} sections)",
                self.sections.len()
            );
        }
        if self.selected.remove(&index) {
            return Ok(false);
        }
        self.selected.insert(index);
        Ok(true)
    }

    pub fn select_all_sections(&mut self) {
        self.selected = (0..self.sections.len()).collect();
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
    }

    pub fn is_selected(&self, index: usize) -> bool {
        self.selected.contains(&index)
    }

    pub fn selected_sections(&self) -> Vec<&Section> {
        self.selected
            .iter()
            .filter_map(|index| self.sections.get(*index))
            .collect()
    }

    /// Contextual images for the selected sections, one section at a time.
    pub fn generate_section_images(&mut self, sourcing: &dyn ImageSourcing) -> Result<ImageBatch> {
        let topic = self.document_topic()?;
        let briefs: Vec<SectionBrief> = self
            .selected_sections()
            .into_iter()
            .map(|section| SectionBrief::from_section(&topic, section))
            .collect();
        if briefs.is_empty() {
            bail!("select at least one section first");
        }

        let report = source_section_images(sourcing, &briefs);
        let failed_sections = report.failures.len();
        self.note(
            "section_images",
            json!({
                "sourcing": sourcing.name(),
                "sections": briefs.len(),
                "images": report.images.len(),
                "failed_sections": report.failures.iter().map(|f| f.section_id.clone()).collect::<Vec<String>>(),
            }),
        );
        let images = report.into_result()?;
        Ok(ImageBatch {
            added: self.gallery.extend(images),
            failed_sections,
        })
    }

    pub fn search_images(
        &mut self,
        sourcing: &dyn ImageSourcing,
        query: &str,
        limit: usize,
    ) -> Result<usize> {
        let query = query.trim();
        if query.is_empty() {
            bail!("search query must not be empty");
        }
        let images = sourcing
            .search(query, limit)
            .with_context(|| format!("image search failed for `{query}`"))?;
        self.add_images("image_search", sourcing, images)
    }

    /// One batched search: a query per selected section, or per section when none is selected.
    pub fn search_images_for_sections(&mut self, sourcing: &dyn ImageSourcing) -> Result<usize> {
        let topic = self.document_topic()?;
        let sections: Vec<&Section> = if self.selected.is_empty() {
            self.sections.iter().collect()
        } else {
            self.selected_sections()
        };
        let queries: Vec<SectionQuery> = sections
            .into_iter()
            .map(|section| SectionQuery::from_section(&topic, section))
            .collect();
        if queries.is_empty() {
            bail!("the current document has no sections");
        }
        let images = sourcing
            .search_sections(&queries)
            .context("section image search failed")?;
        self.add_images("section_image_search", sourcing, images)
    }

    pub fn begin_drag(&mut self, image_id: &str) -> Result<()> {
        if self.gallery.get(image_id).is_none() {
            bail!("image {image_id} is not in the gallery");
        }
        self.drag.begin(image_id);
        Ok(())
    }

    pub fn end_drag(&mut self) {
        self.drag.end();
    }

    /// Inserts the dragged image into the latest document.
    pub fn drop_on(&mut self, zone: DropZone, now: Instant) -> Result<DropOutcome> {
        let Some(image_id) = self.drag.current().map(str::to_string) else {
            bail!("no image is being dragged");
        };
        let image = self
            .gallery
            .get(&image_id)
            .cloned()
            .with_context(|| format!("dragged image {image_id} is not in the gallery"))?;
        let (entry_id, html) = match self.conversation.latest_document() {
            Some(entry) => (entry.id, entry.content.clone()),
            None => bail!("there is no completed document to insert into"),
        };

        let block = image_block(&image);
        let updated = match mutate(&html, &block, zone, self.scope) {
            Mutation::Applied(updated) => updated,
            Mutation::Stale => {
                tracing::debug!(%zone, image = %image_id, "ignoring drop on a stale zone");
                return Ok(DropOutcome::Stale);
            }
        };

        self.conversation.replace_document(entry_id, updated)?;
        self.refresh_sections(false);
        self.drag.end();
        self.notices.push(PendingNotice {
            due: now + CONFIRMATION_DELAY,
            text: format!("Image \"{}\" inserted at {zone}.", display_name(&image)),
        });
        self.note(
            "image_inserted",
            json!({
                "entry_id": entry_id,
                "image_id": image_id,
                "zone": zone.to_string(),
            }),
        );
        Ok(DropOutcome::Inserted { entry_id, zone })
    }

    /// Posts every confirmation that is due as a system entry.
    pub fn flush_notices(&mut self, now: Instant) -> Vec<EntryId> {
        let (due, pending): (Vec<PendingNotice>, Vec<PendingNotice>) = std::mem::take(&mut self.notices)
            .into_iter()
            .partition(|notice| notice.due <= now);
        self.notices = pending;
        due.into_iter()
            .map(|notice| self.conversation.push_system(&notice.text))
            .collect()
    }

    pub fn next_notice_due(&self) -> Option<Instant> {
        self.notices.iter().map(|notice| notice.due).min()
    }

    fn apply_events(
        &mut self,
        entry_id: EntryId,
        events: Vec<StreamEvent>,
        on_update: &mut dyn FnMut(&TranscriptEntry),
    ) {
        for event in events {
            if let Err(err) = self.journal.record_stream_event(entry_id, &event) {
                tracing::warn!(entry = entry_id, kind = event.kind(), error = %err, "journal write failed");
            }
            match self.conversation.apply(entry_id, &event) {
                Ok(Transition::Completed) => {
                    self.refresh_sections(true);
                    tracing::info!(
                        entry = entry_id,
                        sections = self.sections.len(),
                        "generation complete"
                    );
                }
                Ok(Transition::Failed) => {
                    tracing::warn!(entry = entry_id, "generation failed");
                }
                Ok(Transition::Progress) => {}
                Err(ConversationError::Sealed(_)) => {
                    tracing::debug!(entry = entry_id, kind = event.kind(), "ignoring event after terminal event");
                    continue;
                }
                Err(err) => {
                    tracing::warn!(entry = entry_id, kind = event.kind(), error = %err, "dropping stream event");
                    continue;
                }
            }
            if let Some(entry) = self.conversation.entry(entry_id) {
                on_update(entry);
            }
        }
    }

    fn note(&self, kind: &str, payload: Value) {
        let payload = match payload {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        if let Err(err) = self.journal.record(kind, payload) {
            tracing::warn!(kind, error = %err, "journal write failed");
        }
    }

    fn active_stream(&mut self, entry_id: EntryId) -> Result<&mut ActiveStream> {
        match self.active.as_mut() {
            Some(active) if active.entry_id == entry_id => Ok(active),
            _ => bail!("entry {entry_id} has no open stream"),
        }
    }

    fn refresh_sections(&mut self, reset_selection: bool) {
        self.sections = self
            .conversation
            .latest_document()
            .map(|entry| analyze_html(&entry.content, self.scope))
            .unwrap_or_default();
        if reset_selection {
            self.selected.clear();
        } else {
            let count = self.sections.len();
            self.selected.retain(|index| *index < count);
        }
    }

    fn document_topic(&self) -> Result<String> {
        self.conversation
            .latest_document()
            .and_then(|entry| entry.original_topic.clone())
            .context("there is no completed document yet")
    }

    fn add_images(
        &mut self,
        kind: &str,
        sourcing: &dyn ImageSourcing,
        images: Vec<GeneratedImage>,
    ) -> Result<usize> {
        let received = images.len();
        let added = self.gallery.extend(images);
        self.note(
            kind,
            json!({
                "sourcing": sourcing.name(),
                "received": received,
                "added": added,
            }),
        );
        Ok(added)
    }
}

fn image_block(image: &GeneratedImage) -> ImageBlock {
    ImageBlock::new(image.url.as_str(), image.description.as_str())
}

fn display_name(image: &GeneratedImage) -> &str {
    if image.description.trim().is_empty() {
        &image.id
    } else {
        image.description.trim()
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use blogwright_contracts::conversation::{Role, FAILURE_MESSAGE};
    use blogwright_contracts::document::DropZone;
    use blogwright_contracts::journal::SessionJournal;
    use blogwright_contracts::markup::HeadingScope;
    use blogwright_contracts::models::{GenerationRequest, Provider, TargetAudience, Tone};
    use blogwright_contracts::session::SessionConfig;

    use super::{DropOutcome, Workbench, CONFIRMATION_DELAY};
    use crate::api::tests::serve_once;
    use crate::api::{ApiClient, ApiConfig};
    use crate::sourcing::DryrunSourcing;

    const BLOG: &str = "<h1>Rust</h1><p>intro</p><h2>Ownership</h2><p>moves</p><h2>Traits</h2><p>shared behaviour</p>";

    fn request() -> GenerationRequest {
        GenerationRequest::new(
            "Rust",
            Provider::Local,
            "llama3.1",
            TargetAudience::General,
            Tone::Informative,
            3,
        )
        .unwrap()
    }

    fn workbench(dir: &std::path::Path) -> anyhow::Result<Workbench> {
        Ok(Workbench::new(
            SessionConfig::default(),
            SessionJournal::in_dir(dir),
            HeadingScope::default(),
        ))
    }

    fn complete_line(blog: &str) -> String {
        let payload = serde_json::json!({"type": "complete", "blog": blog, "is_complete": true});
        format!("data: {payload}\n\n")
    }

    fn generated(dir: &std::path::Path) -> anyhow::Result<(Workbench, u64)> {
        let mut bench = workbench(dir)?;
        let id = bench.submit(&request())?;
        bench.ingest(id, complete_line(BLOG).as_bytes())?;
        bench.finish_stream(id)?;
        Ok((bench, id))
    }

    #[test]
    fn streamed_completion_analyzes_sections() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut bench = workbench(temp.path())?;
        let id = bench.submit(&request())?;
        assert!(bench.is_generating());
        assert!(bench.submit(&request()).is_err());

        let step = "data: {\"type\": \"step\", \"step\": 1, \"status\": \"acting\", \"action\": \"draft\"}\n\n";
        let full = format!("{step}{}", complete_line(BLOG));
        let (head, tail) = full.as_bytes().split_at(37);
        bench.ingest(id, head)?;
        bench.ingest(id, tail)?;
        let summary = bench.finish_stream(id)?;

        assert_eq!(summary.events, 2);
        assert!(!bench.is_generating());
        let entry = bench.conversation().entry(id).unwrap();
        assert!(entry.is_complete());
        assert_eq!(entry.reasoning_trace.len(), 1);
        let titles: Vec<&str> = bench.sections().iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Rust", "Ownership", "Traits"]);
        assert!(bench.journal().path().exists());
        Ok(())
    }

    #[test]
    fn missing_terminal_event_fails_the_turn() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut bench = workbench(temp.path())?;
        let id = bench.submit(&request())?;
        bench.ingest(id, b"data: {\"type\": \"step\", \"step\": 1}\n\n")?;
        let summary = bench.finish_stream(id)?;

        assert!(!summary.terminal_seen);
        let entry = bench.conversation().entry(id).unwrap();
        assert!(entry.is_error());
        assert_eq!(entry.content, FAILURE_MESSAGE);
        assert!(bench.submit(&request()).is_ok());
        Ok(())
    }

    #[test]
    fn unwritable_journal_does_not_wedge_generation() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let blocker = temp.path().join("blocker");
        std::fs::write(&blocker, "")?;
        let mut bench = workbench(&blocker.join("state"))?;

        let id = bench.submit(&request())?;
        bench.ingest(id, complete_line(BLOG).as_bytes())?;
        bench.finish_stream(id)?;
        assert!(!bench.is_generating());
        assert!(bench.conversation().entry(id).unwrap().is_complete());
        assert_eq!(bench.sections().len(), 3);
        assert!(!bench.journal().path().exists());

        let (base, server) = serve_once("200 OK", "text/event-stream", &complete_line("<h1>Again</h1>"))?;
        let api = ApiClient::new(ApiConfig::new(&base))?;
        let id = bench.run_generation(&api, &request(), |_| {})?;
        server.join().map_err(|_| anyhow::anyhow!("server panicked"))?;
        assert!(bench.conversation().entry(id).unwrap().is_complete());
        assert!(bench.submit(&request()).is_ok());
        Ok(())
    }

    #[test]
    fn run_generation_folds_transport_errors_into_the_transcript() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let (base, server) = serve_once("500 Internal Server Error", "text/plain", "kaboom")?;
        let api = ApiClient::new(ApiConfig::new(&base))?;
        let mut bench = workbench(temp.path())?;
        let id = bench.run_generation(&api, &request(), |_| {})?;
        server.join().map_err(|_| anyhow::anyhow!("server panicked"))?;

        let entry = bench.conversation().entry(id).unwrap();
        assert!(entry.is_error());
        assert!(entry.error_detail.as_deref().unwrap_or_default().contains("kaboom"));
        Ok(())
    }

    #[test]
    fn run_generation_reports_progress() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let body = format!(
            "data: {{\"status\": \"connected\", \"topic\": \"Rust\"}}\n\n{}",
            complete_line(BLOG)
        );
        let (base, server) = serve_once("200 OK", "text/event-stream", &body)?;
        let api = ApiClient::new(ApiConfig::new(&base))?;
        let mut bench = workbench(temp.path())?;
        let mut updates = Vec::new();
        let id = bench.run_generation(&api, &request(), |entry| updates.push(entry.phase))?;
        server.join().map_err(|_| anyhow::anyhow!("server panicked"))?;

        assert_eq!(updates.len(), 2);
        assert!(bench.conversation().entry(id).unwrap().is_complete());
        assert_eq!(bench.sections().len(), 3);
        Ok(())
    }

    #[test]
    fn selection_toggles_and_resets_on_new_document() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let (mut bench, _) = generated(temp.path())?;
        assert!(bench.toggle_section(1)?);
        assert!(bench.toggle_section(2)?);
        assert!(!bench.toggle_section(1)?);
        assert!(bench.toggle_section(9).is_err());
        assert_eq!(bench.selected_sections().len(), 1);

        bench.select_all_sections();
        assert_eq!(bench.selected_sections().len(), 3);

        let id = bench.submit(&request())?;
        bench.ingest(id, complete_line("<h1>Only</h1>").as_bytes())?;
        bench.finish_stream(id)?;
        assert!(bench.selected_sections().is_empty());
        assert_eq!(bench.sections().len(), 1);
        Ok(())
    }

    #[test]
    fn section_images_skip_failed_sections() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let (mut bench, _) = generated(temp.path())?;
        assert!(bench
            .generate_section_images(&DryrunSourcing::new())
            .is_err());

        bench.select_all_sections();
        let batch = bench.generate_section_images(&DryrunSourcing::failing_for(&["section-1"]))?;
        assert_eq!(batch.added, 2);
        assert_eq!(batch.failed_sections, 1);
        assert!(bench.gallery().get("dryrun-section-0").is_some());
        assert!(bench.gallery().get("dryrun-section-2").is_some());

        bench.clear_selection();
        bench.toggle_section(1)?;
        let err = bench
            .generate_section_images(&DryrunSourcing::failing_for(&["section-1"]))
            .unwrap_err();
        assert!(err.to_string().contains("1 section(s)"));
        Ok(())
    }

    #[test]
    fn searches_add_to_gallery() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let (mut bench, _) = generated(temp.path())?;
        let sourcing = DryrunSourcing::new();
        assert_eq!(bench.search_images(&sourcing, "ferris", 2)?, 2);
        assert_eq!(bench.search_images(&sourcing, "ferris", 2)?, 0);
        assert!(bench.search_images(&sourcing, "  ", 2).is_err());
        assert_eq!(bench.search_images_for_sections(&sourcing)?, 3);
        assert_eq!(bench.gallery().len(), 5);
        Ok(())
    }

    #[test]
    fn drop_inserts_image_and_confirms_later() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let (mut bench, id) = generated(temp.path())?;
        bench.search_images(&DryrunSourcing::new(), "ferris", 1)?;
        let image_id = bench.gallery().iter().next().unwrap().id.clone();

        assert!(bench.drop_on(DropZone::BeforeSection(0), Instant::now()).is_err());
        assert!(bench.begin_drag("missing").is_err());
        bench.begin_drag(&image_id)?;

        let now = Instant::now();
        assert_eq!(
            bench.drop_on(DropZone::AfterSection(7), now)?,
            DropOutcome::Stale
        );
        assert_eq!(bench.dragged_image(), Some(image_id.as_str()));
        assert_eq!(bench.conversation().entry(id).unwrap().content, BLOG);

        let outcome = bench.drop_on(DropZone::BeforeSection(1), now)?;
        assert_eq!(
            outcome,
            DropOutcome::Inserted {
                entry_id: id,
                zone: DropZone::BeforeSection(1)
            }
        );
        assert_eq!(bench.dragged_image(), None);
        let content = &bench.conversation().entry(id).unwrap().content;
        assert!(content.contains("<figure class=\"blog-image\">"));
        assert!(content.find("<figure").unwrap() < content.find("<h2>Ownership").unwrap());
        assert_eq!(bench.sections().len(), 3);

        assert!(bench.flush_notices(now + Duration::from_millis(100)).is_empty());
        let posted = bench.flush_notices(now + CONFIRMATION_DELAY);
        assert_eq!(posted.len(), 1);
        let notice = bench.conversation().entry(posted[0]).unwrap();
        assert_eq!(notice.role, Role::System);
        assert!(notice.content.contains("before-section-1"));
        assert_eq!(bench.next_notice_due(), None);
        Ok(())
    }

    #[test]
    fn end_drag_clears_the_slot() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let (mut bench, _) = generated(temp.path())?;
        bench.search_images(&DryrunSourcing::new(), "ferris", 1)?;
        let image_id = bench.gallery().iter().next().unwrap().id.clone();
        bench.begin_drag(&image_id)?;
        bench.end_drag();
        assert!(bench.drop_on(DropZone::EndOfContent, Instant::now()).is_err());
        Ok(())
    }
}
