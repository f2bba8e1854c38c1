use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::conversation::EntryId;
use crate::stream::StreamEvent;

pub type JournalPayload = Map<String, Value>;

// Written by the journal itself; payload keys with these names are dropped.
const ENVELOPE_KEYS: &[&str] = &["type", "session_id", "ts"];

/// Append-only `events.jsonl` for one session, one compact JSON object per line.
///
/// The file is opened on the first record and kept open. A failed write drops the handle,
/// so the next record opens the file again.
#[derive(Debug, Clone)]
pub struct SessionJournal {
    inner: Arc<JournalInner>,
}

#[derive(Debug)]
struct JournalInner {
    path: PathBuf,
    session_id: String,
    file: Mutex<Option<File>>,
}

impl SessionJournal {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(JournalInner {
                path: path.into(),
                session_id: session_id.into(),
                file: Mutex::new(None),
            }),
        }
    }

    /// Opens `events.jsonl` under `dir` with a fresh session id.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join("events.jsonl"), uuid::Uuid::new_v4().to_string())
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    /// Appends one event and returns it as written.
    pub fn record(&self, kind: &str, payload: JournalPayload) -> anyhow::Result<Value> {
        let mut event = Map::new();
        event.insert("type".to_string(), Value::String(kind.to_string()));
        event.insert(
            "session_id".to_string(),
            Value::String(self.inner.session_id.clone()),
        );
        event.insert("ts".to_string(), Value::String(now_utc_iso()));
        for (key, value) in payload {
            if ENVELOPE_KEYS.contains(&key.as_str()) {
                tracing::debug!(kind, key = %key, "dropping reserved journal key from payload");
                continue;
            }
            event.insert(key, value);
        }

        let mut line = serde_json::to_string(&event)?;
        line.push('\n');
        self.append(&line)?;
        Ok(Value::Object(event))
    }

    pub fn record_stream_event(&self, entry_id: EntryId, event: &StreamEvent) -> anyhow::Result<Value> {
        let mut payload = JournalPayload::new();
        payload.insert("entry_id".to_string(), Value::from(entry_id));
        payload.insert("event".to_string(), Value::Object(event.to_payload()));
        self.record(&format!("stream_{}", event.kind()), payload)
    }

    fn append(&self, line: &str) -> anyhow::Result<()> {
        let path = &self.inner.path;
        let mut slot = self
            .inner
            .file
            .lock()
            .map_err(|_| anyhow::anyhow!("session journal lock poisoned"))?;
        let mut file = match slot.take() {
            Some(file) => file,
            None => open_append(path)?,
        };
        file.write_all(line.as_bytes())
            .with_context(|| format!("failed to append to {}", path.display()))?;
        *slot = Some(file);
        Ok(())
    }
}

fn open_append(path: &Path) -> anyhow::Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::DateTime;
    use serde_json::Value;

    use super::{JournalPayload, SessionJournal};
    use crate::stream::StreamEvent;

    #[test]
    fn record_writes_compact_jsonl_line() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let journal = SessionJournal::new(&path, "session-1");

        let mut payload = JournalPayload::new();
        payload.insert("topic".to_string(), Value::String("Rust".to_string()));
        let recorded = journal.record("generation_submitted", payload)?;

        let content = fs::read_to_string(&path)?;
        let parsed: Value = serde_json::from_str(content.lines().next().unwrap_or(""))?;
        assert_eq!(parsed, recorded);
        assert_eq!(parsed["type"], "generation_submitted");
        assert_eq!(parsed["session_id"], "session-1");
        assert_eq!(parsed["topic"], "Rust");
        DateTime::parse_from_rfc3339(parsed["ts"].as_str().unwrap_or(""))?;
        Ok(())
    }

    #[test]
    fn payload_cannot_override_envelope() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let journal = SessionJournal::new(temp.path().join("events.jsonl"), "session-1");

        let mut payload = JournalPayload::new();
        payload.insert("type".to_string(), Value::String("forged".to_string()));
        payload.insert("session_id".to_string(), Value::String("other".to_string()));
        payload.insert("entry_id".to_string(), Value::from(4));
        let recorded = journal.record("image_inserted", payload)?;

        assert_eq!(recorded["type"], "image_inserted");
        assert_eq!(recorded["session_id"], "session-1");
        assert_eq!(recorded["entry_id"], 4);
        Ok(())
    }

    #[test]
    fn failed_open_is_retried_on_next_record() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let state = temp.path().join("state");
        fs::write(&state, "")?;
        let journal = SessionJournal::in_dir(&state);
        assert!(journal.record("session_started", JournalPayload::new()).is_err());

        fs::remove_file(&state)?;
        journal.record("session_started", JournalPayload::new())?;
        journal.record("stream_closed", JournalPayload::new())?;
        assert_eq!(fs::read_to_string(journal.path())?.lines().count(), 2);
        Ok(())
    }

    #[test]
    fn stream_events_append_in_order() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let journal = SessionJournal::in_dir(&temp.path().join("state"));

        journal.record_stream_event(
            3,
            &StreamEvent::Connected {
                topic: "Rust".to_string(),
            },
        )?;
        journal.record_stream_event(
            3,
            &StreamEvent::Error {
                message: "boom".to_string(),
            },
        )?;

        let content = fs::read_to_string(journal.path())?;
        let lines: Vec<Value> = content
            .lines()
            .map(serde_json::from_str)
            .collect::<Result<_, _>>()?;
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["type"], "stream_connected");
        assert_eq!(lines[1]["type"], "stream_error");
        assert_eq!(lines[1]["entry_id"], 3);
        assert_eq!(lines[1]["session_id"], journal.session_id());
        Ok(())
    }
}
