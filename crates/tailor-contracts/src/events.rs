use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

pub type EventPayload = Map<String, Value>;

pub const SESSION_STARTED: &str = "session_started";
pub const EDIT_REQUESTED: &str = "edit_requested";
pub const INTENT_CLASSIFIED: &str = "intent_classified";
pub const CLASSIFICATION_FAILED: &str = "classification_failed";
pub const GENERATION_STARTED: &str = "generation_started";
pub const CANDIDATE_CREATED: &str = "candidate_created";
pub const GENERATION_FAILED: &str = "generation_failed";
pub const CANDIDATE_SCORED: &str = "candidate_scored";
pub const SCORE_FAILED: &str = "score_failed";
pub const SELECTION_MADE: &str = "selection_made";
pub const EDIT_FINISHED: &str = "edit_finished";
pub const MODEL_CHANGED: &str = "model_changed";

/// Append-only writer for a session's `events.jsonl`.
///
/// - every line carries `type`, `session_id` and `ts`
/// - caller payload is merged last and can override those keys
/// - one compact JSON object per line; concurrent emitters are serialized
#[derive(Debug, Clone)]
pub struct EventWriter {
    inner: Arc<EventWriterInner>,
}

#[derive(Debug)]
struct EventWriterInner {
    path: PathBuf,
    session_id: String,
    lock: Mutex<()>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(EventWriterInner {
                path: path.into(),
                session_id: session_id.into(),
                lock: Mutex::new(()),
            }),
        }
    }

    /// Writer with a fresh random session id.
    pub fn for_new_session(path: impl Into<PathBuf>) -> Self {
        Self::new(path, new_session_id())
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    pub fn emit(&self, event_type: &str, payload: EventPayload) -> anyhow::Result<Value> {
        let mut event = Map::new();
        event.insert("type".to_string(), Value::String(event_type.to_string()));
        event.insert(
            "session_id".to_string(),
            Value::String(self.inner.session_id.clone()),
        );
        event.insert("ts".to_string(), Value::String(now_utc_iso()));
        event.extend(payload);

        if let Some(parent) = self.inner.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut line = serde_json::to_string(&event)?;
        line.push('\n');
        let _guard = self
            .inner
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("event writer lock poisoned"))?;
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.inner.path)?
            .write_all(line.as_bytes())?;

        Ok(Value::Object(event))
    }

    /// Emits from code paths that must not fail because of logging, such as
    /// generation workers. Write errors go to stderr.
    pub fn record(&self, event_type: &str, payload: EventPayload) {
        if let Err(err) = self.emit(event_type, payload) {
            eprintln!(
                "event '{event_type}' not written to {}: {err:#}",
                self.inner.path.display()
            );
        }
    }
}

pub fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}
