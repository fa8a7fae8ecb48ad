//! `EventLogStore`: append-only, monotonic-sequence-keyed audit trail (§4.1).

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use super::backend::KvBackend;
use super::errors::KvError;

const PREFIX: &str = "event_log/";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub seq: u64,
    pub ts: i64,
    pub kind: String,
    pub payload: serde_json::Value,
}

pub struct EventLogStore {
    backend: Arc<dyn KvBackend>,
    next_seq: AtomicU64,
}

impl EventLogStore {
    #[must_use]
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self { backend, next_seq: AtomicU64::new(1) }
    }

    pub async fn append(&self, ts: i64, kind: impl Into<String>, payload: serde_json::Value) -> Result<u64, KvError> {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let event = LogEvent { seq, ts, kind: kind.into(), payload };
        let value = serde_json::to_value(&event)?;
        self.backend.put(&format!("{PREFIX}{seq:020}"), value).await?;
        Ok(seq)
    }

    pub async fn since(&self, after_seq: u64) -> Result<Vec<LogEvent>, KvError> {
        let rows = self.backend.scan_prefix(PREFIX).await?;
        rows.into_iter()
            .map(|(_, v)| serde_json::from_value::<LogEvent>(v))
            .collect::<Result<Vec<_>, _>>()
            .map(|events| events.into_iter().filter(|e| e.seq > after_seq).collect())
            .map_err(KvError::from)
    }
}
