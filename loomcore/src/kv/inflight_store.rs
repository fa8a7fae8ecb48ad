//! `InflightStore`: tracks outstanding remote-executor requests (§4.1, §4.5).
//!
//! Lease invariant: a row with `status = pending` and `lease_until_ts < now` is
//! abandoned and must either be adopted (a cached result already exists) or failed
//! by the sweeper in [`crate::transport`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::backend::KvBackend;
use super::errors::KvError;
use crate::tool::Scope;

const PREFIX: &str = "inflight/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InflightStatus {
    Pending,
    Done,
    Failed,
    Cancelled,
}

/// Which job/block a row belongs to, for attribution and cancel-by-job (§4.5.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InflightMeta {
    pub job_id: String,
    pub block_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InflightRow {
    pub id: String,
    pub request_key: String,
    pub status: InflightStatus,
    pub lease_until_ts: i64,
    pub raw_result: Option<String>,
    pub raw_json: Option<serde_json::Value>,
    pub error: Option<String>,
    pub preview: Option<String>,
    pub created_ts: i64,
    /// Hash of the request payload; a `done` row only satisfies a lookup when
    /// this is absent or matches the new request's hash (§4.5.3).
    pub payload_hash: Option<String>,
    pub task_type: String,
    pub attempt: u32,
    pub mode: String,
    pub stage: Scope,
    pub meta: InflightMeta,
    pub started_at: i64,
    pub attempt_deadline_ts: i64,
}

pub struct InflightStore {
    backend: Arc<dyn KvBackend>,
}

impl InflightStore {
    #[must_use]
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self { backend }
    }

    pub async fn upsert(&self, row: &InflightRow) -> Result<(), KvError> {
        let value = serde_json::to_value(row)?;
        self.backend.put(&format!("{PREFIX}{}", row.id), value).await
    }

    pub async fn get(&self, id: &str) -> Result<Option<InflightRow>, KvError> {
        let Some(value) = self.backend.get(&format!("{PREFIX}{id}")).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_value(value)?))
    }

    pub async fn find_by_key(&self, request_key: &str) -> Result<Option<InflightRow>, KvError> {
        let rows = self.backend.scan_prefix(PREFIX).await?;
        for (_, value) in rows {
            let row: InflightRow = serde_json::from_value(value)?;
            if row.request_key == request_key {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }

    pub async fn list_expired(&self, now_ts: i64) -> Result<Vec<InflightRow>, KvError> {
        let predicate = move |v: &serde_json::Value| {
            v.get("status").and_then(|s| s.as_str()) == Some("pending")
                && v.get("lease_until_ts").and_then(serde_json::Value::as_i64).is_some_and(|lease| lease < now_ts)
        };
        let rows = self.backend.scan_matching(PREFIX, &predicate).await?;
        rows.into_iter().map(|(_, v)| serde_json::from_value(v).map_err(KvError::from)).collect()
    }

    pub async fn list_pending(&self, limit: usize) -> Result<Vec<InflightRow>, KvError> {
        let predicate = |v: &serde_json::Value| v.get("status").and_then(|s| s.as_str()) == Some("pending");
        let rows = self.backend.scan_matching(PREFIX, &predicate).await?;
        rows.into_iter().take(limit).map(|(_, v)| serde_json::from_value(v).map_err(KvError::from)).collect()
    }

    pub async fn mark_done(&self, id: &str, raw_result: String, raw_json: Option<serde_json::Value>) -> Result<(), KvError> {
        if let Some(mut row) = self.get(id).await? {
            row.status = InflightStatus::Done;
            row.raw_result = Some(raw_result);
            row.raw_json = raw_json;
            self.upsert(&row).await?;
        }
        Ok(())
    }

    pub async fn mark_failed(&self, id: &str, error: String) -> Result<(), KvError> {
        if let Some(mut row) = self.get(id).await? {
            row.status = InflightStatus::Failed;
            row.error = Some(error);
            self.upsert(&row).await?;
        }
        Ok(())
    }

    pub async fn mark_cancelled(&self, id: &str) -> Result<(), KvError> {
        if let Some(mut row) = self.get(id).await? {
            row.status = InflightStatus::Cancelled;
            self.upsert(&row).await?;
        }
        Ok(())
    }

    pub async fn touch_stream_heartbeat(&self, id: &str, preview: String, lease_until_ts: i64) -> Result<(), KvError> {
        if let Some(mut row) = self.get(id).await? {
            row.preview = Some(preview);
            row.lease_until_ts = lease_until_ts;
            self.upsert(&row).await?;
        }
        Ok(())
    }

    /// First pending row whose lease already expired at `now_ts`, if any — the
    /// sweeper's entry point for adopting or failing an abandoned request.
    pub async fn next_lease(&self, now_ts: i64) -> Result<Option<InflightRow>, KvError> {
        Ok(self.list_expired(now_ts).await?.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryBackend;

    fn row(id: &str, lease_until_ts: i64) -> InflightRow {
        InflightRow {
            id: id.to_string(),
            request_key: format!("key-{id}"),
            status: InflightStatus::Pending,
            lease_until_ts,
            raw_result: None,
            raw_json: None,
            error: None,
            preview: None,
            created_ts: 0,
            payload_hash: None,
            task_type: "model.turn".to_string(),
            attempt: 1,
            mode: "default".to_string(),
            stage: Scope::Planning,
            meta: InflightMeta { job_id: format!("job-{id}"), block_id: None },
            started_at: 0,
            attempt_deadline_ts: lease_until_ts,
        }
    }

    #[tokio::test]
    async fn list_expired_only_returns_pending_rows_past_their_lease() {
        let store = InflightStore::new(Arc::new(MemoryBackend::new()));
        store.upsert(&row("expired", 50)).await.unwrap();
        store.upsert(&row("fresh", 5_000)).await.unwrap();

        let expired = store.list_expired(100).await.unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, "expired");
    }

    #[tokio::test]
    async fn mark_done_clears_pending_status_and_stores_result() {
        let store = InflightStore::new(Arc::new(MemoryBackend::new()));
        store.upsert(&row("r1", 5_000)).await.unwrap();
        store.mark_done("r1", "ok".to_string(), None).await.unwrap();
        let loaded = store.get("r1").await.unwrap().unwrap();
        assert_eq!(loaded.status, InflightStatus::Done);
        assert_eq!(loaded.raw_result.as_deref(), Some("ok"));
    }

    #[tokio::test]
    async fn find_by_key_locates_the_matching_row() {
        let store = InflightStore::new(Arc::new(MemoryBackend::new()));
        store.upsert(&row("r1", 5_000)).await.unwrap();
        let found = store.find_by_key("key-r1").await.unwrap();
        assert!(found.is_some());
    }
}
