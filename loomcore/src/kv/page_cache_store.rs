//! `PageCacheStore`: upsert-by-id cache of previously translated page content,
//! consulted by `ByArgsHash` idempotent tools before issuing a fresh request (§4.1).

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::backend::KvBackend;
use super::errors::KvError;

const PREFIX: &str = "page_cache/";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageCacheEntry {
    pub key: String,
    pub value: serde_json::Value,
    pub ts: i64,
}

pub struct PageCacheStore {
    backend: Arc<dyn KvBackend>,
}

impl PageCacheStore {
    #[must_use]
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self { backend }
    }

    pub async fn put(&self, entry: &PageCacheEntry) -> Result<(), KvError> {
        let value = serde_json::to_value(entry)?;
        self.backend.put(&format!("{PREFIX}{}", entry.key), value).await
    }

    pub async fn get(&self, key: &str) -> Result<Option<PageCacheEntry>, KvError> {
        let Some(value) = self.backend.get(&format!("{PREFIX}{key}")).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_value(value)?))
    }

    /// Evict every entry older than `ts - max_age_ms`.
    pub async fn evict_older_than(&self, now_ts: i64, max_age_ms: i64) -> Result<usize, KvError> {
        let predicate = move |v: &serde_json::Value| {
            v.get("ts").and_then(serde_json::Value::as_i64).is_some_and(|ts| now_ts.saturating_sub(ts) > max_age_ms)
        };
        let stale = self.backend.scan_matching(PREFIX, &predicate).await?;
        for (key, _) in &stale {
            self.backend.delete(key).await?;
        }
        Ok(stale.len())
    }
}
