//! `TabStateStore`: per-tab UI/runtime state, upsert-by-id over the shared backend (§4.1).

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::backend::KvBackend;
use super::errors::KvError;

const PREFIX: &str = "tab/";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TabState {
    pub tab_id: String,
    pub active_job_id: Option<String>,
    pub last_seen_ts: i64,
}

pub struct TabStateStore {
    backend: Arc<dyn KvBackend>,
}

impl TabStateStore {
    #[must_use]
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self { backend }
    }

    pub async fn upsert(&self, state: &TabState) -> Result<(), KvError> {
        let value = serde_json::to_value(state)?;
        self.backend.put(&format!("{PREFIX}{}", state.tab_id), value).await
    }

    pub async fn get(&self, tab_id: &str) -> Result<Option<TabState>, KvError> {
        let Some(value) = self.backend.get(&format!("{PREFIX}{tab_id}")).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_value(value)?))
    }

    pub async fn delete(&self, tab_id: &str) -> Result<(), KvError> {
        self.backend.delete(&format!("{PREFIX}{tab_id}")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryBackend;

    #[tokio::test]
    async fn upserted_tab_state_round_trips() {
        let store = TabStateStore::new(Arc::new(MemoryBackend::new()));
        let state = TabState { tab_id: "t1".to_string(), active_job_id: Some("j1".to_string()), last_seen_ts: 5 };
        store.upsert(&state).await.unwrap();
        let loaded = store.get("t1").await.unwrap().unwrap();
        assert_eq!(loaded.active_job_id, Some("j1".to_string()));
    }
}
