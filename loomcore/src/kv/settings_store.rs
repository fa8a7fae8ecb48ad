//! `SettingsStore`: `get(keys) -> mapping`, `set(patch) -> ok`, `onChanged(subscriber)`.
//! Unknown keys return their default (§4.1, §4.9).

use std::sync::Arc;

use serde_json::Value;

use super::backend::KvBackend;
use super::errors::KvError;

const PREFIX: &str = "settings/";

type ChangeSubscriber = Box<dyn Fn(&str, &Value) + Send + Sync>;

pub struct SettingsStore {
    backend: Arc<dyn KvBackend>,
    subscribers: std::sync::Mutex<Vec<ChangeSubscriber>>,
}

impl SettingsStore {
    #[must_use]
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self { backend, subscribers: std::sync::Mutex::new(Vec::new()) }
    }

    /// Returns `keys` mapped to their stored value, or `Value::Null` when absent —
    /// callers layer their own typed defaults on top (see [`crate::settings::profile`]).
    pub async fn get(&self, keys: &[&str]) -> Result<Vec<(String, Value)>, KvError> {
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            let value = self.backend.get(&format!("{PREFIX}{key}")).await?.unwrap_or(Value::Null);
            out.push(((*key).to_string(), value));
        }
        Ok(out)
    }

    pub async fn set(&self, patch: &[(&str, Value)]) -> Result<(), KvError> {
        for (key, value) in patch {
            self.backend.put(&format!("{PREFIX}{key}"), value.clone()).await?;
            for subscriber in self.subscribers.lock().unwrap().iter() {
                subscriber(key, value);
            }
        }
        Ok(())
    }

    pub fn on_changed(&self, subscriber: ChangeSubscriber) {
        self.subscribers.lock().unwrap().push(subscriber);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryBackend;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn unknown_key_returns_null() {
        let store = SettingsStore::new(Arc::new(MemoryBackend::new()));
        let got = store.get(&["missing"]).await.unwrap();
        assert_eq!(got, vec![("missing".to_string(), Value::Null)]);
    }

    #[tokio::test]
    async fn set_then_get_round_trips_and_notifies_subscribers() {
        let store = SettingsStore::new(Arc::new(MemoryBackend::new()));
        let notified = Arc::new(AtomicUsize::new(0));
        let notified2 = notified.clone();
        store.on_changed(Box::new(move |_, _| {
            notified2.fetch_add(1, Ordering::SeqCst);
        }));

        store.set(&[("profile", serde_json::json!("thorough"))]).await.unwrap();
        let got = store.get(&["profile"]).await.unwrap();
        assert_eq!(got[0].1, serde_json::json!("thorough"));
        assert_eq!(notified.load(Ordering::SeqCst), 1);
    }
}
