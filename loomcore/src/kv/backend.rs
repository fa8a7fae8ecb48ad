//! The single persistent key-value area every typed store is layered over (§4.1).

use std::collections::BTreeMap;
use std::pin::Pin;
use std::sync::Mutex;

use serde_json::Value;

use super::errors::KvError;

type BoxedFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Raw byte/JSON-value storage keyed by string, partitioned by key prefix.
pub trait KvBackend: Send + Sync {
    fn get<'a>(&'a self, key: &'a str) -> BoxedFuture<'a, Result<Option<Value>, KvError>>;
    fn put<'a>(&'a self, key: &'a str, value: Value) -> BoxedFuture<'a, Result<(), KvError>>;
    fn delete<'a>(&'a self, key: &'a str) -> BoxedFuture<'a, Result<(), KvError>>;
    /// Every `(key, value)` whose key starts with `prefix`, in key order.
    fn scan_prefix<'a>(&'a self, prefix: &'a str) -> BoxedFuture<'a, Result<Vec<(String, Value)>, KvError>>;
    /// Every `(key, value)` under `prefix` for which `predicate` returns `true`.
    fn scan_matching<'a>(
        &'a self,
        prefix: &'a str,
        predicate: &'a (dyn Fn(&Value) -> bool + Send + Sync),
    ) -> BoxedFuture<'a, Result<Vec<(String, Value)>, KvError>>;
}

/// In-process [`KvBackend`] backed by a `BTreeMap`, for tests and the CLI demo.
#[derive(Default)]
pub struct MemoryBackend {
    data: Mutex<BTreeMap<String, Value>>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvBackend for MemoryBackend {
    fn get<'a>(&'a self, key: &'a str) -> BoxedFuture<'a, Result<Option<Value>, KvError>> {
        Box::pin(async move { Ok(self.data.lock().unwrap().get(key).cloned()) })
    }

    fn put<'a>(&'a self, key: &'a str, value: Value) -> BoxedFuture<'a, Result<(), KvError>> {
        Box::pin(async move {
            self.data.lock().unwrap().insert(key.to_string(), value);
            Ok(())
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> BoxedFuture<'a, Result<(), KvError>> {
        Box::pin(async move {
            self.data.lock().unwrap().remove(key);
            Ok(())
        })
    }

    fn scan_prefix<'a>(&'a self, prefix: &'a str) -> BoxedFuture<'a, Result<Vec<(String, Value)>, KvError>> {
        Box::pin(async move {
            Ok(self
                .data
                .lock()
                .unwrap()
                .range(prefix.to_string()..)
                .take_while(|(k, _)| k.starts_with(prefix))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect())
        })
    }

    fn scan_matching<'a>(
        &'a self,
        prefix: &'a str,
        predicate: &'a (dyn Fn(&Value) -> bool + Send + Sync),
    ) -> BoxedFuture<'a, Result<Vec<(String, Value)>, KvError>> {
        Box::pin(async move {
            Ok(self
                .data
                .lock()
                .unwrap()
                .range(prefix.to_string()..)
                .take_while(|(k, _)| k.starts_with(prefix))
                .filter(|(_, v)| predicate(v))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scan_prefix_is_limited_to_matching_keys() {
        let backend = MemoryBackend::new();
        backend.put("job/1", serde_json::json!(1)).await.unwrap();
        backend.put("job/2", serde_json::json!(2)).await.unwrap();
        backend.put("tab/1", serde_json::json!(3)).await.unwrap();

        let rows = backend.scan_prefix("job/").await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn delete_then_get_returns_none() {
        let backend = MemoryBackend::new();
        backend.put("k", serde_json::json!("v")).await.unwrap();
        backend.delete("k").await.unwrap();
        assert_eq!(backend.get("k").await.unwrap(), None);
    }
}
