//! A [`ModelClient`] that forwards every turn through the Remote Executor
//! Transport (§4.4.8) instead of calling a model provider directly, so model
//! turns get the same durability, retry, and de-duplication as any other
//! offscreen tool call. This is the production wiring; tests still use
//! [`super::model_client::test_support::ScriptedModel`].

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde_json::Value;

use crate::cancel::CancellationToken;
use crate::transport::executor::Executor;
use crate::transport::worker_port::{ExecuteRequest, WorkerPort};

use super::model_client::{ModelClient, ModelClientError, ModelTurnRequest, ModelTurnResponse};

type BoxedFuture<'a, T> = std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

const TASK_TYPE: &str = "model.turn";

/// Hashes the serialized payload so identical turns (same stage, history, and
/// instructions) reuse the same `request_key`/`payload_hash` pair and can be
/// adopted from a `done` inflight row instead of re-dispatched (§4.5.3).
fn hash_payload(payload: &Value) -> String {
    let mut hasher = DefaultHasher::new();
    payload.to_string().hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// Forwards [`ModelClient::turn`] calls through a [`WorkerPort`]-backed
/// [`Executor`], one [`ExecuteRequest`] per turn.
pub struct RemoteModelClient<P> {
    executor: Arc<Executor<P>>,
    job_id: String,
    tab_id: String,
}

impl<P: WorkerPort + 'static> RemoteModelClient<P> {
    #[must_use]
    pub fn new(executor: Arc<Executor<P>>, job_id: impl Into<String>, tab_id: impl Into<String>) -> Self {
        Self { executor, job_id: job_id.into(), tab_id: tab_id.into() }
    }
}

impl<P: WorkerPort + 'static> ModelClient for RemoteModelClient<P> {
    fn turn<'a>(&'a self, request: ModelTurnRequest) -> BoxedFuture<'a, Result<ModelTurnResponse, ModelClientError>> {
        Box::pin(async move {
            let payload = serde_json::to_value(&request)
                .map_err(|e| ModelClientError::message(format!("failed to serialize turn request: {e}")))?;
            let digest = hash_payload(&payload);
            let request_key = format!("{TASK_TYPE}:{digest}");

            let mut execute_request = ExecuteRequest::new(request_key, self.job_id.clone(), self.tab_id.clone(), TASK_TYPE, payload);
            execute_request.task_type = TASK_TYPE.to_string();
            execute_request.payload_hash = Some(digest);

            let cancel = CancellationToken::new();
            let outcome = self
                .executor
                .execute(execute_request, &cancel)
                .await
                .map_err(|err| ModelClientError::message(err.to_string()))?;

            let json = outcome.output.map_err(ModelClientError::message)?;
            serde_json::from_value(json).map_err(|e| ModelClientError::message(format!("failed to deserialize turn response: {e}")))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::kv::backend::MemoryBackend;
    use crate::kv::inflight_store::InflightStore;
    use crate::tool::Scope;
    use crate::transport::worker_port::ChannelWorkerPort;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn store() -> Arc<InflightStore> {
        Arc::new(InflightStore::new(Arc::new(MemoryBackend::new())))
    }

    fn request() -> ModelTurnRequest {
        ModelTurnRequest {
            stage: Scope::Planning,
            previous_response_id: None,
            input: vec![],
            tools: vec![],
            instructions: "translate the page".to_string(),
        }
    }

    #[tokio::test]
    async fn a_turn_round_trips_through_the_worker_port() {
        let port = Arc::new(ChannelWorkerPort::spawn(|_req| {
            serde_json::to_value(ModelTurnResponse { response_id: "resp-1".to_string(), output: vec![] })
                .map_err(|e| e.to_string())
        }));
        let executor = Arc::new(Executor::new(Arc::clone(&port), Arc::new(SystemClock), store()));
        let client = RemoteModelClient::new(executor, "job-1", "tab-1");

        let response = client.turn(request()).await.unwrap();

        assert_eq!(response.response_id, "resp-1");
    }

    #[tokio::test]
    async fn identical_turns_are_served_from_the_inflight_row_without_redispatch() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);
        let port = Arc::new(ChannelWorkerPort::spawn(move |_req| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            serde_json::to_value(ModelTurnResponse { response_id: "resp-1".to_string(), output: vec![] })
                .map_err(|e| e.to_string())
        }));
        let executor = Arc::new(Executor::new(Arc::clone(&port), Arc::new(SystemClock), store()));
        let client = RemoteModelClient::new(executor, "job-1", "tab-1");

        client.turn(request()).await.unwrap();
        client.turn(request()).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn a_worker_side_failure_surfaces_as_a_model_client_error() {
        let port = Arc::new(ChannelWorkerPort::spawn(|_req| Err("provider unavailable".to_string())));
        let executor = Arc::new(Executor::new(port, Arc::new(SystemClock), store()));
        let client = RemoteModelClient::new(executor, "job-1", "tab-1");

        let error = client.turn(request()).await.unwrap_err();

        assert!(error.message.contains("provider unavailable"));
    }
}
