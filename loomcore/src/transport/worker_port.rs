//! The boundary between the job runner and wherever tool calls actually execute
//! (an offscreen document, a worker thread, a remote HTTP worker). Everything
//! above this trait is transport-agnostic (§4.5.1).

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, Mutex};

use super::errors::TransportError;

pub type BoxedFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteRequest {
    pub request_key: String,
    pub job_id: String,
    pub tab_id: String,
    pub tool_name: String,
    pub arguments: Value,
    /// Hash of `arguments`; carried through to the inflight row so a later
    /// `findByKey` hit on a `done` row can tell a genuine cache hit from a
    /// request that happens to reuse the same key with different payload.
    #[serde(default)]
    pub payload_hash: Option<String>,
    #[serde(default = "ExecuteRequest::default_task_type")]
    pub task_type: String,
    #[serde(default = "ExecuteRequest::default_mode")]
    pub mode: String,
    #[serde(default)]
    pub block_id: Option<String>,
}

impl ExecuteRequest {
    #[must_use]
    pub fn new(request_key: impl Into<String>, job_id: impl Into<String>, tab_id: impl Into<String>, tool_name: impl Into<String>, arguments: Value) -> Self {
        Self {
            request_key: request_key.into(),
            job_id: job_id.into(),
            tab_id: tab_id.into(),
            tool_name: tool_name.into(),
            arguments,
            payload_hash: None,
            task_type: Self::default_task_type(),
            mode: Self::default_mode(),
            block_id: None,
        }
    }

    fn default_task_type() -> String {
        "generic".to_string()
    }

    fn default_mode() -> String {
        "default".to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteOutcome {
    pub request_key: String,
    pub output: Result<Value, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Done,
    Failed,
    Cancelled,
    Unknown,
}

/// Object-safe seam a [`super::executor`] drives. A worker port owns the actual
/// mechanism (channel, HTTP) by which a request reaches code that can execute it.
pub trait WorkerPort: Send + Sync {
    fn handshake<'a>(&'a self) -> BoxedFuture<'a, Result<(), TransportError>>;
    fn dispatch<'a>(&'a self, request: ExecuteRequest) -> BoxedFuture<'a, Result<ExecuteOutcome, TransportError>>;
    fn query_status<'a>(&'a self, request_key: &'a str) -> BoxedFuture<'a, Result<RequestStatus, TransportError>>;
    fn cancel<'a>(&'a self, request_key: &'a str) -> BoxedFuture<'a, Result<(), TransportError>>;
    fn ping<'a>(&'a self) -> BoxedFuture<'a, Result<(), TransportError>>;
}

/// An in-process worker port backed by a `tokio::mpsc` channel, for tests and for
/// same-process workers that don't need a real wire transport.
pub struct ChannelWorkerPort {
    sender: mpsc::Sender<(ExecuteRequest, oneshot::Sender<Result<ExecuteOutcome, TransportError>>)>,
    statuses: Arc<Mutex<std::collections::HashMap<String, RequestStatus>>>,
    pings: AtomicU64,
}

impl ChannelWorkerPort {
    /// Spawns a background task draining requests through `handler`, returning
    /// the port the caller dispatches into.
    pub fn spawn<F>(handler: F) -> Self
    where
        F: Fn(ExecuteRequest) -> Result<Value, String> + Send + Sync + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<(ExecuteRequest, oneshot::Sender<Result<ExecuteOutcome, TransportError>>)>(64);
        let statuses = Arc::new(Mutex::new(std::collections::HashMap::new()));
        let statuses_task = Arc::clone(&statuses);
        let handler = Arc::new(handler);
        tokio::spawn(async move {
            while let Some((request, reply)) = rx.recv().await {
                let key = request.request_key.clone();
                statuses_task.lock().await.insert(key.clone(), RequestStatus::Pending);
                let output = handler(request.clone());
                let status = if output.is_ok() { RequestStatus::Done } else { RequestStatus::Failed };
                statuses_task.lock().await.insert(key.clone(), status);
                let _ = reply.send(Ok(ExecuteOutcome { request_key: key, output }));
            }
        });
        Self { sender: tx, statuses, pings: AtomicU64::new(0) }
    }
}

impl WorkerPort for ChannelWorkerPort {
    fn handshake<'a>(&'a self) -> BoxedFuture<'a, Result<(), TransportError>> {
        Box::pin(async move {
            if self.sender.is_closed() {
                return Err(TransportError::PortDisconnected);
            }
            Ok(())
        })
    }

    fn dispatch<'a>(&'a self, request: ExecuteRequest) -> BoxedFuture<'a, Result<ExecuteOutcome, TransportError>> {
        Box::pin(async move {
            let (tx, rx) = oneshot::channel();
            self.sender
                .send((request, tx))
                .await
                .map_err(|_| TransportError::PortDisconnected)?;
            rx.await.map_err(|_| TransportError::PortDisconnected)?
        })
    }

    fn query_status<'a>(&'a self, request_key: &'a str) -> BoxedFuture<'a, Result<RequestStatus, TransportError>> {
        Box::pin(async move {
            let statuses = self.statuses.lock().await;
            Ok(statuses.get(request_key).copied().unwrap_or(RequestStatus::Unknown))
        })
    }

    fn cancel<'a>(&'a self, request_key: &'a str) -> BoxedFuture<'a, Result<(), TransportError>> {
        Box::pin(async move {
            self.statuses.lock().await.insert(request_key.to_string(), RequestStatus::Cancelled);
            Ok(())
        })
    }

    fn ping<'a>(&'a self) -> BoxedFuture<'a, Result<(), TransportError>> {
        self.pings.fetch_add(1, Ordering::Relaxed);
        Box::pin(async move { Ok(()) })
    }
}

/// A remote worker port reached over HTTP, for a worker running out of process
/// (e.g. a separate executor service).
pub struct HttpWorkerPort {
    client: reqwest::Client,
    base_url: String,
}

impl HttpWorkerPort {
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self { client, base_url: base_url.into() }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }
}

impl WorkerPort for HttpWorkerPort {
    fn handshake<'a>(&'a self) -> BoxedFuture<'a, Result<(), TransportError>> {
        Box::pin(async move {
            self.client
                .get(self.url("ping"))
                .send()
                .await
                .map_err(|e| TransportError::Unavailable(e.to_string()))?;
            Ok(())
        })
    }

    fn dispatch<'a>(&'a self, request: ExecuteRequest) -> BoxedFuture<'a, Result<ExecuteOutcome, TransportError>> {
        Box::pin(async move {
            let response = self
                .client
                .post(self.url("execute"))
                .json(&request)
                .send()
                .await
                .map_err(|e| TransportError::ExecuteFailed(e.to_string()))?;
            response
                .json::<ExecuteOutcome>()
                .await
                .map_err(|e| TransportError::ExecuteFailed(e.to_string()))
        })
    }

    fn query_status<'a>(&'a self, request_key: &'a str) -> BoxedFuture<'a, Result<RequestStatus, TransportError>> {
        Box::pin(async move {
            let response = self
                .client
                .get(self.url(&format!("status/{request_key}")))
                .send()
                .await
                .map_err(|e| TransportError::Unavailable(e.to_string()))?;
            response
                .json::<RequestStatus>()
                .await
                .map_err(|e| TransportError::ExecuteFailed(e.to_string()))
        })
    }

    fn cancel<'a>(&'a self, request_key: &'a str) -> BoxedFuture<'a, Result<(), TransportError>> {
        Box::pin(async move {
            self.client
                .post(self.url(&format!("cancel/{request_key}")))
                .send()
                .await
                .map_err(|e| TransportError::Unavailable(e.to_string()))?;
            Ok(())
        })
    }

    fn ping<'a>(&'a self) -> BoxedFuture<'a, Result<(), TransportError>> {
        self.handshake()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_port_dispatches_through_the_handler() {
        let port = ChannelWorkerPort::spawn(|req| Ok(Value::String(req.tool_name)));
        let outcome = port
            .dispatch(ExecuteRequest::new("r1", "j1", "t1", "translate", Value::Null))
            .await
            .unwrap();
        assert_eq!(outcome.output.unwrap(), Value::String("translate".to_string()));
        let status = port.query_status("r1").await.unwrap();
        assert_eq!(status, RequestStatus::Done);
    }

    #[tokio::test]
    async fn unknown_request_key_reports_unknown_status() {
        let port = ChannelWorkerPort::spawn(|_| Ok(Value::Null));
        let status = port.query_status("nope").await.unwrap();
        assert_eq!(status, RequestStatus::Unknown);
    }
}
