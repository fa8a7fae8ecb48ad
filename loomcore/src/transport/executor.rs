//! Execute-core: the state machine run once per `request_key` (§4.5.3). Every
//! attempt is recorded in the durable [`InflightStore`] before it is dispatched,
//! so a restart mid-request finds a `pending` row to recover rather than losing
//! track of it, and a repeated call with the same key can either attach to the
//! in-flight attempt or adopt an already-`done` result instead of re-dispatching.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::{sleep, Duration};

use crate::cancel::CancellationToken;
use crate::clock::Clock;
use crate::kv::inflight_store::{InflightMeta, InflightRow, InflightStatus, InflightStore};

use super::dispatch_queue::{DispatchDecision, DispatchLimits, DispatchQueue};
use super::errors::TransportError;
use super::worker_port::{ExecuteOutcome, ExecuteRequest, RequestStatus, WorkerPort};

type DispatchReply = oneshot::Sender<Result<ExecuteOutcome, TransportError>>;

struct QueuedDispatch {
    request: ExecuteRequest,
    reply: DispatchReply,
}

/// Runs the fair-share [`DispatchQueue`] as a single-owner background task so
/// concurrent `execute()` callers never race each other over who gets to pop
/// and dispatch the next queue slot (§4.5.2).
fn spawn_dispatcher<P: WorkerPort + 'static>(port: Arc<P>, limits: DispatchLimits, mut incoming: mpsc::Receiver<QueuedDispatch>) {
    tokio::spawn(async move {
        let mut queue = DispatchQueue::new(limits);
        let mut waiters: HashMap<String, DispatchReply> = HashMap::new();
        let (done_tx, mut done_rx) = mpsc::channel::<(String, Result<ExecuteOutcome, TransportError>)>(256);

        loop {
            tokio::select! {
                incoming = incoming.recv() => {
                    match incoming {
                        Some(QueuedDispatch { request, reply }) => {
                            let key = request.request_key.clone();
                            if queue.enqueue(request).is_err() {
                                let _ = reply.send(Err(TransportError::Backpressure { wait_ms: 500 }));
                            } else {
                                waiters.insert(key, reply);
                            }
                        }
                        None => break,
                    }
                }
                Some((key, result)) = done_rx.recv() => {
                    queue.complete();
                    if let Some(reply) = waiters.remove(&key) {
                        let _ = reply.send(result);
                    }
                }
            }

            while let DispatchDecision::Send(queued) = queue.next() {
                let key = queued.request_key.clone();
                let port = Arc::clone(&port);
                let done_tx = done_tx.clone();
                tokio::spawn(async move {
                    let result = port.dispatch(queued).await;
                    let _ = done_tx.send((key, result)).await;
                });
            }
        }
    });
}

pub const MAX_ATTEMPTS: u32 = 4;
const BASE_BACKOFF_MS: i64 = 250;
const MAX_BACKOFF_MS: i64 = 2000;
const ATTEMPT_TIMEOUT_MS: i64 = 30_000;

#[must_use]
pub fn backoff_ms(attempt: u32) -> i64 {
    let exp = BASE_BACKOFF_MS.saturating_mul(1i64 << attempt.saturating_sub(1).min(16));
    exp.min(MAX_BACKOFF_MS)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecuteResult {
    Done,
    Failed,
    Cancelled,
}

/// Tracks requests currently being executed so a second call for the same
/// `request_key` attaches to the first instead of dispatching twice.
pub struct Executor<P> {
    port: Arc<P>,
    clock: Arc<dyn Clock>,
    inflight: Arc<InflightStore>,
    dispatch_tx: mpsc::Sender<QueuedDispatch>,
    pending: Mutex<HashMap<String, ()>>,
}

impl<P: WorkerPort + 'static> Executor<P> {
    #[must_use]
    pub fn new(port: Arc<P>, clock: Arc<dyn Clock>, inflight: Arc<InflightStore>) -> Self {
        Self::with_limits(port, clock, inflight, DispatchLimits::default())
    }

    #[must_use]
    pub fn with_limits(port: Arc<P>, clock: Arc<dyn Clock>, inflight: Arc<InflightStore>, limits: DispatchLimits) -> Self {
        let (dispatch_tx, dispatch_rx) = mpsc::channel(256);
        spawn_dispatcher(Arc::clone(&port), limits, dispatch_rx);
        Self { port, clock, inflight, dispatch_tx, pending: Mutex::new(HashMap::new()) }
    }

    /// Runs the request to a terminal outcome, per §4.5.3's `findByKey` state
    /// machine: adopt a matching `done` row, fail fast on a fresh `failed`/
    /// `cancelled` row, attach to a `pending` one, otherwise dispatch through the
    /// [`DispatchQueue`] and retry up to [`MAX_ATTEMPTS`] times with capped
    /// exponential backoff.
    pub async fn execute(
        &self,
        request: ExecuteRequest,
        cancel: &CancellationToken,
    ) -> Result<ExecuteOutcome, TransportError> {
        let key = request.request_key.clone();

        if let Some(row) = self.inflight.find_by_key(&key).await.map_err(|e| TransportError::ExecuteFailed(e.to_string()))? {
            match row.status {
                InflightStatus::Done if row.payload_hash.is_none() || row.payload_hash == request.payload_hash => {
                    return Ok(ExecuteOutcome { request_key: key, output: Ok(row.raw_json.unwrap_or(Value::Null)) });
                }
                InflightStatus::Pending => {
                    let mut pending = self.pending.lock().await;
                    if pending.contains_key(&key) {
                        drop(pending);
                        return self.attach_to_pending(&key, cancel).await;
                    }
                    pending.insert(key.clone(), ());
                }
                InflightStatus::Done | InflightStatus::Failed | InflightStatus::Cancelled => {
                    // A fresh attempt under the same key gets its own row below.
                }
            }
        } else {
            self.pending.lock().await.insert(key.clone(), ());
        }

        let outcome = self.dispatch_with_retry(request, cancel).await;
        self.pending.lock().await.remove(&key);
        outcome
    }

    async fn attach_to_pending(
        &self,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<ExecuteOutcome, TransportError> {
        loop {
            if cancel.is_cancelled() {
                return Err(TransportError::Aborted);
            }
            match self.port.query_status(key).await? {
                RequestStatus::Done => {
                    return Ok(ExecuteOutcome { request_key: key.to_string(), output: Ok(Value::Null) });
                }
                RequestStatus::Failed => return Err(TransportError::ExecuteFailed("attached request failed".to_string())),
                RequestStatus::Cancelled => return Err(TransportError::Aborted),
                RequestStatus::Pending | RequestStatus::Unknown => {
                    sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }

    async fn dispatch_with_retry(
        &self,
        request: ExecuteRequest,
        cancel: &CancellationToken,
    ) -> Result<ExecuteOutcome, TransportError> {
        let row_id = format!("{}:{}", request.request_key, self.clock.now_ms());
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            if cancel.is_cancelled() {
                let _ = self.port.cancel(&request.request_key).await;
                self.mark_cancelled(&row_id).await;
                return Err(TransportError::Aborted);
            }

            let started_at = self.clock.now_ms();
            self.upsert_pending(&row_id, &request, attempt, started_at).await;

            let dispatched = self.dispatch_through_queue(request.clone()).await;

            match dispatched {
                Ok(outcome) => {
                    if let Ok(json) = &outcome.output {
                        self.mark_done(&row_id, json.clone()).await;
                    } else {
                        self.mark_failed(&row_id, "worker reported a failed execution".to_string()).await;
                    }
                    return Ok(outcome);
                }
                Err(TransportError::Aborted) => {
                    self.mark_cancelled(&row_id).await;
                    return Err(TransportError::Aborted);
                }
                Err(err) if attempt >= MAX_ATTEMPTS => {
                    self.mark_failed(&row_id, err.to_string()).await;
                    return Err(err);
                }
                Err(_) => {
                    let wait = backoff_ms(attempt);
                    sleep(Duration::from_millis(wait as u64)).await;
                }
            }
        }
    }

    async fn dispatch_through_queue(&self, request: ExecuteRequest) -> Result<ExecuteOutcome, TransportError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.dispatch_tx
            .send(QueuedDispatch { request, reply: reply_tx })
            .await
            .map_err(|_| TransportError::PortDisconnected)?;
        reply_rx.await.map_err(|_| TransportError::PortDisconnected)?
    }

    async fn upsert_pending(&self, row_id: &str, request: &ExecuteRequest, attempt: u32, started_at: i64) {
        let row = InflightRow {
            id: row_id.to_string(),
            request_key: request.request_key.clone(),
            status: InflightStatus::Pending,
            lease_until_ts: started_at + ATTEMPT_TIMEOUT_MS,
            raw_result: None,
            raw_json: None,
            error: None,
            preview: None,
            created_ts: started_at,
            payload_hash: request.payload_hash.clone(),
            task_type: request.task_type.clone(),
            attempt,
            mode: request.mode.clone(),
            stage: crate::tool::Scope::Execution,
            meta: InflightMeta { job_id: request.job_id.clone(), block_id: request.block_id.clone() },
            started_at,
            attempt_deadline_ts: started_at + ATTEMPT_TIMEOUT_MS,
        };
        let _ = self.inflight.upsert(&row).await;
    }

    async fn mark_done(&self, row_id: &str, json: Value) {
        let _ = self.inflight.mark_done(row_id, json.to_string(), Some(json)).await;
    }

    async fn mark_failed(&self, row_id: &str, error: String) {
        let _ = self.inflight.mark_failed(row_id, error).await;
    }

    async fn mark_cancelled(&self, row_id: &str) {
        let _ = self.inflight.mark_cancelled(row_id).await;
    }

    /// §4.5.1 `recoverInflightRequests({limit})`: on restart, handshake with the
    /// worker and reconcile every row this instance still believes is `pending` —
    /// attach to ones the worker confirms are still running, adopt ones that
    /// finished while we were down, and mark the rest `OFFSCREEN_REQUEST_LOST`.
    pub async fn recover_inflight_requests(&self, limit: usize) -> Result<ExecuteResult, TransportError> {
        self.port.handshake().await?;
        let rows = self.inflight.list_pending(limit).await.map_err(|e| TransportError::ExecuteFailed(e.to_string()))?;

        for row in rows {
            match self.port.query_status(&row.request_key).await {
                Ok(RequestStatus::Done) => {
                    self.inflight.mark_done(&row.id, row.raw_result.clone().unwrap_or_default(), row.raw_json.clone()).await.ok();
                }
                Ok(RequestStatus::Cancelled) => {
                    self.inflight.mark_cancelled(&row.id).await.ok();
                }
                Ok(RequestStatus::Pending) => {
                    // Still genuinely in flight on the worker side; leave it for the sweeper.
                }
                Ok(RequestStatus::Unknown) | Ok(RequestStatus::Failed) | Err(_) => {
                    self.inflight
                        .mark_failed(&row.id, crate::error::ErrorCode::OffscreenRequestLost.as_str().to_string())
                        .await
                        .ok();
                }
            }
        }

        Ok(ExecuteResult::Done)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::clock::{FakeClock, SystemClock};
    use crate::kv::backend::MemoryBackend;
    use crate::transport::worker_port::ChannelWorkerPort;

    fn store() -> Arc<InflightStore> {
        Arc::new(InflightStore::new(Arc::new(MemoryBackend::new())))
    }

    #[test]
    fn backoff_doubles_then_caps() {
        assert_eq!(backoff_ms(1), 250);
        assert_eq!(backoff_ms(2), 500);
        assert_eq!(backoff_ms(3), 1000);
        assert_eq!(backoff_ms(4), 2000);
    }

    #[tokio::test]
    async fn execute_dispatches_once_and_returns_the_outcome() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);
        let port = Arc::new(ChannelWorkerPort::spawn(move |_req| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            Ok(Value::String("ok".to_string()))
        }));
        let executor = Executor::new(Arc::clone(&port), Arc::new(SystemClock), store());
        let cancel = CancellationToken::new();

        let outcome = executor
            .execute(ExecuteRequest::new("r1", "j1", "t1", "translate", Value::Null), &cancel)
            .await
            .unwrap();

        assert_eq!(outcome.output.unwrap(), Value::String("ok".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancelled_token_aborts_before_dispatch() {
        let port = Arc::new(ChannelWorkerPort::spawn(|_req| Ok(Value::Null)));
        let executor = Executor::new(port, Arc::new(SystemClock), store());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = executor.execute(ExecuteRequest::new("r1", "j1", "t1", "translate", Value::Null), &cancel).await;

        assert!(matches!(result, Err(TransportError::Aborted)));
    }

    #[tokio::test]
    async fn a_successful_dispatch_leaves_no_row_pending() {
        let port = Arc::new(ChannelWorkerPort::spawn(|_req| Ok(Value::String("ok".to_string()))));
        let inflight = store();
        let executor = Executor::new(port, Arc::new(FakeClock::new(1_000)), Arc::clone(&inflight));
        let cancel = CancellationToken::new();

        executor.execute(ExecuteRequest::new("r1", "j1", "t1", "translate", Value::Null), &cancel).await.unwrap();

        let rows = inflight.list_pending(10).await.unwrap();
        assert!(rows.is_empty(), "the row should have moved out of pending once dispatch succeeded");
    }

    #[tokio::test]
    async fn a_done_row_with_a_matching_payload_hash_is_adopted_without_redispatching() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);
        let port = Arc::new(ChannelWorkerPort::spawn(move |_req| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            Ok(Value::String("first".to_string()))
        }));
        let inflight = store();
        let executor = Executor::new(port, Arc::new(FakeClock::new(1_000)), Arc::clone(&inflight));
        let cancel = CancellationToken::new();

        let mut request = ExecuteRequest::new("r1", "j1", "t1", "translate", Value::Null);
        request.payload_hash = Some("hash-a".to_string());
        executor.execute(request.clone(), &cancel).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let outcome = executor.execute(request, &cancel).await.unwrap();
        assert_eq!(outcome.output.unwrap(), Value::String("first".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 1, "a matching payload hash should adopt the cached row instead of re-dispatching");
    }

    #[tokio::test]
    async fn recover_inflight_requests_marks_gone_rows_lost() {
        let port = Arc::new(ChannelWorkerPort::spawn(|_req| Ok(Value::Null)));
        let inflight = store();
        inflight
            .upsert(&InflightRow {
                id: "row-1".to_string(),
                request_key: "key-1".to_string(),
                status: InflightStatus::Pending,
                lease_until_ts: 10_000,
                raw_result: None,
                raw_json: None,
                error: None,
                preview: None,
                created_ts: 0,
                payload_hash: None,
                task_type: "model.turn".to_string(),
                attempt: 1,
                mode: "default".to_string(),
                stage: crate::tool::Scope::Execution,
                meta: InflightMeta { job_id: "j1".to_string(), block_id: None },
                started_at: 0,
                attempt_deadline_ts: 10_000,
            })
            .await
            .unwrap();

        let executor = Executor::new(port, Arc::new(SystemClock), Arc::clone(&inflight));
        executor.recover_inflight_requests(10).await.unwrap();

        let row = inflight.get("row-1").await.unwrap().unwrap();
        assert_eq!(row.status, InflightStatus::Failed);
        assert_eq!(row.error.as_deref(), Some("OFFSCREEN_REQUEST_LOST"));
    }
}
