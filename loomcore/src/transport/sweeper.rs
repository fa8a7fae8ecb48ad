//! Periodic pass over abandoned in-flight rows: a request whose lease expired
//! without a `mark_done`/`mark_failed`/`mark_cancelled` call either gets adopted
//! (the worker actually finished and a status query proves it) or is failed so
//! downstream job steps stop waiting on it forever (§4.5.4).

use std::sync::Arc;

use crate::clock::Clock;
use crate::kv::errors::KvError;
use crate::kv::inflight_store::{InflightStatus, InflightStore};

use super::worker_port::{RequestStatus, WorkerPort};

pub struct Sweeper<P> {
    inflight: Arc<InflightStore>,
    port: Arc<P>,
    clock: Arc<dyn Clock>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub adopted: usize,
    pub failed: usize,
}

impl<P: WorkerPort> Sweeper<P> {
    #[must_use]
    pub fn new(inflight: Arc<InflightStore>, port: Arc<P>, clock: Arc<dyn Clock>) -> Self {
        Self { inflight, port, clock }
    }

    /// Sweeps every row whose lease has already expired. Rows the worker reports
    /// as still pending are left alone for the next sweep.
    pub async fn sweep_once(&self) -> Result<SweepReport, KvError> {
        let now = self.clock.now_ms();
        let expired = self.inflight.list_expired(now).await?;
        let mut report = SweepReport::default();

        for row in expired {
            match self.port.query_status(&row.request_key).await {
                Ok(RequestStatus::Done) => {
                    self.inflight.mark_done(&row.id, row.raw_result.clone().unwrap_or_default(), row.raw_json.clone()).await?;
                    report.adopted += 1;
                }
                Ok(RequestStatus::Cancelled) => {
                    self.inflight.mark_cancelled(&row.id).await?;
                    report.failed += 1;
                }
                Ok(RequestStatus::Pending) => {}
                Ok(RequestStatus::Unknown) | Ok(RequestStatus::Failed) | Err(_) => {
                    self.inflight.mark_failed(&row.id, "lease expired with no worker-side record".to_string()).await?;
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::clock::FakeClock;
    use crate::kv::backend::MemoryBackend;
    use crate::kv::inflight_store::{InflightMeta, InflightRow};
    use crate::tool::Scope;
    use crate::transport::worker_port::ChannelWorkerPort;

    fn expired_row(id: &str) -> InflightRow {
        InflightRow {
            id: id.to_string(),
            request_key: format!("key-{id}"),
            status: InflightStatus::Pending,
            lease_until_ts: 0,
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
            attempt_deadline_ts: 0,
        }
    }

    #[tokio::test]
    async fn unknown_status_fails_the_abandoned_row() {
        let inflight = Arc::new(InflightStore::new(Arc::new(MemoryBackend::new())));
        inflight.upsert(&expired_row("r1")).await.unwrap();
        let port = Arc::new(ChannelWorkerPort::spawn(|_| Ok(Value::Null)));
        let clock = Arc::new(FakeClock::new(10_000));

        let sweeper = Sweeper::new(Arc::clone(&inflight), port, clock);
        let report = sweeper.sweep_once().await.unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.adopted, 0);
        let row = inflight.get("r1").await.unwrap().unwrap();
        assert_eq!(row.status, InflightStatus::Failed);
    }

    #[tokio::test]
    async fn fresh_lease_is_left_untouched() {
        let inflight = Arc::new(InflightStore::new(Arc::new(MemoryBackend::new())));
        let mut row = expired_row("r1");
        row.lease_until_ts = 99_999;
        inflight.upsert(&row).await.unwrap();
        let port = Arc::new(ChannelWorkerPort::spawn(|_| Ok(Value::Null)));
        let clock = Arc::new(FakeClock::new(10_000));

        let sweeper = Sweeper::new(Arc::clone(&inflight), port, clock);
        let report = sweeper.sweep_once().await.unwrap();

        assert_eq!(report, SweepReport::default());
    }
}
