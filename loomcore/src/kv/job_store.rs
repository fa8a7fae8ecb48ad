//! `JobStore`: the single write path for [`crate::model::Job`] (§3.2).

use std::sync::Arc;

use super::backend::KvBackend;
use super::errors::KvError;
use crate::model::Job;

const PREFIX: &str = "job/";

pub struct JobStore {
    backend: Arc<dyn KvBackend>,
}

impl JobStore {
    #[must_use]
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self { backend }
    }

    pub async fn persist(&self, job: &Job) -> Result<(), KvError> {
        let value = serde_json::to_value(job)?;
        self.backend.put(&format!("{PREFIX}{}", job.job_id), value).await
    }

    pub async fn load(&self, id: &str) -> Result<Option<Job>, KvError> {
        let Some(value) = self.backend.get(&format!("{PREFIX}{id}")).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_value(value)?))
    }

    pub async fn delete(&self, id: &str) -> Result<(), KvError> {
        self.backend.delete(&format!("{PREFIX}{id}")).await
    }

    /// Every non-terminal job, for the scheduler's ready queue (§4.6).
    pub async fn list_active(&self) -> Result<Vec<Job>, KvError> {
        let rows = self.backend.scan_prefix(PREFIX).await?;
        rows.into_iter()
            .map(|(_, v)| serde_json::from_value::<Job>(v))
            .collect::<Result<Vec<_>, _>>()
            .map(|jobs| jobs.into_iter().filter(|j| !j.status.is_terminal()).collect())
            .map_err(KvError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryBackend;

    #[tokio::test]
    async fn persisted_job_round_trips() {
        let store = JobStore::new(Arc::new(MemoryBackend::new()));
        let job = Job::new("j1", "tab-1", "fr", 0);
        store.persist(&job).await.unwrap();
        let loaded = store.load("j1").await.unwrap().unwrap();
        assert_eq!(loaded.job_id, job.job_id);
    }

    #[tokio::test]
    async fn list_active_excludes_terminal_jobs() {
        let store = JobStore::new(Arc::new(MemoryBackend::new()));
        let active = Job::new("active", "tab-1", "fr", 0);
        let mut done = Job::new("done", "tab-1", "fr", 0);
        done.status = crate::model::JobStatus::Done;
        store.persist(&active).await.unwrap();
        store.persist(&done).await.unwrap();

        let jobs = store.list_active().await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].job_id, "active");
    }
}
