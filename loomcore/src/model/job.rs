use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{AgentState, Block, BlockId, Category};
use crate::job::JobRuntime;

/// Lifecycle status of a [`Job`] (§3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Preparing,
    Planning,
    AwaitingCategories,
    Running,
    Completing,
    Done,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Whether this status is terminal — no further scheduler steps should run.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Cancelled)
    }
}

/// One translation job: the orchestration core's unit of persistence and ownership.
///
/// `Job` exclusively owns [`AgentState`]; [`JobRuntime`] (lease, retry, watchdog) is
/// exclusively owned and mutated by [`crate::job::JobRunner`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    pub tab_id: String,
    pub target_lang: String,
    pub status: JobStatus,
    #[serde(default)]
    pub pending_block_ids: Vec<BlockId>,
    #[serde(default)]
    pub blocks_by_id: HashMap<BlockId, Block>,
    #[serde(default)]
    pub completed_blocks: Vec<BlockId>,
    #[serde(default)]
    pub failed_block_ids: Vec<BlockId>,
    #[serde(default)]
    pub selected_categories: Vec<Category>,
    pub agent_state: AgentState,
    pub runtime: JobRuntime,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Job {
    /// Construct a brand-new job in `preparing` status.
    #[must_use]
    pub fn new(job_id: impl Into<String>, tab_id: impl Into<String>, target_lang: impl Into<String>, now_ms: i64) -> Self {
        Self {
            job_id: job_id.into(),
            tab_id: tab_id.into(),
            target_lang: target_lang.into(),
            status: JobStatus::Preparing,
            pending_block_ids: Vec::new(),
            blocks_by_id: HashMap::new(),
            completed_blocks: Vec::new(),
            failed_block_ids: Vec::new(),
            selected_categories: Vec::new(),
            agent_state: AgentState::default(),
            runtime: JobRuntime::default(),
            created_at: now_ms,
            updated_at: now_ms,
        }
    }

    /// The explicit external action that ends the `awaiting_categories` idle state
    /// (§4.6 point 8): the user has confirmed (or edited) the category selection, so
    /// the job can start execution. No-op, returning `false`, outside that status.
    pub fn select_categories(&mut self, categories: Vec<Category>) -> bool {
        if self.status != JobStatus::AwaitingCategories {
            return false;
        }
        self.selected_categories = categories;
        self.status = JobStatus::Running;
        true
    }

    /// The `progressKey` tuple the job-runner watchdog compares turn to turn (§4.6).
    #[must_use]
    pub fn progress_key(&self) -> String {
        format!(
            "{}:{}:{}:{}:{:?}",
            self.completed_blocks.len(),
            self.failed_block_ids.len(),
            self.pending_block_ids.len(),
            self.agent_state.tool_execution_trace().last().map_or(0, |r| r.seq),
            self.status,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses_are_exactly_done_failed_cancelled() {
        assert!(JobStatus::Done.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(!JobStatus::AwaitingCategories.is_terminal());
    }

    #[test]
    fn select_categories_moves_awaiting_categories_into_running() {
        let mut job = Job::new("job-1", "tab-1", "fr", 0);
        job.status = JobStatus::AwaitingCategories;
        assert!(job.select_categories(vec![Category::MainContent]));
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.selected_categories, vec![Category::MainContent]);
    }

    #[test]
    fn select_categories_is_a_no_op_outside_awaiting_categories() {
        let mut job = Job::new("job-1", "tab-1", "fr", 0);
        job.status = JobStatus::Planning;
        assert!(!job.select_categories(vec![Category::MainContent]));
        assert_eq!(job.status, JobStatus::Planning);
    }

    #[test]
    fn progress_key_changes_when_pending_set_shrinks() {
        let mut job = Job::new("job-1", "tab-1", "fr", 0);
        job.pending_block_ids = vec!["a".into(), "b".into()];
        let before = job.progress_key();
        job.pending_block_ids.pop();
        assert_ne!(before, job.progress_key());
    }
}
