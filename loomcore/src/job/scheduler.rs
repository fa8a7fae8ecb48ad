//! `JobRunner::step`: one bounded scheduler decision per call (§4.6).

use std::sync::Arc;

use crate::agent::{AgentRunner, Phase};
use crate::clock::Clock;
use crate::model::{Job, JobStatus};

use super::metrics::{MetricsSink, StepMetrics};
use super::retry_policy::{Disposition, RetryPolicy};

const DEFAULT_LEASE_MS: i64 = 30_000;
const DEFAULT_WATCHDOG_MS: i64 = 120_000;

/// Outcome of one [`JobRunner::step`] call.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepOutcome {
    pub ok: bool,
    pub terminal: bool,
    pub has_more_work: bool,
    pub requeued: bool,
}

pub struct JobRunner {
    pub runner: AgentRunner,
    pub clock: Arc<dyn Clock>,
    pub metrics: Arc<dyn MetricsSink>,
    pub owner_instance_id: String,
}

impl JobRunner {
    #[must_use]
    pub fn new(runner: AgentRunner, clock: Arc<dyn Clock>, metrics: Arc<dyn MetricsSink>, owner_instance_id: impl Into<String>) -> Self {
        Self { runner, clock, metrics, owner_instance_id: owner_instance_id.into() }
    }

    /// Advance `job` by one bounded step (§4.6 points 1-9). The caller is
    /// responsible for reload-before/persist-after around this call.
    pub async fn step(&self, job: &mut Job) -> StepOutcome {
        let started = self.clock.now_ms();

        if job.status.is_terminal() {
            job.runtime.release_lease();
            return StepOutcome { ok: true, terminal: true, ..Default::default() };
        }

        let now = self.clock.now_ms();
        let progress_key = job.progress_key();
        let progressed = job.runtime.observe_progress(&progress_key, now);
        if !progressed && now.saturating_sub(job.runtime.watchdog_last_progress_ts) > DEFAULT_WATCHDOG_MS {
            job.status = JobStatus::Failed;
            job.runtime.last_error = Some("NO_PROGRESS_WATCHDOG".to_string());
            job.runtime.release_lease();
            self.record(started, 1, 0, 0, 1);
            return StepOutcome { ok: false, terminal: true, ..Default::default() };
        }

        if !job.runtime.lease_held(now) {
            job.runtime.acquire_lease(self.owner_instance_id.clone(), now, DEFAULT_LEASE_MS);
        }

        let outcome = self.dispatch(job).await;
        job.updated_at = self.clock.now_ms();
        self.record(started, 1, usize::from(outcome.has_more_work), usize::from(outcome.requeued), usize::from(!outcome.ok));
        outcome
    }

    async fn dispatch(&self, job: &mut Job) -> StepOutcome {
        let phase = match job.status {
            // IDLE: no lease held, no agent invoked. The only way out is the
            // explicit external `select_categories` action (§4.6 point 8).
            JobStatus::AwaitingCategories => {
                job.runtime.release_lease();
                return StepOutcome { ok: true, has_more_work: false, ..Default::default() };
            }
            JobStatus::Planning => Phase::Planning,
            JobStatus::Running | JobStatus::Preparing => Phase::Execution,
            JobStatus::Completing => Phase::Proofreading,
            JobStatus::Done | JobStatus::Failed | JobStatus::Cancelled => {
                return StepOutcome { ok: true, terminal: true, ..Default::default() };
            }
        };

        match self.runner.advance(&mut job.agent_state, phase).await {
            Ok(done) => {
                if done {
                    self.advance_status(job);
                }
                StepOutcome { ok: true, has_more_work: !done, ..Default::default() }
            }
            Err(err) => self.recover(job, phase, err).await,
        }
    }

    fn advance_status(&self, job: &mut Job) {
        job.status = match job.status {
            // Planning only finishes once every marker is set, which always
            // includes `ask_user_categories_by_tool` — the job must wait, idle,
            // for the user's category selection before execution can start.
            JobStatus::Planning => JobStatus::AwaitingCategories,
            JobStatus::Preparing => JobStatus::Running,
            JobStatus::Running => JobStatus::Completing,
            JobStatus::Completing => JobStatus::Done,
            other => other,
        };
    }

    async fn recover(&self, job: &mut Job, phase: Phase, err: crate::agent::AgentError) -> StepOutcome {
        use crate::agent::AgentError;
        use crate::error::HasErrorCode;

        if phase == Phase::Planning
            && matches!(err, AgentError::LoopGuardStop { .. } | AgentError::NoProgress { .. })
        {
            job.runtime.last_error = Some(err.to_string());
            return match crate::agent::fallback::apply(&mut job.agent_state, &job.blocks_by_id, self.clock.clone()).await {
                Ok(()) => {
                    self.advance_status(job);
                    StepOutcome { ok: true, has_more_work: false, ..Default::default() }
                }
                Err(fallback_err) => {
                    job.status = JobStatus::Failed;
                    job.runtime.last_error = Some(fallback_err.to_string());
                    job.runtime.release_lease();
                    StepOutcome { ok: false, terminal: true, ..Default::default() }
                }
            };
        }

        let code = err.code();
        job.runtime.last_error = Some(err.to_string());

        match RetryPolicy::classify(code) {
            Disposition::Retry => match RetryPolicy::backoff_ms(job.runtime.retry_count) {
                Some(_backoff) => {
                    job.runtime.retry_count += 1;
                    job.runtime.release_lease();
                    StepOutcome { ok: false, requeued: true, ..Default::default() }
                }
                None => {
                    job.status = JobStatus::Failed;
                    job.runtime.release_lease();
                    StepOutcome { ok: false, terminal: true, ..Default::default() }
                }
            },
            Disposition::Fatal => {
                job.status = JobStatus::Failed;
                job.runtime.release_lease();
                StepOutcome { ok: false, terminal: true, ..Default::default() }
            }
        }
    }

    fn record(&self, started: i64, considered: usize, advanced: usize, retried: usize, failed: usize) {
        self.metrics.record_step(StepMetrics {
            jobs_considered: considered,
            jobs_advanced: advanced,
            jobs_retried: retried,
            jobs_failed: failed,
            duration_ms: self.clock.now_ms() - started,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::model_client::test_support::ScriptedModel;
    use crate::agent::AgentRunnerConfig;
    use crate::clock::FakeClock;
    use crate::job::metrics::TracingMetricsSink;
    use crate::tool::ToolRegistry;

    fn runner() -> JobRunner {
        let clock = Arc::new(FakeClock::new(0));
        let agent_runner = AgentRunner::new(
            Arc::new(ToolRegistry::builder().build()),
            Arc::new(ScriptedModel::new(vec![])),
            clock.clone(),
            AgentRunnerConfig::default(),
        );
        JobRunner::new(agent_runner, clock, Arc::new(TracingMetricsSink), "runner-1")
    }

    #[tokio::test]
    async fn terminal_job_releases_its_lease_and_reports_terminal() {
        let runner = runner();
        let mut job = Job::new("j1", "tab-1", "fr", 0);
        job.status = JobStatus::Done;
        let outcome = runner.step(&mut job).await;
        assert!(outcome.terminal);
        assert!(job.runtime.lease_until_ts.is_none());
    }

    #[tokio::test]
    async fn planning_guard_stop_triggers_the_forced_fallback_instead_of_retrying() {
        use crate::agent::model_client::{ModelOutputItem, ModelTurnResponse};
        use crate::model::Block;

        let clock = Arc::new(FakeClock::new(0));
        let talk_only = || ModelTurnResponse { response_id: "r".to_string(), output: vec![ModelOutputItem::Message { content: "thinking".to_string() }] };
        let agent_runner = AgentRunner::new(
            Arc::new(ToolRegistry::builder().build()),
            Arc::new(ScriptedModel::new(vec![talk_only(), talk_only(), talk_only(), talk_only()])),
            clock.clone(),
            AgentRunnerConfig::default(),
        );
        let runner = JobRunner::new(agent_runner, clock, Arc::new(TracingMetricsSink), "runner-1");

        let mut job = Job::new("j1", "tab-1", "fr", 0);
        job.status = JobStatus::Planning;
        job.blocks_by_id.insert("b1".to_string(), Block { id: "b1".into(), hint: Some("prose".into()), text: None });

        let outcome = runner.step(&mut job).await;
        assert!(outcome.ok);
        assert!(job.agent_state.planning_markers.is_complete());
        assert_eq!(job.status, JobStatus::AwaitingCategories);
    }

    #[tokio::test]
    async fn awaiting_categories_is_idle_and_holds_no_lease() {
        let runner = runner();
        let mut job = Job::new("j1", "tab-1", "fr", 0);
        job.status = JobStatus::AwaitingCategories;
        job.agent_state.checklist.mark_done(crate::shaper::ChecklistStage::Plan);
        job.agent_state.planning_markers.ask_user_categories_by_tool = true;
        job.agent_state.planning_markers.preanalysis_read_by_tool = true;
        job.agent_state.planning_markers.taxonomy_set_by_tool = true;
        job.agent_state.planning_markers.pipeline_set_by_tool = true;
        job.agent_state.planning_markers.finish_analysis_requested_by_tool = true;
        job.agent_state.planning_markers.finish_analysis_ok = true;

        let outcome = runner.step(&mut job).await;
        assert!(outcome.ok);
        assert!(!outcome.has_more_work);
        assert_eq!(job.status, JobStatus::AwaitingCategories);
        assert!(job.runtime.lease_until_ts.is_none());
    }

    #[tokio::test]
    async fn select_categories_is_the_only_way_out_of_awaiting_categories() {
        let runner = runner();
        let mut job = Job::new("j1", "tab-1", "fr", 0);
        job.status = JobStatus::AwaitingCategories;
        job.agent_state.checklist.mark_done(crate::shaper::ChecklistStage::ExecuteBatches);

        assert!(job.select_categories(vec![crate::model::Category::MainContent]));
        let outcome = runner.step(&mut job).await;
        assert!(outcome.ok);
        assert_eq!(job.status, JobStatus::Completing);
    }
}
