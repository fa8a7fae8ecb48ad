//! Agent runner: the three-phase (planning/execution/proofreading) tool-calling
//! loop that drives one translation job (§4.4).
//!
//! Each phase shares the [`skeleton`] loop but differs in its completion predicate,
//! its tool scope, and its model instructions — see [`planning`], [`execution`], and
//! [`proofreading`].

pub mod config;
pub mod error;
pub mod execution;
pub mod fallback;
pub mod loop_record;
pub mod mismatch;
pub mod model_client;
pub mod planning;
pub mod proofreading;
pub mod recovery;
pub mod remote_model_client;
pub mod sanitize;
pub mod skeleton;

pub use config::AgentRunnerConfig;
pub use error::AgentError;
pub use loop_record::{LoopRecord, LoopStatus};
pub use model_client::{ModelClient, ModelClientError, ModelInputItem, ModelOutputItem, ModelTurnRequest, ModelTurnResponse};
pub use remote_model_client::RemoteModelClient;

use std::sync::Arc;

use crate::clock::Clock;
use crate::model::AgentState;
use crate::tool::{ToolExecutionEngine, ToolRegistry};

/// Which phase the runner should advance on its next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Planning,
    Execution,
    Proofreading,
}

/// Ties the three phase drivers to a shared tool registry, execution engine, and
/// model client. One [`AgentRunner`] is constructed per job tick by the job runner
/// (§4.6); it holds no state of its own beyond its collaborators.
pub struct AgentRunner {
    pub registry: Arc<ToolRegistry>,
    pub engine: ToolExecutionEngine,
    pub model: Arc<dyn ModelClient>,
    pub clock: Arc<dyn Clock>,
    pub config: AgentRunnerConfig,
}

impl AgentRunner {
    #[must_use]
    pub fn new(registry: Arc<ToolRegistry>, model: Arc<dyn ModelClient>, clock: Arc<dyn Clock>, config: AgentRunnerConfig) -> Self {
        let engine = ToolExecutionEngine::new(registry.clone(), clock.clone());
        Self { registry, engine, model, clock, config }
    }

    /// Advance whichever phase `phase` names by one tick (up to
    /// `config.max_iterations_per_tick` loop iterations), mutating `state` in place.
    /// Returns whether that phase reports itself complete.
    pub async fn advance(&self, state: &mut AgentState, phase: Phase) -> Result<bool, AgentError> {
        let config = self.config.normalized();
        match phase {
            Phase::Planning => planning::run_tick(state, self.model.as_ref(), &self.registry, &self.engine, self.clock.as_ref(), &config).await,
            Phase::Execution => execution::run_tick(state, self.model.as_ref(), &self.registry, &self.engine, self.clock.as_ref(), &config).await,
            Phase::Proofreading => proofreading::run_tick(state, self.model.as_ref(), &self.registry, &self.engine, self.clock.as_ref(), &config).await,
        }
    }
}
