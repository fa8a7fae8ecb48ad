//! Shared data-model types: [`Job`], its embedded [`AgentState`], and the small value
//! types referenced across every component (block identifiers, categories, reports).
//!
//! `Job` is the single unit of persistence — every component mutates it through the
//! owner-exclusive rules in the design notes and then hands it back to
//! [`crate::kv::JobStore::persist`].

pub mod agent_state;
mod job;
mod report;

pub use agent_state::{AgentState, PlanningMarkers, RunnerWarning};
pub use job::{Job, JobStatus};
pub use report::{Report, ReportLevel};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Opaque identifier for one translatable content block on a page.
pub type BlockId = String;

/// A content block awaiting translation, as handed to the agent by the content side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    /// Free-text hint about the block's DOM role (tag name, class list, ARIA role).
    #[serde(default)]
    pub hint: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

/// A coarse content category used to partition translation strategy per block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    MainContent,
    Headings,
    Navigation,
    Code,
    Tables,
    UiControls,
}

/// `blockId -> Category` derived either by the model or by the deterministic
/// fallback shaper (see [`crate::shaper::taxonomy`]).
pub type CategoryMapping = HashMap<BlockId, Category>;
