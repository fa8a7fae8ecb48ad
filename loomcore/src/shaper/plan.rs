//! Deterministic initial plan/pipeline, used both as the fallback pipeline
//! (§4.4.6 step 3) and as the base a model's `agent.plan.set_pipeline` call overwrites.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Fast,
    Balanced,
    Thorough,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QcLevel {
    Minimal,
    Standard,
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Qc {
    pub level: QcLevel,
}

/// A translation plan/pipeline: strategy, whether to build a glossary, and the
/// proofreading QC level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub strategy: Strategy,
    pub glossary: bool,
    pub qc: Qc,
}

impl Default for Plan {
    fn default() -> Self {
        Self {
            strategy: Strategy::Balanced,
            glossary: true,
            qc: Qc { level: QcLevel::Standard },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_plan_matches_the_fallback_pipeline_defaults() {
        let plan = Plan::default();
        assert_eq!(plan.strategy, Strategy::Balanced);
        assert!(plan.glossary);
        assert_eq!(plan.qc.level, QcLevel::Standard);
    }
}
