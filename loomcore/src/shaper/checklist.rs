//! Ordered checklist of named stages, updated by `agent.update_checklist` and read by
//! UI-facing status projections (§4.7).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecklistStage {
    Plan,
    ExecuteBatches,
    Proofread,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistEntry {
    pub stage: ChecklistStage,
    pub done: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checklist {
    pub entries: Vec<ChecklistEntry>,
}

impl Default for Checklist {
    fn default() -> Self {
        Self {
            entries: vec![
                ChecklistEntry { stage: ChecklistStage::Plan, done: false },
                ChecklistEntry { stage: ChecklistStage::ExecuteBatches, done: false },
                ChecklistEntry { stage: ChecklistStage::Proofread, done: false },
            ],
        }
    }
}

impl Checklist {
    pub fn mark_done(&mut self, stage: ChecklistStage) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.stage == stage) {
            entry.done = true;
        }
    }

    #[must_use]
    pub fn is_done(&self, stage: ChecklistStage) -> bool {
        self.entries.iter().any(|e| e.stage == stage && e.done)
    }
}
