use serde::{Deserialize, Serialize};

/// Severity of an [`crate::model::Report`] entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportLevel {
    Info,
    Warning,
    Error,
}

/// An append-only audit note, recorded by `agent.append_report` and surfaced verbatim
/// in `agentState.reports` / `audits` (§4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub ts: i64,
    pub level: ReportLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl Report {
    #[must_use]
    pub fn new(ts: i64, level: ReportLevel, message: impl Into<String>) -> Self {
        Self {
            ts,
            level,
            message: message.into(),
            code: None,
        }
    }

    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}
