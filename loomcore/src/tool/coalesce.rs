//! Debounced coalescing of high-frequency tool calls that share a key (§4.2.4).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `(toolName, keyValue)` — the coalescing unit.
pub type EntryKey = (String, String);

/// Maximum number of `callId`s retained per coalescing entry (§3.1).
pub const MAX_CALL_IDS: usize = 400;

/// A pending, not-yet-flushed coalesced invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoalescedEntry {
    pub started_at: i64,
    pub last_update_at: i64,
    pub coalesced_count: u32,
    pub latest_args: Value,
    pub latest_call_id: String,
    pub call_ids: Vec<String>,
    pub debounce_ms: u64,
}

impl CoalescedEntry {
    #[must_use]
    pub fn new(now_ms: i64, call_id: impl Into<String>, args: Value, debounce_ms: u64) -> Self {
        Self {
            started_at: now_ms,
            last_update_at: now_ms,
            coalesced_count: 1,
            latest_args: args,
            latest_call_id: call_id.into(),
            call_ids: vec![call_id.into()],
            debounce_ms,
        }
    }

    /// Merge another accepted call into this entry.
    pub fn accept(&mut self, now_ms: i64, call_id: impl Into<String>, args: Value) {
        self.last_update_at = now_ms;
        self.coalesced_count += 1;
        self.latest_args = args;
        self.latest_call_id = call_id.into();
        if self.call_ids.len() < MAX_CALL_IDS {
            self.call_ids.push(self.latest_call_id.clone());
        }
    }

    /// Whether this entry is due to flush given the current time.
    #[must_use]
    pub fn is_due(&self, now_ms: i64) -> bool {
        now_ms.saturating_sub(self.last_update_at) as u64 >= self.debounce_ms
    }
}
