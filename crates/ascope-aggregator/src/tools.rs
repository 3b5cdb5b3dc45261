use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingCall {
    pub name: String,
    pub started_at: DateTime<Utc>,
}

/// Per-tool-name rollups plus the set of calls issued but not yet resolved.
///
/// `pending` is intentionally excluded from the round-trip invariant other
/// aggregator state honors: a snapshot restored mid-flight should not claim a
/// tool call is still outstanding when the process that would resolve it is
/// gone, so restore starts with an empty pending map.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolAnalytics {
    #[serde(skip)]
    pub pending: BTreeMap<String, PendingCall>,
    pub per_tool: BTreeMap<String, ToolStats>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolStats {
    pub completed: u64,
    pub success: u64,
    pub failure: u64,
    pub total_duration_ms: u64,
}

impl ToolStats {
    pub fn average_duration_ms(&self) -> f64 {
        if self.completed == 0 {
            0.0
        } else {
            self.total_duration_ms as f64 / self.completed as f64
        }
    }
}

impl ToolAnalytics {
    pub fn record_call(&mut self, id: &str, name: &str, started_at: DateTime<Utc>) {
        self.pending.insert(
            id.to_string(),
            PendingCall {
                name: name.to_string(),
                started_at,
            },
        );
    }

    /// Resolve a pending call. `duration_ms` is used when the provider
    /// reports one directly; otherwise it is derived from the wall-clock gap
    /// between the call and its result. A result with no matching pending
    /// call (unknown `tool_use_id`) is ignored for analytics entirely: it
    /// contributes nothing to `per_tool`, not even under an `"unknown"` row.
    pub fn record_result(
        &mut self,
        tool_use_id: &str,
        is_error: bool,
        resolved_at: DateTime<Utc>,
        reported_duration_ms: Option<u64>,
    ) {
        let Some(pending) = self.pending.remove(tool_use_id) else {
            return;
        };
        let duration_ms = reported_duration_ms
            .unwrap_or_else(|| (resolved_at - pending.started_at).num_milliseconds().max(0) as u64);

        let stats = self.per_tool.entry(pending.name).or_default();
        stats.completed += 1;
        if is_error {
            stats.failure += 1;
        } else {
            stats.success += 1;
        }
        stats.total_duration_ms += duration_ms;
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn total_completed(&self) -> u64 {
        self.per_tool.values().map(|s| s.completed).sum()
    }

    pub fn reset(&mut self) {
        self.pending.clear();
        self.per_tool.clear();
    }
}
