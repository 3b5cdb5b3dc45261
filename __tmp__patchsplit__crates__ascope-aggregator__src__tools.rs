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
    /// between the call and its result.
    pub fn record_result(
        &mut self,
        tool_use_id: &str,
        is_error: bool,
        resolved_at: DateTime<Utc>,
        reported_duration_ms: Option<u64>,
    ) {
        let pending = self.pending.remove(tool_use_id);
        let name = pending
            .as_ref()
            .map(|p| p.name.clone())
            .unwrap_or_else(|| "unknown".to_string());
        let duration_ms = reported_duration_ms.unwrap_or_else(|| {
            pending
                .map(|p| (resolved_at - p.started_at).num_milliseconds().max(0) as u64)
                .unwrap_or(0)
        });

        let stats = self.per_tool.entry(name).or_default();
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_then_resolved_updates_stats_and_clears_pending() {
        let mut analytics = ToolAnalytics::default();
        let t0 = Utc::now();
        analytics.record_call("t1", "Bash", t0);
        assert_eq!(analytics.pending_count(), 1);

        analytics.record_result("t1", false, t0 + chrono::Duration::milliseconds(250), None);
        assert_eq!(analytics.pending_count(), 0);
        let stats = &analytics.per_tool["Bash"];
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.success, 1);
        assert_eq!(stats.failure, 0);
        assert_eq!(stats.total_duration_ms, 250);
    }

    #[test]
    fn error_result_counts_as_failure() {
        let mut analytics = ToolAnalytics::default();
        let t0 = Utc::now();
        analytics.record_call("t1", "Bash", t0);
        analytics.record_result("t1", true, t0, Some(10));
        assert_eq!(analytics.per_tool["Bash"].failure, 1);
        assert_eq!(analytics.per_tool["Bash"].success, 0);
    }

    #[test]
    fn reported_duration_overrides_wall_clock_gap() {
        let mut analytics = ToolAnalytics::default();
        let t0 = Utc::now();
        analytics.record_call("t1", "Bash", t0);
        analytics.record_result("t1", false, t0 + chrono::Duration::seconds(5), Some(42));
        assert_eq!(analytics.per_tool["Bash"].total_duration_ms, 42);
    }

    #[test]
    fn orphan_result_without_matching_call_still_counts() {
        let mut analytics = ToolAnalytics::default();
        analytics.record_result("missing", false, Utc::now(), Some(5));
        assert_eq!(analytics.per_tool["unknown"].completed, 1);
    }
}


