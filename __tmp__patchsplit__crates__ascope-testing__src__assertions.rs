//! Assertions over aggregator and snapshot state, for tests that exercise
//! the reader/aggregator pipeline directly rather than inspecting raw JSON.

use ascope_aggregator::Aggregator;
use ascope_snapshot::StoredSnapshot;
use std::collections::HashMap;

/// Assert the aggregator recorded exactly `expected` tool calls (resolved or
/// still pending).
pub fn assert_tool_call_count(aggregator: &Aggregator, expected: usize) {
    let resolved = aggregator.tools.total_completed() as usize;
    let pending = aggregator.tools.pending_count();
    let total = resolved + pending;
    assert_eq!(total, expected, "expected {expected} tool calls, got {total} ({resolved} resolved, {pending} pending)");
}

/// Assert the aggregator saw no errored tool results.
pub fn assert_no_errors(aggregator: &Aggregator) {
    assert_eq!(aggregator.error_count, 0, "expected no tool errors, got {}", aggregator.error_count);
}

/// Assert total tokens recorded across all models matches `expected`.
pub fn assert_total_tokens(aggregator: &Aggregator, expected: u64) {
    let total: u64 = aggregator.tokens.per_model.values().map(|m| m.total_tokens()).sum();
    assert_eq!(total, expected, "expected {expected} total tokens, got {total}");
}

/// Assert a snapshot's `file_offsets` map carries an entry for `path` at
/// least `min_offset` bytes in, i.e. it would resume past the fixture's
/// current content rather than replaying from the start.
pub fn assert_offset_past(snapshot: &StoredSnapshot, path: &str, min_offset: u64) {
    let offset = snapshot.file_offsets.get(path).copied().unwrap_or(0);
    assert!(offset >= min_offset, "expected offset for {path} >= {min_offset}, got {offset}");
}

/// Assert `state` round-tripped through the store carries the given
/// top-level integer fields, without needing the aggregator crate in scope
/// to deserialize the whole blob.
pub fn assert_state_fields(state: &serde_json::Value, expected: &HashMap<&str, i64>) {
    for (key, value) in expected {
        let actual = state.get(key).and_then(|v| v.as_i64());
        assert_eq!(actual, Some(*value), "expected state.{key} == {value}, got {actual:?}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ascope_types::{Block, Content, Event, Message, Role};
    use chrono::{DateTime, Utc};

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn tool_cycle_aggregator() -> Aggregator {
        let mut agg = Aggregator::new("claude_code");
        agg.process_event(&Event::Assistant {
            message: Message {
                role: Role::Assistant,
                content: Content::Blocks(vec![Block::ToolUse {
                    id: "call-1".into(),
                    name: "Bash".into(),
                    input: serde_json::json!({}),
                }]),
                usage: None,
                model: Some("claude-sonnet-4-5".into()),
                permission_mode: None,
            },
            uuid: Some("u1".into()),
            parent_uuid: None,
            timestamp: ts("2026-01-01T00:00:00Z"),
        });
        agg.process_event(&Event::User {
            message: Message {
                role: Role::User,
                content: Content::Blocks(vec![Block::ToolResult {
                    tool_use_id: "call-1".into(),
                    content: Content::Text("ok".into()),
                    is_error: false,
                    duration_ms: None,
                }]),
                usage: None,
                model: None,
                permission_mode: None,
            },
            uuid: Some("u2".into()),
            parent_uuid: Some("u1".into()),
            timestamp: ts("2026-01-01T00:00:01Z"),
        });
        agg
    }

    #[test]
    fn tool_call_count_matches_after_one_cycle() {
        let agg = tool_cycle_aggregator();
        assert_tool_call_count(&agg, 1);
        assert_no_errors(&agg);
    }
}


