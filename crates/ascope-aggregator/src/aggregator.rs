use crate::context::{is_system_reminder, ContextAttribution, ContextBucket};
use crate::latency::LatencyLog;
use crate::plan::PlanState;
use crate::tasks::TaskBoard;
use crate::timeline::{NoiseLevel, Timeline};
use crate::tokens::TokenState;
use crate::tools::ToolAnalytics;
use crate::truncation::contains_truncation_marker;
use ascope_types::{Block, Content, Event};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// Bound on the aggregator's own event-dedup set. At this size the oldest
/// quarter is evicted in one pass rather than trimming one entry per insert,
/// matching the eviction rule the two bundled producers' incremental readers
/// rely on when they overlap a re-read across a restart.
pub const MAX_SEEN_HASHES: usize = 10_000;

/// Insertion-ordered, bounded set of event identities already folded into
/// this aggregator. Plain `uuid` identity when the producer supplies one;
/// a content digest otherwise (observed with the Codex adapter, whose
/// events never carry a `uuid`).
#[derive(Debug, Clone, Default)]
struct SeenHashes {
    set: HashSet<String>,
    order: VecDeque<String>,
}

impl SeenHashes {
    /// Returns `true` if this is the first time `key` has been seen.
    fn insert(&mut self, key: String) -> bool {
        if !self.set.insert(key.clone()) {
            return false;
        }
        self.order.push_back(key);
        if self.order.len() > MAX_SEEN_HASHES {
            let evict = self.order.len() / 4;
            for _ in 0..evict {
                if let Some(oldest) = self.order.pop_front() {
                    self.set.remove(&oldest);
                }
            }
        }
        true
    }

    fn clear(&mut self) {
        self.set.clear();
        self.order.clear();
    }
}

/// Stable dedup identity for an event: its `uuid` when the producer supplies
/// one, else a digest of the serialized event (kind, timestamp, and payload
/// are all captured by serializing the whole value).
fn dedup_key(event: &Event) -> String {
    match event.uuid() {
        Some(uuid) => uuid.to_string(),
        None => {
            use std::hash::{Hash, Hasher};
            let mut hasher = std::collections::hash_map::DefaultHasher::new();
            serde_json::to_string(event).unwrap_or_default().hash(&mut hasher);
            format!("content:{:x}", hasher.finish())
        }
    }
}

/// Pure incremental state machine: consumes one [`Event`] at a time and
/// folds it into running session metrics. Holds no I/O handles of its own;
/// the monitor owns the watch loop and feeds events in here as they arrive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Aggregator {
    pub provider_id: String,
    pub event_count: u64,
    pub turn_count: u64,
    pub error_count: u64,
    pub active_model: Option<String>,
    pub tokens: TokenState,
    pub tools: ToolAnalytics,
    pub timeline: Timeline,
    pub latency: LatencyLog,
    pub tasks: TaskBoard,
    pub plan: PlanState,
    pub context: ContextAttribution,
    pub truncation_count: u64,

    /// Identities of events already folded into this state, so a replayed or
    /// duplicated line from the incremental reader is a no-op rather than
    /// double-counted. Bounded to [`MAX_SEEN_HASHES`]; not part of the
    /// snapshot round-trip, since a restored aggregator re-derives it from
    /// whatever the reader re-delivers.
    #[serde(skip)]
    seen: SeenHashes,
}

impl Aggregator {
    pub fn new(provider_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            event_count: 0,
            turn_count: 0,
            error_count: 0,
            active_model: None,
            tokens: TokenState::default(),
            tools: ToolAnalytics::default(),
            timeline: Timeline::default(),
            latency: LatencyLog::default(),
            tasks: TaskBoard::default(),
            plan: PlanState::default(),
            context: ContextAttribution::default(),
            truncation_count: 0,
            seen: SeenHashes::default(),
        }
    }

    /// Fold one event into the running state. Returns `false` if the event
    /// was a duplicate and therefore skipped.
    pub fn process_event(&mut self, event: &Event) -> bool {
        if !self.seen.insert(dedup_key(event)) {
            return false;
        }

        self.event_count += 1;

        match event {
            Event::User { message, .. } => {
                self.turn_count += 1;
                self.error_count = 0;
                let timestamp = event.timestamp().unwrap_or_default();
                match &message.content {
                    Content::Blocks(_) => {
                        // Tool results are reported back to the agent as a
                        // user-role message carrying ToolResult blocks, not
                        // through the standalone `Event::ToolResult` variant.
                        for block in message.content.blocks() {
                            self.process_block(block, event, true);
                        }
                    }
                    Content::Text(text) => {
                        let tokens = estimate_tokens(text);
                        if is_system_reminder(text) {
                            self.context.add(ContextBucket::SystemPrompt, tokens);
                            self.timeline.push(timestamp, "system_reminder", text, NoiseLevel::Low);
                        } else {
                            self.context.add(ContextBucket::UserMessages, tokens);
                            self.timeline.push(timestamp, "user", text, NoiseLevel::Normal);
                            self.latency.note_user_prompt(timestamp);
                        }
                    }
                }
            }
            Event::Assistant { message, .. } => {
                let timestamp = event.timestamp().unwrap_or_default();
                if let Some(model) = &message.model {
                    self.active_model = Some(model.clone());
                }
                if let Some(usage) = &message.usage {
                    let compacted = self.tokens.record(message.model.as_deref(), usage);
                    if compacted {
                        self.timeline.push(timestamp, "compaction", "context window compacted", NoiseLevel::High);
                    }
                }

                for block in message.content.blocks() {
                    self.process_block(block, event, false);
                }

                if let Content::Text(text) = &message.content {
                    let tokens = estimate_tokens(text);
                    self.context.add(ContextBucket::AssistantText, tokens);
                }

                let text = message.content.as_text();
                if !text.trim().is_empty() {
                    self.plan.collect_assistant_text(&text);
                    if message.usage.is_some() {
                        self.latency.note_assistant_response(timestamp);
                    }
                }
            }
            Event::ToolResult {
                tool_use_id,
                content,
                is_error,
                duration_ms,
                timestamp,
            } => {
                self.resolve_tool_result(tool_use_id, content, *is_error, *duration_ms, *timestamp, false);
            }
            Event::Summary { summary, .. } => {
                self.context.add(ContextBucket::Other, estimate_tokens(summary));
                self.timeline.push(
                    chrono::Utc::now(),
                    "summary",
                    "session summarized",
                    NoiseLevel::High,
                );
            }
            Event::System { subtype, .. } => {
                self.timeline.push(
                    event.timestamp().unwrap_or_default(),
                    "system",
                    subtype,
                    NoiseLevel::Low,
                );
            }
        }

        true
    }

    fn process_block(&mut self, block: &Block, event: &Event, is_user: bool) {
        match block {
            Block::Thinking { text } => {
                let tokens = estimate_tokens(text);
                self.context.add(ContextBucket::Reasoning, tokens);
                self.timeline.push(
                    event.timestamp().unwrap_or_default(),
                    "reasoning",
                    text,
                    NoiseLevel::Low,
                );
            }
            Block::Text { text } => {
                let tokens = estimate_tokens(text);
                if is_user {
                    if is_system_reminder(text) {
                        self.context.add(ContextBucket::SystemPrompt, tokens);
                    } else {
                        self.context.add(ContextBucket::UserMessages, tokens);
                    }
                } else {
                    self.context.add(ContextBucket::AssistantText, tokens);
                }
                self.timeline.push(
                    event.timestamp().unwrap_or_default(),
                    "message",
                    text,
                    NoiseLevel::Normal,
                );
            }
            Block::ToolUse { id, name, input } => {
                let timestamp = event.timestamp().unwrap_or_default();
                self.tools.record_call(id, name, timestamp);
                self.context.add(ContextBucket::ToolCalls, estimate_tokens(&input.to_string()));
                self.dispatch_tool_use(id, name, input, timestamp);
                self.timeline.push(
                    timestamp,
                    "tool_call",
                    &format!("{name}({id})"),
                    NoiseLevel::Normal,
                );
            }
            Block::ToolResult {
                tool_use_id,
                content,
                is_error,
                duration_ms,
            } => {
                let timestamp = event.timestamp().unwrap_or_default();
                let solely_tool_result = is_user && matches!(event, Event::User { message, .. } if message.content.blocks().len() == 1);
                self.resolve_tool_result(tool_use_id, content, *is_error, *duration_ms, timestamp, solely_tool_result);
            }
        }
    }

    /// Routes tool calls the two bundled producers use to drive task/plan
    /// state. Every other tool name is left alone: it only shows up in
    /// `ToolAnalytics` and the timeline.
    fn dispatch_tool_use(&mut self, id: &str, name: &str, input: &serde_json::Value, timestamp: chrono::DateTime<chrono::Utc>) {
        match name {
            "TodoWrite" => self.tasks.apply_todo_write(input, timestamp),
            "TaskCreate" => self.tasks.begin_task_create(id, input),
            "TaskUpdate" => self.tasks.apply_task_update(input, timestamp),
            "Task" => self.tasks.begin_subagent(id, input, timestamp),
            "UpdatePlan" => {
                self.tasks.apply_update_plan(input, timestamp);
                self.plan.apply_update_plan(input);
            }
            "EnterPlanMode" => self.plan.enter(timestamp),
            "ExitPlanMode" => self.plan.exit(timestamp, || None),
            "Write" => {
                if let (Some(path), Some(content)) = (
                    input.get("file_path").and_then(|v| v.as_str()),
                    input.get("content").and_then(|v| v.as_str()),
                ) {
                    self.plan.note_plan_file_write(path, content);
                }
            }
            _ => {}
        }
    }

    fn resolve_tool_result(
        &mut self,
        tool_use_id: &str,
        content: &Content,
        is_error: bool,
        duration_ms: Option<u64>,
        timestamp: chrono::DateTime<chrono::Utc>,
        solely_tool_result: bool,
    ) {
        let pending = self.tools.pending.get(tool_use_id).cloned();
        self.tools
            .record_result(tool_use_id, is_error, timestamp, duration_ms);

        let text = content.as_text();
        if contains_truncation_marker(&text) {
            self.truncation_count += 1;
        }
        self.context.add(ContextBucket::ToolResults, estimate_tokens(&text));

        if let Some(pending) = &pending {
            match pending.name.as_str() {
                "TaskCreate" => self.tasks.complete_task_create(tool_use_id, is_error, &text, timestamp),
                "Task" => self.tasks.complete_subagent(tool_use_id, is_error, timestamp),
                _ => {}
            }
        }

        // A user event consisting solely of tool_result blocks is machine
        // plumbing, not a human turn; a failed tool call is worth surfacing
        // regardless.
        let noise = if is_error {
            NoiseLevel::High
        } else if solely_tool_result {
            NoiseLevel::Low
        } else {
            NoiseLevel::Normal
        };
        let tool_name = pending.as_ref().map(|p| p.name.as_str()).unwrap_or("unknown");
        self.timeline.push(timestamp, "tool_result", &format!("{tool_name}({tool_use_id})"), noise);

        if is_error {
            self.error_count += 1;
        } else {
            self.error_count = 0;
        }
    }

    /// Serialize to the versioned snapshot wire format. The pending-tool-call
    /// map is dropped by `ToolAnalytics`'s own `#[serde(skip)]`, and the
    /// dedup set is dropped the same way, both per the round-trip invariant.
    pub fn to_snapshot(&self) -> AggregatorSnapshot {
        AggregatorSnapshot {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            state: self.clone(),
        }
    }

    pub fn from_snapshot(snapshot: AggregatorSnapshot) -> Option<Self> {
        if snapshot.schema_version != SNAPSHOT_SCHEMA_VERSION {
            return None;
        }
        Some(snapshot.state)
    }

    pub fn reset(&mut self) {
        let provider_id = std::mem::take(&mut self.provider_id);
        *self = Aggregator::new(provider_id);
    }
}

/// Placeholder token estimator used for content the provider doesn't attach
/// an authoritative usage report to (timeline/context attribution only;
/// never fed back into `tokens`, which exclusively trusts provider-reported
/// `Usage`). Roughly 4 characters per token, the commonly cited approximation
/// for English text under BPE tokenizers.
fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(4)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorSnapshot {
    pub schema_version: u32,
    state: Aggregator,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ascope_types::{Message, Role, Usage};
    use chrono::Utc;

    fn user(text: &str, uuid: &str) -> Event {
        Event::User {
            message: Message {
                role: Role::User,
                content: Content::Text(text.into()),
                usage: None,
                model: None,
                permission_mode: None,
            },
            uuid: Some(uuid.into()),
            parent_uuid: None,
            timestamp: Utc::now(),
        }
    }

    fn assistant_with_tool_call(id: &str, name: &str, uuid: &str) -> Event {
        Event::Assistant {
            message: Message {
                role: Role::Assistant,
                content: Content::Blocks(vec![Block::ToolUse {
                    id: id.into(),
                    name: name.into(),
                    input: serde_json::json!({}),
                }]),
                usage: Some(Usage {
                    input_tokens: 100,
                    output_tokens: 20,
                    ..Default::default()
                }),
                model: Some("claude-3-5-sonnet".into()),
                permission_mode: None,
            },
            uuid: Some(uuid.into()),
            parent_uuid: None,
            timestamp: Utc::now(),
        }
    }

    fn tool_result(id: &str, is_error: bool) -> Event {
        Event::ToolResult {
            tool_use_id: id.into(),
            content: Content::Text("ok".into()),
            is_error,
            duration_ms: Some(42),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn single_tool_cycle_updates_turn_and_tool_stats() {
        let mut agg = Aggregator::new("claude_code");
        agg.process_event(&user("do the thing", "u1"));
        agg.process_event(&assistant_with_tool_call("t1", "Bash", "a1"));
        agg.process_event(&tool_result("t1", false));

        assert_eq!(agg.event_count, 3);
        assert_eq!(agg.turn_count, 1);
        assert_eq!(agg.tools.per_tool["Bash"].success, 1);
        assert_eq!(agg.tokens.total_tokens(), 120);
    }

    #[test]
    fn duplicate_event_uuid_is_not_double_counted() {
        let mut agg = Aggregator::new("claude_code");
        let event = user("hi", "u1");
        assert!(agg.process_event(&event));
        assert!(!agg.process_event(&event));
        assert_eq!(agg.event_count, 1);
    }

    #[test]
    fn duplicate_event_with_no_uuid_falls_back_to_content_identity() {
        let mut agg = Aggregator::new("codex");
        let event = Event::Summary {
            summary: "condensed context of the last 40 turns".into(),
            leaf_uuid: None,
        };
        assert!(agg.process_event(&event));
        assert!(!agg.process_event(&event));
        assert_eq!(agg.event_count, 1);
    }

    #[test]
    fn seen_hashes_evicts_oldest_quarter_once_over_the_cap() {
        let mut seen = SeenHashes::default();
        for i in 0..MAX_SEEN_HASHES {
            assert!(seen.insert(format!("k{i}")));
        }
        assert_eq!(seen.order.len(), MAX_SEEN_HASHES);

        assert!(seen.insert("overflow".into()));
        assert!(seen.order.len() < MAX_SEEN_HASHES);
        // the oldest keys were evicted, so they're treated as unseen again.
        assert!(seen.insert("k0".into()));
        // a key from the retained tail is still recognized as seen.
        assert!(!seen.insert(format!("k{}", MAX_SEEN_HASHES - 1)));
    }

    #[test]
    fn todo_write_replaces_task_board() {
        let mut agg = Aggregator::new("claude_code");
        let event = Event::Assistant {
            message: Message {
                role: Role::Assistant,
                content: Content::Blocks(vec![Block::ToolUse {
                    id: "t1".into(),
                    name: "TodoWrite".into(),
                    input: serde_json::json!({"todos": [
                        {"content": "a", "status": "completed"},
                        {"content": "b", "status": "in_progress"},
                    ]}),
                }]),
                usage: None,
                model: None,
                permission_mode: None,
            },
            uuid: Some("a1".into()),
            parent_uuid: None,
            timestamp: Utc::now(),
        };
        agg.process_event(&event);
        assert_eq!(agg.tasks.tasks.len(), 2);
        assert_eq!(agg.tasks.active_task_id.as_deref(), Some("todo-1"));
    }

    #[test]
    fn error_result_increments_and_success_resets_error_count() {
        let mut agg = Aggregator::new("claude_code");
        agg.process_event(&assistant_with_tool_call("t1", "Bash", "a1"));
        agg.process_event(&tool_result("t1", true));
        assert_eq!(agg.error_count, 1);

        agg.process_event(&assistant_with_tool_call("t2", "Bash", "a2"));
        agg.process_event(&tool_result("t2", false));
        assert_eq!(agg.error_count, 0);
    }

    #[test]
    fn snapshot_round_trips_except_pending_tool_calls() {
        let mut agg = Aggregator::new("claude_code");
        agg.process_event(&assistant_with_tool_call("t1", "Bash", "a1"));
        assert_eq!(agg.tools.pending_count(), 1);

        let snapshot = agg.to_snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        let restored_snapshot: AggregatorSnapshot = serde_json::from_str(&json).unwrap();
        let restored = Aggregator::from_snapshot(restored_snapshot).unwrap();

        assert_eq!(restored.event_count, agg.event_count);
        assert_eq!(restored.tools.pending_count(), 0);
    }

    #[test]
    fn snapshot_version_mismatch_fails_restore() {
        let agg = Aggregator::new("claude_code");
        let mut snapshot = agg.to_snapshot();
        snapshot.schema_version = 999;
        assert!(Aggregator::from_snapshot(snapshot).is_none());
    }

    #[test]
    fn reset_zeroes_everything_but_provider_id() {
        let mut agg = Aggregator::new("claude_code");
        agg.process_event(&user("hi", "u1"));
        agg.reset();
        assert_eq!(agg.provider_id, "claude_code");
        assert_eq!(agg.event_count, 0);
        assert_eq!(agg.turn_count, 0);
        assert!(agg.timeline.is_empty());
    }

    #[test]
    fn truncated_tool_output_increments_truncation_count() {
        let mut agg = Aggregator::new("claude_code");
        agg.process_event(&assistant_with_tool_call("t1", "Read", "a1"));
        agg.process_event(&Event::ToolResult {
            tool_use_id: "t1".into(),
            content: Content::Text("... [truncated] rest omitted".into()),
            is_error: false,
            duration_ms: None,
            timestamp: Utc::now(),
        });
        assert_eq!(agg.truncation_count, 1);
    }

    #[test]
    fn user_to_assistant_turn_records_a_latency_sample() {
        let mut agg = Aggregator::new("claude_code");
        let t0 = Utc::now();
        agg.process_event(&Event::User {
            message: Message {
                role: Role::User,
                content: Content::Text("fix the bug".into()),
                usage: None,
                model: None,
                permission_mode: None,
            },
            uuid: Some("u1".into()),
            parent_uuid: None,
            timestamp: t0,
        });
        agg.process_event(&Event::Assistant {
            message: Message {
                role: Role::Assistant,
                content: Content::Text("done".into()),
                usage: Some(Usage { input_tokens: 10, output_tokens: 5, ..Default::default() }),
                model: Some("claude-3-5-sonnet".into()),
                permission_mode: None,
            },
            uuid: Some("a1".into()),
            parent_uuid: None,
            timestamp: t0 + chrono::Duration::milliseconds(800),
        });
        assert_eq!(agg.latency.stats().count, 1);
        assert_eq!(agg.latency.records()[0].latency_ms, 800);
    }

    #[test]
    fn summary_event_contributes_to_other_context_bucket() {
        let mut agg = Aggregator::new("claude_code");
        agg.process_event(&Event::Summary {
            summary: "condensed context of the last 40 turns".into(),
            leaf_uuid: None,
        });
        assert!(agg.context.get(crate::ContextBucket::Other) > 0);
        assert_eq!(agg.context.total(), agg.context.get(crate::ContextBucket::Other));
    }

    #[test]
    fn system_reminder_text_lands_in_system_prompt_bucket_not_user_messages() {
        let mut agg = Aggregator::new("claude_code");
        agg.process_event(&user("<system-reminder>stay focused</system-reminder>", "u1"));
        assert_eq!(agg.context.get(crate::ContextBucket::UserMessages), 0);
        assert!(agg.context.get(crate::ContextBucket::SystemPrompt) > 0);
    }

    #[test]
    fn tool_result_delivered_as_embedded_block_is_low_noise_when_solely_tool_results() {
        let mut agg = Aggregator::new("claude_code");
        agg.process_event(&assistant_with_tool_call("t1", "Bash", "a1"));
        let event = Event::User {
            message: Message {
                role: Role::User,
                content: Content::Blocks(vec![Block::ToolResult {
                    tool_use_id: "t1".into(),
                    content: Content::Text("ok".into()),
                    is_error: false,
                    duration_ms: Some(5),
                }]),
                usage: None,
                model: None,
                permission_mode: None,
            },
            uuid: Some("u1".into()),
            parent_uuid: None,
            timestamp: Utc::now(),
        };
        agg.process_event(&event);
        let last = agg.timeline.entries().into_iter().last().unwrap();
        assert_eq!(last.kind, "tool_result");
        assert_eq!(last.noise, NoiseLevel::Low);
        assert_eq!(agg.tools.per_tool["Bash"].success, 1);
    }

    #[test]
    fn task_create_tool_flow_materializes_a_task_from_its_result() {
        let mut agg = Aggregator::new("claude_code");
        agg.process_event(&assistant_with_tool_call("t1", "TaskCreate", "a1"));
        agg.process_event(&Event::ToolResult {
            tool_use_id: "t1".into(),
            content: Content::Text("Task #3 created".into()),
            is_error: false,
            duration_ms: None,
            timestamp: Utc::now(),
        });
        assert_eq!(agg.tasks.tasks.len(), 1);
        assert_eq!(agg.tasks.tasks[0].id, "task-3");
    }

    #[test]
    fn enter_and_exit_plan_mode_materializes_steps_from_assistant_text() {
        let mut agg = Aggregator::new("claude_code");
        let t0 = Utc::now();
        agg.process_event(&Event::Assistant {
            message: Message {
                role: Role::Assistant,
                content: Content::Blocks(vec![Block::ToolUse {
                    id: "p1".into(),
                    name: "EnterPlanMode".into(),
                    input: serde_json::json!({}),
                }]),
                usage: None,
                model: None,
                permission_mode: None,
            },
            uuid: Some("a1".into()),
            parent_uuid: None,
            timestamp: t0,
        });
        agg.process_event(&Event::Assistant {
            message: Message {
                role: Role::Assistant,
                content: Content::Text("# Ship it\n- step one\n- step two".into()),
                usage: None,
                model: None,
                permission_mode: None,
            },
            uuid: Some("a2".into()),
            parent_uuid: None,
            timestamp: t0 + chrono::Duration::seconds(1),
        });
        agg.process_event(&Event::Assistant {
            message: Message {
                role: Role::Assistant,
                content: Content::Blocks(vec![Block::ToolUse {
                    id: "p2".into(),
                    name: "ExitPlanMode".into(),
                    input: serde_json::json!({}),
                }]),
                usage: None,
                model: None,
                permission_mode: None,
            },
            uuid: Some("a3".into()),
            parent_uuid: None,
            timestamp: t0 + chrono::Duration::seconds(2),
        });
        assert!(!agg.plan.active);
        assert_eq!(agg.plan.title.as_deref(), Some("Ship it"));
        assert_eq!(agg.plan.steps.len(), 2);
    }
}
