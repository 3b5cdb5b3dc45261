use crate::bus::SessionPhase;
use ascope_aggregator::{Aggregator, ContextAttribution};
use ascope_providers::IncrementalReader;
use std::collections::{BTreeMap, VecDeque};
use std::path::PathBuf;
use std::time::{Instant, SystemTime};

/// Cap on [`ConsumerState::turn_attributions`] and [`ConsumerState::assistant_texts`].
pub const MAX_TURN_ATTRIBUTIONS: usize = 200;
/// Cap on [`ConsumerState::context_timeline`], thinned by half rather than
/// by dropping the oldest entry once full, so the sampled shape of a whole
/// long session survives at reduced resolution instead of losing its start.
pub const MAX_CONTEXT_TIMELINE: usize = 500;
pub const MAX_ASSISTANT_TEXTS: usize = 200;
pub const MAX_ASSISTANT_TEXT_LENGTH: usize = 500;
/// Tool-call history kept for cycle detection; only the last 10 calls are
/// ever inspected, so there is no reason to retain more.
const TOOL_CALL_HISTORY_CAP: usize = 10;

#[derive(Debug, Clone)]
pub struct ContextSample {
    pub at: chrono::DateTime<chrono::Utc>,
    pub total_tokens: u64,
}

/// Derived state the monitor keeps on top of what `Aggregator` itself
/// persists: per-turn attribution history, a thinned context-size timeline,
/// the tool-call window cycle detection inspects, a shadow of in-flight
/// tool calls for producer-specific augmentation, and a capped buffer of
/// assistant text for downstream decision extraction.
#[derive(Debug, Clone, Default)]
pub struct ConsumerState {
    pub turn_attributions: VecDeque<ContextAttribution>,
    pub context_timeline: VecDeque<ContextSample>,
    pub tool_call_history: VecDeque<String>,
    pub pending_tool_calls: BTreeMap<String, String>,
    pub assistant_texts: VecDeque<String>,
    pub plan_step_cursor: usize,
    pub last_cycle_notified_at: Option<SystemTime>,
    pub last_latency_count: usize,
}

impl ConsumerState {
    pub fn record_turn_attribution(&mut self, attribution: ContextAttribution) {
        push_capped(&mut self.turn_attributions, attribution, MAX_TURN_ATTRIBUTIONS);
    }

    pub fn record_context_sample(&mut self, at: chrono::DateTime<chrono::Utc>, total_tokens: u64) {
        push_thinned(&mut self.context_timeline, ContextSample { at, total_tokens }, MAX_CONTEXT_TIMELINE);
    }

    pub fn record_tool_call(&mut self, id: &str, name: &str) {
        self.pending_tool_calls.insert(id.to_string(), name.to_string());
        self.tool_call_history.push_back(name.to_string());
        while self.tool_call_history.len() > TOOL_CALL_HISTORY_CAP {
            self.tool_call_history.pop_front();
        }
    }

    pub fn resolve_tool_call(&mut self, id: &str) {
        self.pending_tool_calls.remove(id);
    }

    pub fn record_assistant_text(&mut self, text: &str) {
        let truncated: String = text.chars().take(MAX_ASSISTANT_TEXT_LENGTH).collect();
        push_capped(&mut self.assistant_texts, truncated, MAX_ASSISTANT_TEXTS);
    }

    /// Examine the recent tool-call window (sizes 6 and 10) for a repeating,
    /// non-trivial prefix. Returns the window size that matched, if any.
    pub fn detect_cycle(&self) -> Option<usize> {
        for window in [6usize, 10usize] {
            if self.tool_call_history.len() < window {
                continue;
            }
            let recent: Vec<&String> = self.tool_call_history.iter().rev().take(window).collect();
            let half = window / 2;
            let (a, b) = (&recent[..half], &recent[half..]);
            if a == b && a.iter().collect::<std::collections::HashSet<_>>().len() > 1 {
                return Some(window);
            }
        }
        None
    }
}

fn push_capped<T>(buf: &mut VecDeque<T>, item: T, cap: usize) {
    buf.push_back(item);
    while buf.len() > cap {
        buf.pop_front();
    }
}

fn push_thinned<T>(buf: &mut VecDeque<T>, item: T, cap: usize) {
    buf.push_back(item);
    if buf.len() > cap {
        let thinned = buf.drain(..).enumerate().filter(|(i, _)| i % 2 == 0).map(|(_, v)| v).collect();
        *buf = thinned;
    }
}

/// One session file under active supervision: its incremental reader, the
/// aggregator folding its events, consumer-local derived state, and enough
/// lifecycle bookkeeping for the monitor to decide when to snapshot and
/// when to mark it ended.
pub(crate) struct TrackedSession {
    pub provider_id: String,
    pub path: PathBuf,
    pub reader: Box<dyn IncrementalReader>,
    pub aggregator: Aggregator,
    pub phase: SessionPhase,
    pub last_activity: SystemTime,
    pub events_since_snapshot: u32,
    pub last_snapshot_at: SystemTime,
    pub consumer: ConsumerState,
    /// Set when an fs event for this session's path arrives; cleared once
    /// the debounce window has elapsed and the change has actually been
    /// read, so a burst of writes coalesces into a single read.
    pub pending_change_since: Option<Instant>,
    pub last_error: Option<String>,
}

impl TrackedSession {
    pub fn new(
        provider_id: &str,
        path: PathBuf,
        reader: Box<dyn IncrementalReader>,
        aggregator: Aggregator,
    ) -> Self {
        Self {
            provider_id: provider_id.to_string(),
            path,
            reader,
            aggregator,
            phase: SessionPhase::Discovery,
            last_activity: SystemTime::now(),
            events_since_snapshot: 0,
            last_snapshot_at: SystemTime::now(),
            consumer: ConsumerState::default(),
            pending_change_since: None,
            last_error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_cycle_ignores_windows_shorter_than_six() {
        let mut state = ConsumerState::default();
        for name in ["Read", "Bash", "Read", "Bash"] {
            state.record_tool_call("id", name);
        }
        assert_eq!(state.detect_cycle(), None);
    }

    #[test]
    fn detect_cycle_finds_a_repeating_window_of_six() {
        let mut state = ConsumerState::default();
        for name in ["Read", "Bash", "Grep", "Read", "Bash", "Grep"] {
            state.record_tool_call("id", name);
        }
        assert_eq!(state.detect_cycle(), Some(6));
    }

    #[test]
    fn detect_cycle_ignores_a_trivial_single_tool_repeat() {
        let mut state = ConsumerState::default();
        for _ in 0..6 {
            state.record_tool_call("id", "Read");
        }
        assert_eq!(state.detect_cycle(), None);
    }

    #[test]
    fn context_timeline_thins_by_half_once_over_cap() {
        let mut state = ConsumerState::default();
        for i in 0..(MAX_CONTEXT_TIMELINE + 1) {
            state.record_context_sample(chrono::Utc::now(), i as u64);
        }
        assert!(state.context_timeline.len() <= MAX_CONTEXT_TIMELINE);
        assert!(state.context_timeline.len() > MAX_CONTEXT_TIMELINE / 2);
    }

    #[test]
    fn assistant_text_is_truncated_to_max_length() {
        let mut state = ConsumerState::default();
        state.record_assistant_text(&"x".repeat(MAX_ASSISTANT_TEXT_LENGTH + 50));
        assert_eq!(state.assistant_texts[0].len(), MAX_ASSISTANT_TEXT_LENGTH);
    }
}
