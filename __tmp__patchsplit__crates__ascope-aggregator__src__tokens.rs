use ascope_types::Usage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cumulative token usage for a single model seen in the session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_input_tokens: u64,
    pub cache_read_input_tokens: u64,
    pub reasoning_tokens: u64,
    pub reported_cost: f64,
    pub turn_count: u64,
}

impl ModelUsage {
    fn add(&mut self, usage: &Usage) {
        self.input_tokens += usage.input_tokens;
        self.output_tokens += usage.output_tokens;
        self.cache_creation_input_tokens += usage.cache_creation_input_tokens;
        self.cache_read_input_tokens += usage.cache_read_input_tokens;
        self.reasoning_tokens += usage.reasoning_tokens;
        self.reported_cost += usage.reported_cost.unwrap_or(0.0);
        self.turn_count += 1;
    }

    pub fn total_tokens(&self) -> u64 {
        self.input_tokens
            + self.output_tokens
            + self.cache_creation_input_tokens
            + self.cache_read_input_tokens
    }
}

/// Context-window compaction is detected whenever the aggregator observes a
/// usage report whose total input size has fallen below 80% of the previous
/// report, which only happens when the provider condensed history (normal
/// incremental usage only grows).
const COMPACTION_RATIO: f64 = 0.8;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenState {
    pub per_model: BTreeMap<String, ModelUsage>,
    /// Most recent context-window input size (uncached + cached), used as the
    /// baseline for the next compaction check.
    last_context_size: Option<u64>,
    pub compaction_count: u64,
}

impl TokenState {
    pub fn record(&mut self, model: Option<&str>, usage: &Usage) -> bool {
        let model = model.unwrap_or("unknown").to_string();
        self.per_model.entry(model).or_default().add(usage);

        let context_size = usage.total_input();
        let compacted = match self.last_context_size {
            Some(before) if before > 0 => (context_size as f64) < (before as f64) * COMPACTION_RATIO,
            _ => false,
        };
        if compacted {
            self.compaction_count += 1;
        }
        self.last_context_size = Some(context_size);
        compacted
    }

    pub fn total_tokens(&self) -> u64 {
        self.per_model.values().map(|m| m.total_tokens()).sum()
    }

    pub fn total_cost(&self) -> f64 {
        self.per_model.values().map(|m| m.reported_cost).sum()
    }

    pub fn reset(&mut self) {
        *self = TokenState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(input: u64) -> Usage {
        Usage {
            input_tokens: input,
            output_tokens: 10,
            ..Default::default()
        }
    }

    #[test]
    fn accumulates_per_model_totals() {
        let mut state = TokenState::default();
        state.record(Some("claude-3"), &usage(100));
        state.record(Some("claude-3"), &usage(50));
        let model = &state.per_model["claude-3"];
        assert_eq!(model.input_tokens, 150);
        assert_eq!(model.turn_count, 2);
    }

    #[test]
    fn detects_compaction_below_eighty_percent_threshold() {
        let mut state = TokenState::default();
        state.record(Some("m"), &usage(1000));
        assert!(!state.record(Some("m"), &usage(900))); // 90%, not compaction
        assert!(state.record(Some("m"), &usage(500))); // well below 80% of 900
        assert_eq!(state.compaction_count, 1);
    }

    #[test]
    fn first_usage_report_never_counts_as_compaction() {
        let mut state = TokenState::default();
        assert!(!state.record(Some("m"), &usage(0)));
    }
}


