use serde::{Deserialize, Serialize};

/// Token accounting for a single assistant turn, as reported by the provider.
///
/// Fields default to zero so that providers which omit a breakdown (or emit
/// it only on the final message of a turn) still produce a valid `Usage`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub cache_creation_input_tokens: u64,
    #[serde(default)]
    pub cache_read_input_tokens: u64,
    #[serde(default)]
    pub reasoning_tokens: u64,
    /// Cost in USD as reported inline by the provider, when available.
    #[serde(default)]
    pub reported_cost: Option<f64>,
}

impl Usage {
    pub fn total_input(&self) -> u64 {
        self.input_tokens + self.cache_creation_input_tokens + self.cache_read_input_tokens
    }

    pub fn total_output(&self) -> u64 {
        self.output_tokens + self.reasoning_tokens
    }

    pub fn total(&self) -> u64 {
        self.total_input() + self.total_output()
    }

    pub fn merge(&mut self, other: &Usage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.cache_creation_input_tokens += other.cache_creation_input_tokens;
        self.cache_read_input_tokens += other.cache_read_input_tokens;
        self.reasoning_tokens += other.reasoning_tokens;
        self.reported_cost = match (self.reported_cost, other.reported_cost) {
            (Some(a), Some(b)) => Some(a + b),
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_split_cache_from_fresh_input() {
        let usage = Usage {
            input_tokens: 100,
            cache_creation_input_tokens: 10,
            cache_read_input_tokens: 20,
            output_tokens: 40,
            reasoning_tokens: 5,
            reported_cost: None,
        };
        assert_eq!(usage.total_input(), 130);
        assert_eq!(usage.total_output(), 45);
        assert_eq!(usage.total(), 175);
    }

    #[test]
    fn merge_sums_fields_and_cost() {
        let mut a = Usage {
            input_tokens: 10,
            reported_cost: Some(0.01),
            ..Default::default()
        };
        let b = Usage {
            input_tokens: 5,
            reported_cost: Some(0.02),
            ..Default::default()
        };
        a.merge(&b);
        assert_eq!(a.input_tokens, 15);
        assert_eq!(a.reported_cost, Some(0.03));
    }
}
