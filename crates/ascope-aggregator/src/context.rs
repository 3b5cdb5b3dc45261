use serde::{Deserialize, Serialize};

/// Buckets the aggregator attributes cumulative input-token consumption to,
/// used to explain what is filling a session's context window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextBucket {
    SystemPrompt,
    UserMessages,
    AssistantText,
    Reasoning,
    ToolCalls,
    ToolResults,
    Other,
}

const BUCKET_COUNT: usize = 7;
const BUCKETS: [ContextBucket; BUCKET_COUNT] = [
    ContextBucket::SystemPrompt,
    ContextBucket::UserMessages,
    ContextBucket::AssistantText,
    ContextBucket::Reasoning,
    ContextBucket::ToolCalls,
    ContextBucket::ToolResults,
    ContextBucket::Other,
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextAttribution {
    system_prompt: u64,
    user_messages: u64,
    assistant_text: u64,
    reasoning: u64,
    tool_calls: u64,
    tool_results: u64,
    other: u64,
}

impl ContextAttribution {
    pub fn add(&mut self, bucket: ContextBucket, tokens: u64) {
        let field = match bucket {
            ContextBucket::SystemPrompt => &mut self.system_prompt,
            ContextBucket::UserMessages => &mut self.user_messages,
            ContextBucket::AssistantText => &mut self.assistant_text,
            ContextBucket::Reasoning => &mut self.reasoning,
            ContextBucket::ToolCalls => &mut self.tool_calls,
            ContextBucket::ToolResults => &mut self.tool_results,
            ContextBucket::Other => &mut self.other,
        };
        *field += tokens;
    }

    pub fn get(&self, bucket: ContextBucket) -> u64 {
        match bucket {
            ContextBucket::SystemPrompt => self.system_prompt,
            ContextBucket::UserMessages => self.user_messages,
            ContextBucket::AssistantText => self.assistant_text,
            ContextBucket::Reasoning => self.reasoning,
            ContextBucket::ToolCalls => self.tool_calls,
            ContextBucket::ToolResults => self.tool_results,
            ContextBucket::Other => self.other,
        }
    }

    pub fn total(&self) -> u64 {
        BUCKETS.iter().map(|b| self.get(*b)).sum()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Recognizes the fixed set of sentinel markers a `user` event's text uses to
/// signal injected system context rather than an actual human message, so
/// that text lands in the `system_prompt` bucket instead of `user_messages`.
pub fn is_system_reminder(text: &str) -> bool {
    const SENTINELS: &[&str] = &["<system-reminder>", "CLAUDE.md", "AGENTS.md", "# System"];
    SENTINELS.iter().any(|s| text.contains(s)) || text.contains("_instructions>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets_accumulate_independently() {
        let mut attribution = ContextAttribution::default();
        attribution.add(ContextBucket::UserMessages, 100);
        attribution.add(ContextBucket::ToolResults, 50);
        attribution.add(ContextBucket::UserMessages, 20);
        assert_eq!(attribution.get(ContextBucket::UserMessages), 120);
        assert_eq!(attribution.get(ContextBucket::ToolResults), 50);
        assert_eq!(attribution.total(), 170);
    }

    #[test]
    fn recognizes_system_reminder_sentinels_but_not_plain_text() {
        assert!(is_system_reminder("<system-reminder>be careful</system-reminder>"));
        assert!(is_system_reminder("see CLAUDE.md for conventions"));
        assert!(is_system_reminder("<user_instructions>do X</user_instructions>"));
        assert!(!is_system_reminder("please fix the failing test"));
    }
}
