use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message body: either a bare string (common for simple user turns) or an
/// ordered list of content blocks (the general case for assistant turns that
/// interleave reasoning, text, and tool calls).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Blocks(Vec<Block>),
}

impl Content {
    /// Flatten to a plain string, concatenating the text of any text/thinking
    /// blocks and skipping tool blocks. Used for display and for truncation.
    pub fn as_text(&self) -> String {
        match self {
            Content::Text(s) => s.clone(),
            Content::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| match b {
                    Block::Text { text } => Some(text.as_str()),
                    Block::Thinking { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    pub fn blocks(&self) -> &[Block] {
        match self {
            Content::Text(_) => &[],
            Content::Blocks(blocks) => blocks,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Text {
        text: String,
    },
    Thinking {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        #[serde(default)]
        content: Content,
        #[serde(default)]
        is_error: bool,
        /// Wall-clock duration of the tool call, when the provider reports it
        /// inline on the result block rather than as a separate timestamp delta.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration_ms: Option<u64>,
    },
}

impl Default for Content {
    fn default() -> Self {
        Content::Text(String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_string_round_trips_as_text_variant() {
        let c: Content = serde_json::from_str("\"hello\"").unwrap();
        assert_eq!(c, Content::Text("hello".into()));
    }

    #[test]
    fn block_array_round_trips() {
        let json = r#"[{"type":"text","text":"hi"},{"type":"tool_use","id":"t1","name":"Bash","input":{"command":"ls"}}]"#;
        let c: Content = serde_json::from_str(json).unwrap();
        match &c {
            Content::Blocks(blocks) => assert_eq!(blocks.len(), 2),
            _ => panic!("expected blocks"),
        }
        assert_eq!(c.as_text(), "hi");
    }

    #[test]
    fn as_text_skips_tool_blocks() {
        let c = Content::Blocks(vec![
            Block::Thinking {
                text: "pondering".into(),
            },
            Block::ToolUse {
                id: "t1".into(),
                name: "Read".into(),
                input: Value::Null,
            },
            Block::Text {
                text: "done".into(),
            },
        ]);
        assert_eq!(c.as_text(), "pondering\ndone");
    }
}
