use super::schema::{
    ClaudeContentBlock, ClaudeRecord, ClaudeToolResultContent, ClaudeUserContent, ClaudeUsage,
};
use crate::jsonl_reader::LineParser;
use crate::Result;
use ascope_types::{Block, Content, Event, Message, Role, Usage};
use chrono::{DateTime, Utc};

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn convert_block(block: &ClaudeContentBlock) -> Block {
    match block {
        ClaudeContentBlock::Text { text } => Block::Text { text: text.clone() },
        ClaudeContentBlock::Thinking { thinking } => Block::Thinking {
            text: thinking.clone(),
        },
        ClaudeContentBlock::ToolUse { id, name, input } => Block::ToolUse {
            id: id.clone(),
            name: name.clone(),
            input: input.clone(),
        },
        ClaudeContentBlock::ToolResult {
            tool_use_id,
            content,
            is_error,
        } => Block::ToolResult {
            tool_use_id: tool_use_id.clone(),
            content: convert_tool_result_content(content),
            is_error: *is_error,
            duration_ms: None,
        },
    }
}

fn convert_tool_result_content(content: &ClaudeToolResultContent) -> Content {
    match content {
        ClaudeToolResultContent::Empty => Content::Text(String::new()),
        ClaudeToolResultContent::Text(text) => Content::Text(text.clone()),
        ClaudeToolResultContent::Blocks(blocks) => {
            Content::Blocks(blocks.iter().map(convert_block).collect())
        }
    }
}

fn convert_usage(usage: &ClaudeUsage) -> Usage {
    Usage {
        input_tokens: usage.input_tokens,
        output_tokens: usage.output_tokens,
        cache_creation_input_tokens: usage.cache_creation_input_tokens,
        cache_read_input_tokens: usage.cache_read_input_tokens,
        reasoning_tokens: 0,
        reported_cost: None,
    }
}

/// Convert one deserialized Claude record into zero-or-one normalized events.
/// `FileHistorySnapshot`-style and unrecognized records are dropped: they
/// carry no information the aggregator acts on.
pub fn normalize_record(record: &ClaudeRecord) -> Option<Event> {
    match record {
        ClaudeRecord::User(user) => {
            if user.is_meta {
                return None;
            }
            let content = match &user.message.content {
                ClaudeUserContent::Text(text) => Content::Text(text.clone()),
                ClaudeUserContent::Blocks(blocks) => {
                    Content::Blocks(blocks.iter().map(convert_block).collect())
                }
            };
            Some(Event::User {
                message: Message {
                    role: Role::User,
                    content,
                    usage: None,
                    model: None,
                    permission_mode: None,
                },
                uuid: Some(user.uuid.clone()),
                parent_uuid: user.parent_uuid.clone(),
                timestamp: parse_timestamp(&user.timestamp),
            })
        }
        ClaudeRecord::Assistant(asst) => {
            let content = Content::Blocks(asst.message.content.iter().map(convert_block).collect());
            Some(Event::Assistant {
                message: Message {
                    role: Role::Assistant,
                    content,
                    usage: asst.message.usage.as_ref().map(convert_usage),
                    model: asst.message.model.clone(),
                    permission_mode: None,
                },
                uuid: Some(asst.uuid.clone()),
                parent_uuid: asst.parent_uuid.clone(),
                timestamp: parse_timestamp(&asst.timestamp),
            })
        }
        ClaudeRecord::Summary(summary) => Some(Event::Summary {
            summary: summary.summary.clone(),
            leaf_uuid: summary.leaf_uuid.clone(),
        }),
        ClaudeRecord::System(sys) => Some(Event::System {
            subtype: sys.subtype.clone().unwrap_or_else(|| "unknown".into()),
            data: sys.data.clone(),
            timestamp: parse_timestamp(&sys.timestamp),
        }),
        ClaudeRecord::Unknown => None,
    }
}

pub struct ClaudeLineParser;

impl LineParser for ClaudeLineParser {
    fn parse_line(&self, line: &str) -> Result<Option<ascope_types::Event>> {
        let record: ClaudeRecord = match serde_json::from_str(line) {
            Ok(r) => r,
            Err(_) => return Ok(None),
        };
        Ok(normalize_record(&record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_plain_user_text() {
        let line = r#"{"type":"user","uuid":"u1","sessionId":"s1","timestamp":"2026-01-01T00:00:00Z","message":{"content":"hello"}}"#;
        let record: ClaudeRecord = serde_json::from_str(line).unwrap();
        let event = normalize_record(&record).unwrap();
        match event {
            Event::User { message, uuid, .. } => {
                assert_eq!(message.content, Content::Text("hello".into()));
                assert_eq!(uuid.as_deref(), Some("u1"));
            }
            _ => panic!("expected user event"),
        }
    }

    #[test]
    fn meta_user_records_are_dropped() {
        let line = r#"{"type":"user","uuid":"u1","sessionId":"s1","timestamp":"2026-01-01T00:00:00Z","isMeta":true,"message":{"content":"hello"}}"#;
        let record: ClaudeRecord = serde_json::from_str(line).unwrap();
        assert!(normalize_record(&record).is_none());
    }

    #[test]
    fn normalizes_assistant_with_tool_use_and_usage() {
        let line = r#"{"type":"assistant","uuid":"a1","parentUuid":"u1","sessionId":"s1","timestamp":"2026-01-01T00:00:01Z","message":{"model":"claude-3-5-sonnet","content":[{"type":"tool_use","id":"t1","name":"Bash","input":{"command":"ls"}}],"usage":{"input_tokens":10,"output_tokens":5,"cache_read_input_tokens":2}}}"#;
        let record: ClaudeRecord = serde_json::from_str(line).unwrap();
        let event = normalize_record(&record).unwrap();
        match event {
            Event::Assistant { message, .. } => {
                assert_eq!(message.model.as_deref(), Some("claude-3-5-sonnet"));
                let usage = message.usage.unwrap();
                assert_eq!(usage.input_tokens, 10);
                assert_eq!(usage.cache_read_input_tokens, 2);
                match message.content {
                    Content::Blocks(blocks) => assert_eq!(blocks.len(), 1),
                    _ => panic!("expected blocks"),
                }
            }
            _ => panic!("expected assistant event"),
        }
    }

    #[test]
    fn normalizes_summary_record() {
        let line = r#"{"type":"summary","summary":"condensed","leafUuid":"u9"}"#;
        let record: ClaudeRecord = serde_json::from_str(line).unwrap();
        let event = normalize_record(&record).unwrap();
        match event {
            Event::Summary { summary, leaf_uuid } => {
                assert_eq!(summary, "condensed");
                assert_eq!(leaf_uuid.as_deref(), Some("u9"));
            }
            _ => panic!("expected summary event"),
        }
    }

    #[test]
    fn unknown_record_type_is_dropped() {
        let line = r#"{"type":"file_history_snapshot","snapshot":{}}"#;
        let record: ClaudeRecord = serde_json::from_str(line).unwrap();
        assert!(normalize_record(&record).is_none());
    }
}
