use super::schema::{CodexContentItem, CodexRecord, CodexRole};
use crate::jsonl_reader::LineParser;
use crate::Result;
use ascope_types::{Block, Content, Event, Message, Role, Usage};
use chrono::{DateTime, Utc};

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn convert_content_item(item: &CodexContentItem) -> Vec<Block> {
    match item {
        CodexContentItem::InputText { text } | CodexContentItem::OutputText { text } => {
            vec![Block::Text { text: text.clone() }]
        }
        CodexContentItem::Reasoning { text } => vec![Block::Thinking { text: text.clone() }],
        CodexContentItem::FunctionCall {
            call_id,
            name,
            arguments,
        } => vec![Block::ToolUse {
            id: call_id.clone(),
            name: name.clone(),
            input: arguments.clone(),
        }],
        CodexContentItem::FunctionCallOutput {
            call_id,
            output,
            success,
        } => vec![Block::ToolResult {
            tool_use_id: call_id.clone(),
            content: Content::Text(output.clone()),
            is_error: success.is_some_and(|ok| !ok),
            duration_ms: None,
        }],
    }
}

pub fn normalize_record(record: &CodexRecord) -> Option<Event> {
    match record {
        CodexRecord::SessionMeta(_) => None,
        CodexRecord::ResponseItem(item) => {
            let blocks: Vec<Block> = item
                .payload
                .content
                .iter()
                .flat_map(convert_content_item)
                .collect();
            let content = if blocks.len() == 1 {
                if let Block::Text { text } = &blocks[0] {
                    Content::Text(text.clone())
                } else {
                    Content::Blocks(blocks)
                }
            } else {
                Content::Blocks(blocks)
            };

            let usage = item.payload.usage.as_ref().map(|u| Usage {
                input_tokens: u.input_tokens,
                output_tokens: u.output_tokens,
                cache_creation_input_tokens: 0,
                cache_read_input_tokens: u.cached_input_tokens,
                reasoning_tokens: u.reasoning_output_tokens,
                reported_cost: None,
            });

            match item.payload.role {
                CodexRole::User => Some(Event::User {
                    message: Message {
                        role: Role::User,
                        content,
                        usage: None,
                        model: None,
                        permission_mode: None,
                    },
                    uuid: None,
                    parent_uuid: None,
                    timestamp: parse_timestamp(&item.timestamp),
                }),
                CodexRole::Assistant => Some(Event::Assistant {
                    message: Message {
                        role: Role::Assistant,
                        content,
                        usage,
                        model: item.payload.model.clone(),
                        permission_mode: None,
                    },
                    uuid: None,
                    parent_uuid: None,
                    timestamp: parse_timestamp(&item.timestamp),
                }),
            }
        }
        CodexRecord::EventMsg(event) => Some(Event::System {
            subtype: "event_msg".into(),
            data: event.payload.clone(),
            timestamp: parse_timestamp(&event.timestamp),
        }),
        CodexRecord::Unknown => None,
    }
}

pub struct CodexLineParser;

impl LineParser for CodexLineParser {
    fn parse_line(&self, line: &str) -> Result<Option<ascope_types::Event>> {
        let record: CodexRecord = match serde_json::from_str(line) {
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
    fn normalizes_user_response_item() {
        let line = r#"{"type":"response_item","timestamp":"2026-01-01T00:00:00Z","payload":{"role":"user","content":[{"type":"input_text","text":"hi"}]}}"#;
        let record: CodexRecord = serde_json::from_str(line).unwrap();
        let event = normalize_record(&record).unwrap();
        match event {
            Event::User { message, .. } => assert_eq!(message.content, Content::Text("hi".into())),
            _ => panic!("expected user event"),
        }
    }

    #[test]
    fn normalizes_function_call_and_output() {
        let call = r#"{"type":"response_item","timestamp":"2026-01-01T00:00:01Z","payload":{"role":"assistant","content":[{"type":"function_call","call_id":"c1","name":"shell","arguments":{"cmd":"ls"}}]}}"#;
        let record: CodexRecord = serde_json::from_str(call).unwrap();
        let event = normalize_record(&record).unwrap();
        match event {
            Event::Assistant { message, .. } => match message.content {
                Content::Blocks(blocks) => assert!(matches!(blocks[0], Block::ToolUse { .. })),
                _ => panic!("expected blocks"),
            },
            _ => panic!("expected assistant event"),
        }
    }

    #[test]
    fn session_meta_is_dropped() {
        let line = r#"{"type":"session_meta","timestamp":"2026-01-01T00:00:00Z","payload":{"id":"s1","cwd":"/tmp"}}"#;
        let record: CodexRecord = serde_json::from_str(line).unwrap();
        assert!(normalize_record(&record).is_none());
    }
}


