//! Synthetic session log generation.
//!
//! Builds JSONL content matching each provider's wire schema directly,
//! rather than reading static fixture files off disk, so a test can vary
//! session id, cwd, and tool-call shape without maintaining a sample-file
//! library alongside it.

use anyhow::Result;
use ascope_providers::ProducerAdapter;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};

/// One tool call/result cycle to fold into a generated session.
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
    pub output: String,
    pub is_error: bool,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            input: json!({}),
            output: "ok".to_string(),
            is_error: false,
        }
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }

    pub fn with_error(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self.is_error = true;
        self
    }
}

/// Places synthetic session files under a provider's project-encoded log
/// directory, mirroring how the real CLI agents lay their logs out on disk.
pub struct SampleFiles;

impl SampleFiles {
    pub fn new() -> Self {
        Self
    }

    /// Write a Claude Code-format session under `log_root`, encoded for
    /// `cwd` the same way the real Claude Code CLI would.
    pub fn write_claude_session(
        &self,
        log_root: &Path,
        session_id: &str,
        cwd: &str,
        calls: &[ToolCall],
    ) -> Result<PathBuf> {
        let producer = ascope_providers::claude::ClaudeProducer;
        let dir = log_root.join(producer.encode_workspace_path(Path::new(cwd)));
        fs::create_dir_all(&dir)?;

        let path = dir.join(format!("{session_id}.jsonl"));
        fs::write(&path, claude_session_jsonl(session_id, cwd, calls))?;
        Ok(path)
    }

    /// Write a codex-format session under `log_root`.
    pub fn write_codex_session(
        &self,
        log_root: &Path,
        session_id: &str,
        cwd: &str,
        calls: &[ToolCall],
    ) -> Result<PathBuf> {
        let producer = ascope_providers::codex::CodexProducer;
        let dir = log_root.join(producer.encode_workspace_path(Path::new(cwd)));
        fs::create_dir_all(&dir)?;

        let path = dir.join(format!("{session_id}.jsonl"));
        fs::write(&path, codex_session_jsonl(session_id, cwd, calls))?;
        Ok(path)
    }
}

impl Default for SampleFiles {
    fn default() -> Self {
        Self::new()
    }
}

/// Render a minimal but representative Claude Code transcript: one user
/// prompt, then one assistant turn per tool call (tool_use followed by a
/// user-role tool_result), then a closing assistant text turn with usage.
pub fn claude_session_jsonl(session_id: &str, cwd: &str, calls: &[ToolCall]) -> String {
    let mut lines = Vec::new();
    let mut uuid = 0u32;
    let mut next_uuid = || {
        uuid += 1;
        format!("{session_id}-{uuid:04}")
    };

    let first = next_uuid();
    lines.push(
        json!({
            "type": "user",
            "uuid": first,
            "sessionId": session_id,
            "timestamp": "2026-01-01T00:00:00Z",
            "cwd": cwd,
            "message": {"content": "fix the failing test"},
        })
        .to_string(),
    );
    let mut parent = first;

    for call in calls {
        let call_uuid = next_uuid();
        lines.push(
            json!({
                "type": "assistant",
                "uuid": call_uuid,
                "parentUuid": parent,
                "sessionId": session_id,
                "timestamp": "2026-01-01T00:00:01Z",
                "cwd": cwd,
                "message": {
                    "model": "claude-sonnet-4-5",
                    "content": [
                        {"type": "tool_use", "id": call.id, "name": call.name, "input": call.input},
                    ],
                },
            })
            .to_string(),
        );

        let result_uuid = next_uuid();
        lines.push(
            json!({
                "type": "user",
                "uuid": result_uuid,
                "parentUuid": call_uuid,
                "sessionId": session_id,
                "timestamp": "2026-01-01T00:00:02Z",
                "cwd": cwd,
                "message": {
                    "content": [
                        {"type": "tool_result", "tool_use_id": call.id, "content": call.output, "is_error": call.is_error},
                    ],
                },
            })
            .to_string(),
        );
        parent = result_uuid;
    }

    let closing = next_uuid();
    lines.push(
        json!({
            "type": "assistant",
            "uuid": closing,
            "parentUuid": parent,
            "sessionId": session_id,
            "timestamp": "2026-01-01T00:00:03Z",
            "cwd": cwd,
            "message": {
                "model": "claude-sonnet-4-5",
                "content": [{"type": "text", "text": "done"}],
                "usage": {"input_tokens": 1200, "output_tokens": 80, "cache_read_input_tokens": 400},
            },
        })
        .to_string(),
    );

    lines.join("\n") + "\n"
}

/// Render a minimal codex rollout log: a `session_meta` header, then one
/// `response_item` per role per turn.
pub fn codex_session_jsonl(session_id: &str, cwd: &str, calls: &[ToolCall]) -> String {
    let mut lines = Vec::new();

    lines.push(
        json!({
            "type": "session_meta",
            "timestamp": "2026-01-01T00:00:00Z",
            "payload": {"id": session_id, "cwd": cwd},
        })
        .to_string(),
    );

    lines.push(
        json!({
            "type": "response_item",
            "timestamp": "2026-01-01T00:00:00Z",
            "payload": {"role": "user", "content": [{"type": "input_text", "text": "fix the failing test"}]},
        })
        .to_string(),
    );

    for call in calls {
        lines.push(
            json!({
                "type": "response_item",
                "timestamp": "2026-01-01T00:00:01Z",
                "payload": {
                    "role": "assistant",
                    "model": "gpt-5-codex",
                    "content": [{"type": "function_call", "call_id": call.id, "name": call.name, "arguments": call.input}],
                },
            })
            .to_string(),
        );
        lines.push(
            json!({
                "type": "response_item",
                "timestamp": "2026-01-01T00:00:02Z",
                "payload": {
                    "role": "user",
                    "content": [{"type": "function_call_output", "call_id": call.id, "output": call.output, "success": !call.is_error}],
                },
            })
            .to_string(),
        );
    }

    lines.push(
        json!({
            "type": "response_item",
            "timestamp": "2026-01-01T00:00:03Z",
            "payload": {
                "role": "assistant",
                "model": "gpt-5-codex",
                "content": [{"type": "output_text", "text": "done"}],
                "usage": {"input_tokens": 1200, "output_tokens": 80, "cached_input_tokens": 400},
            },
        })
        .to_string(),
    );

    lines.join("\n") + "\n"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claude_fixture_is_one_json_object_per_line() {
        let body = claude_session_jsonl("sess-1", "/home/dev/project", &[ToolCall::new("call-1", "Bash")]);
        for line in body.lines() {
            serde_json::from_str::<serde_json::Value>(line).expect("valid json line");
        }
        assert_eq!(body.lines().count(), 4);
    }

    #[test]
    fn codex_fixture_is_one_json_object_per_line() {
        let body = codex_session_jsonl("sess-1", "/home/dev/project", &[ToolCall::new("call-1", "shell")]);
        for line in body.lines() {
            serde_json::from_str::<serde_json::Value>(line).expect("valid json line");
        }
        assert_eq!(body.lines().count(), 4);
    }
}
