use serde::Deserialize;
use serde_json::Value;

/// Raw shapes for the codex-style rollout log: snake_case fields, a
/// `session_meta` header record instead of an implicit first user message,
/// and response items keyed by `role` rather than a dedicated `user`/
/// `assistant` record type. Kept deliberately distinct from Claude's schema
/// to exercise the producer trait against a genuinely different format.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CodexRecord {
    SessionMeta(CodexSessionMeta),
    ResponseItem(CodexResponseItem),
    EventMsg(CodexEventMsg),
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CodexSessionMeta {
    pub timestamp: String,
    pub payload: CodexSessionMetaPayload,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CodexSessionMetaPayload {
    pub id: String,
    pub cwd: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CodexResponseItem {
    pub timestamp: String,
    pub payload: CodexResponseItemPayload,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CodexResponseItemPayload {
    pub role: CodexRole,
    #[serde(default)]
    pub content: Vec<CodexContentItem>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub usage: Option<CodexUsage>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CodexRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CodexContentItem {
    InputText { text: String },
    OutputText { text: String },
    Reasoning { text: String },
    FunctionCall { call_id: String, name: String, #[serde(default)] arguments: Value },
    FunctionCallOutput { call_id: String, output: String, #[serde(default)] success: Option<bool> },
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CodexUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub cached_input_tokens: u64,
    #[serde(default)]
    pub reasoning_output_tokens: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CodexEventMsg {
    pub timestamp: String,
    #[serde(default)]
    pub payload: Value,
}
