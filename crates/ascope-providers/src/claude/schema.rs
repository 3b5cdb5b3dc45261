use serde::Deserialize;
use serde_json::Value;

/// Raw shapes written by the Claude Code CLI's JSONL transcript, one record
/// per line. Unknown top-level `type` values are accepted and ignored rather
/// than failing the whole file.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClaudeRecord {
    User(ClaudeUserRecord),
    Assistant(ClaudeAssistantRecord),
    Summary(ClaudeSummaryRecord),
    System(ClaudeSystemRecord),
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClaudeUserRecord {
    pub uuid: String,
    #[serde(rename = "parentUuid", default)]
    pub parent_uuid: Option<String>,
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub timestamp: String,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default, rename = "isSidechain")]
    pub is_sidechain: bool,
    #[serde(default, rename = "isMeta")]
    pub is_meta: bool,
    pub message: ClaudeUserMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClaudeUserMessage {
    pub content: ClaudeUserContent,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ClaudeUserContent {
    Text(String),
    Blocks(Vec<ClaudeContentBlock>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClaudeAssistantRecord {
    pub uuid: String,
    #[serde(rename = "parentUuid", default)]
    pub parent_uuid: Option<String>,
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub timestamp: String,
    #[serde(default)]
    pub cwd: Option<String>,
    pub message: ClaudeAssistantMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClaudeAssistantMessage {
    #[serde(default)]
    pub model: Option<String>,
    pub content: Vec<ClaudeContentBlock>,
    #[serde(default)]
    pub usage: Option<ClaudeUsage>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClaudeContentBlock {
    Text {
        text: String,
    },
    Thinking {
        thinking: String,
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
        content: ClaudeToolResultContent,
        #[serde(default)]
        is_error: bool,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(untagged)]
pub enum ClaudeToolResultContent {
    #[default]
    Empty,
    Text(String),
    Blocks(Vec<ClaudeContentBlock>),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClaudeUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub cache_creation_input_tokens: u64,
    #[serde(default)]
    pub cache_read_input_tokens: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClaudeSummaryRecord {
    pub summary: String,
    #[serde(rename = "leafUuid", default)]
    pub leaf_uuid: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClaudeSystemRecord {
    #[serde(default)]
    pub subtype: Option<String>,
    pub timestamp: String,
    #[serde(flatten)]
    pub data: Value,
}
