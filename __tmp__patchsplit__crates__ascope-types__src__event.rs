use crate::content::Content;
use crate::usage::Usage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// A single chat turn as emitted by the producer: one role, one content
/// payload, and the token accounting the provider attached to it (if any).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Content,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_mode: Option<String>,
}

/// One record in a session's raw event stream.
///
/// This is the wire shape a producer emits to the incremental reader; it is
/// deliberately per-*message*, not per-content-block, so a single assistant
/// turn interleaving reasoning, text and tool_use blocks is one `Assistant`
/// event with an ordered `Content::Blocks` payload, not N separate events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    User {
        #[serde(flatten)]
        message: Message,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        uuid: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_uuid: Option<String>,
        timestamp: DateTime<Utc>,
    },
    Assistant {
        #[serde(flatten)]
        message: Message,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        uuid: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_uuid: Option<String>,
        timestamp: DateTime<Utc>,
    },
    /// A standalone tool result, used by producers that report results out of
    /// band from the assistant message that issued the call.
    ToolResult {
        tool_use_id: String,
        content: Content,
        #[serde(default)]
        is_error: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration_ms: Option<u64>,
        timestamp: DateTime<Utc>,
    },
    /// Provider-level summary/compaction marker (e.g. Claude's `summary` record
    /// written when a session's context is condensed).
    Summary {
        summary: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        leaf_uuid: Option<String>,
    },
    /// Everything else: slash commands, queue operations, notifications, and
    /// provider-specific control records that the aggregator inspects by
    /// `subtype` rather than by a dedicated variant.
    System {
        subtype: String,
        #[serde(default)]
        data: Value,
        timestamp: DateTime<Utc>,
    },
}

impl Event {
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Event::User { timestamp, .. }
            | Event::Assistant { timestamp, .. }
            | Event::ToolResult { timestamp, .. }
            | Event::System { timestamp, .. } => Some(*timestamp),
            Event::Summary { .. } => None,
        }
    }

    pub fn uuid(&self) -> Option<&str> {
        match self {
            Event::User { uuid, .. } | Event::Assistant { uuid, .. } => uuid.as_deref(),
            _ => None,
        }
    }

    pub fn parent_uuid(&self) -> Option<&str> {
        match self {
            Event::User { parent_uuid, .. } | Event::Assistant { parent_uuid, .. } => {
                parent_uuid.as_deref()
            }
            _ => None,
        }
    }

    pub fn is_user(&self) -> bool {
        matches!(self, Event::User { .. })
    }

    pub fn is_assistant(&self) -> bool {
        matches!(self, Event::Assistant { .. })
    }
}
