//! Core data model for the memory hierarchy: agents, archival entries,
//! conversation rows, and the working-memory document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Identity for the memory hierarchy. Created once; system memory is only
/// rewritten by the startup migration hook when the default template shape
/// changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub model_id: String,
    pub system_memory_text: String,
    pub working_memory_text: String,
    pub fifo_capacity: usize,
    pub workspace_root: PathBuf,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A durable archival row: `{agent, content, vector, metadata}`.
///
/// Invariant: `dim(vector) == D` and `agent == owner` for every row that made
/// it past [`crate::error::EngineError::Validation`] at insert time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub id: String,
    pub agent_id: String,
    pub content: String,
    pub vector: Vec<f32>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// The role of a persisted conversation row.
///
/// Distinct from [`crate::tool::Role`], the wire role handed to the chat
/// client — a `ConversationRole` tracks *why* a row exists (e.g. linking a
/// `ToolCall` to its `ToolResult` by correlation id), while `Role` is the
/// assembled message role the chat client actually sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationRole {
    User,
    Assistant,
    ToolCall,
    ToolResult,
    SystemAnnouncement,
}

impl ConversationRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationRole::User => "user",
            ConversationRole::Assistant => "assistant",
            ConversationRole::ToolCall => "tool_call",
            ConversationRole::ToolResult => "tool_result",
            ConversationRole::SystemAnnouncement => "system_announcement",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            "tool_call" => Some(Self::ToolCall),
            "tool_result" => Some(Self::ToolResult),
            "system_announcement" => Some(Self::SystemAnnouncement),
            _ => None,
        }
    }

    /// Whether an entry of this role is eligible for archival promotion on
    /// FIFO overflow (§4.2): only non-empty user/assistant/tool_result rows.
    pub fn overflow_eligible(&self) -> bool {
        matches!(self, Self::User | Self::Assistant | Self::ToolResult)
    }
}

/// One row of the append-only conversation log. The in-memory FIFO view is
/// the last K rows for an agent; the log itself is never pruned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub id: String,
    pub agent_id: String,
    pub role: ConversationRole,
    pub content: String,
    pub tool_name: Option<String>,
    pub tool_args: Option<serde_json::Value>,
    pub tool_correlation_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ConversationEntry {
    pub fn is_overflow_eligible(&self) -> bool {
        self.role.overflow_eligible() && !self.content.trim().is_empty()
    }
}

/// A single mutable, size-capped document per agent. Opaque key-value text
/// from the engine's perspective — only size is validated.
pub const WORKING_MEMORY_CAP_BYTES: usize = 2048;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WorkingMemory(pub serde_json::Map<String, serde_json::Value>);

impl WorkingMemory {
    pub fn from_text(text: &str) -> Self {
        if text.trim().is_empty() {
            return Self::default();
        }
        match serde_json::from_str::<serde_json::Value>(text) {
            Ok(serde_json::Value::Object(map)) => Self(map),
            _ => Self::default(),
        }
    }

    pub fn to_text(&self) -> String {
        serde_json::to_string_pretty(&self.0).unwrap_or_default()
    }

    pub fn byte_len(&self) -> usize {
        self.to_text().len()
    }
}
