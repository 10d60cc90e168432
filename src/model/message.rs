use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who authored a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderType {
    User,
    Agent,
    Tool,
    System,
}

/// The function portion of a tool call attached to an assistant message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallFunction {
    pub name: String,
    /// Raw JSON-encoded arguments, kept as a string the way provider APIs
    /// hand them back — parsed lazily by [`crate::processor::tool_call`].
    pub arguments: String,
}

/// A single tool call requested by an assistant message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub function: ToolCallFunction,
}

/// A persisted utterance by a user, agent, tool, or system.
///
/// `content` is always clean text — tool-call markup never leaks into it;
/// structured tool calls live in `tool_calls`. A message with
/// `sender_type == SenderType::Tool` always carries `tool_call_id`
/// (enforced by [`crate::store::Store::create_message`] callers, not by
/// this struct itself, since plain data types carry no invariants).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub thread_id: String,
    pub sender_id: String,
    pub sender_type: SenderType,
    pub content: String,
    pub tool_calls: Option<Vec<ToolCall>>,
    pub tool_call_id: Option<String>,
    pub sender_user_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Strip an accidental self-prefix like `[AgentName]:` or `@AgentName:`
    /// from the front of `content` — an LLM sometimes echoes its own
    /// speaker label, and a persisted Message should never carry it.
    pub fn strip_self_prefix(content: &str, agent_name: &str) -> String {
        let bracket_prefix = format!("[{agent_name}]:");
        let mention_prefix = format!("@{agent_name}:");
        let trimmed = content.trim_start();
        if let Some(rest) = trimmed.strip_prefix(&bracket_prefix) {
            return rest.trim_start().to_string();
        }
        if let Some(rest) = trimmed.strip_prefix(&mention_prefix) {
            return rest.trim_start().to_string();
        }
        trimmed.to_string()
    }
}
