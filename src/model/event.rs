use crate::model::message::{SenderType, ToolCall};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Discriminant for [`Event::event_type`] — kept separate from
/// [`EventPayload`]'s own tag so the store can index/filter on type
/// without deserializing the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Message,
    ToolCall,
    ToolResult,
    System,
    /// Domain-specific events (e.g. knowledge-base ingestion) outside the
    /// four built-in types; carried opaquely, since only the built-in
    /// types have a default processor.
    Custom,
}

/// Queue item status. `Completed` and `Failed` are terminal — nothing
/// transitions out of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// The heterogeneous payload carried by an [`Event`], represented as a
/// tagged union keyed by event type. Persisted as typed JSON with a
/// `type` discriminator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventPayload {
    #[serde(rename = "MESSAGE")]
    Message {
        sender_id: String,
        sender_type: SenderType,
        #[serde(default)]
        content: Option<String>,
        #[serde(default)]
        tool_calls: Option<Vec<ToolCall>>,
        #[serde(default)]
        tool_call_id: Option<String>,
        #[serde(default)]
        metadata: HashMap<String, serde_json::Value>,
    },
    #[serde(rename = "TOOL_CALL")]
    ToolCall {
        agent_name: String,
        call: ToolCall,
    },
    #[serde(rename = "TOOL_RESULT")]
    ToolResult {
        agent_name: String,
        call_id: String,
        #[serde(default)]
        output: Option<serde_json::Value>,
        #[serde(default)]
        error: Option<String>,
    },
    #[serde(rename = "SYSTEM")]
    System {
        #[serde(default)]
        content: Option<String>,
        #[serde(default)]
        metadata: HashMap<String, serde_json::Value>,
    },
    /// Fallback for domain-specific event types (e.g. `KB_INGEST`) that
    /// have no core processor; carried as an opaque JSON blob so the
    /// queue remains generic over future event types.
    #[serde(rename = "CUSTOM")]
    Custom {
        type_name: String,
        data: serde_json::Value,
    },
}

impl EventPayload {
    pub fn event_type(&self) -> EventType {
        match self {
            EventPayload::Message { .. } => EventType::Message,
            EventPayload::ToolCall { .. } => EventType::ToolCall,
            EventPayload::ToolResult { .. } => EventType::ToolResult,
            EventPayload::System { .. } => EventType::System,
            EventPayload::Custom { .. } => EventType::Custom,
        }
    }
}

/// A durable queue item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub thread_id: String,
    pub payload: EventPayload,
    pub parent_event_id: Option<String>,
    pub trace_id: Option<String>,
    pub priority: i32,
    pub status: EventStatus,
    pub ttl_ms: Option<u64>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn event_type(&self) -> EventType {
        self.payload.event_type()
    }

    /// `true` when `ttl_ms` was set and `expires_at` has already passed —
    /// such events are skipped and marked `failed` with reason `expired`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now >= expires_at,
            None => false,
        }
    }
}
