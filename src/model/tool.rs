use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity and JSON Schema for a tool.
///
/// This is the catalog-facing description; the executable behavior lives
/// behind [`crate::tools::RunnableTool`]. Keeping the two separate lets a
/// tool be listed, documented, and schema-checked without pulling in
/// whatever closure or dependency actually runs it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub key: String,
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// Outcome of a single tool execution, append-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolLogStatus {
    Success,
    Error,
}

/// An append-only audit row written after every tool execution attempt,
/// including validation failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolLog {
    pub id: String,
    pub thread_id: String,
    pub tool_name: String,
    pub tool_input: serde_json::Value,
    pub tool_output: Option<serde_json::Value>,
    pub status: ToolLogStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}
