//! Tool execution surface.
//!
//! [`RunnableTool`] is a single executable capability resolved by key, so
//! [`ToolCallProcessor`](crate::processor::tool_call::ToolCallProcessor)
//! never routes through a named external protocol. Input validation
//! against JSON Schema happens once, centrally, in
//! [`ToolRegistry::validate`] — individual tools are never asked to
//! validate their own input.

pub mod calculator;

use crate::error::{ConversantError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Context made available to a tool at execution time. Database access is
/// intentionally omitted — tools reach persistence through their own
/// dependencies if they need it, not through the engine's `Store`,
/// keeping the tool surface decoupled from storage.
#[derive(Clone)]
pub struct ToolContext {
    pub thread_id: String,
    pub sender_id: String,
    pub sender_type: &'static str,
}

/// Outcome of a single tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub output: Option<serde_json::Value>,
    pub error: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ToolResult {
    pub fn success(output: serde_json::Value) -> Self {
        Self {
            success: true,
            output: Some(output),
            error: None,
            metadata: HashMap::new(),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.into()),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// A named, schema-described executable capability.
#[async_trait]
pub trait RunnableTool: Send + Sync {
    fn key(&self) -> &str;
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> &serde_json::Value;
    async fn execute(&self, params: serde_json::Value, context: &ToolContext) -> ToolResult;
}

/// Enumerates available tools and validates/dispatches calls.
#[async_trait]
pub trait ToolRegistry: Send + Sync {
    fn list(&self) -> Vec<Arc<dyn RunnableTool>>;
    fn get(&self, key: &str) -> Option<Arc<dyn RunnableTool>>;

    /// Validate `params` against `tool`'s `inputSchema` before execution.
    /// Returns a human-readable message on violation.
    fn validate(&self, tool: &dyn RunnableTool, params: &serde_json::Value) -> Result<()> {
        let validator = jsonschema::validator_for(tool.input_schema())
            .map_err(|e| ConversantError::ToolValidation(format!("invalid schema: {e}")))?;
        let messages: Vec<String> = validator.iter_errors(params).map(|e| e.to_string()).collect();
        if messages.is_empty() {
            Ok(())
        } else {
            Err(ConversantError::ToolValidation(messages.join("; ")))
        }
    }
}

/// A simple in-process [`ToolRegistry`] backed by a name→tool map.
/// API- and MCP-generated tools are adapted into [`RunnableTool`]s and
/// added the same way as any native tool.
#[derive(Default, Clone)]
pub struct InMemoryToolRegistry {
    tools: HashMap<String, Arc<dyn RunnableTool>>,
}

impl InMemoryToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tool(mut self, tool: Arc<dyn RunnableTool>) -> Self {
        self.tools.insert(tool.key().to_string(), tool);
        self
    }

    pub fn register(&mut self, tool: Arc<dyn RunnableTool>) {
        self.tools.insert(tool.key().to_string(), tool);
    }
}

#[async_trait]
impl ToolRegistry for InMemoryToolRegistry {
    fn list(&self) -> Vec<Arc<dyn RunnableTool>> {
        self.tools.values().cloned().collect()
    }

    fn get(&self, key: &str) -> Option<Arc<dyn RunnableTool>> {
        self.tools.get(key).cloned()
    }
}
