//! Arithmetic tool built on `evalexpr`'s expression evaluator, exposed
//! through the [`RunnableTool`] trait with a JSON Schema input. Kept as
//! the crate's canonical example of a concrete tool, exercised directly
//! in the `tools` test module and in integration tests as a stand-in for
//! any native tool.

use crate::tools::{RunnableTool, ToolContext, ToolResult};
use async_trait::async_trait;
use evalexpr::eval;
use serde_json::json;

pub struct CalculatorTool {
    schema: serde_json::Value,
}

impl CalculatorTool {
    pub fn new() -> Self {
        Self {
            schema: json!({
                "type": "object",
                "properties": {
                    "expression": {
                        "type": "string",
                        "description": "An arithmetic expression, e.g. \"15 + 27\"."
                    }
                },
                "required": ["expression"],
                "additionalProperties": false
            }),
        }
    }
}

impl Default for CalculatorTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RunnableTool for CalculatorTool {
    fn key(&self) -> &str {
        "calculator"
    }

    fn name(&self) -> &str {
        "Calculator"
    }

    fn description(&self) -> &str {
        "Evaluates an arithmetic expression and returns the numeric result."
    }

    fn input_schema(&self) -> &serde_json::Value {
        &self.schema
    }

    async fn execute(&self, params: serde_json::Value, _context: &ToolContext) -> ToolResult {
        let expression = match params.get("expression").and_then(|v| v.as_str()) {
            Some(expr) => expr,
            None => return ToolResult::failure("missing required field `expression`"),
        };
        match eval(expression) {
            Ok(value) => ToolResult::success(json!({ "result": value.to_string() })),
            Err(e) => ToolResult::failure(format!("failed to evaluate expression: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ToolContext {
        ToolContext {
            thread_id: "t1".into(),
            sender_id: "Calculator".into(),
            sender_type: "agent",
        }
    }

    #[tokio::test]
    async fn evaluates_simple_addition() {
        let tool = CalculatorTool::new();
        let result = tool
            .execute(json!({"expression": "15 + 27"}), &ctx())
            .await;
        assert!(result.success);
        assert_eq!(result.output.unwrap()["result"], "42");
    }

    #[tokio::test]
    async fn reports_parse_errors_as_failure() {
        let tool = CalculatorTool::new();
        let result = tool
            .execute(json!({"expression": "not an expression"}), &ctx())
            .await;
        assert!(!result.success);
        assert!(result.error.is_some());
    }
}
