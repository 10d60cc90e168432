//! `ToolCallProcessor`.

use crate::callbacks::Override;
use crate::deps::EngineDeps;
use crate::error::Result;
use crate::model::{Event, EventPayload, EventType, ToolLogStatus};
use crate::processor::Processor;
use crate::store::{EnqueueSpec, NewToolLog};
use crate::tools::ToolContext;
use async_trait::async_trait;
use tokio::time::{timeout, Duration};

pub struct ToolCallProcessor;

#[async_trait]
impl Processor for ToolCallProcessor {
    fn handles(&self) -> EventType {
        EventType::ToolCall
    }

    async fn process(&self, event: &Event, deps: &EngineDeps) -> Result<Vec<EnqueueSpec>> {
        let EventPayload::ToolCall { agent_name, call } = &event.payload else {
            return Ok(Vec::new());
        };

        // Step 1: resolve agent by name; if missing, no-op.
        let Some(agent) = deps.agent_by_name(agent_name) else {
            return Ok(Vec::new());
        };

        // Step 2: assemble tool list restricted to agent.allowedTools.
        let Some(tool) = deps
            .tools
            .get(&call.function.name)
            .filter(|t| agent.can_use_tool(t.key()))
        else {
            return emit_error_result(
                event,
                agent_name,
                &call.id,
                &call.function.name,
                &call.function.arguments,
                format!("unknown or unauthorized tool: {}", call.function.name),
                deps,
            )
            .await;
        };

        // Step 3: parse arguments, retaining the raw string on parse
        // failure for auditing.
        let parsed: serde_json::Value = match serde_json::from_str(&call.function.arguments) {
            Ok(value) => value,
            Err(_) => serde_json::Value::String(call.function.arguments.clone()),
        };

        // Step 4: validate against inputSchema.
        if let Err(e) = deps.tools.validate(tool.as_ref(), &parsed) {
            return emit_error_result(
                event,
                agent_name,
                &call.id,
                tool.key(),
                &call.function.arguments,
                e.to_string(),
                deps,
            )
            .await;
        }

        // Step 5: execute with per-tool timeout.
        let context = ToolContext {
            thread_id: event.thread_id.clone(),
            sender_id: agent.name.clone(),
            sender_type: "agent",
        };

        let mut on_calling_override: Option<crate::model::ToolCall> = None;
        if let Some(hook) = &deps.callbacks.on_tool_calling {
            match hook(call.clone()) {
                Override::UseOriginal => {}
                Override::Replace(replaced) => on_calling_override = Some(replaced),
                Override::Drop => return Ok(Vec::new()),
            }
        }
        let effective_call = on_calling_override.unwrap_or_else(|| call.clone());

        let timeout_ms = deps.config.default_tool_timeout_ms;
        let execution = timeout(Duration::from_millis(timeout_ms), tool.execute(parsed.clone(), &context)).await;

        let result = match execution {
            Ok(result) => result,
            Err(_) => crate::tools::ToolResult::failure(format!(
                "tool `{}` timed out after {timeout_ms}ms",
                tool.key()
            )),
        };

        // Step 6: append a tool_log row.
        deps.store
            .create_tool_logs(vec![NewToolLog {
                thread_id: event.thread_id.clone(),
                tool_name: tool.key().to_string(),
                tool_input: parsed,
                tool_output: result.output.clone(),
                status: if result.success { ToolLogStatus::Success } else { ToolLogStatus::Error },
                error_message: result.error.clone(),
            }])
            .await?;

        let result_json = serde_json::to_value(&result).unwrap_or(serde_json::Value::Null);
        let final_output = match &deps.callbacks.on_tool_completed {
            Some(hook) => match hook(result_json.clone()) {
                Override::UseOriginal => result_json,
                Override::Replace(replaced) => replaced,
                Override::Drop => return Ok(Vec::new()),
            },
            None => result_json,
        };
        let final_result: crate::tools::ToolResult =
            serde_json::from_value(final_output).unwrap_or(result);

        // Step 7: emit TOOL_RESULT.
        Ok(vec![EnqueueSpec::new(
            event.thread_id.clone(),
            EventPayload::ToolResult {
                agent_name: agent_name.clone(),
                call_id: effective_call.id.clone(),
                output: final_result.output,
                error: final_result.error,
            },
        )])
    }
}

#[allow(clippy::too_many_arguments)]
async fn emit_error_result(
    event: &Event,
    agent_name: &str,
    call_id: &str,
    tool_name: &str,
    raw_input: &str,
    message: String,
    deps: &EngineDeps,
) -> Result<Vec<EnqueueSpec>> {
    deps.store
        .create_tool_logs(vec![NewToolLog {
            thread_id: event.thread_id.clone(),
            tool_name: tool_name.to_string(),
            tool_input: serde_json::Value::String(raw_input.to_string()),
            tool_output: None,
            status: ToolLogStatus::Error,
            error_message: Some(message.clone()),
        }])
        .await?;

    Ok(vec![EnqueueSpec::new(
        event.thread_id.clone(),
        EventPayload::ToolResult {
            agent_name: agent_name.to_string(),
            call_id: call_id.to_string(),
            output: None,
            error: Some(message),
        },
    )])
}
