//! `ToolResultProcessor`.

use crate::deps::EngineDeps;
use crate::error::Result;
use crate::model::{Event, EventPayload, EventType, SenderType};
use crate::processor::Processor;
use crate::store::{EnqueueSpec, NewMessage};
use async_trait::async_trait;
use std::collections::HashMap;

pub struct ToolResultProcessor;

#[async_trait]
impl Processor for ToolResultProcessor {
    fn handles(&self) -> EventType {
        EventType::ToolResult
    }

    /// Persists the tool-result Message unconditionally, before the
    /// `onEvent` interception point. Splitting this out of `process` (rather
    /// than folding it into the fan-out below) means an `EventOverride::Drop`
    /// on this event only suppresses the re-drive MESSAGE event produced by
    /// `process` — the Message itself survives as a pre-event, per spec
    /// §4.8's closing paragraph ("tool-result Messages are persisted but
    /// their fan-out MESSAGE events are suppressed").
    async fn pre_process(&self, event: &Event, deps: &EngineDeps) -> Result<Vec<EnqueueSpec>> {
        let EventPayload::ToolResult {
            agent_name,
            call_id,
            output,
            error,
        } = &event.payload
        else {
            return Ok(Vec::new());
        };

        let content = format_content(output.as_ref(), error.as_deref());

        deps.store
            .create_message(NewMessage {
                thread_id: event.thread_id.clone(),
                sender_id: agent_name.clone(),
                sender_type: SenderType::Tool,
                content,
                tool_calls: None,
                tool_call_id: Some(call_id.clone()),
                sender_user_id: None,
            })
            .await?;
        deps.caches.invalidate_thread(&event.thread_id).await;
        Ok(Vec::new())
    }

    async fn process(&self, event: &Event, _deps: &EngineDeps) -> Result<Vec<EnqueueSpec>> {
        let EventPayload::ToolResult {
            agent_name,
            call_id,
            output,
            error,
        } = &event.payload
        else {
            return Ok(Vec::new());
        };

        let content = format_content(output.as_ref(), error.as_deref());

        let mut metadata = HashMap::new();
        metadata.insert(
            crate::processor::ALREADY_PERSISTED_KEY.to_string(),
            serde_json::Value::Bool(true),
        );
        Ok(vec![EnqueueSpec::new(
            event.thread_id.clone(),
            EventPayload::Message {
                sender_id: agent_name.clone(),
                sender_type: SenderType::Tool,
                content: Some(content),
                tool_calls: None,
                tool_call_id: Some(call_id.clone()),
                metadata,
            },
        )])
    }
}

fn format_content(output: Option<&serde_json::Value>, error: Option<&str>) -> String {
    if let Some(err) = error {
        return format!("tool error: {err}\n\nPlease review the error above and try again with the correct format.");
    }
    match output {
        Some(serde_json::Value::String(s)) => format!("tool output: {s}"),
        Some(value) => format!("tool output: {value}"),
        None => "tool completed: No output returned".to_string(),
    }
}
