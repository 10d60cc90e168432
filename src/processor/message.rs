//! `MessageProcessor`.

use crate::callbacks::{InterceptedNotice, LlmCompletedPayload, Override};
use crate::context_builder::ContextBuilder;
use crate::deps::EngineDeps;
use crate::error::Result;
use crate::llm::{ChatConfig, ChatMessage, ChatRole, ChatToolDefinition};
use crate::model::{
    AgentConfig, AgentType, Event, EventPayload, EventType, Message, ProgrammaticInput,
    SenderType, ToolCall, ToolCallFunction,
};
use crate::processor::Processor;
use crate::router::{parse_mentions, Router};
use crate::store::{EnqueueSpec, NewMessage};
use async_trait::async_trait;
use std::collections::HashMap;

/// Messages of history considered when building an agent's context. The
/// spec leaves the exact number unspecified ("up to `limit`"); this is a
/// generous default that keeps prompts bounded without truncating any
/// conversation a human would actually hold.
const HISTORY_LIMIT: usize = 100;

pub struct MessageProcessor;

#[async_trait]
impl Processor for MessageProcessor {
    fn handles(&self) -> EventType {
        EventType::Message
    }

    async fn pre_process(&self, event: &Event, deps: &EngineDeps) -> Result<Vec<EnqueueSpec>> {
        let EventPayload::Message {
            sender_id,
            sender_type,
            content,
            tool_calls,
            tool_call_id,
            metadata,
        } = &event.payload
        else {
            return Ok(Vec::new());
        };

        if metadata.contains_key(crate::processor::ALREADY_PERSISTED_KEY) {
            return Ok(Vec::new());
        }

        if let Some(text) = content.as_deref().filter(|c| !c.is_empty()) {
            let mut new_message = NewMessage {
                thread_id: event.thread_id.clone(),
                sender_id: sender_id.clone(),
                sender_type: *sender_type,
                content: text.to_string(),
                tool_calls: tool_calls.clone(),
                tool_call_id: tool_call_id.clone(),
                sender_user_id: None,
            };
            if let Some(hook) = &deps.callbacks.on_message_received {
                let draft = draft_message(&new_message);
                match hook(draft.clone()) {
                    Override::UseOriginal => {}
                    Override::Replace(replaced) => {
                        deps.callbacks.notify_intercepted(InterceptedNotice {
                            callback_type: "onMessageReceived",
                            original_value: draft.content.clone(),
                            intercepted_value: replaced.content.clone(),
                        });
                        new_message.content = replaced.content;
                        new_message.tool_calls = replaced.tool_calls;
                    }
                    Override::Drop => return Ok(Vec::new()),
                }
            }

            let message = deps.store.create_message(new_message).await?;
            deps.caches.invalidate_thread(&event.thread_id).await;
            if let Some(hook) = &deps.callbacks.on_message_sent {
                hook(message);
            }
        }
        Ok(Vec::new())
    }

    async fn process(&self, event: &Event, deps: &EngineDeps) -> Result<Vec<EnqueueSpec>> {
        let EventPayload::Message {
            sender_id,
            sender_type,
            content,
            ..
        } = &event.payload
        else {
            return Ok(Vec::new());
        };

        let Some(thread) = deps.get_thread_cached(&event.thread_id).await? else {
            return Ok(Vec::new());
        };

        let sender_agent = if *sender_type == SenderType::Agent {
            deps.agent_by_name(sender_id)
        } else {
            None
        };

        let mut targets = Router::route(&event.payload, &thread, &deps.agents, sender_agent);
        // Duplicate target agents per event are deduplicated by name
        // before processing.
        let mut seen = std::collections::HashSet::new();
        targets.retain(|a| seen.insert(a.name.clone()));

        let mut produced = Vec::new();
        // Processed sequentially, not concurrently, to preserve per-thread
        // seriality and history ordering.
        for target in targets {
            let target_events = process_for_target(event, content.as_deref(), target, &thread, deps).await?;
            produced.extend(target_events);
        }
        Ok(produced)
    }
}

async fn process_for_target(
    event: &Event,
    _incoming_content: Option<&str>,
    agent: &AgentConfig,
    thread: &crate::model::Thread,
    deps: &EngineDeps,
) -> Result<Vec<EnqueueSpec>> {
    let history = deps
        .get_history_cached(&event.thread_id, &agent.name, HISTORY_LIMIT)
        .await?;

    match agent.agent_type {
        AgentType::Programmatic => process_programmatic(event, agent, history, deps).await,
        AgentType::Agentic => process_agentic(event, agent, thread, history, deps).await,
    }
}

async fn process_programmatic(
    event: &Event,
    agent: &AgentConfig,
    history: Vec<Message>,
    deps: &EngineDeps,
) -> Result<Vec<EnqueueSpec>> {
    let Some(handler) = &agent.processing_function else {
        return Ok(Vec::new());
    };
    let message_content = last_content(&history);
    let output = handler
        .run(ProgrammaticInput {
            message_content,
            history,
        })
        .await;

    let mut produced = Vec::new();
    let mut persisted_content = String::new();
    if let Some(content) = output.content.filter(|c| !c.is_empty()) {
        let message = deps
            .store
            .create_message(NewMessage {
                thread_id: event.thread_id.clone(),
                sender_id: agent.name.clone(),
                sender_type: SenderType::Agent,
                content: content.clone(),
                tool_calls: None,
                tool_call_id: None,
                sender_user_id: None,
            })
            .await?;
        deps.caches.invalidate_thread(&event.thread_id).await;
        if let Some(hook) = &deps.callbacks.on_message_sent {
            hook(message);
        }
        persisted_content = content;
    }

    for call in &output.tool_calls {
        produced.push(EnqueueSpec::new(
            event.thread_id.clone(),
            EventPayload::ToolCall {
                agent_name: agent.name.clone(),
                call: call.clone(),
            },
        ));
    }

    if output.should_continue || !parse_mentions(&persisted_content).is_empty() {
        produced.push(EnqueueSpec::new(
            event.thread_id.clone(),
            EventPayload::Message {
                sender_id: agent.name.clone(),
                sender_type: SenderType::Agent,
                content: Some(persisted_content),
                tool_calls: None,
                tool_call_id: None,
                metadata: already_persisted_marker(),
            },
        ));
    }

    Ok(produced)
}

async fn process_agentic(
    event: &Event,
    agent: &AgentConfig,
    thread: &crate::model::Thread,
    history: Vec<Message>,
    deps: &EngineDeps,
) -> Result<Vec<EnqueueSpec>> {
    let system_prompt = ContextBuilder::build(agent, thread, &deps.agents, None);
    let mut chat_messages = vec![ChatMessage::system(system_prompt)];
    chat_messages.extend(history.iter().map(|m| to_chat_message(m, agent)));

    // Mirrors the teacher's tool-loop cap: once an agent has chased its
    // own tool calls `max_tool_iterations` times in a row with no other
    // participant's message in between, stop offering it tools so the
    // turn is forced to conclude with whatever answer it has.
    let exhausted_tool_budget =
        trailing_tool_iterations(&history, &agent.name) >= deps.config.max_tool_iterations;

    let chat_tools: Vec<ChatToolDefinition> = if exhausted_tool_budget {
        Vec::new()
    } else {
        deps.tools
            .list()
            .into_iter()
            .filter(|t| agent.can_use_tool(t.key()))
            .map(|t| ChatToolDefinition {
                name: t.key().to_string(),
                description: t.description().to_string(),
                parameters_schema: t.input_schema().clone(),
            })
            .collect()
    };

    let config = ChatConfig::from(agent);
    let stream = build_stream_callback(deps);
    let response = deps.llm.chat(&chat_messages, &chat_tools, &config, stream).await?;

    if !response.success {
        let payload = LlmCompletedPayload {
            agent: agent.clone(),
            success: false,
            answer: None,
            error: response.error.clone(),
        };
        invoke_on_llm_completed(deps, payload);
        return Ok(Vec::new());
    }

    let original_answer = response.answer.clone().unwrap_or_default();
    let mut payload = LlmCompletedPayload {
        agent: agent.clone(),
        success: true,
        answer: Some(original_answer.clone()),
        error: None,
    };
    if let Some(hook) = &deps.callbacks.on_llm_completed {
        match hook(payload.clone()) {
            Override::UseOriginal => {}
            Override::Replace(replaced) => {
                deps.callbacks.notify_intercepted(InterceptedNotice {
                    callback_type: "onLLMCompleted",
                    original_value: original_answer.clone(),
                    intercepted_value: replaced.answer.clone().unwrap_or_default(),
                });
                payload = replaced;
            }
            Override::Drop => return Ok(Vec::new()),
        }
    }

    let answer = payload.answer.unwrap_or_default();
    let clean_answer = Message::strip_self_prefix(&answer, &agent.name);

    let mut produced = Vec::new();
    let mut call_ids_seen = std::collections::HashSet::new();
    let tool_calls: Vec<ToolCall> = response
        .tool_calls
        .iter()
        .enumerate()
        .map(|(i, call)| {
            let id = if call.id.is_empty() || !call_ids_seen.insert(call.id.clone()) {
                format!("call_{i}")
            } else {
                call.id.clone()
            };
            ToolCall {
                id,
                function: ToolCallFunction {
                    name: call.function.name.clone(),
                    arguments: call.function.arguments.clone(),
                },
            }
        })
        .collect();

    if !clean_answer.is_empty() {
        let message = deps
            .store
            .create_message(NewMessage {
                thread_id: event.thread_id.clone(),
                sender_id: agent.name.clone(),
                sender_type: SenderType::Agent,
                content: clean_answer.clone(),
                tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls.clone()) },
                tool_call_id: None,
                sender_user_id: None,
            })
            .await?;
        deps.caches.invalidate_thread(&event.thread_id).await;
        if let Some(hook) = &deps.callbacks.on_message_sent {
            hook(message);
        }
    }

    for call in &tool_calls {
        produced.push(EnqueueSpec::new(
            event.thread_id.clone(),
            EventPayload::ToolCall {
                agent_name: agent.name.clone(),
                call: call.clone(),
            },
        ));
    }

    // Not emitted if answer empty, even when content is
    // empty but tool calls exist — the MESSAGE event for routing purposes
    // is reserved for a non-empty answer; pure tool-use turns re-drive via
    // the TOOL_RESULT -> MESSAGE path instead.
    if !clean_answer.is_empty() {
        produced.push(EnqueueSpec::new(
            event.thread_id.clone(),
            EventPayload::Message {
                sender_id: agent.name.clone(),
                sender_type: SenderType::Agent,
                content: Some(clean_answer),
                tool_calls: None,
                tool_call_id: None,
                metadata: already_persisted_marker(),
            },
        ));
    }

    Ok(produced)
}

/// A not-yet-persisted stand-in `Message` for the `onMessageReceived`
/// hook: `id` is empty and `created_at` is the call time, since neither
/// exists until `Store::create_message` assigns them.
fn draft_message(new_message: &NewMessage) -> Message {
    Message {
        id: String::new(),
        thread_id: new_message.thread_id.clone(),
        sender_id: new_message.sender_id.clone(),
        sender_type: new_message.sender_type,
        content: new_message.content.clone(),
        tool_calls: new_message.tool_calls.clone(),
        tool_call_id: new_message.tool_call_id.clone(),
        sender_user_id: new_message.sender_user_id.clone(),
        created_at: chrono::Utc::now(),
    }
}

/// Marks a re-drive MESSAGE event as already reflected in the Message
/// table, so [`MessageProcessor::pre_process`] doesn't write it twice.
fn already_persisted_marker() -> HashMap<String, serde_json::Value> {
    let mut metadata = HashMap::new();
    metadata.insert(
        crate::processor::ALREADY_PERSISTED_KEY.to_string(),
        serde_json::Value::Bool(true),
    );
    metadata
}

fn to_chat_message(message: &Message, current_agent: &AgentConfig) -> ChatMessage {
    if message.sender_type == SenderType::Agent && message.sender_id == current_agent.name {
        return ChatMessage::assistant(
            message.content.clone(),
            message.tool_calls.clone().unwrap_or_default(),
        );
    }
    if message.sender_type == SenderType::Tool {
        let content = format!("[Tool Result]: {}", message.content);
        return ChatMessage::tool(content, message.tool_call_id.clone().unwrap_or_default());
    }
    if message.sender_type == SenderType::System {
        return ChatMessage::system(message.content.clone());
    }
    ChatMessage::user(format!("[{}]: {}", message.sender_id, message.content))
}

/// Counts consecutive tool-result messages at the tail of `history`
/// attributed to `agent_name` — one per completed TOOL_CALL round-trip
/// in the agent's current turn. A pure tool-use reply persists no agent
/// Message (spec §4.5's empty-answer boundary case), so the tool-result
/// messages are the only durable signal of how many rounds have run
/// since anyone else last spoke; an intervening message resets the count.
fn trailing_tool_iterations(history: &[Message], agent_name: &str) -> usize {
    history
        .iter()
        .rev()
        .take_while(|m| m.sender_type == SenderType::Tool && m.sender_id == agent_name)
        .count()
}

fn last_content(history: &[Message]) -> String {
    history.last().map(|m| m.content.clone()).unwrap_or_default()
}

fn build_stream_callback(deps: &EngineDeps) -> Option<crate::llm::StreamCallback> {
    if deps.callbacks.on_token_stream.is_none()
        && deps.callbacks.on_content_stream.is_none()
        && deps.callbacks.on_tool_call_stream.is_none()
    {
        return None;
    }
    let callbacks = deps.callbacks.clone();
    Some(std::sync::Arc::new(move |event| {
        use crate::llm::StreamEvent;
        match event {
            StreamEvent::Content(text) => {
                if let Some(hook) = &callbacks.on_token_stream {
                    hook(text.clone());
                }
                if let Some(hook) = &callbacks.on_content_stream {
                    hook(text);
                }
            }
            StreamEvent::ToolCallDelta { arguments_fragment, .. } => {
                if let Some(hook) = &callbacks.on_tool_call_stream {
                    hook(arguments_fragment);
                }
            }
            StreamEvent::End => {}
        }
    }))
}

fn invoke_on_llm_completed(deps: &EngineDeps, payload: LlmCompletedPayload) {
    if let Some(hook) = &deps.callbacks.on_llm_completed {
        let _ = hook(payload);
    }
}
