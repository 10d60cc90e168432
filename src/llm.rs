//! The `LLMService` seam.
//!
//! A single async `chat` method plus a `model_name` accessor, widened to
//! the engine's multi-agent contract: `chat` takes the full role-labeled
//! history and the agent's tool list, and returns tool calls already
//! normalized to `{id, function{name, arguments}}` regardless of the
//! underlying provider's native encoding. This crate's core never parses
//! provider-specific function-call markup — that parsing, and stripping
//! it back out of `answer`, is the `LLMService` implementor's job; the
//! core only ever sees [`StreamEvent`]s.

use crate::error::Result;
use crate::model::{AgentConfig, LlmOptions, ToolCall};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The role a single chat turn is labeled with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

/// One entry of the context assembled by [`crate::context_builder`] /
/// [`crate::processor::message`] for a single LLM call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: Arc<str>,
    /// Present on assistant turns that previously requested tool calls, so
    /// the provider adapter can rehydrate its own tool-use protocol (spec
    /// §4.5: "reattach them as structured metadata").
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    /// Present on tool-role turns, linking the result back to its call.
    #[serde(default)]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<Arc<str>>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<Arc<str>>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<Arc<str>>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            tool_calls,
            tool_call_id: None,
        }
    }

    pub fn tool(content: impl Into<Arc<str>>, tool_call_id: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Tool,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

/// A tool offered to the LLM for this turn, already filtered by the
/// agent's allowed-tools list before being passed in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters_schema: serde_json::Value,
}

/// Token accounting returned alongside a completed chat call, when the
/// provider reports it.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

/// Normalized outcome of [`LLMService::chat`].
#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    pub success: bool,
    pub answer: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub error: Option<String>,
    pub tokens: Option<TokenUsage>,
    pub model: Option<String>,
    pub provider: Option<String>,
}

impl ChatResponse {
    pub fn ok(answer: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            success: true,
            answer: Some(answer.into()),
            tool_calls,
            ..Default::default()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// A normalized streaming event, already stripped of any provider-native
/// function-call markup: the core forwards these verbatim to
/// `onTokenStream`/`onContentStream`/`onToolCallStream` without parsing
/// them further.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// A chunk of plain answer text.
    Content(String),
    /// An incremental fragment of a tool call being assembled by the
    /// provider (accumulated by the adapter, not by the core).
    ToolCallDelta {
        id: Option<String>,
        name: Option<String>,
        arguments_fragment: String,
    },
    /// The call has finished; no further events follow on this stream.
    End,
}

/// A callback invoked once per [`StreamEvent`] during a streaming chat
/// call. Streaming callbacks never override data — they are fire-and-
/// forget.
pub type StreamCallback = Arc<dyn Fn(StreamEvent) + Send + Sync>;

/// Configuration forwarded to a single [`LLMService::chat`] call, derived
/// from the target agent's [`LlmOptions`].
#[derive(Debug, Clone, Default)]
pub struct ChatConfig {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl From<&LlmOptions> for ChatConfig {
    fn from(opts: &LlmOptions) -> Self {
        Self {
            model: opts.model.clone(),
            temperature: opts.temperature,
            max_tokens: opts.max_tokens,
        }
    }
}

impl From<&AgentConfig> for ChatConfig {
    fn from(agent: &AgentConfig) -> Self {
        Self::from(&agent.llm_options)
    }
}

/// Consumed interface to an LLM provider.
///
/// Implementations own provider-specific request shaping and are
/// responsible for parsing any function-call markup embedded in the raw
/// provider response before it reaches this trait's caller.
#[async_trait]
pub trait LLMService: Send + Sync {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ChatToolDefinition],
        config: &ChatConfig,
        stream: Option<StreamCallback>,
    ) -> Result<ChatResponse>;

    fn model_name(&self) -> &str;
}
