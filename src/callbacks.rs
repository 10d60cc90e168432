//! Pluggable callback/interception surface.
//!
//! Modeled as a fixed struct of optional hooks (`None` = absent) and an
//! explicit three-variant override result rather than a "return anything"
//! convention, so a hook either lets the computed value stand, replaces
//! it, or drops the step — never something the caller has to interpret.

use crate::model::{AgentConfig, Event, Message};
use std::sync::Arc;

/// The outcome of a callback that is allowed to intercept a value: either
/// let the engine's computed value stand, replace it outright, or drop the
/// step entirely.
#[derive(Debug, Clone)]
pub enum Override<T> {
    UseOriginal,
    Replace(T),
    Drop,
}

impl<T> Override<T> {
    /// Resolve against the engine's computed `original`, returning `None`
    /// only when the callback chose `Drop`.
    pub fn resolve(self, original: T) -> Option<T> {
        match self {
            Override::UseOriginal => Some(original),
            Override::Replace(value) => Some(value),
            Override::Drop => None,
        }
    }
}

/// Outcome of the `onEvent` interception hook specifically: it may either
/// defer to the default processor, replace its output with a caller
/// supplied list of produced events, or drop the event's processing
/// entirely.
#[derive(Debug, Clone)]
pub enum EventOverride {
    UseOriginal,
    ProducedEvents(Vec<crate::store::EnqueueSpec>),
    Drop,
}

/// Fired when `onIntercepted` reports that some other hook overrode a
/// computed value.
#[derive(Debug, Clone)]
pub struct InterceptedNotice {
    pub callback_type: &'static str,
    pub original_value: String,
    pub intercepted_value: String,
}

type Hook<Args, Out> = Arc<dyn Fn(Args) -> Out + Send + Sync>;

/// A fixed set of optional hooks invoked at well-defined points in the
/// Worker's processing loop. Every field defaults to `None` via
/// [`Callbacks::default`]; callers set only the hooks they need.
#[derive(Clone, Default)]
pub struct Callbacks {
    /// Fired when a MESSAGE event's payload is about to be persisted.
    pub on_message_received: Option<Hook<Message, Override<Message>>>,
    /// Fired after an agent's reply message has been persisted.
    pub on_message_sent: Option<Hook<Message, ()>>,
    /// Fired immediately before a tool call is dispatched.
    pub on_tool_calling: Option<Hook<crate::model::ToolCall, Override<crate::model::ToolCall>>>,
    /// Fired after a tool call completes, with its `ToolResult` serialized
    /// to JSON for transport through the hook boundary.
    pub on_tool_completed: Option<Hook<serde_json::Value, Override<serde_json::Value>>>,
    /// Fired after an LLM call completes (success or failure).
    pub on_llm_completed: Option<Hook<LlmCompletedPayload, Override<LlmCompletedPayload>>>,
    /// Fires once per raw token/content chunk during a streaming call.
    /// Fire-and-forget; never overrides.
    pub on_token_stream: Option<Hook<String, ()>>,
    pub on_content_stream: Option<Hook<String, ()>>,
    pub on_tool_call_stream: Option<Hook<String, ()>>,
    /// Fired whenever another hook's `Override::Replace`/`Drop` took
    /// effect, so callers can observe interception without polling.
    pub on_intercepted: Option<Hook<InterceptedNotice, ()>>,
    /// The central interception point for the Worker's default processor
    /// dispatch.
    pub on_event: Option<Hook<Event, EventOverride>>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_on_message_received(
        mut self,
        hook: impl Fn(Message) -> Override<Message> + Send + Sync + 'static,
    ) -> Self {
        self.on_message_received = Some(Arc::new(hook));
        self
    }

    pub fn with_on_llm_completed(
        mut self,
        hook: impl Fn(LlmCompletedPayload) -> Override<LlmCompletedPayload> + Send + Sync + 'static,
    ) -> Self {
        self.on_llm_completed = Some(Arc::new(hook));
        self
    }

    pub fn with_on_event(
        mut self,
        hook: impl Fn(Event) -> EventOverride + Send + Sync + 'static,
    ) -> Self {
        self.on_event = Some(Arc::new(hook));
        self
    }

    /// Invoke `on_intercepted` if present; a no-op when it is `None`.
    pub fn notify_intercepted(&self, notice: InterceptedNotice) {
        if let Some(hook) = &self.on_intercepted {
            hook(notice);
        }
    }
}

/// Payload handed to `onLLMCompleted`.
#[derive(Debug, Clone)]
pub struct LlmCompletedPayload {
    pub agent: AgentConfig,
    pub success: bool,
    pub answer: Option<String>,
    pub error: Option<String>,
}
