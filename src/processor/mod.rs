//! Processors and the interception point around them.
//!
//! A [`Processor`] is resolved by the event's [`EventType`]; the Worker
//! drives `pre_process` unconditionally, then either honors an
//! `onEvent` override or calls `process` and concatenates `pre_process`'s
//! output ahead of `process`'s, in that order, before enqueueing.

pub mod message;
pub mod tool_call;
pub mod tool_result;

use crate::deps::EngineDeps;
use crate::error::Result;
use crate::model::{Event, EventType};
use crate::store::EnqueueSpec;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Metadata key set on a MESSAGE event whose content a processor already
/// persisted directly (the agentic/programmatic reply path, the TOOL_RESULT
/// echo) before emitting the event purely to re-drive [`crate::router`].
/// [`message::MessageProcessor::pre_process`] checks this to avoid writing
/// the same content twice under two different event ids.
pub const ALREADY_PERSISTED_KEY: &str = "_alreadyPersisted";

/// A handler for one [`EventType`].
#[async_trait]
pub trait Processor: Send + Sync {
    fn handles(&self) -> EventType;

    /// Runs unconditionally, before the `onEvent` interception point (spec
    /// §4.3 step e). Used by [`message::MessageProcessor`] to persist the
    /// incoming message before any user callback observes the event.
    async fn pre_process(&self, _event: &Event, _deps: &EngineDeps) -> Result<Vec<EnqueueSpec>> {
        Ok(Vec::new())
    }

    /// Whether `process` should run at all. Default processors
    /// always proceed; this exists for processors layered on top that
    /// want to no-op without consuming the `onEvent` override path.
    fn should_process(&self, _event: &Event, _deps: &EngineDeps) -> bool {
        true
    }

    /// The default processing path. Its output is replaced wholesale (not
    /// merged) when `onEvent` returns an override.
    async fn process(&self, event: &Event, deps: &EngineDeps) -> Result<Vec<EnqueueSpec>>;
}

/// Resolves a [`Processor`] by [`EventType`]. An event with no matching
/// processor is simply marked `completed` and the queue moves on.
#[derive(Clone, Default)]
pub struct ProcessorRegistry {
    processors: HashMap<EventType, Arc<dyn Processor>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_processor(mut self, processor: Arc<dyn Processor>) -> Self {
        self.processors.insert(processor.handles(), processor);
        self
    }

    /// The crate's built-in processors: MESSAGE, TOOL_CALL, TOOL_RESULT.
    /// SYSTEM and CUSTOM events have no default processor.
    pub fn with_defaults() -> Self {
        Self::new()
            .with_processor(Arc::new(message::MessageProcessor))
            .with_processor(Arc::new(tool_call::ToolCallProcessor))
            .with_processor(Arc::new(tool_result::ToolResultProcessor))
    }

    pub fn resolve(&self, event_type: EventType) -> Option<Arc<dyn Processor>> {
        self.processors.get(&event_type).cloned()
    }
}
