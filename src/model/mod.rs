//! Data model: threads, messages, events, agents, tools, and users.
//!
//! Each submodule owns one entity family. These are plain data structs —
//! no persistence logic lives here; that belongs to [`crate::store`].

mod agent;
mod event;
mod message;
mod thread;
mod tool;
mod user;

pub use agent::{
    AgentConfig, AgentType, LlmOptions, ProgrammaticAgent, ProgrammaticInput, ProgrammaticOutput,
};
pub use event::{Event, EventPayload, EventStatus, EventType};
pub use message::{Message, SenderType, ToolCall, ToolCallFunction};
pub use thread::{Thread, ThreadStatus};
pub use tool::{ToolDefinition, ToolLog, ToolLogStatus};
pub use user::User;
