//! A durable, event-driven engine for multi-agent conversations.
//!
//! A conversation is a [`model::Thread`]; everything that happens in it —
//! an incoming message, a tool call, a tool's result — is a
//! [`model::Event`] appended to that thread's queue. [`worker::drain`]
//! claims and processes events one at a time, strictly in order per
//! thread, until the queue empties or a processor fails. [`session`] is
//! the entry point most callers want: it resolves a thread, enqueues the
//! triggering message, and drains the queue to quiescence.
//!
//! Two concerns stay deliberately outside this crate: which [`Store`]
//! backend persists state ([`store::postgres::PgStore`] for production,
//! [`store::memory::InMemoryStore`] for tests and local embedding) and
//! which [`llm::LLMService`] talks to a model provider. Both are supplied
//! by the caller as trait objects, so the engine itself has no knowledge
//! of Postgres wire formats or any particular LLM API.

pub mod callbacks;
pub mod cli;
pub mod config;
pub mod context_builder;
pub mod deps;
pub mod error;
pub mod llm;
pub mod model;
pub mod processor;
pub mod router;
pub mod session;
pub mod store;
pub mod tools;
pub mod worker;

pub use callbacks::{Callbacks, EventOverride, Override};
pub use config::EngineConfig;
pub use deps::EngineDeps;
pub use error::{ConversantError, Result};
pub use model::{AgentConfig, AgentType, Event, EventPayload, Message, Thread};
pub use session::{create_thread, CreateThreadRequest, CreateThreadResponse};
pub use store::{memory::InMemoryStore, postgres::PgStore, Store};
pub use worker::{drain, CancellationToken};
