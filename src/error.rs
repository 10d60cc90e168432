//! Crate-wide error type.
//!
//! A hand-rolled `Display`/`Error` impl rather than a derive-macro error
//! crate: every variant is named after a distinct failure category
//! (configuration, routing, store, tool, LLM, timeout).

use std::fmt;

/// Errors surfaced by the engine's public API.
///
/// Tool and LLM failures are *not* represented here when they occur mid
/// conversation — those are recovered locally into `TOOL_RESULT` payloads
/// and `onLLMCompleted` callbacks so the conversation can
/// continue. This type is for failures the caller must handle directly:
/// bad configuration, store errors, and the few cases (tool validation
/// prior to dispatch, JSON (de)serialization of persisted rows) where the
/// engine itself cannot proceed.
#[derive(Debug)]
pub enum ConversantError {
    /// Caller-supplied configuration was invalid (missing agents, unknown
    /// participants, duplicate agent names, bad database URL, ...).
    Configuration(String),
    /// A referenced entity (thread, agent, tool, event) does not exist.
    NotFound(String),
    /// An operation was attempted against an archived thread.
    AlreadyArchived(String),
    /// The underlying store returned an error.
    Store(sqlx::Error),
    /// A persisted JSON payload failed to (de)serialize.
    Serialization(serde_json::Error),
    /// Tool input failed JSON Schema validation.
    ToolValidation(String),
    /// A tool raised an error or timed out during execution.
    ToolExecution(String),
    /// The configured `LLMService` returned an error.
    Llm(String),
    /// An operation exceeded its deadline.
    Timeout(String),
    /// An operation was cancelled by the caller.
    Cancelled,
}

impl fmt::Display for ConversantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversantError::Configuration(msg) => write!(f, "configuration error: {msg}"),
            ConversantError::NotFound(what) => write!(f, "not found: {what}"),
            ConversantError::AlreadyArchived(id) => write!(f, "thread is archived: {id}"),
            ConversantError::Store(err) => write!(f, "store error: {err}"),
            ConversantError::Serialization(err) => write!(f, "serialization error: {err}"),
            ConversantError::ToolValidation(msg) => write!(f, "tool validation failed: {msg}"),
            ConversantError::ToolExecution(msg) => write!(f, "tool execution failed: {msg}"),
            ConversantError::Llm(msg) => write!(f, "llm error: {msg}"),
            ConversantError::Timeout(msg) => write!(f, "timed out: {msg}"),
            ConversantError::Cancelled => write!(f, "operation cancelled"),
        }
    }
}

impl std::error::Error for ConversantError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConversantError::Store(err) => Some(err),
            ConversantError::Serialization(err) => Some(err),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for ConversantError {
    fn from(err: sqlx::Error) -> Self {
        ConversantError::Store(err)
    }
}

impl From<serde_json::Error> for ConversantError {
    fn from(err: serde_json::Error) -> Self {
        ConversantError::Serialization(err)
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ConversantError>;
