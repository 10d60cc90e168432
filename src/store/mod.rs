//! The durable [`Store`] trait and its implementations.
//!
//! The `Store` is the single persistence seam for the engine: no other
//! component mutates rows directly. Two
//! implementations ship with the crate — [`postgres::PgStore`] for
//! production use and [`memory::InMemoryStore`] as an embeddable
//! reference implementation used by this crate's own test suite.

pub mod cache;
pub mod memory;
pub mod postgres;

use crate::error::Result;
use crate::model::{
    Event, EventPayload, EventStatus, Message, SenderType, Thread, ToolCall, ToolLog,
    ToolLogStatus, User,
};
use async_trait::async_trait;

/// Input to [`Store::find_or_create_thread`]. Only read on creation —
/// `find_or_create_thread` is idempotent on `id`.
#[derive(Debug, Clone, Default)]
pub struct ThreadSpec {
    pub external_id: Option<String>,
    pub name: Option<String>,
    pub participants: Vec<String>,
    pub parent_thread_id: Option<String>,
}

/// Input to [`Store::create_message`].
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub thread_id: String,
    pub sender_id: String,
    pub sender_type: SenderType,
    pub content: String,
    pub tool_calls: Option<Vec<ToolCall>>,
    pub tool_call_id: Option<String>,
    pub sender_user_id: Option<String>,
}

/// Input to [`Store::enqueue`].
#[derive(Debug, Clone)]
pub struct EnqueueOptions {
    pub parent_event_id: Option<String>,
    pub trace_id: Option<String>,
    pub priority: i32,
    pub ttl_ms: Option<u64>,
}

impl Default for EnqueueOptions {
    fn default() -> Self {
        Self {
            parent_event_id: None,
            trace_id: None,
            priority: 0,
            ttl_ms: None,
        }
    }
}

/// A not-yet-persisted event, as produced by a processor's `preProcess`/
/// `process` step or by an `onEvent` override. The Worker
/// enqueues a batch of these in order once the event that produced them
/// reaches a terminal status.
#[derive(Debug, Clone)]
pub struct EnqueueSpec {
    pub thread_id: String,
    pub payload: EventPayload,
    pub options: EnqueueOptions,
}

impl EnqueueSpec {
    pub fn new(thread_id: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            thread_id: thread_id.into(),
            payload,
            options: EnqueueOptions::default(),
        }
    }

    pub fn with_options(mut self, options: EnqueueOptions) -> Self {
        self.options = options;
        self
    }
}

/// Input to [`Store::create_tool_logs`].
#[derive(Debug, Clone)]
pub struct NewToolLog {
    pub thread_id: String,
    pub tool_name: String,
    pub tool_input: serde_json::Value,
    pub tool_output: Option<serde_json::Value>,
    pub status: ToolLogStatus,
    pub error_message: Option<String>,
}

/// Durable storage for threads, messages, events, tool logs, and the
/// catalog (tools/users). All operations are idempotent where the
/// documentation states so, and must be serializable with respect to a
/// single row — row-level locking is sufficient.
#[async_trait]
pub trait Store: Send + Sync {
    // ---- Threads -----------------------------------------------------

    /// Idempotent on `id`. `spec.external_id`/`name`/`participants` are
    /// applied only when the thread does not already exist.
    async fn find_or_create_thread(&self, id: &str, spec: ThreadSpec) -> Result<Thread>;

    /// Returns only active threads — archived threads are invisible to
    /// routing paths.
    async fn get_thread_by_id(&self, id: &str) -> Result<Option<Thread>>;

    /// Marks the thread archived and stores `summary`. Idempotent:
    /// archiving an already-archived thread is a no-op that returns the
    /// current row.
    async fn archive_thread(&self, id: &str, summary: Option<String>) -> Result<Thread>;

    // ---- Messages ------------------------------------------------------

    /// Messages of `thread_id` and its ancestor chain (parent threads),
    /// sorted by `(created_at asc, thread_level desc)` so earlier parents
    /// precede later children at equal timestamps. Ancestor messages are
    /// filtered to threads where `for_sender_id` is a participant.
    async fn get_message_history(
        &self,
        thread_id: &str,
        for_sender_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>>;

    /// Persists a message. Invalidates cached histories for the thread.
    async fn create_message(&self, message: NewMessage) -> Result<Message>;

    // ---- Event queue -----------------------------------------------------

    /// Appends a new `pending` event to `thread_id`'s queue.
    async fn enqueue(
        &self,
        thread_id: &str,
        payload: EventPayload,
        options: EnqueueOptions,
    ) -> Result<Event>;

    /// `Some` iff an event for `thread_id` is currently `processing`.
    async fn get_processing_queue_item(&self, thread_id: &str) -> Result<Option<Event>>;

    /// Atomically claims the oldest pending, non-expired event for
    /// `thread_id` ordered by `(priority desc, created_at asc, id asc)`,
    /// transitioning it to `processing` in the same operation. Returns
    /// `None` when the queue is empty. Expired pending events (see
    /// `ttl_ms`/`expires_at`) are instead transitioned straight to
    /// `failed` with reason `expired` and skipped.
    async fn claim_next_pending_event(&self, thread_id: &str) -> Result<Option<Event>>;

    /// Transitions `event_id` to a terminal status. Once `completed` or
    /// `failed`, subsequent calls are rejected by implementations (spec
    /// §8 invariant 2) — but callers are expected to call this exactly
    /// once per claimed event, so this is a defensive backstop rather
    /// than a normal code path.
    async fn complete_event(&self, event_id: &str) -> Result<()>;

    /// Transitions `event_id` to `failed`.
    async fn fail_event(&self, event_id: &str, reason: &str) -> Result<()>;

    // ---- Tool logs -----------------------------------------------------

    /// Atomic batch insert.
    async fn create_tool_logs(&self, entries: Vec<NewToolLog>) -> Result<()>;

    // ---- Catalog ---------------------------------------------------------

    /// Upserts a user by `id`, falling back to `external_id`, then
    /// `email`, to find an existing row.
    async fn upsert_user(&self, user: User) -> Result<User>;

    async fn get_user_by_id(&self, id: &str) -> Result<Option<User>>;
}

pub(crate) fn is_terminal(status: EventStatus) -> bool {
    matches!(status, EventStatus::Completed | EventStatus::Failed)
}
