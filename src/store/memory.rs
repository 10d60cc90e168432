//! In-process reference [`Store`] implementation.
//!
//! Not meant to survive process restarts — it exists for embedding in
//! tests and small single-process deployments. Row-level locking is
//! modeled with `tokio::sync::Mutex` around each table; the atomic claim
//! in [`Store::claim_next_pending_event`] takes the events table lock for
//! its whole read-then-write so two concurrent claimers can never observe
//! the same pending event.

use crate::error::{ConversantError, Result};
use crate::model::{Event, EventPayload, EventStatus, Message, Thread, ThreadStatus, ToolLog, User};
use crate::store::{EnqueueOptions, NewMessage, NewToolLog, Store, ThreadSpec};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    threads: HashMap<String, Thread>,
    messages: Vec<Message>,
    events: HashMap<String, Event>,
    tool_logs: Vec<ToolLog>,
    users: HashMap<String, User>,
}

/// An embeddable, non-durable [`Store`]. See module docs.
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
        }
    }

    fn next_id(prefix: &str) -> String {
        format!("{prefix}_{}", Uuid::new_v4())
    }

    /// Walks `thread_id`'s `parent_thread_id` chain, returning threads
    /// from oldest ancestor to `thread_id` itself.
    fn ancestor_chain<'a>(tables: &'a Tables, thread_id: &str) -> Vec<&'a Thread> {
        let mut chain = Vec::new();
        let mut current = tables.threads.get(thread_id);
        while let Some(thread) = current {
            chain.push(thread);
            current = thread
                .parent_thread_id
                .as_ref()
                .and_then(|parent_id| tables.threads.get(parent_id));
        }
        chain.reverse();
        chain
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn find_or_create_thread(&self, id: &str, spec: ThreadSpec) -> Result<Thread> {
        let mut tables = self.tables.lock().await;
        if let Some(existing) = tables.threads.get(id) {
            return Ok(existing.clone());
        }
        let now = Utc::now();
        let thread = Thread {
            id: id.to_string(),
            external_id: spec.external_id,
            name: spec.name,
            participants: spec.participants,
            status: ThreadStatus::Active,
            summary: None,
            parent_thread_id: spec.parent_thread_id,
            created_at: now,
            updated_at: now,
        };
        tables.threads.insert(id.to_string(), thread.clone());
        Ok(thread)
    }

    async fn get_thread_by_id(&self, id: &str) -> Result<Option<Thread>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .threads
            .get(id)
            .filter(|t| t.is_active())
            .cloned())
    }

    async fn archive_thread(&self, id: &str, summary: Option<String>) -> Result<Thread> {
        let mut tables = self.tables.lock().await;
        let thread = tables
            .threads
            .get_mut(id)
            .ok_or_else(|| ConversantError::NotFound(format!("thread {id}")))?;
        thread.status = ThreadStatus::Archived;
        if summary.is_some() {
            thread.summary = summary;
        }
        thread.updated_at = Utc::now();
        Ok(thread.clone())
    }

    async fn get_message_history(
        &self,
        thread_id: &str,
        for_sender_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>> {
        let tables = self.tables.lock().await;
        let chain = Self::ancestor_chain(&tables, thread_id);
        let levels: HashMap<&str, usize> = chain
            .iter()
            .enumerate()
            .map(|(level, t)| (t.id.as_str(), level))
            .collect();

        let mut rows: Vec<(usize, &Message)> = tables
            .messages
            .iter()
            .filter(|m| levels.contains_key(m.thread_id.as_str()))
            .filter(|m| {
                // Ancestor (parent) threads are filtered to those where
                // `for_sender_id` is a participant; the leaf thread
                // (for_sender_id's own thread) is always included.
                if m.thread_id == thread_id {
                    return true;
                }
                tables
                    .threads
                    .get(&m.thread_id)
                    .map(|t| t.participants.iter().any(|p| p == for_sender_id))
                    .unwrap_or(false)
            })
            .map(|m| (levels[m.thread_id.as_str()], m))
            .collect();

        // (created_at asc, thread_level desc): earlier parents precede
        // later children at equal timestamps, so ties break on the
        // *highest* level first among equal timestamps — i.e. deeper
        // (child) messages come later only when strictly newer; at equal
        // timestamps the ancestor (lower level) comes first, matching the
        // spec's ordering by sorting on (created_at, -level).
        rows.sort_by(|(level_a, a), (level_b, b)| {
            a.created_at
                .cmp(&b.created_at)
                .then(level_b.cmp(level_a))
        });

        // `limit` bounds how much of the *most recent* history is
        // returned — truncate from the front, not the back, or a long
        // thread would hand every agent the oldest messages forever.
        let start = rows.len().saturating_sub(limit);
        Ok(rows[start..].iter().map(|(_, m)| (*m).clone()).collect())
    }

    async fn create_message(&self, message: NewMessage) -> Result<Message> {
        let mut tables = self.tables.lock().await;
        let now = Utc::now();
        let record = Message {
            id: Self::next_id("msg"),
            thread_id: message.thread_id,
            sender_id: message.sender_id,
            sender_type: message.sender_type,
            content: message.content,
            tool_calls: message.tool_calls,
            tool_call_id: message.tool_call_id,
            sender_user_id: message.sender_user_id,
            created_at: now,
        };
        tables.messages.push(record.clone());
        Ok(record)
    }

    async fn enqueue(
        &self,
        thread_id: &str,
        payload: EventPayload,
        options: EnqueueOptions,
    ) -> Result<Event> {
        let mut tables = self.tables.lock().await;
        let now = Utc::now();
        let expires_at = options
            .ttl_ms
            .map(|ms| now + chrono::Duration::milliseconds(ms as i64));
        let event = Event {
            id: Self::next_id("evt"),
            thread_id: thread_id.to_string(),
            payload,
            parent_event_id: options.parent_event_id,
            trace_id: options.trace_id,
            priority: options.priority,
            status: EventStatus::Pending,
            ttl_ms: options.ttl_ms,
            expires_at,
            created_at: now,
            updated_at: now,
        };
        tables.events.insert(event.id.clone(), event.clone());
        Ok(event)
    }

    async fn get_processing_queue_item(&self, thread_id: &str) -> Result<Option<Event>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .events
            .values()
            .find(|e| e.thread_id == thread_id && e.status == EventStatus::Processing)
            .cloned())
    }

    async fn claim_next_pending_event(&self, thread_id: &str) -> Result<Option<Event>> {
        let mut tables = self.tables.lock().await;
        let now = Utc::now();

        // Expire anything whose TTL has passed before considering order.
        let expired_ids: Vec<String> = tables
            .events
            .values()
            .filter(|e| {
                e.thread_id == thread_id
                    && e.status == EventStatus::Pending
                    && e.is_expired(now)
            })
            .map(|e| e.id.clone())
            .collect();
        for id in expired_ids {
            if let Some(e) = tables.events.get_mut(&id) {
                e.status = EventStatus::Failed;
                e.updated_at = now;
            }
        }

        let next_id = tables
            .events
            .values()
            .filter(|e| e.thread_id == thread_id && e.status == EventStatus::Pending)
            .min_by(|a, b| {
                b.priority
                    .cmp(&a.priority)
                    .then(a.created_at.cmp(&b.created_at))
                    .then(a.id.cmp(&b.id))
            })
            .map(|e| e.id.clone());

        match next_id {
            Some(id) => {
                let event = tables.events.get_mut(&id).unwrap();
                event.status = EventStatus::Processing;
                event.updated_at = now;
                Ok(Some(event.clone()))
            }
            None => Ok(None),
        }
    }

    async fn complete_event(&self, event_id: &str) -> Result<()> {
        let mut tables = self.tables.lock().await;
        if let Some(event) = tables.events.get_mut(event_id) {
            if !crate::store::is_terminal(event.status) {
                event.status = EventStatus::Completed;
                event.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn fail_event(&self, event_id: &str, _reason: &str) -> Result<()> {
        let mut tables = self.tables.lock().await;
        if let Some(event) = tables.events.get_mut(event_id) {
            if !crate::store::is_terminal(event.status) {
                event.status = EventStatus::Failed;
                event.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn create_tool_logs(&self, entries: Vec<NewToolLog>) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let now = Utc::now();
        for entry in entries {
            tables.tool_logs.push(ToolLog {
                id: Self::next_id("tlog"),
                thread_id: entry.thread_id,
                tool_name: entry.tool_name,
                tool_input: entry.tool_input,
                tool_output: entry.tool_output,
                status: entry.status,
                error_message: entry.error_message,
                created_at: now,
            });
        }
        Ok(())
    }

    async fn upsert_user(&self, user: User) -> Result<User> {
        let mut tables = self.tables.lock().await;
        let existing_id = tables
            .users
            .get(&user.id)
            .map(|_| user.id.clone())
            .or_else(|| {
                tables
                    .users
                    .values()
                    .find(|u| {
                        (user.external_id.is_some() && u.external_id == user.external_id)
                            || (user.email.is_some() && u.email == user.email)
                    })
                    .map(|u| u.id.clone())
            });

        let id = existing_id.unwrap_or_else(|| user.id.clone());
        let record = User { id: id.clone(), ..user };
        tables.users.insert(id, record.clone());
        Ok(record)
    }

    async fn get_user_by_id(&self, id: &str) -> Result<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables.users.get(id).cloned())
    }
}
