//! The shared dependency bundle threaded through a single thread's
//! processing: the resolved store, agent roster, tool registry, LLM
//! service, and callbacks a processor needs to do its work.
//!
//! Rather than a process-wide global, one [`EngineDeps`] is constructed
//! per session (or shared across a process's sessions behind an `Arc`)
//! and passed explicitly into every processor call.

use crate::callbacks::Callbacks;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::llm::LLMService;
use crate::model::{AgentConfig, Message, Thread, User};
use crate::store::cache::StoreCaches;
use crate::store::Store;
use crate::tools::ToolRegistry;
use std::sync::Arc;

/// Everything a [`crate::processor::Processor`] needs to act on an event,
/// resolved once per Worker invocation and shared by reference across the
/// run.
#[derive(Clone)]
pub struct EngineDeps {
    pub store: Arc<dyn Store>,
    pub llm: Arc<dyn LLMService>,
    pub tools: Arc<dyn ToolRegistry>,
    pub agents: Arc<Vec<AgentConfig>>,
    pub callbacks: Arc<Callbacks>,
    pub config: Arc<EngineConfig>,
    pub caches: Arc<StoreCaches>,
}

impl EngineDeps {
    pub fn new(
        store: Arc<dyn Store>,
        llm: Arc<dyn LLMService>,
        tools: Arc<dyn ToolRegistry>,
        agents: Vec<AgentConfig>,
        callbacks: Callbacks,
        config: EngineConfig,
    ) -> Self {
        let caches = StoreCaches::new(config.ttl_short_ms, config.ttl_long_ms);
        Self {
            store,
            llm,
            tools,
            agents: Arc::new(agents),
            callbacks: Arc::new(callbacks),
            config: Arc::new(config),
            caches: Arc::new(caches),
        }
    }

    pub fn agent_by_name(&self, name: &str) -> Option<&AgentConfig> {
        self.agents.iter().find(|a| a.name == name)
    }

    /// Read-through `TTL_SHORT` lookup (spec §4.1's thread cache) in front
    /// of [`Store::get_thread_by_id`]. Only `Some` results are cached — a
    /// miss is always re-checked against the store on the next call.
    pub async fn get_thread_cached(&self, thread_id: &str) -> Result<Option<Thread>> {
        if let Some(cached) = self.caches.threads.get(&thread_id.to_string()).await {
            return Ok(Some(cached));
        }
        let found = self.store.get_thread_by_id(thread_id).await?;
        if let Some(thread) = &found {
            self.caches.threads.insert(thread_id.to_string(), thread.clone()).await;
        }
        Ok(found)
    }

    /// Read-through `TTL_SHORT` lookup (spec §4.1's history cache) in front
    /// of [`Store::get_message_history`], keyed by `(thread_id,
    /// for_sender_id)` since the result is filtered per-sender.
    pub async fn get_history_cached(
        &self,
        thread_id: &str,
        for_sender_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>> {
        let key = (thread_id.to_string(), for_sender_id.to_string());
        if let Some(cached) = self.caches.histories.get(&key).await {
            return Ok(cached);
        }
        let history = self.store.get_message_history(thread_id, for_sender_id, limit).await?;
        self.caches.histories.insert(key, history.clone()).await;
        Ok(history)
    }

    /// Read-through `TTL_LONG` lookup (spec §4.1's catalog cache) in front
    /// of [`Store::get_user_by_id`].
    pub async fn get_user_cached(&self, id: &str) -> Result<Option<User>> {
        if let Some(cached) = self.caches.users.get(&id.to_string()).await {
            return Ok(Some(cached));
        }
        let found = self.store.get_user_by_id(id).await?;
        if let Some(user) = &found {
            self.caches.users.insert(id.to_string(), user.clone()).await;
        }
        Ok(found)
    }

    /// Upserts `user` through the `Store` and invalidates its cached entry
    /// so the next [`Self::get_user_cached`] observes the write. Invalidates
    /// by the returned row's id, not the caller-supplied one — the store's
    /// id → externalId → email identity chain may resolve the write to an
    /// existing row under a different id than `user.id`.
    pub async fn upsert_user_cached(&self, user: User) -> Result<User> {
        let requested_id = user.id.clone();
        let saved = self.store.upsert_user(user).await?;
        self.caches.users.invalidate(&requested_id).await;
        if saved.id != requested_id {
            self.caches.users.invalidate(&saved.id).await;
        }
        Ok(saved)
    }
}
