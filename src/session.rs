//! The `createThread` session entry point.
//!
//! This is the one function most embedders call: it resolves or creates a
//! thread, persists the triggering message as an initial MESSAGE event,
//! and drains that thread's queue to quiescence before returning. Nothing
//! here is re-entrant across threads — callers that want several
//! conversations running concurrently call this once per thread id and
//! let their own executor interleave the resulting futures.

use crate::deps::EngineDeps;
use crate::error::{ConversantError, Result};
use crate::model::{AgentConfig, EventPayload, SenderType, User};
use crate::processor::ProcessorRegistry;
use crate::store::{EnqueueOptions, ThreadSpec};
use crate::worker::{self, CancellationToken};
use std::collections::HashMap;

/// Input to [`create_thread`]: the triggering message plus
/// enough thread-resolution detail to find-or-create it.
#[derive(Debug, Clone, Default)]
pub struct CreateThreadRequest {
    /// Caller-chosen thread id. Generated when absent.
    pub thread_id: Option<String>,
    pub thread_external_id: Option<String>,
    pub sender_id: Option<String>,
    pub sender_type: Option<SenderType>,
    pub content: String,
    pub thread_name: Option<String>,
    pub parent_thread_id: Option<String>,
    pub participants: Option<Vec<String>>,
    pub user: Option<User>,
    pub active_task_id: Option<String>,
}

/// Output of [`create_thread`]: `{queueId, status:"queued",
/// threadId}`. `queue_id` is the id of the initial MESSAGE event.
#[derive(Debug, Clone)]
pub struct CreateThreadResponse {
    pub queue_id: String,
    pub status: &'static str,
    pub thread_id: String,
}

/// Resolves/creates the thread named by `request`, enqueues the
/// triggering MESSAGE event, and drains the queue to quiescence.
///
/// Fails fast on caller configuration errors:
/// no agents supplied, duplicate agent names, or a sender/participant
/// list that names an agent absent from `deps.agents`.
pub async fn create_thread(deps: &EngineDeps, request: CreateThreadRequest) -> Result<CreateThreadResponse> {
    validate_configuration(&deps.agents, &request)?;

    if let Some(user) = &request.user {
        deps.upsert_user_cached(user.clone()).await?;
    }

    let thread_id = request
        .thread_id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let sender_id = request.sender_id.clone().unwrap_or_else(|| "user".to_string());
    let sender_type = request.sender_type.unwrap_or(SenderType::User);

    let participants = request.participants.clone().unwrap_or_else(|| {
        let mut names: Vec<String> = deps.agents.iter().map(|a| a.name.clone()).collect();
        names.push(sender_id.clone());
        names
    });

    let thread = deps
        .store
        .find_or_create_thread(
            &thread_id,
            ThreadSpec {
                external_id: request.thread_external_id.clone(),
                name: request.thread_name.clone(),
                participants,
                parent_thread_id: request.parent_thread_id.clone(),
            },
        )
        .await?;

    if !thread.is_active() {
        return Err(ConversantError::AlreadyArchived(thread.id));
    }

    let event = deps
        .store
        .enqueue(
            &thread.id,
            EventPayload::Message {
                sender_id,
                sender_type,
                content: Some(request.content),
                tool_calls: None,
                tool_call_id: None,
                metadata: HashMap::new(),
            },
            EnqueueOptions::default(),
        )
        .await?;

    let registry = ProcessorRegistry::with_defaults();
    worker::drain(&thread.id, deps, &registry, &CancellationToken::new()).await?;

    Ok(CreateThreadResponse {
        queue_id: event.id,
        status: "queued",
        thread_id: thread.id,
    })
}

fn validate_configuration(agents: &[AgentConfig], request: &CreateThreadRequest) -> Result<()> {
    if agents.is_empty() {
        return Err(ConversantError::Configuration("No agents provided".into()));
    }

    let mut seen = std::collections::HashSet::new();
    for agent in agents {
        if !seen.insert(agent.name.as_str()) {
            return Err(ConversantError::Configuration(format!(
                "duplicate agent name: {}",
                agent.name
            )));
        }
    }

    // A sender explicitly typed as an agent must name a configured agent
    // — arbitrary human participant ids
    // are always accepted since no catalog of valid users is required.
    if request.sender_type == Some(SenderType::Agent) {
        if let Some(sender_id) = &request.sender_id {
            if agents.iter().all(|a| &a.name != sender_id) {
                return Err(ConversantError::Configuration(format!(
                    "unknown participant: {sender_id}"
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::Callbacks;
    use crate::config::EngineConfig;
    use crate::llm::{ChatConfig, ChatMessage, ChatResponse, ChatToolDefinition, LLMService, StreamCallback};
    use crate::store::memory::InMemoryStore;
    use crate::tools::InMemoryToolRegistry;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct EchoLlm;

    #[async_trait]
    impl LLMService for EchoLlm {
        async fn chat(
            &self,
            _messages: &[ChatMessage],
            _tools: &[ChatToolDefinition],
            _config: &ChatConfig,
            _stream: Option<StreamCallback>,
        ) -> Result<ChatResponse> {
            Ok(ChatResponse::ok("hello there", Vec::new()))
        }

        fn model_name(&self) -> &str {
            "echo"
        }
    }

    fn deps(agents: Vec<AgentConfig>) -> EngineDeps {
        EngineDeps::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(EchoLlm),
            Arc::new(InMemoryToolRegistry::new()),
            agents,
            Callbacks::new(),
            EngineConfig::in_memory(),
        )
    }

    #[tokio::test]
    async fn rejects_empty_agent_list() {
        let deps = deps(Vec::new());
        let result = create_thread(
            &deps,
            CreateThreadRequest {
                content: "hi".into(),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(result, Err(ConversantError::Configuration(_))));
    }

    #[tokio::test]
    async fn rejects_duplicate_agent_names() {
        let deps = deps(vec![AgentConfig::agentic("Dev"), AgentConfig::agentic("Dev")]);
        let result = create_thread(
            &deps,
            CreateThreadRequest {
                content: "hi".into(),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(result, Err(ConversantError::Configuration(_))));
    }

    #[tokio::test]
    async fn drains_the_initial_message_to_a_reply() {
        let deps = deps(vec![AgentConfig::agentic("Dev")]);
        let response = create_thread(
            &deps,
            CreateThreadRequest {
                content: "hi".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(response.status, "queued");
        let history = deps.store.get_message_history(&response.thread_id, "user", 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].content, "hello there");
    }
}
