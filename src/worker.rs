//! Drives a single thread's event queue to quiescence.
//!
//! An iterative loop with a bounded step budget per call and a
//! cooperative yield between iterations, rather than recursion, keeps
//! stack usage flat and lets other threads' Workers interleave fairly on
//! the same executor.

use crate::callbacks::EventOverride;
use crate::deps::EngineDeps;
use crate::error::Result;
use crate::model::EventStatus;
use crate::processor::{Processor, ProcessorRegistry};
use crate::store::EnqueueSpec;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cooperative cancellation flag for a single `drain` call. Checked
/// between steps, not preemptively — an in-flight tool/LLM call still
/// runs to its own timeout.
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Drives `thread_id`'s queue one claimed event at a time. Returns once
/// the queue is empty, the step budget is exhausted, or an event fails.
pub async fn drain(
    thread_id: &str,
    deps: &EngineDeps,
    registry: &ProcessorRegistry,
    cancel: &CancellationToken,
) -> Result<()> {
    // Step 1: refuse re-entrant overlap.
    if deps.store.get_processing_queue_item(thread_id).await?.is_some() {
        return Ok(());
    }

    for _ in 0..deps.config.max_worker_steps_per_call {
        if cancel.is_cancelled() {
            return Ok(());
        }

        let Some(claimed) = deps.store.claim_next_pending_event(thread_id).await? else {
            return Ok(());
        };

        let Some(processor) = registry.resolve(claimed.event_type()) else {
            // No processor registered for this event type (e.g. SYSTEM,
            // CUSTOM) — complete it as a no-op.
            deps.store.complete_event(&claimed.id).await?;
            tokio::task::yield_now().await;
            continue;
        };

        let outcome = run_step(&claimed, processor.as_ref(), deps).await;

        match outcome {
            Ok(produced) => {
                for spec in &produced {
                    enqueue_spec(deps, spec).await?;
                }
                deps.store.complete_event(&claimed.id).await?;
            }
            Err(e) => {
                // Unhandled error in pre/process: mark failed and halt this
                // thread's loop to avoid hot-looping.
                deps.store.fail_event(&claimed.id, &e.to_string()).await?;
                log::error!("event {} on thread {thread_id} failed: {e}", claimed.id);
                return Ok(());
            }
        }

        tokio::task::yield_now().await;
    }

    Ok(())
}

async fn run_step(
    event: &crate::model::Event,
    processor: &dyn crate::processor::Processor,
    deps: &EngineDeps,
) -> Result<Vec<EnqueueSpec>> {
    let pre_events = processor.pre_process(event, deps).await?;

    if !processor.should_process(event, deps) {
        return Ok(pre_events);
    }

    let final_events = match &deps.callbacks.on_event {
        Some(hook) => match hook(event.clone()) {
            EventOverride::UseOriginal => processor.process(event, deps).await?,
            EventOverride::ProducedEvents(overridden) => overridden,
            EventOverride::Drop => Vec::new(),
        },
        None => processor.process(event, deps).await?,
    };

    let mut combined = pre_events;
    combined.extend(final_events);
    Ok(combined)
}

async fn enqueue_spec(deps: &EngineDeps, spec: &EnqueueSpec) -> Result<()> {
    // Archived threads accept no further events;
    // silently dropping here keeps `enqueue` itself simple (it always
    // appends) while the one call site that matters enforces the rule.
    if let Some(thread) = deps.get_thread_cached(&spec.thread_id).await? {
        if !thread.is_active() {
            return Ok(());
        }
    }
    deps.store
        .enqueue(&spec.thread_id, spec.payload.clone(), spec.options.clone())
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::Callbacks;
    use crate::config::EngineConfig;
    use crate::llm::{ChatConfig, ChatMessage, ChatResponse, ChatToolDefinition, LLMService, StreamCallback};
    use crate::model::{AgentConfig, SenderType};
    use crate::store::memory::InMemoryStore;
    use crate::store::{EnqueueOptions, ThreadSpec};
    use crate::tools::InMemoryToolRegistry;
    use async_trait::async_trait;
    use std::collections::HashMap;

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
            Ok(ChatResponse::ok("Hello back!", Vec::new()))
        }

        fn model_name(&self) -> &str {
            "echo"
        }
    }

    fn deps() -> EngineDeps {
        EngineDeps::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(EchoLlm),
            Arc::new(InMemoryToolRegistry::new()),
            vec![AgentConfig::agentic("Agent1")],
            Callbacks::new(),
            EngineConfig::in_memory(),
        )
    }

    #[tokio::test]
    async fn drains_a_single_message_event_to_completion() {
        let deps = deps();
        deps.store
            .find_or_create_thread(
                "t1",
                ThreadSpec {
                    participants: vec!["user".into(), "Agent1".into()],
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        deps.store
            .enqueue(
                "t1",
                crate::model::EventPayload::Message {
                    sender_id: "user".into(),
                    sender_type: SenderType::User,
                    content: Some("hi".into()),
                    tool_calls: None,
                    tool_call_id: None,
                    metadata: HashMap::new(),
                },
                EnqueueOptions::default(),
            )
            .await
            .unwrap();

        let registry = ProcessorRegistry::with_defaults();
        drain("t1", &deps, &registry, &CancellationToken::new()).await.unwrap();

        let history = deps.store.get_message_history("t1", "user", 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "hi");
        assert_eq!(history[1].content, "Hello back!");
        assert_eq!(history[1].sender_id, "Agent1");
    }

    #[tokio::test]
    async fn refuses_to_start_when_another_event_is_already_processing() {
        let deps = deps();
        deps.store
            .find_or_create_thread("t1", ThreadSpec::default())
            .await
            .unwrap();
        let event = deps.store.claim_next_pending_event("t1").await.unwrap();
        assert!(event.is_none());

        deps.store
            .enqueue(
                "t1",
                crate::model::EventPayload::System { content: None, metadata: HashMap::new() },
                EnqueueOptions::default(),
            )
            .await
            .unwrap();
        let claimed = deps.store.claim_next_pending_event("t1").await.unwrap().unwrap();
        assert_eq!(claimed.status, EventStatus::Processing);

        let registry = ProcessorRegistry::with_defaults();
        // A second drain call must see the in-flight event and return
        // immediately without claiming anything else.
        drain("t1", &deps, &registry, &CancellationToken::new()).await.unwrap();
        assert!(deps.store.get_processing_queue_item("t1").await.unwrap().is_some());
    }
}
