//! End-to-end scenarios.
//!
//! Each test drives a full conversation through [`conversant::session::create_thread`]
//! against an [`conversant::InMemoryStore`], a scripted [`conversant::llm::LLMService`],
//! and (where needed) a test-only [`conversant::tools::RunnableTool`].

use conversant::callbacks::{Callbacks, InterceptedNotice, Override};
use conversant::config::EngineConfig;
use conversant::deps::EngineDeps;
use conversant::llm::{ChatConfig, ChatMessage, ChatResponse, ChatRole, ChatToolDefinition, LLMService, StreamCallback};
use conversant::model::{AgentConfig, ProgrammaticAgent, ProgrammaticInput, ProgrammaticOutput, ToolCall, ToolCallFunction};
use conversant::session::{create_thread, CreateThreadRequest};
use conversant::store::memory::InMemoryStore;
use conversant::tools::{InMemoryToolRegistry, RunnableTool, ToolContext, ToolResult};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// A message mentioning two agents routes to both directly — mention
/// routing collects every mention, not just the first; a third,
/// unmentioned agent with no path into the allowed-agents sets is never
/// contacted.
#[tokio::test]
async fn s1_mention_routing_with_allowed_agents_filter() {
    struct ScriptedLlm;
    #[async_trait]
    impl LLMService for ScriptedLlm {
        async fn chat(
            &self,
            messages: &[ChatMessage],
            _tools: &[ChatToolDefinition],
            _config: &ChatConfig,
            _stream: Option<StreamCallback>,
        ) -> conversant::Result<ChatResponse> {
            let system = messages[0].content.as_ref();
            if system.contains("You are Albert.") {
                return Ok(ChatResponse::ok("Happy to help.", Vec::new()));
            }
            if system.contains("You are Robin.") {
                return Ok(ChatResponse::ok("Sure, go ahead.", Vec::new()));
            }
            panic!("Charlie was never mentioned and must never be asked");
        }
        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    let albert = AgentConfig::agentic("Albert").with_allowed_agents(["Robin".to_string()]);
    let robin = AgentConfig::agentic("Robin").with_allowed_agents(["Albert".to_string()]);
    let charlie = AgentConfig::agentic("Charlie");
    let deps = EngineDeps::new(
        Arc::new(InMemoryStore::new()),
        Arc::new(ScriptedLlm),
        Arc::new(InMemoryToolRegistry::new()),
        vec![albert, robin, charlie],
        Callbacks::new(),
        EngineConfig::in_memory(),
    );

    let response = create_thread(
        &deps,
        CreateThreadRequest {
            content: "Hello, @Albert! Please ask @Robin a question.".into(),
            participants: Some(vec!["user".into(), "Albert".into(), "Robin".into(), "Charlie".into()]),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let history = deps.store.get_message_history(&response.thread_id, "user", 10).await.unwrap();
    let senders: Vec<&str> = history.iter().map(|m| m.sender_id.as_str()).collect();
    // Albert is processed before Robin: Router Rule 2 preserves
    // `available_agents` order among the intersected mentions.
    assert_eq!(senders, vec!["user", "Albert", "Robin"]);
    assert!(history.iter().all(|m| m.sender_id != "Charlie"));
}

/// S2 — two-party fallback routes the lone agent; three-party with no
/// mentions selects nobody.
#[tokio::test]
async fn s2_two_party_fallback() {
    struct EchoLlm;
    #[async_trait]
    impl LLMService for EchoLlm {
        async fn chat(
            &self,
            _messages: &[ChatMessage],
            _tools: &[ChatToolDefinition],
            _config: &ChatConfig,
            _stream: Option<StreamCallback>,
        ) -> conversant::Result<ChatResponse> {
            Ok(ChatResponse::ok("acknowledged", Vec::new()))
        }
        fn model_name(&self) -> &str {
            "echo"
        }
    }

    let deps = EngineDeps::new(
        Arc::new(InMemoryStore::new()),
        Arc::new(EchoLlm),
        Arc::new(InMemoryToolRegistry::new()),
        vec![AgentConfig::agentic("Agent1")],
        Callbacks::new(),
        EngineConfig::in_memory(),
    );
    let response = create_thread(
        &deps,
        CreateThreadRequest {
            content: "no mentions here".into(),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let history = deps.store.get_message_history(&response.thread_id, "user", 10).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].sender_id, "Agent1");

    let three_party_deps = EngineDeps::new(
        Arc::new(InMemoryStore::new()),
        Arc::new(EchoLlm),
        Arc::new(InMemoryToolRegistry::new()),
        vec![AgentConfig::agentic("Agent1"), AgentConfig::agentic("Agent2")],
        Callbacks::new(),
        EngineConfig::in_memory(),
    );
    let response = create_thread(
        &three_party_deps,
        CreateThreadRequest {
            content: "no mentions here".into(),
            participants: Some(vec!["user".into(), "Agent1".into(), "Agent2".into()]),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let history = three_party_deps
        .store
        .get_message_history(&response.thread_id, "user", 10)
        .await
        .unwrap();
    assert_eq!(history.len(), 1, "no agent should be implicitly selected among three participants");
}

/// S3 — a tool call fans out to a TOOL_RESULT and back into the agent's
/// next turn.
#[tokio::test]
async fn s3_tool_call_and_return() {
    struct ListDirectoryTool;
    #[async_trait]
    impl RunnableTool for ListDirectoryTool {
        fn key(&self) -> &str {
            "list_directory"
        }
        fn name(&self) -> &str {
            "List Directory"
        }
        fn description(&self) -> &str {
            "Lists files at a path."
        }
        fn input_schema(&self) -> &serde_json::Value {
            use std::sync::OnceLock;
            static SCHEMA: OnceLock<serde_json::Value> = OnceLock::new();
            SCHEMA.get_or_init(|| {
                serde_json::json!({
                    "type": "object",
                    "properties": {"path": {"type": "string"}},
                    "required": ["path"]
                })
            })
        }
        async fn execute(&self, _params: serde_json::Value, _context: &ToolContext) -> ToolResult {
            ToolResult::success(serde_json::json!({"files": ["a.txt", "b.txt"]}))
        }
    }

    struct ScriptedLlm;
    #[async_trait]
    impl LLMService for ScriptedLlm {
        async fn chat(
            &self,
            messages: &[ChatMessage],
            _tools: &[ChatToolDefinition],
            _config: &ChatConfig,
            _stream: Option<StreamCallback>,
        ) -> conversant::Result<ChatResponse> {
            let saw_tool_result = messages.iter().any(|m| m.role == ChatRole::Tool);
            if saw_tool_result {
                return Ok(ChatResponse::ok("The directory has a.txt and b.txt.", Vec::new()));
            }
            Ok(ChatResponse::ok(
                "",
                vec![ToolCall {
                    id: "call_0".into(),
                    function: ToolCallFunction {
                        name: "list_directory".into(),
                        arguments: r#"{"path":"."}"#.into(),
                    },
                }],
            ))
        }
        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    let dev = AgentConfig::agentic("Dev").with_allowed_tools(["list_directory".to_string()]);
    let tools = InMemoryToolRegistry::new().with_tool(Arc::new(ListDirectoryTool));
    let deps = EngineDeps::new(
        Arc::new(InMemoryStore::new()),
        Arc::new(ScriptedLlm),
        Arc::new(tools),
        vec![dev],
        Callbacks::new(),
        EngineConfig::in_memory(),
    );

    let response = create_thread(
        &deps,
        CreateThreadRequest {
            content: "Please list .".into(),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let history = deps.store.get_message_history(&response.thread_id, "user", 10).await.unwrap();
    let tool_message = history.iter().find(|m| m.sender_type == conversant::model::SenderType::Tool).unwrap();
    assert_eq!(tool_message.tool_call_id.as_deref(), Some("call_0"));
    let final_message = history.last().unwrap();
    assert_eq!(final_message.sender_id, "Dev");
    assert!(final_message.content.contains("a.txt"));
}

/// S4 — a programmatic agent answers without ever calling the LLM.
#[tokio::test]
async fn s4_programmatic_agent_calculator() {
    struct CalculatorAgent;
    #[async_trait]
    impl ProgrammaticAgent for CalculatorAgent {
        async fn run(&self, _input: ProgrammaticInput) -> ProgrammaticOutput {
            ProgrammaticOutput {
                content: Some("The answer is: 42".into()),
                tool_calls: Vec::new(),
                should_continue: true,
            }
        }
    }

    struct PanicLlm;
    #[async_trait]
    impl LLMService for PanicLlm {
        async fn chat(
            &self,
            _messages: &[ChatMessage],
            _tools: &[ChatToolDefinition],
            _config: &ChatConfig,
            _stream: Option<StreamCallback>,
        ) -> conversant::Result<ChatResponse> {
            panic!("a programmatic agent must never call the LLM");
        }
        fn model_name(&self) -> &str {
            "panic"
        }
    }

    let calculator = AgentConfig::programmatic("Calculator", Arc::new(CalculatorAgent));
    let deps = EngineDeps::new(
        Arc::new(InMemoryStore::new()),
        Arc::new(PanicLlm),
        Arc::new(InMemoryToolRegistry::new()),
        vec![calculator],
        Callbacks::new(),
        EngineConfig::in_memory(),
    );

    let response = create_thread(
        &deps,
        CreateThreadRequest {
            content: "@Calculator what is 15 + 27?".into(),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let history = deps.store.get_message_history(&response.thread_id, "user", 10).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].content, "The answer is: 42");
    assert_eq!(history[1].sender_id, "Calculator");
}

/// S5 — `onLLMCompleted` replaces the answer; `onIntercepted` observes it.
#[tokio::test]
async fn s5_interception_overrides_answer() {
    struct FixedLlm;
    #[async_trait]
    impl LLMService for FixedLlm {
        async fn chat(
            &self,
            _messages: &[ChatMessage],
            _tools: &[ChatToolDefinition],
            _config: &ChatConfig,
            _stream: Option<StreamCallback>,
        ) -> conversant::Result<ChatResponse> {
            Ok(ChatResponse::ok("original response", Vec::new()))
        }
        fn model_name(&self) -> &str {
            "fixed"
        }
    }

    let notices: Arc<Mutex<Vec<InterceptedNotice>>> = Arc::new(Mutex::new(Vec::new()));
    let notices_for_hook = notices.clone();
    let callbacks = Callbacks::new()
        .with_on_llm_completed(|mut payload| {
            payload.answer = Some("intercepted response".into());
            Override::Replace(payload)
        });
    // `with_on_intercepted` has no builder (it's fired internally, not
    // overridable), so set the field directly via a fresh struct built
    // from the same fluent chain plus this one extra hook.
    let callbacks = Callbacks {
        on_intercepted: Some(Arc::new(move |notice: InterceptedNotice| {
            notices_for_hook.lock().unwrap().push(notice);
        })),
        ..callbacks
    };

    let deps = EngineDeps::new(
        Arc::new(InMemoryStore::new()),
        Arc::new(FixedLlm),
        Arc::new(InMemoryToolRegistry::new()),
        vec![AgentConfig::agentic("Dev")],
        callbacks,
        EngineConfig::in_memory(),
    );

    let response = create_thread(
        &deps,
        CreateThreadRequest {
            content: "hi Dev".into(),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let history = deps.store.get_message_history(&response.thread_id, "user", 10).await.unwrap();
    assert_eq!(history[1].content, "intercepted response");

    let recorded = notices.lock().unwrap();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].callback_type, "onLLMCompleted");
    assert_eq!(recorded[0].original_value, "original response");
    assert_eq!(recorded[0].intercepted_value, "intercepted response");
}

/// S6 — a tool that never returns is killed by the per-tool timeout; the
/// failure is recorded and surfaced to the agent as a `tool error:`.
#[tokio::test]
async fn s6_failure_isolation_on_tool_timeout() {
    struct SlowTool;
    #[async_trait]
    impl RunnableTool for SlowTool {
        fn key(&self) -> &str {
            "slow_tool"
        }
        fn name(&self) -> &str {
            "Slow Tool"
        }
        fn description(&self) -> &str {
            "Never finishes in time."
        }
        fn input_schema(&self) -> &serde_json::Value {
            use std::sync::OnceLock;
            static SCHEMA: OnceLock<serde_json::Value> = OnceLock::new();
            SCHEMA.get_or_init(|| serde_json::json!({"type": "object", "properties": {}}))
        }
        async fn execute(&self, _params: serde_json::Value, _context: &ToolContext) -> ToolResult {
            tokio::time::sleep(std::time::Duration::from_millis(500)).await;
            ToolResult::success(serde_json::json!({}))
        }
    }

    struct ScriptedLlm;
    #[async_trait]
    impl LLMService for ScriptedLlm {
        async fn chat(
            &self,
            messages: &[ChatMessage],
            _tools: &[ChatToolDefinition],
            _config: &ChatConfig,
            _stream: Option<StreamCallback>,
        ) -> conversant::Result<ChatResponse> {
            let saw_tool_result = messages.iter().any(|m| m.role == ChatRole::Tool);
            if saw_tool_result {
                return Ok(ChatResponse::ok("Let me try something else.", Vec::new()));
            }
            Ok(ChatResponse::ok(
                "",
                vec![ToolCall {
                    id: "call_0".into(),
                    function: ToolCallFunction {
                        name: "slow_tool".into(),
                        arguments: "{}".into(),
                    },
                }],
            ))
        }
        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    let dev = AgentConfig::agentic("Dev").with_allowed_tools(["slow_tool".to_string()]);
    let tools = InMemoryToolRegistry::new().with_tool(Arc::new(SlowTool));
    let config = EngineConfig::in_memory().with_default_tool_timeout_ms(20);
    let deps = EngineDeps::new(
        Arc::new(InMemoryStore::new()),
        Arc::new(ScriptedLlm),
        Arc::new(tools),
        vec![dev],
        Callbacks::new(),
        config,
    );

    let response = create_thread(
        &deps,
        CreateThreadRequest {
            content: "run the slow tool".into(),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let history = deps.store.get_message_history(&response.thread_id, "user", 10).await.unwrap();
    let tool_message = history.iter().find(|m| m.sender_type == conversant::model::SenderType::Tool).unwrap();
    assert!(tool_message.content.starts_with("tool error:"));
    assert!(tool_message.content.contains("timed out"));
}
