use crate::model::message::ToolCall;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Whether an agent's turn is driven by an LLM or a pure function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentType {
    Agentic,
    Programmatic,
}

/// Identity and policy for a named participant.
///
/// Supplied at session start and immutable for the lifetime of a
/// processing step — callers that need to change an agent's policy
/// mid-conversation construct a new `AgentConfig` for the next turn.
#[derive(Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub name: String,
    pub role: Option<String>,
    pub personality: Option<String>,
    pub instructions: Option<String>,
    pub description: Option<String>,
    pub agent_type: AgentType,
    /// `None` means unrestricted (all tools available).
    pub allowed_tools: Option<HashSet<String>>,
    /// `None` means unrestricted (all agents may be mentioned/routed to).
    pub allowed_agents: Option<HashSet<String>>,
    pub llm_options: LlmOptions,
    /// Present only for `agent_type == Programmatic` agents. Skipped
    /// during (de)serialization since it is a caller-supplied closure, not
    /// persisted configuration.
    #[serde(skip)]
    pub processing_function: Option<Arc<dyn ProgrammaticAgent>>,
}

impl std::fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentConfig")
            .field("name", &self.name)
            .field("role", &self.role)
            .field("agent_type", &self.agent_type)
            .field("allowed_tools", &self.allowed_tools)
            .field("allowed_agents", &self.allowed_agents)
            .field("has_processing_function", &self.processing_function.is_some())
            .finish()
    }
}

/// Input handed to a programmatic agent's processing function.
#[derive(Debug, Clone)]
pub struct ProgrammaticInput {
    pub message_content: String,
    pub history: Vec<crate::model::Message>,
}

/// Output of a programmatic agent's processing function: `content` (if
/// non-empty, persisted as an agent Message), `tool_calls` (each emitted
/// as its own TOOL_CALL event), and `should_continue` (if true, or
/// `content` contains `@mentions`, a follow-up MESSAGE event is emitted
/// to re-drive routing).
#[derive(Debug, Clone, Default)]
pub struct ProgrammaticOutput {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub should_continue: bool,
}

/// A pure-function agent response generator. Implementations should not
/// perform LLM calls — that is what distinguishes a programmatic agent
/// from an agentic one.
#[async_trait]
pub trait ProgrammaticAgent: Send + Sync {
    async fn run(&self, input: ProgrammaticInput) -> ProgrammaticOutput;
}

/// Provider-agnostic knobs forwarded to [`crate::llm::LLMService::chat`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmOptions {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl Default for LlmOptions {
    fn default() -> Self {
        Self {
            model: None,
            temperature: None,
            max_tokens: None,
        }
    }
}

impl AgentConfig {
    /// Construct an agentic (LLM-driven) agent with default options.
    pub fn agentic(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: None,
            personality: None,
            instructions: None,
            description: None,
            agent_type: AgentType::Agentic,
            allowed_tools: None,
            allowed_agents: None,
            llm_options: LlmOptions::default(),
            processing_function: None,
        }
    }

    /// Construct a programmatic agent with the given processing function
    /// (response produced by a pure function instead of an LLM call).
    pub fn programmatic(name: impl Into<String>, handler: Arc<dyn ProgrammaticAgent>) -> Self {
        Self {
            agent_type: AgentType::Programmatic,
            processing_function: Some(handler),
            ..Self::agentic(name)
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn with_allowed_tools(mut self, tools: impl IntoIterator<Item = String>) -> Self {
        self.allowed_tools = Some(tools.into_iter().collect());
        self
    }

    pub fn with_allowed_agents(mut self, agents: impl IntoIterator<Item = String>) -> Self {
        self.allowed_agents = Some(agents.into_iter().collect());
        self
    }

    /// `true` if this agent's tool set is unrestricted or explicitly
    /// includes `tool_key`.
    pub fn can_use_tool(&self, tool_key: &str) -> bool {
        match &self.allowed_tools {
            None => true,
            Some(set) => set.contains(tool_key),
        }
    }

    /// `true` if this agent's routing targets are unrestricted or
    /// explicitly include `agent_name`.
    pub fn can_route_to(&self, agent_name: &str) -> bool {
        match &self.allowed_agents {
            None => true,
            Some(set) => set.contains(agent_name),
        }
    }
}
