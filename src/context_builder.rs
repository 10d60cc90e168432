//! Deterministic system-prompt composition.

use crate::model::{AgentConfig, Thread};
use chrono::Local;

/// A task bound to the current session, if any.
#[derive(Debug, Clone)]
pub struct ActiveTask {
    pub name: String,
    pub goal: String,
    pub status: String,
}

/// Builds the `systemPrompt` handed to an agentic agent's LLM call.
pub struct ContextBuilder;

impl ContextBuilder {
    /// Compose the system prompt for `agent` operating in `thread`, given
    /// the full roster of agents known to the session (used to derive
    /// "other available agents" not already in this thread) and an
    /// optional active task.
    ///
    /// Sections are joined by blank lines, in a fixed order: thread
    /// context, task context, agent identity, current date/time.
    pub fn build(
        agent: &AgentConfig,
        thread: &Thread,
        all_agents: &[AgentConfig],
        active_task: Option<&ActiveTask>,
    ) -> String {
        let mut sections = Vec::new();

        sections.push(Self::thread_context(agent, thread, all_agents));
        if let Some(task) = active_task {
            sections.push(Self::task_context(task));
        }
        sections.push(Self::agent_identity(agent));
        sections.push(format!(
            "Current date/time: {}",
            Local::now().format("%Y-%m-%d %H:%M:%S %Z")
        ));

        sections.join("\n\n")
    }

    fn thread_context(agent: &AgentConfig, thread: &Thread, all_agents: &[AgentConfig]) -> String {
        let mut lines = vec![format!(
            "Thread: {}",
            thread.name.as_deref().unwrap_or(&thread.id)
        )];
        lines.push("Participants:".to_string());
        // Participants listed in thread order.
        for participant in &thread.participants {
            if let Some(participant_agent) = all_agents.iter().find(|a| &a.name == participant) {
                lines.push(format!(
                    "- {} | {} | {}",
                    participant_agent.name,
                    participant_agent.role.as_deref().unwrap_or("participant"),
                    participant_agent.description.as_deref().unwrap_or(""),
                ));
            } else {
                lines.push(format!("- {participant}"));
            }
        }
        lines.push("Use @name to address a specific participant directly.".to_string());

        // "Other available agents" excludes the current agent and current
        // participants.
        let others: Vec<&AgentConfig> = all_agents
            .iter()
            .filter(|a| a.name != agent.name && !thread.participants.contains(&a.name))
            .collect();
        if !others.is_empty() {
            lines.push("Other available agents (reachable via ask_question/create_thread):".to_string());
            for other in others {
                lines.push(format!(
                    "- {} | {}",
                    other.name,
                    other.role.as_deref().unwrap_or("participant"),
                ));
            }
        }

        lines.join("\n")
    }

    fn task_context(task: &ActiveTask) -> String {
        format!(
            "Current task: {}\nGoal: {}\nStatus: {}",
            task.name, task.goal, task.status
        )
    }

    fn agent_identity(agent: &AgentConfig) -> String {
        let mut lines = vec![format!("You are {}.", agent.name)];
        if let Some(role) = &agent.role {
            lines.push(format!("Role: {role}"));
        }
        if let Some(personality) = &agent.personality {
            lines.push(format!("Personality: {personality}"));
        }
        if let Some(instructions) = &agent.instructions {
            lines.push(format!("Instructions: {instructions}"));
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ThreadStatus;
    use chrono::Utc;

    fn thread() -> Thread {
        let now = Utc::now();
        Thread {
            id: "t1".into(),
            external_id: None,
            name: Some("Sprint planning".into()),
            participants: vec!["user".into(), "Dev".into()],
            status: ThreadStatus::Active,
            summary: None,
            parent_thread_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn composes_sections_in_fixed_order_with_blank_line_separators() {
        let dev = AgentConfig::agentic("Dev").with_role("engineer");
        let agents = vec![dev.clone(), AgentConfig::agentic("Ops")];
        let prompt = ContextBuilder::build(&dev, &thread(), &agents, None);
        let thread_idx = prompt.find("Thread:").unwrap();
        let identity_idx = prompt.find("You are Dev.").unwrap();
        assert!(thread_idx < identity_idx);
        assert!(prompt.contains("Other available agents"));
        assert!(prompt.contains("- Ops"));
    }

    #[test]
    fn excludes_current_agent_and_current_participants_from_other_agents() {
        let dev = AgentConfig::agentic("Dev");
        let agents = vec![dev.clone(), AgentConfig::agentic("user"), AgentConfig::agentic("Ops")];
        let prompt = ContextBuilder::build(&dev, &thread(), &agents, None);
        let other_section = prompt.split("Other available agents").nth(1).unwrap();
        assert!(!other_section.contains("- Dev"));
        assert!(other_section.contains("- Ops"));
    }
}
