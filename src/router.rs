//! Target-agent resolution.
//!
//! Each rule below is deliberately a free function so it can be unit
//! tested independently. [`Router::route`] composes them in order and
//! stops at the first rule that applies.

use crate::model::{AgentConfig, EventPayload, SenderType, Thread};
use regex::Regex;
use std::sync::OnceLock;

fn mention_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // Word-character mentions, case-sensitive. Non-ASCII and
    // case-insensitive matching are intentionally out of scope.
    PATTERN.get_or_init(|| Regex::new(r"@(\w+)").unwrap())
}

/// Extract the set of `@name` mentions from `content`, in first-seen
/// order with duplicates removed.
pub fn parse_mentions(content: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut names = Vec::new();
    for capture in mention_pattern().captures_iter(content) {
        let name = capture[1].to_string();
        if seen.insert(name.clone()) {
            names.push(name);
        }
    }
    names
}

/// Resolves the downstream agents for a MESSAGE payload.
pub struct Router;

impl Router {
    /// `(payload, thread, available_agents) -> [AgentConfig]`, applying a
    /// fixed set of ordered rules. `sender_agent` is the sending
    /// `AgentConfig` when `payload.sender_type == Agent`, used to apply
    /// the allowed-agents filter.
    pub fn route<'a>(
        payload: &EventPayload,
        thread: &Thread,
        available_agents: &'a [AgentConfig],
        sender_agent: Option<&AgentConfig>,
    ) -> Vec<&'a AgentConfig> {
        let (sender_id, sender_type, content) = match payload {
            EventPayload::Message {
                sender_id,
                sender_type,
                content,
                ..
            } => (sender_id.as_str(), *sender_type, content.as_deref().unwrap_or("")),
            _ => return Vec::new(),
        };

        // Rule 1: tool-result fan-in returns to its originating agent.
        if sender_type == SenderType::Tool {
            if let Some(agent) = available_agents.iter().find(|a| a.name == sender_id) {
                return vec![agent];
            }
            return Vec::new();
        }

        // Rule 2: explicit @mentions.
        let mentions = parse_mentions(content);
        if !mentions.is_empty() {
            let targets: Vec<&AgentConfig> = available_agents
                .iter()
                .filter(|a| mentions.iter().any(|m| m == &a.name))
                .collect();
            return Self::apply_allowed_agents_filter(targets, sender_type, sender_agent);
        }

        // Rule 3: two-party fallback.
        if thread.is_two_party() {
            let targets: Vec<&AgentConfig> = available_agents
                .iter()
                .filter(|a| a.name != sender_id && thread.participants.contains(&a.name))
                .collect();
            return Self::apply_allowed_agents_filter(targets, sender_type, sender_agent);
        }

        // Rule 4: no implicit target.
        Vec::new()
    }

    /// The allowed-agents filter never applies when the sender is a
    /// user, tool, or system — only an agent sender can narrow its own
    /// fan-out this way.
    fn apply_allowed_agents_filter<'a>(
        targets: Vec<&'a AgentConfig>,
        sender_type: SenderType,
        sender_agent: Option<&AgentConfig>,
    ) -> Vec<&'a AgentConfig> {
        if sender_type != SenderType::Agent {
            return targets;
        }
        match sender_agent {
            Some(sender) => targets
                .into_iter()
                .filter(|a| sender.can_route_to(&a.name))
                .collect(),
            None => targets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ThreadStatus;
    use chrono::Utc;
    use std::collections::HashMap;

    fn thread(participants: Vec<&str>) -> Thread {
        let now = Utc::now();
        Thread {
            id: "t1".into(),
            external_id: None,
            name: None,
            participants: participants.into_iter().map(String::from).collect(),
            status: ThreadStatus::Active,
            summary: None,
            parent_thread_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn message_payload(sender_id: &str, sender_type: SenderType, content: &str) -> EventPayload {
        EventPayload::Message {
            sender_id: sender_id.into(),
            sender_type,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn parses_multiple_mentions_in_order() {
        let mentions = parse_mentions("Hello, @Albert! Please ask @Robin a question.");
        assert_eq!(mentions, vec!["Albert".to_string(), "Robin".to_string()]);
    }

    #[test]
    fn scenario_s1_mention_routing_with_allowed_agents_filter() {
        let albert = AgentConfig::agentic("Albert").with_allowed_agents(["Robin".into()]);
        let robin = AgentConfig::agentic("Robin").with_allowed_agents(["Albert".into()]);
        let charlie = AgentConfig::agentic("Charlie");
        let agents = vec![albert.clone(), robin.clone(), charlie];
        let thread = thread(vec!["user", "Albert", "Robin", "Charlie"]);

        let payload = message_payload(
            "user",
            SenderType::User,
            "Hello, @Albert! Please ask @Robin a question.",
        );
        let targets = Router::route(&payload, &thread, &agents, None);
        assert_eq!(targets.iter().map(|a| a.name.as_str()).collect::<Vec<_>>(), vec!["Albert", "Robin"]);

        // Albert mentioning Robin, filtered by Albert's allowedAgents.
        let albert_payload = message_payload("Albert", SenderType::Agent, "@Robin, what do you think?");
        let targets = Router::route(&albert_payload, &thread, &agents, Some(&albert));
        assert_eq!(targets.iter().map(|a| a.name.as_str()).collect::<Vec<_>>(), vec!["Robin"]);
    }

    #[test]
    fn scenario_s2_two_party_fallback() {
        let agent1 = AgentConfig::agentic("Agent1");
        let agents = vec![agent1];
        let two_party = thread(vec!["user", "Agent1"]);
        let payload = message_payload("user", SenderType::User, "no mentions here");
        let targets = Router::route(&payload, &two_party, &agents, None);
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].name, "Agent1");

        let agent2 = AgentConfig::agentic("Agent2");
        let three_party = thread(vec!["user", "Agent1", "Agent2"]);
        let agents = vec![AgentConfig::agentic("Agent1"), agent2];
        let targets = Router::route(&payload, &three_party, &agents, None);
        assert!(targets.is_empty());
    }

    #[test]
    fn two_party_fallback_ignores_agents_outside_the_thread() {
        // Session-wide roster has three agents, but this thread only seats
        // one of them alongside the user — the fallback must not fan out to
        // agents configured for the session but absent from this thread.
        let agents = vec![
            AgentConfig::agentic("Agent1"),
            AgentConfig::agentic("Agent2"),
            AgentConfig::agentic("Agent3"),
        ];
        let thread = thread(vec!["user", "Agent1"]);
        let payload = message_payload("user", SenderType::User, "no mentions here");
        let targets = Router::route(&payload, &thread, &agents, None);
        assert_eq!(targets.iter().map(|a| a.name.as_str()).collect::<Vec<_>>(), vec!["Agent1"]);
    }

    #[test]
    fn scenario_s7_mention_routing_idempotence() {
        let a = AgentConfig::agentic("A");
        let b = AgentConfig::agentic("B");
        let sender = AgentConfig::agentic("Sender").with_allowed_agents(["A".into()]);
        let agents = vec![a, b];
        let thread = thread(vec!["Sender", "A", "B"]);
        let payload = message_payload("Sender", SenderType::Agent, "@A @B please help");
        let targets = Router::route(&payload, &thread, &agents, Some(&sender));
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].name, "A");
    }

    #[test]
    fn unknown_mention_is_ignored_without_error() {
        let agents = vec![AgentConfig::agentic("Albert")];
        let thread = thread(vec!["user", "Albert"]);
        let payload = message_payload("user", SenderType::User, "@Nobody are you there?");
        let targets = Router::route(&payload, &thread, &agents, None);
        assert!(targets.is_empty());
    }

    #[test]
    fn tool_result_routes_back_to_originating_agent() {
        let dev = AgentConfig::agentic("Dev");
        let agents = vec![dev];
        let thread = thread(vec!["user", "Dev"]);
        let payload = message_payload("Dev", SenderType::Tool, "tool output: 42");
        let targets = Router::route(&payload, &thread, &agents, None);
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].name, "Dev");
    }
}
