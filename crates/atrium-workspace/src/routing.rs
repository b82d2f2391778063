//! Orchestrated routing: when a message does not name a target agent, pick
//! one by deterministic token-overlap scoring rather than an embedding call —
//! cheap, explainable, and computable entirely offline. Ties break on lowest
//! in-flight count, then on agent id ordering, so routing is fully
//! deterministic and testable.

use std::collections::HashSet;

use atrium_core::{Agent, AgentId};

fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f64 / union as f64
}

/// Scores every ready, capacity-having agent against `message_content` and
/// returns the best match. Returns `None` if no candidate has capacity.
pub fn route(message_content: &str, candidates: &[Agent]) -> Option<AgentId> {
    let message_tokens = tokenize(message_content);

    candidates
        .iter()
        .filter(|agent| agent.has_capacity())
        .map(|agent| {
            let agent_tokens = tokenize(&format!("{} {}", agent.name, agent.config.system_prompt));
            let score = jaccard(&message_tokens, &agent_tokens);
            (score, agent.in_flight, agent.id)
        })
        .max_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.1.cmp(&a.1)) // lower in_flight wins
                .then_with(|| b.2.cmp(&a.2)) // lower agent id wins
        })
        .map(|(_, _, id)| id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use atrium_core::{AgentConfig, AgentStatus, ProjectId};
    use chrono::Utc;

    fn agent(name: &str, prompt: &str, in_flight: u32) -> Agent {
        Agent {
            id: AgentId::new(),
            project_id: ProjectId::new(),
            name: name.to_string(),
            config: AgentConfig {
                system_prompt: prompt.to_string(),
                model: "claude".into(),
                concurrency_limit: 4,
                allowed_tools: vec![],
            },
            status: AgentStatus::Ready,
            in_flight,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn picks_the_agent_whose_prompt_overlaps_the_message() {
        let reviewer = agent("reviewer", "reviews pull requests for code quality", 0);
        let writer = agent("writer", "drafts release notes and documentation", 0);
        let picked = route("please review this pull request", &[reviewer.clone(), writer.clone()]);
        assert_eq!(picked, Some(reviewer.id));
    }

    #[test]
    fn ties_break_on_lower_in_flight_count() {
        let busy = agent("assistant", "general assistant", 3);
        let idle = agent("assistant", "general assistant", 0);
        let picked = route("hello there", &[busy.clone(), idle.clone()]);
        assert_eq!(picked, Some(idle.id));
    }

    #[test]
    fn agents_without_capacity_are_never_chosen() {
        let mut full = agent("assistant", "general assistant", 4);
        full.config.concurrency_limit = 4;
        let picked = route("hello", std::slice::from_ref(&full));
        assert_eq!(picked, None);
    }
}
