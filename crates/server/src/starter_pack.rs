//! Materializes a new project's starter pack: four agents with distinct
//! roles, each registered on the Agent Bus and given a long-term memory
//! collection. Creation is idempotent by agent name, so replaying this on an
//! already-provisioned project (a retried request, a redeployed process)
//! never double-creates an agent or its bus queue.

use atrium_core::{AgentConfig, CoreError, ProjectId, TenantPredicate, UserId};

use crate::error::ApiError;
use crate::state::AppState;

struct StarterAgent {
    name: &'static str,
    system_prompt: &'static str,
    allowed_tools: &'static [&'static str],
}

const STARTER_AGENTS: &[StarterAgent] = &[
    StarterAgent {
        name: "coder",
        system_prompt: "You write and edit code for the user's project.",
        allowed_tools: &["read_file", "write_file", "execute_command"],
    },
    StarterAgent {
        name: "analyzer",
        system_prompt: "You read code and data to answer questions without modifying anything.",
        allowed_tools: &["read_file", "list_directory"],
    },
    StarterAgent {
        name: "writer",
        system_prompt: "You draft and edit prose: docs, comments, commit messages.",
        allowed_tools: &["read_file", "write_file"],
    },
    StarterAgent {
        name: "researcher",
        system_prompt: "You gather information from the web and the project to brief the other agents.",
        allowed_tools: &["read_file", "web_search"],
    },
];

pub async fn materialize(state: &AppState, user_id: UserId, project_id: ProjectId) -> Result<(), ApiError> {
    let predicate = TenantPredicate::user_only(user_id).with_project(project_id);
    let space = state.registry.get_or_create(user_id, project_id).await;

    for spec in STARTER_AGENTS {
        let agent = match state
            .repos
            .agents
            .get_by_name(project_id.as_uuid(), spec.name)
            .await
            .map_err(CoreError::from)?
        {
            Some(existing) => existing,
            None => {
                let config = AgentConfig {
                    system_prompt: spec.system_prompt.to_string(),
                    model: state.config.agents.starter_pack_model.clone(),
                    concurrency_limit: state.config.bus.default_concurrency_limit,
                    allowed_tools: spec.allowed_tools.iter().map(|t| t.to_string()).collect(),
                };
                state
                    .repos
                    .agents
                    .create(predicate, spec.name, &config)
                    .await
                    .map_err(CoreError::from)?
            }
        };

        state.bus.register(agent.id, agent.effective_concurrency_limit(), state.executor.clone());
        space.ensure_context_collection(&agent.name).await?;
    }

    Ok(())
}
