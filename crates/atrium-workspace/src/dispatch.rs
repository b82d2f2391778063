//! Resolves which agent handles a message: either the caller names one
//! directly, or the registry picks one via the orchestrated routing policy
//! directly, picking between a named agent and the routing policy.

use atrium_core::{AgentId, CoreError, ProjectId, UserId};
use std::sync::Arc;

use crate::registry::WorkerSpaceRegistry;
use crate::routing;

#[derive(Clone, Copy, Debug)]
pub enum DispatchMode {
    Direct(AgentId),
    Orchestrated,
}

pub struct Dispatcher {
    registry: Arc<WorkerSpaceRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<WorkerSpaceRegistry>) -> Self {
        Self { registry }
    }

    pub async fn resolve_agent(
        &self,
        user_id: UserId,
        project_id: ProjectId,
        mode: DispatchMode,
        message_content: &str,
    ) -> Result<AgentId, CoreError> {
        match mode {
            DispatchMode::Direct(agent_id) => {
                let space = self.registry.get_or_create(user_id, project_id).await;
                space.get_agent(agent_id).await?;
                Ok(agent_id)
            }
            DispatchMode::Orchestrated => {
                let space = self.registry.get_or_create(user_id, project_id).await;
                let agents = space.list_agents().await?;
                routing::route(message_content, &agents)
                    .ok_or_else(|| CoreError::NotFound("no agent with spare capacity in this project".to_string()))
            }
        }
    }
}
