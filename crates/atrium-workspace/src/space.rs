//! A single user+project worker space: the agents that belong to it plus a
//! small agent cache to avoid a storage round trip on every dispatch.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use atrium_core::{Agent, AgentId, CoreError, ProjectId, UserId};
use atrium_storage::AgentRepo;
use serde_json::Value;

use crate::agent_cache::AgentCache;
use crate::context::{collection_name, ContextHit, ContextRecord, ContextStore};

pub struct WorkerSpace {
    pub user_id: UserId,
    pub project_id: ProjectId,
    agents: AgentRepo,
    cache: StdMutex<AgentCache>,
    context_store: Arc<dyn ContextStore>,
}

impl WorkerSpace {
    pub fn new(
        user_id: UserId,
        project_id: ProjectId,
        agents: AgentRepo,
        cache_capacity: usize,
        soft_ttl: Duration,
        context_store: Arc<dyn ContextStore>,
    ) -> Self {
        Self {
            user_id,
            project_id,
            agents,
            cache: StdMutex::new(AgentCache::new(cache_capacity, soft_ttl)),
            context_store,
        }
    }

    pub async fn get_agent(&self, agent_id: AgentId) -> Result<Agent, atrium_core::CoreError> {
        if let Some(agent) = self.cache.lock().unwrap().get(agent_id) {
            return Ok(agent);
        }
        let agent = self
            .agents
            .get(self.project_id.as_uuid(), agent_id.as_uuid())
            .await
            .map_err(atrium_core::CoreError::from)?;
        self.cache.lock().unwrap().insert(agent.clone());
        Ok(agent)
    }

    pub async fn list_agents(&self) -> Result<Vec<Agent>, atrium_core::CoreError> {
        let agents = self
            .agents
            .list_for_project(self.project_id.as_uuid())
            .await
            .map_err(atrium_core::CoreError::from)?;
        let mut cache = self.cache.lock().unwrap();
        for agent in &agents {
            cache.insert(agent.clone());
        }
        Ok(agents)
    }

    pub fn invalidate_agent(&self, agent_id: AgentId) {
        self.cache.lock().unwrap().invalidate(agent_id);
    }

    /// Atomically claims one concurrency slot if the agent has spare
    /// capacity. The cache is invalidated on success so the next read sees
    /// the bumped `in_flight` count rather than a stale cached copy.
    pub async fn reserve_slot(&self, agent_id: AgentId) -> Result<bool, atrium_core::CoreError> {
        let reserved = self
            .agents
            .try_reserve_slot(agent_id.as_uuid())
            .await
            .map_err(atrium_core::CoreError::from)?;
        if reserved {
            self.invalidate_agent(agent_id);
        }
        Ok(reserved)
    }

    pub async fn release_slot(&self, agent_id: AgentId) -> Result<(), atrium_core::CoreError> {
        self.agents
            .release_slot(agent_id.as_uuid())
            .await
            .map_err(atrium_core::CoreError::from)?;
        self.invalidate_agent(agent_id);
        Ok(())
    }

    /// Ensures the agent's long-term memory collection exists. Called once
    /// when the starter pack materializes each agent.
    pub async fn ensure_context_collection(&self, agent_name: &str) -> Result<(), CoreError> {
        let collection = collection_name(self.user_id, self.project_id, agent_name);
        self.context_store.ensure_collection(&collection).await
    }

    pub async fn search_context(
        &self,
        agent_id: AgentId,
        query: &str,
        limit: usize,
        filters: &Value,
    ) -> Result<Vec<ContextHit>, CoreError> {
        let agent = self.get_agent(agent_id).await?;
        let collection = collection_name(self.user_id, self.project_id, &agent.name);
        self.context_store.search(&collection, query, limit, filters).await
    }

    pub async fn add_context(&self, agent_id: AgentId, record: ContextRecord) -> Result<(), CoreError> {
        let agent = self.get_agent(agent_id).await?;
        let collection = collection_name(self.user_id, self.project_id, &agent.name);
        self.context_store.add(&collection, record).await
    }

    pub async fn clear_context(&self, agent_id: AgentId) -> Result<(), CoreError> {
        let agent = self.get_agent(agent_id).await?;
        let collection = collection_name(self.user_id, self.project_id, &agent.name);
        self.context_store.clear(&collection).await
    }
}
