//! Worker Space Registry: lazily materializes one [`WorkerSpace`]
//! per `(user_id, project_id)` pair. Concurrent callers racing to create the
//! same space are coalesced onto a single materialization via a per-key
//! `OnceCell`, so `get_or_create` is idempotent under contention.

use std::sync::Arc;
use std::time::Duration;

use atrium_core::{ProjectId, UserId};
use atrium_storage::AgentRepo;
use dashmap::DashMap;
use tokio::sync::OnceCell;

use crate::context::ContextStore;
use crate::space::WorkerSpace;

type SpaceKey = (UserId, ProjectId);

#[derive(Clone, Copy, Debug)]
pub struct RegistryStats {
    pub active_spaces: usize,
}

pub struct WorkerSpaceRegistry {
    spaces: DashMap<SpaceKey, Arc<OnceCell<Arc<WorkerSpace>>>>,
    agent_repo: AgentRepo,
    agent_cache_capacity: usize,
    agent_cache_soft_ttl: Duration,
    context_store: Arc<dyn ContextStore>,
}

impl WorkerSpaceRegistry {
    pub fn new(
        agent_repo: AgentRepo,
        agent_cache_capacity: usize,
        agent_cache_soft_ttl: Duration,
        context_store: Arc<dyn ContextStore>,
    ) -> Self {
        Self {
            spaces: DashMap::new(),
            agent_repo,
            agent_cache_capacity,
            agent_cache_soft_ttl,
            context_store,
        }
    }

    pub async fn get_or_create(&self, user_id: UserId, project_id: ProjectId) -> Arc<WorkerSpace> {
        let key = (user_id, project_id);
        let cell = self
            .spaces
            .entry(key)
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        cell.get_or_init(|| async {
            Arc::new(WorkerSpace::new(
                user_id,
                project_id,
                self.agent_repo.clone(),
                self.agent_cache_capacity,
                self.agent_cache_soft_ttl,
                self.context_store.clone(),
            ))
        })
        .await
        .clone()
    }

    pub fn get(&self, user_id: UserId, project_id: ProjectId) -> Option<Arc<WorkerSpace>> {
        self.spaces.get(&(user_id, project_id)).and_then(|cell| cell.get().cloned())
    }

    pub fn remove(&self, user_id: UserId, project_id: ProjectId) {
        self.spaces.remove(&(user_id, project_id));
    }

    /// Removes every space belonging to `user_id`: full tenant
    /// teardown, e.g. account deletion.
    pub fn remove_user_spaces(&self, user_id: UserId) {
        self.spaces.retain(|(u, _), _| *u != user_id);
    }

    pub fn cleanup_all(&self) {
        self.spaces.clear();
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            active_spaces: self.spaces.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> AgentRepo {
        // AgentRepo only needs a pool to construct; its methods require a
        // live database and are exercised in atrium-storage's own tests, not
        // here. `PgPool::connect_lazy` defers the actual connection.
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/atrium")
            .expect("lazy pool construction never touches the network");
        AgentRepo::new(pool)
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent_for_the_same_key() {
        let registry = WorkerSpaceRegistry::new(repo(), 32, Duration::from_secs(300), Arc::new(crate::context::NullContextStore));
        let user_id = UserId::new();
        let project_id = ProjectId::new();
        let a = registry.get_or_create(user_id, project_id).await;
        let b = registry.get_or_create(user_id, project_id).await;
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn concurrent_get_or_create_coalesces_to_one_space() {
        let registry = Arc::new(WorkerSpaceRegistry::new(repo(), 32, Duration::from_secs(300), Arc::new(crate::context::NullContextStore)));
        let user_id = UserId::new();
        let project_id = ProjectId::new();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move { registry.get_or_create(user_id, project_id).await }));
        }
        let mut spaces = Vec::new();
        for handle in handles {
            spaces.push(handle.await.unwrap());
        }
        assert!(spaces.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    }

    #[tokio::test]
    async fn remove_user_spaces_clears_only_that_user() {
        let registry = WorkerSpaceRegistry::new(repo(), 32, Duration::from_secs(300), Arc::new(crate::context::NullContextStore));
        let user_a = UserId::new();
        let user_b = UserId::new();
        let project_id = ProjectId::new();
        registry.get_or_create(user_a, project_id).await;
        registry.get_or_create(user_b, project_id).await;
        registry.remove_user_spaces(user_a);
        assert!(registry.get(user_a, project_id).is_none());
        assert!(registry.get(user_b, project_id).is_some());
    }
}
