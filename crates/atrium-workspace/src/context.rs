//! The seam to an agent's long-term memory. Running an actual vector store
//! is out of scope for this crate — [`ContextStore`] is the contract a real
//! embedding-backed client plugs into, the same way [`crate::AgentInvoker`]
//! stands in for a model client.

use async_trait::async_trait;
use atrium_core::{CoreError, ProjectId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One unit appended to an agent's long-term memory: an interaction plus
/// the metadata the caller wants to be able to filter on later.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContextRecord {
    pub text: String,
    pub record_type: String,
    pub task_id: Option<String>,
    pub success: Option<bool>,
    pub timestamp: DateTime<Utc>,
}

/// One hit from [`ContextStore::search`], already scored against the query.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContextHit {
    pub record: ContextRecord,
    pub score: f32,
}

/// The per-agent collection a [`ContextStore`] operates on, named
/// `user{uid}_project{pid}_{agent_name}_context` so collections never
/// collide across tenants or projects.
pub fn collection_name(user_id: UserId, project_id: ProjectId, agent_name: &str) -> String {
    format!("user{user_id}_project{project_id}_{agent_name}_context")
}

#[async_trait]
pub trait ContextStore: Send + Sync {
    /// Creates the collection if it does not already exist. Called once per
    /// agent at starter-pack time and is otherwise idempotent.
    async fn ensure_collection(&self, collection: &str) -> Result<(), CoreError>;

    async fn search(
        &self,
        collection: &str,
        query: &str,
        limit: usize,
        filters: &Value,
    ) -> Result<Vec<ContextHit>, CoreError>;

    async fn add(&self, collection: &str, record: ContextRecord) -> Result<(), CoreError>;

    async fn clear(&self, collection: &str) -> Result<(), CoreError>;
}

/// A [`ContextStore`] with nowhere to put anything: every write is a no-op
/// and every search returns empty. Lets the coordination pipeline exercise
/// `search_context`/`add_context`/`clear_context` end-to-end without a real
/// embedding-backed vector store behind it.
pub struct NullContextStore;

#[async_trait]
impl ContextStore for NullContextStore {
    async fn ensure_collection(&self, _collection: &str) -> Result<(), CoreError> {
        Ok(())
    }

    async fn search(
        &self,
        _collection: &str,
        _query: &str,
        _limit: usize,
        _filters: &Value,
    ) -> Result<Vec<ContextHit>, CoreError> {
        Ok(Vec::new())
    }

    async fn add(&self, _collection: &str, _record: ContextRecord) -> Result<(), CoreError> {
        Ok(())
    }

    async fn clear(&self, _collection: &str) -> Result<(), CoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_name_namespaces_by_tenant_project_and_agent() {
        let user_id = UserId::new();
        let project_id = ProjectId::new();
        let name = collection_name(user_id, project_id, "coder");
        assert_eq!(name, format!("user{user_id}_project{project_id}_coder_context"));
    }

    #[tokio::test]
    async fn null_store_search_is_always_empty() {
        let store = NullContextStore;
        let hits = store.search("any", "query", 10, &Value::Null).await.unwrap();
        assert!(hits.is_empty());
    }
}
