//! The work contract the bus drives: `atrium-workspace` implements
//! [`TaskExecutor`] to actually run an agent against a task; the bus itself
//! has no idea what an "agent" does, only how to schedule and retry it.

use async_trait::async_trait;
use atrium_core::{AgentId, CoreError, ProjectId, SessionId, UserId};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct SubmittedTask {
    pub task_id: Uuid,
    pub agent_id: AgentId,
    pub session_id: SessionId,
    pub user_id: UserId,
    pub project_id: ProjectId,
    pub payload: Value,
}

#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Runs one task. `cancel` is observed cooperatively: on cancellation the
    /// implementation has a short grace period to wind down before the bus
    /// considers the task abandoned.
    async fn execute(&self, task: SubmittedTask, cancel: CancellationToken) -> Result<Value, CoreError>;
}
