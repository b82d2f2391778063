//! Bridges the Agent Bus's scheduling to an actual agent turn. Running the
//! model itself is out of scope here (coordination core, not an inference
//! gateway); [`AgentInvoker`] is the seam a model client plugs into.

use std::sync::Arc;

use async_trait::async_trait;
use atrium_bus::{SubmittedTask, TaskExecutor};
use atrium_core::{Agent, CoreError};
use atrium_stream::StreamManager;
use serde_json::Value;
use stream_event::EventPayload;
use tokio_util::sync::CancellationToken;

use crate::registry::WorkerSpaceRegistry;

#[async_trait]
pub trait AgentInvoker: Send + Sync {
    async fn invoke(&self, agent: &Agent, payload: &Value, cancel: CancellationToken) -> Result<Value, CoreError>;
}

pub struct WorkspaceExecutor {
    registry: Arc<WorkerSpaceRegistry>,
    stream: Arc<StreamManager>,
    invoker: Arc<dyn AgentInvoker>,
}

impl WorkspaceExecutor {
    pub fn new(registry: Arc<WorkerSpaceRegistry>, stream: Arc<StreamManager>, invoker: Arc<dyn AgentInvoker>) -> Self {
        Self {
            registry,
            stream,
            invoker,
        }
    }
}

#[async_trait]
impl TaskExecutor for WorkspaceExecutor {
    async fn execute(&self, task: SubmittedTask, cancel: CancellationToken) -> Result<Value, CoreError> {
        let space = self.registry.get_or_create(task.user_id, task.project_id).await;
        let agent = space
            .get_agent(task.agent_id)
            .await
            .map_err(|_| CoreError::NotFound(format!("agent {} not found in any registered space", task.agent_id)))?;

        // The bus already enforces per-agent concurrency via its worker pool
        // sizing; this reservation keeps the persisted `in_flight` counter
        // (used by orchestrated routing's capacity check) in sync with it.
        let reserved = space.reserve_slot(task.agent_id).await.unwrap_or(false);

        self.stream
            .publish(task.session_id, None, &EventPayload::TaskStarted { task_id: task.task_id })
            .await;

        let result = self.invoker.invoke(&agent, &task.payload, cancel).await;

        if reserved {
            let _ = space.release_slot(task.agent_id).await;
        }

        match &result {
            Ok(_) => {
                self.stream
                    .publish(task.session_id, None, &EventPayload::TaskCompleted { task_id: task.task_id })
                    .await;
            }
            Err(e) => {
                self.stream
                    .publish(
                        task.session_id,
                        None,
                        &EventPayload::Error {
                            error_code: "task_failed".to_string(),
                            message: e.to_string(),
                            context: Some(serde_json::json!({ "task_id": task.task_id })),
                        },
                    )
                    .await;
            }
        }
        result
    }
}
