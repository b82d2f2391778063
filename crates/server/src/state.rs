use std::sync::Arc;

use async_trait::async_trait;
use atrium_approval::ApprovalManager;
use atrium_bus::AgentBus;
use atrium_config::AppConfig;
use atrium_core::{Agent, CoreError};
use atrium_storage::Repositories;
use atrium_stream::StreamManager;
use atrium_tools::ToolMediator;
use atrium_workspace::{AgentInvoker, Dispatcher, WorkerSpaceRegistry, WorkspaceExecutor};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Stands in for an actual model-inference client. Running the model is
/// outside this crate's scope; this invoker just echoes the turn back so
/// the coordination pipeline (bus -> executor -> stream) is end-to-end
/// exercisable without a real LLM behind it.
pub struct EchoAgentInvoker;

#[async_trait]
impl AgentInvoker for EchoAgentInvoker {
    async fn invoke(&self, agent: &Agent, payload: &Value, _cancel: CancellationToken) -> Result<Value, CoreError> {
        Ok(serde_json::json!({
            "agent_id": agent.id,
            "agent_name": agent.name,
            "echo": payload,
        }))
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub repos: Repositories,
    pub bus: Arc<AgentBus>,
    pub registry: Arc<WorkerSpaceRegistry>,
    pub dispatcher: Arc<Dispatcher>,
    pub stream: Arc<StreamManager>,
    pub approvals: Arc<ApprovalManager>,
    pub tools: Arc<ToolMediator>,
    /// Shared across every agent registered on the bus: it looks the agent up
    /// in the registry per task rather than closing over one agent's identity.
    pub executor: Arc<WorkspaceExecutor>,
}
