//! Wires validation, risk assessment, the Approval Manager, and the
//! client-executed tool protocol together. The server never
//! executes a tool itself: once approved, it parks the requesting agent on
//! a future and signals the owning client to perform the operation locally.

use std::sync::Arc;
use std::time::Duration;

use atrium_config::ToolsConfig;
use atrium_core::{
    ApprovalKind, CoreError, SessionId, ToolExecution, ToolExecutionId, ToolStatus, UserId,
};
use atrium_approval::ApprovalManager;
use atrium_storage::ToolExecutionRepo;
use atrium_stream::StreamManager;
use stream_event::EventPayload;

use crate::risk::RiskAssessor;
use crate::validation::validate_tool_call;

pub struct ToolMediator {
    config: ToolsConfig,
    approvals: Arc<ApprovalManager>,
    tool_executions: ToolExecutionRepo,
    stream: Arc<StreamManager>,
}

impl ToolMediator {
    pub fn new(
        config: ToolsConfig,
        approvals: Arc<ApprovalManager>,
        tool_executions: ToolExecutionRepo,
        stream: Arc<StreamManager>,
    ) -> Self {
        Self {
            config,
            approvals,
            tool_executions,
            stream,
        }
    }

    /// Validates, risk-assesses, and opens an approval for a tool call.
    /// Returns once the tool execution row exists; the caller awaits the
    /// agent-side future (driven by [`ApprovalManager::wait_for_resolution`])
    /// separately so this call never blocks on a human decision.
    pub async fn request_tool_call(
        self: &Arc<Self>,
        session_id: SessionId,
        tool_name: &str,
        params: serde_json::Value,
        owner: UserId,
    ) -> Result<ToolExecution, CoreError> {
        validate_tool_call(&self.config, tool_name, &params)?;
        let risk = RiskAssessor::assess(tool_name, &params);

        let approval = self
            .approvals
            .request(session_id, ApprovalKind::Tool, risk, tool_name, params.clone(), owner)
            .await?;

        let initial_status = if approval.status == atrium_core::ApprovalStatus::Approved {
            ToolStatus::Executing
        } else {
            ToolStatus::PendingApproval
        };

        let execution = self
            .tool_executions
            .create(
                session_id.as_uuid(),
                Some(approval.id.as_uuid()),
                tool_name,
                params.clone(),
                owner.as_uuid(),
                initial_status,
            )
            .await
            .map_err(CoreError::from)?;

        if initial_status == ToolStatus::Executing {
            self.signal_client(session_id, &execution).await;
            self.spawn_execution_timeout(execution.id);
        }

        Ok(execution)
    }

    /// Awaits the approval's resolution and drives the execution row through
    /// `pending_approval -> executing` (signaling the client) or
    /// `pending_approval -> rejected`.
    pub async fn await_approval_and_signal(
        self: &Arc<Self>,
        execution: ToolExecution,
    ) -> Result<ToolExecution, CoreError> {
        let Some(approval_id) = execution.approval_id else {
            return Ok(execution);
        };
        let status = self.approvals.wait_for_resolution(approval_id).await?;
        match status {
            atrium_core::ApprovalStatus::Approved => {
                self.tool_executions.mark_executing(execution.id.as_uuid()).await.map_err(CoreError::from)?;
                let refreshed = self.tool_executions.get(execution.id.as_uuid()).await.map_err(CoreError::from)?;
                self.signal_client(execution.session_id, &refreshed).await;
                self.spawn_execution_timeout(refreshed.id);
                Ok(refreshed)
            }
            _ => {
                self.tool_executions.mark_rejected(execution.id.as_uuid()).await.map_err(CoreError::from)?;
                self.tool_executions.get(execution.id.as_uuid()).await.map_err(CoreError::from)
            }
        }
    }

    /// Spawns a watcher that times out a still-`executing` row once
    /// `max_execution_seconds` elapses with no client-posted result.
    fn spawn_execution_timeout(self: &Arc<Self>, execution_id: ToolExecutionId) {
        let mediator = self.clone();
        let timeout_seconds = self.config.max_execution_seconds;
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(timeout_seconds)).await;
            mediator.time_out_if_still_executing(execution_id).await;
        });
    }

    async fn time_out_if_still_executing(&self, execution_id: ToolExecutionId) {
        match self.tool_executions.mark_timeout(execution_id.as_uuid()).await {
            Ok(true) => {
                if let Ok(execution) = self.tool_executions.get(execution_id.as_uuid()).await {
                    self.stream
                        .publish(
                            execution.session_id,
                            None,
                            &EventPayload::ToolExecutionTimeout {
                                tool_id: execution_id.as_uuid(),
                            },
                        )
                        .await;
                }
            }
            Ok(false) => {}
            Err(err) => {
                tracing::warn!(%execution_id, error = %err, "failed to check tool execution timeout");
            }
        }
    }

    async fn signal_client(&self, session_id: SessionId, execution: &ToolExecution) {
        self.stream
            .publish(
                session_id,
                None,
                &EventPayload::ToolExecutionSignal {
                    tool_id: execution.id.as_uuid(),
                    tool_name: execution.tool_name.clone(),
                    params: execution.params.clone(),
                },
            )
            .await;
    }

    /// The client posts the result of having performed the tool operation
    /// locally. Accepted only if `poster` owns the execution and it is still
    /// `executing`: a stale or forged completion is rejected.
    pub async fn submit_result(
        &self,
        execution_id: ToolExecutionId,
        poster: UserId,
        result: serde_json::Value,
        succeeded: bool,
    ) -> Result<ToolExecution, CoreError> {
        let encoded_len = serde_json::to_vec(&result).map(|b| b.len()).unwrap_or(usize::MAX);
        if encoded_len > self.config.max_result_bytes {
            return Err(CoreError::Validation(format!(
                "tool execution {execution_id} result exceeds {} bytes",
                self.config.max_result_bytes
            )));
        }

        let outcome = self
            .tool_executions
            .complete(execution_id.as_uuid(), poster.as_uuid(), result, succeeded)
            .await
            .map_err(CoreError::from)?;
        match outcome {
            atrium_storage::CompleteOutcome::Applied => {
                self.tool_executions.get(execution_id.as_uuid()).await.map_err(CoreError::from)
            }
            atrium_storage::CompleteOutcome::NotOwner => Err(CoreError::Forbidden(format!(
                "execution {execution_id} is not owned by {poster}"
            ))),
            atrium_storage::CompleteOutcome::AlreadyResolved => {
                Err(CoreError::AlreadyResolved(format!("tool execution {execution_id}")))
            }
        }
    }
}
