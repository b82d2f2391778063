//! Client-executed tool protocol surface: an agent's tool call is requested
//! here, validated/risk-assessed/gated behind an approval by
//! [`atrium_tools::ToolMediator`], then the owning client posts back the
//! result it produced running the tool locally.

use atrium_core::{CoreError, TenantContext, ToolExecution, ToolExecutionId, ToolStatus};
use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Extension, Json, Router};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/my/sessions/:session_id/tools", post(request))
        .route("/my/tools/:execution_id/result", post(submit_result))
}

#[derive(Deserialize)]
pub struct RequestToolCallRequest {
    pub tool_name: String,
    pub params: Value,
}

async fn request(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(session_id): Path<Uuid>,
    Json(body): Json<RequestToolCallRequest>,
) -> Result<Json<ToolExecution>, ApiError> {
    state.repos.sessions.get(ctx.predicate, session_id).await.map_err(CoreError::from)?;
    let execution = state
        .tools
        .request_tool_call(session_id.into(), &body.tool_name, body.params, ctx.user_id)
        .await?;

    // A low-risk tool auto-approves inline and is already `executing`, signal
    // included; anything still `pending_approval` needs a watcher parked on
    // the eventual human decision so the client gets signaled once it lands.
    if execution.status == ToolStatus::PendingApproval {
        let tools = state.tools.clone();
        let pending = execution.clone();
        tokio::spawn(async move {
            if let Err(err) = tools.await_approval_and_signal(pending).await {
                tracing::warn!(error = %err, "tool call approval wait failed");
            }
        });
    }

    Ok(Json(execution))
}

#[derive(Deserialize)]
pub struct SubmitToolResultRequest {
    pub result: Value,
    pub succeeded: bool,
}

async fn submit_result(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(execution_id): Path<Uuid>,
    Json(body): Json<SubmitToolResultRequest>,
) -> Result<Json<ToolExecution>, ApiError> {
    let execution = state
        .tools
        .submit_result(ToolExecutionId::from(execution_id), ctx.user_id, body.result, body.succeeded)
        .await?;
    Ok(Json(execution))
}
