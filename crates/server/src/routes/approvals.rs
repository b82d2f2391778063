//! Listing a session's approvals and resolving a pending one. Resolution
//! itself (auto-approve, timeout, the strict one-shot transition) lives in
//! [`atrium_approval::ApprovalManager`]; this module only enforces that the
//! resolver's tenant actually owns the approval's session before calling it.

use atrium_core::{ApprovalDecision, ApprovalId, ApprovalRequest, CoreError, TenantContext};
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/my/sessions/:session_id/approvals", get(list_for_session))
        .route("/my/approvals/:approval_id/resolve", post(resolve))
}

async fn list_for_session(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<Vec<ApprovalRequest>>, ApiError> {
    state.repos.sessions.get(ctx.predicate, session_id).await.map_err(CoreError::from)?;
    let approvals = state.repos.approvals.list_for_session(session_id).await.map_err(CoreError::from)?;
    Ok(Json(approvals))
}

#[derive(Deserialize)]
pub struct ResolveApprovalRequest {
    pub decision: String,
}

async fn resolve(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(approval_id): Path<Uuid>,
    Json(body): Json<ResolveApprovalRequest>,
) -> Result<Json<ApprovalRequest>, ApiError> {
    let decision = match body.decision.as_str() {
        "approve" => ApprovalDecision::Approve,
        "reject" => ApprovalDecision::Reject,
        other => return Err(CoreError::Validation(format!("unknown approval decision '{other}'")).into()),
    };

    let approval = state.repos.approvals.get(approval_id).await.map_err(CoreError::from)?;
    // The session lookup enforces tenant scoping before we ever touch the
    // approval: a resolver outside this session's tenant sees `NotFound` for
    // the session, not `Forbidden` for the approval.
    state.repos.sessions.get(ctx.predicate, approval.session_id.as_uuid()).await.map_err(CoreError::from)?;

    let resolved = state.approvals.resolve(ApprovalId::from(approval_id), decision, ctx.user_id).await?;
    Ok(Json(resolved))
}
