//! Agent CRUD, scoped to a project. An agent's `status` is the only mutable
//! field exposed here: flipping it to `disabled` makes it refuse new work
//! (`Agent::has_capacity` and the concurrency-slot reservation both check it)
//! without anything else about the agent changing.

use atrium_core::{Agent, AgentConfig, AgentStatus, CoreError, TenantContext};
use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/my/projects/:project_id/agents", get(list).post(create))
        .route("/my/projects/:project_id/agents/:agent_id", get(get_one))
        .route("/my/projects/:project_id/agents/:agent_id/status", axum::routing::patch(set_status))
}

#[derive(Deserialize)]
pub struct CreateAgentRequest {
    pub name: String,
    pub system_prompt: String,
    pub model: String,
    pub concurrency_limit: Option<u32>,
    pub allowed_tools: Option<Vec<String>>,
}

async fn create(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(project_id): Path<Uuid>,
    Json(body): Json<CreateAgentRequest>,
) -> Result<Json<Agent>, ApiError> {
    if body.name.trim().is_empty() || body.system_prompt.trim().is_empty() {
        return Err(CoreError::Validation("agent name and system_prompt are required".into()).into());
    }
    let predicate = ctx.predicate.with_project(project_id.into());
    let config = AgentConfig {
        system_prompt: body.system_prompt,
        model: body.model,
        concurrency_limit: body.concurrency_limit.unwrap_or(state.config.bus.default_concurrency_limit),
        allowed_tools: body.allowed_tools.unwrap_or_default(),
    };
    let agent = state.repos.agents.create(predicate, &body.name, &config).await.map_err(CoreError::from)?;
    state.bus.register(agent.id, agent.effective_concurrency_limit(), state.executor.clone());
    let space = state.registry.get_or_create(ctx.user_id, project_id.into()).await;
    space.ensure_context_collection(&agent.name).await?;
    Ok(Json(agent))
}

async fn list(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Vec<Agent>>, ApiError> {
    let agents = state.repos.agents.list_for_project(project_id).await.map_err(CoreError::from)?;
    Ok(Json(agents))
}

async fn get_one(
    State(state): State<AppState>,
    Path((project_id, agent_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Agent>, ApiError> {
    let agent = state.repos.agents.get(project_id, agent_id).await.map_err(CoreError::from)?;
    Ok(Json(agent))
}

#[derive(Deserialize)]
pub struct SetAgentStatusRequest {
    pub status: String,
}

async fn set_status(
    State(state): State<AppState>,
    Path((project_id, agent_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<SetAgentStatusRequest>,
) -> Result<Json<Agent>, ApiError> {
    let status = match body.status.as_str() {
        "ready" => AgentStatus::Ready,
        "disabled" => AgentStatus::Disabled,
        other => return Err(CoreError::Validation(format!("unknown agent status '{other}'")).into()),
    };
    // Confirms the agent belongs to this project before mutating it; the
    // project path segment is the tenant isolation boundary here since
    // `set_status` itself takes a bare agent id.
    let existing = state.repos.agents.get(project_id, agent_id).await.map_err(CoreError::from)?;
    state.repos.agents.set_status(existing.id.as_uuid(), status).await.map_err(CoreError::from)?;
    let agent = state.repos.agents.get(project_id, agent_id).await.map_err(CoreError::from)?;
    Ok(Json(agent))
}
