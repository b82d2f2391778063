//! Project CRUD. Creating a project materializes its four-agent starter pack
//! in the same request; deleting one relies on `ON DELETE CASCADE` to take
//! every agent, session, message, outbox row, approval, and tool execution
//! it owns down with it.

use atrium_core::{CoreError, Project, TenantContext};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::starter_pack;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/my/projects", get(list).post(create))
        .route("/my/projects/:project_id", get(get_one).patch(update).delete(delete))
}

#[derive(Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    pub workspace_path: Option<String>,
}

async fn create(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Json(body): Json<CreateProjectRequest>,
) -> Result<Json<Project>, ApiError> {
    if body.name.trim().is_empty() {
        return Err(CoreError::Validation("project name must not be empty".into()).into());
    }
    let project = state
        .repos
        .projects
        .create(ctx.predicate, &body.name, body.workspace_path.as_deref())
        .await
        .map_err(CoreError::from)?;
    starter_pack::materialize(&state, ctx.user_id, project.id).await?;
    Ok(Json(project))
}

async fn list(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
) -> Result<Json<Vec<Project>>, ApiError> {
    let projects = state.repos.projects.list_for_user(ctx.predicate).await.map_err(CoreError::from)?;
    Ok(Json(projects))
}

async fn get_one(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Project>, ApiError> {
    let project = state.repos.projects.get(ctx.predicate, project_id).await.map_err(CoreError::from)?;
    Ok(Json(project))
}

#[derive(Deserialize)]
pub struct UpdateProjectRequest {
    pub name: Option<String>,
    pub workspace_path: Option<String>,
}

async fn update(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(project_id): Path<Uuid>,
    Json(body): Json<UpdateProjectRequest>,
) -> Result<Json<Project>, ApiError> {
    let project = state
        .repos
        .projects
        .update(ctx.predicate, project_id, body.name.as_deref(), body.workspace_path.as_deref())
        .await
        .map_err(CoreError::from)?;
    Ok(Json(project))
}

async fn delete(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(project_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.repos.projects.delete(ctx.predicate, project_id).await.map_err(CoreError::from)?;
    state.registry.remove(ctx.user_id, project_id.into());
    Ok(StatusCode::NO_CONTENT)
}
