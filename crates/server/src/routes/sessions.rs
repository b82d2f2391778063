//! Session lifecycle and message history, scoped to a project. Sending a
//! message and streaming its events live in [`crate::routes::messages`] and
//! [`crate::routes::stream`]; this module only covers the session record and
//! its stored transcript.

use atrium_core::{CoreError, Message, Session, TenantContext};
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/my/projects/:project_id/sessions", post(create))
        .route("/my/sessions/:session_id", get(get_one))
        .route("/my/sessions/:session_id/messages", get(messages))
}

async fn create(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Session>, ApiError> {
    let predicate = ctx.predicate.with_project(project_id.into());
    let session = state.repos.sessions.create(predicate).await.map_err(CoreError::from)?;
    Ok(Json(session))
}

async fn get_one(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<Session>, ApiError> {
    let session = state.repos.sessions.get(ctx.predicate, session_id).await.map_err(CoreError::from)?;
    Ok(Json(session))
}

#[derive(Deserialize)]
pub struct MessagesQuery {
    pub limit: Option<i64>,
}

async fn messages(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(session_id): Path<Uuid>,
    Query(query): Query<MessagesQuery>,
) -> Result<Json<Vec<Message>>, ApiError> {
    // `get` enforces tenant scoping before we touch the transcript.
    state.repos.sessions.get(ctx.predicate, session_id).await.map_err(CoreError::from)?;
    let limit = query.limit.unwrap_or(100).clamp(1, 500);
    let messages = state.repos.sessions.recent_messages(session_id, limit).await.map_err(CoreError::from)?;
    Ok(Json(messages))
}
