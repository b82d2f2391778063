//! Sending a message into a session. A direct-dispatch message (caller names
//! an agent) waits for that agent's reply and returns it in the response; an
//! orchestrated-dispatch message returns an acknowledgment immediately and
//! the reply is written once the agent turn finishes, in a background task —
//! the caller reads it back over [`crate::routes::stream`] or the session's
//! message history.

use atrium_bus::SubmittedTask;
use atrium_core::{AgentId, CoreError, Message, ProjectId, Role, TenantContext, UserId};
use atrium_workspace::DispatchMode;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Extension, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use stream_event::EventPayload;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/my/sessions/:session_id/messages", post(send))
}

#[derive(Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
    /// Names an agent directly; omitted means orchestrated routing picks one.
    pub agent_id: Option<Uuid>,
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SendMessageResponse {
    Completed { message: Message },
    Dispatched { agent_id: Uuid, task_id: Uuid },
}

async fn send(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(session_id): Path<Uuid>,
    Json(body): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<SendMessageResponse>), ApiError> {
    if body.content.trim().is_empty() {
        return Err(CoreError::Validation("message content must not be empty".into()).into());
    }
    let session = state.repos.sessions.get(ctx.predicate, session_id).await.map_err(CoreError::from)?;

    let mode = match body.agent_id {
        Some(id) => DispatchMode::Direct(AgentId::from(id)),
        None => DispatchMode::Orchestrated,
    };
    let agent_id = state
        .dispatcher
        .resolve_agent(ctx.user_id, session.project_id, mode, &body.content)
        .await?;

    write_message_event(&state, session_id, Role::User, &body.content, None, None).await?;
    state
        .repos
        .sessions
        .set_last_active_agent(session_id, agent_id.as_uuid())
        .await
        .map_err(CoreError::from)?;

    let task_id = Uuid::new_v4();
    let task = SubmittedTask {
        task_id,
        agent_id,
        session_id: session.id,
        user_id: session.user_id,
        project_id: session.project_id,
        payload: json!({ "content": body.content }),
    };
    let rx = state.bus.submit(agent_id, task).await?;

    match mode {
        DispatchMode::Direct(_) => {
            state
                .stream
                .publish(
                    session.id,
                    None,
                    &EventPayload::DirectAgentCall {
                        agent_id: agent_id.as_uuid(),
                        task_id,
                        started_at: Utc::now(),
                    },
                )
                .await;

            let outcome = rx.await.map_err(|_| CoreError::Cancelled("agent task result channel closed".into()))?;
            let value = outcome?;
            let agent_name = resolve_agent_name(&state, session.user_id, session.project_id, agent_id).await;
            let message = write_message_event(
                &state,
                session_id,
                Role::Assistant,
                &render_reply(&value),
                Some(agent_id.as_uuid()),
                agent_name,
            )
            .await?;
            Ok((StatusCode::OK, Json(SendMessageResponse::Completed { message })))
        }
        DispatchMode::Orchestrated => {
            let state = state.clone();
            let user_id = session.user_id;
            let project_id = session.project_id;
            tokio::spawn(async move {
                let Ok(Ok(value)) = rx.await else {
                    return;
                };
                let agent_name = resolve_agent_name(&state, user_id, project_id, agent_id).await;
                if let Err(err) =
                    write_message_event(&state, session_id, Role::Assistant, &render_reply(&value), Some(agent_id.as_uuid()), agent_name).await
                {
                    tracing::warn!(%session_id, %agent_id, error = %err, "failed to persist orchestrated agent reply");
                }
            });
            Ok((
                StatusCode::ACCEPTED,
                Json(SendMessageResponse::Dispatched { agent_id: agent_id.as_uuid(), task_id }),
            ))
        }
    }
}

/// The echo stand-in invoker wraps the original payload under `echo`; once a
/// real model client sits behind [`atrium_workspace::AgentInvoker`] this
/// becomes "pull the assistant's text out of its response", whatever shape
/// that client returns.
fn render_reply(value: &Value) -> String {
    value
        .get("echo")
        .and_then(|echo| echo.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| value.to_string())
}

async fn resolve_agent_name(state: &AppState, user_id: UserId, project_id: ProjectId, agent_id: AgentId) -> Option<String> {
    let space = state.registry.get_or_create(user_id, project_id).await;
    space.get_agent(agent_id).await.ok().map(|a| a.name)
}

/// Appends a message and its `message_created` outbox event inside one
/// transaction (Transactional Outbox): the message and the event clients see
/// on the stream either both land or neither does.
async fn write_message_event(
    state: &AppState,
    session_id: Uuid,
    role: Role,
    content: &str,
    agent_id: Option<Uuid>,
    agent_name: Option<String>,
) -> Result<Message, CoreError> {
    let mut tx = state.repos.outbox.begin().await.map_err(CoreError::from)?;
    let message = state
        .repos
        .sessions
        .append_message_in_tx(&mut tx, session_id, role, content, agent_id)
        .await
        .map_err(CoreError::from)?;

    let payload = json!({
        "message_id": message.id,
        "role": role_label(role),
        "content": content,
        "agent_id": agent_id,
        "agent_name": agent_name,
    });
    state
        .repos
        .outbox
        .insert_in_tx(&mut tx, session_id, "message_created", payload)
        .await
        .map_err(CoreError::from)?;

    tx.commit().await.map_err(|e| CoreError::Transient(e.to_string()))?;
    Ok(message)
}

fn role_label(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::System => "system",
    }
}

