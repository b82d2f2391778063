//! Live event stream for a session: ndjson, one [`stream_event::StreamEnvelope`]
//! per line, optionally resuming from a `since` watermark so a reconnecting
//! client never misses an event between its last read and the new connection.

use atrium_core::{CoreError, TenantContext};
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Router};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::Deserialize;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/my/sessions/:session_id/stream", get(stream_session))
}

#[derive(Deserialize)]
pub struct StreamQuery {
    /// RFC3339 timestamp; replays every buffered event strictly newer than
    /// this before the live tail starts.
    pub since: Option<String>,
}

async fn stream_session(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(session_id): Path<Uuid>,
    Query(query): Query<StreamQuery>,
) -> Result<Response, ApiError> {
    state.repos.sessions.get(ctx.predicate, session_id).await.map_err(CoreError::from)?;

    let since: Option<DateTime<Utc>> = query
        .since
        .as_deref()
        .map(|raw| {
            DateTime::parse_from_rfc3339(raw)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| CoreError::Validation(format!("invalid `since` timestamp: {e}")))
        })
        .transpose()?;

    let rx = state.stream.subscribe(session_id.into(), since).await;
    let body = Body::from_stream(ReceiverStream::new(rx).map(|envelope| Ok::<_, std::io::Error>(envelope.to_ndjson_line())));

    Ok((
        [(header::CONTENT_TYPE, "application/x-ndjson")],
        body,
    )
        .into_response())
}
