//! HTTP surface. Every route here is nested under the tenant-scoped `/my`
//! prefix and sits behind [`atrium_auth::require_tenant`]; a handler that can
//! be reached without a validated bearer token does not belong in this tree.

mod agents;
mod approvals;
mod messages;
mod projects;
mod sessions;
mod stream;
mod tools;

use axum::Router;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(projects::router())
        .merge(agents::router())
        .merge(sessions::router())
        .merge(messages::router())
        .merge(stream::router())
        .merge(approvals::router())
        .merge(tools::router())
}
