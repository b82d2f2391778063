//! Process entrypoint: loads config, wires every crate's piece into one
//! [`state::AppState`], starts the Outbox publisher in the background, and
//! serves the HTTP surface until `Ctrl-C`.

mod error;
mod routes;
mod starter_pack;
mod state;

use std::sync::Arc;
use std::time::Duration;

use atrium_approval::ApprovalManager;
use atrium_auth::AuthState;
use atrium_bus::{AgentBus, RetryPolicy};
use atrium_config::Cli;
use atrium_outbox::OutboxPublisher;
use atrium_storage::Repositories;
use atrium_stream::{StreamBroadcaster, StreamManager};
use atrium_tools::ToolMediator;
use atrium_workspace::{Dispatcher, NullContextStore, WorkerSpaceRegistry, WorkspaceExecutor};
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::{AppState, EchoAgentInvoker};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = cli.into_config()?;
    config.validate()?;
    let config = Arc::new(config);

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let pool = atrium_storage::connect(&config.database.url, config.database.max_connections).await?;
    atrium_storage::run_migrations(&pool).await?;
    let repos = Repositories::new(pool);

    let bus = Arc::new(AgentBus::new(
        RetryPolicy {
            max_attempts: config.bus.retry_max_attempts,
            base_delay: Duration::from_millis(config.bus.retry_base_delay_ms),
            max_delay: Duration::from_millis(config.bus.retry_max_delay_ms),
        },
        Duration::from_secs(config.bus.cancel_grace_seconds),
        config.bus.queue_capacity_per_agent,
    ));

    let stream = Arc::new(StreamManager::new(
        config.stream.ring_buffer_capacity,
        Duration::from_secs(config.stream.ring_buffer_ttl_seconds),
        config.stream.reader_queue_capacity,
        Duration::from_secs(config.stream.heartbeat_interval_seconds),
    ));

    let registry = Arc::new(WorkerSpaceRegistry::new(
        repos.agents.clone(),
        config.cache.agent_cache_capacity,
        Duration::from_secs(config.cache.agent_cache_soft_ttl_seconds),
        Arc::new(NullContextStore),
    ));

    let dispatcher = Arc::new(Dispatcher::new(registry.clone()));

    let approvals = Arc::new(ApprovalManager::new(
        repos.approvals.clone(),
        stream.clone(),
        config.approval.clone(),
    ));

    let tools = Arc::new(ToolMediator::new(
        config.tools.clone(),
        approvals.clone(),
        repos.tool_executions.clone(),
        stream.clone(),
    ));

    let executor = Arc::new(WorkspaceExecutor::new(
        registry.clone(),
        stream.clone(),
        Arc::new(EchoAgentInvoker),
    ));

    let app_state = AppState {
        config: config.clone(),
        repos: repos.clone(),
        bus,
        registry,
        dispatcher,
        stream: stream.clone(),
        approvals,
        tools,
        executor,
    };

    let shutdown = CancellationToken::new();
    let publisher = Arc::new(OutboxPublisher::new(
        repos.outbox,
        Arc::new(StreamBroadcaster::new(stream)),
        config.outbox.clone(),
    ));
    let publisher_shutdown = shutdown.clone();
    tokio::spawn(async move { publisher.run(publisher_shutdown).await });

    let auth_state = AuthState {
        hmac_secret: config.auth.hmac_secret.clone(),
        clock_skew_seconds: config.auth.clock_skew_seconds as i64,
    };

    // The health check is the one route reachable without a bearer token:
    // the auth middleware is layered onto the tenant-scoped router only,
    // before it is merged with this unauthenticated one.
    let protected = routes::router()
        .with_state(app_state)
        .layer(axum::middleware::from_fn_with_state(auth_state, atrium_auth::require_tenant));

    let app = Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .merge(protected)
        .layer(DefaultBodyLimit::max(config.server.request_body_limit_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr).await?;
    tracing::info!(addr = %config.server.bind_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            shutdown.cancel();
        })
        .await?;

    Ok(())
}
