//! Postgres-backed persistence. Every
//! repository takes the caller's [`atrium_core::TenantPredicate`] explicitly
//! rather than reading ambient state, and every write that must publish an
//! event goes through [`outbox::OutboxRepo`] inside the same transaction as
//! its domain write (Transactional Outbox).

mod agents;
mod approvals;
mod error;
mod outbox;
mod pool;
mod projects;
mod rows;
mod sessions;
mod tools;

pub use agents::AgentRepo;
pub use approvals::ApprovalRepo;
pub use error::{StorageError, StorageResult};
pub use outbox::OutboxRepo;
pub use pool::{connect, run_migrations, PgPool};
pub use projects::ProjectRepo;
pub use sessions::SessionRepo;
pub use tools::{CompleteOutcome, ToolExecutionRepo};

/// Bundles one repo per entity behind a single constructor so `server`'s
/// startup wiring only needs one pool and one call.
#[derive(Clone)]
pub struct Repositories {
    pub projects: ProjectRepo,
    pub agents: AgentRepo,
    pub sessions: SessionRepo,
    pub outbox: OutboxRepo,
    pub approvals: ApprovalRepo,
    pub tool_executions: ToolExecutionRepo,
}

impl Repositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            projects: ProjectRepo::new(pool.clone()),
            agents: AgentRepo::new(pool.clone()),
            sessions: SessionRepo::new(pool.clone()),
            outbox: OutboxRepo::new(pool.clone()),
            approvals: ApprovalRepo::new(pool.clone()),
            tool_executions: ToolExecutionRepo::new(pool),
        }
    }
}
