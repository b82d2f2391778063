//! Domain types shared by every other crate in the workspace: opaque ids,
//! the tenant scoping predicate, the entity structs, and the error
//! taxonomy. This crate has no I/O — it exists so `atrium-storage`,
//! `atrium-bus`, `atrium-workspace`, `atrium-outbox`, `atrium-stream`,
//! `atrium-approval`, `atrium-tools` and `server` agree on one vocabulary.
//!
//! - [`ids`]: opaque 128-bit identifiers, one newtype per entity.
//! - [`tenant`]: the `(user_id, project_id)` scoping predicate and the
//!   per-request [`tenant::TenantContext`].
//! - [`entities`]: the data-model structs (`Project`, `Agent`, `Session`,
//!   `Message`, `OutboxRow`, `ApprovalRequest`, `ToolExecution`, ...).
//! - [`error`]: the shared `CoreError` taxonomy and its retry disposition.

mod entities;
mod error;
mod ids;
mod tenant;

pub use entities::{
    Agent, AgentConfig, AgentStatus, ApprovalDecision, ApprovalKind, ApprovalRequest,
    ApprovalStatus, Message, OutboxRow, OutboxStatus, Project, RiskLevel, Role, Session,
    ToolExecution, ToolStatus,
};
pub use error::{CoreError, CoreResult};
pub use ids::{
    AgentId, ApprovalId, MessageId, OutboxId, ProjectId, SessionId, ToolExecutionId, UserId,
};
pub use tenant::{TenantContext, TenantPredicate};
