//! `sqlx::FromRow` row shapes and their conversions into `atrium_core`
//! entities. Kept separate from the domain types so a schema-level quirk
//! (everything is a `String` status column) never leaks into the domain
//! model's typed enums.

use atrium_core::{
    Agent, AgentConfig, AgentStatus, ApprovalKind, ApprovalRequest, ApprovalStatus, Message,
    OutboxRow, OutboxStatus, Project, RiskLevel, Role, Session, ToolExecution, ToolStatus,
};
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};

#[derive(FromRow)]
pub(crate) struct ProjectRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub workspace_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<ProjectRow> for Project {
    fn from(r: ProjectRow) -> Self {
        Project {
            id: r.id.into(),
            user_id: r.user_id.into(),
            name: r.name,
            workspace_path: r.workspace_path,
            created_at: r.created_at,
        }
    }
}

#[derive(FromRow)]
pub(crate) struct AgentRow {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub system_prompt: String,
    pub model: String,
    pub concurrency_limit: i32,
    pub allowed_tools: serde_json::Value,
    pub status: String,
    pub in_flight: i32,
    pub created_at: DateTime<Utc>,
}

fn parse_agent_status(s: &str) -> StorageResult<AgentStatus> {
    match s {
        "ready" => Ok(AgentStatus::Ready),
        "busy" => Ok(AgentStatus::Busy),
        "disabled" => Ok(AgentStatus::Disabled),
        other => Err(StorageError::NotFound(format!("unknown agent status {other}"))),
    }
}

pub(crate) fn agent_status_str(status: AgentStatus) -> &'static str {
    match status {
        AgentStatus::Ready => "ready",
        AgentStatus::Busy => "busy",
        AgentStatus::Disabled => "disabled",
    }
}

impl TryFrom<AgentRow> for Agent {
    type Error = StorageError;

    fn try_from(r: AgentRow) -> StorageResult<Self> {
        let allowed_tools: Vec<String> =
            serde_json::from_value(r.allowed_tools).unwrap_or_default();
        Ok(Agent {
            id: r.id.into(),
            project_id: r.project_id.into(),
            name: r.name,
            config: AgentConfig {
                system_prompt: r.system_prompt,
                model: r.model,
                concurrency_limit: r.concurrency_limit.max(0) as u32,
                allowed_tools,
            },
            status: parse_agent_status(&r.status)?,
            in_flight: r.in_flight.max(0) as u32,
            created_at: r.created_at,
        })
    }
}

#[derive(FromRow)]
pub(crate) struct SessionRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub project_id: Uuid,
    pub last_active_agent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<SessionRow> for Session {
    fn from(r: SessionRow) -> Self {
        Session {
            id: r.id.into(),
            user_id: r.user_id.into(),
            project_id: r.project_id.into(),
            last_active_agent_id: r.last_active_agent_id.map(Into::into),
            created_at: r.created_at,
        }
    }
}

#[derive(FromRow)]
pub(crate) struct MessageRow {
    pub id: Uuid,
    pub session_id: Uuid,
    pub role: String,
    pub content: String,
    pub agent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

fn parse_role(s: &str) -> StorageResult<Role> {
    match s {
        "user" => Ok(Role::User),
        "assistant" => Ok(Role::Assistant),
        "system" => Ok(Role::System),
        other => Err(StorageError::NotFound(format!("unknown message role {other}"))),
    }
}

pub(crate) fn role_str(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::System => "system",
    }
}

impl TryFrom<MessageRow> for Message {
    type Error = StorageError;

    fn try_from(r: MessageRow) -> StorageResult<Self> {
        Ok(Message {
            id: r.id.into(),
            session_id: r.session_id.into(),
            role: parse_role(&r.role)?,
            content: r.content,
            agent_id: r.agent_id.map(Into::into),
            created_at: r.created_at,
        })
    }
}

#[derive(FromRow)]
pub(crate) struct OutboxRowRaw {
    pub id: Uuid,
    pub session_id: Uuid,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub attempts: i32,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

fn parse_outbox_status(s: &str) -> StorageResult<OutboxStatus> {
    match s {
        "pending" => Ok(OutboxStatus::Pending),
        "published" => Ok(OutboxStatus::Published),
        "failed" => Ok(OutboxStatus::Failed),
        other => Err(StorageError::NotFound(format!("unknown outbox status {other}"))),
    }
}

pub(crate) fn outbox_status_str(status: OutboxStatus) -> &'static str {
    match status {
        OutboxStatus::Pending => "pending",
        OutboxStatus::Published => "published",
        OutboxStatus::Failed => "failed",
    }
}

impl TryFrom<OutboxRowRaw> for OutboxRow {
    type Error = StorageError;

    fn try_from(r: OutboxRowRaw) -> StorageResult<Self> {
        Ok(OutboxRow {
            id: r.id.into(),
            session_id: r.session_id.into(),
            event_type: r.event_type,
            payload: r.payload,
            status: parse_outbox_status(&r.status)?,
            attempts: r.attempts.max(0) as u32,
            created_at: r.created_at,
            published_at: r.published_at,
        })
    }
}

#[derive(FromRow)]
pub(crate) struct ApprovalRow {
    pub id: Uuid,
    pub session_id: Uuid,
    pub kind: String,
    pub risk: String,
    pub subject: String,
    pub params: serde_json::Value,
    pub status: String,
    pub timeout_seconds: i64,
    pub requested_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<Uuid>,
}

fn parse_approval_kind(s: &str) -> StorageResult<ApprovalKind> {
    match s {
        "tool" => Ok(ApprovalKind::Tool),
        "plan" => Ok(ApprovalKind::Plan),
        other => Err(StorageError::NotFound(format!("unknown approval kind {other}"))),
    }
}

pub(crate) fn approval_kind_str(kind: ApprovalKind) -> &'static str {
    match kind {
        ApprovalKind::Tool => "tool",
        ApprovalKind::Plan => "plan",
    }
}

fn parse_risk(s: &str) -> StorageResult<RiskLevel> {
    match s {
        "low" => Ok(RiskLevel::Low),
        "medium" => Ok(RiskLevel::Medium),
        "high" => Ok(RiskLevel::High),
        other => Err(StorageError::NotFound(format!("unknown risk level {other}"))),
    }
}

pub(crate) fn risk_str(risk: RiskLevel) -> &'static str {
    match risk {
        RiskLevel::Low => "low",
        RiskLevel::Medium => "medium",
        RiskLevel::High => "high",
    }
}

fn parse_approval_status(s: &str) -> StorageResult<ApprovalStatus> {
    match s {
        "pending" => Ok(ApprovalStatus::Pending),
        "approved" => Ok(ApprovalStatus::Approved),
        "rejected" => Ok(ApprovalStatus::Rejected),
        "timed_out" => Ok(ApprovalStatus::TimedOut),
        other => Err(StorageError::NotFound(format!("unknown approval status {other}"))),
    }
}

pub(crate) fn approval_status_str(status: ApprovalStatus) -> &'static str {
    match status {
        ApprovalStatus::Pending => "pending",
        ApprovalStatus::Approved => "approved",
        ApprovalStatus::Rejected => "rejected",
        ApprovalStatus::TimedOut => "timed_out",
    }
}

impl TryFrom<ApprovalRow> for ApprovalRequest {
    type Error = StorageError;

    fn try_from(r: ApprovalRow) -> StorageResult<Self> {
        Ok(ApprovalRequest {
            id: r.id.into(),
            session_id: r.session_id.into(),
            kind: parse_approval_kind(&r.kind)?,
            risk: parse_risk(&r.risk)?,
            subject: r.subject,
            params: r.params,
            status: parse_approval_status(&r.status)?,
            timeout_seconds: r.timeout_seconds.max(0) as u64,
            requested_at: r.requested_at,
            resolved_at: r.resolved_at,
            resolved_by: r.resolved_by.map(Into::into),
        })
    }
}

#[derive(FromRow)]
pub(crate) struct ToolExecutionRow {
    pub id: Uuid,
    pub session_id: Uuid,
    pub approval_id: Option<Uuid>,
    pub tool_name: String,
    pub params: serde_json::Value,
    pub status: String,
    pub result: Option<serde_json::Value>,
    pub owner_user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

fn parse_tool_status(s: &str) -> StorageResult<ToolStatus> {
    match s {
        "pending_approval" => Ok(ToolStatus::PendingApproval),
        "executing" => Ok(ToolStatus::Executing),
        "completed" => Ok(ToolStatus::Completed),
        "failed" => Ok(ToolStatus::Failed),
        "rejected" => Ok(ToolStatus::Rejected),
        "timed_out" => Ok(ToolStatus::TimedOut),
        other => Err(StorageError::NotFound(format!("unknown tool status {other}"))),
    }
}

pub(crate) fn tool_status_str(status: ToolStatus) -> &'static str {
    match status {
        ToolStatus::PendingApproval => "pending_approval",
        ToolStatus::Executing => "executing",
        ToolStatus::Completed => "completed",
        ToolStatus::Failed => "failed",
        ToolStatus::Rejected => "rejected",
        ToolStatus::TimedOut => "timed_out",
    }
}

impl TryFrom<ToolExecutionRow> for ToolExecution {
    type Error = StorageError;

    fn try_from(r: ToolExecutionRow) -> StorageResult<Self> {
        Ok(ToolExecution {
            id: r.id.into(),
            session_id: r.session_id.into(),
            approval_id: r.approval_id.map(Into::into),
            tool_name: r.tool_name,
            params: r.params,
            status: parse_tool_status(&r.status)?,
            result: r.result,
            owner_user_id: r.owner_user_id.into(),
            created_at: r.created_at,
            completed_at: r.completed_at,
        })
    }
}
