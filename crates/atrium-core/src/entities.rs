//! Domain entities. Pure data, no behavior beyond
//! small invariant-preserving constructors; the crates that own each
//! entity's lifecycle (`atrium-workspace`, `atrium-outbox`, `atrium-approval`,
//! `atrium-tools`) hold the actual state-transition logic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{AgentId, ApprovalId, MessageId, OutboxId, ProjectId, SessionId, ToolExecutionId, UserId};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub user_id: UserId,
    pub name: String,
    pub workspace_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Ready,
    Busy,
    Disabled,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentConfig {
    pub system_prompt: String,
    pub model: String,
    pub concurrency_limit: u32,
    pub allowed_tools: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub project_id: ProjectId,
    pub name: String,
    pub config: AgentConfig,
    pub status: AgentStatus,
    pub in_flight: u32,
    pub created_at: DateTime<Utc>,
}

impl Agent {
    /// Effective concurrency cap, clamped to the platform-wide bounds of
    /// 1-10 regardless of the requested value.
    pub fn effective_concurrency_limit(&self) -> u32 {
        self.config.concurrency_limit.clamp(1, 10)
    }

    pub fn has_capacity(&self) -> bool {
        self.status == AgentStatus::Ready && self.in_flight < self.effective_concurrency_limit()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub user_id: UserId,
    pub project_id: ProjectId,
    pub created_at: DateTime<Utc>,
    pub last_active_agent_id: Option<AgentId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub session_id: SessionId,
    pub role: Role,
    pub content: String,
    pub agent_id: Option<AgentId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxStatus {
    Pending,
    Published,
    Failed,
}

/// A transactionally-written outbox row.
/// `id` doubles as the public `event_id` clients dedupe on.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutboxRow {
    pub id: OutboxId,
    pub session_id: SessionId,
    pub event_type: String,
    pub payload: Value,
    pub status: OutboxStatus,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Approval wait timeout in seconds for this risk tier:
    /// LOW=0/auto-approve, MEDIUM=300s, HIGH=600s.
    pub fn default_timeout_seconds(&self) -> u64 {
        match self {
            RiskLevel::Low => 0,
            RiskLevel::Medium => 300,
            RiskLevel::High => 600,
        }
    }

    pub fn auto_approves(&self) -> bool {
        matches!(self, RiskLevel::Low)
    }

    /// The wire/storage representation (`"low"`/`"medium"`/`"high"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalKind {
    Tool,
    Plan,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    TimedOut,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    Approve,
    Reject,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: ApprovalId,
    pub session_id: SessionId,
    pub kind: ApprovalKind,
    pub risk: RiskLevel,
    pub subject: String,
    pub params: Value,
    pub status: ApprovalStatus,
    pub timeout_seconds: u64,
    pub requested_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<UserId>,
}

impl ApprovalRequest {
    /// Strict terminal state machine: once resolved, resolving
    /// again is an `AlreadyResolved` error, never a silent no-op.
    pub fn is_terminal(&self) -> bool {
        !matches!(self.status, ApprovalStatus::Pending)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    PendingApproval,
    Executing,
    Completed,
    Failed,
    Rejected,
    TimedOut,
}

impl ToolStatus {
    /// True once the execution has left the `pending_approval`/`executing`
    /// path and will never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ToolStatus::Completed | ToolStatus::Failed | ToolStatus::Rejected | ToolStatus::TimedOut
        )
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolExecution {
    pub id: ToolExecutionId,
    pub session_id: SessionId,
    pub approval_id: Option<ApprovalId>,
    pub tool_name: String,
    pub params: Value,
    pub status: ToolStatus,
    pub result: Option<Value>,
    pub owner_user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(limit: u32, in_flight: u32, status: AgentStatus) -> Agent {
        Agent {
            id: AgentId::new(),
            project_id: ProjectId::new(),
            name: "reviewer".into(),
            config: AgentConfig {
                system_prompt: "review code".into(),
                model: "claude".into(),
                concurrency_limit: limit,
                allowed_tools: vec![],
            },
            status,
            in_flight,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn concurrency_limit_is_clamped_to_platform_bounds() {
        let a = agent(0, 0, AgentStatus::Ready);
        assert_eq!(a.effective_concurrency_limit(), 1);
        let b = agent(50, 0, AgentStatus::Ready);
        assert_eq!(b.effective_concurrency_limit(), 10);
    }

    #[test]
    fn busy_agent_at_cap_has_no_capacity() {
        let a = agent(2, 2, AgentStatus::Ready);
        assert!(!a.has_capacity());
        let b = agent(2, 1, AgentStatus::Ready);
        assert!(b.has_capacity());
    }

    #[test]
    fn disabled_agent_never_has_capacity() {
        let a = agent(5, 0, AgentStatus::Disabled);
        assert!(!a.has_capacity());
    }

    #[test]
    fn low_risk_auto_approves_with_zero_timeout() {
        assert!(RiskLevel::Low.auto_approves());
        assert_eq!(RiskLevel::Low.default_timeout_seconds(), 0);
        assert_eq!(RiskLevel::Medium.default_timeout_seconds(), 300);
        assert_eq!(RiskLevel::High.default_timeout_seconds(), 600);
    }

    #[test]
    fn approval_is_terminal_once_decided() {
        let mut req = ApprovalRequest {
            id: ApprovalId::new(),
            session_id: SessionId::new(),
            kind: ApprovalKind::Tool,
            risk: RiskLevel::Medium,
            subject: "delete_file".into(),
            params: Value::Null,
            status: ApprovalStatus::Pending,
            timeout_seconds: 300,
            requested_at: Utc::now(),
            resolved_at: None,
            resolved_by: None,
        };
        assert!(!req.is_terminal());
        req.status = ApprovalStatus::Approved;
        assert!(req.is_terminal());
    }
}
