//! The closed set of event types the platform ever puts on the wire.
//! Frozen as a tagged enum so an unknown event type is a compile error, not
//! a stringly-typed typo that drifts silently.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

/// One event's type-specific payload. The outer envelope (session id, event id,
/// timestamp) is applied separately by [`crate::envelope`].
#[derive(Clone, Debug, PartialEq)]
pub enum EventPayload {
    MessageCreated {
        message_id: Uuid,
        role: String,
        content: String,
        agent_id: Option<Uuid>,
        agent_name: Option<String>,
    },
    DirectAgentCall {
        agent_id: Uuid,
        task_id: Uuid,
        started_at: DateTime<Utc>,
    },
    AgentSwitched {
        from_agent_id: Option<Uuid>,
        to_agent_id: Uuid,
        reason: String,
    },
    TaskStarted {
        task_id: Uuid,
    },
    TaskProgress {
        task_id: Uuid,
        message: String,
    },
    TaskCompleted {
        task_id: Uuid,
    },
    TaskPlanCreated {
        task_id: Uuid,
        steps: Vec<String>,
    },
    ContextRetrieved {
        agent_id: Uuid,
        hits: usize,
        max_score: f32,
    },
    /// Generic tool-approval-needed notification (backward surface; same shape
    /// as `ToolApprovalRequest`).
    ToolRequest {
        approval_id: Uuid,
        tool_name: String,
        params: Value,
        risk: String,
        timeout_seconds: u64,
    },
    ToolApprovalRequest {
        approval_id: Uuid,
        tool_name: String,
        params: Value,
        risk: String,
        timeout_seconds: u64,
    },
    ToolExecutionSignal {
        tool_id: Uuid,
        tool_name: String,
        params: Value,
    },
    ApprovalResolved {
        approval_id: Uuid,
        decision: String,
        resolver: Uuid,
    },
    ApprovalTimeoutWarning {
        approval_id: Uuid,
        remaining_seconds: u64,
    },
    ApprovalTimeout {
        approval_id: Uuid,
    },
    ToolExecutionTimeout {
        tool_id: Uuid,
    },
    Error {
        error_code: String,
        message: String,
        context: Option<Value>,
    },
    /// Synthetic keep-alive. Never buffered, never logged.
    Heartbeat,
}

impl EventPayload {
    /// The wire `event_type` tag (snake_case).
    pub fn kind(&self) -> &'static str {
        match self {
            EventPayload::MessageCreated { .. } => "message_created",
            EventPayload::DirectAgentCall { .. } => "direct_agent_call",
            EventPayload::AgentSwitched { .. } => "agent_switched",
            EventPayload::TaskStarted { .. } => "task_started",
            EventPayload::TaskProgress { .. } => "task_progress",
            EventPayload::TaskCompleted { .. } => "task_completed",
            EventPayload::TaskPlanCreated { .. } => "task_plan_created",
            EventPayload::ContextRetrieved { .. } => "context_retrieved",
            EventPayload::ToolRequest { .. } => "tool_request",
            EventPayload::ToolApprovalRequest { .. } => "tool_approval_request",
            EventPayload::ToolExecutionSignal { .. } => "tool_execution_signal",
            EventPayload::ApprovalResolved { .. } => "approval_resolved",
            EventPayload::ApprovalTimeoutWarning { .. } => "approval_timeout_warning",
            EventPayload::ApprovalTimeout { .. } => "approval_timeout",
            EventPayload::ToolExecutionTimeout { .. } => "tool_execution_timeout",
            EventPayload::Error { .. } => "error",
            EventPayload::Heartbeat => "heartbeat",
        }
    }

    /// True for the one event type that must never enter the ring buffer.
    pub fn is_heartbeat(&self) -> bool {
        matches!(self, EventPayload::Heartbeat)
    }

    /// Serializes just the payload fields (no `event_type` tag, no envelope).
    pub fn to_payload_value(&self) -> Value {
        match self {
            EventPayload::MessageCreated {
                message_id,
                role,
                content,
                agent_id,
                agent_name,
            } => json!({
                "message_id": message_id,
                "role": role,
                "content": content,
                "agent_id": agent_id,
                "agent_name": agent_name,
            }),
            EventPayload::DirectAgentCall {
                agent_id,
                task_id,
                started_at,
            } => json!({
                "agent_id": agent_id,
                "task_id": task_id,
                "started_at": started_at,
            }),
            EventPayload::AgentSwitched {
                from_agent_id,
                to_agent_id,
                reason,
            } => json!({
                "from_agent_id": from_agent_id,
                "to_agent_id": to_agent_id,
                "reason": reason,
            }),
            EventPayload::TaskStarted { task_id } => json!({ "task_id": task_id }),
            EventPayload::TaskProgress { task_id, message } => json!({
                "task_id": task_id,
                "message": message,
            }),
            EventPayload::TaskCompleted { task_id } => json!({ "task_id": task_id }),
            EventPayload::TaskPlanCreated { task_id, steps } => json!({
                "task_id": task_id,
                "steps": steps,
            }),
            EventPayload::ContextRetrieved {
                agent_id,
                hits,
                max_score,
            } => json!({
                "agent_id": agent_id,
                "hits": hits,
                "max_score": max_score,
            }),
            EventPayload::ToolRequest {
                approval_id,
                tool_name,
                params,
                risk,
                timeout_seconds,
            }
            | EventPayload::ToolApprovalRequest {
                approval_id,
                tool_name,
                params,
                risk,
                timeout_seconds,
            } => json!({
                "approval_id": approval_id,
                "tool_name": tool_name,
                "params": params,
                "risk": risk,
                "timeout_seconds": timeout_seconds,
            }),
            EventPayload::ToolExecutionSignal {
                tool_id,
                tool_name,
                params,
            } => json!({
                "tool_id": tool_id,
                "tool_name": tool_name,
                "params": params,
            }),
            EventPayload::ApprovalResolved {
                approval_id,
                decision,
                resolver,
            } => json!({
                "approval_id": approval_id,
                "decision": decision,
                "resolver": resolver,
            }),
            EventPayload::ApprovalTimeoutWarning {
                approval_id,
                remaining_seconds,
            } => json!({
                "approval_id": approval_id,
                "remaining_seconds": remaining_seconds,
            }),
            EventPayload::ApprovalTimeout { approval_id } => json!({ "approval_id": approval_id }),
            EventPayload::ToolExecutionTimeout { tool_id } => json!({ "tool_id": tool_id }),
            EventPayload::Error {
                error_code,
                message,
                context,
            } => json!({
                "error_code": error_code,
                "message": message,
                "context": context,
            }),
            EventPayload::Heartbeat => json!({}),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_closed_event_type_set() {
        let ev = EventPayload::TaskCompleted {
            task_id: Uuid::nil(),
        };
        assert_eq!(ev.kind(), "task_completed");
    }

    #[test]
    fn heartbeat_has_empty_payload_and_is_flagged() {
        let ev = EventPayload::Heartbeat;
        assert!(ev.is_heartbeat());
        assert_eq!(ev.to_payload_value(), json!({}));
    }

    #[test]
    fn tool_request_and_tool_approval_request_share_shape() {
        let a = EventPayload::ToolRequest {
            approval_id: Uuid::nil(),
            tool_name: "read_file".into(),
            params: json!({}),
            risk: "low".into(),
            timeout_seconds: 0,
        };
        let b = EventPayload::ToolApprovalRequest {
            approval_id: Uuid::nil(),
            tool_name: "read_file".into(),
            params: json!({}),
            risk: "low".into(),
            timeout_seconds: 0,
        };
        assert_eq!(a.to_payload_value(), b.to_payload_value());
    }
}
