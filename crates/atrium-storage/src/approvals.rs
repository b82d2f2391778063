use atrium_core::{ApprovalDecision, ApprovalKind, ApprovalRequest, ApprovalStatus, RiskLevel};
use chrono::Utc;
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};
use crate::pool::PgPool;
use crate::rows::{approval_kind_str, approval_status_str, risk_str, ApprovalRow};

#[derive(Clone)]
pub struct ApprovalRepo {
    pool: PgPool,
}

impl ApprovalRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        session_id: Uuid,
        kind: ApprovalKind,
        risk: RiskLevel,
        subject: &str,
        params: serde_json::Value,
        timeout_seconds: u64,
    ) -> StorageResult<ApprovalRequest> {
        let row: ApprovalRow = sqlx::query_as(
            "INSERT INTO approvals (id, session_id, kind, risk, subject, params, timeout_seconds)
             VALUES (gen_random_uuid(), $1, $2, $3, $4, $5, $6)
             RETURNING id, session_id, kind, risk, subject, params, status, timeout_seconds, requested_at, resolved_at, resolved_by",
        )
        .bind(session_id)
        .bind(approval_kind_str(kind))
        .bind(risk_str(risk))
        .bind(subject)
        .bind(params)
        .bind(timeout_seconds as i64)
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    pub async fn get(&self, id: Uuid) -> StorageResult<ApprovalRequest> {
        let row: ApprovalRow = sqlx::query_as(
            "SELECT id, session_id, kind, risk, subject, params, status, timeout_seconds, requested_at, resolved_at, resolved_by
             FROM approvals WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StorageError::NotFound(format!("approval {id}")))?;
        row.try_into()
    }

    /// Transitions `pending -> approved/rejected` only if still pending;
    /// returns `false` if another resolver already decided it: a
    /// strict terminal state machine, no re-entry.
    pub async fn resolve(
        &self,
        id: Uuid,
        decision: ApprovalDecision,
        resolver: Uuid,
    ) -> StorageResult<bool> {
        let status = match decision {
            ApprovalDecision::Approve => ApprovalStatus::Approved,
            ApprovalDecision::Reject => ApprovalStatus::Rejected,
        };
        let result = sqlx::query(
            "UPDATE approvals SET status = $1, resolved_at = $2, resolved_by = $3
             WHERE id = $4 AND status = 'pending'",
        )
        .bind(approval_status_str(status))
        .bind(Utc::now())
        .bind(resolver)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn expire(&self, id: Uuid) -> StorageResult<bool> {
        let result = sqlx::query(
            "UPDATE approvals SET status = 'timed_out', resolved_at = $1 WHERE id = $2 AND status = 'pending'",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Lists every approval opened for a session, most recent first. The HTTP
    /// layer's approvals list endpoint reads straight off this; there is no
    /// separate read-model for approvals the way the outbox doubles as one
    /// for session history.
    pub async fn list_for_session(&self, session_id: Uuid) -> StorageResult<Vec<ApprovalRequest>> {
        let rows: Vec<ApprovalRow> = sqlx::query_as(
            "SELECT id, session_id, kind, risk, subject, params, status, timeout_seconds, requested_at, resolved_at, resolved_by
             FROM approvals WHERE session_id = $1 ORDER BY requested_at DESC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    pub async fn count_resolved_in_session(&self, session_id: Uuid, since: chrono::DateTime<Utc>) -> StorageResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT count(*) FROM approvals WHERE session_id = $1 AND resolved_at > $2",
        )
        .bind(session_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
