use atrium_core::{ToolExecution, ToolStatus};
use chrono::Utc;
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};
use crate::pool::PgPool;
use crate::rows::{tool_status_str, ToolExecutionRow};

#[derive(Clone)]
pub struct ToolExecutionRepo {
    pool: PgPool,
}

impl ToolExecutionRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        session_id: Uuid,
        approval_id: Option<Uuid>,
        tool_name: &str,
        params: serde_json::Value,
        owner_user_id: Uuid,
        initial_status: ToolStatus,
    ) -> StorageResult<ToolExecution> {
        let row: ToolExecutionRow = sqlx::query_as(
            "INSERT INTO tool_executions (id, session_id, approval_id, tool_name, params, owner_user_id, status)
             VALUES (gen_random_uuid(), $1, $2, $3, $4, $5, $6)
             RETURNING id, session_id, approval_id, tool_name, params, status, result, owner_user_id, created_at, completed_at",
        )
        .bind(session_id)
        .bind(approval_id)
        .bind(tool_name)
        .bind(params)
        .bind(owner_user_id)
        .bind(tool_status_str(initial_status))
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    pub async fn get(&self, id: Uuid) -> StorageResult<ToolExecution> {
        let row: ToolExecutionRow = sqlx::query_as(
            "SELECT id, session_id, approval_id, tool_name, params, status, result, owner_user_id, created_at, completed_at
             FROM tool_executions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StorageError::NotFound(format!("tool execution {id}")))?;
        row.try_into()
    }

    pub async fn mark_executing(&self, id: Uuid) -> StorageResult<bool> {
        let result = sqlx::query(
            "UPDATE tool_executions SET status = 'executing' WHERE id = $1 AND status = 'pending_approval'",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn mark_rejected(&self, id: Uuid) -> StorageResult<()> {
        sqlx::query("UPDATE tool_executions SET status = 'rejected', completed_at = $1 WHERE id = $2")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Times out a still-`executing` row. Returns `false` if the client
    /// already posted a result (or the row timed out already), so the
    /// caller never overwrites a real outcome with a timeout.
    pub async fn mark_timeout(&self, id: Uuid) -> StorageResult<bool> {
        let outcome = sqlx::query(
            "UPDATE tool_executions SET status = 'timed_out', completed_at = $1
             WHERE id = $2 AND status = 'executing'",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(outcome.rows_affected() == 1)
    }

    /// Completes a tool execution only if `poster` is the owner and the row
    /// is still `executing`. The two failure modes are distinguished so the
    /// caller can tell a forged/cross-tenant posting (`NotOwner`) apart from
    /// an idempotency violation — a result posted twice, or posted after a
    /// timeout already landed (`AlreadyResolved`).
    pub async fn complete(
        &self,
        id: Uuid,
        poster: Uuid,
        result: serde_json::Value,
        succeeded: bool,
    ) -> StorageResult<CompleteOutcome> {
        let owner_user_id: Uuid = sqlx::query_scalar("SELECT owner_user_id FROM tool_executions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("tool execution {id}")))?;
        if owner_user_id != poster {
            return Ok(CompleteOutcome::NotOwner);
        }

        let status = if succeeded { "completed" } else { "failed" };
        let outcome = sqlx::query(
            "UPDATE tool_executions SET status = $1, result = $2, completed_at = $3
             WHERE id = $4 AND owner_user_id = $5 AND status = 'executing'",
        )
        .bind(status)
        .bind(result)
        .bind(Utc::now())
        .bind(id)
        .bind(poster)
        .execute(&self.pool)
        .await?;
        if outcome.rows_affected() == 1 {
            Ok(CompleteOutcome::Applied)
        } else {
            Ok(CompleteOutcome::AlreadyResolved)
        }
    }
}

/// Outcome of [`ToolExecutionRepo::complete`]'s ownership/state check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompleteOutcome {
    Applied,
    NotOwner,
    AlreadyResolved,
}
