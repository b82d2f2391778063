use atrium_core::{Agent, AgentConfig, AgentStatus, TenantPredicate};
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};
use crate::pool::PgPool;
use crate::rows::{agent_status_str, AgentRow};

#[derive(Clone)]
pub struct AgentRepo {
    pool: PgPool,
}

impl AgentRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        predicate: TenantPredicate,
        name: &str,
        config: &AgentConfig,
    ) -> StorageResult<Agent> {
        let project_id = predicate
            .project_id
            .ok_or_else(|| StorageError::NotFound("project_id required to create agent".into()))?;
        let allowed_tools = serde_json::to_value(&config.allowed_tools).unwrap_or_default();
        let row: AgentRow = sqlx::query_as(
            "INSERT INTO agents (id, project_id, name, system_prompt, model, concurrency_limit, allowed_tools)
             VALUES (gen_random_uuid(), $1, $2, $3, $4, $5, $6)
             RETURNING id, project_id, name, system_prompt, model, concurrency_limit, allowed_tools, status, in_flight, created_at",
        )
        .bind(project_id.as_uuid())
        .bind(name)
        .bind(&config.system_prompt)
        .bind(&config.model)
        .bind(config.concurrency_limit.clamp(1, 10) as i32)
        .bind(allowed_tools)
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    pub async fn get(&self, project_id: Uuid, agent_id: Uuid) -> StorageResult<Agent> {
        let row: AgentRow = sqlx::query_as(
            "SELECT id, project_id, name, system_prompt, model, concurrency_limit, allowed_tools, status, in_flight, created_at
             FROM agents WHERE id = $1 AND project_id = $2",
        )
        .bind(agent_id)
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StorageError::NotFound(format!("agent {agent_id}")))?;
        row.try_into()
    }

    /// Looks an agent up by its project-unique name. Used by starter-pack
    /// creation to stay idempotent: a project that already has a `coder`
    /// agent is never given a second one.
    pub async fn get_by_name(&self, project_id: Uuid, name: &str) -> StorageResult<Option<Agent>> {
        let row: Option<AgentRow> = sqlx::query_as(
            "SELECT id, project_id, name, system_prompt, model, concurrency_limit, allowed_tools, status, in_flight, created_at
             FROM agents WHERE project_id = $1 AND name = $2",
        )
        .bind(project_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    pub async fn list_for_project(&self, project_id: Uuid) -> StorageResult<Vec<Agent>> {
        let rows: Vec<AgentRow> = sqlx::query_as(
            "SELECT id, project_id, name, system_prompt, model, concurrency_limit, allowed_tools, status, in_flight, created_at
             FROM agents WHERE project_id = $1 ORDER BY created_at",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Atomically bumps `in_flight` by 1 only if the agent still has spare
    /// capacity under its (clamped) concurrency limit; returns `false` on
    /// contention instead of oversubscribing (bounded concurrency).
    pub async fn try_reserve_slot(&self, agent_id: Uuid) -> StorageResult<bool> {
        let result = sqlx::query(
            "UPDATE agents SET in_flight = in_flight + 1, status = 'busy'
             WHERE id = $1 AND status != 'disabled'
               AND in_flight < LEAST(GREATEST(concurrency_limit, 1), 10)",
        )
        .bind(agent_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn release_slot(&self, agent_id: Uuid) -> StorageResult<()> {
        sqlx::query(
            "UPDATE agents SET in_flight = GREATEST(in_flight - 1, 0),
                status = CASE WHEN in_flight - 1 <= 0 AND status != 'disabled' THEN 'ready' ELSE status END
             WHERE id = $1",
        )
        .bind(agent_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_status(&self, agent_id: Uuid, status: AgentStatus) -> StorageResult<()> {
        sqlx::query("UPDATE agents SET status = $1 WHERE id = $2")
            .bind(agent_status_str(status))
            .bind(agent_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
