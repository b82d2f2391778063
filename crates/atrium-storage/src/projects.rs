use atrium_core::{Project, TenantPredicate};

use crate::error::{StorageError, StorageResult};
use crate::pool::PgPool;
use crate::rows::ProjectRow;

#[derive(Clone)]
pub struct ProjectRepo {
    pool: PgPool,
}

impl ProjectRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        predicate: TenantPredicate,
        name: &str,
        workspace_path: Option<&str>,
    ) -> StorageResult<Project> {
        let row: ProjectRow = sqlx::query_as(
            "INSERT INTO projects (id, user_id, name, workspace_path) VALUES (gen_random_uuid(), $1, $2, $3)
             RETURNING id, user_id, name, workspace_path, created_at",
        )
        .bind(predicate.user_id.as_uuid())
        .bind(name)
        .bind(workspace_path)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    pub async fn get(&self, predicate: TenantPredicate, project_id: uuid::Uuid) -> StorageResult<Project> {
        let row: ProjectRow = sqlx::query_as(
            "SELECT id, user_id, name, workspace_path, created_at FROM projects WHERE id = $1 AND user_id = $2",
        )
        .bind(project_id)
        .bind(predicate.user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StorageError::NotFound(format!("project {project_id}")))?;
        Ok(row.into())
    }

    pub async fn list_for_user(&self, predicate: TenantPredicate) -> StorageResult<Vec<Project>> {
        let rows: Vec<ProjectRow> = sqlx::query_as(
            "SELECT id, user_id, name, workspace_path, created_at FROM projects WHERE user_id = $1 ORDER BY created_at",
        )
        .bind(predicate.user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Updates the mutable fields (name, workspace_path). `None` leaves a
    /// field unchanged rather than clearing it.
    pub async fn update(
        &self,
        predicate: TenantPredicate,
        project_id: uuid::Uuid,
        name: Option<&str>,
        workspace_path: Option<&str>,
    ) -> StorageResult<Project> {
        let row: ProjectRow = sqlx::query_as(
            "UPDATE projects SET
                name = COALESCE($1, name),
                workspace_path = COALESCE($2, workspace_path)
             WHERE id = $3 AND user_id = $4
             RETURNING id, user_id, name, workspace_path, created_at",
        )
        .bind(name)
        .bind(workspace_path)
        .bind(project_id)
        .bind(predicate.user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StorageError::NotFound(format!("project {project_id}")))?;
        Ok(row.into())
    }

    /// Deletes the project row; `ON DELETE CASCADE` on every owned table
    /// (agents, sessions, messages, outbox, approvals, tool executions)
    /// takes care of the rest. Never touches the client's filesystem.
    pub async fn delete(&self, predicate: TenantPredicate, project_id: uuid::Uuid) -> StorageResult<()> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1 AND user_id = $2")
            .bind(project_id)
            .bind(predicate.user_id.as_uuid())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("project {project_id}")));
        }
        Ok(())
    }
}
