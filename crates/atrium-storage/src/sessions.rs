use atrium_core::{Message, Role, Session, TenantPredicate};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};
use crate::pool::PgPool;
use crate::rows::{role_str, MessageRow, SessionRow};

#[derive(Clone)]
pub struct SessionRepo {
    pool: PgPool,
}

impl SessionRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, predicate: TenantPredicate) -> StorageResult<Session> {
        let project_id = predicate
            .project_id
            .ok_or_else(|| StorageError::NotFound("project_id required to create session".into()))?;
        let row: SessionRow = sqlx::query_as(
            "INSERT INTO sessions (id, user_id, project_id) VALUES (gen_random_uuid(), $1, $2)
             RETURNING id, user_id, project_id, last_active_agent_id, created_at",
        )
        .bind(predicate.user_id.as_uuid())
        .bind(project_id.as_uuid())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    pub async fn get(&self, predicate: TenantPredicate, session_id: Uuid) -> StorageResult<Session> {
        let row: SessionRow = sqlx::query_as(
            "SELECT id, user_id, project_id, last_active_agent_id, created_at
             FROM sessions WHERE id = $1 AND user_id = $2",
        )
        .bind(session_id)
        .bind(predicate.user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StorageError::NotFound(format!("session {session_id}")))?;
        if !predicate.allows(row.user_id.into(), Some(row.project_id.into())) {
            return Err(StorageError::NotFound(format!("session {session_id}")));
        }
        Ok(row.into())
    }

    pub async fn set_last_active_agent(&self, session_id: Uuid, agent_id: Uuid) -> StorageResult<()> {
        sqlx::query("UPDATE sessions SET last_active_agent_id = $1 WHERE id = $2")
            .bind(agent_id)
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn append_message(
        &self,
        session_id: Uuid,
        role: Role,
        content: &str,
        agent_id: Option<Uuid>,
    ) -> StorageResult<Message> {
        let row: MessageRow = sqlx::query_as(
            "INSERT INTO messages (id, session_id, role, content, agent_id)
             VALUES (gen_random_uuid(), $1, $2, $3, $4)
             RETURNING id, session_id, role, content, agent_id, created_at",
        )
        .bind(session_id)
        .bind(role_str(role))
        .bind(content)
        .bind(agent_id)
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    /// Same insert as [`Self::append_message`], but run against a caller-owned
    /// connection so it can share a transaction with an outbox insert
    /// (Transactional Outbox: the domain write and its event both commit or
    /// both roll back).
    pub async fn append_message_in_tx(
        &self,
        conn: &mut PgConnection,
        session_id: Uuid,
        role: Role,
        content: &str,
        agent_id: Option<Uuid>,
    ) -> StorageResult<Message> {
        let row: MessageRow = sqlx::query_as(
            "INSERT INTO messages (id, session_id, role, content, agent_id)
             VALUES (gen_random_uuid(), $1, $2, $3, $4)
             RETURNING id, session_id, role, content, agent_id, created_at",
        )
        .bind(session_id)
        .bind(role_str(role))
        .bind(content)
        .bind(agent_id)
        .fetch_one(conn)
        .await?;
        row.try_into()
    }

    pub async fn recent_messages(&self, session_id: Uuid, limit: i64) -> StorageResult<Vec<Message>> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT id, session_id, role, content, agent_id, created_at
             FROM messages WHERE session_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(session_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        let mut messages: Vec<Message> = rows.into_iter().map(TryInto::try_into).collect::<StorageResult<_>>()?;
        messages.reverse();
        Ok(messages)
    }
}
