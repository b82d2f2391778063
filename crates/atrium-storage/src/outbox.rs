//! Transactional Outbox write and publish paths. The write side
//! inserts the outbox row in the same transaction as its domain write so a
//! crash between the two is impossible. The publish side claims pending rows
//! with `FOR UPDATE SKIP LOCKED` so more than one publisher instance can run
//! against the same table without double-claiming a row.

use atrium_core::OutboxRow;
use chrono::Utc;
use sqlx::{PgConnection, Postgres, Transaction};
use uuid::Uuid;

use crate::error::StorageResult;
use crate::pool::PgPool;
use crate::rows::OutboxRowRaw;

#[derive(Clone)]
pub struct OutboxRepo {
    pool: PgPool,
}

impl OutboxRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Starts a transaction the caller uses for its domain write plus the
    /// outbox insert below, then commits both atomically.
    pub async fn begin(&self) -> StorageResult<Transaction<'_, Postgres>> {
        Ok(self.pool.begin().await?)
    }

    pub async fn insert_in_tx(
        &self,
        conn: &mut PgConnection,
        session_id: Uuid,
        event_type: &str,
        payload: serde_json::Value,
    ) -> StorageResult<OutboxRow> {
        let row: OutboxRowRaw = sqlx::query_as(
            "INSERT INTO outbox (id, session_id, event_type, payload)
             VALUES (gen_random_uuid(), $1, $2, $3)
             RETURNING id, session_id, event_type, payload, status, attempts, created_at, published_at",
        )
        .bind(session_id)
        .bind(event_type)
        .bind(payload)
        .fetch_one(conn)
        .await?;
        row.try_into()
    }

    /// Claims up to `batch_size` pending rows for this publisher tick. Rows
    /// already locked by another publisher are skipped rather than waited on.
    pub async fn claim_pending(&self, batch_size: i64) -> StorageResult<Vec<OutboxRow>> {
        let mut tx = self.pool.begin().await?;
        let rows: Vec<OutboxRowRaw> = sqlx::query_as(
            "SELECT id, session_id, event_type, payload, status, attempts, created_at, published_at
             FROM outbox
             WHERE status = 'pending'
             ORDER BY created_at
             LIMIT $1
             FOR UPDATE SKIP LOCKED",
        )
        .bind(batch_size)
        .fetch_all(&mut *tx)
        .await?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        if !ids.is_empty() {
            sqlx::query("UPDATE outbox SET attempts = attempts + 1 WHERE id = ANY($1)")
                .bind(&ids)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    pub async fn mark_published(&self, id: Uuid) -> StorageResult<()> {
        sqlx::query("UPDATE outbox SET status = 'published', published_at = $1 WHERE id = $2")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Marks a row `failed` once its caller's retry ceiling is exhausted; the
    /// row stays in the table as a permanent record rather than being deleted.
    pub async fn mark_failed(&self, id: Uuid) -> StorageResult<()> {
        sqlx::query("UPDATE outbox SET status = 'failed' WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Requeues a row as `pending` so the next publisher tick retries it.
    pub async fn requeue(&self, id: Uuid) -> StorageResult<()> {
        sqlx::query("UPDATE outbox SET status = 'pending' WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn attempts_for(&self, id: Uuid) -> StorageResult<u32> {
        let attempts: i32 = sqlx::query_scalar("SELECT attempts FROM outbox WHERE id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(attempts.max(0) as u32)
    }

    /// Reads the outbox table as the analytics/replay read-model: it
    /// doubles as the event log, so there is no separate history table.
    pub async fn history_for_session(&self, session_id: Uuid, since: chrono::DateTime<Utc>) -> StorageResult<Vec<OutboxRow>> {
        let rows: Vec<OutboxRowRaw> = sqlx::query_as(
            "SELECT id, session_id, event_type, payload, status, attempts, created_at, published_at
             FROM outbox WHERE session_id = $1 AND created_at > $2 ORDER BY created_at",
        )
        .bind(session_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}
