use sqlx::postgres::{PgPoolOptions, Postgres};
use sqlx::Pool;

use crate::error::StorageResult;

pub type PgPool = Pool<Postgres>;

pub async fn connect(database_url: &str, max_connections: u32) -> StorageResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Applies every migration in `migrations/` that has not yet run. Idempotent:
/// safe to call on every process start.
pub async fn run_migrations(pool: &PgPool) -> StorageResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
