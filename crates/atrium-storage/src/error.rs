use atrium_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("row not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl From<StorageError> for CoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(what) => CoreError::NotFound(what),
            StorageError::Database(sqlx::Error::RowNotFound) => {
                CoreError::NotFound("row not found".to_string())
            }
            StorageError::Database(e) => CoreError::Transient(e.to_string()),
            StorageError::Migration(e) => CoreError::Permanent(e.to_string()),
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;
