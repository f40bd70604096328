//! Database-specific error types and conversions.

use tessera_core::error::TesseraError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Malformed connection descriptor: {0:?}")]
    Descriptor(String),

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },
}

impl DbError {
    /// Whether the engine refused a DEFINE because the object exists.
    pub fn is_already_exists(&self) -> bool {
        match self {
            DbError::Surreal(e) => e.to_string().contains("already exists"),
            _ => false,
        }
    }

    /// Whether a write was rejected by a UNIQUE index.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            DbError::Surreal(e) => e.to_string().contains("already contains"),
            _ => false,
        }
    }
}

impl From<DbError> for TesseraError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => TesseraError::NotFound { entity, id },
            DbError::Migration(msg) => TesseraError::Migration(msg),
            DbError::Descriptor(_) => TesseraError::Connection(err.to_string()),
            other => TesseraError::Database(other.to_string()),
        }
    }
}
