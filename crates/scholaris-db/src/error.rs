//! Database-specific error types and conversions.

use scholaris_core::error::ScholarisError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    /// A multi-statement transaction was cancelled; the caller reloads
    /// state to find out why.
    #[error("Transaction aborted: {0}")]
    TransactionAborted(String),

    #[error("Corrupt row: {0}")]
    Decode(String),
}

impl From<DbError> for ScholarisError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ScholarisError::NotFound { entity, id },
            DbError::Conflict(reason) => ScholarisError::Conflict { reason },
            // Optimistic transactions abort when a concurrent writer wins.
            DbError::TransactionAborted(cause) => ScholarisError::Conflict {
                reason: format!("write did not commit, retry: {cause}"),
            },
            other => ScholarisError::Database(other.to_string()),
        }
    }
}

pub(crate) fn parse_uuid(raw: &str, what: &str) -> Result<uuid::Uuid, DbError> {
    uuid::Uuid::parse_str(raw).map_err(|e| DbError::Decode(format!("invalid {what} UUID: {e}")))
}
