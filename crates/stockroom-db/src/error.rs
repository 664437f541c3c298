//! Database-specific error types and conversions.

use stockroom_core::error::StockroomError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Malformed record: {0}")]
    Decode(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Record already exists: {entity}")]
    AlreadyExists { entity: String },
}

impl DbError {
    pub(crate) fn not_found(entity: &str, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }
}

impl From<DbError> for StockroomError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => StockroomError::NotFound { entity, id },
            DbError::AlreadyExists { entity } => StockroomError::AlreadyExists { entity },
            other => StockroomError::Database(other.to_string()),
        }
    }
}
