//! Database error types for estimo-db.

use estimo_core::enums::{EntityType, ScoringStatus};
use estimo_core::errors::CoreError;
use thiserror::Error;

/// Errors from database operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// A SQL query failed or returned unparseable data.
    #[error("Query failed: {0}")]
    Query(String),

    /// Schema migration failed.
    #[error("Migration failed: {0}")]
    Migration(String),

    /// Expected a result row but none was returned.
    #[error("No result returned")]
    NoResult,

    /// A lookup by primary key found nothing.
    #[error("{entity_type} {id} not found")]
    NotFound { entity_type: EntityType, id: String },

    /// A uniqueness or reference constraint rejected the write.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A status change that the state machine forbids.
    #[error("Cannot transition {entity_type} {id} from {from} to {to}")]
    InvalidTransition {
        entity_type: EntityType,
        id: String,
        from: ScoringStatus,
        to: ScoringStatus,
    },

    /// Underlying libSQL error.
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DatabaseError {
    pub(crate) fn not_found(entity_type: EntityType, id: impl ToString) -> Self {
        Self::NotFound {
            entity_type,
            id: id.to_string(),
        }
    }

    /// Turn a constraint failure into `Conflict`, leaving other errors untouched.
    pub(crate) fn or_conflict(err: libsql::Error, what: impl FnOnce() -> String) -> Self {
        let text = err.to_string();
        if text.contains("UNIQUE constraint failed") || text.contains("FOREIGN KEY constraint failed")
        {
            Self::Conflict(what())
        } else {
            Self::LibSql(err)
        }
    }
}

impl From<DatabaseError> for CoreError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound { entity_type, id } => Self::NotFound { entity_type, id },
            DatabaseError::InvalidTransition {
                entity_type,
                id,
                from,
                to,
            } => Self::InvalidTransition {
                entity_type,
                id,
                from,
                to,
            },
            DatabaseError::Conflict(msg) => Self::Validation(msg),
            other => Self::Storage(Box::new(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_core_not_found() {
        let core: CoreError = DatabaseError::not_found(EntityType::Team, "t1").into();
        assert!(matches!(
            core,
            CoreError::NotFound { entity_type: EntityType::Team, ref id } if id == "t1"
        ));
    }

    #[test]
    fn conflict_maps_to_validation() {
        let core: CoreError = DatabaseError::Conflict("epic EP-1 already exists".into()).into();
        assert_eq!(core.to_string(), "Validation error: epic EP-1 already exists");
    }

    #[test]
    fn query_failures_map_to_storage() {
        let core: CoreError = DatabaseError::Query("boom".into()).into();
        assert!(core.is_storage());
    }
}
