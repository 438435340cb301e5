//! Cross-cutting error types for Estimo.
//!
//! `CoreError` is the error surface of the repository traits and of every
//! validated input type. Store-specific errors (e.g. `DatabaseError`) convert
//! into it at the trait boundary; the binary converges everything into `anyhow`.

use thiserror::Error;

use crate::enums::{EntityType, ScoringStatus};

/// Errors that can be raised by any Estimo crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Entity lookup returned no result.
    #[error("Entity not found: {entity_type} {id}")]
    NotFound { entity_type: EntityType, id: String },

    /// A state machine transition was attempted that is not allowed.
    #[error("Invalid state transition: {entity_type} {id} from {from} to {to}")]
    InvalidTransition {
        entity_type: EntityType,
        id: String,
        from: ScoringStatus,
        to: ScoringStatus,
    },

    /// Input failed validation (range, format, uniqueness, membership).
    #[error("Validation error: {0}")]
    Validation(String),

    /// The backing store failed while reading or writing.
    #[error("Storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl CoreError {
    /// Shorthand for a `NotFound` error.
    pub fn not_found(entity_type: EntityType, id: impl ToString) -> Self {
        Self::NotFound {
            entity_type,
            id: id.to_string(),
        }
    }

    /// Whether this error came from the backing store rather than the caller.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}
