//! Engine error types.

use estimo_core::enums::{EntityType, ScoringStatus};
use estimo_core::errors::CoreError;
use uuid::Uuid;

/// Errors from scoring operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Error surfaced by the repository (lookup, validation, or storage).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The target is not in a status that accepts the operation.
    #[error("{entity_type} {id} is not open for scoring (status: {status})")]
    NotOpen {
        entity_type: EntityType,
        id: Uuid,
        status: ScoringStatus,
    },

    /// The participant is not on the roster of the target's team.
    #[error("participant {participant_id} is not a member of team {team_id}")]
    NotAMember { participant_id: Uuid, team_id: Uuid },

    /// Effort estimates are recorded against a role; the participant has none.
    #[error("participant {0} has no role assigned")]
    NoRole(Uuid),
}

impl EngineError {
    /// Whether the failure came from the backing store.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Core(core) if core.is_storage())
    }
}
