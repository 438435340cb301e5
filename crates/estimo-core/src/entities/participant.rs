use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::inputs::Weight;

/// A person who submits assessments.
///
/// `handle` is the transport identity (e.g. a chat username without `@`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Participant {
    pub id: Uuid,
    pub handle: String,
    pub first_name: String,
    pub last_name: String,
    pub weight: Weight,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Participant {
    /// `"First Last"`, used in menus and status reports.
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Fields collected by the add-participant flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewParticipant {
    pub handle: String,
    pub first_name: String,
    pub last_name: String,
    pub weight: Weight,
}
