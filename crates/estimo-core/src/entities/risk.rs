use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::enums::ScoringStatus;

/// A concern attached to an epic, scored by probability × impact.
///
/// `weighted_score` is `Some` only once `status` is `Complete`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Risk {
    pub id: Uuid,
    pub epic_id: Uuid,
    pub description: String,
    pub status: ScoringStatus,
    pub weighted_score: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
