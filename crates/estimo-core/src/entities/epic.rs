use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::enums::ScoringStatus;

/// A unit of work whose effort is estimated by its team.
///
/// `final_score` is `Some` only once `status` is `Complete`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Epic {
    pub id: Uuid,
    pub number: String,
    pub name: String,
    pub description: Option<String>,
    pub team_id: Uuid,
    pub status: ScoringStatus,
    pub final_score: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields collected by the add-epic flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEpic {
    pub number: String,
    pub name: String,
    pub description: Option<String>,
    pub team_id: Uuid,
}
