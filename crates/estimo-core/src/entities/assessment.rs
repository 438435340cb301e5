use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::inputs::{EffortValue, RiskFactor};

/// One participant's effort estimate for an epic.
///
/// Unique per `(epic_id, participant_id)`; `role_id` is the participant's
/// role at the time of the latest submission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EffortAssessment {
    pub id: Uuid,
    pub epic_id: Uuid,
    pub participant_id: Uuid,
    pub role_id: Uuid,
    pub value: EffortValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One participant's probability/impact assessment for a risk.
///
/// Unique per `(risk_id, participant_id)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RiskAssessment {
    pub id: Uuid,
    pub risk_id: Uuid,
    pub participant_id: Uuid,
    pub probability: RiskFactor,
    pub impact: RiskFactor,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RiskAssessment {
    /// Raw risk score for this assessment, in `[1, 16]`.
    #[must_use]
    pub fn score(&self) -> u8 {
        self.probability.get() * self.impact.get()
    }
}

/// Weighted mean of one role's effort estimates for an epic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoleAggregate {
    pub epic_id: Uuid,
    pub role_id: Uuid,
    pub weighted_avg: f64,
}
