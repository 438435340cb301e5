use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A team function (e.g. `dev`, `qa`). Effort assessments are grouped by role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
}
