//! Repository contracts consumed by the scoring engine and the chat router.
//!
//! Traits are grouped by entity and combined into [`Repository`]. Lookups by
//! primary key return `CoreError::NotFound`; lookups by natural key (handle,
//! name, number) return `Ok(None)` instead so callers can offer "create" paths.
//!
//! Completion writes (`commit_epic_completion`, `commit_risk_completion`) are
//! conditional: they apply only while the target is not yet complete and report
//! whether this call was the one that applied them.

use async_trait::async_trait;
use uuid::Uuid;

use crate::entities::{
    EffortAssessment, Epic, NewEpic, NewParticipant, Participant, Risk, RiskAssessment, Role,
    RoleAggregate, Team,
};
use crate::enums::ScoringStatus;
use crate::errors::CoreError;
use crate::inputs::{EffortValue, RiskFactor, Weight};

/// Everything written when an epic completes, committed atomically.
#[derive(Debug, Clone, PartialEq)]
pub struct EpicCompletion {
    pub epic_id: Uuid,
    pub role_aggregates: Vec<RoleAggregate>,
    pub final_score: f64,
}

#[async_trait]
pub trait ParticipantRepo: Send + Sync {
    async fn create_participant(&self, new: NewParticipant) -> Result<Participant, CoreError>;

    async fn get_participant(&self, id: Uuid) -> Result<Participant, CoreError>;

    async fn find_participant_by_handle(
        &self,
        handle: &str,
    ) -> Result<Option<Participant>, CoreError>;

    async fn list_participants(&self) -> Result<Vec<Participant>, CoreError>;

    async fn list_team_participants(&self, team_id: Uuid) -> Result<Vec<Participant>, CoreError>;

    async fn update_participant_weight(
        &self,
        id: Uuid,
        weight: Weight,
    ) -> Result<Participant, CoreError>;

    async fn rename_participant(
        &self,
        id: Uuid,
        first_name: &str,
        last_name: &str,
    ) -> Result<Participant, CoreError>;

    async fn delete_participant(&self, id: Uuid) -> Result<(), CoreError>;
}

#[async_trait]
pub trait RoleRepo: Send + Sync {
    async fn create_role(&self, name: &str, description: Option<&str>) -> Result<Role, CoreError>;

    async fn get_role(&self, id: Uuid) -> Result<Role, CoreError>;

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, CoreError>;

    async fn list_roles(&self) -> Result<Vec<Role>, CoreError>;

    async fn assign_role(&self, participant_id: Uuid, role_id: Uuid) -> Result<(), CoreError>;

    async fn unassign_role(&self, participant_id: Uuid, role_id: Uuid) -> Result<(), CoreError>;

    /// Roles assigned to a participant, ordered by name.
    async fn list_participant_roles(&self, participant_id: Uuid) -> Result<Vec<Role>, CoreError>;

    /// The role recorded on the participant's effort assessments.
    async fn primary_role(&self, participant_id: Uuid) -> Result<Option<Role>, CoreError> {
        Ok(self
            .list_participant_roles(participant_id)
            .await?
            .into_iter()
            .next())
    }
}

#[async_trait]
pub trait TeamRepo: Send + Sync {
    async fn create_team(&self, name: &str, description: Option<&str>) -> Result<Team, CoreError>;

    async fn get_team(&self, id: Uuid) -> Result<Team, CoreError>;

    async fn find_team_by_name(&self, name: &str) -> Result<Option<Team>, CoreError>;

    async fn list_teams(&self) -> Result<Vec<Team>, CoreError>;

    async fn add_team_member(&self, team_id: Uuid, participant_id: Uuid) -> Result<(), CoreError>;

    async fn remove_team_member(&self, team_id: Uuid, participant_id: Uuid)
    -> Result<(), CoreError>;

    async fn count_team_members(&self, team_id: Uuid) -> Result<u64, CoreError>;

    async fn list_participant_teams(&self, participant_id: Uuid) -> Result<Vec<Team>, CoreError>;
}

#[async_trait]
pub trait EpicRepo: Send + Sync {
    async fn create_epic(&self, new: NewEpic) -> Result<Epic, CoreError>;

    async fn get_epic(&self, id: Uuid) -> Result<Epic, CoreError>;

    async fn find_epic_by_number(&self, number: &str) -> Result<Option<Epic>, CoreError>;

    async fn list_epics(&self) -> Result<Vec<Epic>, CoreError>;

    async fn list_epics_by_status(&self, status: ScoringStatus) -> Result<Vec<Epic>, CoreError>;

    async fn list_team_epics(
        &self,
        team_id: Uuid,
        status: ScoringStatus,
    ) -> Result<Vec<Epic>, CoreError>;

    /// In-progress epics of a team where the participant still owes an effort
    /// estimate or an assessment for one of the in-progress risks.
    async fn list_epics_pending_for(
        &self,
        participant_id: Uuid,
        team_id: Uuid,
    ) -> Result<Vec<Epic>, CoreError>;

    /// Move an epic along its state machine.
    ///
    /// Returns `CoreError::InvalidTransition` for disallowed moves.
    async fn transition_epic(&self, id: Uuid, to: ScoringStatus) -> Result<Epic, CoreError>;

    /// Upsert role aggregates and set the final score, marking the epic complete.
    ///
    /// Returns `false` without writing anything if the epic was already complete.
    async fn commit_epic_completion(&self, completion: &EpicCompletion) -> Result<bool, CoreError>;

    async fn list_role_aggregates(&self, epic_id: Uuid) -> Result<Vec<RoleAggregate>, CoreError>;

    async fn delete_epic(&self, id: Uuid) -> Result<(), CoreError>;
}

#[async_trait]
pub trait RiskRepo: Send + Sync {
    async fn create_risk(
        &self,
        epic_id: Uuid,
        description: &str,
        status: ScoringStatus,
    ) -> Result<Risk, CoreError>;

    async fn get_risk(&self, id: Uuid) -> Result<Risk, CoreError>;

    async fn list_risks(&self, epic_id: Uuid) -> Result<Vec<Risk>, CoreError>;

    /// In-progress risks of an epic the participant has not assessed yet.
    async fn list_risks_pending_for(
        &self,
        participant_id: Uuid,
        epic_id: Uuid,
    ) -> Result<Vec<Risk>, CoreError>;

    async fn transition_risk(&self, id: Uuid, to: ScoringStatus) -> Result<Risk, CoreError>;

    /// Set the weighted score and mark the risk complete.
    ///
    /// Returns `false` without writing anything if the risk was already complete.
    async fn commit_risk_completion(
        &self,
        risk_id: Uuid,
        weighted_score: f64,
    ) -> Result<bool, CoreError>;

    async fn delete_risk(&self, id: Uuid) -> Result<(), CoreError>;
}

#[async_trait]
pub trait AssessmentRepo: Send + Sync {
    /// Insert or overwrite the participant's effort estimate for an epic.
    async fn upsert_effort(
        &self,
        epic_id: Uuid,
        participant_id: Uuid,
        role_id: Uuid,
        value: EffortValue,
    ) -> Result<EffortAssessment, CoreError>;

    /// Insert or overwrite the participant's assessment for a risk.
    async fn upsert_risk_assessment(
        &self,
        risk_id: Uuid,
        participant_id: Uuid,
        probability: RiskFactor,
        impact: RiskFactor,
    ) -> Result<RiskAssessment, CoreError>;

    async fn list_effort_assessments(
        &self,
        epic_id: Uuid,
    ) -> Result<Vec<EffortAssessment>, CoreError>;

    async fn list_role_effort_assessments(
        &self,
        epic_id: Uuid,
        role_id: Uuid,
    ) -> Result<Vec<EffortAssessment>, CoreError>;

    async fn list_risk_assessments(&self, risk_id: Uuid)
    -> Result<Vec<RiskAssessment>, CoreError>;

    async fn count_effort_submitters(&self, epic_id: Uuid) -> Result<u64, CoreError>;

    async fn count_risk_submitters(&self, risk_id: Uuid) -> Result<u64, CoreError>;

    /// Distinct role ids that have at least one effort assessment for the epic.
    async fn list_effort_roles(&self, epic_id: Uuid) -> Result<Vec<Uuid>, CoreError>;

    async fn has_effort_assessment(
        &self,
        epic_id: Uuid,
        participant_id: Uuid,
    ) -> Result<bool, CoreError>;
}

/// The full store contract.
pub trait Repository:
    ParticipantRepo + RoleRepo + TeamRepo + EpicRepo + RiskRepo + AssessmentRepo
{
}

impl<T> Repository for T where
    T: ParticipantRepo + RoleRepo + TeamRepo + EpicRepo + RiskRepo + AssessmentRepo
{
}
