//! The aggregation/completion engine.
//!
//! Lifecycle per target: `new -> in_progress -> complete`. Every submission
//! re-evaluates quorum from stored rows; nothing is cached between calls.
//!
//! Completion is at-most-once: the engine re-reads status before computing,
//! and the store's completion commit is conditional on the target not being
//! complete yet. Two callers racing past quorum both compute, but only one
//! commit applies; the other observes [`Completion::AlreadyComplete`].

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use estimo_core::entities::{Epic, Risk, RoleAggregate};
use estimo_core::enums::{EntityType, ScoringStatus};
use estimo_core::inputs::{EffortValue, RiskFactor};
use estimo_core::repository::{EpicCompletion, Repository};

use crate::error::EngineError;
use crate::math::{final_score, risk_coefficient, weighted_mean};

/// Result of a completion check.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Completion {
    /// Quorum not reached. A team without members never reaches it.
    NotReady { submitted: u64, required: u64 },
    /// Effort quorum reached, but some risks are still open.
    AwaitingRisks { pending: usize },
    /// Another caller (or an earlier call) already completed the target.
    AlreadyComplete,
    /// This call committed the result.
    Completed { score: f64 },
}

impl Completion {
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Outcome of a risk submission: the risk's own check, then the cascade.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskOutcome {
    pub risk: Completion,
    /// Set once the risk is complete and the owning epic was re-checked.
    pub epic: Option<Completion>,
}

/// Scoring operations over any [`Repository`].
pub struct ScoringEngine<R> {
    repo: Arc<R>,
}

impl<R> Clone for ScoringEngine<R> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
        }
    }
}

impl<R: Repository> ScoringEngine<R> {
    pub const fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    #[must_use]
    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Open an epic for scoring, along with every risk it already has.
    ///
    /// # Errors
    ///
    /// `CoreError::InvalidTransition` (wrapped) if the epic is not new.
    pub async fn start_scoring(&self, epic_id: Uuid) -> Result<Epic, EngineError> {
        let epic = self
            .repo
            .transition_epic(epic_id, ScoringStatus::InProgress)
            .await?;
        for risk in self.repo.list_risks(epic_id).await? {
            if risk.status == ScoringStatus::New {
                self.repo
                    .transition_risk(risk.id, ScoringStatus::InProgress)
                    .await?;
            }
        }
        info!(epic_id = %epic_id, number = %epic.number, "scoring started");
        Ok(epic)
    }

    /// Attach a risk to an epic. Risks added mid-scoring open immediately.
    ///
    /// # Errors
    ///
    /// `EngineError::NotOpen` if the epic is already complete.
    pub async fn add_risk(&self, epic_id: Uuid, description: &str) -> Result<Risk, EngineError> {
        let epic = self.repo.get_epic(epic_id).await?;
        let status = match epic.status {
            ScoringStatus::New => ScoringStatus::New,
            ScoringStatus::InProgress => ScoringStatus::InProgress,
            ScoringStatus::Complete => {
                return Err(EngineError::NotOpen {
                    entity_type: EntityType::Epic,
                    id: epic_id,
                    status: epic.status,
                });
            }
        };
        Ok(self.repo.create_risk(epic_id, description, status).await?)
    }

    /// Record (or overwrite) a participant's effort estimate, then check the epic.
    ///
    /// The estimate is filed under the participant's primary role.
    ///
    /// # Errors
    ///
    /// `NotOpen` unless the epic is in progress, `NotAMember` if the participant
    /// is not on the epic's team, `NoRole` if they hold no role, and any
    /// repository failure.
    pub async fn submit_effort(
        &self,
        epic_id: Uuid,
        participant_id: Uuid,
        value: EffortValue,
    ) -> Result<Completion, EngineError> {
        let epic = self.repo.get_epic(epic_id).await?;
        ensure_open(EntityType::Epic, epic.id, epic.status)?;
        self.ensure_member(participant_id, epic.team_id).await?;
        let role = self
            .repo
            .primary_role(participant_id)
            .await?
            .ok_or(EngineError::NoRole(participant_id))?;

        self.repo
            .upsert_effort(epic_id, participant_id, role.id, value)
            .await?;
        debug!(epic_id = %epic_id, participant_id = %participant_id, value = value.get(), "effort recorded");

        self.try_complete_epic(epic_id).await
    }

    /// Record (or overwrite) a participant's risk assessment, then check the
    /// risk and cascade into its epic.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Self::submit_effort`], minus the role requirement.
    pub async fn submit_risk(
        &self,
        risk_id: Uuid,
        participant_id: Uuid,
        probability: RiskFactor,
        impact: RiskFactor,
    ) -> Result<RiskOutcome, EngineError> {
        let risk = self.repo.get_risk(risk_id).await?;
        ensure_open(EntityType::Risk, risk.id, risk.status)?;
        let epic = self.repo.get_epic(risk.epic_id).await?;
        self.ensure_member(participant_id, epic.team_id).await?;

        self.repo
            .upsert_risk_assessment(risk_id, participant_id, probability, impact)
            .await?;
        debug!(
            risk_id = %risk_id,
            participant_id = %participant_id,
            probability = probability.get(),
            impact = impact.get(),
            "risk assessment recorded"
        );

        self.try_complete_risk(risk_id).await
    }

    /// Complete a risk if every team member has assessed it.
    ///
    /// Once the risk is complete (now or earlier) the owning epic is checked too.
    ///
    /// # Errors
    ///
    /// `NotOpen` for a risk that was never started, and any repository failure.
    pub async fn try_complete_risk(&self, risk_id: Uuid) -> Result<RiskOutcome, EngineError> {
        let risk = self.repo.get_risk(risk_id).await?;
        let outcome = match risk.status {
            ScoringStatus::New => {
                return Err(EngineError::NotOpen {
                    entity_type: EntityType::Risk,
                    id: risk_id,
                    status: risk.status,
                });
            }
            ScoringStatus::Complete => Completion::AlreadyComplete,
            ScoringStatus::InProgress => {
                let epic = self.repo.get_epic(risk.epic_id).await?;
                let required = self.repo.count_team_members(epic.team_id).await?;
                let submitted = self.repo.count_risk_submitters(risk_id).await?;
                if !quorum(submitted, required) {
                    debug!(risk_id = %risk_id, scored = submitted, required, "risk scoring not complete yet");
                    return Ok(RiskOutcome {
                        risk: Completion::NotReady {
                            submitted,
                            required,
                        },
                        epic: None,
                    });
                }

                let score = self.risk_weighted_score(risk_id).await?;
                if self.repo.commit_risk_completion(risk_id, score).await? {
                    info!(
                        risk_id = %risk_id,
                        weighted_score = score,
                        coefficient = risk_coefficient(score),
                        "risk scoring completed"
                    );
                    Completion::Completed { score }
                } else {
                    Completion::AlreadyComplete
                }
            }
        };

        let epic = self.try_complete_epic(risk.epic_id).await?;
        Ok(RiskOutcome {
            risk: outcome,
            epic: Some(epic),
        })
    }

    /// Complete an epic once effort quorum holds and every risk is complete.
    ///
    /// "Not yet" outcomes write nothing. On completion the role aggregates and
    /// the final score are committed together.
    ///
    /// # Errors
    ///
    /// `NotOpen` for an epic that was never started, and any repository failure.
    /// A failed commit leaves the epic in progress; calling again recomputes
    /// from the stored assessments.
    pub async fn try_complete_epic(&self, epic_id: Uuid) -> Result<Completion, EngineError> {
        let epic = self.repo.get_epic(epic_id).await?;
        match epic.status {
            ScoringStatus::Complete => return Ok(Completion::AlreadyComplete),
            ScoringStatus::New => {
                return Err(EngineError::NotOpen {
                    entity_type: EntityType::Epic,
                    id: epic_id,
                    status: epic.status,
                });
            }
            ScoringStatus::InProgress => {}
        }

        let required = self.repo.count_team_members(epic.team_id).await?;
        let submitted = self.repo.count_effort_submitters(epic_id).await?;
        if !quorum(submitted, required) {
            debug!(epic_id = %epic_id, scored = submitted, required, "epic scoring not complete yet");
            return Ok(Completion::NotReady {
                submitted,
                required,
            });
        }

        let risks = self.repo.list_risks(epic_id).await?;
        let pending = risks
            .iter()
            .filter(|r| r.status != ScoringStatus::Complete)
            .count();
        if pending > 0 {
            debug!(epic_id = %epic_id, pending, "waiting for risk scoring");
            return Ok(Completion::AwaitingRisks { pending });
        }

        let mut role_aggregates = Vec::new();
        for role_id in self.repo.list_effort_roles(epic_id).await? {
            let weighted_avg = self.role_average(epic_id, role_id).await?;
            role_aggregates.push(RoleAggregate {
                epic_id,
                role_id,
                weighted_avg,
            });
        }
        let base: f64 = role_aggregates.iter().map(|a| a.weighted_avg).sum();
        let score = final_score(
            base,
            risks
                .iter()
                .filter_map(|r| r.weighted_score)
                .map(risk_coefficient),
        );

        let completion = EpicCompletion {
            epic_id,
            role_aggregates,
            final_score: score,
        };
        if !self.repo.commit_epic_completion(&completion).await? {
            debug!(epic_id = %epic_id, "epic completed concurrently");
            return Ok(Completion::AlreadyComplete);
        }

        info!(epic_id = %epic_id, base_score = base, final_score = score, "epic scoring completed");
        Ok(Completion::Completed { score })
    }

    /// Re-check every in-progress epic of a team whose roster just shrank.
    ///
    /// Quorum is measured against the current roster, so removing a member who
    /// never submitted can satisfy it without any further submission. Open
    /// risks are checked first, then the epic itself.
    ///
    /// Returns the epics this call completed, with their final scores.
    ///
    /// # Errors
    ///
    /// Any repository failure. Epics completed before the failure stay
    /// complete; calling again picks up the rest.
    pub async fn recheck_team(&self, team_id: Uuid) -> Result<Vec<(Epic, f64)>, EngineError> {
        let mut completed = Vec::new();
        for epic in self
            .repo
            .list_team_epics(team_id, ScoringStatus::InProgress)
            .await?
        {
            let mut outcome = None;
            for risk in self.repo.list_risks(epic.id).await? {
                if risk.status != ScoringStatus::InProgress {
                    continue;
                }
                if let Some(Completion::Completed { score }) =
                    self.try_complete_risk(risk.id).await?.epic
                {
                    outcome = Some(score);
                }
            }
            if outcome.is_none() {
                if let Completion::Completed { score } = self.try_complete_epic(epic.id).await? {
                    outcome = Some(score);
                }
            }
            if let Some(score) = outcome {
                completed.push((epic, score));
            }
        }
        debug!(team_id = %team_id, completed = completed.len(), "team re-checked");
        Ok(completed)
    }

    /// Weighted mean of one role's effort estimates on an epic.
    ///
    /// Weights are the participants' current weights.
    ///
    /// # Errors
    ///
    /// Any repository failure.
    pub async fn role_average(&self, epic_id: Uuid, role_id: Uuid) -> Result<f64, EngineError> {
        let assessments = self
            .repo
            .list_role_effort_assessments(epic_id, role_id)
            .await?;
        let weights = self
            .weights(assessments.iter().map(|a| a.participant_id))
            .await?;
        Ok(weighted_mean(assessments.iter().map(|a| {
            (
                a.value.as_f64(),
                weights.get(&a.participant_id).copied().unwrap_or(0.0),
            )
        })))
    }

    /// Weighted mean of `probability * impact` across a risk's assessments.
    ///
    /// # Errors
    ///
    /// Any repository failure.
    pub async fn risk_weighted_score(&self, risk_id: Uuid) -> Result<f64, EngineError> {
        let assessments = self.repo.list_risk_assessments(risk_id).await?;
        let weights = self
            .weights(assessments.iter().map(|a| a.participant_id))
            .await?;
        Ok(weighted_mean(assessments.iter().map(|a| {
            (
                f64::from(a.score()),
                weights.get(&a.participant_id).copied().unwrap_or(0.0),
            )
        })))
    }

    async fn weights(
        &self,
        participants: impl Iterator<Item = Uuid>,
    ) -> Result<HashMap<Uuid, f64>, EngineError> {
        let mut weights = HashMap::new();
        for id in participants {
            if let std::collections::hash_map::Entry::Vacant(slot) = weights.entry(id) {
                let participant = self.repo.get_participant(id).await?;
                slot.insert(participant.weight.as_f64());
            }
        }
        Ok(weights)
    }

    async fn ensure_member(&self, participant_id: Uuid, team_id: Uuid) -> Result<(), EngineError> {
        let teams = self.repo.list_participant_teams(participant_id).await?;
        if teams.iter().any(|t| t.id == team_id) {
            Ok(())
        } else {
            Err(EngineError::NotAMember {
                participant_id,
                team_id,
            })
        }
    }
}

const fn quorum(submitted: u64, required: u64) -> bool {
    required > 0 && submitted >= required
}

fn ensure_open(
    entity_type: EntityType,
    id: Uuid,
    status: ScoringStatus,
) -> Result<(), EngineError> {
    if status.accepts_assessments() {
        Ok(())
    } else {
        Err(EngineError::NotOpen {
            entity_type,
            id,
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_team_never_reaches_quorum() {
        assert!(!quorum(0, 0));
        assert!(!quorum(5, 0));
        assert!(!quorum(2, 3));
        assert!(quorum(3, 3));
        assert!(quorum(4, 3));
    }

    #[test]
    fn only_in_progress_targets_are_open() {
        let id = Uuid::new_v4();
        assert!(ensure_open(EntityType::Epic, id, ScoringStatus::InProgress).is_ok());
        assert!(matches!(
            ensure_open(EntityType::Risk, id, ScoringStatus::Complete),
            Err(EngineError::NotOpen {
                entity_type: EntityType::Risk,
                ..
            })
        ));
    }

    #[test]
    fn completion_serializes_with_outcome_tag() {
        let json = serde_json::to_value(Completion::NotReady {
            submitted: 1,
            required: 3,
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"outcome": "not_ready", "submitted": 1, "required": 3})
        );
    }
}
