//! Read-only progress and result view of an epic.

use std::fmt;

use serde::Serialize;
use uuid::Uuid;

use estimo_core::entities::Epic;
use estimo_core::enums::ScoringStatus;
use estimo_core::repository::Repository;

use crate::engine::ScoringEngine;
use crate::error::EngineError;
use crate::math::risk_coefficient;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoleLine {
    pub role: String,
    pub weighted_avg: f64,
    /// Computed live from current assessments rather than read from the
    /// aggregates stored at completion.
    pub provisional: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskLine {
    pub id: Uuid,
    pub description: String,
    pub status: ScoringStatus,
    pub submitted: u64,
    pub weighted_score: Option<f64>,
    pub coefficient: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpicReport {
    pub epic: Epic,
    pub team: String,
    pub members: u64,
    pub effort_submitted: u64,
    /// Handles of team members who have not estimated effort yet.
    pub missing: Vec<String>,
    pub roles: Vec<RoleLine>,
    pub risks: Vec<RiskLine>,
    pub base_score: f64,
    pub final_score: Option<f64>,
}

impl<R: Repository> ScoringEngine<R> {
    /// Assemble the report for one epic.
    ///
    /// Complete epics report their stored role aggregates; open epics report
    /// provisional averages over whatever has been submitted so far.
    ///
    /// # Errors
    ///
    /// Any repository failure, including an unknown epic.
    pub async fn epic_report(&self, epic_id: Uuid) -> Result<EpicReport, EngineError> {
        let repo = self.repo();
        let epic = repo.get_epic(epic_id).await?;
        let team = repo.get_team(epic.team_id).await?;
        let roster = repo.list_team_participants(team.id).await?;

        let mut missing = Vec::new();
        for member in &roster {
            if !repo.has_effort_assessment(epic_id, member.id).await? {
                missing.push(member.handle.clone());
            }
        }

        let mut roles = Vec::new();
        if epic.status == ScoringStatus::Complete {
            for aggregate in repo.list_role_aggregates(epic_id).await? {
                let role = repo.get_role(aggregate.role_id).await?;
                roles.push(RoleLine {
                    role: role.name,
                    weighted_avg: aggregate.weighted_avg,
                    provisional: false,
                });
            }
        } else {
            for role_id in repo.list_effort_roles(epic_id).await? {
                let role = repo.get_role(role_id).await?;
                roles.push(RoleLine {
                    role: role.name,
                    weighted_avg: self.role_average(epic_id, role_id).await?,
                    provisional: true,
                });
            }
        }

        let mut risks = Vec::new();
        for risk in repo.list_risks(epic_id).await? {
            risks.push(RiskLine {
                id: risk.id,
                submitted: repo.count_risk_submitters(risk.id).await?,
                coefficient: risk.weighted_score.map(risk_coefficient),
                weighted_score: risk.weighted_score,
                status: risk.status,
                description: risk.description,
            });
        }

        Ok(EpicReport {
            team: team.name,
            members: u64::try_from(roster.len()).unwrap_or(u64::MAX),
            effort_submitted: repo.count_effort_submitters(epic_id).await?,
            missing,
            base_score: roles.iter().map(|r| r.weighted_avg).sum(),
            final_score: epic.final_score,
            roles,
            risks,
            epic,
        })
    }
}

impl fmt::Display for EpicReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} {} [{}] team {}",
            self.epic.number, self.epic.name, self.epic.status, self.team
        )?;
        writeln!(
            f,
            "effort: {}/{} submitted",
            self.effort_submitted, self.members
        )?;
        if !self.missing.is_empty() {
            writeln!(f, "waiting on: {}", self.missing.join(", "))?;
        }
        for role in &self.roles {
            let marker = if role.provisional { " (so far)" } else { "" };
            writeln!(f, "  {}: {:.2}{marker}", role.role, role.weighted_avg)?;
        }
        for risk in &self.risks {
            match (risk.weighted_score, risk.coefficient) {
                (Some(score), Some(coefficient)) => writeln!(
                    f,
                    "  risk '{}': {score:.2} (x{coefficient:.2})",
                    risk.description
                )?,
                _ => writeln!(
                    f,
                    "  risk '{}': {} ({} assessed)",
                    risk.description, risk.status, risk.submitted
                )?,
            }
        }
        match self.final_score {
            Some(score) => write!(f, "final score: {score}"),
            None => write!(f, "base score so far: {:.2}", self.base_score),
        }
    }
}
