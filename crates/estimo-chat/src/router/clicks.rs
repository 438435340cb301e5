//! Menu clicks.

use std::collections::HashMap;

use estimo_core::entities::{Epic, Participant, Risk};
use estimo_core::enums::ScoringStatus;
use estimo_core::inputs::RiskFactor;
use estimo_core::repository::{
    AssessmentRepo, EpicRepo, ParticipantRepo, Repository, RiskRepo, RoleRepo, TeamRepo,
};
use estimo_engine::Completion;
use tracing::{info, warn};
use uuid::Uuid;

use super::render::{self, epic_label, participant_label, risk_label};
use super::{Caller, Outbound, Replies, Router, say};
use crate::action::{
    Action, ConfirmAction, EpicAction, RiskAction, RoleAction, TeamAction, UserAction,
};
use crate::error::ChatError;
use crate::session::{Step, keys};

impl<R: Repository> Router<R> {
    pub(super) async fn on_click(&self, caller: &Caller<'_>, raw: &str) -> Replies {
        let action = Action::decode(&self.codec, raw).inspect_err(|err| {
            warn!(conversation = %caller.conversation, token = raw, error = %err, "rejected token");
        })?;
        Self::require(caller, action.access(), || "this action".to_string())?;
        self.sessions.touch(caller.conversation);

        match action {
            Action::Cancel => {
                self.sessions.clear(caller.conversation);
                say("Cancelled")
            }
            Action::User(action, id) => self.on_user(caller, action, id).await,
            Action::Role(action, id) => self.on_role(caller, action, id).await,
            Action::Team(action, id) => self.on_team(caller, action, id).await,
            Action::Epic(action, id) => self.on_epic(caller, action, id).await,
            Action::Risk(action, id) => self.on_risk(caller, action, id).await,
            Action::Confirm(action, id) => self.on_confirm(caller, action, id).await,
        }
    }

    async fn on_user(&self, caller: &Caller<'_>, action: UserAction, id: Uuid) -> Replies {
        let repo = self.engine.repo();
        let who = repo.get_participant(id).await?;
        let label = participant_label(&who);

        match action {
            UserAction::AssignRole => {
                let held = repo.list_participant_roles(id).await?;
                let roles: Vec<_> = repo
                    .list_roles()
                    .await?
                    .into_iter()
                    .filter(|r| !held.iter().any(|h| h.id == r.id))
                    .collect();
                if roles.is_empty() {
                    return say(format!(
                        "No roles left to assign to {label}, create one with /addrole <name>"
                    ));
                }
                self.sessions
                    .stash(caller.conversation, keys::PARTICIPANT, id.to_string());
                let items = roles
                    .into_iter()
                    .map(|r| (r.name, Action::Role(RoleAction::Assign, r.id)));
                Ok(vec![self.menu(format!("Role for {label}:"), items)?])
            }
            UserAction::UnassignRole => {
                let roles = repo.list_participant_roles(id).await?;
                if roles.is_empty() {
                    return say(format!("{label} has no roles"));
                }
                self.sessions
                    .stash(caller.conversation, keys::PARTICIPANT, id.to_string());
                let items = roles
                    .into_iter()
                    .map(|r| (r.name, Action::Role(RoleAction::Unassign, r.id)));
                Ok(vec![self.menu(format!("Remove which role from {label}?"), items)?])
            }
            UserAction::AssignTeam => {
                let member_of = repo.list_participant_teams(id).await?;
                let teams: Vec<_> = repo
                    .list_teams()
                    .await?
                    .into_iter()
                    .filter(|t| !member_of.iter().any(|m| m.id == t.id))
                    .collect();
                if teams.is_empty() {
                    return say(format!("{label} is already in every team"));
                }
                self.sessions
                    .stash(caller.conversation, keys::PARTICIPANT, id.to_string());
                let items = teams
                    .into_iter()
                    .map(|t| (t.name, Action::Team(TeamAction::AddMember, t.id)));
                Ok(vec![self.menu(format!("Add {label} to which team?"), items)?])
            }
            UserAction::RemoveFromTeam => {
                let teams = repo.list_participant_teams(id).await?;
                if teams.is_empty() {
                    return say(format!("{label} is not in any team"));
                }
                self.sessions
                    .stash(caller.conversation, keys::PARTICIPANT, id.to_string());
                let items = teams
                    .into_iter()
                    .map(|t| (t.name, Action::Team(TeamAction::RemoveMember, t.id)));
                Ok(vec![self.menu(format!("Remove {label} from which team?"), items)?])
            }
            UserAction::Rename => {
                self.sessions.set(
                    caller.conversation,
                    Step::RenameFirstName,
                    scratch(keys::PARTICIPANT, id),
                );
                say(format!("Enter the new first name for {label}:"))
            }
            UserAction::ChangeWeight => {
                self.sessions.set(
                    caller.conversation,
                    Step::ChangeWeight,
                    scratch(keys::PARTICIPANT, id),
                );
                say(format!(
                    "Enter the new weight (0-100) for {label}, currently {}:",
                    who.weight
                ))
            }
            UserAction::Delete => {
                let confirm = self.menu(
                    format!("Delete {label}?"),
                    [("Delete".to_string(), Action::Confirm(ConfirmAction::DeleteUser, id))],
                )?;
                Ok(vec![confirm])
            }
        }
    }

    async fn on_role(&self, caller: &Caller<'_>, action: RoleAction, role_id: Uuid) -> Replies {
        let who = self.pending_participant(caller).await?;
        self.sessions.clear(caller.conversation);
        let repo = self.engine.repo();
        let role = repo.get_role(role_id).await?;

        match action {
            RoleAction::Assign => {
                repo.assign_role(who.id, role.id).await?;
                info!(participant_id = %who.id, role = %role.name, "role assigned");
                say(format!("@{} now holds the role {}", who.handle, role.name))
            }
            RoleAction::Unassign => {
                repo.unassign_role(who.id, role.id).await?;
                info!(participant_id = %who.id, role = %role.name, "role unassigned");
                say(format!("@{} no longer holds the role {}", who.handle, role.name))
            }
        }
    }

    async fn on_team(&self, caller: &Caller<'_>, action: TeamAction, team_id: Uuid) -> Replies {
        let repo = self.engine.repo();
        let team = repo.get_team(team_id).await?;

        match action {
            TeamAction::AddEpic => {
                self.sessions.set(
                    caller.conversation,
                    Step::AddEpicNumber,
                    scratch(keys::TEAM, team.id),
                );
                say(format!("New epic for {}. Enter the epic number:", team.name))
            }
            TeamAction::AddMember => {
                let who = self.pending_participant(caller).await?;
                self.sessions.clear(caller.conversation);
                let already = repo
                    .list_participant_teams(who.id)
                    .await?
                    .iter()
                    .any(|t| t.id == team.id);
                if already {
                    return Err(ChatError::Invalid(format!(
                        "@{} is already in {}",
                        who.handle, team.name
                    )));
                }
                repo.add_team_member(team.id, who.id).await?;
                info!(participant_id = %who.id, team_id = %team.id, "member added");
                say(format!("@{} added to {}", who.handle, team.name))
            }
            TeamAction::RemoveMember => {
                let who = self.pending_participant(caller).await?;
                self.sessions.clear(caller.conversation);
                repo.remove_team_member(team.id, who.id).await?;
                info!(participant_id = %who.id, team_id = %team.id, "member removed");
                let mut text = format!("@{} removed from {}", who.handle, team.name);
                self.recheck_teams(&[team.id], &mut text).await?;
                say(text)
            }
            TeamAction::Members => {
                let mut members = Vec::new();
                for p in repo.list_team_participants(team.id).await? {
                    let role = repo.primary_role(p.id).await?.map(|r| r.name);
                    members.push((p, role));
                }
                say(render::roster(&team.name, &members))
            }
            TeamAction::Score => {
                let me = self.participant(caller).await?;
                let epics = repo.list_epics_pending_for(me.id, team.id).await?;
                if epics.is_empty() {
                    return say(format!("Nothing left for you to score in {}", team.name));
                }
                let items = epics
                    .iter()
                    .map(|e| (epic_label(e), Action::Epic(EpicAction::Score, e.id)));
                Ok(vec![self.menu(format!("Epics waiting for you in {}:", team.name), items)?])
            }
        }
    }

    async fn on_epic(&self, caller: &Caller<'_>, action: EpicAction, epic_id: Uuid) -> Replies {
        let repo = self.engine.repo();
        let epic = repo.get_epic(epic_id).await?;
        let label = epic_label(&epic);

        match action {
            EpicAction::StartScore => {
                if epic.status != ScoringStatus::New {
                    return Err(ChatError::Invalid(format!(
                        "Epic {label} is already {}",
                        epic.status
                    )));
                }
                let epic = self.engine.start_scoring(epic.id).await?;
                let risks = repo.list_risks(epic.id).await?.len();
                info!(epic_id = %epic.id, risks, "scoring started");
                say(format!("Epic {label} and {risks} risk(s) are open for scoring"))
            }
            EpicAction::Results | EpicAction::Status => {
                let report = self.engine.epic_report(epic.id).await?;
                say(report.to_string())
            }
            EpicAction::AddRisk => {
                if epic.status == ScoringStatus::Complete {
                    return Err(ChatError::Invalid(format!("Epic {label} is already complete")));
                }
                self.sessions.set(
                    caller.conversation,
                    Step::AddRiskDescription,
                    scratch(keys::EPIC, epic.id),
                );
                say(format!("Describe the risk for epic {label}:"))
            }
            EpicAction::Delete => {
                let confirm = self.menu(
                    format!("Delete epic {label} with its risks and assessments?"),
                    [("Delete".to_string(), Action::Confirm(ConfirmAction::DeleteEpic, epic.id))],
                )?;
                Ok(vec![confirm])
            }
            EpicAction::DeleteRisk => {
                let risks = repo.list_risks(epic.id).await?;
                if risks.is_empty() {
                    return say(format!("Epic {label} has no risks"));
                }
                let items = risks
                    .iter()
                    .map(|r| (risk_label(r), Action::Risk(RiskAction::Delete, r.id)));
                Ok(vec![self.menu(format!("Delete which risk of {label}?"), items)?])
            }
            EpicAction::Score => {
                let me = self.participant(caller).await?;
                if epic.status != ScoringStatus::InProgress {
                    return Err(ChatError::Invalid(format!(
                        "Epic {label} is not open for scoring"
                    )));
                }
                if repo.has_effort_assessment(epic.id, me.id).await? {
                    return Ok(vec![self.risk_menu(&me, &epic).await?]);
                }
                self.sessions.set(
                    caller.conversation,
                    Step::ScoreEffort,
                    scratch(keys::EPIC, epic.id),
                );
                say(format!("Enter your effort estimate for {label} (0-500):"))
            }
        }
    }

    async fn on_risk(&self, caller: &Caller<'_>, action: RiskAction, risk_id: Uuid) -> Replies {
        let repo = self.engine.repo();
        let risk = repo.get_risk(risk_id).await?;

        match action {
            RiskAction::Score => {
                ensure_scoring(&risk)?;
                let items = RiskFactor::all().map(|p| {
                    (p.to_string(), Action::Risk(RiskAction::Probability(p), risk.id))
                });
                Ok(vec![self.menu(
                    format!(
                        "Risk: {}\nHow likely is it? (1 unlikely - 4 almost certain)",
                        risk.description
                    ),
                    items,
                )?])
            }
            RiskAction::Probability(probability) => {
                ensure_scoring(&risk)?;
                let mut data = scratch(keys::RISK, risk.id);
                data.insert(keys::PROBABILITY.into(), probability.to_string());
                self.sessions.set(caller.conversation, Step::RiskImpact, data);
                let items = RiskFactor::all()
                    .map(|i| (i.to_string(), Action::Risk(RiskAction::Impact(i), risk.id)));
                Ok(vec![self.menu(
                    "How severe would it be? (1 minor - 4 critical)",
                    items,
                )?])
            }
            RiskAction::Impact(impact) => self.score_risk(caller, &risk, impact).await,
            RiskAction::Delete => {
                let confirm = self.menu(
                    format!("Delete the risk \"{}\"?", risk_label(&risk)),
                    [("Delete".to_string(), Action::Confirm(ConfirmAction::DeleteRisk, risk.id))],
                )?;
                Ok(vec![confirm])
            }
        }
    }

    /// Impact click: combine with the stashed probability and submit.
    async fn score_risk(&self, caller: &Caller<'_>, risk: &Risk, impact: RiskFactor) -> Replies {
        let session = self
            .sessions
            .get(caller.conversation)
            .filter(|s| s.step == Step::RiskImpact)
            .filter(|s| s.get(keys::RISK) == Some(risk.id.to_string().as_str()))
            .ok_or(ChatError::SessionExpired)?;
        let probability = session
            .get(keys::PROBABILITY)
            .and_then(|p| p.parse::<u8>().ok())
            .and_then(|p| RiskFactor::new(p).ok())
            .ok_or(ChatError::SessionExpired)?;
        self.sessions.clear(caller.conversation);

        let me = self.participant(caller).await?;
        let outcome = self
            .engine
            .submit_risk(risk.id, me.id, probability, impact)
            .await?;
        let epic = self.engine.repo().get_epic(risk.epic_id).await?;

        let mut text = format!(
            "Assessed \"{}\": {probability} x {impact} = {}\n{}",
            risk_label(risk),
            probability.get() * impact.get(),
            render::risk_progress(&outcome.risk)
        );
        if let Some(epic_outcome) = &outcome.epic {
            text.push('\n');
            text.push_str(&render::epic_progress(&epic, epic_outcome));
        }
        Ok(vec![Outbound::text(text), self.risk_menu(&me, &epic).await?])
    }

    async fn on_confirm(&self, caller: &Caller<'_>, action: ConfirmAction, id: Uuid) -> Replies {
        self.sessions.clear(caller.conversation);
        let repo = self.engine.repo();

        match action {
            ConfirmAction::DeleteEpic => {
                let epic = repo.get_epic(id).await?;
                repo.delete_epic(id).await?;
                info!(epic_id = %id, "epic deleted");
                say(format!("Epic {} deleted", epic_label(&epic)))
            }
            ConfirmAction::DeleteRisk => {
                let risk = repo.get_risk(id).await?;
                repo.delete_risk(id).await?;
                info!(risk_id = %id, "risk deleted");
                let mut text = format!("Risk \"{}\" deleted", risk_label(&risk));

                // The deleted risk may have been the last one holding the epic open.
                let epic = repo.get_epic(risk.epic_id).await?;
                if epic.status == ScoringStatus::InProgress {
                    let completion = self.engine.try_complete_epic(epic.id).await?;
                    if completion.is_completed() {
                        text.push('\n');
                        text.push_str(&render::epic_progress(&epic, &completion));
                    }
                }
                say(text)
            }
            ConfirmAction::DeleteUser => {
                let who = repo.get_participant(id).await?;
                let teams: Vec<Uuid> = repo
                    .list_participant_teams(id)
                    .await?
                    .iter()
                    .map(|t| t.id)
                    .collect();
                repo.delete_participant(id).await?;
                info!(participant_id = %id, "participant deleted");
                let mut text = format!("{} deleted", participant_label(&who));
                self.recheck_teams(&teams, &mut text).await?;
                say(text)
            }
        }
    }

    /// Complete whatever the smaller rosters of `teams` now allow, noting each
    /// completed epic on its own line of `text`.
    async fn recheck_teams(&self, teams: &[Uuid], text: &mut String) -> Result<(), ChatError> {
        for &team_id in teams {
            for (epic, score) in self.engine.recheck_team(team_id).await? {
                text.push('\n');
                text.push_str(&render::epic_progress(
                    &epic,
                    &Completion::Completed { score },
                ));
            }
        }
        Ok(())
    }

    /// The participant stashed by a user picker.
    async fn pending_participant(&self, caller: &Caller<'_>) -> Result<Participant, ChatError> {
        let id = self
            .sessions
            .get(caller.conversation)
            .and_then(|s| s.get(keys::PARTICIPANT).and_then(|v| Uuid::parse_str(v).ok()))
            .ok_or(ChatError::SessionExpired)?;
        Ok(self.engine.repo().get_participant(id).await?)
    }

    /// Risks of `epic` the participant still has to assess.
    pub(super) async fn risk_menu(&self, me: &Participant, epic: &Epic) -> Result<Outbound, ChatError> {
        let risks = self
            .engine
            .repo()
            .list_risks_pending_for(me.id, epic.id)
            .await?;
        if risks.is_empty() {
            return Ok(Outbound::text(format!(
                "You have nothing left to assess in {}",
                epic_label(epic)
            )));
        }
        let items = risks
            .iter()
            .map(|r| (risk_label(r), Action::Risk(RiskAction::Score, r.id)));
        self.menu(format!("Risks of {} to assess:", epic_label(epic)), items)
    }
}

fn ensure_scoring(risk: &Risk) -> Result<(), ChatError> {
    if risk.status.accepts_assessments() {
        Ok(())
    } else {
        Err(ChatError::Invalid(format!(
            "This risk is not open for scoring (status: {})",
            risk.status
        )))
    }
}

fn scratch(key: &str, id: Uuid) -> HashMap<String, String> {
    HashMap::from([(key.to_string(), id.to_string())])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scratch_holds_one_id() {
        let id = Uuid::new_v4();
        let data = scratch(keys::EPIC, id);
        assert_eq!(data.len(), 1);
        assert_eq!(data.get(keys::EPIC), Some(&id.to_string()));
    }
}
