//! Top-level commands. Each one starts from a cleared session.

use std::collections::HashMap;

use estimo_core::entities::Epic;
use estimo_core::enums::ScoringStatus;
use estimo_core::repository::{EpicRepo, ParticipantRepo, Repository, RoleRepo, TeamRepo};
use tracing::info;

use super::render::{self, epic_label, participant_label};
use super::{Caller, Replies, Router, say};
use crate::action::{Access, Action, EpicAction, TeamAction, UserAction};
use crate::error::ChatError;
use crate::session::Step;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Help,
    AddRole,
    AddTeam,
    AddUser,
    AssignRole,
    UnassignRole,
    AssignTeam,
    RemoveFromTeam,
    RenameUser,
    ChangeWeight,
    AddEpic,
    AddRisk,
    StartScore,
    Score,
    Results,
    Status,
    Members,
    DeleteEpic,
    DeleteRisk,
    DeleteUser,
}

impl Command {
    /// Parse a command name, with or without the leading slash.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim().trim_start_matches('/').to_lowercase();
        let command = match name.as_str() {
            "help" | "start" => Self::Help,
            "addrole" => Self::AddRole,
            "addteam" => Self::AddTeam,
            "adduser" => Self::AddUser,
            "assignrole" => Self::AssignRole,
            "unassignrole" => Self::UnassignRole,
            "assignteam" => Self::AssignTeam,
            "removefromteam" => Self::RemoveFromTeam,
            "renameuser" => Self::RenameUser,
            "changeweight" | "changerate" => Self::ChangeWeight,
            "addepic" => Self::AddEpic,
            "addrisk" => Self::AddRisk,
            "startscore" => Self::StartScore,
            "score" => Self::Score,
            "results" => Self::Results,
            "status" | "epicstatus" => Self::Status,
            "members" | "list" => Self::Members,
            "deleteepic" => Self::DeleteEpic,
            "deleterisk" => Self::DeleteRisk,
            "deleteuser" => Self::DeleteUser,
            _ => return None,
        };
        Some(command)
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Help => "help",
            Self::AddRole => "addrole",
            Self::AddTeam => "addteam",
            Self::AddUser => "adduser",
            Self::AssignRole => "assignrole",
            Self::UnassignRole => "unassignrole",
            Self::AssignTeam => "assignteam",
            Self::RemoveFromTeam => "removefromteam",
            Self::RenameUser => "renameuser",
            Self::ChangeWeight => "changeweight",
            Self::AddEpic => "addepic",
            Self::AddRisk => "addrisk",
            Self::StartScore => "startscore",
            Self::Score => "score",
            Self::Results => "results",
            Self::Status => "status",
            Self::Members => "members",
            Self::DeleteEpic => "deleteepic",
            Self::DeleteRisk => "deleterisk",
            Self::DeleteUser => "deleteuser",
        }
    }

    #[must_use]
    pub const fn access(self) -> Access {
        match self {
            Self::Help | Self::Score | Self::Status => Access::Anyone,
            Self::DeleteEpic | Self::DeleteRisk | Self::DeleteUser => Access::SuperAdmin,
            _ => Access::Admin,
        }
    }
}

impl<R: Repository> Router<R> {
    pub(super) async fn on_command(&self, caller: &Caller<'_>, name: &str, args: &str) -> Replies {
        let command = Command::parse(name)
            .ok_or_else(|| ChatError::UnknownCommand(name.trim_start_matches('/').to_string()))?;
        Self::require(caller, command.access(), || format!("/{}", command.name()))?;

        match command {
            Command::Help => say(render::help(caller.access)),
            Command::AddRole => self.add_role(args).await,
            Command::AddTeam => self.add_team(args).await,
            Command::AddUser => {
                self.sessions
                    .set(caller.conversation, Step::AddUserHandle, HashMap::new());
                say("Enter the participant's handle (for example @ann):")
            }
            Command::AssignRole => self.user_picker(UserAction::AssignRole, "assign a role to").await,
            Command::UnassignRole => {
                self.user_picker(UserAction::UnassignRole, "remove a role from").await
            }
            Command::AssignTeam => self.user_picker(UserAction::AssignTeam, "add to a team").await,
            Command::RemoveFromTeam => {
                self.user_picker(UserAction::RemoveFromTeam, "remove from a team").await
            }
            Command::RenameUser => self.user_picker(UserAction::Rename, "rename").await,
            Command::ChangeWeight => {
                self.user_picker(UserAction::ChangeWeight, "re-weight").await
            }
            Command::DeleteUser => self.user_picker(UserAction::Delete, "delete").await,
            Command::AddEpic => self.team_picker(TeamAction::AddEpic, "Which team owns the new epic?").await,
            Command::Members => self.team_picker(TeamAction::Members, "Which team?").await,
            Command::AddRisk => {
                let mut epics = self.epics_with_status(ScoringStatus::New).await?;
                epics.extend(self.epics_with_status(ScoringStatus::InProgress).await?);
                self.epic_picker(epics, EpicAction::AddRisk, "Add a risk to which epic?")
            }
            Command::StartScore => {
                let epics = self.epics_with_status(ScoringStatus::New).await?;
                self.epic_picker(epics, EpicAction::StartScore, "Open which epic for scoring?")
            }
            Command::Results => {
                let epics = self.epics_with_status(ScoringStatus::Complete).await?;
                self.epic_picker(epics, EpicAction::Results, "Results of which epic?")
            }
            Command::Status => {
                let epics = self.epics_with_status(ScoringStatus::InProgress).await?;
                self.epic_picker(epics, EpicAction::Status, "Progress of which epic?")
            }
            Command::DeleteEpic => {
                let epics = self.engine.repo().list_epics().await?;
                self.epic_picker(epics, EpicAction::Delete, "Delete which epic?")
            }
            Command::DeleteRisk => {
                let epics = self.engine.repo().list_epics().await?;
                self.epic_picker(epics, EpicAction::DeleteRisk, "Delete a risk of which epic?")
            }
            Command::Score => self.score_menu(caller).await,
        }
    }

    async fn add_role(&self, name: &str) -> Replies {
        if name.is_empty() {
            return Err(ChatError::Usage("/addrole <name>"));
        }
        let role = self.engine.repo().create_role(name, None).await?;
        info!(role_id = %role.id, name = %role.name, "role created");
        say(format!("Role {} created", role.name))
    }

    async fn add_team(&self, name: &str) -> Replies {
        if name.is_empty() {
            return Err(ChatError::Usage("/addteam <name>"));
        }
        let team = self.engine.repo().create_team(name, None).await?;
        info!(team_id = %team.id, name = %team.name, "team created");
        say(format!("Team {} created", team.name))
    }

    async fn user_picker(&self, action: UserAction, purpose: &str) -> Replies {
        let participants = self.engine.repo().list_participants().await?;
        if participants.is_empty() {
            return say("No participants registered yet, use /adduser first");
        }
        let items = participants
            .iter()
            .map(|p| (participant_label(p), Action::User(action, p.id)));
        Ok(vec![self.menu(format!("Choose a participant to {purpose}:"), items)?])
    }

    async fn team_picker(&self, action: TeamAction, prompt: &str) -> Replies {
        let teams = self.engine.repo().list_teams().await?;
        if teams.is_empty() {
            return say("No teams yet, create one with /addteam <name>");
        }
        let items = teams
            .into_iter()
            .map(|t| (t.name, Action::Team(action, t.id)));
        Ok(vec![self.menu(prompt, items)?])
    }

    async fn epics_with_status(&self, status: ScoringStatus) -> Result<Vec<Epic>, ChatError> {
        Ok(self.engine.repo().list_epics_by_status(status).await?)
    }

    fn epic_picker(&self, epics: Vec<Epic>, action: EpicAction, prompt: &str) -> Replies {
        if epics.is_empty() {
            return say("No matching epics");
        }
        let items = epics
            .iter()
            .map(|e| (epic_label(e), Action::Epic(action, e.id)));
        Ok(vec![self.menu(prompt, items)?])
    }

    /// `/score`: the caller's teams.
    async fn score_menu(&self, caller: &Caller<'_>) -> Replies {
        let me = self.participant(caller).await?;
        let teams = self.engine.repo().list_participant_teams(me.id).await?;
        if teams.is_empty() {
            return say("You are not a member of any team");
        }
        let items = teams
            .into_iter()
            .map(|t| (t.name, Action::Team(TeamAction::Score, t.id)));
        Ok(vec![self.menu(
            format!("{}, choose a team:", me.display_name()),
            items,
        )?])
    }
}
