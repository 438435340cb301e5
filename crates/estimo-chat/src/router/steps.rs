//! Free-text answers to the prompt a session is waiting on.
//!
//! Invalid input keeps the session where it was so the participant can try
//! again. The final step of each flow clears the session before it writes.

use estimo_config::normalize_handle;
use estimo_core::entities::{NewEpic, NewParticipant};
use estimo_core::inputs::{EffortValue, Weight};
use estimo_core::repository::{EpicRepo, ParticipantRepo, Repository};
use tracing::info;
use uuid::Uuid;

use super::render::{self, epic_label};
use super::{Caller, Outbound, Replies, Router, say};
use crate::action::Access;
use crate::error::ChatError;
use crate::session::{Session, Step, keys};

impl<R: Repository> Router<R> {
    pub(super) async fn on_text(&self, caller: &Caller<'_>, text: &str) -> Replies {
        let Some(session) = self.sessions.get(caller.conversation) else {
            return Ok(Vec::new());
        };
        if !session.step.expects_text() {
            return Err(ChatError::Invalid(
                "Pick one of the options above, or start over with a command".into(),
            ));
        }
        let needed = if session.step == Step::ScoreEffort {
            Access::Anyone
        } else {
            Access::Admin
        };
        Self::require(caller, needed, || "this step".to_string())?;
        self.sessions.touch(caller.conversation);

        let conversation = caller.conversation;
        match session.step {
            Step::AddUserHandle => {
                let handle = normalize_handle(text);
                if handle.is_empty() || handle.contains(char::is_whitespace) {
                    return Err(ChatError::Invalid(
                        "Enter a single handle such as @ann:".into(),
                    ));
                }
                if self
                    .engine
                    .repo()
                    .find_participant_by_handle(&handle)
                    .await?
                    .is_some()
                {
                    return Err(ChatError::Invalid(format!(
                        "@{handle} is already registered, enter another handle:"
                    )));
                }
                self.sessions.stash(conversation, keys::HANDLE, handle);
                self.sessions.advance(conversation, Step::AddUserFirstName);
                say("First name:")
            }
            Step::AddUserFirstName => {
                let first = non_empty(text, "First name")?;
                self.sessions.stash(conversation, keys::FIRST_NAME, first);
                self.sessions.advance(conversation, Step::AddUserLastName);
                say("Last name:")
            }
            Step::AddUserLastName => {
                let last = non_empty(text, "Last name")?;
                self.sessions.stash(conversation, keys::LAST_NAME, last);
                self.sessions.advance(conversation, Step::AddUserWeight);
                say("Weight (0-100):")
            }
            Step::AddUserWeight => {
                let weight: Weight = text.parse()?;
                let new = NewParticipant {
                    handle: field(&session, keys::HANDLE)?.to_string(),
                    first_name: field(&session, keys::FIRST_NAME)?.to_string(),
                    last_name: field(&session, keys::LAST_NAME)?.to_string(),
                    weight,
                };
                self.sessions.clear(conversation);
                let p = self.engine.repo().create_participant(new).await?;
                info!(participant_id = %p.id, handle = %p.handle, "participant registered");
                say(format!(
                    "{} (@{}) registered with weight {}",
                    p.display_name(),
                    p.handle,
                    p.weight
                ))
            }
            Step::RenameFirstName => {
                let first = non_empty(text, "First name")?;
                self.sessions.stash(conversation, keys::FIRST_NAME, first);
                self.sessions.advance(conversation, Step::RenameLastName);
                say("New last name:")
            }
            Step::RenameLastName => {
                let last = non_empty(text, "Last name")?;
                let id = id_field(&session, keys::PARTICIPANT)?;
                let first = field(&session, keys::FIRST_NAME)?;
                self.sessions.clear(conversation);
                let p = self
                    .engine
                    .repo()
                    .rename_participant(id, first, last)
                    .await?;
                info!(participant_id = %p.id, "participant renamed");
                say(format!("@{} is now {}", p.handle, p.display_name()))
            }
            Step::ChangeWeight => {
                let weight: Weight = text.parse()?;
                let id = id_field(&session, keys::PARTICIPANT)?;
                self.sessions.clear(conversation);
                let p = self
                    .engine
                    .repo()
                    .update_participant_weight(id, weight)
                    .await?;
                info!(participant_id = %p.id, weight = p.weight.get(), "weight changed");
                say(format!("@{} now has weight {}", p.handle, p.weight))
            }
            Step::AddEpicNumber => {
                let number = non_empty(text, "Epic number")?;
                if self
                    .engine
                    .repo()
                    .find_epic_by_number(number)
                    .await?
                    .is_some()
                {
                    return Err(ChatError::Invalid(format!(
                        "Epic #{number} already exists, enter another number:"
                    )));
                }
                self.sessions.stash(conversation, keys::NUMBER, number);
                self.sessions.advance(conversation, Step::AddEpicName);
                say("Epic name:")
            }
            Step::AddEpicName => {
                let name = non_empty(text, "Epic name")?;
                self.sessions.stash(conversation, keys::NAME, name);
                self.sessions.advance(conversation, Step::AddEpicDescription);
                say("Description (or - to skip):")
            }
            Step::AddEpicDescription => {
                let new = NewEpic {
                    number: field(&session, keys::NUMBER)?.to_string(),
                    name: field(&session, keys::NAME)?.to_string(),
                    description: (!text.is_empty() && text != "-").then(|| text.to_string()),
                    team_id: id_field(&session, keys::TEAM)?,
                };
                self.sessions.clear(conversation);
                let epic = self.engine.repo().create_epic(new).await?;
                info!(epic_id = %epic.id, number = %epic.number, "epic created");
                say(format!(
                    "Epic {} created (status: {})",
                    epic_label(&epic),
                    epic.status
                ))
            }
            Step::AddRiskDescription => {
                let description = non_empty(text, "Risk description")?;
                let epic_id = id_field(&session, keys::EPIC)?;
                self.sessions.clear(conversation);
                let risk = self.engine.add_risk(epic_id, description).await?;
                let epic = self.engine.repo().get_epic(epic_id).await?;
                info!(risk_id = %risk.id, epic_id = %epic_id, "risk added");
                let suffix = if risk.status.accepts_assessments() {
                    " and opened for scoring"
                } else {
                    ""
                };
                say(format!("Risk added to epic {}{suffix}", epic_label(&epic)))
            }
            Step::ScoreEffort => {
                let value: EffortValue = text.parse()?;
                let epic_id = id_field(&session, keys::EPIC)?;
                self.sessions.clear(conversation);
                let me = self.participant(caller).await?;
                let completion = self.engine.submit_effort(epic_id, me.id, value).await?;
                let epic = self.engine.repo().get_epic(epic_id).await?;
                let text = format!(
                    "Effort {value} recorded for {}\n{}",
                    epic_label(&epic),
                    render::epic_progress(&epic, &completion)
                );
                Ok(vec![Outbound::text(text), self.risk_menu(&me, &epic).await?])
            }
            Step::AwaitingChoice | Step::RiskImpact => Ok(Vec::new()),
        }
    }
}

fn non_empty<'t>(text: &'t str, what: &str) -> Result<&'t str, ChatError> {
    if text.is_empty() {
        Err(ChatError::Invalid(format!("{what} cannot be empty, try again:")))
    } else {
        Ok(text)
    }
}

/// A scratch entry an earlier step wrote; missing means the flow was lost.
fn field<'s>(session: &'s Session, key: &str) -> Result<&'s str, ChatError> {
    session.get(key).ok_or(ChatError::SessionExpired)
}

fn id_field(session: &Session, key: &str) -> Result<Uuid, ChatError> {
    Uuid::parse_str(field(session, key)?).map_err(|_| ChatError::SessionExpired)
}
