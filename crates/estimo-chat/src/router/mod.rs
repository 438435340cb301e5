//! Conversation router.
//!
//! [`Router::handle`] takes one inbound event and returns the replies for it.
//! Commands start flows (and discard whatever flow was pending), free text
//! answers the prompt the session is waiting on, and clicks carry an action
//! token from a previously shown menu.
//!
//! Errors never escape `handle`: each one becomes a single reply. A storage
//! failure also clears the conversation's session so the participant starts
//! over from a clean state.

mod clicks;
mod commands;
pub(crate) mod render;
mod steps;

pub use commands::Command;

use std::sync::Arc;

use estimo_config::{AccessPolicy, EstimoConfig, normalize_handle};
use estimo_core::entities::Participant;
use estimo_core::repository::{ParticipantRepo, Repository};
use estimo_engine::ScoringEngine;
use tracing::{debug, warn};

use crate::action::{Access, Action};
use crate::error::ChatError;
use crate::session::{ConversationId, SessionStore};
use crate::token::TokenCodec;

/// One event from a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub conversation: ConversationId,
    /// Handle of whoever sent the event, with or without a leading `@`.
    pub sender: String,
    pub event: Event,
}

impl Inbound {
    pub fn command(
        conversation: impl Into<ConversationId>,
        sender: impl Into<String>,
        name: impl Into<String>,
        args: impl Into<String>,
    ) -> Self {
        Self {
            conversation: conversation.into(),
            sender: sender.into(),
            event: Event::Command {
                name: name.into(),
                args: args.into(),
            },
        }
    }

    pub fn text(
        conversation: impl Into<ConversationId>,
        sender: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            conversation: conversation.into(),
            sender: sender.into(),
            event: Event::Text(text.into()),
        }
    }

    pub fn click(
        conversation: impl Into<ConversationId>,
        sender: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            conversation: conversation.into(),
            sender: sender.into(),
            event: Event::Click(token.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// `/name args`; `name` has no leading slash.
    Command { name: String, args: String },
    Text(String),
    /// A token taken from a [`Choice`].
    Click(String),
}

/// One reply, optionally with a menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub text: String,
    pub choices: Vec<Choice>,
}

impl Outbound {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            choices: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub label: String,
    pub token: String,
}

type Replies = Result<Vec<Outbound>, ChatError>;

/// Who sent the event being handled, and where.
struct Caller<'a> {
    conversation: &'a ConversationId,
    handle: String,
    access: Access,
}

pub struct Router<R> {
    engine: ScoringEngine<R>,
    sessions: SessionStore,
    policy: Arc<AccessPolicy>,
    codec: TokenCodec,
}

impl<R: Repository> Router<R> {
    pub const fn new(
        engine: ScoringEngine<R>,
        sessions: SessionStore,
        policy: Arc<AccessPolicy>,
        codec: TokenCodec,
    ) -> Self {
        Self {
            engine,
            sessions,
            policy,
            codec,
        }
    }

    /// Wire a router from loaded configuration.
    pub fn from_config(repo: Arc<R>, config: &EstimoConfig) -> Self {
        Self::new(
            ScoringEngine::new(repo),
            SessionStore::new(config.session.ttl()),
            Arc::new(config.access_policy()),
            TokenCodec::new(config.transport.max_token_len),
        )
    }

    #[must_use]
    pub const fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    #[must_use]
    pub const fn engine(&self) -> &ScoringEngine<R> {
        &self.engine
    }

    /// Handle one event and return the replies for it.
    ///
    /// Sessions are keyed by conversation, not by sender. In a shared chat
    /// anyone may answer a pending prompt. Admin steps still check the
    /// answering sender's access. An effort answer is filed under the
    /// answering sender, and it is accepted only if that sender is on the
    /// epic's team.
    pub async fn handle(&self, inbound: Inbound) -> Vec<Outbound> {
        let Inbound {
            conversation,
            sender,
            event,
        } = inbound;
        let caller = self.caller(&conversation, &sender);

        let result = match event {
            Event::Command { name, args } => {
                self.sessions.clear(&conversation);
                self.on_command(&caller, &name, args.trim()).await
            }
            Event::Text(text) => self.on_text(&caller, text.trim()).await,
            Event::Click(token) => self.on_click(&caller, token.trim()).await,
        };

        match result {
            Ok(replies) => replies,
            Err(err) => {
                if err.is_storage() {
                    self.sessions.clear(&conversation);
                    warn!(conversation = %conversation, error = %err, "persistence failed");
                } else {
                    debug!(conversation = %conversation, error = %err, "request rejected");
                }
                vec![Outbound::text(err.reply_text())]
            }
        }
    }

    fn caller<'a>(&self, conversation: &'a ConversationId, sender: &str) -> Caller<'a> {
        let access = if self.policy.is_super_admin(sender) {
            Access::SuperAdmin
        } else if self.policy.is_admin(sender) {
            Access::Admin
        } else {
            Access::Anyone
        };
        Caller {
            conversation,
            handle: normalize_handle(sender),
            access,
        }
    }

    fn require(caller: &Caller<'_>, needed: Access, what: impl FnOnce() -> String) -> Result<(), ChatError> {
        if caller.access >= needed {
            Ok(())
        } else {
            Err(ChatError::Forbidden(what()))
        }
    }

    /// The registered participant behind the caller's handle.
    async fn participant(&self, caller: &Caller<'_>) -> Result<Participant, ChatError> {
        self.engine
            .repo()
            .find_participant_by_handle(&caller.handle)
            .await?
            .ok_or_else(|| ChatError::NotRegistered(caller.handle.clone()))
    }

    /// A reply with one choice per item plus a trailing cancel choice.
    fn menu(
        &self,
        text: impl Into<String>,
        items: impl IntoIterator<Item = (String, Action)>,
    ) -> Result<Outbound, ChatError> {
        let mut choices = items
            .into_iter()
            .map(|(label, action)| {
                Ok(Choice {
                    label,
                    token: action.encode(&self.codec)?,
                })
            })
            .collect::<Result<Vec<_>, ChatError>>()?;
        choices.push(Choice {
            label: "Cancel".into(),
            token: Action::Cancel.encode(&self.codec)?,
        });
        Ok(Outbound {
            text: text.into(),
            choices,
        })
    }
}

/// Reply with a single plain message.
fn say(text: impl Into<String>) -> Replies {
    Ok(vec![Outbound::text(text)])
}
