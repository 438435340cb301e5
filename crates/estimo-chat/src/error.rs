//! Router error types.
//!
//! Every variant is rendered as a single reply; none of them ends the process.

use estimo_core::errors::CoreError;
use estimo_engine::EngineError;

use crate::token::TokenError;

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("this button is no longer valid ({0})")]
    Token(#[from] TokenError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Core(#[from] CoreError),

    /// Names the command or "this action".
    #[error("{0} is for administrators only")]
    Forbidden(String),

    #[error("unknown command /{0}, try /help")]
    UnknownCommand(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("session expired, repeat the command")]
    SessionExpired,

    #[error("@{0} is not registered, ask an administrator")]
    NotRegistered(String),

    /// Input rejected at a prompt; the flow stays where it was.
    #[error("{0}")]
    Invalid(String),
}

impl ChatError {
    /// Whether the backing store failed, as opposed to the request.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        match self {
            Self::Engine(e) => e.is_storage(),
            Self::Core(e) => e.is_storage(),
            _ => false,
        }
    }

    /// Text shown to the participant.
    #[must_use]
    pub fn reply_text(&self) -> String {
        if self.is_storage() {
            return "the operation failed, please try again later".into();
        }
        match self {
            Self::Engine(EngineError::Core(core)) | Self::Core(core) => friendly(core),
            other => other.to_string(),
        }
    }
}

fn friendly(err: &CoreError) -> String {
    match err {
        CoreError::NotFound { entity_type, .. } => format!("{entity_type} not found"),
        CoreError::Validation(msg) => msg.clone(),
        other => other.to_string(),
    }
}
