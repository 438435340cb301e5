//! # estimo-chat
//!
//! Transport-neutral conversation layer for Estimo.
//!
//! - [`session`]: per-conversation state for multi-step flows, with a sliding TTL
//! - [`token`]: the bounded-length action token codec carried by choice buttons
//! - [`action`]: closed per-domain action enums decoded from tokens
//! - [`router`]: turns inbound commands, free text, and clicks into replies
//!
//! A transport (the `est console` loop, a chat bot adapter) only has to map its
//! own events onto [`Inbound`] and render each [`Outbound`] it gets back.

pub mod action;
pub mod error;
pub mod router;
pub mod session;
pub mod token;

pub use action::Action;
pub use error::ChatError;
pub use router::{Choice, Event, Inbound, Outbound, Router};
pub use session::{ConversationId, Session, SessionStore, Step};
pub use token::{ActionToken, Domain, Token, TokenCodec, TokenError};
