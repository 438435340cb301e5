//! In-memory conversation sessions.
//!
//! A session records where a conversation is inside a multi-step flow (which
//! prompt it answered last) plus a small string scratchpad carried between
//! steps. Sessions expire after a sliding TTL: every message that matches a
//! live session pushes its expiry forward.
//!
//! Expiry is evaluated lazily on read, so correctness never depends on
//! [`SessionStore::sweep_expired`] running. The store's lock is a plain
//! `std::sync::Mutex` and is never held across an `.await`.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

/// Well-known scratch keys shared by the router's flows.
pub mod keys {
    /// Participant chosen in a user picker, read back by role/team pickers.
    pub const PARTICIPANT: &str = "pending_participant";
    pub const TEAM: &str = "team";
    pub const EPIC: &str = "epic";
    pub const RISK: &str = "risk";
    pub const PROBABILITY: &str = "probability";
    pub const HANDLE: &str = "handle";
    pub const FIRST_NAME: &str = "first_name";
    pub const LAST_NAME: &str = "last_name";
    pub const NUMBER: &str = "number";
    pub const NAME: &str = "name";
}

/// Identifies one conversation (a chat, a thread, a console).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ConversationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// The prompt a conversation is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    /// A menu is showing; the next event should be a click.
    AwaitingChoice,
    AddUserHandle,
    AddUserFirstName,
    AddUserLastName,
    AddUserWeight,
    RenameFirstName,
    RenameLastName,
    ChangeWeight,
    AddEpicNumber,
    AddEpicName,
    AddEpicDescription,
    AddRiskDescription,
    ScoreEffort,
    /// Probability chosen and stashed; waiting for the impact click.
    RiskImpact,
}

impl Step {
    /// Whether this step consumes free text rather than clicks.
    #[must_use]
    pub const fn expects_text(self) -> bool {
        !matches!(self, Self::AwaitingChoice | Self::RiskImpact)
    }
}

/// A live session snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub step: Step,
    pub scratch: HashMap<String, String>,
    expires_at: Instant,
}

impl Session {
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.scratch.get(key).map(String::as_str)
    }

    #[must_use]
    pub const fn expires_at(&self) -> Instant {
        self.expires_at
    }

    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Conversation id → session, with a fixed sliding TTL.
#[derive(Debug)]
pub struct SessionStore {
    ttl: Duration,
    sessions: Mutex<HashMap<ConversationId, Session>>,
}

impl SessionStore {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Replace any existing session and restart its TTL.
    pub fn set(&self, conversation: &ConversationId, step: Step, scratch: HashMap<String, String>) {
        let session = Session {
            step,
            scratch,
            expires_at: Instant::now() + self.ttl,
        };
        self.lock().insert(conversation.clone(), session);
    }

    /// Move a live session to `step`, keeping its scratch. Starts a fresh
    /// session if none is live.
    pub fn advance(&self, conversation: &ConversationId, step: Step) {
        let now = Instant::now();
        let mut sessions = self.lock();
        let session = sessions
            .entry(conversation.clone())
            .or_insert_with(|| Session {
                step,
                scratch: HashMap::new(),
                expires_at: now,
            });
        if session.is_expired(now) {
            session.scratch.clear();
        }
        session.step = step;
        session.expires_at = now + self.ttl;
    }

    /// The live session, if any. Expired sessions are dropped here.
    pub fn get(&self, conversation: &ConversationId) -> Option<Session> {
        let now = Instant::now();
        let mut sessions = self.lock();
        let session = sessions.get(conversation)?;
        if session.is_expired(now) {
            sessions.remove(conversation);
            debug!(conversation = %conversation, "session expired");
            return None;
        }
        Some(session.clone())
    }

    /// Push a live session's expiry forward. Returns whether one was live.
    pub fn touch(&self, conversation: &ConversationId) -> bool {
        let now = Instant::now();
        let mut sessions = self.lock();
        match sessions.get_mut(conversation) {
            Some(session) if !session.is_expired(now) => {
                session.expires_at = now + self.ttl;
                true
            }
            _ => false,
        }
    }

    pub fn clear(&self, conversation: &ConversationId) {
        self.lock().remove(conversation);
    }

    /// Write one scratch entry into the live session, opening an
    /// [`Step::AwaitingChoice`] session if none is live.
    pub fn stash(&self, conversation: &ConversationId, key: &str, value: impl Into<String>) {
        let now = Instant::now();
        let mut sessions = self.lock();
        let session = sessions
            .entry(conversation.clone())
            .or_insert_with(|| Session {
                step: Step::AwaitingChoice,
                scratch: HashMap::new(),
                expires_at: now,
            });
        if session.is_expired(now) {
            session.step = Step::AwaitingChoice;
            session.scratch.clear();
        }
        session.scratch.insert(key.to_string(), value.into());
        session.expires_at = now + self.ttl;
    }

    /// Drop every expired session. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(now));
        before - sessions.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ConversationId, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TTL: Duration = Duration::from_secs(300);

    fn conv() -> ConversationId {
        ConversationId::from("chat-1")
    }

    fn scratch(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn get_returns_what_was_set() {
        let store = SessionStore::new(TTL);
        store.set(&conv(), Step::AddUserHandle, scratch(&[("a", "1")]));

        let session = store.get(&conv()).expect("live session");
        assert_eq!(session.step, Step::AddUserHandle);
        assert_eq!(session.get("a"), Some("1"));
    }

    #[tokio::test(start_paused = true)]
    async fn set_is_last_write_wins() {
        let store = SessionStore::new(TTL);
        store.set(&conv(), Step::AddUserHandle, scratch(&[("a", "1")]));
        store.set(&conv(), Step::ChangeWeight, HashMap::new());

        let session = store.get(&conv()).expect("live session");
        assert_eq!(session.step, Step::ChangeWeight);
        assert!(session.scratch.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn get_is_absent_after_ttl_without_clear() {
        let store = SessionStore::new(TTL);
        store.set(&conv(), Step::ScoreEffort, HashMap::new());

        tokio::time::advance(TTL - Duration::from_secs(1)).await;
        assert!(store.get(&conv()).is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(store.get(&conv()).is_none());
        assert!(store.is_empty(), "expired entry is dropped on read");
    }

    #[tokio::test(start_paused = true)]
    async fn touch_slides_the_window() {
        let store = SessionStore::new(TTL);
        store.set(&conv(), Step::AddEpicName, HashMap::new());

        tokio::time::advance(Duration::from_secs(200)).await;
        assert!(store.touch(&conv()));
        tokio::time::advance(Duration::from_secs(200)).await;
        assert!(store.get(&conv()).is_some(), "touch restarted the ttl");

        tokio::time::advance(TTL).await;
        assert!(!store.touch(&conv()));
        assert!(store.get(&conv()).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn stash_opens_a_choice_session() {
        let store = SessionStore::new(TTL);
        store.stash(&conv(), keys::PARTICIPANT, "p-1");

        let session = store.get(&conv()).expect("stash creates a session");
        assert_eq!(session.step, Step::AwaitingChoice);
        assert_eq!(session.get(keys::PARTICIPANT), Some("p-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn stash_keeps_existing_step_and_scratch() {
        let store = SessionStore::new(TTL);
        store.set(&conv(), Step::RiskImpact, scratch(&[(keys::RISK, "r")]));
        store.stash(&conv(), keys::PROBABILITY, "3");

        let session = store.get(&conv()).expect("live session");
        assert_eq!(session.step, Step::RiskImpact);
        assert_eq!(session.get(keys::RISK), Some("r"));
        assert_eq!(session.get(keys::PROBABILITY), Some("3"));
    }

    #[tokio::test(start_paused = true)]
    async fn stash_into_expired_session_starts_over() {
        let store = SessionStore::new(TTL);
        store.set(&conv(), Step::RenameLastName, scratch(&[("old", "x")]));
        tokio::time::advance(TTL).await;

        store.stash(&conv(), "new", "y");
        let session = store.get(&conv()).expect("live session");
        assert_eq!(session.step, Step::AwaitingChoice);
        assert_eq!(session.get("old"), None);
        assert_eq!(session.get("new"), Some("y"));
    }

    #[tokio::test(start_paused = true)]
    async fn advance_keeps_scratch() {
        let store = SessionStore::new(TTL);
        store.stash(&conv(), keys::PARTICIPANT, "p-1");
        store.advance(&conv(), Step::RenameFirstName);

        let session = store.get(&conv()).expect("live session");
        assert_eq!(session.step, Step::RenameFirstName);
        assert_eq!(session.get(keys::PARTICIPANT), Some("p-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn clear_removes_state() {
        let store = SessionStore::new(TTL);
        store.set(&conv(), Step::AddRiskDescription, HashMap::new());
        store.clear(&conv());
        assert!(store.get(&conv()).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_drops_only_expired() {
        let store = SessionStore::new(TTL);
        store.set(&ConversationId::from("old"), Step::AddUserHandle, HashMap::new());
        tokio::time::advance(Duration::from_secs(250)).await;
        store.set(&ConversationId::from("fresh"), Step::AddUserHandle, HashMap::new());
        tokio::time::advance(Duration::from_secs(100)).await;

        assert_eq!(store.sweep_expired(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.get(&ConversationId::from("fresh")).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn conversations_are_isolated() {
        let store = SessionStore::new(TTL);
        store.set(&ConversationId::from("a"), Step::ChangeWeight, HashMap::new());
        assert!(store.get(&ConversationId::from("b")).is_none());
        store.clear(&ConversationId::from("b"));
        assert!(store.get(&ConversationId::from("a")).is_some());
    }

    #[test]
    fn only_menu_steps_wait_for_clicks() {
        assert!(!Step::AwaitingChoice.expects_text());
        assert!(!Step::RiskImpact.expects_text());
        assert!(Step::ScoreEffort.expects_text());
        assert!(Step::AddEpicDescription.expects_text());
    }
}
