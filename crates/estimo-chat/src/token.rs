//! Action token codec.
//!
//! Choice buttons carry a short ASCII token naming what a click does:
//!
//! ```text
//! <domain>_<action>_<id>
//! <domain>_<action>_<id1>_<id2>
//! cancel
//! ```
//!
//! Ids are canonical 36-character hyphenated UUIDs. The action may itself
//! contain underscores, so decoding anchors on the fixed-width id suffix
//! instead of splitting on `_`. Tokens longer than the configured ceiling are
//! rejected both ways; at the default ceiling of 64 bytes a token holds one id,
//! and flows that need a second entity stash it in the session instead.

use std::fmt;
use std::str::FromStr;

use estimo_config::MIN_TOKEN_LEN;
use uuid::Uuid;

/// Width of a hyphenated UUID.
pub const ID_LEN: usize = 36;

/// The distinguished token that aborts any pending flow.
pub const CANCEL: &str = "cancel";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token is {len} bytes, over the {max}-byte limit")]
    TooLong { len: usize, max: usize },

    #[error("unknown token domain: {0}")]
    UnknownDomain(String),

    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("invalid id in token: {0}")]
    InvalidId(String),

    #[error("unknown {domain} action: {action}")]
    UnknownAction { domain: Domain, action: String },
}

/// Entity family a token acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    User,
    Role,
    Team,
    Epic,
    Risk,
    Confirm,
}

impl Domain {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Role => "role",
            Self::Team => "team",
            Self::Epic => "epic",
            Self::Risk => "risk",
            Self::Confirm => "confirm",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "role" => Ok(Self::Role),
            "team" => Ok(Self::Team),
            "epic" => Ok(Self::Epic),
            "risk" => Ok(Self::Risk),
            "confirm" => Ok(Self::Confirm),
            other => Err(TokenError::UnknownDomain(other.to_string())),
        }
    }
}

/// A decoded `<domain>_<action>_<id>[_<id>]` token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionToken {
    pub domain: Domain,
    pub action: String,
    pub id: Uuid,
    /// The trailing id of a two-id token.
    pub second: Option<Uuid>,
}

/// Anything a click can carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Cancel,
    Action(ActionToken),
}

/// Encoder/decoder bound to a maximum token length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenCodec {
    max_len: usize,
}

impl Default for TokenCodec {
    fn default() -> Self {
        Self { max_len: 64 }
    }
}

impl TokenCodec {
    /// A codec with the given ceiling, raised to [`MIN_TOKEN_LEN`] if lower.
    #[must_use]
    pub fn new(max_len: usize) -> Self {
        Self {
            max_len: max_len.max(MIN_TOKEN_LEN),
        }
    }

    #[must_use]
    pub const fn max_len(&self) -> usize {
        self.max_len
    }

    /// Encode a single-id token.
    ///
    /// # Errors
    ///
    /// `Malformed` for an empty or non-ASCII action, `TooLong` over the ceiling.
    pub fn encode(&self, domain: Domain, action: &str, id: Uuid) -> Result<String, TokenError> {
        check_action(action)?;
        self.bounded(format!("{domain}_{action}_{}", id.hyphenated()))
    }

    /// Encode a two-id token.
    ///
    /// # Errors
    ///
    /// Same as [`Self::encode`]; two ids only fit under a raised ceiling.
    pub fn encode_pair(
        &self,
        domain: Domain,
        action: &str,
        id: Uuid,
        second: Uuid,
    ) -> Result<String, TokenError> {
        check_action(action)?;
        self.bounded(format!(
            "{domain}_{action}_{}_{}",
            id.hyphenated(),
            second.hyphenated()
        ))
    }

    #[must_use]
    pub fn cancel(&self) -> String {
        CANCEL.to_string()
    }

    /// Decode a token.
    ///
    /// # Errors
    ///
    /// `TooLong`, `UnknownDomain`, `Malformed` when the remainder after the
    /// domain cannot hold an action plus an id, and `InvalidId` when an id
    /// segment does not parse.
    pub fn decode(&self, token: &str) -> Result<Token, TokenError> {
        if token.len() > self.max_len {
            return Err(TokenError::TooLong {
                len: token.len(),
                max: self.max_len,
            });
        }
        if token == CANCEL {
            return Ok(Token::Cancel);
        }
        if !token.is_ascii() {
            return Err(TokenError::Malformed("non-ASCII token".into()));
        }

        let (domain, rest) = token
            .split_once('_')
            .ok_or_else(|| TokenError::Malformed(format!("no domain separator in {token:?}")))?;
        let domain: Domain = domain.parse()?;

        let (head, id) = split_id(rest)
            .ok_or_else(|| TokenError::Malformed(format!("{token:?} is too short")))?;
        let id = parse_id(id)?;

        let token = match split_id(head) {
            Some((action, first)) if Uuid::try_parse(first).is_ok() => ActionToken {
                domain,
                action: action.to_string(),
                id: parse_id(first)?,
                second: Some(id),
            },
            _ => ActionToken {
                domain,
                action: head.to_string(),
                id,
                second: None,
            },
        };
        Ok(Token::Action(token))
    }

    fn bounded(&self, token: String) -> Result<String, TokenError> {
        if token.len() > self.max_len {
            return Err(TokenError::TooLong {
                len: token.len(),
                max: self.max_len,
            });
        }
        Ok(token)
    }
}

/// Split `<head>_<id36>` into `(head, id)`; `None` unless `head` is non-empty.
fn split_id(s: &str) -> Option<(&str, &str)> {
    if s.len() < ID_LEN + 2 {
        return None;
    }
    let (head, id) = s.split_at(s.len() - ID_LEN);
    let head = head.strip_suffix('_')?;
    if head.is_empty() {
        return None;
    }
    Some((head, id))
}

fn parse_id(s: &str) -> Result<Uuid, TokenError> {
    Uuid::try_parse(s).map_err(|_| TokenError::InvalidId(s.to_string()))
}

fn check_action(action: &str) -> Result<(), TokenError> {
    if action.is_empty() || !action.is_ascii() {
        return Err(TokenError::Malformed(format!("bad action {action:?}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ID: &str = "3fa85f64-5717-4562-b3fc-2c963f66afa6";
    const OTHER: &str = "9b2d7c1e-0a4f-4c3b-8e21-5f6a7b8c9d0e";

    fn id() -> Uuid {
        Uuid::parse_str(ID).unwrap()
    }

    fn action(token: Token) -> ActionToken {
        match token {
            Token::Action(a) => a,
            Token::Cancel => panic!("expected an action token"),
        }
    }

    #[test]
    fn round_trips_action_with_underscores() {
        let codec = TokenCodec::default();
        let token = codec.encode(Domain::Epic, "deleteepic", id()).unwrap();
        assert_eq!(token, format!("epic_deleteepic_{ID}"));

        let decoded = action(codec.decode(&token).unwrap());
        assert_eq!(
            decoded,
            ActionToken {
                domain: Domain::Epic,
                action: "deleteepic".into(),
                id: id(),
                second: None,
            }
        );

        let token = codec.encode(Domain::Risk, "prob_3", id()).unwrap();
        assert_eq!(action(codec.decode(&token).unwrap()).action, "prob_3");
    }

    #[test]
    fn cancel_is_distinguished() {
        let codec = TokenCodec::default();
        assert_eq!(codec.decode(&codec.cancel()).unwrap(), Token::Cancel);
    }

    #[test]
    fn two_ids_fit_only_under_a_raised_ceiling() {
        let other = Uuid::parse_str(OTHER).unwrap();
        let err = TokenCodec::default()
            .encode_pair(Domain::Role, "assign", id(), other)
            .unwrap_err();
        assert!(matches!(err, TokenError::TooLong { max: 64, .. }));

        let wide = TokenCodec::new(128);
        let token = wide.encode_pair(Domain::Role, "assign", id(), other).unwrap();
        let decoded = action(wide.decode(&token).unwrap());
        assert_eq!(decoded.action, "assign");
        assert_eq!(decoded.id, id());
        assert_eq!(decoded.second, Some(other));
    }

    #[test]
    fn shortest_possible_token_fits_the_minimum_ceiling() {
        let codec = TokenCodec::new(0);
        assert_eq!(codec.max_len(), MIN_TOKEN_LEN);
        let token = codec.encode(Domain::Confirm, "x", id()).unwrap();
        assert_eq!(token.len(), MIN_TOKEN_LEN);
        assert!(codec.decode(&token).is_ok());
    }

    #[test]
    fn rejects_overlong_tokens_on_decode() {
        let codec = TokenCodec::default();
        let token = format!("epic_{}_{ID}", "a".repeat(30));
        assert!(token.len() > 64);
        assert!(matches!(
            codec.decode(&token),
            Err(TokenError::TooLong { .. })
        ));
    }

    #[test]
    fn rejects_unknown_domain() {
        let codec = TokenCodec::default();
        assert_eq!(
            codec.decode(&format!("ticket_close_{ID}")),
            Err(TokenError::UnknownDomain("ticket".into()))
        );
    }

    #[test]
    fn rejects_short_id_segment() {
        let codec = TokenCodec::default();
        let short = &ID[..30];
        assert!(matches!(
            codec.decode(&format!("epic_results_{short}")),
            Err(TokenError::InvalidId(_) | TokenError::Malformed(_))
        ));
        assert!(matches!(
            codec.decode(&format!("epic_{ID}")),
            Err(TokenError::Malformed(_))
        ));
        assert!(matches!(
            codec.decode(&format!("epic__{ID}")),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn rejects_corrupted_id_segment() {
        let codec = TokenCodec::default();
        let corrupted = ID.replace('a', "z");
        assert!(matches!(
            codec.decode(&format!("epic_deleteepic_{corrupted}")),
            Err(TokenError::InvalidId(_))
        ));
    }

    #[test]
    fn rejects_missing_separators() {
        let codec = TokenCodec::default();
        assert!(matches!(codec.decode("epic"), Err(TokenError::Malformed(_))));
        assert!(matches!(
            codec.decode(&format!("epic_results{ID}")),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn rejects_empty_action_on_encode() {
        assert!(matches!(
            TokenCodec::default().encode(Domain::User, "", id()),
            Err(TokenError::Malformed(_))
        ));
    }
}
