//! Typed actions carried by choice tokens.
//!
//! Every token domain has a closed set of actions. The router matches on
//! [`Action`] exhaustively, so an action added here does not compile until
//! every dispatch site handles it.

use estimo_core::inputs::RiskFactor;
use uuid::Uuid;

use crate::token::{ActionToken, Domain, Token, TokenCodec, TokenError};

/// Who may trigger a command or an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Access {
    Anyone,
    Admin,
    SuperAdmin,
}

/// Unit-variant action enums with a fixed wire name per variant.
macro_rules! wire_actions {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $wire),+
                }
            }

            #[must_use]
            pub fn parse(s: &str) -> Option<Self> {
                match s {
                    $($wire => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

wire_actions! {
    /// Picked from a user menu.
    UserAction {
        AssignRole => "assignrole",
        UnassignRole => "unassignrole",
        AssignTeam => "assignteam",
        RemoveFromTeam => "removefromteam",
        Rename => "rename",
        ChangeWeight => "changeweight",
        Delete => "delete",
    }
}

wire_actions! {
    /// Picked from a role menu; the participant comes from the session.
    RoleAction {
        Assign => "assign",
        Unassign => "unassign",
    }
}

wire_actions! {
    TeamAction {
        AddEpic => "addepic",
        AddMember => "addmember",
        RemoveMember => "removemember",
        Members => "members",
        Score => "score",
    }
}

wire_actions! {
    EpicAction {
        StartScore => "startscore",
        Results => "results",
        Status => "status",
        AddRisk => "addrisk",
        Delete => "deleteepic",
        DeleteRisk => "deleterisk",
        Score => "score",
    }
}

wire_actions! {
    /// Final confirmation of a destructive action.
    ConfirmAction {
        DeleteEpic => "deleteepic",
        DeleteRisk => "deleterisk",
        DeleteUser => "deleteuser",
    }
}

/// Risk actions; scoring steps carry the chosen factor in the action name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RiskAction {
    Score,
    Probability(RiskFactor),
    /// The probability was stashed in the session when it was chosen.
    Impact(RiskFactor),
    Delete,
}

impl RiskAction {
    #[must_use]
    pub fn wire(self) -> String {
        match self {
            Self::Score => "score".into(),
            Self::Probability(p) => format!("prob_{p}"),
            Self::Impact(i) => format!("impact_{i}"),
            Self::Delete => "delete".into(),
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let factor = |digits: &str| {
            digits
                .parse::<u8>()
                .ok()
                .and_then(|n| RiskFactor::new(n).ok())
        };
        match s {
            "score" => Some(Self::Score),
            "delete" => Some(Self::Delete),
            _ => {
                if let Some(p) = s.strip_prefix("prob_") {
                    factor(p).map(Self::Probability)
                } else if let Some(i) = s.strip_prefix("impact_") {
                    factor(i).map(Self::Impact)
                } else {
                    None
                }
            }
        }
    }
}

/// A decoded click.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Cancel,
    User(UserAction, Uuid),
    Role(RoleAction, Uuid),
    Team(TeamAction, Uuid),
    Epic(EpicAction, Uuid),
    Risk(RiskAction, Uuid),
    Confirm(ConfirmAction, Uuid),
}

impl Action {
    /// Decode and type a raw click token.
    ///
    /// # Errors
    ///
    /// Any codec error, `UnknownAction` for a name outside the domain's set,
    /// and `Malformed` for a two-id token (no action takes two ids).
    pub fn decode(codec: &TokenCodec, raw: &str) -> Result<Self, TokenError> {
        match codec.decode(raw)? {
            Token::Cancel => Ok(Self::Cancel),
            Token::Action(token) => Self::try_from(token),
        }
    }

    /// Encode this action as a click token.
    ///
    /// # Errors
    ///
    /// `TooLong` if the token exceeds the codec's ceiling.
    pub fn encode(self, codec: &TokenCodec) -> Result<String, TokenError> {
        match self {
            Self::Cancel => Ok(codec.cancel()),
            Self::User(a, id) => codec.encode(Domain::User, a.as_str(), id),
            Self::Role(a, id) => codec.encode(Domain::Role, a.as_str(), id),
            Self::Team(a, id) => codec.encode(Domain::Team, a.as_str(), id),
            Self::Epic(a, id) => codec.encode(Domain::Epic, a.as_str(), id),
            Self::Risk(a, id) => codec.encode(Domain::Risk, &a.wire(), id),
            Self::Confirm(a, id) => codec.encode(Domain::Confirm, a.as_str(), id),
        }
    }

    /// Minimum access needed to act on this click.
    #[must_use]
    pub const fn access(self) -> Access {
        match self {
            Self::Cancel
            | Self::Team(TeamAction::Score, _)
            | Self::Epic(EpicAction::Score | EpicAction::Status, _)
            | Self::Risk(RiskAction::Score | RiskAction::Probability(_) | RiskAction::Impact(_), _) => {
                Access::Anyone
            }
            Self::User(UserAction::Delete, _)
            | Self::Epic(EpicAction::Delete | EpicAction::DeleteRisk, _)
            | Self::Risk(RiskAction::Delete, _)
            | Self::Confirm(..) => Access::SuperAdmin,
            Self::User(..) | Self::Role(..) | Self::Team(..) | Self::Epic(..) => Access::Admin,
        }
    }
}

impl TryFrom<ActionToken> for Action {
    type Error = TokenError;

    fn try_from(token: ActionToken) -> Result<Self, Self::Error> {
        if token.second.is_some() {
            return Err(TokenError::Malformed(format!(
                "{} actions take a single id",
                token.domain
            )));
        }
        let unknown = || TokenError::UnknownAction {
            domain: token.domain,
            action: token.action.clone(),
        };
        let id = token.id;
        let action = token.action.as_str();
        let typed = match token.domain {
            Domain::User => UserAction::parse(action).map(|a| Self::User(a, id)),
            Domain::Role => RoleAction::parse(action).map(|a| Self::Role(a, id)),
            Domain::Team => TeamAction::parse(action).map(|a| Self::Team(a, id)),
            Domain::Epic => EpicAction::parse(action).map(|a| Self::Epic(a, id)),
            Domain::Risk => RiskAction::parse(action).map(|a| Self::Risk(a, id)),
            Domain::Confirm => ConfirmAction::parse(action).map(|a| Self::Confirm(a, id)),
        };
        typed.ok_or_else(unknown)
    }
}
