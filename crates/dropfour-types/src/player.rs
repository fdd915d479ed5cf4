//! Player handles and seating.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{PlayerId, Token};

/// Opaque handle for a chat user taking part in a game.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Player {
    /// Platform identity.
    pub id: PlayerId,
    /// Display name used in status texts.
    pub name: String,
    /// Whether the account is a bot. Bots cannot be challenged.
    pub automated: bool,
}

impl Player {
    #[must_use]
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            automated: false,
        }
    }

    /// Same as [`Player::new`] but flagged as an automated account.
    #[must_use]
    pub fn automated(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            automated: true,
            ..Self::new(id, name)
        }
    }

    /// A human player with a fresh id.
    #[cfg(any(test, feature = "test-helpers"))]
    #[must_use]
    pub fn dummy(name: &str) -> Self {
        Self::new(PlayerId::new(), name)
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Role assigned at session creation. Fixed for the session's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Seat {
    /// The proposer. Moves first and plays [`Token::A`].
    First,
    /// The opponent. Plays [`Token::B`].
    Second,
}

impl Seat {
    #[must_use]
    pub fn token(self) -> Token {
        match self {
            Self::First => Token::A,
            Self::Second => Token::B,
        }
    }

    #[must_use]
    pub fn other(self) -> Self {
        match self {
            Self::First => Self::Second,
            Self::Second => Self::First,
        }
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::First => write!(f, "FIRST"),
            Self::Second => write!(f, "SECOND"),
        }
    }
}
