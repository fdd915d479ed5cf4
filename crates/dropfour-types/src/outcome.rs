//! Terminal outcomes and the stop reasons derived from them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::PlayerId;

/// How a session ended.
///
/// Settlement matches on this exhaustively: a win pays the pot to the
/// winner, a draw refunds both stakes, an expiry records no statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    /// Four in a row for `winner`.
    Win { winner: PlayerId, loser: PlayerId },
    /// Grid filled without four in a row.
    Draw,
    /// No move applied within the inactivity bound.
    Expired,
}

impl Outcome {
    #[must_use]
    pub fn winner(&self) -> Option<PlayerId> {
        match self {
            Self::Win { winner, .. } => Some(*winner),
            Self::Draw | Self::Expired => None,
        }
    }

    #[must_use]
    pub fn stop_reason(&self) -> StopReason {
        match self {
            Self::Win { .. } => StopReason::Win,
            Self::Draw => StopReason::Draw,
            Self::Expired => StopReason::Expired,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Win { winner, .. } => write!(f, "WIN({winner})"),
            Self::Draw => write!(f, "DRAW"),
            Self::Expired => write!(f, "EXPIRED"),
        }
    }
}

/// Reason passed to the move source when the engine stops it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StopReason {
    Win,
    Draw,
    Expired,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Win => write!(f, "win"),
            Self::Draw => write!(f, "draw"),
            Self::Expired => write!(f, "expired"),
        }
    }
}
