//! Events delivered to the engine by the chat platform.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::PlayerId;

/// A player picked a column in the move selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MoveEvent {
    pub actor: PlayerId,
    /// Zero-based column index.
    pub column: usize,
}

impl MoveEvent {
    #[must_use]
    pub fn new(actor: PlayerId, column: usize) -> Self {
        Self { actor, column }
    }
}

/// Answer to a wagered challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Decision {
    Accept,
    Decline,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accept => write!(f, "ACCEPT"),
            Self::Decline => write!(f, "DECLINE"),
        }
    }
}

/// Someone pressed accept or decline on a challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DecisionEvent {
    pub actor: PlayerId,
    pub decision: Decision,
}

impl DecisionEvent {
    #[must_use]
    pub fn accept(actor: PlayerId) -> Self {
        Self {
            actor,
            decision: Decision::Accept,
        }
    }

    #[must_use]
    pub fn decline(actor: PlayerId) -> Self {
        Self {
            actor,
            decision: Decision::Decline,
        }
    }
}
