//! # EscrowState: custody of both stakes for one session
//!
//! ## State Machine
//!
//! ```text
//!   wager == 0                    wager > 0
//!   ┌───────────────┐       ┌──────────┐  win / refund  ┌─────────┐
//!   │ NOT_APPLICABLE│       │ RESERVED ├───────────────▶│ SETTLED │
//!   └───────────────┘       └──────────┘                └─────────┘
//! ```
//!
//! `Reserved → Settled` happens exactly once. `NotApplicable` never moves.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Escrow state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EscrowState {
    /// Unwagered game. Nothing was reserved.
    NotApplicable,
    /// Both stakes debited; `per_player` is held for each player.
    Reserved { per_player: u64 },
    /// The pot has been paid out or refunded.
    Settled,
}

impl EscrowState {
    /// Can this state transition to the given target state?
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!((self, target), (Self::Reserved { .. }, Self::Settled))
    }

    #[must_use]
    pub fn is_reserved(&self) -> bool {
        matches!(self, Self::Reserved { .. })
    }

    /// Total amount held for the session (both stakes).
    #[must_use]
    pub fn pot(&self) -> u64 {
        match self {
            Self::Reserved { per_player } => per_player.saturating_mul(2),
            Self::NotApplicable | Self::Settled => 0,
        }
    }

    /// Move `Reserved → Settled`, returning the per-player amount that was
    /// held.
    ///
    /// # Panics
    /// Settling anything but a reserved escrow is a programming error.
    pub fn settle(&mut self) -> u64 {
        let Self::Reserved { per_player } = *self else {
            panic!("settle called on escrow in state {self}");
        };
        *self = Self::Settled;
        per_player
    }
}

impl fmt::Display for EscrowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotApplicable => write!(f, "NOT_APPLICABLE"),
            Self::Reserved { per_player } => write!(f, "RESERVED({per_player})"),
            Self::Settled => write!(f, "SETTLED"),
        }
    }
}
