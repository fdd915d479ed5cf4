//! Error types for DropFour.
//!
//! All errors use the `DF_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Move errors
//! - 2xx: Balance errors
//! - 3xx: Escrow errors
//! - 4xx: Challenge errors
//! - 5xx: Session errors
//! - 6xx: Collaborator errors
//! - 9xx: General / internal errors

use thiserror::Error;

use crate::{PlayerId, SessionId};

/// Central error enum for all DropFour operations.
#[derive(Debug, Error)]
pub enum DropfourError {
    // =================================================================
    // Move Errors (1xx)
    // =================================================================
    /// The actor is neither of the two seated players.
    #[error("DF_ERR_100: You are not taking part in this game")]
    NotAParticipant(PlayerId),

    /// The actor is seated but it is the other player's turn.
    #[error("DF_ERR_101: It is not your turn")]
    NotYourTurn(PlayerId),

    /// The targeted column has no empty cell left.
    #[error("DF_ERR_102: Column {column} is full, pick another one")]
    ColumnFull { column: usize },

    /// The targeted column does not exist.
    #[error("DF_ERR_103: Column {column} does not exist")]
    InvalidColumn { column: usize },

    // =================================================================
    // Balance Errors (2xx)
    // =================================================================
    /// A player cannot cover the wager.
    #[error("DF_ERR_200: Insufficient funds for player {player}: need {needed}, have {available}")]
    InsufficientFunds {
        player: PlayerId,
        needed: u64,
        available: u64,
    },

    /// A ledger adjustment would make a balance negative.
    #[error("DF_ERR_201: Balance underflow for player {player}: balance {balance}, delta {delta}")]
    BalanceUnderflow {
        player: PlayerId,
        balance: u64,
        delta: i64,
    },

    /// A ledger adjustment would overflow the balance type.
    #[error("DF_ERR_202: Balance overflow for player {player}")]
    BalanceOverflow { player: PlayerId },

    // =================================================================
    // Escrow Errors (3xx)
    // =================================================================
    /// Reserving both stakes failed after at least one ledger call.
    #[error("DF_ERR_300: Reservation failed for {session}: {reason}")]
    ReservationFailed { session: SessionId, reason: String },

    /// The session's pot has already been paid out or refunded.
    #[error("DF_ERR_301: Session already settled: {0}")]
    SessionAlreadySettled(SessionId),

    /// Journal totals for a session do not add up.
    #[error("DF_ERR_302: Escrow invariant violation: {reason}")]
    EscrowInvariantViolation { reason: String },

    // =================================================================
    // Challenge Errors (4xx)
    // =================================================================
    /// A player tried to challenge themselves.
    #[error("DF_ERR_400: You cannot play against yourself")]
    SelfChallenge,

    /// The opponent is an automated account.
    #[error("DF_ERR_401: You cannot play against a bot")]
    AutomatedOpponent,

    /// Someone other than the challenged player answered the challenge.
    #[error("DF_ERR_402: Only the challenged player can answer this challenge")]
    NotChallenged(PlayerId),

    // =================================================================
    // Session Errors (5xx)
    // =================================================================
    /// An invalid state transition was attempted.
    #[error("DF_ERR_500: Invalid session state: {reason}")]
    InvalidState { reason: String },

    // =================================================================
    // Collaborator Errors (6xx)
    // =================================================================
    /// The ledger collaborator could not be reached or refused the write.
    #[error("DF_ERR_600: Ledger unavailable: {reason}")]
    LedgerUnavailable { reason: String },

    /// The statistics collaborator refused the write.
    #[error("DF_ERR_601: Statistics write failed: {reason}")]
    StatsWriteFailed { reason: String },

    /// The presentation layer did not acknowledge an update.
    #[error("DF_ERR_602: Presentation failed: {reason}")]
    PresentationFailed { reason: String },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("DF_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("DF_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid values, missing fields, etc.).
    #[error("DF_ERR_902: Configuration error: {0}")]
    Configuration(String),
}

impl DropfourError {
    /// Whether this error is caused by the acting user and should be
    /// answered with an ephemeral notice instead of a failure report.
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::NotAParticipant(_)
                | Self::NotYourTurn(_)
                | Self::ColumnFull { .. }
                | Self::InvalidColumn { .. }
                | Self::InsufficientFunds { .. }
                | Self::SelfChallenge
                | Self::AutomatedOpponent
                | Self::NotChallenged(_)
        )
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, DropfourError>;

impl From<serde_json::Error> for DropfourError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
