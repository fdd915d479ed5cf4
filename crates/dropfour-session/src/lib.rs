//! # dropfour-session
//!
//! **Four-in-a-row sessions between two chat users, with optional wagers.**
//!
//! ```text
//! StartRequest
//!     │ validate (no bots, no self-play)
//!     ▼
//! Negotiator ──decline / timeout──▶ GameEnd::{Declined, TimedOut}
//!     │ accept: EscrowAdapter::reserve
//!     ▼
//! Session ◀── MoveSource (one event at a time, inactivity deadline)
//!     │ win / draw / expired
//!     ▼
//! Settler: winner stat ─▶ loser stat ─▶ escrow credit
//!     ▼
//! GameEnd::Finished(TerminalSummary)
//! ```
//!
//! The chat platform is reached only through the traits in
//! [`collaborators`] and [`stats`]; in-memory implementations of each are
//! provided.

pub mod collaborators;
pub mod engine;
pub mod negotiation;
pub mod session;
pub mod settlement;
pub mod stats;
pub mod telemetry;

pub use collaborators::{
    ChannelDecisionSource, ChannelMoveSource, DecisionSource, Delivery, MemoryPresenter,
    MoveSource, Presenter,
};
pub use engine::{GameEnd, GameEngine, StartRequest, TerminalSummary};
pub use negotiation::{ChallengeOutcome, Negotiator};
pub use session::{Applied, Session};
pub use settlement::{SettlementFailure, SettlementReport, SettlementStep, Settler};
pub use stats::{GameLine, GameRecord, PlayerSummary, Standing, StatsBook, StatsRecorder};
