//! # dropfour-types
//!
//! Shared types, errors, and configuration for **DropFour** grid sessions.
//!
//! This crate is the leaf dependency of the workspace; every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`SessionId`], [`PlayerId`]
//! - **Players**: [`Player`], [`Seat`]
//! - **Grid cells**: [`GridCell`], [`Token`]
//! - **Events**: [`MoveEvent`], [`DecisionEvent`], [`Decision`]
//! - **Outcomes**: [`Outcome`], [`StopReason`]
//! - **Escrow**: [`EscrowState`]
//! - **View models**: [`SessionView`], [`SessionStatus`], [`ChallengeView`]
//! - **Configuration**: [`EngineConfig`]
//! - **Errors**: [`DropfourError`] with `DF_ERR_` prefix codes
//! - **Constants**: grid size, timeouts and defaults

pub mod cell;
pub mod config;
pub mod constants;
pub mod error;
pub mod escrow;
pub mod event;
pub mod ids;
pub mod outcome;
pub mod player;
pub mod view;

pub use cell::*;
pub use config::*;
pub use error::*;
pub use escrow::*;
pub use event::*;
pub use ids::*;
pub use outcome::*;
pub use player::*;
pub use view::*;

// Constants are accessed via `dropfour_types::constants::FOO`
// (not re-exported to avoid name collisions).
