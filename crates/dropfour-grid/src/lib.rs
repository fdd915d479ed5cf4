//! # dropfour-grid
//!
//! **Pure four-in-a-row grid.**
//!
//! The grid is the compute core of a session. It has:
//!
//! - **Zero side effects**: no ledger, no statistics, no presentation
//! - **Gravity placement**: a token always lands on the lowest empty cell
//! - **Win detection**: horizontal, vertical and both diagonals

pub mod grid;
pub mod win;

pub use grid::Grid;
pub use win::{Direction, has_four_in_a_row, winning_line};
