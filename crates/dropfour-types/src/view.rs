//! View models handed to the presentation layer.
//!
//! The engine never renders anything. These structs carry the data a chat
//! front end needs to draw the grid, the status line and the move selector.

use serde::{Deserialize, Serialize};

use crate::{
    GridCell, Outcome, Player, PlayerId, SessionId, Token,
    constants::{COLS, ROWS},
};

/// Row-major grid snapshot. Row 0 is the top row.
pub type GridSnapshot = [[GridCell; COLS]; ROWS];

/// Where the session stands, in typed form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    /// Waiting for `player` to drop a `token`.
    AwaitingMove { player: PlayerId, token: Token },
    /// The session has ended.
    Finished(Outcome),
}

/// Everything needed to draw one state of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionView {
    pub session_id: SessionId,
    pub grid: GridSnapshot,
    pub status: SessionStatus,
    /// Human-readable status line.
    pub status_text: String,
    /// Per-player stake, 0 for unwagered games.
    pub wager: u64,
    /// Whether the column selector accepts input.
    pub selector_enabled: bool,
}

/// Accept/decline prompt shown to the challenged player only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeView {
    pub proposer: Player,
    pub opponent: Player,
    pub wager: u64,
    /// How long the opponent has to answer.
    pub expires_in_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_serde_roundtrip() {
        let player = PlayerId::from_bytes([3; 16]);
        let mut grid: GridSnapshot = [[GridCell::Empty; COLS]; ROWS];
        grid[ROWS - 1][0] = GridCell::TokenA;
        let view = SessionView {
            session_id: SessionId::from_bytes([9; 16]),
            grid,
            status: SessionStatus::AwaitingMove {
                player,
                token: Token::B,
            },
            status_text: "turn".into(),
            wager: 0,
            selector_enabled: true,
        };
        let json = serde_json::to_string(&view).unwrap();
        let back: SessionView = serde_json::from_str(&json).unwrap();
        assert_eq!(view, back);
    }
}
