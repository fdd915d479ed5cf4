//! Session state machine.
//!
//! ```text
//! AwaitingMove(first) ──apply──▶ AwaitingMove(second) ──apply──▶ …
//!        │                                │
//!        └──── four in a row / full / expire ────▶ Terminated(outcome)
//! ```
//!
//! `Terminated` is absorbing. The session is owned by a single task and
//! mutated only through [`Session::apply`] and [`Session::expire`], both
//! synchronous.

use chrono::{DateTime, Utc};
use dropfour_grid::Grid;
use dropfour_types::{
    DropfourError, EscrowState, MoveEvent, Outcome, Player, PlayerId, Result, Seat, SessionId,
    SessionStatus, SessionView, Token,
};

/// What a successful [`Session::apply`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The token landed and the turn passed to `next`.
    Placed {
        row: usize,
        column: usize,
        next: PlayerId,
    },
    /// The move ended the session.
    Finished(Outcome),
}

/// One two-player game from acceptance to terminal outcome.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    first: Player,
    second: Player,
    wager: u64,
    grid: Grid,
    turn: Seat,
    outcome: Option<Outcome>,
    escrow: EscrowState,
    moves: usize,
    started_at: DateTime<Utc>,
    /// Set once settlement has run.
    settled: bool,
}

impl Session {
    /// Start a session. `first` moves first and plays [`Token::A`].
    ///
    /// # Panics
    /// If the escrow state does not match the wager: `NotApplicable` only
    /// for a zero wager, `Reserved` with the same amount otherwise.
    #[must_use]
    pub fn new(id: SessionId, first: Player, second: Player, wager: u64, escrow: EscrowState) -> Self {
        match escrow {
            EscrowState::NotApplicable => {
                assert_eq!(wager, 0, "wagered session {id} started without escrow");
            }
            EscrowState::Reserved { per_player } => {
                assert_eq!(per_player, wager, "session {id} reserved a different amount");
            }
            EscrowState::Settled => panic!("session {id} started with settled escrow"),
        }
        Self {
            id,
            first,
            second,
            wager,
            grid: Grid::new(),
            turn: Seat::First,
            outcome: None,
            escrow,
            moves: 0,
            started_at: Utc::now(),
            settled: false,
        }
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn first(&self) -> &Player {
        &self.first
    }

    #[must_use]
    pub fn second(&self) -> &Player {
        &self.second
    }

    #[must_use]
    pub fn player(&self, seat: Seat) -> &Player {
        match seat {
            Seat::First => &self.first,
            Seat::Second => &self.second,
        }
    }

    /// Seat held by `player`, if seated.
    #[must_use]
    pub fn seat_of(&self, player: PlayerId) -> Option<Seat> {
        if player == self.first.id {
            Some(Seat::First)
        } else if player == self.second.id {
            Some(Seat::Second)
        } else {
            None
        }
    }

    #[must_use]
    pub fn wager(&self) -> u64 {
        self.wager
    }

    #[must_use]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    #[must_use]
    pub fn current_seat(&self) -> Seat {
        self.turn
    }

    /// Player whose turn it is. Frozen once terminated.
    #[must_use]
    pub fn current_turn(&self) -> &Player {
        self.player(self.turn)
    }

    #[must_use]
    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.outcome.is_some()
    }

    #[must_use]
    pub fn escrow(&self) -> EscrowState {
        self.escrow
    }

    /// Settlement moves escrow from `Reserved` to `Settled` through this.
    pub fn escrow_mut(&mut self) -> &mut EscrowState {
        &mut self.escrow
    }

    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.settled
    }

    /// Record that settlement ran. Only valid once terminated.
    pub(crate) fn mark_settled(&mut self) {
        debug_assert!(self.outcome.is_some(), "session {} settled while in play", self.id);
        self.settled = true;
    }

    /// Moves applied so far.
    #[must_use]
    pub fn moves(&self) -> usize {
        self.moves
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Apply one move event.
    ///
    /// Rejections leave the session untouched and the turn where it was.
    ///
    /// # Errors
    /// `NotAParticipant`, `NotYourTurn`, `InvalidColumn` or `ColumnFull`.
    ///
    /// # Panics
    /// If the session is already terminated.
    pub fn apply(&mut self, event: &MoveEvent) -> Result<Applied> {
        assert!(
            self.outcome.is_none(),
            "move applied to terminated session {}",
            self.id
        );

        let seat = self
            .seat_of(event.actor)
            .ok_or(DropfourError::NotAParticipant(event.actor))?;
        if seat != self.turn {
            return Err(DropfourError::NotYourTurn(event.actor));
        }

        let token = seat.token();
        let row = self.grid.place(event.column, token)?;
        self.moves += 1;

        if self.grid.has_four_in_a_row(token) {
            let outcome = Outcome::Win {
                winner: event.actor,
                loser: self.player(seat.other()).id,
            };
            self.outcome = Some(outcome);
            return Ok(Applied::Finished(outcome));
        }
        if self.grid.is_full() {
            self.outcome = Some(Outcome::Draw);
            return Ok(Applied::Finished(Outcome::Draw));
        }

        self.turn = seat.other();
        Ok(Applied::Placed {
            row,
            column: event.column,
            next: self.current_turn().id,
        })
    }

    /// Terminate for inactivity.
    ///
    /// # Panics
    /// If the session is already terminated.
    pub fn expire(&mut self) -> Outcome {
        assert!(
            self.outcome.is_none(),
            "expire called on terminated session {}",
            self.id
        );
        self.outcome = Some(Outcome::Expired);
        Outcome::Expired
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        match self.outcome {
            Some(outcome) => SessionStatus::Finished(outcome),
            None => SessionStatus::AwaitingMove {
                player: self.current_turn().id,
                token: self.turn.token(),
            },
        }
    }

    #[must_use]
    pub fn status_text(&self) -> String {
        match self.outcome {
            None => {
                let mark = match self.turn.token() {
                    Token::A => "A",
                    Token::B => "B",
                };
                format!("It is **{}**'s turn ({mark})", self.current_turn())
            }
            Some(Outcome::Win { winner, .. }) => {
                let name = self
                    .seat_of(winner)
                    .map_or_else(|| winner.to_string(), |seat| self.player(seat).name.clone());
                format!("**{name}** wins!")
            }
            Some(Outcome::Draw) => "Draw! The grid is full.".to_string(),
            Some(Outcome::Expired) => "The game has expired.".to_string(),
        }
    }

    /// Data for the presentation layer. The selector is disabled once the
    /// session is terminated.
    #[must_use]
    pub fn view(&self) -> SessionView {
        SessionView {
            session_id: self.id,
            grid: self.grid.snapshot(),
            status: self.status(),
            status_text: self.status_text(),
            wager: self.wager,
            selector_enabled: !self.is_terminated(),
        }
    }
}
