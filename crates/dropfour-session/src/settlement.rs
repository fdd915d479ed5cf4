//! Terminal settlement: statistics first, then escrow.
//!
//! Runs exactly once per session, after the move stream has been stopped;
//! the session is marked settled before any step runs.
//! On a win the order is winner stat, loser stat, pot credit. The steps are
//! not atomic: a failing step is logged and reported, the remaining steps
//! still run, and nothing already written is rolled back.

use std::fmt;

use dropfour_escrow::{EscrowAdapter, SettlementReceipt};
use dropfour_types::{DropfourError, Outcome, PlayerId, Result, SessionId};
use serde::{Deserialize, Serialize};

use crate::{
    collaborators::{Presenter, deliver_error},
    session::Session,
    stats::StatsRecorder,
};

/// Step of the settlement sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettlementStep {
    WinnerStat,
    LoserStat,
    Payout,
    Refund,
}

impl fmt::Display for SettlementStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WinnerStat => write!(f, "record_win"),
            Self::LoserStat => write!(f, "record_loss"),
            Self::Payout => write!(f, "settle_win"),
            Self::Refund => write!(f, "settle_refund"),
        }
    }
}

/// A step that did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementFailure {
    pub step: SettlementStep,
    pub player: Option<PlayerId>,
    pub error: String,
}

/// What settlement did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettlementReport {
    /// Amount credited back to players for this session.
    pub credited: u64,
    /// Escrow receipt, for wagered sessions.
    pub receipt: Option<SettlementReceipt>,
    pub failures: Vec<SettlementFailure>,
}

impl SettlementReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Applies a terminal outcome to statistics and escrow.
pub struct Settler<'a> {
    stats: &'a dyn StatsRecorder,
    escrow: &'a EscrowAdapter,
    presenter: &'a dyn Presenter,
    game_tag: &'a str,
    refund_on_expiry: bool,
}

impl<'a> Settler<'a> {
    #[must_use]
    pub fn new(
        stats: &'a dyn StatsRecorder,
        escrow: &'a EscrowAdapter,
        presenter: &'a dyn Presenter,
        game_tag: &'a str,
        refund_on_expiry: bool,
    ) -> Self {
        Self {
            stats,
            escrow,
            presenter,
            game_tag,
            refund_on_expiry,
        }
    }

    /// Settle a terminated session.
    ///
    /// Collaborator failures do not abort settlement; they are collected in
    /// the report and both players get a generic failure notice.
    ///
    /// # Errors
    /// - `InvalidState` if the session has no outcome yet
    /// - `SessionAlreadySettled` if it was settled before (nothing is
    ///   recorded again)
    pub async fn settle(&self, session: &mut Session) -> Result<SettlementReport> {
        let Some(outcome) = session.outcome() else {
            return Err(DropfourError::InvalidState {
                reason: format!("{} settled before terminating", session.id()),
            });
        };
        let id = session.id();
        if session.is_settled() {
            tracing::warn!(session = %id, "Settlement requested twice");
            return Err(DropfourError::SessionAlreadySettled(id));
        }
        session.mark_settled();
        let first = session.first().id;
        let second = session.second().id;
        let reserved = session.escrow().is_reserved();
        let mut report = SettlementReport::default();

        match outcome {
            Outcome::Win { winner, loser } => {
                if let Err(err) = self.stats.record_win(winner, self.game_tag).await {
                    record_failure(&mut report, id, SettlementStep::WinnerStat, Some(winner), &err);
                }
                if let Err(err) = self.stats.record_loss(loser, self.game_tag).await {
                    record_failure(&mut report, id, SettlementStep::LoserStat, Some(loser), &err);
                }
                if reserved {
                    if let Err(err) = self.escrow.settle_win(id, session.escrow_mut(), winner).await {
                        record_failure(&mut report, id, SettlementStep::Payout, Some(winner), &err);
                    }
                }
            }
            Outcome::Draw => {
                if reserved {
                    self.refund(&mut report, session, first, second).await;
                }
            }
            Outcome::Expired => {
                if reserved && self.refund_on_expiry {
                    self.refund(&mut report, session, first, second).await;
                } else if reserved {
                    tracing::warn!(
                        session = %id,
                        wager = session.wager(),
                        "Expired with stakes held, left for reconciliation"
                    );
                }
            }
        }

        if reserved {
            let receipt = self.escrow.receipt(id).await;
            report.credited = receipt.credited;
            report.receipt = Some(receipt);
        }

        if report.is_clean() {
            tracing::info!(session = %id, outcome = %outcome, credited = report.credited, "Session settled");
        } else {
            let text = "Something went wrong while settling this game. It has been logged for review.";
            deliver_error(self.presenter, first, text).await;
            deliver_error(self.presenter, second, text).await;
        }
        Ok(report)
    }

    async fn refund(
        &self,
        report: &mut SettlementReport,
        session: &mut Session,
        first: PlayerId,
        second: PlayerId,
    ) {
        let id = session.id();
        if let Err(err) = self
            .escrow
            .settle_refund(id, session.escrow_mut(), first, second)
            .await
        {
            record_failure(report, id, SettlementStep::Refund, None, &err);
        }
    }
}

fn record_failure(
    report: &mut SettlementReport,
    session: SessionId,
    step: SettlementStep,
    player: Option<PlayerId>,
    err: &DropfourError,
) {
    tracing::error!(
        session = %session,
        player = ?player,
        operation = %step,
        error = %err,
        "Settlement step failed"
    );
    report.failures.push(SettlementFailure {
        step,
        player,
        error: err.to_string(),
    });
}
