//! Escrow adapter: reserves stakes, pays out the pot, refunds draws.
//!
//! Every ledger call goes through here so that the [`EscrowJournal`] sees
//! it. The ledger has no cross-player transaction, so the adapter applies
//! the following policy:
//!
//! 1. `reserve` reads both balances and fails without touching either one
//!    if a player cannot cover the stake (first player checked first).
//! 2. It then debits the first player, then the second. If the second debit
//!    fails, the first stake is credited back straight away
//!    (`Compensation`). If that credit fails too, the debit stays in the
//!    journal as outstanding and [`EscrowAdapter::reconcile`] returns it.
//! 3. Settlement records its payout plan before crediting, so a failed
//!    credit leaves the unpaid remainder visible in the journal. The plan
//!    can only be recorded once per session, so a pot is paid at most once.

use std::{collections::HashSet, sync::Arc};

use dropfour_types::{DropfourError, EscrowState, PlayerId, Result, SessionId};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::{
    journal::{EntryKind, EscrowJournal},
    ledger::{Ledger, signed},
};

/// Result of a successful reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub session: SessionId,
    pub per_player: u64,
    /// Balances of the first and second player after their debit.
    pub balances: (u64, u64),
}

impl Reservation {
    /// The escrow state a session starts with after this reservation.
    #[must_use]
    pub fn state(&self) -> EscrowState {
        EscrowState::Reserved {
            per_player: self.per_player,
        }
    }
}

/// Audit summary of a session's escrow after settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementReceipt {
    pub session: SessionId,
    pub debited: u64,
    pub credited: u64,
    /// Amounts that could not be credited yet.
    pub outstanding: Vec<(PlayerId, u64)>,
    /// Hex SHA-256 over the session's journal entries.
    pub digest: String,
}

/// Outcome of a reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Sessions that were examined.
    pub sessions: Vec<SessionId>,
    /// Total amount credited back.
    pub returned: u64,
    /// Credits that failed again and remain outstanding.
    pub failed: Vec<(SessionId, PlayerId, u64)>,
}

/// Escrow operations over an external [`Ledger`].
pub struct EscrowAdapter {
    ledger: Arc<dyn Ledger>,
    journal: Mutex<EscrowJournal>,
}

impl EscrowAdapter {
    /// `archive_size` bounds how many closed books the journal keeps.
    #[must_use]
    pub fn new(ledger: Arc<dyn Ledger>, archive_size: usize) -> Self {
        Self {
            ledger,
            journal: Mutex::new(EscrowJournal::with_archive_size(archive_size)),
        }
    }

    #[must_use]
    pub fn ledger(&self) -> &Arc<dyn Ledger> {
        &self.ledger
    }

    /// Read `player`'s balance and check it covers `amount`.
    ///
    /// # Errors
    /// `InsufficientFunds` naming the player, or the ledger's error.
    pub async fn check_funds(&self, player: PlayerId, amount: u64) -> Result<u64> {
        let available = self.ledger.balance(player).await?;
        if available < amount {
            return Err(DropfourError::InsufficientFunds {
                player,
                needed: amount,
                available,
            });
        }
        Ok(available)
    }

    /// Debit `amount` from both players.
    ///
    /// # Errors
    /// - `InsufficientFunds` if either balance is short (nothing debited)
    /// - `ReservationFailed` if a debit failed and compensation failed too
    /// - the ledger's error for the failing debit otherwise
    pub async fn reserve(
        &self,
        session: SessionId,
        first: PlayerId,
        second: PlayerId,
        amount: u64,
    ) -> Result<Reservation> {
        if amount == 0 {
            return Err(DropfourError::InvalidState {
                reason: format!("{session}: nothing to reserve for a zero wager"),
            });
        }

        self.check_funds(first, amount).await?;
        self.check_funds(second, amount).await?;

        let first_balance = self.debit(session, first, amount).await?;
        let second_balance = match self.debit(session, second, amount).await {
            Ok(balance) => balance,
            Err(err) => {
                tracing::warn!(
                    session = %session,
                    player = %second,
                    amount,
                    error = %err,
                    "Second debit failed, returning first stake"
                );
                if let Err(comp_err) = self
                    .credit(session, EntryKind::Compensation, first, amount)
                    .await
                {
                    tracing::error!(
                        session = %session,
                        player = %first,
                        amount,
                        error = %comp_err,
                        "Compensation failed, stake left outstanding for reconciliation"
                    );
                    return Err(DropfourError::ReservationFailed {
                        session,
                        reason: format!("{err}; compensation failed: {comp_err}"),
                    });
                }
                return Err(err);
            }
        };

        tracing::info!(
            session = %session,
            first = %first,
            second = %second,
            amount,
            "Stakes reserved"
        );

        Ok(Reservation {
            session,
            per_player: amount,
            balances: (first_balance, second_balance),
        })
    }

    /// Pay the whole pot to `winner`.
    ///
    /// # Panics
    /// If `escrow` is not `Reserved` (programming error).
    ///
    /// # Errors
    /// `SessionAlreadySettled` (escrow untouched), or the ledger's error if
    /// the credit failed (the payout then stays outstanding in the journal).
    pub async fn settle_win(
        &self,
        session: SessionId,
        escrow: &mut EscrowState,
        winner: PlayerId,
    ) -> Result<SettlementReceipt> {
        let EscrowState::Reserved { per_player } = *escrow else {
            panic!("settle_win for {session} with escrow in state {escrow}");
        };
        let pot = per_player
            .checked_mul(2)
            .ok_or(DropfourError::BalanceOverflow { player: winner })?;

        self.journal.lock().await.plan(session, vec![(winner, pot)])?;
        escrow.settle();
        self.credit(session, EntryKind::Payout, winner, pot)
            .await
            .inspect_err(|err| {
                tracing::error!(
                    session = %session,
                    player = %winner,
                    amount = pot,
                    operation = "settle_win",
                    error = %err,
                    "Pot payout failed"
                );
            })?;

        tracing::info!(session = %session, winner = %winner, pot, "Pot paid out");
        Ok(self.receipt(session).await)
    }

    /// Return each player's stake.
    ///
    /// Both credits are attempted even if the first one fails.
    ///
    /// # Panics
    /// If `escrow` is not `Reserved` (programming error).
    ///
    /// # Errors
    /// `SessionAlreadySettled` (escrow untouched), or the first ledger error
    /// encountered.
    pub async fn settle_refund(
        &self,
        session: SessionId,
        escrow: &mut EscrowState,
        first: PlayerId,
        second: PlayerId,
    ) -> Result<SettlementReceipt> {
        let EscrowState::Reserved { per_player } = *escrow else {
            panic!("settle_refund for {session} with escrow in state {escrow}");
        };

        self.journal
            .lock()
            .await
            .plan(session, vec![(first, per_player), (second, per_player)])?;
        escrow.settle();

        let mut first_error = None;
        for player in [first, second] {
            if let Err(err) = self
                .credit(session, EntryKind::Refund, player, per_player)
                .await
            {
                tracing::error!(
                    session = %session,
                    player = %player,
                    amount = per_player,
                    operation = "settle_refund",
                    error = %err,
                    "Stake refund failed"
                );
                first_error.get_or_insert(err);
            }
        }
        if let Some(err) = first_error {
            return Err(err);
        }

        tracing::info!(session = %session, per_player, "Stakes refunded");
        Ok(self.receipt(session).await)
    }

    /// Amounts the session still holds, per player.
    pub async fn outstanding(&self, session: SessionId) -> Vec<(PlayerId, u64)> {
        self.journal.lock().await.outstanding(&session)
    }

    /// Check the journal's conservation invariant for a session.
    pub async fn verify(&self, session: SessionId) -> Result<()> {
        self.journal.lock().await.verify(&session)
    }

    /// Sessions whose books are still open in the journal.
    pub async fn open_books(&self) -> usize {
        self.journal.lock().await.open_books()
    }

    /// Totals, outstanding amounts and digest for a session.
    pub async fn receipt(&self, session: SessionId) -> SettlementReceipt {
        let journal = self.journal.lock().await;
        SettlementReceipt {
            session,
            debited: journal.total_debited(&session),
            credited: journal.total_credited(&session),
            outstanding: journal.outstanding(&session),
            digest: hex::encode(journal.digest(&session)),
        }
    }

    /// Credit back everything still held by sessions that are not `live`.
    ///
    /// Meant for recovery: after a crash mid-settlement, with expiry refunds
    /// turned off, or after a compensation failure. Sessions still being
    /// played must be listed in `live` or their stakes would be returned.
    pub async fn reconcile(&self, live: &HashSet<SessionId>) -> ReconcileReport {
        let sessions: Vec<SessionId> = self
            .journal
            .lock()
            .await
            .unsettled_sessions()
            .into_iter()
            .filter(|session| !live.contains(session))
            .collect();

        let mut report = ReconcileReport::default();
        for session in sessions {
            let owed = self.journal.lock().await.claim(session);
            for (player, amount) in owed {
                match self
                    .credit(session, EntryKind::Reconciliation, player, amount)
                    .await
                {
                    Ok(_) => report.returned += amount,
                    Err(err) => {
                        tracing::error!(
                            session = %session,
                            player = %player,
                            amount,
                            operation = "reconcile",
                            error = %err,
                            "Reconciliation credit failed"
                        );
                        report.failed.push((session, player, amount));
                    }
                }
            }
            report.sessions.push(session);
        }

        if !report.sessions.is_empty() {
            tracing::info!(
                sessions = report.sessions.len(),
                returned = report.returned,
                failed = report.failed.len(),
                "Escrow reconciliation complete"
            );
        }
        report
    }

    async fn debit(&self, session: SessionId, player: PlayerId, amount: u64) -> Result<u64> {
        let delta = -signed(player, amount)?;
        let balance = self
            .ledger
            .adjust(player, delta)
            .await
            .map_err(|err| match err {
                DropfourError::BalanceUnderflow { balance, .. } => {
                    DropfourError::InsufficientFunds {
                        player,
                        needed: amount,
                        available: balance,
                    }
                }
                other => other,
            })?;
        self.journal
            .lock()
            .await
            .record(session, EntryKind::Debit, player, amount);
        tracing::debug!(session = %session, player = %player, amount, balance, "Stake debited");
        Ok(balance)
    }

    async fn credit(
        &self,
        session: SessionId,
        kind: EntryKind,
        player: PlayerId,
        amount: u64,
    ) -> Result<u64> {
        let delta = signed(player, amount)?;
        let balance = self.ledger.adjust(player, delta).await?;
        self.journal.lock().await.record(session, kind, player, amount);
        tracing::debug!(
            session = %session,
            player = %player,
            amount,
            balance,
            kind = ?kind,
            "Escrow credit"
        );
        Ok(balance)
    }
}
