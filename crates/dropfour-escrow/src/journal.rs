//! Compensating-action log for escrowed stakes.
//!
//! The ledger offers no transaction spanning two players, so every debit and
//! credit the escrow issues is appended here as it happens. Per session the
//! journal answers three questions:
//!
//! - how much is still held, and for whom ([`EscrowJournal::outstanding`]);
//! - which sessions still hold funds ([`EscrowJournal::unsettled_sessions`]);
//! - whether the books balance ([`EscrowJournal::verify`]):
//!
//! ```text
//! ∀ session: Σ credits ≤ Σ debits,   and   closed ⇒ Σ credits == Σ debits
//! ```
//!
//! A book goes through three stages:
//!
//! ```text
//! Open (debits recorded) ──plan──▶ Settling ──last credit──▶ Closed
//!   └──────────── compensation balances the debits ──────────┘
//! ```
//!
//! The plan records who gets what before any credit is issued. A second
//! plan for the same session is refused, which is what makes settlement
//! happen at most once. If a credit fails, `outstanding` reports the unpaid
//! remainder of the plan rather than the raw stakes.
//!
//! Once credits equal debits the entries are dropped and only a
//! [`ClosedBook`] (totals and digest) is kept, in a bounded archive. Open
//! books are never evicted.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use dropfour_types::{DropfourError, PlayerId, Result, SessionId, constants};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// What a journal entry did to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    /// Stake taken from a player at reservation.
    Debit,
    /// Pot paid to the winner.
    Payout,
    /// Stake returned after a draw or an expiry.
    Refund,
    /// Stake returned because the other player's debit failed.
    Compensation,
    /// Stake or payout returned by a reconciliation pass.
    Reconciliation,
}

impl EntryKind {
    #[must_use]
    pub fn is_credit(self) -> bool {
        !matches!(self, Self::Debit)
    }

    fn tag(self) -> u8 {
        match self {
            Self::Debit => 0,
            Self::Payout => 1,
            Self::Refund => 2,
            Self::Compensation => 3,
            Self::Reconciliation => 4,
        }
    }
}

/// One ledger call that succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub kind: EntryKind,
    pub player: PlayerId,
    pub amount: u64,
    pub at: DateTime<Utc>,
}

/// What remains of a session once its books balanced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosedBook {
    pub session: SessionId,
    pub debited: u64,
    pub credited: u64,
    pub digest: [u8; 32],
    pub closed_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct SessionBook {
    entries: Vec<JournalEntry>,
    /// Payouts decided at settlement, before any credit is issued.
    plan: Option<Vec<(PlayerId, u64)>>,
}

impl SessionBook {
    fn total(&self, credit: bool) -> u64 {
        self.entries
            .iter()
            .filter(|e| e.kind.is_credit() == credit)
            .map(|e| e.amount)
            .sum()
    }

    fn per_player(&self, credit: bool) -> HashMap<PlayerId, u64> {
        let mut totals = HashMap::new();
        for entry in self.entries.iter().filter(|e| e.kind.is_credit() == credit) {
            *totals.entry(entry.player).or_insert(0) += entry.amount;
        }
        totals
    }

    fn balances(&self) -> bool {
        let debited = self.total(false);
        debited > 0 && self.total(true) == debited
    }

    fn owed(&self) -> Vec<(PlayerId, u64)> {
        let credited = self.per_player(true);
        let owed: Vec<(PlayerId, u64)> = match &self.plan {
            Some(plan) => plan.clone(),
            None => {
                let mut debits: Vec<_> = self.per_player(false).into_iter().collect();
                debits.sort_by_key(|(player, _)| *player);
                debits
            }
        };
        owed.into_iter()
            .filter_map(|(player, amount)| {
                let paid = credited.get(&player).copied().unwrap_or(0);
                let left = amount.saturating_sub(paid);
                (left > 0).then_some((player, left))
            })
            .collect()
    }
}

/// Per-session record of escrow debits and credits.
#[derive(Debug)]
pub struct EscrowJournal {
    books: HashMap<SessionId, SessionBook>,
    closed: HashMap<SessionId, ClosedBook>,
    /// Close order for archive eviction (front = oldest).
    closed_order: VecDeque<SessionId>,
    archive_size: usize,
}

impl Default for EscrowJournal {
    fn default() -> Self {
        Self::with_archive_size(constants::DEFAULT_JOURNAL_ARCHIVE_SIZE)
    }
}

impl EscrowJournal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `archive_size` closed books.
    ///
    /// # Panics
    /// Panics if `archive_size` is zero.
    #[must_use]
    pub fn with_archive_size(archive_size: usize) -> Self {
        assert!(archive_size > 0, "journal archive_size must be > 0");
        Self {
            books: HashMap::new(),
            closed: HashMap::new(),
            closed_order: VecDeque::new(),
            archive_size,
        }
    }

    /// Append a successful ledger call. Closes the book if it now balances.
    pub fn record(&mut self, session: SessionId, kind: EntryKind, player: PlayerId, amount: u64) {
        let book = self.books.entry(session).or_default();
        book.entries.push(JournalEntry {
            kind,
            player,
            amount,
            at: Utc::now(),
        });
        if book.balances() {
            self.close(session);
        }
    }

    /// Record who is owed what before settlement credits are issued.
    ///
    /// # Errors
    /// - `SessionAlreadySettled` if the session already has a plan or closed
    /// - `InvalidState` if nothing is held for the session
    pub fn plan(&mut self, session: SessionId, payouts: Vec<(PlayerId, u64)>) -> Result<()> {
        if self.closed.contains_key(&session) {
            return Err(DropfourError::SessionAlreadySettled(session));
        }
        let Some(book) = self.books.get_mut(&session) else {
            return Err(DropfourError::InvalidState {
                reason: format!("{session}: no stakes held"),
            });
        };
        if book.plan.is_some() {
            return Err(DropfourError::SessionAlreadySettled(session));
        }
        book.plan = Some(payouts);
        Ok(())
    }

    /// Claim an open session for reconciliation and return what it owes.
    ///
    /// A session without a plan gets its raw stakes as plan, so no later
    /// settlement can pay it out again.
    pub fn claim(&mut self, session: SessionId) -> Vec<(PlayerId, u64)> {
        let Some(book) = self.books.get_mut(&session) else {
            return Vec::new();
        };
        let owed = book.owed();
        if book.plan.is_none() {
            book.plan = Some(owed.clone());
        }
        owed
    }

    /// Whether a settlement plan was recorded or the books already closed.
    #[must_use]
    pub fn is_settled(&self, session: &SessionId) -> bool {
        self.closed.contains_key(session)
            || self.books.get(session).is_some_and(|book| book.plan.is_some())
    }

    /// Entries of a session that is still open, oldest first. Closed
    /// sessions only keep their [`ClosedBook`].
    #[must_use]
    pub fn entries(&self, session: &SessionId) -> &[JournalEntry] {
        self.books
            .get(session)
            .map_or(&[], |book| book.entries.as_slice())
    }

    /// Archived summary of a closed session.
    #[must_use]
    pub fn closed_book(&self, session: &SessionId) -> Option<&ClosedBook> {
        self.closed.get(session)
    }

    #[must_use]
    pub fn total_debited(&self, session: &SessionId) -> u64 {
        match (self.books.get(session), self.closed.get(session)) {
            (Some(book), _) => book.total(false),
            (None, Some(closed)) => closed.debited,
            (None, None) => 0,
        }
    }

    #[must_use]
    pub fn total_credited(&self, session: &SessionId) -> u64 {
        match (self.books.get(session), self.closed.get(session)) {
            (Some(book), _) => book.total(true),
            (None, Some(closed)) => closed.credited,
            (None, None) => 0,
        }
    }

    /// Amounts still owed per player for a session.
    ///
    /// With a settlement plan: each planned payout minus what that player
    /// has been credited. Without one: each player's debits minus credits.
    #[must_use]
    pub fn outstanding(&self, session: &SessionId) -> Vec<(PlayerId, u64)> {
        self.books.get(session).map_or_else(Vec::new, SessionBook::owed)
    }

    /// Sessions whose debits have not been fully credited back.
    #[must_use]
    pub fn unsettled_sessions(&self) -> Vec<SessionId> {
        let mut sessions: Vec<SessionId> = self
            .books
            .iter()
            .filter(|(_, book)| book.total(true) < book.total(false))
            .map(|(id, _)| *id)
            .collect();
        sessions.sort();
        sessions
    }

    /// Check the conservation invariant for a session.
    ///
    /// # Errors
    /// [`DropfourError::EscrowInvariantViolation`] if credits exceed debits.
    pub fn verify(&self, session: &SessionId) -> Result<()> {
        let debited = self.total_debited(session);
        let credited = self.total_credited(session);
        if credited > debited {
            return Err(DropfourError::EscrowInvariantViolation {
                reason: format!(
                    "{session}: credited {credited} exceeds debited {debited}"
                ),
            });
        }
        Ok(())
    }

    /// Whether everything debited for the session has been credited.
    #[must_use]
    pub fn is_closed(&self, session: &SessionId) -> bool {
        self.total_credited(session) == self.total_debited(session)
    }

    /// Number of sessions with open books.
    #[must_use]
    pub fn open_books(&self) -> usize {
        self.books.len()
    }

    /// Number of closed books still archived.
    #[must_use]
    pub fn archived(&self) -> usize {
        self.closed.len()
    }

    /// SHA-256 over the session id and its entries, for audit receipts.
    /// A closed session returns the digest taken when it closed.
    #[must_use]
    pub fn digest(&self, session: &SessionId) -> [u8; 32] {
        match self.closed.get(session) {
            Some(closed) if !self.books.contains_key(session) => closed.digest,
            _ => digest_entries(session, self.entries(session)),
        }
    }

    fn close(&mut self, session: SessionId) {
        let Some(book) = self.books.remove(&session) else {
            return;
        };
        let closed = ClosedBook {
            session,
            debited: book.total(false),
            credited: book.total(true),
            digest: digest_entries(&session, &book.entries),
            closed_at: Utc::now(),
        };
        if self.closed.len() >= self.archive_size {
            if let Some(oldest) = self.closed_order.pop_front() {
                self.closed.remove(&oldest);
            }
        }
        self.closed.insert(session, closed);
        self.closed_order.push_back(session);
    }
}

fn digest_entries(session: &SessionId, entries: &[JournalEntry]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"dropfour:journal:v1:");
    hasher.update(session.0.as_bytes());
    hasher.update((entries.len() as u64).to_le_bytes());
    for entry in entries {
        hasher.update([entry.kind.tag()]);
        hasher.update(entry.player.0.as_bytes());
        hasher.update(entry.amount.to_le_bytes());
    }
    let result = hasher.finalize();
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&result);
    digest
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> (SessionId, PlayerId, PlayerId) {
        (
            SessionId::from_bytes([9; 16]),
            PlayerId::from_bytes([1; 16]),
            PlayerId::from_bytes([2; 16]),
        )
    }

    #[test]
    fn empty_session_is_closed() {
        let journal = EscrowJournal::new();
        let (session, _, _) = ids();
        assert!(journal.is_closed(&session));
        assert!(journal.outstanding(&session).is_empty());
        assert!(journal.verify(&session).is_ok());
    }

    #[test]
    fn debits_are_outstanding_until_refunded() {
        let mut journal = EscrowJournal::new();
        let (session, a, b) = ids();
        journal.record(session, EntryKind::Debit, a, 50);
        journal.record(session, EntryKind::Debit, b, 50);
        assert_eq!(journal.outstanding(&session), vec![(a, 50), (b, 50)]);
        assert_eq!(journal.unsettled_sessions(), vec![session]);

        journal.record(session, EntryKind::Refund, a, 50);
        journal.record(session, EntryKind::Refund, b, 50);
        assert!(journal.outstanding(&session).is_empty());
        assert!(journal.is_closed(&session));
        assert!(journal.unsettled_sessions().is_empty());
    }

    #[test]
    fn plan_drives_outstanding_after_failed_payout() {
        let mut journal = EscrowJournal::new();
        let (session, a, b) = ids();
        journal.record(session, EntryKind::Debit, a, 50);
        journal.record(session, EntryKind::Debit, b, 50);
        journal.plan(session, vec![(a, 100)]).unwrap();
        assert_eq!(journal.outstanding(&session), vec![(a, 100)]);

        journal.record(session, EntryKind::Payout, a, 100);
        assert!(journal.outstanding(&session).is_empty());
        assert!(journal.is_closed(&session));
    }

    #[test]
    fn closed_session_leaves_the_books() {
        let mut journal = EscrowJournal::new();
        let (session, a, b) = ids();
        journal.record(session, EntryKind::Debit, a, 50);
        journal.record(session, EntryKind::Debit, b, 50);
        let open_digest = journal.digest(&session);
        journal.plan(session, vec![(b, 100)]).unwrap();
        journal.record(session, EntryKind::Payout, b, 100);

        assert_eq!(journal.open_books(), 0);
        assert_eq!(journal.archived(), 1);
        assert!(journal.entries(&session).is_empty());
        let closed = journal.closed_book(&session).unwrap();
        assert_eq!((closed.debited, closed.credited), (100, 100));
        assert_ne!(closed.digest, open_digest);
        assert_eq!(journal.digest(&session), closed.digest);
        assert_eq!(journal.total_credited(&session), 100);
    }

    #[test]
    fn second_plan_is_refused() {
        let mut journal = EscrowJournal::new();
        let (session, a, b) = ids();
        journal.record(session, EntryKind::Debit, a, 10);
        journal.record(session, EntryKind::Debit, b, 10);
        journal.plan(session, vec![(a, 20)]).unwrap();
        assert!(journal.is_settled(&session));

        let err = journal.plan(session, vec![(b, 20)]).unwrap_err();
        assert!(matches!(err, DropfourError::SessionAlreadySettled(id) if id == session));
        assert_eq!(journal.outstanding(&session), vec![(a, 20)]);

        journal.record(session, EntryKind::Payout, a, 20);
        let err = journal.plan(session, vec![(b, 20)]).unwrap_err();
        assert!(matches!(err, DropfourError::SessionAlreadySettled(_)));
    }

    #[test]
    fn plan_without_stakes_is_invalid() {
        let mut journal = EscrowJournal::new();
        let (session, a, _) = ids();
        let err = journal.plan(session, vec![(a, 10)]).unwrap_err();
        assert!(matches!(err, DropfourError::InvalidState { .. }));
        assert!(!journal.is_settled(&session));
    }

    #[test]
    fn claim_marks_session_settled() {
        let mut journal = EscrowJournal::new();
        let (session, a, b) = ids();
        journal.record(session, EntryKind::Debit, a, 5);
        journal.record(session, EntryKind::Debit, b, 5);
        assert_eq!(journal.claim(session), vec![(a, 5), (b, 5)]);
        assert!(journal.is_settled(&session));
        assert!(journal.plan(session, vec![(a, 10)]).is_err());
    }

    #[test]
    fn archive_evicts_oldest_closed_book_only() {
        let mut journal = EscrowJournal::with_archive_size(2);
        let (_, a, _) = ids();
        let sessions: Vec<SessionId> = (1..=3).map(|n| SessionId::from_bytes([n; 16])).collect();
        let open = SessionId::from_bytes([7; 16]);
        journal.record(open, EntryKind::Debit, a, 1);
        for session in &sessions {
            journal.record(*session, EntryKind::Debit, a, 10);
            journal.record(*session, EntryKind::Refund, a, 10);
        }

        assert_eq!(journal.archived(), 2);
        assert!(journal.closed_book(&sessions[0]).is_none());
        assert!(journal.closed_book(&sessions[2]).is_some());
        assert_eq!(journal.open_books(), 1);
        assert_eq!(journal.outstanding(&open), vec![(a, 1)]);
    }

    #[test]
    #[should_panic(expected = "archive_size must be > 0")]
    fn zero_archive_size_panics() {
        let _ = EscrowJournal::with_archive_size(0);
    }

    #[test]
    fn compensated_reservation_is_closed() {
        let mut journal = EscrowJournal::new();
        let (session, a, _) = ids();
        journal.record(session, EntryKind::Debit, a, 30);
        journal.record(session, EntryKind::Compensation, a, 30);
        assert!(journal.is_closed(&session));
        assert_eq!(journal.total_debited(&session), 30);
        assert_eq!(journal.total_credited(&session), 30);
    }

    #[test]
    fn over_credit_violates_invariant() {
        let mut journal = EscrowJournal::new();
        let (session, a, _) = ids();
        journal.record(session, EntryKind::Debit, a, 10);
        journal.record(session, EntryKind::Payout, a, 20);
        assert!(matches!(
            journal.verify(&session).unwrap_err(),
            DropfourError::EscrowInvariantViolation { .. }
        ));
    }

    #[test]
    fn digest_depends_on_entries() {
        let mut journal = EscrowJournal::new();
        let (session, a, b) = ids();
        let empty = journal.digest(&session);
        journal.record(session, EntryKind::Debit, a, 10);
        let one = journal.digest(&session);
        assert_ne!(empty, one);
        assert_eq!(one, journal.digest(&session));
        journal.record(session, EntryKind::Debit, b, 10);
        assert_ne!(one, journal.digest(&session));
    }

    #[test]
    fn entry_serde_roundtrip() {
        let (_, a, _) = ids();
        let entry = JournalEntry {
            kind: EntryKind::Refund,
            player: a,
            amount: 7,
            at: Utc::now(),
        };
        let json = serde_json::to_string(&entry).unwrap();
        let back: JournalEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(entry, back);
    }
}
