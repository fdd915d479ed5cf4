//! # dropfour-escrow
//!
//! **Wager escrow over an external ledger.**
//!
//! A wagered session debits both players before play starts and credits
//! them when it ends. The ledger only offers single-player adjustments, so
//! this crate keeps an [`EscrowJournal`] of every call it makes and uses it
//! to compensate partial failures and to reconcile leftovers.
//!
//! - [`Ledger`]: the balance store boundary, with [`MemoryLedger`]
//! - [`EscrowAdapter`]: `reserve`, `settle_win`, `settle_refund`, `reconcile`
//! - [`EscrowJournal`]: one settlement plan per session, so a pot is paid at
//!   most once; balanced books are archived

pub mod adapter;
pub mod journal;
pub mod ledger;

pub use adapter::{EscrowAdapter, ReconcileReport, Reservation, SettlementReceipt};
pub use journal::{ClosedBook, EntryKind, EscrowJournal, JournalEntry};
pub use ledger::{Ledger, MemoryLedger, apply_delta, signed};
