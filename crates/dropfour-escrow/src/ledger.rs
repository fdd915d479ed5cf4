//! The balance store the escrow runs against.
//!
//! The real store lives outside this workspace; [`Ledger`] is the boundary.
//! [`MemoryLedger`] is the in-process implementation used by tests and by
//! deployments that do not need persistence.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use dropfour_types::{DropfourError, PlayerId, Result, constants};
use tokio::sync::Mutex;

/// Per-player balance store.
///
/// Each call is atomic on its own. Nothing spans two players.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Current balance, creating the account with the starting balance if
    /// the player has none yet.
    async fn balance(&self, player: PlayerId) -> Result<u64>;

    /// Apply `delta` and return the new balance.
    ///
    /// Must fail with `BalanceUnderflow` instead of clamping when the result
    /// would be negative.
    async fn adjust(&self, player: PlayerId, delta: i64) -> Result<u64>;
}

/// Apply a signed delta to an unsigned balance without clamping.
///
/// # Errors
/// `BalanceUnderflow` below zero, `BalanceOverflow` past `u64::MAX`.
pub fn apply_delta(player: PlayerId, balance: u64, delta: i64) -> Result<u64> {
    if delta >= 0 {
        balance
            .checked_add(delta.unsigned_abs())
            .ok_or(DropfourError::BalanceOverflow { player })
    } else {
        balance
            .checked_sub(delta.unsigned_abs())
            .ok_or(DropfourError::BalanceUnderflow {
                player,
                balance,
                delta,
            })
    }
}

/// Convert an amount into a ledger delta.
///
/// # Errors
/// `BalanceOverflow` if the amount does not fit in an `i64`.
pub fn signed(player: PlayerId, amount: u64) -> Result<i64> {
    i64::try_from(amount).map_err(|_| DropfourError::BalanceOverflow { player })
}

/// In-memory [`Ledger`].
pub struct MemoryLedger {
    balances: Mutex<HashMap<PlayerId, u64>>,
    starting_balance: u64,
    /// Players whose adjustments fail, for fault-injection tests.
    failing: Mutex<HashSet<PlayerId>>,
}

impl MemoryLedger {
    /// Create a ledger that opens accounts with `starting_balance`.
    #[must_use]
    pub fn new(starting_balance: u64) -> Self {
        Self {
            balances: Mutex::new(HashMap::new()),
            starting_balance,
            failing: Mutex::new(HashSet::new()),
        }
    }

    /// Overwrite a player's balance.
    pub async fn set_balance(&self, player: PlayerId, amount: u64) {
        self.balances.lock().await.insert(player, amount);
    }

    /// Sum of every known balance.
    pub async fn total_supply(&self) -> u64 {
        self.balances.lock().await.values().sum()
    }

    /// Make every later `adjust` for `player` fail with `LedgerUnavailable`.
    #[cfg(any(test, feature = "test-helpers"))]
    pub async fn fail_adjustments_for(&self, player: PlayerId) {
        self.failing.lock().await.insert(player);
    }

    /// Undo [`MemoryLedger::fail_adjustments_for`].
    #[cfg(any(test, feature = "test-helpers"))]
    pub async fn restore(&self, player: PlayerId) {
        self.failing.lock().await.remove(&player);
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new(constants::DEFAULT_STARTING_BALANCE)
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn balance(&self, player: PlayerId) -> Result<u64> {
        let mut balances = self.balances.lock().await;
        Ok(*balances.entry(player).or_insert(self.starting_balance))
    }

    async fn adjust(&self, player: PlayerId, delta: i64) -> Result<u64> {
        if self.failing.lock().await.contains(&player) {
            return Err(DropfourError::LedgerUnavailable {
                reason: format!("adjustment refused for {player}"),
            });
        }
        let mut balances = self.balances.lock().await;
        let entry = balances.entry(player).or_insert(self.starting_balance);
        *entry = apply_delta(player, *entry, delta)?;
        Ok(*entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn new_account_gets_starting_balance() {
        let ledger = MemoryLedger::new(100);
        let player = PlayerId::new();
        assert_eq!(ledger.balance(player).await.unwrap(), 100);
        assert_eq!(ledger.total_supply().await, 100);
    }

    #[tokio::test]
    async fn adjust_moves_balance_both_ways() {
        let ledger = MemoryLedger::default();
        let player = PlayerId::new();
        assert_eq!(ledger.adjust(player, -40).await.unwrap(), 60);
        assert_eq!(ledger.adjust(player, 15).await.unwrap(), 75);
        assert_eq!(ledger.balance(player).await.unwrap(), 75);
    }

    #[tokio::test]
    async fn adjust_never_clamps() {
        let ledger = MemoryLedger::new(10);
        let player = PlayerId::new();
        let err = ledger.adjust(player, -11).await.unwrap_err();
        assert!(matches!(
            err,
            DropfourError::BalanceUnderflow {
                balance: 10,
                delta: -11,
                ..
            }
        ));
        assert_eq!(ledger.balance(player).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn injected_failures_leave_balance_untouched() {
        let ledger = MemoryLedger::new(50);
        let player = PlayerId::new();
        ledger.fail_adjustments_for(player).await;
        let err = ledger.adjust(player, -5).await.unwrap_err();
        assert!(matches!(err, DropfourError::LedgerUnavailable { .. }));
        assert_eq!(ledger.balance(player).await.unwrap(), 50);

        ledger.restore(player).await;
        assert_eq!(ledger.adjust(player, -5).await.unwrap(), 45);
    }

    #[test]
    fn apply_delta_bounds() {
        let player = PlayerId::new();
        assert_eq!(apply_delta(player, 5, -5).unwrap(), 0);
        assert!(matches!(
            apply_delta(player, u64::MAX, 1).unwrap_err(),
            DropfourError::BalanceOverflow { .. }
        ));
        assert!(matches!(
            signed(player, u64::MAX).unwrap_err(),
            DropfourError::BalanceOverflow { .. }
        ));
        assert_eq!(signed(player, 50).unwrap(), 50);
    }
}
