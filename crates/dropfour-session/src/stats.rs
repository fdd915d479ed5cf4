//! Win/loss statistics per player and game.

use std::collections::HashMap;

use async_trait::async_trait;
use dropfour_types::{DropfourError, PlayerId, Result, constants};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// Persistent statistics store.
///
/// Both calls upsert: an absent (player, game) row is created at zero and
/// then incremented.
#[async_trait]
pub trait StatsRecorder: Send + Sync {
    async fn record_win(&self, player: PlayerId, game: &str) -> Result<()>;
    async fn record_loss(&self, player: PlayerId, game: &str) -> Result<()>;
}

/// Counters for one player in one game.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    pub wins: u64,
    pub losses: u64,
}

impl GameRecord {
    #[must_use]
    pub fn played(&self) -> u64 {
        self.wins + self.losses
    }

    /// Win percentage rounded half up, 0 when nothing was played.
    #[must_use]
    pub fn win_rate(&self) -> u64 {
        let played = self.played();
        if played == 0 {
            return 0;
        }
        (self.wins * 100 + played / 2) / played
    }
}

/// One game line of a player summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameLine {
    pub game: String,
    pub record: GameRecord,
    pub win_rate: u64,
}

/// Everything a player has played, per game and in total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSummary {
    pub player: PlayerId,
    /// Sorted by game tag.
    pub games: Vec<GameLine>,
    pub total: GameRecord,
}

/// A leaderboard row, totals across all games.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standing {
    pub player: PlayerId,
    pub total: GameRecord,
    pub win_rate: u64,
}

/// In-memory [`StatsRecorder`] with the read side of the stats commands.
#[derive(Default)]
pub struct StatsBook {
    records: Mutex<HashMap<(PlayerId, String), GameRecord>>,
    failing: Mutex<bool>,
}

impl StatsBook {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters for one (player, game) pair, zero if absent.
    pub async fn record(&self, player: PlayerId, game: &str) -> GameRecord {
        self.records
            .lock()
            .await
            .get(&(player, game.to_string()))
            .copied()
            .unwrap_or_default()
    }

    /// Per-game lines and totals, or `None` if the player never played.
    pub async fn summary(&self, player: PlayerId) -> Option<PlayerSummary> {
        let records = self.records.lock().await;
        let mut games: Vec<GameLine> = records
            .iter()
            .filter(|((id, _), _)| *id == player)
            .map(|((_, game), record)| GameLine {
                game: game.clone(),
                record: *record,
                win_rate: record.win_rate(),
            })
            .collect();
        if games.is_empty() {
            return None;
        }
        games.sort_by(|a, b| a.game.cmp(&b.game));

        let total = games.iter().fold(GameRecord::default(), |acc, line| GameRecord {
            wins: acc.wins + line.record.wins,
            losses: acc.losses + line.record.losses,
        });
        Some(PlayerSummary {
            player,
            games,
            total,
        })
    }

    /// Players by total wins across all games, best first.
    ///
    /// Ties are broken by player id so the order is stable.
    pub async fn leaderboard(&self, limit: usize) -> Vec<Standing> {
        let records = self.records.lock().await;
        let mut totals: HashMap<PlayerId, GameRecord> = HashMap::new();
        for ((player, _), record) in records.iter() {
            let total = totals.entry(*player).or_default();
            total.wins += record.wins;
            total.losses += record.losses;
        }
        let mut standings: Vec<Standing> = totals
            .into_iter()
            .map(|(player, total)| Standing {
                player,
                total,
                win_rate: total.win_rate(),
            })
            .collect();
        standings.sort_by(|a, b| {
            b.total
                .wins
                .cmp(&a.total.wins)
                .then_with(|| a.player.cmp(&b.player))
        });
        standings.truncate(limit);
        standings
    }

    /// Leaderboard with the default podium size.
    pub async fn podium(&self) -> Vec<Standing> {
        self.leaderboard(constants::DEFAULT_LEADERBOARD_SIZE).await
    }

    /// Make every later write fail with `StatsWriteFailed`.
    #[cfg(any(test, feature = "test-helpers"))]
    pub async fn fail_writes(&self, failing: bool) {
        *self.failing.lock().await = failing;
    }

    async fn bump(&self, player: PlayerId, game: &str, win: bool) -> Result<()> {
        if *self.failing.lock().await {
            return Err(DropfourError::StatsWriteFailed {
                reason: format!("write refused for {player} in {game}"),
            });
        }
        let mut records = self.records.lock().await;
        let record = records.entry((player, game.to_string())).or_default();
        if win {
            record.wins += 1;
        } else {
            record.losses += 1;
        }
        Ok(())
    }
}

#[async_trait]
impl StatsRecorder for StatsBook {
    async fn record_win(&self, player: PlayerId, game: &str) -> Result<()> {
        self.bump(player, game, true).await
    }

    async fn record_loss(&self, player: PlayerId, game: &str) -> Result<()> {
        self.bump(player, game, false).await
    }
}
