//! Engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{DropfourError, Result, constants};

/// Runtime knobs for the game engine.
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```
/// # use dropfour_types::EngineConfig;
/// let cfg = EngineConfig::from_json(r#"{ "decision_timeout_secs": 30 }"#).unwrap();
/// assert_eq!(cfg.decision_timeout_secs, 30);
/// assert_eq!(cfg.inactivity_timeout_secs, 600);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Bounded wait for the opponent's accept/decline.
    pub decision_timeout_secs: u64,
    /// Bounded wait for the next applied move.
    pub inactivity_timeout_secs: u64,
    /// Balance of an account the ledger sees for the first time.
    pub starting_balance: u64,
    /// Tag under which results are recorded in statistics.
    pub game_tag: String,
    /// Number of closed escrow books kept for receipts and audits.
    pub journal_archive_size: usize,
    /// Refund both stakes when a wagered session expires mid-game.
    /// When off, the stakes stay journaled as outstanding until reconciled.
    pub refund_on_expiry: bool,
    /// `tracing` filter directive, e.g. `info` or `dropfour_session=debug`.
    pub log_filter: String,
    /// Emit logs as JSON lines instead of the human-readable format.
    pub log_json: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            decision_timeout_secs: constants::DEFAULT_DECISION_TIMEOUT_SECS,
            inactivity_timeout_secs: constants::DEFAULT_INACTIVITY_TIMEOUT_SECS,
            starting_balance: constants::DEFAULT_STARTING_BALANCE,
            game_tag: constants::DEFAULT_GAME_TAG.to_string(),
            journal_archive_size: constants::DEFAULT_JOURNAL_ARCHIVE_SIZE,
            refund_on_expiry: true,
            log_filter: constants::DEFAULT_LOG_FILTER.to_string(),
            log_json: false,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON configuration document.
    ///
    /// # Errors
    /// `Serialization` for malformed JSON, `Configuration` for invalid values.
    pub fn from_json(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.decision_timeout_secs == 0 {
            return Err(DropfourError::Configuration(
                "decision_timeout_secs must be > 0".into(),
            ));
        }
        if self.inactivity_timeout_secs == 0 {
            return Err(DropfourError::Configuration(
                "inactivity_timeout_secs must be > 0".into(),
            ));
        }
        if self.game_tag.trim().is_empty() {
            return Err(DropfourError::Configuration(
                "game_tag must not be empty".into(),
            ));
        }
        if self.journal_archive_size == 0 {
            return Err(DropfourError::Configuration(
                "journal_archive_size must be > 0".into(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn decision_timeout(&self) -> Duration {
        Duration::from_secs(self.decision_timeout_secs)
    }

    #[must_use]
    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_secs(self.inactivity_timeout_secs)
    }
}
