//! System-wide constants for DropFour.

/// Number of grid rows. Row 0 is the top row.
pub const ROWS: usize = 6;

/// Number of grid columns.
pub const COLS: usize = 7;

/// Consecutive tokens needed to win.
pub const WIN_LENGTH: usize = 4;

/// How long the challenged player has to accept or decline, in seconds.
pub const DEFAULT_DECISION_TIMEOUT_SECS: u64 = 120;

/// How long a session waits for the next applied move, in seconds.
pub const DEFAULT_INACTIVITY_TIMEOUT_SECS: u64 = 600;

/// Balance credited to an account the first time the ledger sees it.
pub const DEFAULT_STARTING_BALANCE: u64 = 100;

/// Tag under which grid game results are recorded in statistics.
pub const DEFAULT_GAME_TAG: &str = "puissance4";

/// Number of closed escrow books the journal keeps for receipts.
pub const DEFAULT_JOURNAL_ARCHIVE_SIZE: usize = 100_000;

/// Default number of entries returned by a leaderboard query.
pub const DEFAULT_LEADERBOARD_SIZE: usize = 3;

/// Default tracing filter directive.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "DropFour";
