//! Subscriber setup for hosts that do not install their own.

use dropfour_types::{DropfourError, EngineConfig, Result};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Parse the configured filter directive.
///
/// # Errors
/// `Configuration` if `log_filter` is not a valid directive.
pub fn filter(config: &EngineConfig) -> Result<EnvFilter> {
    EnvFilter::try_new(&config.log_filter)
        .map_err(|e| DropfourError::Configuration(format!("invalid log_filter: {e}")))
}

/// Install a global subscriber from `log_filter` and `log_json`.
///
/// # Errors
/// `Configuration` for a bad filter or if a global subscriber is already set.
pub fn init(config: &EngineConfig) -> Result<()> {
    let registry = tracing_subscriber::registry().with(filter(config)?);
    let installed = if config.log_json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer()).try_init()
    };
    installed.map_err(|e| DropfourError::Configuration(format!("subscriber already set: {e}")))
}
