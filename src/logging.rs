//! Logging setup using tracing + tracing-subscriber.
//!
//! Logs go to stderr so stdout stays reserved for response JSON.
//! `RUST_LOG` takes precedence over the configured level.

use crate::core::{Error, Result};
use tracing_subscriber::EnvFilter;

/// Log output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Build the filter from `RUST_LOG`, falling back to `level`.
pub fn build_env_filter(level: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level)
            .map_err(|e| Error::invalid("log_level", format!("invalid log level {}: {}", level, e))),
    }
}

/// Install the global subscriber.
pub fn init(level: &str, format: LogFormat) -> Result<()> {
    let filter = build_env_filter(level)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    let installed = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| Error::Internal(format!("failed to initialise logging: {}", e)))?;

    tracing::debug!(level, json = format == LogFormat::Json, "logging initialised");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_filter_parses() {
        assert!(build_env_filter("info").is_ok());
        assert!(build_env_filter("consensus_guard=debug,warn").is_ok());
    }
}
