//! Tracing subscriber setup for the binary.

use crate::error::{PodgenError, Result};
use tracing_subscriber::EnvFilter;

/// Level after applying `-q` / `-v` to the configured one.
pub fn effective_level(configured: &str, verbosity: u8, quiet: bool) -> String {
    if quiet {
        return "error".to_string();
    }
    match verbosity {
        0 => configured.to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

/// Install the global subscriber, logging to stderr.
///
/// `RUST_LOG` takes precedence over everything else when set.
pub fn init(configured: &str, verbosity: u8, quiet: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(effective_level(configured, verbosity, quiet)))
        .map_err(|e| PodgenError::ConfigInvalidValue {
            key: "logging.level".to_string(),
            message: e.to_string(),
        })?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| PodgenError::Other(format!("Failed to initialise logging: {e}")))
}
