//! Logging setup

use crate::{EscrowResult, error::EscrowError};
use tracing::Level;

/// Parse a tracing level name
pub fn parse_level(level: &str) -> EscrowResult<Level> {
    level
        .parse::<Level>()
        .map_err(|_| EscrowError::config(format!("Unknown log level: {}", level)))
}

/// Install a fmt subscriber at `level`
///
/// A no-op if a global subscriber is already installed.
pub fn init_tracing(level: &str) -> EscrowResult<()> {
    let level = parse_level(level)?;
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init();
    Ok(())
}
