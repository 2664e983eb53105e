//! Ledger configuration
//!
//! Loaded in layers with the `config` crate: built-in defaults, then an
//! optional TOML file, then `TIMELOCK_*` environment variables
//! (`TIMELOCK_ESCROW_ADDRESS`, `TIMELOCK_ADMIN_ADDRESS`, `TIMELOCK_LOG_LEVEL`).

use crate::{
    EscrowResult,
    clock::{Clock, ManualClock, SystemClock},
    telemetry,
};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::{path::Path, sync::Arc};
use timelock_core::{Address, UnixTimestamp};

/// Default log level when none is configured
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Time source selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ClockMode {
    /// Wall-clock time
    #[default]
    System,
    /// Fixed start time, moved only through a [`ManualClock`] handle
    Manual { start: UnixTimestamp },
}

/// Configuration for the escrow ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Account holding escrowed tokens
    pub escrow_address: Address,
    /// Principal allowed to force releases; fixed for the ledger's lifetime
    pub admin_address: Address,
    /// tracing level filter (`trace`, `debug`, `info`, `warn`, `error`)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub clock: ClockMode,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl LedgerConfig {
    /// Config with default log level and system clock
    pub fn new(escrow_address: &str, admin_address: &str) -> EscrowResult<Self> {
        Ok(Self {
            escrow_address: Address::new(escrow_address)?,
            admin_address: Address::new(admin_address)?,
            log_level: default_log_level(),
            clock: ClockMode::default(),
        })
    }

    /// Load configuration from an optional TOML file and the environment
    pub fn load(path: Option<&Path>) -> EscrowResult<Self> {
        let mut builder = Config::builder().set_default("log_level", DEFAULT_LOG_LEVEL)?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }

        let config: Self = builder
            .add_source(Environment::with_prefix("TIMELOCK"))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string, without environment overrides
    pub fn from_toml_str(toml: &str) -> EscrowResult<Self> {
        let config: Self = Config::builder()
            .set_default("log_level", DEFAULT_LOG_LEVEL)?
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Check values the type system does not cover
    pub fn validate(&self) -> EscrowResult<()> {
        telemetry::parse_level(&self.log_level)?;
        Ok(())
    }

    /// Time source matching [`LedgerConfig::clock`]
    pub fn build_clock(&self) -> Arc<dyn Clock> {
        match self.clock {
            ClockMode::System => Arc::new(SystemClock),
            ClockMode::Manual { start } => Arc::new(ManualClock::new(start)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EscrowError;

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config = LedgerConfig::from_toml_str(
            r#"
            escrow_address = "escrow"
            admin_address = "admin"
            "#,
        )
        .unwrap();

        assert_eq!(config.escrow_address, Address::new("escrow").unwrap());
        assert_eq!(config.admin_address, Address::new("admin").unwrap());
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.clock, ClockMode::System);
    }

    #[test]
    fn test_manual_clock_mode() {
        let config = LedgerConfig::from_toml_str(
            r#"
            escrow_address = "escrow"
            admin_address = "admin"
            log_level = "debug"

            [clock]
            mode = "manual"
            start = 1700000000
            "#,
        )
        .unwrap();

        assert_eq!(config.clock, ClockMode::Manual { start: 1_700_000_000 });
        assert_eq!(config.build_clock().now(), 1_700_000_000);
    }

    #[test]
    fn test_missing_admin_rejected() {
        let result = LedgerConfig::from_toml_str(r#"escrow_address = "escrow""#);
        assert!(matches!(result, Err(EscrowError::Config(_))));
    }

    #[test]
    fn test_unknown_log_level_rejected() {
        let result = LedgerConfig::from_toml_str(
            r#"
            escrow_address = "escrow"
            admin_address = "admin"
            log_level = "loud"
            "#,
        );
        assert!(matches!(result, Err(EscrowError::Config(msg)) if msg.contains("loud")));
    }

    #[test]
    fn test_new_validates_addresses() {
        let config = LedgerConfig::new("escrow", "admin").unwrap();
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.clock, ClockMode::System);

        let result = LedgerConfig::new("escrow", "");
        assert!(matches!(result, Err(EscrowError::Config(msg)) if msg.contains("invalid address")));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("timelock-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            "escrow_address = \"vault\"\nadmin_address = \"operator\"\n",
        )
        .unwrap();

        let config = LedgerConfig::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.escrow_address.as_str(), "vault");
        assert_eq!(config.admin_address.as_str(), "operator");
    }
}
