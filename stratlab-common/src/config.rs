//! Configuration management for stratlab.
//!
//! The configuration lives at `~/.stratlab/config.json`.
//!
//! # Configuration Priority
//!
//! 1. Environment variables (STRATLAB_* prefix)
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `STRATLAB_LOG_LEVEL` → observability.log_level
//! - `STRATLAB_LOG_FORMAT` → observability.log_format
//! - `STRATLAB_COMMISSION_RATE` → backtest.commission_rate
//! - `STRATLAB_RISK_FREE_RATE` → backtest.risk_free_rate
//! - `STRATLAB_MIN_ROWS` → backtest.min_rows
//! - `STRATLAB_TRADE_LIMIT` → backtest.trade_limit

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result, ResultExt};

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".stratlab"),
        |dirs| dirs.home_dir().join(".stratlab"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Observability
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

// ============================================================================
// Backtest defaults
// ============================================================================

/// Engine-wide constants for simulation runs.
///
/// Per-run values (capital, commission override, strategy params) come with
/// each request; these are the house defaults behind them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestDefaults {
    /// Minimum tradable share increment
    #[serde(default = "default_lot_size")]
    pub lot_size: u64,

    /// Commission as a fraction of trade notional, used when a run omits it
    #[serde(default = "default_commission_rate")]
    pub commission_rate: f64,

    /// Annual risk-free rate used by the Sharpe ratio
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: f64,

    /// Trading days per year for annualisation
    #[serde(default = "default_trading_days")]
    pub trading_days_per_year: u32,

    /// Minimum rows required inside the requested window
    #[serde(default = "default_min_rows")]
    pub min_rows: usize,

    /// Number of most recent trades returned to callers
    #[serde(default = "default_trade_limit")]
    pub trade_limit: usize,
}

impl Default for BacktestDefaults {
    fn default() -> Self {
        Self {
            lot_size: default_lot_size(),
            commission_rate: default_commission_rate(),
            risk_free_rate: default_risk_free_rate(),
            trading_days_per_year: default_trading_days(),
            min_rows: default_min_rows(),
            trade_limit: default_trade_limit(),
        }
    }
}

fn default_lot_size() -> u64 {
    100
}

fn default_commission_rate() -> f64 {
    0.001
}

fn default_risk_free_rate() -> f64 {
    0.03
}

fn default_trading_days() -> u32 {
    252
}

fn default_min_rows() -> usize {
    10
}

fn default_trade_limit() -> usize {
    20
}

// ============================================================================
// Root
// ============================================================================

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Backtest engine defaults
    #[serde(default)]
    pub backtest: BacktestDefaults,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .context(format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable overrides applied.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Unparseable numeric values are rejected rather than silently ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup("STRATLAB_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(format) = lookup("STRATLAB_LOG_FORMAT") {
            self.observability.log_format = format;
        }
        if let Some(raw) = lookup("STRATLAB_COMMISSION_RATE") {
            self.backtest.commission_rate = parse_override("STRATLAB_COMMISSION_RATE", &raw)?;
        }
        if let Some(raw) = lookup("STRATLAB_RISK_FREE_RATE") {
            self.backtest.risk_free_rate = parse_override("STRATLAB_RISK_FREE_RATE", &raw)?;
        }
        if let Some(raw) = lookup("STRATLAB_MIN_ROWS") {
            self.backtest.min_rows = parse_override("STRATLAB_MIN_ROWS", &raw)?;
        }
        if let Some(raw) = lookup("STRATLAB_TRADE_LIMIT") {
            self.backtest.trade_limit = parse_override("STRATLAB_TRADE_LIMIT", &raw)?;
        }
        Ok(())
    }

    /// Save configuration to a path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

fn parse_override<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| Error::Config(format!("{key} has invalid value '{raw}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.backtest.lot_size, 100);
        assert!((config.backtest.commission_rate - 0.001).abs() < 1e-12);
        assert!((config.backtest.risk_free_rate - 0.03).abs() < 1e-12);
        assert_eq!(config.backtest.trading_days_per_year, 252);
        assert_eq!(config.backtest.min_rows, 10);
        assert_eq!(config.backtest.trade_limit, 20);
        assert_eq!(config.observability.log_format, "pretty");
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"backtest": {"commission_rate": 0.0003}}"#).unwrap();
        assert!((config.backtest.commission_rate - 0.0003).abs() < 1e-12);
        assert_eq!(config.backtest.lot_size, 100);
        assert_eq!(config.observability.log_level, "info");
    }

    #[test]
    fn test_observability_aliases() {
        let config: Config =
            serde_json::from_str(r#"{"observability": {"level": "debug", "format": "json"}}"#)
                .unwrap();
        assert_eq!(config.observability.log_level, "debug");
        assert_eq!(config.observability.log_format, "json");
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::default();
        config.backtest.min_rows = 30;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.backtest.min_rows, 30);
    }

    #[test]
    fn test_load_from_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ nope").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[test]
    fn test_apply_overrides() {
        let vars: HashMap<&str, &str> = [
            ("STRATLAB_LOG_LEVEL", "debug"),
            ("STRATLAB_COMMISSION_RATE", "0.0005"),
            ("STRATLAB_TRADE_LIMIT", "50"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.observability.log_level, "debug");
        assert!((config.backtest.commission_rate - 0.0005).abs() < 1e-12);
        assert_eq!(config.backtest.trade_limit, 50);
        assert_eq!(config.backtest.min_rows, 10);
    }

    #[test]
    fn test_apply_overrides_rejects_garbage() {
        let mut config = Config::default();
        let err = config
            .apply_overrides(|key| (key == "STRATLAB_MIN_ROWS").then(|| "ten".to_string()))
            .unwrap_err();
        assert!(err.is_config());
    }
}
