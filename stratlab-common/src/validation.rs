//! Configuration validation.
//!
//! Provides validation logic for configuration fields to ensure
//! all required values are present and within valid ranges.

use thiserror::Error;

use crate::config::{BacktestDefaults, Config, ObservabilityConfig};

/// Configuration validation error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

impl ValidationError {
    /// Shorthand for a missing field.
    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Shorthand for an out-of-range or malformed value.
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Collapse a list of errors into one, or `Ok` when empty.
    pub fn collect(mut errors: Vec<ValidationError>) -> ValidationResult<()> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(Self::Multiple(errors)),
        }
    }

    /// Names of every field involved in this error.
    pub fn fields(&self) -> Vec<&str> {
        match self {
            Self::MissingField { field } | Self::InvalidValue { field, .. } => vec![field.as_str()],
            Self::Multiple(errors) => errors.iter().flat_map(|e| e.fields()).collect(),
        }
    }
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

impl Validate for Config {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = self.observability.validate() {
            errors.push(e);
        }
        if let Err(e) = self.backtest.validate() {
            errors.push(e);
        }

        ValidationError::collect(errors)
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        const LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

        if !LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ValidationError::invalid(
                "observability.log_level",
                format!("must be one of {LEVELS:?}"),
            ));
        }
        if self.log_format != "json" && self.log_format != "pretty" {
            return Err(ValidationError::invalid(
                "observability.log_format",
                "must be 'json' or 'pretty'",
            ));
        }
        Ok(())
    }
}

impl Validate for BacktestDefaults {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if self.lot_size == 0 {
            errors.push(ValidationError::invalid(
                "backtest.lot_size",
                "must be greater than 0",
            ));
        }
        if !(0.0..1.0).contains(&self.commission_rate) {
            errors.push(ValidationError::invalid(
                "backtest.commission_rate",
                "must be in [0, 1)",
            ));
        }
        if !self.risk_free_rate.is_finite() {
            errors.push(ValidationError::invalid(
                "backtest.risk_free_rate",
                "must be finite",
            ));
        }
        if self.trading_days_per_year == 0 {
            errors.push(ValidationError::invalid(
                "backtest.trading_days_per_year",
                "must be greater than 0",
            ));
        }
        if self.min_rows < 2 {
            errors.push(ValidationError::invalid(
                "backtest.min_rows",
                "must be at least 2",
            ));
        }

        ValidationError::collect(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test_case("json", true ; "json format")]
    #[test_case("pretty", true ; "pretty format")]
    #[test_case("xml", false ; "unknown format")]
    fn test_log_format(format: &str, ok: bool) {
        let config = ObservabilityConfig {
            log_format: format.into(),
            ..Default::default()
        };
        assert_eq!(config.validate().is_ok(), ok);
    }

    #[test]
    fn test_backtest_defaults_collects_all_errors() {
        let defaults = BacktestDefaults {
            lot_size: 0,
            commission_rate: 1.5,
            min_rows: 1,
            ..Default::default()
        };

        let err = defaults.validate().unwrap_err();
        assert_eq!(
            err.fields(),
            vec!["backtest.lot_size", "backtest.commission_rate", "backtest.min_rows"]
        );
    }

    #[test]
    fn test_single_error_is_not_wrapped() {
        let defaults = BacktestDefaults {
            trading_days_per_year: 0,
            ..Default::default()
        };
        assert!(matches!(
            defaults.validate(),
            Err(ValidationError::InvalidValue { .. })
        ));
    }
}
