//! Backtest error taxonomy.
//!
//! Every error here is a local, deterministic failure: a run either
//! completes fully or fails fully, and nothing is retried.

use chrono::NaiveDate;
use stratlab_common::ValidationError;
use thiserror::Error;

/// Result type alias for backtest operations.
pub type Result<T> = std::result::Result<T, BacktestError>;

/// Errors surfaced by a backtest run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BacktestError {
    /// Missing or malformed run configuration
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Too few rows in the requested window
    #[error("Insufficient data: found {found} rows in the requested window, need at least {required}")]
    DataInsufficiency { found: usize, required: usize },

    /// A required price or indicator field is missing or not a number
    #[error("Data integrity error on {date}: field '{field}' is missing or invalid")]
    DataIntegrity { date: NaiveDate, field: &'static str },

    /// Run was cancelled before it started
    #[error("Run cancelled")]
    Cancelled,
}

impl BacktestError {
    /// Stable machine-readable error kind.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::DataInsufficiency { .. } => "data_insufficiency_error",
            Self::DataIntegrity { .. } => "data_integrity_error",
            Self::Cancelled => "cancelled",
        }
    }

    /// HTTP status code a calling layer should map this error to.
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::DataInsufficiency { .. } | Self::DataIntegrity { .. } => 422,
            Self::Cancelled => 499,
        }
    }

    pub(crate) fn integrity(date: NaiveDate, field: &'static str) -> Self {
        Self::DataIntegrity { date, field }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_and_status() {
        let validation = BacktestError::from(ValidationError::missing("ts_code"));
        assert_eq!(validation.kind(), "validation_error");
        assert_eq!(validation.status_code(), 400);

        let insufficient = BacktestError::DataInsufficiency {
            found: 4,
            required: 10,
        };
        assert_eq!(insufficient.kind(), "data_insufficiency_error");
        assert!(insufficient.to_string().contains("found 4 rows"));

        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let integrity = BacktestError::integrity(date, "close");
        assert_eq!(integrity.status_code(), 422);
        assert!(integrity.to_string().contains("2024-03-01"));
        assert!(integrity.to_string().contains("'close'"));
    }
}
