//! Run configuration and engine settings.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use stratlab_common::{BacktestDefaults, ValidationError, ValidationResult};

use crate::strategy::{Strategy, StrategyKind};

/// Accepted date layouts: ISO and the compact exchange form.
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y%m%d"];

/// Backtest request as supplied by the caller.
///
/// Fields stay loosely typed so that a malformed request surfaces as a
/// [`ValidationError`] from [`BacktestConfig::validate`] rather than a
/// deserialisation failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// Instrument code, e.g. `600519.SH`
    #[serde(default)]
    pub ts_code: String,
    /// Strategy name
    #[serde(default)]
    pub strategy_type: String,
    /// First date of the window (inclusive)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    /// Last date of the window (inclusive)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_capital: Option<f64>,
    /// Fraction of trade notional; engine default when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commission_rate: Option<f64>,
    /// Strategy-specific overrides (`ma_short`, `ma_long`, `oversold`, `overbought`)
    #[serde(default)]
    pub params: BTreeMap<String, f64>,
}

impl BacktestConfig {
    /// Config with every required field set.
    pub fn new(
        ts_code: impl Into<String>,
        strategy: StrategyKind,
        start_date: NaiveDate,
        end_date: NaiveDate,
        initial_capital: f64,
    ) -> Self {
        Self {
            ts_code: ts_code.into(),
            strategy_type: strategy.as_str().to_string(),
            start_date: Some(start_date.to_string()),
            end_date: Some(end_date.to_string()),
            initial_capital: Some(initial_capital),
            commission_rate: None,
            params: BTreeMap::new(),
        }
    }

    pub fn with_commission_rate(mut self, rate: f64) -> Self {
        self.commission_rate = Some(rate);
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: f64) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    /// Short human label: strategy name plus any parameter overrides.
    pub fn label(&self) -> String {
        if self.params.is_empty() {
            return self.strategy_type.clone();
        }
        let params = self
            .params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",");
        format!("{}[{}]", self.strategy_type, params)
    }

    /// Check every field and resolve the typed strategy.
    ///
    /// All problems are reported together.
    pub fn validate(&self, settings: &EngineSettings) -> ValidationResult<ValidatedConfig> {
        let mut errors = Vec::new();

        let ts_code = self.ts_code.trim();
        if ts_code.is_empty() {
            errors.push(ValidationError::missing("ts_code"));
        }

        let strategy = keep(
            &mut errors,
            self.strategy_type
                .parse::<StrategyKind>()
                .and_then(|kind| Strategy::from_params(kind, &self.params)),
        );

        let start_date = keep(&mut errors, parse_date("start_date", self.start_date.as_deref()));
        let end_date = keep(&mut errors, parse_date("end_date", self.end_date.as_deref()));
        if let (Some(start), Some(end)) = (start_date, end_date) {
            if start > end {
                errors.push(ValidationError::invalid(
                    "start_date",
                    format!("{start} is after end_date {end}"),
                ));
            }
        }

        let initial_capital = match self.initial_capital {
            None => {
                errors.push(ValidationError::missing("initial_capital"));
                None
            }
            Some(capital) if !capital.is_finite() || capital <= 0.0 => {
                errors.push(ValidationError::invalid(
                    "initial_capital",
                    format!("must be a positive amount, got {capital}"),
                ));
                None
            }
            Some(capital) => Some(capital),
        };

        let commission_rate = self
            .commission_rate
            .unwrap_or(settings.default_commission_rate);
        if !(0.0..1.0).contains(&commission_rate) {
            errors.push(ValidationError::invalid(
                "commission_rate",
                format!("must be within [0, 1), got {commission_rate}"),
            ));
        }

        ValidationError::collect(errors)?;

        let (Some(strategy), Some(start_date), Some(end_date), Some(initial_capital)) =
            (strategy, start_date, end_date, initial_capital)
        else {
            return Err(ValidationError::invalid("config", "incomplete configuration"));
        };

        Ok(ValidatedConfig {
            ts_code: ts_code.to_string(),
            strategy,
            start_date,
            end_date,
            initial_capital,
            commission_rate,
        })
    }
}

/// A checked configuration, fixed for the duration of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatedConfig {
    pub ts_code: String,
    pub strategy: Strategy,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: f64,
    pub commission_rate: f64,
}

/// Engine-wide settings shared by every run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    pub lot_size: u64,
    /// Used when a run does not set its own commission rate
    pub default_commission_rate: f64,
    pub risk_free_rate: f64,
    pub trading_days_per_year: u32,
    /// Minimum rows inside the requested window
    pub min_rows: usize,
    /// Trades kept when a result is turned into a response
    pub trade_limit: usize,
}

impl From<&BacktestDefaults> for EngineSettings {
    fn from(defaults: &BacktestDefaults) -> Self {
        Self {
            lot_size: defaults.lot_size,
            default_commission_rate: defaults.commission_rate,
            risk_free_rate: defaults.risk_free_rate,
            trading_days_per_year: defaults.trading_days_per_year,
            min_rows: defaults.min_rows,
            trade_limit: defaults.trade_limit,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&BacktestDefaults::default())
    }
}

fn keep<T>(errors: &mut Vec<ValidationError>, result: ValidationResult<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            errors.push(e);
            None
        }
    }
}

fn parse_date(field: &str, value: Option<&str>) -> ValidationResult<NaiveDate> {
    let value = value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ValidationError::missing(field))?;

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .ok_or_else(|| {
            ValidationError::invalid(field, format!("'{value}' is not a date (expected YYYY-MM-DD)"))
        })
}
