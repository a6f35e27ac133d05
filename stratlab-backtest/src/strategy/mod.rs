//! Technical strategies and signal generation.
//!
//! A strategy is a closed set of variants; generating signals is a pure
//! function of the series and the strategy, producing one signal per row.

mod rules;
mod signal;

pub use rules::{band_signals, crossing_signals, rolling_mean, threshold_signals};
pub use signal::{Signal, SignalPoint};

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use stratlab_common::{ValidationError, ValidationResult};

use crate::data::IndicatorSeries;

/// Strategy names accepted in run configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    MaCrossover,
    Macd,
    Kdj,
    Rsi,
    Bollinger,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 5] = [
        Self::MaCrossover,
        Self::Macd,
        Self::Kdj,
        Self::Rsi,
        Self::Bollinger,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MaCrossover => "ma_crossover",
            Self::Macd => "macd",
            Self::Kdj => "kdj",
            Self::Rsi => "rsi",
            Self::Bollinger => "bollinger",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ma_crossover" | "ma_cross" => Ok(Self::MaCrossover),
            "macd" => Ok(Self::Macd),
            "kdj" => Ok(Self::Kdj),
            "rsi" => Ok(Self::Rsi),
            "bollinger" => Ok(Self::Bollinger),
            "" => Err(ValidationError::missing("strategy_type")),
            other => Err(ValidationError::invalid(
                "strategy_type",
                format!(
                    "unknown strategy '{other}', expected one of: ma_crossover, macd, kdj, rsi, bollinger"
                ),
            )),
        }
    }
}

/// A fully parameterised strategy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Strategy {
    /// Short/long rolling mean of close crossing
    MaCrossover { short: usize, long: usize },
    /// MACD line crossing DEA
    Macd,
    /// K crossing the oversold/overbought thresholds
    Kdj { oversold: f64, overbought: f64 },
    /// RSI(6) crossing the oversold/overbought thresholds
    Rsi { oversold: f64, overbought: f64 },
    /// Close at or beyond a Bollinger band
    Bollinger,
}

impl Strategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::MaCrossover { .. } => StrategyKind::MaCrossover,
            Self::Macd => StrategyKind::Macd,
            Self::Kdj { .. } => StrategyKind::Kdj,
            Self::Rsi { .. } => StrategyKind::Rsi,
            Self::Bollinger => StrategyKind::Bollinger,
        }
    }

    /// Resolve a strategy from its kind and user overrides.
    ///
    /// Unknown keys are ignored. Defaults: `ma_short=5`, `ma_long=20`;
    /// KDJ `oversold=20`, `overbought=80`; RSI `oversold=30`, `overbought=70`.
    pub fn from_params(kind: StrategyKind, params: &BTreeMap<String, f64>) -> ValidationResult<Self> {
        match kind {
            StrategyKind::MaCrossover => {
                let short = window_param(params, "ma_short", 5)?;
                let long = window_param(params, "ma_long", 20)?;
                if short >= long {
                    return Err(ValidationError::invalid(
                        "params.ma_short",
                        format!("must be less than ma_long ({short} >= {long})"),
                    ));
                }
                Ok(Self::MaCrossover { short, long })
            }
            StrategyKind::Macd => Ok(Self::Macd),
            StrategyKind::Kdj => {
                let (oversold, overbought) = threshold_params(params, 20.0, 80.0)?;
                Ok(Self::Kdj { oversold, overbought })
            }
            StrategyKind::Rsi => {
                let (oversold, overbought) = threshold_params(params, 30.0, 70.0)?;
                Ok(Self::Rsi { oversold, overbought })
            }
            StrategyKind::Bollinger => Ok(Self::Bollinger),
        }
    }

    /// Generate one signal per row of `series`, in order.
    pub fn signals(&self, series: &IndicatorSeries) -> Vec<Signal> {
        match *self {
            Self::MaCrossover { short, long } => {
                let closes = series.closes();
                crossing_signals(&rolling_mean(&closes, short), &rolling_mean(&closes, long))
            }
            Self::Macd => crossing_signals(
                &series.column(|r| r.indicators.macd),
                &series.column(|r| r.indicators.macd_dea),
            ),
            Self::Kdj {
                oversold,
                overbought,
            } => threshold_signals(&series.column(|r| r.indicators.kdj_k), oversold, overbought),
            Self::Rsi {
                oversold,
                overbought,
            } => threshold_signals(&series.column(|r| r.indicators.rsi_6), oversold, overbought),
            Self::Bollinger => band_signals(
                &series.closes(),
                &series.column(|r| r.indicators.boll_upper),
                &series.column(|r| r.indicators.boll_lower),
            ),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MaCrossover { short, long } => write!(f, "ma_crossover({short},{long})"),
            Self::Kdj {
                oversold,
                overbought,
            } => write!(f, "kdj({oversold},{overbought})"),
            Self::Rsi {
                oversold,
                overbought,
            } => write!(f, "rsi({oversold},{overbought})"),
            Self::Macd | Self::Bollinger => f.write_str(self.kind().as_str()),
        }
    }
}

/// Generate dated signals for `series`.
pub fn generate_signals(series: &IndicatorSeries, strategy: &Strategy) -> Vec<SignalPoint> {
    series
        .rows()
        .iter()
        .zip(strategy.signals(series))
        .map(|(row, signal)| SignalPoint {
            date: row.date(),
            signal,
        })
        .collect()
}

fn window_param(params: &BTreeMap<String, f64>, key: &str, default: usize) -> ValidationResult<usize> {
    let Some(&value) = params.get(key) else {
        return Ok(default);
    };
    if !value.is_finite() || value < 1.0 || value.fract() != 0.0 {
        return Err(ValidationError::invalid(
            format!("params.{key}"),
            format!("must be a positive whole number, got {value}"),
        ));
    }
    Ok(value as usize)
}

fn threshold_params(
    params: &BTreeMap<String, f64>,
    default_oversold: f64,
    default_overbought: f64,
) -> ValidationResult<(f64, f64)> {
    let oversold = params.get("oversold").copied().unwrap_or(default_oversold);
    let overbought = params.get("overbought").copied().unwrap_or(default_overbought);

    for (key, value) in [("oversold", oversold), ("overbought", overbought)] {
        if !(0.0..=100.0).contains(&value) {
            return Err(ValidationError::invalid(
                format!("params.{key}"),
                format!("must be within [0, 100], got {value}"),
            ));
        }
    }
    if oversold >= overbought {
        return Err(ValidationError::invalid(
            "params.oversold",
            format!("must be less than overbought ({oversold} >= {overbought})"),
        ));
    }
    Ok((oversold, overbought))
}
