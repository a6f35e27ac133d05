//! Parallel strategy comparison and parameter sweeps.
//!
//! Runs share nothing but the read-only series, so they fan out across the
//! rayon pool. Cancellation is checked once, before each run starts.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::config::BacktestConfig;
use super::engine::BacktestEngine;
use super::metrics::PerformanceReport;
use crate::data::IndicatorSeries;
use crate::error::BacktestError;

/// One run in a comparison.
#[derive(Debug, Clone, Serialize)]
pub struct StrategyRun {
    /// Strategy name plus parameter overrides
    pub label: String,
    #[serde(flatten)]
    pub outcome: RunOutcome,
}

/// How a run ended.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed {
        run_id: String,
        performance: PerformanceReport,
    },
    Failed {
        kind: String,
        message: String,
    },
}

impl StrategyRun {
    fn failed(label: String, error: &BacktestError) -> Self {
        Self {
            label,
            outcome: RunOutcome::Failed {
                kind: error.kind().to_string(),
                message: error.to_string(),
            },
        }
    }

    pub fn performance(&self) -> Option<&PerformanceReport> {
        match &self.outcome {
            RunOutcome::Completed { performance, .. } => Some(performance),
            RunOutcome::Failed { .. } => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(&self.outcome, RunOutcome::Failed { kind, .. } if kind == "cancelled")
    }
}

/// Labels of the best completed runs per metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestStrategies {
    pub highest_return: String,
    pub highest_sharpe: String,
    pub lowest_drawdown: String,
    pub highest_win_rate: String,
}

/// Aggregate over completed runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonSummary {
    pub total_strategies: usize,
    pub completed: usize,
    pub failed: usize,
    pub avg_return: f64,
    pub avg_sharpe: f64,
    pub avg_drawdown: f64,
}

/// Result of [`compare_strategies`].
#[derive(Debug, Clone, Serialize)]
pub struct StrategyComparison {
    /// One entry per input config, in input order
    pub runs: Vec<StrategyRun>,
    /// `None` when no run completed
    pub best_strategy: Option<BestStrategies>,
    pub summary: ComparisonSummary,
}

/// Run every config over `series` in parallel and rank the results.
///
/// Setting `cancel` makes every run that has not started yet fail with
/// [`BacktestError::Cancelled`]; runs already in flight finish normally.
pub fn compare_strategies(
    engine: &BacktestEngine,
    series: &IndicatorSeries,
    configs: &[BacktestConfig],
    cancel: &AtomicBool,
) -> StrategyComparison {
    let progress = AtomicUsize::new(0);
    let total = configs.len();

    let runs: Vec<StrategyRun> = configs
        .par_iter()
        .map(|config| {
            let label = config.label();
            if cancel.load(Ordering::Relaxed) {
                return StrategyRun::failed(label, &BacktestError::Cancelled);
            }

            let run = match engine.run_series(config, series) {
                Ok(result) => StrategyRun {
                    label,
                    outcome: RunOutcome::Completed {
                        run_id: result.run_id,
                        performance: result.performance,
                    },
                },
                Err(e) => StrategyRun::failed(label, &e),
            };

            let done = progress.fetch_add(1, Ordering::Relaxed) + 1;
            if done % (total / 10).max(1) == 0 || done == total {
                info!("Strategy comparison: {}/{} runs finished", done, total);
            }
            run
        })
        .collect();

    let completed: Vec<(&str, &PerformanceReport)> = runs
        .iter()
        .filter_map(|run| run.performance().map(|p| (run.label.as_str(), p)))
        .collect();

    let summary = ComparisonSummary {
        total_strategies: runs.len(),
        completed: completed.len(),
        failed: runs.len() - completed.len(),
        avg_return: mean(completed.iter().map(|(_, p)| p.total_return)),
        avg_sharpe: mean(completed.iter().map(|(_, p)| p.sharpe_ratio)),
        avg_drawdown: mean(completed.iter().map(|(_, p)| p.max_drawdown)),
    };

    let best_strategy = (!completed.is_empty()).then(|| BestStrategies {
        highest_return: best_by(&completed, |p| p.total_return),
        highest_sharpe: best_by(&completed, |p| p.sharpe_ratio),
        lowest_drawdown: best_by(&completed, |p| -p.max_drawdown),
        highest_win_rate: best_by(&completed, |p| p.win_rate),
    });

    StrategyComparison {
        runs,
        best_strategy,
        summary,
    }
}

/// First label with the highest `key`.
fn best_by<F>(completed: &[(&str, &PerformanceReport)], key: F) -> String
where
    F: Fn(&PerformanceReport) -> f64,
{
    completed
        .iter()
        .fold(None::<(&str, f64)>, |best, &(label, performance)| {
            let value = key(performance);
            match best {
                Some((_, best_value)) if value <= best_value => best,
                _ => Some((label, value)),
            }
        })
        .map(|(label, _)| label.to_string())
        .unwrap_or_default()
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Cartesian grid of strategy parameter values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterGrid {
    /// Parameter name to candidate values
    #[serde(default)]
    pub params: BTreeMap<String, Vec<f64>>,
}

impl ParameterGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace one axis.
    pub fn axis(mut self, key: impl Into<String>, values: impl IntoIterator<Item = f64>) -> Self {
        self.params.insert(key.into(), values.into_iter().collect());
        self
    }

    /// Calculate total number of parameter combinations, before pruning.
    pub fn total_combinations(&self) -> usize {
        self.params.values().map(Vec::len).product()
    }

    /// Generate all parameter combinations.
    ///
    /// Combinations with `ma_short >= ma_long` or `oversold >= overbought`
    /// can never validate and are skipped.
    pub fn combinations(&self) -> Vec<BTreeMap<String, f64>> {
        let mut combos = vec![BTreeMap::new()];

        for (key, values) in &self.params {
            combos = combos
                .into_iter()
                .flat_map(|combo| {
                    values.iter().map(move |value| {
                        let mut next = combo.clone();
                        next.insert(key.clone(), *value);
                        next
                    })
                })
                .collect();
        }

        combos.retain(|combo| {
            ordered(combo, "ma_short", "ma_long") && ordered(combo, "oversold", "overbought")
        });
        combos
    }

    /// One config per combination, each layered over `base.params`.
    pub fn expand(&self, base: &BacktestConfig) -> Vec<BacktestConfig> {
        self.combinations()
            .into_iter()
            .map(|combo| {
                let mut config = base.clone();
                config.params.extend(combo);
                config
            })
            .collect()
    }
}

fn ordered(combo: &BTreeMap<String, f64>, low: &str, high: &str) -> bool {
    match (combo.get(low), combo.get(high)) {
        (Some(low), Some(high)) => low < high,
        _ => true,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DailyBar, IndicatorRow, IndicatorValues};
    use crate::strategy::StrategyKind;
    use chrono::{Days, NaiveDate};

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn series() -> IndicatorSeries {
        let rows = (0..40u64)
            .map(|i| {
                let close = 10.0 + ((i as f64) * 0.4).sin();
                IndicatorRow::new(DailyBar::flat(start() + Days::new(i), close), IndicatorValues::default())
            })
            .collect();
        IndicatorSeries::new("600519.SH", rows).unwrap()
    }

    fn config(kind: StrategyKind) -> BacktestConfig {
        BacktestConfig::new("600519.SH", kind, start(), start() + Days::new(60), 100_000.0)
    }

    #[test]
    fn test_grid_combinations() {
        let grid = ParameterGrid::new()
            .axis("ma_short", [3.0, 5.0, 10.0])
            .axis("ma_long", [5.0, 20.0]);

        assert_eq!(grid.total_combinations(), 6);
        // (5,5), (10,5) pruned
        let combos = grid.combinations();
        assert_eq!(combos.len(), 4);
        assert!(combos.iter().all(|c| c["ma_short"] < c["ma_long"]));
    }

    #[test]
    fn test_grid_expand_keeps_base() {
        let base = config(StrategyKind::Rsi).with_commission_rate(0.0005);
        let configs = ParameterGrid::new()
            .axis("oversold", [20.0, 30.0])
            .axis("overbought", [70.0])
            .expand(&base);

        assert_eq!(configs.len(), 2);
        assert!(configs.iter().all(|c| c.commission_rate == Some(0.0005)));
        assert_eq!(configs[0].params["oversold"], 20.0);
    }

    #[test]
    fn test_empty_grid_yields_base() {
        let configs = ParameterGrid::new().expand(&config(StrategyKind::Macd));
        assert_eq!(configs.len(), 1);
    }

    #[test]
    fn test_compare_ranks_completed_runs() {
        let configs = vec![
            config(StrategyKind::MaCrossover)
                .with_param("ma_short", 2.0)
                .with_param("ma_long", 5.0),
            config(StrategyKind::Macd),
            BacktestConfig {
                initial_capital: None,
                ..config(StrategyKind::Bollinger)
            },
        ];

        let comparison = compare_strategies(
            &BacktestEngine::default(),
            &series(),
            &configs,
            &AtomicBool::new(false),
        );

        assert_eq!(comparison.runs.len(), 3);
        assert_eq!(comparison.runs[0].label, "ma_crossover[ma_long=5,ma_short=2]");
        assert_eq!(comparison.summary.completed, 2);
        assert_eq!(comparison.summary.failed, 1);
        assert!(matches!(
            &comparison.runs[2].outcome,
            RunOutcome::Failed { kind, .. } if kind == "validation_error"
        ));

        // MACD has no indicator data here, so it never trades.
        let macd = comparison.runs[1].performance().unwrap();
        assert_eq!(macd.total_trades, 0);

        let best = comparison.best_strategy.unwrap();
        assert!(!best.highest_return.is_empty());
        assert_eq!(best.lowest_drawdown, "macd");
    }

    #[test]
    fn test_cancelled_before_start() {
        let configs = vec![config(StrategyKind::Macd), config(StrategyKind::Rsi)];
        let comparison = compare_strategies(
            &BacktestEngine::default(),
            &series(),
            &configs,
            &AtomicBool::new(true),
        );

        assert!(comparison.runs.iter().all(StrategyRun::is_cancelled));
        assert!(comparison.best_strategy.is_none());
        assert_eq!(comparison.summary.completed, 0);
        assert_eq!(comparison.summary.avg_return, 0.0);
    }

    #[test]
    fn test_best_by_keeps_first_on_tie() {
        let flat = PerformanceReport::empty(1000.0, 0.0);
        let completed = vec![("a", &flat), ("b", &flat)];
        assert_eq!(best_by(&completed, |p| p.total_return), "a");
    }

    #[test]
    fn test_run_serializes_with_status() {
        let run = StrategyRun::failed("kdj".into(), &BacktestError::Cancelled);
        let json = serde_json::to_value(&run).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["kind"], "cancelled");
        assert_eq!(json["label"], "kdj");
    }
}
