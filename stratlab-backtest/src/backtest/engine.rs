//! Backtest engine for strategy simulation.

use serde::Serialize;
use tracing::{debug, info, warn};

use stratlab_common::logging::generate_run_id;

use super::config::{BacktestConfig, EngineSettings, ValidatedConfig};
use super::metrics::{PerformanceAnalyzer, PerformanceReport};
use crate::data::{merge_on_date, DailyBar, IndicatorRow, IndicatorSeries, IndicatorSnapshot};
use crate::error::{BacktestError, Result};
use crate::execution::{execute, DailyValuation, Trade};
use crate::strategy::{generate_signals, Strategy};

/// Outcome of one completed run.
#[derive(Debug, Clone, Serialize)]
pub struct BacktestResult {
    /// Identifies this run in logs
    pub run_id: String,
    pub performance: PerformanceReport,
    /// Complete trade ledger
    pub trades: Vec<Trade>,
    /// Configuration as supplied
    pub config: BacktestConfig,
    /// Strategy the configuration resolved to
    pub strategy: Strategy,
    /// Daily valuations; not part of the transport form
    #[serde(skip)]
    pub valuations: Vec<DailyValuation>,
}

impl BacktestResult {
    /// The most recent `limit` trades.
    pub fn recent_trades(&self, limit: usize) -> &[Trade] {
        let start = self.trades.len().saturating_sub(limit);
        &self.trades[start..]
    }

    /// Transport form with the ledger cut to the last `trade_limit` trades.
    pub fn into_response(self, trade_limit: usize) -> BacktestResponse {
        let start = self.trades.len().saturating_sub(trade_limit);
        let mut trades = self.trades;
        trades.drain(..start);

        BacktestResponse {
            run_id: self.run_id,
            performance: self.performance,
            trades,
            config: self.config,
        }
    }
}

/// What the calling layer sends back to its client.
#[derive(Debug, Clone, Serialize)]
pub struct BacktestResponse {
    pub run_id: String,
    pub performance: PerformanceReport,
    pub trades: Vec<Trade>,
    pub config: BacktestConfig,
}

/// Backtest engine
///
/// Holds only engine-wide settings; every run owns its own state, so one
/// engine can serve many runs concurrently.
#[derive(Debug, Clone, Default)]
pub struct BacktestEngine {
    settings: EngineSettings,
    analyzer: PerformanceAnalyzer,
}

impl BacktestEngine {
    /// Create a new backtest engine
    pub fn new(settings: EngineSettings) -> Self {
        let analyzer = PerformanceAnalyzer::from_settings(&settings);
        Self { settings, analyzer }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Run a backtest from raw price and indicator history.
    ///
    /// The two histories are merged on date before the window is applied.
    pub fn run(
        &self,
        config: &BacktestConfig,
        prices: Vec<DailyBar>,
        indicators: Vec<IndicatorSnapshot>,
    ) -> Result<BacktestResult> {
        let run_id = generate_run_id();
        let span = stratlab_common::run_span!(
            run_id,
            ts_code = %config.ts_code,
            strategy = %config.strategy_type
        );
        let _enter = span.enter();

        let validated = self.validate(config)?;
        let series = merge_on_date(&validated.ts_code, prices, indicators)?;
        self.simulate(run_id, config, validated, &series)
    }

    /// Run a backtest over an already merged series.
    pub fn run_series(&self, config: &BacktestConfig, series: &IndicatorSeries) -> Result<BacktestResult> {
        let run_id = generate_run_id();
        let span = stratlab_common::run_span!(
            run_id,
            ts_code = %config.ts_code,
            strategy = %config.strategy_type
        );
        let _enter = span.enter();

        let validated = self.validate(config)?;
        self.simulate(run_id, config, validated, series)
    }

    fn validate(&self, config: &BacktestConfig) -> Result<ValidatedConfig> {
        config.validate(&self.settings).map_err(|e| {
            warn!(error = %e, fields = ?e.fields(), "Rejected backtest configuration");
            BacktestError::from(e)
        })
    }

    fn simulate(
        &self,
        run_id: String,
        config: &BacktestConfig,
        validated: ValidatedConfig,
        series: &IndicatorSeries,
    ) -> Result<BacktestResult> {
        let window = series.window(validated.start_date, validated.end_date);
        if window.len() < self.settings.min_rows {
            warn!(
                found = window.len(),
                required = self.settings.min_rows,
                start = %validated.start_date,
                end = %validated.end_date,
                "Not enough rows in backtest window"
            );
            return Err(BacktestError::DataInsufficiency {
                found: window.len(),
                required: self.settings.min_rows,
            });
        }

        let signals = generate_signals(&window, &validated.strategy);
        debug!(
            rows = window.len(),
            buys = signals.iter().filter(|p| p.signal.is_buy()).count(),
            sells = signals.iter().filter(|p| p.signal.is_sell()).count(),
            "Signals generated"
        );

        let outcome = execute(
            &window,
            &signals,
            validated.initial_capital,
            validated.commission_rate,
            self.settings.lot_size,
        )?;

        let first_close = window.first().and_then(IndicatorRow::close).unwrap_or(0.0);
        let last_close = window.last().and_then(IndicatorRow::close).unwrap_or(0.0);
        let performance = self.analyzer.analyze(
            &outcome.valuations,
            &outcome.trades,
            validated.initial_capital,
            first_close,
            last_close,
        );

        info!(
            strategy = %validated.strategy,
            trades = performance.total_trades,
            total_return = performance.total_return,
            max_drawdown = performance.max_drawdown,
            final_capital = performance.final_capital,
            forced_liquidation = outcome.forced_liquidation,
            "Backtest completed"
        );

        Ok(BacktestResult {
            run_id,
            performance,
            trades: outcome.trades,
            config: config.clone(),
            strategy: validated.strategy,
            valuations: outcome.valuations,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
