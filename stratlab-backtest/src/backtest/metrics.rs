//! Backtest performance metrics.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use super::config::EngineSettings;
use crate::execution::{DailyValuation, Trade};

/// Summary statistics for one run.
///
/// Ratios are fractions (0.05 = 5%), not percentages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    /// (final − initial) / initial
    pub total_return: f64,
    /// Compounded to a 252-day year
    pub annual_return: f64,
    pub sharpe_ratio: f64,
    /// Largest peak-to-trough decline of total value
    pub max_drawdown: f64,
    /// Annualised sample standard deviation of daily returns
    pub volatility: f64,
    /// Winning sells / sells
    pub win_rate: f64,
    /// Buys and sells
    pub total_trades: usize,
    pub winning_trades: usize,
    /// Calendar days, one decimal
    pub avg_holding_days: f64,
    pub final_capital: f64,
    pub total_commission: f64,
    /// Buy-and-hold return over the same window
    pub benchmark_return: f64,
    /// annual_return / max_drawdown
    pub calmar_ratio: f64,
}

impl PerformanceReport {
    /// Report for a run that never traded.
    pub fn empty(initial_capital: f64, benchmark_return: f64) -> Self {
        Self {
            total_return: 0.0,
            annual_return: 0.0,
            sharpe_ratio: 0.0,
            max_drawdown: 0.0,
            volatility: 0.0,
            win_rate: 0.0,
            total_trades: 0,
            winning_trades: 0,
            avg_holding_days: 0.0,
            final_capital: initial_capital,
            total_commission: 0.0,
            benchmark_return,
            calmar_ratio: 0.0,
        }
    }

    /// Flat key/value form for transport.
    pub fn to_flat_map(&self) -> serde_json::Map<String, serde_json::Value> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        }
    }

    /// Excess of the strategy over buy-and-hold.
    pub fn excess_return(&self) -> f64 {
        self.total_return - self.benchmark_return
    }
}

/// Computes a [`PerformanceReport`] from valuations and the trade ledger.
#[derive(Debug, Clone, Copy)]
pub struct PerformanceAnalyzer {
    risk_free_rate: f64,
    trading_days_per_year: u32,
}

impl Default for PerformanceAnalyzer {
    fn default() -> Self {
        Self::new(0.03, 252)
    }
}

impl PerformanceAnalyzer {
    pub fn new(risk_free_rate: f64, trading_days_per_year: u32) -> Self {
        Self {
            risk_free_rate,
            trading_days_per_year,
        }
    }

    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self::new(settings.risk_free_rate, settings.trading_days_per_year)
    }

    /// Analyse a finished run.
    ///
    /// `valuations` must already reflect the final liquidation.
    pub fn analyze(
        &self,
        valuations: &[DailyValuation],
        trades: &[Trade],
        initial_capital: f64,
        first_close: f64,
        last_close: f64,
    ) -> PerformanceReport {
        let benchmark_return = benchmark_return(first_close, last_close);

        if trades.is_empty() || valuations.is_empty() {
            return PerformanceReport::empty(initial_capital, benchmark_return);
        }

        let values: Vec<f64> = valuations.iter().map(|v| v.total_value).collect();
        let final_capital = values.last().copied().unwrap_or(initial_capital);
        let days_per_year = f64::from(self.trading_days_per_year);

        let total_return = (final_capital - initial_capital) / initial_capital;
        let annual_return =
            (final_capital / initial_capital).powf(days_per_year / values.len() as f64) - 1.0;

        let returns = daily_returns(&values);
        let volatility = if returns.len() > 1 {
            returns.iter().std_dev() * days_per_year.sqrt()
        } else {
            0.0
        };

        let sharpe_ratio = if volatility > 0.0 {
            (annual_return - self.risk_free_rate) / volatility
        } else {
            0.0
        };

        let max_drawdown = max_drawdown(&values);
        let calmar_ratio = if max_drawdown > 0.0 {
            annual_return / max_drawdown
        } else {
            0.0
        };

        let closed: Vec<&Trade> = trades.iter().filter(|t| t.return_rate.is_some()).collect();
        let winning_trades = closed.iter().filter(|t| t.is_winner()).count();
        let win_rate = if closed.is_empty() {
            0.0
        } else {
            winning_trades as f64 / closed.len() as f64
        };

        PerformanceReport {
            total_return,
            annual_return,
            sharpe_ratio,
            max_drawdown,
            volatility,
            win_rate,
            total_trades: trades.len(),
            winning_trades,
            avg_holding_days: avg_holding_days(trades),
            final_capital,
            total_commission: trades.iter().map(|t| t.commission).sum(),
            benchmark_return,
            calmar_ratio,
        }
    }
}

/// Passive buy-and-hold return; 0 without a usable first close.
pub fn benchmark_return(first_close: f64, last_close: f64) -> f64 {
    if first_close > 0.0 && first_close.is_finite() && last_close.is_finite() {
        (last_close - first_close) / first_close
    } else {
        0.0
    }
}

fn daily_returns(values: &[f64]) -> Vec<f64> {
    values
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect()
}

fn max_drawdown(values: &[f64]) -> f64 {
    let Some(&first) = values.first() else {
        return 0.0;
    };

    let (_, worst) = values.iter().fold((first, 0.0_f64), |(peak, worst), &value| {
        let peak = peak.max(value);
        let drawdown = if peak > 0.0 { (peak - value) / peak } else { 0.0 };
        (peak, worst.max(drawdown))
    });
    worst
}

/// i-th sell paired with i-th buy, in calendar days, rounded to one decimal.
fn avg_holding_days(trades: &[Trade]) -> f64 {
    let buys = trades.iter().filter(|t| t.is_buy());
    let sells = trades.iter().filter(|t| t.is_sell() && t.return_rate.is_some());

    let periods: Vec<f64> = buys
        .zip(sells)
        .map(|(buy, sell)| (sell.date - buy.date).num_days() as f64)
        .collect();

    if periods.is_empty() {
        return 0.0;
    }
    let mean = periods.iter().sum::<f64>() / periods.len() as f64;
    (mean * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::TradeAction;
    use chrono::NaiveDate;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn valuations(values: &[f64]) -> Vec<DailyValuation> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| DailyValuation {
                date: date(i as u32 + 1),
                cash: *v,
                position_value: 0.0,
                total_value: *v,
            })
            .collect()
    }

    fn trade(day: u32, action: TradeAction, return_rate: Option<f64>) -> Trade {
        Trade {
            date: date(day),
            action,
            price: 10.0,
            quantity: 100,
            amount: 1000.0,
            commission: 1.0,
            return_rate,
        }
    }

    #[test]
    fn test_empty_report() {
        let report = PerformanceAnalyzer::default().analyze(&valuations(&[1000.0; 5]), &[], 1000.0, 10.0, 12.0);
        assert_eq!(report, PerformanceReport::empty(1000.0, 0.2));
        assert_eq!(report.total_trades, 0);
        assert!((report.final_capital - 1000.0).abs() < 1e-12);
    }

    #[test]
    fn test_max_drawdown() {
        assert!((max_drawdown(&[100.0, 120.0, 90.0, 130.0, 117.0]) - 0.25).abs() < 1e-12);
        assert_eq!(max_drawdown(&[100.0, 101.0, 102.0]), 0.0);
        assert_eq!(max_drawdown(&[]), 0.0);
    }

    #[test]
    fn test_avg_holding_days_pairs_in_order() {
        let trades = vec![
            trade(1, TradeAction::Buy, None),
            trade(4, TradeAction::Sell, Some(0.1)),
            trade(10, TradeAction::Buy, None),
            trade(14, TradeAction::Sell, Some(-0.1)),
        ];
        // (3 + 4) / 2
        assert!((avg_holding_days(&trades) - 3.5).abs() < 1e-12);
    }

    #[test]
    fn test_avg_holding_days_rounds_to_one_decimal() {
        let trades = vec![
            trade(1, TradeAction::Buy, None),
            trade(2, TradeAction::Sell, Some(0.1)),
            trade(3, TradeAction::Buy, None),
            trade(5, TradeAction::Sell, Some(0.1)),
            trade(6, TradeAction::Buy, None),
            trade(8, TradeAction::Sell, Some(0.1)),
        ];
        // (1 + 2 + 2) / 3 = 1.666..
        assert!((avg_holding_days(&trades) - 1.7).abs() < 1e-12);
    }

    #[test]
    fn test_full_report() {
        let values = [1000.0, 1100.0, 990.0, 1089.0];
        let trades = vec![
            trade(1, TradeAction::Buy, None),
            trade(4, TradeAction::Sell, Some(0.089)),
        ];
        let report = PerformanceAnalyzer::new(0.03, 252).analyze(&valuations(&values), &trades, 1000.0, 10.0, 11.0);

        assert!((report.total_return - 0.089).abs() < 1e-12);
        assert!((report.final_capital - 1089.0).abs() < 1e-12);
        assert!((report.max_drawdown - 0.1).abs() < 1e-12);
        assert!((report.win_rate - 1.0).abs() < 1e-12);
        assert_eq!(report.total_trades, 2);
        assert_eq!(report.winning_trades, 1);
        assert!((report.total_commission - 2.0).abs() < 1e-12);
        assert!((report.benchmark_return - 0.1).abs() < 1e-12);
        assert!((report.avg_holding_days - 3.0).abs() < 1e-12);

        let expected_annual = 1.089_f64.powf(252.0 / 4.0) - 1.0;
        assert!((report.annual_return - expected_annual).abs() < 1e-9);

        // Sample (n - 1) standard deviation of 0.1, -0.1, 0.1
        let returns = [0.1, -0.1, 0.1];
        let mean = 0.1 / 3.0;
        let var = returns.iter().map(|r: &f64| (r - mean).powi(2)).sum::<f64>() / 2.0;
        let expected_vol = var.sqrt() * 252.0_f64.sqrt();
        assert!((report.volatility - expected_vol).abs() < 1e-9);
        assert!((report.sharpe_ratio - (expected_annual - 0.03) / expected_vol).abs() < 1e-9);
        assert!((report.calmar_ratio - expected_annual / 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_win_rate_counts_losses() {
        let trades = vec![
            trade(1, TradeAction::Buy, None),
            trade(2, TradeAction::Sell, Some(0.05)),
            trade(3, TradeAction::Buy, None),
            trade(4, TradeAction::Sell, Some(-0.02)),
        ];
        let report = PerformanceAnalyzer::default().analyze(
            &valuations(&[1000.0, 1050.0, 1050.0, 1029.0]),
            &trades,
            1000.0,
            10.0,
            10.0,
        );
        assert!((report.win_rate - 0.5).abs() < 1e-12);
        assert_eq!(report.winning_trades, 1);
    }

    #[test]
    fn test_flat_map_keys() {
        let map = PerformanceReport::empty(1000.0, 0.0).to_flat_map();
        for key in [
            "total_return",
            "annual_return",
            "sharpe_ratio",
            "max_drawdown",
            "volatility",
            "win_rate",
            "total_trades",
            "avg_holding_days",
            "final_capital",
            "total_commission",
            "benchmark_return",
        ] {
            assert!(map.contains_key(key), "missing {key}");
        }
        assert!(map.values().all(|v| !v.is_object() && !v.is_array()));
    }

    #[test]
    fn test_benchmark_guards_zero_price() {
        assert_eq!(benchmark_return(0.0, 10.0), 0.0);
        assert!((benchmark_return(10.0, 9.0) + 0.1).abs() < 1e-12);
    }
}
