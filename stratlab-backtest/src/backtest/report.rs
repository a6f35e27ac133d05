//! Backtest report generation.

use serde::{Deserialize, Serialize};

use super::engine::BacktestResult;
use super::metrics::PerformanceReport;
use crate::execution::{Trade, TradeAction};

/// Trades listed in the text report
const RECENT_TRADES: usize = 10;

/// Backtest report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    /// Report title
    pub title: String,
    /// Test period
    pub period: String,
    /// Summary statistics
    pub summary: ReportSummary,
    /// Risk metrics
    pub risk_metrics: RiskMetrics,
    /// Trade statistics
    pub trade_stats: TradeStats,
    /// Text report (formatted)
    pub text_report: String,
}

/// Report summary section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSummary {
    pub initial_capital: f64,
    pub final_capital: f64,
    pub net_profit: f64,
    pub total_return_pct: f64,
    pub annual_return_pct: f64,
    pub benchmark_return_pct: f64,
}

/// Risk metrics section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub max_drawdown_pct: f64,
    pub volatility_pct: f64,
    pub sharpe_ratio: f64,
    pub calmar_ratio: f64,
}

/// Trade statistics section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeStats {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub win_rate_pct: f64,
    pub avg_holding_days: f64,
    pub total_commission: f64,
}

impl BacktestReport {
    /// Generate a report from a completed run
    pub fn generate(result: &BacktestResult) -> Self {
        let performance = &result.performance;
        let initial_capital = result
            .config
            .initial_capital
            .unwrap_or(performance.final_capital);

        let summary = ReportSummary {
            initial_capital,
            final_capital: performance.final_capital,
            net_profit: performance.final_capital - initial_capital,
            total_return_pct: performance.total_return * 100.0,
            annual_return_pct: performance.annual_return * 100.0,
            benchmark_return_pct: performance.benchmark_return * 100.0,
        };

        let risk_metrics = RiskMetrics {
            max_drawdown_pct: performance.max_drawdown * 100.0,
            volatility_pct: performance.volatility * 100.0,
            sharpe_ratio: performance.sharpe_ratio,
            calmar_ratio: performance.calmar_ratio,
        };

        let trade_stats = TradeStats::from(performance);

        let title = format!("{} {} 策略回测报告", result.config.ts_code, result.strategy);
        let period = format!(
            "{} 至 {}",
            result.config.start_date.as_deref().unwrap_or("-"),
            result.config.end_date.as_deref().unwrap_or("-")
        );

        let text_report = Self::format_text_report(
            &title,
            &period,
            &summary,
            &risk_metrics,
            &trade_stats,
            result.recent_trades(RECENT_TRADES),
        );

        Self {
            title,
            period,
            summary,
            risk_metrics,
            trade_stats,
            text_report,
        }
    }

    /// Rendered text report
    pub fn text(&self) -> &str {
        &self.text_report
    }

    /// Format as text report
    fn format_text_report(
        title: &str,
        period: &str,
        summary: &ReportSummary,
        risk: &RiskMetrics,
        stats: &TradeStats,
        trades: &[Trade],
    ) -> String {
        let mut report = String::new();

        report.push_str("═══════════════════════════════════════════════════════════════\n");
        report.push_str(&format!("  {title}\n"));
        report.push_str("═══════════════════════════════════════════════════════════════\n\n");

        report.push_str(&format!("📅 测试周期: {period}\n\n"));

        // Summary
        report.push_str("📊 收益概要\n");
        report.push_str("───────────────────────────────────────────────────────────────\n");
        report.push_str(&format!("  初始资金:       ¥{:>12.2}\n", summary.initial_capital));
        report.push_str(&format!("  最终资金:       ¥{:>12.2}\n", summary.final_capital));
        report.push_str(&format!("  净利润:         ¥{:>12.2}\n", summary.net_profit));
        report.push_str(&format!("  总收益率:       {:>12.2}%\n", summary.total_return_pct));
        report.push_str(&format!("  年化收益率:     {:>12.2}%\n", summary.annual_return_pct));
        report.push_str(&format!("  基准收益率:     {:>12.2}%\n\n", summary.benchmark_return_pct));

        // Risk metrics
        report.push_str("⚠️ 风险指标\n");
        report.push_str("───────────────────────────────────────────────────────────────\n");
        report.push_str(&format!("  最大回撤:       {:>12.2}%\n", risk.max_drawdown_pct));
        report.push_str(&format!("  年化波动率:     {:>12.2}%\n", risk.volatility_pct));
        report.push_str(&format!("  夏普比率:       {:>12.2}\n", risk.sharpe_ratio));
        report.push_str(&format!("  卡玛比率:       {:>12.2}\n\n", risk.calmar_ratio));

        // Trade stats
        report.push_str("📈 交易统计\n");
        report.push_str("───────────────────────────────────────────────────────────────\n");
        report.push_str(&format!("  总交易次数:     {:>12}\n", stats.total_trades));
        report.push_str(&format!("  盈利次数:       {:>12}\n", stats.winning_trades));
        report.push_str(&format!("  胜率:           {:>12.2}%\n", stats.win_rate_pct));
        report.push_str(&format!("  平均持仓天数:   {:>12.1}\n", stats.avg_holding_days));
        report.push_str(&format!("  总手续费:       ¥{:>12.2}\n\n", stats.total_commission));

        // Recent trades
        if !trades.is_empty() {
            report.push_str("📝 最近交易\n");
            report.push_str("───────────────────────────────────────────────────────────────\n");

            for trade in trades.iter().rev() {
                let line = match (trade.action, trade.return_rate) {
                    (TradeAction::Sell, Some(rate)) => {
                        let marker = if trade.is_winner() { "✅" } else { "❌" };
                        format!(
                            "  {} {} 卖出 {} 股 @ {:.2} | 收益率 {:.2}%\n",
                            marker,
                            trade.date,
                            trade.quantity,
                            trade.price,
                            rate * 100.0
                        )
                    }
                    _ => format!(
                        "  🔹 {} 买入 {} 股 @ {:.2} | 金额 ¥{:.2}\n",
                        trade.date, trade.quantity, trade.price, trade.amount
                    ),
                };
                report.push_str(&line);
            }
        }

        report.push_str("\n═══════════════════════════════════════════════════════════════\n");

        report
    }
}

impl From<&PerformanceReport> for TradeStats {
    fn from(performance: &PerformanceReport) -> Self {
        Self {
            total_trades: performance.total_trades,
            winning_trades: performance.winning_trades,
            win_rate_pct: performance.win_rate * 100.0,
            avg_holding_days: performance.avg_holding_days,
            total_commission: performance.total_commission,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
