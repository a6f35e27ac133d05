//! Strategy backtesting module.
//!
//! Wires signal generation, execution, and performance analysis into one
//! run, and fans independent runs out for comparison.

mod comparison;
mod config;
mod engine;
mod metrics;
mod report;

pub use comparison::{
    compare_strategies, BestStrategies, ComparisonSummary, ParameterGrid, RunOutcome,
    StrategyComparison, StrategyRun,
};
pub use config::{BacktestConfig, EngineSettings, ValidatedConfig};
pub use engine::{BacktestEngine, BacktestResponse, BacktestResult};
pub use metrics::{benchmark_return, PerformanceAnalyzer, PerformanceReport};
pub use report::BacktestReport;
