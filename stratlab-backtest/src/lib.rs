//! Stratlab Backtest Library
//!
//! Single-asset backtesting of classic technical strategies under A-share
//! style constraints: 100-share lots, a flat commission rate, and at most one
//! open position at a time.
//!
//! # Architecture
//!
//! ```text
//! IndicatorSeries ──> generate_signals ──> TradeExecutor ──> PerformanceAnalyzer
//!    (data)             (strategy)          (execution)       (backtest::metrics)
//!
//!                 all wired together by backtest::BacktestEngine
//! ```
//!
//! # Strategies
//!
//! - **ma_crossover**: short/long rolling mean of close crossing
//! - **macd**: MACD line crossing its signal line (DEA)
//! - **kdj**: K crossing up through oversold / down through overbought
//! - **rsi**: RSI(6) with the same threshold crossings as KDJ
//! - **bollinger**: close touching the lower/upper band (level, not crossing)
//!
//! Each run is single-threaded and deterministic. Independent runs can be
//! compared in parallel through [`backtest::compare_strategies`].

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod backtest;
pub mod data;
pub mod error;
pub mod execution;
pub mod strategy;

pub use backtest::{
    compare_strategies, BacktestConfig, BacktestEngine, BacktestResponse, BacktestResult,
    EngineSettings, ParameterGrid, PerformanceAnalyzer, PerformanceReport, StrategyComparison,
};
pub use data::{merge_on_date, DailyBar, IndicatorRow, IndicatorSeries, IndicatorSnapshot};
pub use error::{BacktestError, Result};
pub use execution::{DailyValuation, Trade, TradeAction, TradeExecutor};
pub use strategy::{generate_signals, Signal, SignalPoint, Strategy, StrategyKind};
