//! Trade execution and portfolio valuation.

mod executor;
mod trade;
mod valuation;

pub use executor::{execute, ExecutionOutcome, TradeExecutor};
pub use trade::{Position, Trade, TradeAction};
pub use valuation::{DailyValuation, ValuationTracker};
