//! Signal-driven trade execution.
//!
//! The executor is a two-state machine:
//!
//! | state | signal | action                                     |
//! |-------|--------|--------------------------------------------|
//! | FLAT  | BUY    | buy as many whole lots as cash fully funds |
//! | LONG  | SELL   | sell the whole position                    |
//! | any   | other  | nothing                                    |
//!
//! Every processed date is valued at its close, whether or not a trade
//! happened. An open position is liquidated at the last close by `finish`.

use chrono::NaiveDate;
use tracing::debug;

use super::trade::{Position, Trade, TradeAction};
use super::valuation::{DailyValuation, ValuationTracker};
use crate::data::{IndicatorRow, IndicatorSeries};
use crate::error::Result;
use crate::strategy::{Signal, SignalPoint};

/// Result of running the executor over a whole series.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    /// Complete trade ledger in date order
    pub trades: Vec<Trade>,
    /// One valuation per processed date
    pub valuations: Vec<DailyValuation>,
    /// Cash after the final liquidation
    pub final_cash: f64,
    /// Whether `finish` had to close a position
    pub forced_liquidation: bool,
}

/// Stateful cash/position machine.
#[derive(Debug, Clone)]
pub struct TradeExecutor {
    cash: f64,
    position: Option<Position>,
    commission_rate: f64,
    lot_size: u64,
    trades: Vec<Trade>,
    tracker: ValuationTracker,
    last_close: Option<(NaiveDate, f64)>,
}

impl TradeExecutor {
    /// Create a flat executor holding `initial_capital` in cash.
    pub fn new(initial_capital: f64, commission_rate: f64, lot_size: u64) -> Self {
        Self {
            cash: initial_capital,
            position: None,
            commission_rate,
            lot_size: lot_size.max(1),
            trades: Vec::new(),
            tracker: ValuationTracker::new(),
            last_close: None,
        }
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    /// The open position, if long.
    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    /// Shares currently held.
    pub fn position_size(&self) -> u64 {
        self.position.as_ref().map_or(0, |p| p.quantity)
    }

    pub fn is_long(&self) -> bool {
        self.position.is_some()
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn valuations(&self) -> &[DailyValuation] {
        self.tracker.valuations()
    }

    /// Process one date: act on its signal, then value the portfolio.
    ///
    /// A row without a usable close aborts the run.
    pub fn step(&mut self, row: &IndicatorRow, signal: Signal) -> Result<()> {
        let date = row.date();
        let price = row.valuation_price()?;

        match (self.position.is_some(), signal) {
            (false, Signal::Buy) => self.buy(date, price),
            (true, Signal::Sell) => self.sell(date, price),
            _ => {}
        }

        let position_value = self.position.as_ref().map_or(0.0, |p| p.market_value(price));
        self.tracker.record(date, self.cash, position_value);
        self.last_close = Some((date, price));
        Ok(())
    }

    /// Close any open position at the last processed close and hand back
    /// the ledger and valuations.
    pub fn finish(mut self) -> ExecutionOutcome {
        let mut forced_liquidation = false;

        if let (true, Some((date, price))) = (self.position.is_some(), self.last_close) {
            debug!(%date, price, "Force-liquidating open position at end of range");
            self.sell(date, price);
            self.tracker.restate_last(date, self.cash, 0.0);
            forced_liquidation = true;
        }

        ExecutionOutcome {
            trades: self.trades,
            valuations: self.tracker.into_inner(),
            final_cash: self.cash,
            forced_liquidation,
        }
    }

    fn buy(&mut self, date: NaiveDate, price: f64) {
        let lot_cost = price * self.lot_size as f64;
        let max_lots = (self.cash / lot_cost).floor();
        if max_lots < 1.0 {
            debug!(%date, price, cash = self.cash, "Buy skipped: cash below one lot");
            return;
        }

        let quantity = max_lots as u64 * self.lot_size;
        let notional = quantity as f64 * price;
        let commission = notional * self.commission_rate;
        let total_cost = notional + commission;

        // Commission can push the full-lot cost past available cash; the order
        // is rejected outright rather than shrunk.
        if total_cost > self.cash {
            debug!(
                %date,
                price,
                quantity,
                total_cost,
                cash = self.cash,
                "Buy rejected: cannot fund lots plus commission"
            );
            return;
        }

        self.cash -= total_cost;
        self.position = Some(Position {
            quantity,
            entry_price: price,
            entry_date: date,
            cost: total_cost,
        });

        debug!(%date, price, quantity, commission, "Buy executed");
        self.trades.push(Trade {
            date,
            action: TradeAction::Buy,
            price,
            quantity,
            amount: total_cost,
            commission,
            return_rate: None,
        });
    }

    fn sell(&mut self, date: NaiveDate, price: f64) {
        let Some(position) = self.position.take() else {
            return;
        };

        let notional = position.market_value(price);
        let commission = notional * self.commission_rate;
        let proceeds = notional - commission;
        let return_rate = (proceeds - position.cost) / position.cost;

        self.cash += proceeds;

        debug!(
            %date,
            price,
            quantity = position.quantity,
            return_rate,
            days_held = position.days_held(date),
            "Sell executed"
        );
        self.trades.push(Trade {
            date,
            action: TradeAction::Sell,
            price,
            quantity: position.quantity,
            amount: proceeds,
            commission,
            return_rate: Some(return_rate),
        });
    }
}

/// Run the executor over `series`, folding state from one date to the next.
///
/// `signals` are matched to rows by position and date; a row without a
/// matching signal is treated as `Signal::None`.
pub fn execute(
    series: &IndicatorSeries,
    signals: &[SignalPoint],
    initial_capital: f64,
    commission_rate: f64,
    lot_size: u64,
) -> Result<ExecutionOutcome> {
    let mut executor = TradeExecutor::new(initial_capital, commission_rate, lot_size);
    executor.tracker = ValuationTracker::with_capacity(series.len());

    let executor = series
        .rows()
        .iter()
        .enumerate()
        .try_fold(executor, |mut executor, (i, row)| {
            let signal = signals
                .get(i)
                .filter(|point| point.date == row.date())
                .map(|point| point.signal)
                .unwrap_or_default();
            executor.step(row, signal)?;
            Ok::<_, crate::error::BacktestError>(executor)
        })?;

    Ok(executor.finish())
}
