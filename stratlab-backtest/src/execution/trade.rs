//! Trade ledger entries and the open position.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeAction {
    Buy,
    Sell,
}

/// Immutable ledger record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// Execution date
    pub date: NaiveDate,
    /// Buy or sell
    pub action: TradeAction,
    /// Execution price (that day's close)
    pub price: f64,
    /// Shares, always a whole number of lots
    pub quantity: u64,
    /// Buys: total cost including commission. Sells: net proceeds.
    pub amount: f64,
    /// Commission paid on this trade
    pub commission: f64,
    /// Sells only: net proceeds relative to the matching buy's cost
    pub return_rate: Option<f64>,
}

impl Trade {
    pub fn is_buy(&self) -> bool {
        self.action == TradeAction::Buy
    }

    pub fn is_sell(&self) -> bool {
        self.action == TradeAction::Sell
    }

    /// Check if this sell closed at a profit
    pub fn is_winner(&self) -> bool {
        self.return_rate.is_some_and(|r| r > 0.0)
    }

    /// Notional value before commission
    pub fn notional(&self) -> f64 {
        self.price * self.quantity as f64
    }
}

/// The single open position while the executor is long.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Shares held
    pub quantity: u64,
    /// Entry price of the opening buy
    pub entry_price: f64,
    /// Entry date
    pub entry_date: NaiveDate,
    /// Total cost of the opening buy, including commission
    pub cost: f64,
}

impl Position {
    /// Market value at `price`
    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity as f64 * price
    }

    /// Calendar days held as of `date`
    pub fn days_held(&self, date: NaiveDate) -> i64 {
        (date - self.entry_date).num_days()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn test_trade_helpers() {
        let sell = Trade {
            date: date(5),
            action: TradeAction::Sell,
            price: 11.0,
            quantity: 200,
            amount: 2197.8,
            commission: 2.2,
            return_rate: Some(0.09),
        };
        assert!(sell.is_sell());
        assert!(sell.is_winner());
        assert!((sell.notional() - 2200.0).abs() < 1e-9);

        let flat = Trade {
            return_rate: Some(0.0),
            ..sell.clone()
        };
        assert!(!flat.is_winner());
    }

    #[test]
    fn test_trade_serializes_flat() {
        let buy = Trade {
            date: date(2),
            action: TradeAction::Buy,
            price: 10.0,
            quantity: 100,
            amount: 1001.0,
            commission: 1.0,
            return_rate: None,
        };
        let json = serde_json::to_value(&buy).unwrap();
        assert_eq!(json["action"], "buy");
        assert_eq!(json["date"], "2024-01-02");
        assert!(json["return_rate"].is_null());
    }

    #[test]
    fn test_position_days_held() {
        let position = Position {
            quantity: 100,
            entry_price: 10.0,
            entry_date: date(1),
            cost: 1001.0,
        };
        assert_eq!(position.days_held(date(8)), 7);
        assert!((position.market_value(10.5) - 1050.0).abs() < 1e-9);
    }
}
