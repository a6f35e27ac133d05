//! Signal types.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Trading decision for one day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    #[default]
    None,
    Buy,
    Sell,
}

impl Signal {
    pub fn is_buy(self) -> bool {
        self == Self::Buy
    }

    pub fn is_sell(self) -> bool {
        self == Self::Sell
    }
}

/// Signal attached to a trading date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalPoint {
    pub date: NaiveDate,
    pub signal: Signal,
}
