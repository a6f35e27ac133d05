//! Daily mark-to-market valuation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Portfolio value at one day's close
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyValuation {
    pub date: NaiveDate,
    pub cash: f64,
    pub position_value: f64,
    pub total_value: f64,
}

/// Records one valuation per simulated date.
#[derive(Debug, Clone, Default)]
pub struct ValuationTracker {
    valuations: Vec<DailyValuation>,
}

impl ValuationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            valuations: Vec::with_capacity(capacity),
        }
    }

    /// Record the portfolio for `date`.
    pub fn record(&mut self, date: NaiveDate, cash: f64, position_value: f64) {
        self.valuations.push(DailyValuation {
            date,
            cash,
            position_value,
            total_value: cash + position_value,
        });
    }

    /// Replace the latest valuation for the same date.
    ///
    /// Used when the final day's state changes after it was recorded
    /// (forced liquidation). Records a new entry if `date` differs.
    pub fn restate_last(&mut self, date: NaiveDate, cash: f64, position_value: f64) {
        if self.valuations.last().is_some_and(|v| v.date == date) {
            self.valuations.pop();
        }
        self.record(date, cash, position_value);
    }

    pub fn valuations(&self) -> &[DailyValuation] {
        &self.valuations
    }

    pub fn len(&self) -> usize {
        self.valuations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.valuations.is_empty()
    }

    /// Latest total value
    pub fn latest_value(&self) -> Option<f64> {
        self.valuations.last().map(|v| v.total_value)
    }

    pub fn into_inner(self) -> Vec<DailyValuation> {
        self.valuations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn test_record_sums_total() {
        let mut tracker = ValuationTracker::new();
        tracker.record(date(1), 500.0, 1500.0);
        assert_eq!(tracker.len(), 1);
        assert!((tracker.latest_value().unwrap() - 2000.0).abs() < 1e-9);
    }

    #[test]
    fn test_restate_last_same_date() {
        let mut tracker = ValuationTracker::new();
        tracker.record(date(1), 0.0, 1000.0);
        tracker.record(date(2), 0.0, 1100.0);
        tracker.restate_last(date(2), 1098.9, 0.0);

        assert_eq!(tracker.len(), 2);
        let last = tracker.valuations().last().unwrap();
        assert!((last.cash - 1098.9).abs() < 1e-9);
        assert!((last.position_value).abs() < 1e-9);
    }

    #[test]
    fn test_restate_last_new_date_appends() {
        let mut tracker = ValuationTracker::new();
        tracker.record(date(1), 100.0, 0.0);
        tracker.restate_last(date(2), 100.0, 0.0);
        assert_eq!(tracker.len(), 2);
    }
}
