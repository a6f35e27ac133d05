//! Merge price history with indicator history.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::types::{DailyBar, IndicatorRow, IndicatorSeries, IndicatorSnapshot, IndicatorValues};
use crate::error::{BacktestError, Result};

/// Left-join indicators onto price bars by date.
///
/// Price bars drive the result: a day without an indicator snapshot keeps
/// empty indicators, and snapshots without a matching bar are dropped. The
/// output is sorted ascending. Duplicate dates on either side are rejected.
pub fn merge_on_date(
    ts_code: &str,
    mut prices: Vec<DailyBar>,
    indicators: Vec<IndicatorSnapshot>,
) -> Result<IndicatorSeries> {
    prices.sort_by_key(|bar| bar.date);

    let mut by_date: BTreeMap<NaiveDate, IndicatorValues> = BTreeMap::new();
    for snapshot in indicators {
        if by_date.insert(snapshot.date, snapshot.values).is_some() {
            return Err(BacktestError::integrity(snapshot.date, "indicator_date"));
        }
    }

    let rows: Vec<IndicatorRow> = prices
        .into_iter()
        .map(|bar| {
            let values = by_date.remove(&bar.date).unwrap_or_default();
            IndicatorRow::new(bar, values)
        })
        .collect();

    tracing::debug!(
        ts_code,
        rows = rows.len(),
        unmatched_indicators = by_date.len(),
        "Merged price and indicator history"
    );

    IndicatorSeries::new(ts_code, rows)
}
