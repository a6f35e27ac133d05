//! Historical price and indicator data.
//!
//! The data layer that fetches these rows lives elsewhere; this module only
//! defines their shape and merges the two histories into one series.

mod merge;
mod types;

pub use merge::merge_on_date;
pub use types::{DailyBar, IndicatorRow, IndicatorSeries, IndicatorSnapshot, IndicatorValues};

/// Treat NaN and infinities as missing.
pub(crate) fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}
