//! Row and series types.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::finite;
use crate::error::{BacktestError, Result};

/// One day of price history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    /// Trading date
    #[serde(alias = "trade_date")]
    pub date: NaiveDate,
    #[serde(default)]
    pub open: Option<f64>,
    #[serde(default)]
    pub high: Option<f64>,
    #[serde(default)]
    pub low: Option<f64>,
    /// Closing price; a missing close is fatal once the row is simulated
    #[serde(default)]
    pub close: Option<f64>,
    #[serde(default, alias = "vol")]
    pub volume: Option<f64>,
}

impl DailyBar {
    /// Bar with all prices equal to `close`.
    pub fn flat(date: NaiveDate, close: f64) -> Self {
        Self {
            date,
            open: Some(close),
            high: Some(close),
            low: Some(close),
            close: Some(close),
            volume: None,
        }
    }
}

/// Precomputed technical indicators for one day.
///
/// Every field is optional: the data layer leaves gaps where a look-back
/// window has not filled yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorValues {
    #[serde(default)]
    pub ma5: Option<f64>,
    #[serde(default)]
    pub ma10: Option<f64>,
    #[serde(default)]
    pub ma20: Option<f64>,
    #[serde(default)]
    pub ma60: Option<f64>,
    /// MACD line (DIF)
    #[serde(default, alias = "macd_dif")]
    pub macd: Option<f64>,
    /// MACD signal line
    #[serde(default)]
    pub macd_dea: Option<f64>,
    #[serde(default)]
    pub macd_hist: Option<f64>,
    #[serde(default)]
    pub kdj_k: Option<f64>,
    #[serde(default)]
    pub kdj_d: Option<f64>,
    #[serde(default)]
    pub kdj_j: Option<f64>,
    #[serde(default)]
    pub rsi_6: Option<f64>,
    #[serde(default)]
    pub rsi_12: Option<f64>,
    #[serde(default)]
    pub rsi_24: Option<f64>,
    #[serde(default)]
    pub boll_upper: Option<f64>,
    #[serde(default)]
    pub boll_mid: Option<f64>,
    #[serde(default)]
    pub boll_lower: Option<f64>,
}

/// Indicator history entry as supplied by the data layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    #[serde(alias = "trade_date")]
    pub date: NaiveDate,
    #[serde(flatten)]
    pub values: IndicatorValues,
}

/// Price bar merged with that day's indicators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorRow {
    #[serde(flatten)]
    pub bar: DailyBar,
    #[serde(flatten)]
    pub indicators: IndicatorValues,
}

impl IndicatorRow {
    /// Create a row from a bar and its indicators.
    pub fn new(bar: DailyBar, indicators: IndicatorValues) -> Self {
        Self { bar, indicators }
    }

    /// Trading date.
    pub fn date(&self) -> NaiveDate {
        self.bar.date
    }

    /// Closing price if present and finite.
    pub fn close(&self) -> Option<f64> {
        finite(self.bar.close)
    }

    /// Closing price required for valuation.
    ///
    /// Fails with a data integrity error when the close is missing, not a
    /// number, or not strictly positive.
    pub fn valuation_price(&self) -> Result<f64> {
        self.close()
            .filter(|close| *close > 0.0)
            .ok_or_else(|| BacktestError::integrity(self.date(), "close"))
    }
}

/// Date-ascending, duplicate-free rows for one instrument.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorSeries {
    ts_code: String,
    rows: Vec<IndicatorRow>,
}

impl IndicatorSeries {
    /// Build a series, checking that dates strictly increase.
    pub fn new(ts_code: impl Into<String>, rows: Vec<IndicatorRow>) -> Result<Self> {
        if let Some(pair) = rows.windows(2).find(|w| w[1].date() <= w[0].date()) {
            return Err(BacktestError::integrity(pair[1].date(), "trade_date"));
        }

        Ok(Self {
            ts_code: ts_code.into(),
            rows,
        })
    }

    /// Instrument code.
    pub fn ts_code(&self) -> &str {
        &self.ts_code
    }

    pub fn rows(&self) -> &[IndicatorRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first(&self) -> Option<&IndicatorRow> {
        self.rows.first()
    }

    pub fn last(&self) -> Option<&IndicatorRow> {
        self.rows.last()
    }

    /// Restrict to rows with `start <= date <= end`.
    pub fn window(&self, start: NaiveDate, end: NaiveDate) -> Self {
        let rows = self
            .rows
            .iter()
            .filter(|row| row.date() >= start && row.date() <= end)
            .cloned()
            .collect();

        Self {
            ts_code: self.ts_code.clone(),
            rows,
        }
    }

    /// Closing prices with missing values kept as `None`.
    pub fn closes(&self) -> Vec<Option<f64>> {
        self.column(IndicatorRow::close)
    }

    /// Extract one column, mapping NaN to `None`.
    pub fn column<F>(&self, field: F) -> Vec<Option<f64>>
    where
        F: Fn(&IndicatorRow) -> Option<f64>,
    {
        self.rows.iter().map(|row| finite(field(row))).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn row(day: u32, close: Option<f64>) -> IndicatorRow {
        let mut bar = DailyBar::flat(date(day), 10.0);
        bar.close = close;
        IndicatorRow::new(bar, IndicatorValues::default())
    }

    #[test]
    fn test_series_rejects_unsorted_dates() {
        let err = IndicatorSeries::new("600000.SH", vec![row(2, Some(10.0)), row(1, Some(10.0))])
            .unwrap_err();
        assert_eq!(err, BacktestError::integrity(date(1), "trade_date"));
    }

    #[test]
    fn test_series_rejects_duplicate_dates() {
        let result = IndicatorSeries::new("600000.SH", vec![row(3, Some(10.0)), row(3, Some(11.0))]);
        assert!(result.is_err());
    }

    #[test]
    fn test_window_is_inclusive() {
        let rows = (1..=10).map(|d| row(d, Some(10.0))).collect();
        let series = IndicatorSeries::new("600000.SH", rows).unwrap();

        let window = series.window(date(3), date(6));
        assert_eq!(window.len(), 4);
        assert_eq!(window.first().unwrap().date(), date(3));
        assert_eq!(window.last().unwrap().date(), date(6));
        assert_eq!(window.ts_code(), "600000.SH");
    }

    #[test]
    fn test_valuation_price() {
        assert!((row(1, Some(12.5)).valuation_price().unwrap() - 12.5).abs() < 1e-12);
        assert!(row(1, None).valuation_price().is_err());
        assert!(row(1, Some(f64::NAN)).valuation_price().is_err());
        assert!(row(1, Some(0.0)).valuation_price().is_err());
    }

    #[test]
    fn test_column_maps_nan_to_none() {
        let mut with_nan = row(1, Some(10.0));
        with_nan.indicators.rsi_6 = Some(f64::NAN);
        let mut with_value = row(2, Some(10.0));
        with_value.indicators.rsi_6 = Some(42.0);

        let series = IndicatorSeries::new("600000.SH", vec![with_nan, with_value]).unwrap();
        assert_eq!(series.column(|r| r.indicators.rsi_6), vec![None, Some(42.0)]);
    }

    #[test]
    fn test_snapshot_deserializes_trade_date_alias() {
        let snapshot: IndicatorSnapshot = serde_json::from_str(
            r#"{"trade_date": "2024-01-05", "macd": 0.12, "macd_dea": 0.08, "rsi_6": 55.0}"#,
        )
        .unwrap();
        assert_eq!(snapshot.date, date(5));
        assert_eq!(snapshot.values.macd, Some(0.12));
        assert_eq!(snapshot.values.kdj_k, None);
    }
}
