//! Pure signal rules.
//!
//! Inputs are columns with `None` for missing values. A missing value on
//! either side of a comparison makes that day neutral.

use super::Signal;

/// Simple moving average over `window` values.
///
/// `None` until the window has filled, and for any window containing a gap.
pub fn rolling_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; values.len()];
    }

    (0..values.len())
        .map(|i| {
            if i + 1 < window {
                return None;
            }
            let slice = &values[i + 1 - window..=i];
            slice
                .iter()
                .copied()
                .sum::<Option<f64>>()
                .map(|sum| sum / window as f64)
        })
        .collect()
}

/// Buy when `fast` crosses from at-or-below `slow` to above it; sell on the
/// opposite crossing.
pub fn crossing_signals(fast: &[Option<f64>], slow: &[Option<f64>]) -> Vec<Signal> {
    let mut signals = vec![Signal::None; fast.len().min(slow.len())];

    for i in 1..signals.len() {
        let (Some(prev_fast), Some(prev_slow), Some(fast), Some(slow)) =
            (fast[i - 1], slow[i - 1], fast[i], slow[i])
        else {
            continue;
        };

        if prev_fast <= prev_slow && fast > slow {
            signals[i] = Signal::Buy;
        } else if prev_fast >= prev_slow && fast < slow {
            signals[i] = Signal::Sell;
        }
    }

    signals
}

/// Buy when `values` rises through `oversold`; sell when it falls through
/// `overbought`.
pub fn threshold_signals(values: &[Option<f64>], oversold: f64, overbought: f64) -> Vec<Signal> {
    let mut signals = vec![Signal::None; values.len()];

    for i in 1..values.len() {
        let (Some(prev), Some(current)) = (values[i - 1], values[i]) else {
            continue;
        };

        if prev <= oversold && current > oversold {
            signals[i] = Signal::Buy;
        } else if prev >= overbought && current < overbought {
            signals[i] = Signal::Sell;
        }
    }

    signals
}

/// Buy when close touches the lower band, sell when it touches the upper
/// band. Evaluated on the level of each day, not on a transition.
pub fn band_signals(
    closes: &[Option<f64>],
    upper: &[Option<f64>],
    lower: &[Option<f64>],
) -> Vec<Signal> {
    closes
        .iter()
        .zip(upper)
        .zip(lower)
        .map(|((close, upper), lower)| {
            let Some(close) = *close else {
                return Signal::None;
            };

            match (*upper, *lower) {
                (_, Some(lower)) if lower > 0.0 && close <= lower => Signal::Buy,
                (Some(upper), _) if upper > 0.0 && close >= upper => Signal::Sell,
                _ => Signal::None,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().copied().map(Some).collect()
    }

    #[test]
    fn test_rolling_mean() {
        let means = rolling_mean(&some(&[1.0, 2.0, 3.0, 4.0]), 2);
        assert_eq!(means, vec![None, Some(1.5), Some(2.5), Some(3.5)]);
    }

    #[test]
    fn test_rolling_mean_gap_poisons_window() {
        let values = vec![Some(1.0), None, Some(3.0), Some(5.0)];
        assert_eq!(rolling_mean(&values, 2), vec![None, None, None, Some(4.0)]);
    }

    #[test]
    fn test_rolling_mean_window_longer_than_series() {
        assert_eq!(rolling_mean(&some(&[1.0, 2.0]), 5), vec![None, None]);
    }

    #[test]
    fn test_crossing_requires_transition() {
        // Sustained level above does not re-fire.
        let fast = some(&[1.0, 3.0, 4.0, 5.0]);
        let slow = some(&[2.0, 2.0, 2.0, 2.0]);
        assert_eq!(
            crossing_signals(&fast, &slow),
            vec![Signal::None, Signal::Buy, Signal::None, Signal::None]
        );
    }

    #[test]
    fn test_crossing_from_equal() {
        let fast = some(&[2.0, 2.5, 2.0, 1.0]);
        let slow = some(&[2.0, 2.0, 2.0, 2.0]);
        // 2.0 -> 2.5 crosses up from equal, 2.5 -> 2.0 lands on equal (no sell),
        // 2.0 -> 1.0 crosses down from equal.
        assert_eq!(
            crossing_signals(&fast, &slow),
            vec![Signal::None, Signal::Buy, Signal::None, Signal::Sell]
        );
    }

    #[test]
    fn test_crossing_missing_is_neutral() {
        let fast = vec![Some(1.0), None, Some(3.0)];
        let slow = some(&[2.0, 2.0, 2.0]);
        assert_eq!(crossing_signals(&fast, &slow), vec![Signal::None; 3]);
    }

    #[test]
    fn test_threshold_rsi_sequence() {
        let rsi = some(&[28.0, 32.0, 55.0, 75.0, 68.0]);
        assert_eq!(
            threshold_signals(&rsi, 30.0, 70.0),
            vec![Signal::None, Signal::Buy, Signal::None, Signal::None, Signal::Sell]
        );
    }

    #[test]
    fn test_threshold_nan_neighbour_is_neutral() {
        let k = vec![Some(10.0), None, Some(25.0), Some(30.0)];
        assert_eq!(threshold_signals(&k, 20.0, 80.0), vec![Signal::None; 4]);
    }

    #[test]
    fn test_band_signals_level_based() {
        let closes = some(&[9.0, 9.0, 10.0, 11.0, 11.5]);
        let upper = some(&[11.0, 11.0, 11.0, 11.0, 11.0]);
        let lower = some(&[9.0, 9.5, 9.0, 9.0, 9.0]);
        assert_eq!(
            band_signals(&closes, &upper, &lower),
            vec![Signal::Buy, Signal::Buy, Signal::None, Signal::Sell, Signal::Sell]
        );
    }

    #[test]
    fn test_band_signals_ignore_non_positive_or_missing_bands() {
        let closes = some(&[-1.0, 5.0, 5.0]);
        let upper = vec![Some(0.0), None, Some(0.0)];
        let lower = vec![Some(0.0), None, None];
        assert_eq!(band_signals(&closes, &upper, &lower), vec![Signal::None; 3]);
    }
}
