//! Simple Moving Average indicator.
//!
//! SMA(n)[i] = sum(C[i-n+1..=i]) / n, maintained as a running window sum.
//! Warmup: first (n-1) bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::Bar;

pub fn calculate_sma(bars: &[Bar], period: usize) -> IndicatorSeries {
    if period == 0 {
        return IndicatorSeries::empty(IndicatorType::Sma(period));
    }

    let mut values = Vec::with_capacity(bars.len());
    let mut window_sum = 0.0;

    for (i, bar) in bars.iter().enumerate() {
        window_sum += bar.close;
        if i >= period {
            window_sum -= bars[i - period].close;
        }
        if i + 1 < period {
            values.push(IndicatorPoint::undefined(bar.timestamp));
        } else {
            values.push(IndicatorPoint::simple(
                bar.timestamp,
                window_sum / period as f64,
            ));
        }
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Sma(period),
        values,
    }
}

/// Rolling mean over raw values; `None` until the window is full.
pub fn rolling_mean(input: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; input.len()];
    }
    let mut out = Vec::with_capacity(input.len());
    let mut sum = 0.0;
    for i in 0..input.len() {
        sum += input[i];
        if i >= period {
            sum -= input[i - period];
        }
        out.push((i + 1 >= period).then(|| sum / period as f64));
    }
    out
}

/// Rolling mean over optional values; a window containing any `None` is `None`.
pub fn rolling_mean_opt(input: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    (0..input.len())
        .map(|i| {
            if period == 0 || i + 1 < period {
                return None;
            }
            let window = &input[i + 1 - period..=i];
            let sum: Option<f64> = window.iter().copied().sum();
            sum.map(|s| s / period as f64)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::make_bars;

    #[test]
    fn sma_basic() {
        let bars = make_bars(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let series = calculate_sma(&bars, 3);
        assert!(!series.values[1].valid);
        assert_eq!(series.simple_back(2), Some(2.0));
        assert_eq!(series.last_simple(), Some(4.0));
    }

    #[test]
    fn sma_zero_period() {
        let bars = make_bars(&[1.0]);
        assert!(calculate_sma(&bars, 0).is_empty());
    }

    #[test]
    fn rolling_mean_alignment() {
        let out = rolling_mean(&[2.0, 4.0, 6.0, 8.0], 2);
        assert_eq!(out, vec![None, Some(3.0), Some(5.0), Some(7.0)]);
    }

    #[test]
    fn rolling_mean_opt_skips_gaps() {
        let out = rolling_mean_opt(&[None, Some(2.0), Some(4.0), Some(6.0)], 2);
        assert_eq!(out, vec![None, None, Some(3.0), Some(5.0)]);
    }
}
