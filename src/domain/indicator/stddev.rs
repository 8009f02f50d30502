//! Standard Deviation indicator.
//!
//! Sample standard deviation (divides by n-1) over n closing prices.
//! Warmup: first (n-1) bars are invalid; a period below 2 is never defined.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::Bar;

/// Mean and sample standard deviation of a window.
pub(crate) fn mean_and_sample_stddev(window: &[f64]) -> Option<(f64, f64)> {
    let n = window.len();
    if n < 2 {
        return None;
    }
    let mean = window.iter().sum::<f64>() / n as f64;
    let variance = window.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    Some((mean, variance.sqrt()))
}

pub fn calculate_stddev(bars: &[Bar], period: usize) -> IndicatorSeries {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            if period < 2 || i + 1 < period {
                return IndicatorPoint::undefined(bar.timestamp);
            }
            match mean_and_sample_stddev(&closes[i + 1 - period..=i]) {
                Some((_, sd)) => IndicatorPoint::simple(bar.timestamp, sd),
                None => IndicatorPoint::undefined(bar.timestamp),
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Stddev(period),
        values,
    }
}
