//! Kaufman Adaptive Moving Average.
//!
//! ER[i]  = |C[i] - C[i-n]| / sum(|C[j] - C[j-1]|, j = i-n+1..=i)   (0 when the sum is 0)
//! SC[i]  = (ER[i] * (fast_sc - slow_sc) + slow_sc)^2,  fast_sc = 2/(fast+1), slow_sc = 2/(slow+1)
//! AMA[n] = C[n];  AMA[i] = AMA[i-1] + SC[i] * (C[i] - AMA[i-1])
//!
//! Warmup: indices before n are undefined; with n or fewer bars nothing is defined.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::Bar;

pub const DEFAULT_FAST: usize = 2;
pub const DEFAULT_SLOW: usize = 30;

pub fn calculate_ama(bars: &[Bar], period: usize, fast: usize, slow: usize) -> IndicatorSeries {
    let indicator_type = IndicatorType::Ama { period, fast, slow };
    if period == 0 || fast == 0 || slow == 0 {
        return IndicatorSeries::empty(indicator_type);
    }

    let mut values: Vec<IndicatorPoint> = bars
        .iter()
        .map(|b| IndicatorPoint::undefined(b.timestamp))
        .collect();
    if bars.len() <= period {
        return IndicatorSeries {
            indicator_type,
            values,
        };
    }

    let fast_sc = 2.0 / (fast as f64 + 1.0);
    let slow_sc = 2.0 / (slow as f64 + 1.0);

    let mut ama = bars[period].close;
    values[period] = IndicatorPoint::simple(bars[period].timestamp, ama);

    for i in (period + 1)..bars.len() {
        let change = (bars[i].close - bars[i - period].close).abs();
        let volatility: f64 = ((i + 1 - period)..=i)
            .map(|j| (bars[j].close - bars[j - 1].close).abs())
            .sum();
        let er = if volatility > 0.0 {
            change / volatility
        } else {
            0.0
        };
        let sc = (er * (fast_sc - slow_sc) + slow_sc).powi(2);
        ama += sc * (bars[i].close - ama);
        values[i] = IndicatorPoint::simple(bars[i].timestamp, ama);
    }

    IndicatorSeries {
        indicator_type,
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::make_bars;

    #[test]
    fn ama_undefined_before_seed() {
        let bars = make_bars(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let series = calculate_ama(&bars, 3, 2, 30);
        assert_eq!(series.len(), 6);
        for i in 0..3 {
            assert!(!series.values[i].valid, "index {} should be undefined", i);
        }
        assert!(series.values[3].valid);
    }

    #[test]
    fn ama_seeded_at_close_of_period() {
        let bars = make_bars(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let series = calculate_ama(&bars, 3, 2, 30);
        assert_eq!(series.simple_back(2), Some(4.0));
    }

    #[test]
    fn ama_too_few_bars_all_undefined() {
        let bars = make_bars(&[1.0, 2.0, 3.0]);
        let series = calculate_ama(&bars, 3, 2, 30);
        assert_eq!(series.len(), 3);
        assert!(series.values.iter().all(|p| !p.valid));
    }

    #[test]
    fn ama_straight_line_uses_fast_constant() {
        // Perfectly efficient move: ER = 1, SC = fast_sc^2 = (2/3)^2.
        let bars = make_bars(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let series = calculate_ama(&bars, 3, 2, 30);
        let sc = (2.0f64 / 3.0).powi(2);
        let expected = 4.0 + sc * (5.0 - 4.0);
        let got = series.last_simple().unwrap();
        assert!((got - expected).abs() < 1e-12);
    }

    #[test]
    fn ama_flat_market_uses_slow_constant() {
        let bars = make_bars(&[2.0, 2.0, 2.0, 2.0, 2.0]);
        let series = calculate_ama(&bars, 3, 2, 30);
        assert_eq!(series.last_simple(), Some(2.0));
    }

    #[test]
    fn ama_zero_period() {
        let bars = make_bars(&[1.0, 2.0]);
        assert!(calculate_ama(&bars, 0, 2, 30).is_empty());
    }

    #[test]
    fn ama_indicator_type() {
        let series = calculate_ama(&[], 50, 2, 30);
        assert_eq!(
            series.indicator_type,
            IndicatorType::Ama {
                period: 50,
                fast: 2,
                slow: 30
            }
        );
    }
}
