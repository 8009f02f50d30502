//! Bollinger Bands indicator.
//!
//! Bollinger Bands consist of:
//! - Middle: Simple Moving Average (SMA) over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//! - Width: (Upper - Lower) / Middle × 100, the bandwidth used as an expansion filter
//!
//! StdDev is the sample standard deviation (divides by N-1).
//! Default parameters: period=20, multiplier=2.0
//! Warmup: first (period-1) bars are invalid.

use crate::domain::indicator::stddev::mean_and_sample_stddev;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::Bar;

pub fn calculate_bollinger(bars: &[Bar], period: usize, stddev_mult_x100: u32) -> IndicatorSeries {
    let mult = stddev_mult_x100 as f64 / 100.0;
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            if period < 2 || i + 1 < period {
                return IndicatorPoint::undefined(bar.timestamp);
            }
            match mean_and_sample_stddev(&closes[i + 1 - period..=i]) {
                Some((middle, sd)) if middle != 0.0 => {
                    let upper = middle + mult * sd;
                    let lower = middle - mult * sd;
                    IndicatorPoint {
                        timestamp: bar.timestamp,
                        valid: true,
                        value: IndicatorValue::Bands {
                            upper,
                            middle,
                            lower,
                            width: (upper - lower) / middle * 100.0,
                        },
                    }
                }
                _ => IndicatorPoint::undefined(bar.timestamp),
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Bollinger {
            period,
            stddev_mult_x100,
        },
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::make_bars;

    #[test]
    fn bollinger_warmup() {
        let bars = make_bars(&[1.0, 2.0, 3.0, 4.0]);
        let series = calculate_bollinger(&bars, 3, 200);
        assert!(!series.values[1].valid);
        assert!(series.values[2].valid);
    }

    #[test]
    fn bollinger_bands_symmetric_around_sma() {
        let bars = make_bars(&[10.0, 12.0, 14.0]);
        let series = calculate_bollinger(&bars, 3, 200);
        match series.last() {
            Some(IndicatorValue::Bands {
                upper,
                middle,
                lower,
                width,
            }) => {
                // mean 12, sample sd 2 → bands 8..16, width 8/12*100
                assert!((middle - 12.0).abs() < 1e-12);
                assert!((upper - 16.0).abs() < 1e-12);
                assert!((lower - 8.0).abs() < 1e-12);
                assert!((width - 800.0 / 12.0).abs() < 1e-9);
            }
            other => panic!("expected bands, got {:?}", other),
        }
    }

    #[test]
    fn bollinger_constant_prices_zero_width() {
        let bars = make_bars(&[5.0; 5]);
        let series = calculate_bollinger(&bars, 3, 200);
        match series.last() {
            Some(IndicatorValue::Bands { width, .. }) => assert_eq!(*width, 0.0),
            other => panic!("expected bands, got {:?}", other),
        }
    }

    #[test]
    fn bollinger_indicator_type() {
        let series = calculate_bollinger(&[], 20, 200);
        assert_eq!(
            series.indicator_type,
            IndicatorType::Bollinger {
                period: 20,
                stddev_mult_x100: 200
            }
        );
    }
}
