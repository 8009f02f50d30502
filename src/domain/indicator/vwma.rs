//! Volume-Weighted Moving Average indicator.
//!
//! VWMA(n)[i] = sum(C[j] * V[j]) / sum(V[j]) over the last n bars.
//! Undefined during warmup and whenever the window carries no volume.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::Bar;

pub fn calculate_vwma(bars: &[Bar], period: usize) -> IndicatorSeries {
    if period == 0 || bars.is_empty() {
        return IndicatorSeries::empty(IndicatorType::Vwma(period));
    }

    let mut values = Vec::with_capacity(bars.len());
    let mut pv_sum = 0.0;
    let mut v_sum = 0.0;

    for (i, bar) in bars.iter().enumerate() {
        pv_sum += bar.close * bar.volume as f64;
        v_sum += bar.volume as f64;
        if i >= period {
            let old = &bars[i - period];
            pv_sum -= old.close * old.volume as f64;
            v_sum -= old.volume as f64;
        }

        if i + 1 < period || v_sum <= 0.0 {
            values.push(IndicatorPoint::undefined(bar.timestamp));
        } else {
            values.push(IndicatorPoint::simple(bar.timestamp, pv_sum / v_sum));
        }
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Vwma(period),
        values,
    }
}
