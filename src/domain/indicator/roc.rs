//! ROC (Rate of Change) indicator implementation.
//!
//! ROC(n)[i] = ((C[i] - C[i-n]) / C[i-n]) * 100
//! Undefined during the first n bars and when C[i-n] == 0.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::Bar;

pub fn calculate_roc(bars: &[Bar], period: usize) -> IndicatorSeries {
    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            if period == 0 || i < period || bars[i - period].close == 0.0 {
                return IndicatorPoint::undefined(bar.timestamp);
            }
            let prev_close = bars[i - period].close;
            IndicatorPoint::simple(bar.timestamp, (bar.close - prev_close) / prev_close * 100.0)
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Roc(period),
        values,
    }
}
