//! Keltner Channels.
//!
//! Middle = EMA(n) of close, Upper/Lower = Middle ± mult × ATR(n),
//! Width = (Upper - Lower) / Middle × 100.
//! Valid once both the EMA warmup and the ATR window are complete.

use crate::domain::indicator::{
    calculate_atr, calculate_ema, IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue,
};
use crate::domain::ohlcv::Bar;

pub fn calculate_keltner(bars: &[Bar], period: usize, atr_mult_x100: u32) -> IndicatorSeries {
    let indicator_type = IndicatorType::Keltner {
        period,
        atr_mult_x100,
    };
    if period == 0 || bars.is_empty() {
        return IndicatorSeries::empty(indicator_type);
    }

    let mult = atr_mult_x100 as f64 / 100.0;
    let middle = calculate_ema(bars, period).simple_values();
    let atr = calculate_atr(bars, period).simple_values();

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| match (middle[i], atr[i]) {
            (Some(middle), Some(atr)) if middle != 0.0 => {
                let upper = middle + atr * mult;
                let lower = middle - atr * mult;
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
        })
        .collect();

    IndicatorSeries {
        indicator_type,
        values,
    }
}
