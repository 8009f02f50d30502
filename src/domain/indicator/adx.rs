//! ADX / DMI (Average Directional Index with directional indicators).
//!
//! +DM[i] = H[i] - H[i-1], -DM[i] = L[i-1] - L[i], negatives floored at 0;
//! when both moves are positive only the larger one is kept.
//! +DI = 100 * mean(+DM, n) / ATR(n), -DI likewise.
//! DX  = 100 * |+DI - -DI| / (+DI + -DI),  ADX = mean(DX, n).
//! Warmup: the first 2n-1 bars are invalid.

use crate::domain::indicator::atr::true_ranges;
use crate::domain::indicator::sma::{rolling_mean, rolling_mean_opt};
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::Bar;

pub const DEFAULT_PERIOD: usize = 14;

fn directional_movement(bars: &[Bar]) -> (Vec<Option<f64>>, Vec<Option<f64>>) {
    let mut plus = vec![None; bars.len()];
    let mut minus = vec![None; bars.len()];
    for i in 1..bars.len() {
        let up = bars[i].high - bars[i - 1].high;
        let down = bars[i - 1].low - bars[i].low;
        let mut pdm = up.max(0.0);
        let mut ndm = down.max(0.0);
        if up > 0.0 && down > 0.0 {
            if up > down {
                ndm = 0.0;
            } else {
                pdm = 0.0;
            }
        }
        plus[i] = Some(pdm);
        minus[i] = Some(ndm);
    }
    (plus, minus)
}

pub fn calculate_adx(bars: &[Bar], period: usize) -> IndicatorSeries {
    if period == 0 {
        return IndicatorSeries::empty(IndicatorType::Adx(period));
    }

    let atr = rolling_mean(&true_ranges(bars), period);
    let (plus_dm, minus_dm) = directional_movement(bars);
    let plus_mean = rolling_mean_opt(&plus_dm, period);
    let minus_mean = rolling_mean_opt(&minus_dm, period);

    let di = |mean: Option<f64>, atr: Option<f64>| -> Option<f64> {
        match (mean, atr) {
            (Some(m), Some(a)) if a > 0.0 => Some(100.0 * m / a),
            _ => None,
        }
    };
    let plus_di: Vec<Option<f64>> = (0..bars.len()).map(|i| di(plus_mean[i], atr[i])).collect();
    let minus_di: Vec<Option<f64>> = (0..bars.len()).map(|i| di(minus_mean[i], atr[i])).collect();

    let dx: Vec<Option<f64>> = plus_di
        .iter()
        .zip(&minus_di)
        .map(|(p, m)| match (p, m) {
            (Some(p), Some(m)) if p + m > 0.0 => Some(100.0 * (p - m).abs() / (p + m)),
            _ => None,
        })
        .collect();
    let adx = rolling_mean_opt(&dx, period);

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| match (adx[i], plus_di[i], minus_di[i]) {
            (Some(adx), Some(plus_di), Some(minus_di)) => IndicatorPoint {
                timestamp: bar.timestamp,
                valid: true,
                value: IndicatorValue::Dmi {
                    adx,
                    plus_di,
                    minus_di,
                },
            },
            _ => IndicatorPoint::undefined(bar.timestamp),
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Adx(period),
        values,
    }
}
