//! Tick-volume profile of the latest bar.

use crate::domain::ohlcv::Bar;

pub const DEFAULT_MA_PERIOD: usize = 20;
const WIDE_SPREAD_FACTOR: f64 = 1.2;
const TREND_BARS: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct VolumeProfile {
    pub current_volume: f64,
    pub average_volume: f64,
    /// Last volume over its moving average, 0 when the average is 0.
    pub ratio: f64,
    /// Last five volumes never decrease.
    pub increasing: bool,
    pub above_average: bool,
    /// Latest range wider than 1.2x the average range.
    pub wide_spread: bool,
}

pub fn analyze_volume(bars: &[Bar], ma_period: usize) -> Option<VolumeProfile> {
    if ma_period == 0 || bars.len() < ma_period {
        return None;
    }
    let window = &bars[bars.len() - ma_period..];
    let last = bars.last()?;

    let average_volume = window.iter().map(|b| b.volume as f64).sum::<f64>() / ma_period as f64;
    let average_range = window.iter().map(Bar::range).sum::<f64>() / ma_period as f64;
    let current_volume = last.volume as f64;

    let trend = &bars[bars.len().saturating_sub(TREND_BARS)..];
    let increasing = trend.windows(2).all(|w| w[1].volume >= w[0].volume);

    Some(VolumeProfile {
        current_volume,
        average_volume,
        ratio: if average_volume > 0.0 {
            current_volume / average_volume
        } else {
            0.0
        },
        increasing,
        above_average: current_volume > average_volume,
        wide_spread: last.range() > average_range * WIDE_SPREAD_FACTOR,
    })
}
