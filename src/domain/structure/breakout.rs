//! Breakouts through the recent 3-bar rolling extreme.

use crate::domain::ohlcv::Bar;

pub const DEFAULT_LOOKBACK: usize = 20;
pub const VOLUME_CONFIRM_FACTOR: f64 = 1.5;
pub const RETEST_FRACTION: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakoutDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Breakout {
    pub direction: BreakoutDirection,
    pub level: f64,
    /// 0..=100, twenty points per percent beyond the level.
    pub strength: u8,
    pub volume_confirmed: bool,
    pub retested: bool,
}

fn rolling3<F: Fn(&Bar) -> f64>(bars: &[Bar], pick: F, max: bool) -> Vec<f64> {
    bars.windows(3)
        .map(|w| {
            let vals = w.iter().map(&pick);
            if max {
                vals.fold(f64::NEG_INFINITY, f64::max)
            } else {
                vals.fold(f64::INFINITY, f64::min)
            }
        })
        .collect()
}

/// Needs at least `lookback + 5` bars. The level is the extreme of the 3-bar
/// rolling high (low) over the `lookback - 1` bars before the latest one.
pub fn detect_breakout(bars: &[Bar], lookback: usize) -> Option<Breakout> {
    let n = bars.len();
    if lookback < 2 || n < lookback + 5 {
        return None;
    }

    // rolling value for bar i lives at index i - 2
    let highs = rolling3(bars, |b| b.high, true);
    let lows = rolling3(bars, |b| b.low, false);
    let span = (n - lookback - 2)..(n - 3);

    let resistance = highs[span.clone()].iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let support = lows[span].iter().copied().fold(f64::INFINITY, f64::min);

    let current = bars[n - 1].close;
    let previous = bars[n - 2].close;

    let prior = &bars[n - lookback..n - 1];
    let avg_volume = prior.iter().map(|b| b.volume as f64).sum::<f64>() / prior.len() as f64;
    let volume_confirmed = bars[n - 1].volume as f64 > avg_volume * VOLUME_CONFIRM_FACTOR;
    let last3 = &bars[n - 3..];

    let strength = |distance_pct: f64| (distance_pct * 20.0).clamp(0.0, 100.0) as u8;

    if current > resistance && previous <= resistance {
        let recent_min = last3.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
        Some(Breakout {
            direction: BreakoutDirection::Up,
            level: resistance,
            strength: strength((current - resistance) / resistance * 100.0),
            volume_confirmed,
            retested: resistance - recent_min < resistance * RETEST_FRACTION,
        })
    } else if current < support && previous >= support {
        let recent_max = last3.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
        Some(Breakout {
            direction: BreakoutDirection::Down,
            level: support,
            strength: strength((support - current) / support * 100.0),
            volume_confirmed,
            retested: recent_max - support < support * RETEST_FRACTION,
        })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::ts;

    fn range_then(last: (f64, f64, f64), volume: i64) -> Vec<Bar> {
        let mut bars: Vec<Bar> = (0..30)
            .map(|i| Bar {
                timestamp: ts(i),
                open: 1.1000,
                high: 1.1010,
                low: 1.0990,
                close: 1.1000,
                volume: 100,
            })
            .collect();
        let (high, low, close) = last;
        bars.push(Bar {
            timestamp: ts(30),
            open: 1.1000,
            high,
            low,
            close,
            volume,
        });
        bars
    }

    #[test]
    fn upside_breakout_with_volume() {
        let bars = range_then((1.1030, 1.0995, 1.1025), 200);
        let b = detect_breakout(&bars, DEFAULT_LOOKBACK).expect("breakout");
        assert_eq!(b.direction, BreakoutDirection::Up);
        assert!((b.level - 1.1010).abs() < 1e-12);
        assert!(b.volume_confirmed);
        assert!(!b.retested);
        // 0.136% beyond the level
        assert_eq!(b.strength, 2);
    }

    #[test]
    fn retest_when_recent_lows_hug_the_level() {
        let mut bars = range_then((1.1030, 1.1008, 1.1025), 200);
        bars[28].low = 1.1005;
        bars[29].low = 1.1004;
        let b = detect_breakout(&bars, DEFAULT_LOOKBACK).expect("breakout");
        assert!(b.retested);
    }

    #[test]
    fn downside_breakout_without_volume() {
        let bars = range_then((1.0995, 1.0900, 1.0905), 120);
        let b = detect_breakout(&bars, DEFAULT_LOOKBACK).expect("breakdown");
        assert_eq!(b.direction, BreakoutDirection::Down);
        assert!((b.level - 1.0990).abs() < 1e-12);
        assert!(!b.volume_confirmed);
        // 0.77% below support → 15
        assert_eq!(b.strength, 15);
    }

    #[test]
    fn no_breakout_inside_range() {
        let bars = range_then((1.1005, 1.0995, 1.1002), 100);
        assert!(detect_breakout(&bars, DEFAULT_LOOKBACK).is_none());
    }

    #[test]
    fn needs_lookback_plus_five() {
        let bars = range_then((1.1030, 1.0995, 1.1025), 200);
        assert!(detect_breakout(&bars[bars.len() - 24..], DEFAULT_LOOKBACK).is_none());
    }
}
