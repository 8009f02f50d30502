//! Short-horizon price momentum from net close-to-close movement.

use std::fmt;

use crate::domain::ohlcv::Bar;

pub const DEFAULT_LOOKBACK: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Momentum {
    Bullish,
    Bearish,
    Sideways,
}

impl fmt::Display for Momentum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Momentum::Bullish => "BULLISH",
            Momentum::Bearish => "BEARISH",
            Momentum::Sideways => "SIDEWAYS",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceMomentum {
    pub direction: Momentum,
    /// |net| / Σ|Δclose|, 0 when price did not move.
    pub strength: f64,
    pub net_movement: f64,
    pub bullish_candles: usize,
    pub bearish_candles: usize,
    pub recent_high: f64,
    pub recent_low: f64,
}

/// Uses the last `lookback + 1` bars; `None` when fewer are available.
pub fn analyze_price_momentum(bars: &[Bar], lookback: usize) -> Option<PriceMomentum> {
    if lookback == 0 || bars.len() < lookback + 1 {
        return None;
    }
    let recent = &bars[bars.len() - lookback - 1..];

    let (net, total) = recent.windows(2).fold((0.0, 0.0), |(net, total), w| {
        let diff = w[1].close - w[0].close;
        (net + diff, total + diff.abs())
    });
    let strength = if total > 0.0 { net.abs() / total } else { 0.0 };

    let direction = if net > 0.0 {
        Momentum::Bullish
    } else if net < 0.0 {
        Momentum::Bearish
    } else {
        Momentum::Sideways
    };

    let bullish_candles = recent.iter().filter(|b| b.is_bullish()).count();

    Some(PriceMomentum {
        direction,
        strength,
        net_movement: net,
        bullish_candles,
        bearish_candles: recent.len() - bullish_candles,
        recent_high: recent.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max),
        recent_low: recent.iter().map(|b| b.low).fold(f64::INFINITY, f64::min),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::make_bars;

    #[test]
    fn strictly_falling_is_fully_bearish() {
        let bars = make_bars(&[10.0, 9.0, 8.0, 7.0, 6.0, 5.0]);
        let m = analyze_price_momentum(&bars, 5).unwrap();
        assert_eq!(m.direction, Momentum::Bearish);
        assert!((m.strength - 1.0).abs() < f64::EPSILON);
        assert!((m.net_movement + 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn choppy_move_has_partial_strength() {
        // +2 -1 +2 -1 +2 → net 4, total 8
        let bars = make_bars(&[1.0, 3.0, 2.0, 4.0, 3.0, 5.0]);
        let m = analyze_price_momentum(&bars, 5).unwrap();
        assert_eq!(m.direction, Momentum::Bullish);
        assert!((m.strength - 0.5).abs() < 1e-12);
    }

    #[test]
    fn flat_is_sideways() {
        let bars = make_bars(&[1.0; 6]);
        let m = analyze_price_momentum(&bars, 5).unwrap();
        assert_eq!(m.direction, Momentum::Sideways);
        assert_eq!(m.strength, 0.0);
    }

    #[test]
    fn uses_only_trailing_window() {
        let bars = make_bars(&[100.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let m = analyze_price_momentum(&bars, 5).unwrap();
        assert!((m.net_movement - 5.0).abs() < f64::EPSILON);
        assert!((m.recent_high - 6.0).abs() < f64::EPSILON);
    }

    #[test]
    fn insufficient_bars() {
        assert!(analyze_price_momentum(&make_bars(&[1.0, 2.0]), 5).is_none());
    }
}
