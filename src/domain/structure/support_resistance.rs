//! Dynamic support/resistance from clustered lows and highs, and the simpler
//! "touching a recent extreme" check.

use crate::domain::ohlcv::Bar;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DynamicLevels {
    pub supports: Vec<f64>,
    pub resistances: Vec<f64>,
}

/// Level the current price sits on, if any.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LevelProximity {
    pub support: Option<f64>,
    pub resistance: Option<f64>,
}

/// Group prices into clusters whose members sit within `buffer` of one
/// another. A price joins the first closed cluster it is near; otherwise it
/// extends the running cluster, or closes it and starts a new one.
fn cluster(prices: impl Iterator<Item = f64>, min_touches: usize, buffer: f64) -> Vec<f64> {
    let near = |members: &[f64], price: f64| members.iter().any(|x| (price - x).abs() <= buffer);

    let mut closed: Vec<Vec<f64>> = Vec::new();
    let mut current: Vec<f64> = Vec::new();

    for price in prices {
        if let Some(c) = closed.iter_mut().find(|c| near(c, price)) {
            c.push(price);
            continue;
        }
        if !current.is_empty() && near(&current, price) {
            current.push(price);
        } else {
            if current.len() >= min_touches {
                closed.push(std::mem::take(&mut current));
            }
            current = vec![price];
        }
    }
    if current.len() >= min_touches {
        closed.push(current);
    }

    closed
        .iter()
        .filter(|c| c.len() >= min_touches)
        .map(|c| c.iter().sum::<f64>() / c.len() as f64)
        .collect()
}

pub fn detect_dynamic_levels(
    bars: &[Bar],
    lookback: usize,
    min_touches: usize,
    buffer: f64,
) -> DynamicLevels {
    let recent = &bars[bars.len().saturating_sub(lookback)..];
    DynamicLevels {
        supports: cluster(recent.iter().map(|b| b.low), min_touches, buffer),
        resistances: cluster(recent.iter().map(|b| b.high), min_touches, buffer),
    }
}

impl DynamicLevels {
    pub fn proximity(&self, price: f64, buffer: f64) -> LevelProximity {
        let within = |level: &&f64| (price - **level).abs() <= buffer;
        LevelProximity {
            support: self.supports.iter().find(within).copied(),
            resistance: self.resistances.iter().find(within).copied(),
        }
    }
}

/// Whether the last bar's low (high) lies within `tolerance` of any 3-bar
/// rolling low (high) over the last `lookback` bars.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecentTouch {
    pub support: bool,
    pub resistance: bool,
}

pub fn recent_touches(bars: &[Bar], lookback: usize, tolerance: f64) -> RecentTouch {
    let Some(last) = bars.last() else {
        return RecentTouch::default();
    };
    if bars.len() < 3 {
        return RecentTouch::default();
    }

    let windows: Vec<&[Bar]> = bars.windows(3).collect();
    let recent = &windows[windows.len().saturating_sub(lookback)..];

    let support = recent.iter().any(|w| {
        let low = w.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
        (last.low - low).abs() < tolerance
    });
    let resistance = recent.iter().any(|w| {
        let high = w.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
        (last.high - high).abs() < tolerance
    });

    RecentTouch {
        support,
        resistance,
    }
}
