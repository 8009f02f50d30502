//! Swing highs and lows.
//!
//! Bar i is a swing high when its high is not below any high in the `left`
//! bars before it and the `right` bars after it (swing low mirrored on lows).
//! Ties count as extrema, so a flat top can produce adjacent swing points.

use chrono::NaiveDateTime;

use crate::domain::ohlcv::Bar;

pub const DEFAULT_WINDOW: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwingKind {
    High,
    Low,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwingPoint {
    pub index: usize,
    pub timestamp: NaiveDateTime,
    pub price: f64,
    pub kind: SwingKind,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Swings {
    pub highs: Vec<SwingPoint>,
    pub lows: Vec<SwingPoint>,
}

impl Swings {
    /// All swing points ordered by time (highs before lows on the same bar).
    pub fn chronological(&self) -> Vec<SwingPoint> {
        let mut all: Vec<SwingPoint> = self.highs.iter().chain(&self.lows).cloned().collect();
        all.sort_by_key(|p| p.index);
        all
    }
}

/// Higher-high / higher-low sequencing of the last two swings on each side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwingStructure {
    pub higher_high: bool,
    pub higher_low: bool,
    pub lower_high: bool,
    pub lower_low: bool,
}

impl SwingStructure {
    pub fn is_uptrend(&self) -> bool {
        self.higher_high && self.higher_low
    }

    pub fn is_downtrend(&self) -> bool {
        self.lower_high && self.lower_low
    }
}

pub fn detect_swings(bars: &[Bar], left: usize, right: usize) -> Swings {
    let mut swings = Swings::default();
    if bars.len() < left + right + 1 {
        return swings;
    }

    for i in left..bars.len() - right {
        let neighbours = (i - left..i).chain(i + 1..=i + right);

        let is_high = neighbours.clone().all(|j| bars[i].high >= bars[j].high);
        if is_high {
            swings.highs.push(SwingPoint {
                index: i,
                timestamp: bars[i].timestamp,
                price: bars[i].high,
                kind: SwingKind::High,
            });
        }

        let is_low = neighbours.clone().all(|j| bars[i].low <= bars[j].low);
        if is_low {
            swings.lows.push(SwingPoint {
                index: i,
                timestamp: bars[i].timestamp,
                price: bars[i].low,
                kind: SwingKind::Low,
            });
        }
    }

    swings
}

pub fn swing_structure(swings: &Swings) -> Option<SwingStructure> {
    if swings.highs.len() < 2 || swings.lows.len() < 2 {
        return None;
    }
    let last_high = swings.highs[swings.highs.len() - 1].price;
    let prev_high = swings.highs[swings.highs.len() - 2].price;
    let last_low = swings.lows[swings.lows.len() - 1].price;
    let prev_low = swings.lows[swings.lows.len() - 2].price;

    Some(SwingStructure {
        higher_high: last_high > prev_high,
        lower_high: last_high < prev_high,
        higher_low: last_low > prev_low,
        lower_low: last_low < prev_low,
    })
}
