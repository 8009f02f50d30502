//! Pivot levels computed from the prior period's OHLC.

use std::fmt;
use std::str::FromStr;

use crate::domain::error::AmatraderError;
use crate::domain::ohlcv::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PivotType {
    #[default]
    Standard,
    Fibonacci,
    Woodie,
    Camarilla,
    Demark,
}

impl fmt::Display for PivotType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PivotType::Standard => "STANDARD",
            PivotType::Fibonacci => "FIBONACCI",
            PivotType::Woodie => "WOODIE",
            PivotType::Camarilla => "CAMARILLA",
            PivotType::Demark => "DEMARK",
        };
        f.write_str(s)
    }
}

impl FromStr for PivotType {
    type Err = AmatraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "STANDARD" => Ok(PivotType::Standard),
            "FIBONACCI" => Ok(PivotType::Fibonacci),
            "WOODIE" => Ok(PivotType::Woodie),
            "CAMARILLA" => Ok(PivotType::Camarilla),
            "DEMARK" => Ok(PivotType::Demark),
            other => Err(AmatraderError::Invalid {
                field: "pivot_type".into(),
                reason: format!("unknown pivot type '{other}'"),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelRole {
    Pivot,
    Resistance,
    Support,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PivotLevel {
    pub name: &'static str,
    pub price: f64,
    pub role: LevelRole,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PivotLevels {
    pub pivot_type: PivotType,
    pub levels: Vec<PivotLevel>,
}

impl PivotLevels {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.levels.iter().find(|l| l.name == name).map(|l| l.price)
    }

    /// Closest level within `buffer` of `price`.
    pub fn nearest_within(&self, price: f64, buffer: f64) -> Option<&PivotLevel> {
        self.levels
            .iter()
            .filter(|l| (price - l.price).abs() <= buffer)
            .min_by(|a, b| (price - a.price).abs().total_cmp(&(price - b.price).abs()))
    }
}

fn level(name: &'static str, price: f64) -> PivotLevel {
    let role = match name.as_bytes().first() {
        Some(b'R') => LevelRole::Resistance,
        Some(b'S') => LevelRole::Support,
        _ => LevelRole::Pivot,
    };
    PivotLevel { name, price, role }
}

fn classic(pivot: f64, high: f64, low: f64) -> Vec<PivotLevel> {
    let range = high - low;
    vec![
        level("P", pivot),
        level("R1", 2.0 * pivot - low),
        level("R2", pivot + range),
        level("R3", high + 2.0 * (pivot - low)),
        level("S1", 2.0 * pivot - high),
        level("S2", pivot - range),
        level("S3", low - 2.0 * (high - pivot)),
    ]
}

pub fn calculate_pivots(prior: &Bar, pivot_type: PivotType) -> PivotLevels {
    let (high, low, close, open) = (prior.high, prior.low, prior.close, prior.open);
    let pivot = (high + low + close) / 3.0;
    let range = high - low;

    let levels = match pivot_type {
        PivotType::Standard => classic(pivot, high, low),
        PivotType::Fibonacci => vec![
            level("P", pivot),
            level("R1", pivot + range * 0.382),
            level("R2", pivot + range * 0.618),
            level("R3", pivot + range),
            level("S1", pivot - range * 0.382),
            level("S2", pivot - range * 0.618),
            level("S3", pivot - range),
        ],
        PivotType::Woodie => classic((high + low + 2.0 * close) / 4.0, high, low),
        PivotType::Camarilla => {
            let step = range * 1.1;
            vec![
                level("P", pivot),
                level("R1", close + step / 12.0),
                level("R2", close + step / 6.0),
                level("R3", close + step / 4.0),
                level("R4", close + step / 2.0),
                level("S1", close - step / 12.0),
                level("S2", close - step / 6.0),
                level("S3", close - step / 4.0),
                level("S4", close - step / 2.0),
            ]
        }
        PivotType::Demark => {
            let x = if close < open {
                high + 2.0 * low + close
            } else {
                2.0 * high + low + close
            };
            let p = x / 4.0;
            vec![level("P", p), level("R1", 2.0 * p - low), level("S1", 2.0 * p - high)]
        }
    };

    PivotLevels { pivot_type, levels }
}

/// OHLC of the last complete calendar day before the final bar's day,
/// aggregated from intraday bars.
pub fn prior_day(bars: &[Bar]) -> Option<Bar> {
    let today = bars.last()?.timestamp.date();
    let day = bars
        .iter()
        .rev()
        .map(|b| b.timestamp.date())
        .find(|d| *d < today)?;

    let mut iter = bars.iter().filter(|b| b.timestamp.date() == day);
    let first = iter.next()?;
    let mut agg = first.clone();
    for b in iter {
        agg.high = agg.high.max(b.high);
        agg.low = agg.low.min(b.low);
        agg.close = b.close;
        agg.volume += b.volume;
    }
    Some(agg)
}
