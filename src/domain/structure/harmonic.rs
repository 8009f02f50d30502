//! XABCD harmonic patterns over the last five swing points.
//!
//! Ratios compared against each pattern's template (absolute tolerance):
//!   XB = |B - X| / XA,  BC = |C - B| / AB,  CD = |D - C| / BC,  AD = |D - X| / XA
//! D below X is bullish, D above X is bearish.

use std::fmt;

use crate::domain::structure::swing::Swings;

pub const DEFAULT_TOLERANCE: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarmonicPattern {
    Gartley,
    Butterfly,
    Bat,
    Crab,
}

struct Template {
    pattern: HarmonicPattern,
    xb: f64,
    bc: f64,
    cd: f64,
    ad: f64,
}

const TEMPLATES: [Template; 4] = [
    Template { pattern: HarmonicPattern::Gartley, xb: 0.618, bc: 0.382, cd: 1.272, ad: 0.786 },
    Template { pattern: HarmonicPattern::Butterfly, xb: 0.786, bc: 0.382, cd: 1.618, ad: 1.27 },
    Template { pattern: HarmonicPattern::Bat, xb: 0.382, bc: 0.382, cd: 2.618, ad: 0.886 },
    Template { pattern: HarmonicPattern::Crab, xb: 0.382, bc: 0.618, cd: 3.618, ad: 1.618 },
];

impl fmt::Display for HarmonicPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HarmonicPattern::Gartley => "gartley",
            HarmonicPattern::Butterfly => "butterfly",
            HarmonicPattern::Bat => "bat",
            HarmonicPattern::Crab => "crab",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HarmonicMatch {
    pub pattern: HarmonicPattern,
    pub bullish: bool,
    /// X, A, B, C, D prices.
    pub points: [f64; 5],
}

pub fn detect_harmonics(swings: &Swings, tolerance: f64) -> Vec<HarmonicMatch> {
    if swings.highs.len() < 2 || swings.lows.len() < 2 {
        return Vec::new();
    }
    let all = swings.chronological();
    if all.len() < 5 {
        return Vec::new();
    }
    let tail = &all[all.len() - 5..];
    let [x, a, b, c, d] = [
        tail[0].price,
        tail[1].price,
        tail[2].price,
        tail[3].price,
        tail[4].price,
    ];

    let xa = (a - x).abs();
    let ab = (b - a).abs();
    let bc = (c - b).abs();
    let cd = (d - c).abs();
    if xa == 0.0 || ab == 0.0 || bc == 0.0 {
        return Vec::new();
    }

    let xb_ratio = (b - x).abs() / xa;
    let bc_ratio = bc / ab;
    let cd_ratio = cd / bc;
    let ad_ratio = (d - x).abs() / xa;

    let near = |got: f64, want: f64| (got - want).abs() <= tolerance;

    TEMPLATES
        .iter()
        .filter(|t| {
            near(xb_ratio, t.xb)
                && near(bc_ratio, t.bc)
                && near(cd_ratio, t.cd)
                && near(ad_ratio, t.ad)
        })
        .map(|t| HarmonicMatch {
            pattern: t.pattern,
            bullish: d < x,
            points: [x, a, b, c, d],
        })
        .collect()
}
