//! Trading sessions, overlaps and the per-instrument session status.
//!
//! Session times are wall-clock times of the session clock (US/Eastern by
//! default, configured as a fixed UTC offset). Ranges are inclusive at both
//! ends and may cross midnight.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{Duration, NaiveDateTime, NaiveTime, Timelike};

use crate::domain::config::SessionConfig;
use crate::domain::timeframe::Timeframe;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionWindow {
    pub start: (u32, u32),
    pub end: (u32, u32),
}

impl SessionWindow {
    const fn new(start: (u32, u32), end: (u32, u32)) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        let now = (time.hour(), time.minute());
        if self.start > self.end {
            now >= self.start || now <= self.end
        } else {
            self.start <= now && now <= self.end
        }
    }
}

impl fmt::Display for SessionWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}-{:02}:{:02}",
            self.start.0, self.start.1, self.end.0, self.end.1
        )
    }
}

#[derive(Debug)]
pub struct TradingSession {
    pub name: &'static str,
    pub window: SessionWindow,
    pub primary: &'static [&'static str],
    pub secondary: &'static [&'static str],
    pub cross: &'static [&'static str],
}

#[derive(Debug)]
pub struct OverlapSession {
    pub name: &'static str,
    pub window: SessionWindow,
    pub pairs: &'static [&'static str],
}

pub static SESSIONS: [TradingSession; 4] = [
    TradingSession {
        name: "SYDNEY",
        window: SessionWindow::new((17, 0), (2, 0)),
        primary: &["AUDUSD", "AUDJPY", "AUDNZD", "AUDCAD", "AUDCHF"],
        secondary: &["NZDUSD", "NZDJPY", "NZDCAD", "NZDCHF"],
        cross: &["AUDNZD", "GBPAUD", "EURAUD"],
    },
    TradingSession {
        name: "TOKYO",
        window: SessionWindow::new((20, 0), (5, 0)),
        primary: &["USDJPY", "EURJPY", "GBPJPY"],
        secondary: &["AUDJPY", "NZDJPY", "CADJPY", "CHFJPY"],
        cross: &["ZARJPY", "SGDJPY", "CNHJPY"],
    },
    TradingSession {
        name: "LONDON",
        window: SessionWindow::new((3, 0), (12, 0)),
        primary: &["EURUSD", "GBPUSD", "EURGBP"],
        secondary: &["USDCHF", "EURCHF", "GBPCHF"],
        cross: &["EURGBP", "EURCHF", "GBPCHF"],
    },
    TradingSession {
        name: "NEWYORK",
        window: SessionWindow::new((8, 0), (17, 0)),
        primary: &["EURUSD", "USDCAD", "USDJPY"],
        secondary: &["GBPUSD", "AUDUSD", "NZDUSD"],
        cross: &["EURCAD", "GBPCAD", "CADJPY"],
    },
];

pub static OVERLAPS: [OverlapSession; 3] = [
    OverlapSession {
        name: "SYDNEY-TOKYO",
        window: SessionWindow::new((20, 0), (2, 0)),
        pairs: &["USDJPY", "AUDJPY", "NZDJPY", "AUDUSD", "AUDNZD", "NZDUSD"],
    },
    OverlapSession {
        name: "TOKYO-LONDON",
        window: SessionWindow::new((3, 0), (5, 0)),
        pairs: &[
            "USDJPY", "EURJPY", "GBPJPY", "EURUSD", "GBPUSD", "AUDJPY", "NZDJPY",
        ],
    },
    OverlapSession {
        name: "LONDON-NEWYORK",
        window: SessionWindow::new((8, 0), (12, 0)),
        pairs: &[
            "EURUSD", "GBPUSD", "USDJPY", "EURGBP", "EURJPY", "GBPJPY", "USDCHF", "USDCAD",
        ],
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionPriority {
    Inactive,
    Secondary,
    Primary,
    Overlap,
}

impl SessionPriority {
    pub fn level(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for SessionPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionPriority::Overlap => "OVERLAP",
            SessionPriority::Primary => "PRIMARY",
            SessionPriority::Secondary => "SECONDARY",
            SessionPriority::Inactive => "INACTIVE",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatus {
    pub priority: SessionPriority,
    pub active_sessions: Vec<&'static str>,
    pub is_overlap: bool,
    pub timeframe: Timeframe,
    pub lot_multiplier: f64,
    pub risk_multiplier: f64,
    pub max_spread_pips: f64,
}

impl SessionStatus {
    pub fn should_trade(&self) -> bool {
        self.priority > SessionPriority::Inactive
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sessions = if self.active_sessions.is_empty() {
            "-".to_string()
        } else {
            self.active_sessions.join(",")
        };
        write!(
            f,
            "{} [{}] timeframe={} lot x{} risk x{} max spread {} pips",
            self.priority,
            sessions,
            self.timeframe,
            self.lot_multiplier,
            self.risk_multiplier,
            self.max_spread_pips
        )
    }
}

/// Converts a UTC timestamp to the session clock.
pub fn session_clock(utc: NaiveDateTime, utc_offset_minutes: i32) -> NaiveDateTime {
    utc + Duration::minutes(i64::from(utc_offset_minutes))
}

pub fn active_sessions(time: NaiveTime) -> Vec<&'static str> {
    SESSIONS
        .iter()
        .filter(|s| s.window.contains(time))
        .map(|s| s.name)
        .collect()
}

pub fn active_overlaps(time: NaiveTime) -> Vec<&'static str> {
    OVERLAPS
        .iter()
        .filter(|o| o.window.contains(time))
        .map(|o| o.name)
        .collect()
}

/// Every pair that appears in any session or overlap, sorted.
pub fn tradeable_pairs() -> Vec<&'static str> {
    let mut pairs: BTreeSet<&'static str> = BTreeSet::new();
    for s in &SESSIONS {
        pairs.extend(s.primary.iter().chain(s.secondary).chain(s.cross));
    }
    for o in &OVERLAPS {
        pairs.extend(o.pairs.iter());
    }
    pairs.into_iter().collect()
}

#[derive(Debug, Clone)]
pub struct SessionPolicy {
    config: SessionConfig,
}

impl SessionPolicy {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    pub fn base_timeframe(&self) -> Timeframe {
        self.config.base_timeframe
    }

    pub fn overlap_timeframe(&self) -> Timeframe {
        self.config.base_timeframe.faster()
    }

    fn regular(&self, priority: SessionPriority, active: Vec<&'static str>) -> SessionStatus {
        SessionStatus {
            priority,
            active_sessions: active,
            is_overlap: false,
            timeframe: self.config.base_timeframe,
            lot_multiplier: 1.0,
            risk_multiplier: 1.0,
            max_spread_pips: self.config.regular_max_spread_pips,
        }
    }

    /// Session status of `instrument` at session-clock time `time`.
    pub fn status(&self, instrument: &str, time: NaiveTime) -> SessionStatus {
        let pair = instrument.to_ascii_uppercase();
        let pair = pair.as_str();

        if let Some(overlap) = OVERLAPS
            .iter()
            .find(|o| o.window.contains(time) && o.pairs.contains(&pair))
        {
            return SessionStatus {
                priority: SessionPriority::Overlap,
                active_sessions: vec![overlap.name],
                is_overlap: true,
                timeframe: self.overlap_timeframe(),
                lot_multiplier: self.config.overlap_lot_multiplier,
                risk_multiplier: self.config.overlap_risk_multiplier,
                max_spread_pips: self.config.overlap_max_spread_pips,
            };
        }

        let active: Vec<&TradingSession> =
            SESSIONS.iter().filter(|s| s.window.contains(time)).collect();
        let names: Vec<&'static str> = active.iter().map(|s| s.name).collect();

        if active.iter().any(|s| s.primary.contains(&pair)) {
            return self.regular(SessionPriority::Primary, names);
        }
        if active
            .iter()
            .any(|s| s.secondary.contains(&pair) || s.cross.contains(&pair))
        {
            return self.regular(SessionPriority::Secondary, names);
        }
        self.regular(SessionPriority::Inactive, Vec::new())
    }

    /// Base risk scaled by the session multiplier and, while the account is
    /// in its evaluation period, by the evaluation factor.
    pub fn effective_risk_percent(
        &self,
        base_risk_percent: f64,
        status: &SessionStatus,
        evaluation_factor: Option<f64>,
    ) -> f64 {
        base_risk_percent * status.risk_multiplier * evaluation_factor.unwrap_or(1.0)
    }

    pub fn spread_allowed(&self, status: &SessionStatus, spread_pips: f64) -> bool {
        spread_pips <= status.max_spread_pips
    }
}
