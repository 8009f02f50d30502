//! Directional trading signal produced once per evaluation cycle.

use std::fmt;

use crate::domain::timeframe::Timeframe;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Buy,
    Sell,
    Neutral,
}

impl Direction {
    pub fn opposite(self) -> Direction {
        match self {
            Direction::Buy => Direction::Sell,
            Direction::Sell => Direction::Buy,
            Direction::Neutral => Direction::Neutral,
        }
    }

    pub fn is_directional(self) -> bool {
        self != Direction::Neutral
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Direction::Buy => "BUY",
            Direction::Sell => "SELL",
            Direction::Neutral => "NEUTRAL",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Confidence::Low => "LOW",
            Confidence::Medium => "MEDIUM",
            Confidence::High => "HIGH",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub direction: Direction,
    pub score: f64,
    /// Supporting filters (momentum, trend, volatility) that confirmed.
    pub confirmations: usize,
    pub confidence: Confidence,
    pub timeframe: Timeframe,
    /// Short labels of everything that contributed to the score.
    pub reasons: Vec<String>,
}

impl Signal {
    pub fn neutral(timeframe: Timeframe) -> Self {
        Self {
            direction: Direction::Neutral,
            score: 0.0,
            confirmations: 0,
            confidence: Confidence::Low,
            timeframe,
            reasons: Vec::new(),
        }
    }

    /// Drop to NEUTRAL, keeping the score for diagnostics. Confidence is
    /// capped at MEDIUM.
    pub fn downgrade(&mut self, reason: impl Into<String>) {
        self.direction = Direction::Neutral;
        self.confidence = self.confidence.min(Confidence::Medium);
        self.reasons.push(reason.into());
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} score={:.1} filters={} confidence={}",
            self.timeframe, self.direction, self.score, self.confirmations, self.confidence
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opposite_directions() {
        assert_eq!(Direction::Buy.opposite(), Direction::Sell);
        assert_eq!(Direction::Neutral.opposite(), Direction::Neutral);
        assert!(!Direction::Neutral.is_directional());
    }

    #[test]
    fn downgrade_caps_confidence() {
        let mut signal = Signal {
            direction: Direction::Buy,
            score: 5.5,
            confirmations: 3,
            confidence: Confidence::High,
            timeframe: Timeframe::M5,
            reasons: vec![],
        };
        signal.downgrade("trend conflict");
        assert_eq!(signal.direction, Direction::Neutral);
        assert_eq!(signal.confidence, Confidence::Medium);
        assert!((signal.score - 5.5).abs() < f64::EPSILON);
        assert_eq!(signal.reasons, vec!["trend conflict".to_string()]);
    }

    #[test]
    fn display_summary() {
        let s = Signal::neutral(Timeframe::H1);
        assert_eq!(s.to_string(), "H1 NEUTRAL score=0.0 filters=0 confidence=LOW");
    }
}
