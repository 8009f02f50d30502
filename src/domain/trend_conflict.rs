//! Long-term trend versus short-term momentum.
//!
//! The AMA pair gives the long-term trend; the last few candles give the
//! momentum. When they disagree (or price has slipped back through the fast
//! AMA) the confluence signal is forced to NEUTRAL whatever its score.

use std::fmt;

use tracing::info;

use crate::domain::signal::{Confidence, Signal};
use crate::domain::snapshot::IndicatorSnapshot;
use crate::domain::structure::momentum::Momentum;

pub const MIN_BARS: usize = 10;
const STRONG_MOMENTUM: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Bullish,
    Bearish,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Trend::Bullish => "BULLISH",
            Trend::Bearish => "BEARISH",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recommendation {
    Buy,
    Sell,
    CautiousBuy,
    CautiousSell,
    WaitForPullbackEnd,
    WaitForBounceEnd,
    InsufficientData,
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Recommendation::Buy => "BUY",
            Recommendation::Sell => "SELL",
            Recommendation::CautiousBuy => "CAUTIOUS_BUY",
            Recommendation::CautiousSell => "CAUTIOUS_SELL",
            Recommendation::WaitForPullbackEnd => "WAIT_FOR_PULLBACK_END",
            Recommendation::WaitForBounceEnd => "WAIT_FOR_BOUNCE_END",
            Recommendation::InsufficientData => "INSUFFICIENT_DATA",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrendAssessment {
    pub long_term_trend: Option<Trend>,
    pub short_term_momentum: Option<Momentum>,
    pub momentum_strength: f64,
    pub conflict: bool,
    pub recommendation: Recommendation,
    pub confidence: Confidence,
    pub price_above_fast: bool,
    pub price_above_slow: bool,
}

impl TrendAssessment {
    fn insufficient() -> Self {
        Self {
            long_term_trend: None,
            short_term_momentum: None,
            momentum_strength: 0.0,
            conflict: false,
            recommendation: Recommendation::InsufficientData,
            confidence: Confidence::Low,
            price_above_fast: false,
            price_above_slow: false,
        }
    }
}

pub fn assess(snapshot: &IndicatorSnapshot) -> TrendAssessment {
    if snapshot.bar_count < MIN_BARS {
        return TrendAssessment::insufficient();
    }
    let (Some(fast), Some(slow), Some(momentum)) =
        (snapshot.fast_ama, snapshot.slow_ama, snapshot.momentum.as_ref())
    else {
        return TrendAssessment::insufficient();
    };

    let trend = if fast > slow {
        Trend::Bullish
    } else {
        Trend::Bearish
    };
    let above_fast = snapshot.close > fast;
    let above_slow = snapshot.close > slow;
    let strength_tier = if momentum.strength > STRONG_MOMENTUM {
        Confidence::High
    } else {
        Confidence::Medium
    };

    let (conflict, recommendation, confidence) = match trend {
        Trend::Bullish => {
            if momentum.direction == Momentum::Bearish || !above_fast {
                (true, Recommendation::WaitForPullbackEnd, strength_tier)
            } else if above_slow && momentum.direction == Momentum::Bullish {
                (false, Recommendation::Buy, Confidence::High)
            } else {
                (false, Recommendation::CautiousBuy, Confidence::Medium)
            }
        }
        Trend::Bearish => {
            if momentum.direction == Momentum::Bullish || above_fast {
                (true, Recommendation::WaitForBounceEnd, strength_tier)
            } else if !above_slow && momentum.direction == Momentum::Bearish {
                (false, Recommendation::Sell, Confidence::High)
            } else {
                (false, Recommendation::CautiousSell, Confidence::Medium)
            }
        }
    };

    TrendAssessment {
        long_term_trend: Some(trend),
        short_term_momentum: Some(momentum.direction),
        momentum_strength: momentum.strength,
        conflict,
        recommendation,
        confidence,
        price_above_fast: above_fast,
        price_above_slow: above_slow,
    }
}

/// Applies the assessment to a confluence signal. A conflict always forces
/// NEUTRAL; otherwise confidence is capped by the assessment's tier.
pub fn resolve(mut signal: Signal, assessment: &TrendAssessment) -> Signal {
    if assessment.recommendation == Recommendation::InsufficientData {
        return signal;
    }
    if assessment.conflict {
        if signal.direction.is_directional() {
            info!(
                direction = %signal.direction,
                recommendation = %assessment.recommendation,
                strength = assessment.momentum_strength,
                "trend conflict, signal overridden"
            );
        }
        signal.downgrade(assessment.recommendation.to_string());
        return signal;
    }
    if signal.direction.is_directional() {
        signal.confidence = signal.confidence.min(assessment.confidence);
    }
    signal
}
