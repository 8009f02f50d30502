//! Weighted multi-timeframe agreement.
//!
//! Each timeframe of the analysis hierarchy is scored independently; its
//! direction is whichever side has the larger bonus score. The primary signal
//! stays tradable only if the summed weight of timeframes agreeing with it
//! exceeds the agreement threshold.

use tracing::debug;

use crate::domain::config::EngineConfig;
use crate::domain::confluence::score;
use crate::domain::signal::Direction;
use crate::domain::snapshot::IndicatorSnapshot;
use crate::domain::timeframe::Timeframe;

#[derive(Debug, Clone, PartialEq)]
pub struct TimeframeVote {
    pub timeframe: Timeframe,
    pub weight: f64,
    pub buy_score: f64,
    pub sell_score: f64,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MtfAgreement {
    pub votes: Vec<TimeframeVote>,
    /// Sum of weights of timeframes agreeing with the primary direction.
    pub agreement: f64,
    pub tradable: bool,
}

/// Scores every timeframe in `primary`'s hierarchy that has a snapshot.
/// Missing timeframes vote NEUTRAL and add no agreement.
pub fn assess<'a, F>(
    primary: Timeframe,
    direction: Direction,
    config: &EngineConfig,
    mut snapshot_for: F,
) -> MtfAgreement
where
    F: FnMut(Timeframe) -> Option<&'a IndicatorSnapshot>,
{
    let votes: Vec<TimeframeVote> = primary
        .mtf_weights()
        .into_iter()
        .map(|(timeframe, weight)| {
            let card = snapshot_for(timeframe)
                .map(|snap| score(snap, config))
                .unwrap_or_default();
            TimeframeVote {
                timeframe,
                weight,
                buy_score: card.buy,
                sell_score: card.sell,
                direction: card.leader(),
            }
        })
        .collect();

    let agreement: f64 = if direction.is_directional() {
        votes
            .iter()
            .filter(|v| v.direction == direction)
            .map(|v| v.weight)
            .sum()
    } else {
        0.0
    };
    let tradable = agreement > config.mtf.agreement_threshold;

    debug!(
        %primary,
        %direction,
        agreement,
        threshold = config.mtf.agreement_threshold,
        tradable,
        "multi-timeframe agreement"
    );

    MtfAgreement {
        votes,
        agreement,
        tradable,
    }
}
