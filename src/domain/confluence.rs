//! Confluence scoring: the AMA primary setup, three supporting filters voted
//! against a quorum, and structural bonus points.
//!
//! A directional signal needs the primary setup (AMA alignment, sufficient
//! gap, price beyond the fast AMA) plus at least `quorum` confirming filters.
//! The bonus score ranks signals but never creates one on its own.

use tracing::debug;

use crate::domain::config::{AmaConfig, EngineConfig, FilterConfig};
use crate::domain::signal::{Confidence, Direction, Signal};
use crate::domain::snapshot::IndicatorSnapshot;
use crate::domain::structure::breakout::BreakoutDirection;
use crate::domain::structure::pivot::LevelRole;
use crate::domain::timeframe::Timeframe;

/// Per-side bonus tally with the label of every contribution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreCard {
    pub buy: f64,
    pub sell: f64,
    pub buy_reasons: Vec<String>,
    pub sell_reasons: Vec<String>,
}

impl ScoreCard {
    fn add(&mut self, side: Direction, points: f64, reason: &str) {
        match side {
            Direction::Buy => {
                self.buy += points;
                self.buy_reasons.push(format!("{reason} +{points}"));
            }
            Direction::Sell => {
                self.sell += points;
                self.sell_reasons.push(format!("{reason} +{points}"));
            }
            Direction::Neutral => {}
        }
    }

    pub fn for_side(&self, side: Direction) -> f64 {
        match side {
            Direction::Buy => self.buy,
            Direction::Sell => self.sell,
            Direction::Neutral => 0.0,
        }
    }

    /// Side with the higher score, NEUTRAL on a tie.
    pub fn leader(&self) -> Direction {
        if self.buy > self.sell {
            Direction::Buy
        } else if self.sell > self.buy {
            Direction::Sell
        } else {
            Direction::Neutral
        }
    }
}

/// Filter votes; `None` means the filter is disabled and does not vote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterVotes {
    pub momentum: Option<bool>,
    pub trend: Option<bool>,
    pub volatility: Option<bool>,
}

impl FilterVotes {
    fn all(&self) -> [Option<bool>; 3] {
        [self.momentum, self.trend, self.volatility]
    }

    pub fn enabled(&self) -> usize {
        self.all().iter().filter(|v| v.is_some()).count()
    }

    pub fn confirmations(&self) -> usize {
        self.all().iter().filter(|v| **v == Some(true)).count()
    }
}

fn gap_sufficient(snapshot: &IndicatorSnapshot, ama: &AmaConfig) -> bool {
    snapshot
        .ama_gap_percent()
        .is_some_and(|gap| gap >= ama.min_gap_percent)
}

/// Direction the AMA pair supports right now, or NEUTRAL.
pub fn primary_setup(snapshot: &IndicatorSnapshot, ama: &AmaConfig) -> Direction {
    let (Some(fast), Some(slow)) = (snapshot.fast_ama, snapshot.slow_ama) else {
        return Direction::Neutral;
    };
    if !gap_sufficient(snapshot, ama) {
        return Direction::Neutral;
    }
    let price = snapshot.close;
    if fast > slow && price > fast {
        Direction::Buy
    } else if fast < slow && price < fast {
        Direction::Sell
    } else {
        Direction::Neutral
    }
}

/// Re-check of the primary setup against a live price right before an order.
pub fn conditions_hold(
    snapshot: &IndicatorSnapshot,
    ama: &AmaConfig,
    direction: Direction,
    live_price: f64,
) -> bool {
    let live = IndicatorSnapshot {
        close: live_price,
        ..snapshot.clone()
    };
    direction.is_directional() && primary_setup(&live, ama) == direction
}

/// Last `consecutive` histogram bars share a sign and each grows by at least
/// `factor` in magnitude over the bar before it.
fn macd_growing(histogram: &[Option<f64>], f: &FilterConfig, side: Direction) -> Option<bool> {
    let n = f.macd_consecutive_bars;
    if histogram.len() < n + 1 {
        return None;
    }
    let values: Option<Vec<f64>> = histogram[histogram.len() - n - 1..].iter().copied().collect();
    let values = values?;
    let sign = match side {
        Direction::Buy => 1.0,
        Direction::Sell => -1.0,
        Direction::Neutral => return Some(false),
    };
    let same_sign = values[1..].iter().all(|v| v * sign > 0.0);
    let growing = values
        .windows(2)
        .all(|w| w[1] * sign >= w[0] * sign * f.macd_growing_factor);
    Some(same_sign && growing)
}

fn macd_zero_cross(histogram: &[Option<f64>], f: &FilterConfig, side: Direction) -> bool {
    let n = f.macd_consecutive_bars;
    let Some(Some(first)) = histogram.len().checked_sub(n + 1).map(|i| histogram[i]) else {
        return false;
    };
    match side {
        Direction::Buy => first < 0.0,
        Direction::Sell => first > 0.0,
        Direction::Neutral => false,
    }
}

pub fn momentum_filter(snapshot: &IndicatorSnapshot, f: &FilterConfig, side: Direction) -> bool {
    let rsi_agrees = f.use_rsi
        && match (snapshot.rsi, snapshot.prev_rsi, side) {
            (Some(rsi), Some(prev), Direction::Buy) => rsi < f.rsi_overbought && rsi > prev,
            (Some(rsi), Some(prev), Direction::Sell) => rsi > f.rsi_oversold && rsi < prev,
            _ => false,
        };
    let roc_agrees = f.use_roc
        && match (snapshot.roc, side) {
            (Some(roc), Direction::Buy) => roc > f.roc_threshold,
            (Some(roc), Direction::Sell) => roc < -f.roc_threshold,
            _ => false,
        };
    let macd_agrees =
        f.use_macd && macd_growing(&snapshot.macd_histogram, f, side).unwrap_or(false);
    rsi_agrees || roc_agrees || macd_agrees
}

pub fn trend_filter(snapshot: &IndicatorSnapshot, f: &FilterConfig, side: Direction) -> bool {
    let Some(dmi) = snapshot.dmi else {
        return false;
    };
    if dmi.adx < f.adx_threshold {
        return false;
    }
    if !f.di_alignment {
        return side.is_directional();
    }
    match side {
        Direction::Buy => dmi.plus_di > dmi.minus_di,
        Direction::Sell => dmi.minus_di > dmi.plus_di,
        Direction::Neutral => false,
    }
}

pub fn volatility_filter(snapshot: &IndicatorSnapshot, f: &FilterConfig) -> bool {
    let volume_ok = snapshot
        .volume
        .as_ref()
        .is_some_and(|v| v.ratio >= f.min_volume_ratio);
    let expanding =
        |now: Option<f64>, prev: Option<f64>| matches!((now, prev), (Some(n), Some(p)) if n > p);
    volume_ok
        && (expanding(snapshot.bollinger_width, snapshot.prev_bollinger_width)
            || expanding(snapshot.keltner_width, snapshot.prev_keltner_width))
}

pub fn filter_votes(
    snapshot: &IndicatorSnapshot,
    f: &FilterConfig,
    side: Direction,
) -> FilterVotes {
    FilterVotes {
        momentum: f
            .momentum_enabled
            .then(|| momentum_filter(snapshot, f, side)),
        trend: f.trend_enabled.then(|| trend_filter(snapshot, f, side)),
        volatility: f.volatility_active().then(|| volatility_filter(snapshot, f)),
    }
}

fn score_ama(card: &mut ScoreCard, snapshot: &IndicatorSnapshot, ama: &AmaConfig) {
    let (Some(fast), Some(slow)) = (snapshot.fast_ama, snapshot.slow_ama) else {
        return;
    };
    if !gap_sufficient(snapshot, ama) {
        return;
    }
    let prev = snapshot.prev_fast_ama.zip(snapshot.prev_slow_ama);

    if fast > slow {
        card.add(Direction::Buy, 2.0, "ama bullish setup");
        if prev.is_some_and(|(pf, ps)| pf <= ps) {
            card.add(Direction::Buy, 1.0, "fresh ama cross up");
        }
        if snapshot.close > fast {
            card.add(Direction::Buy, 0.5, "price above fast ama");
        }
    } else if fast < slow {
        card.add(Direction::Sell, 2.0, "ama bearish setup");
        if prev.is_some_and(|(pf, ps)| pf >= ps) {
            card.add(Direction::Sell, 1.0, "fresh ama cross down");
        }
        if snapshot.close < fast {
            card.add(Direction::Sell, 0.5, "price below fast ama");
        }
    }
}

fn score_rsi(card: &mut ScoreCard, snapshot: &IndicatorSnapshot, f: &FilterConfig) {
    if !f.use_rsi {
        return;
    }
    let Some(rsi) = snapshot.rsi else {
        return;
    };
    let prev = snapshot.prev_rsi.unwrap_or(rsi);
    if rsi <= f.rsi_oversold {
        card.add(Direction::Buy, 1.0, "rsi oversold");
    } else if rsi >= f.rsi_overbought {
        card.add(Direction::Sell, 1.0, "rsi overbought");
    } else if rsi < 40.0 && rsi > prev {
        card.add(Direction::Buy, 0.5, "rsi turning up");
    } else if rsi > 60.0 && rsi < prev {
        card.add(Direction::Sell, 0.5, "rsi turning down");
    }
}

fn score_macd(card: &mut ScoreCard, snapshot: &IndicatorSnapshot, f: &FilterConfig) {
    if !f.use_macd {
        return;
    }
    for side in [Direction::Buy, Direction::Sell] {
        if macd_growing(&snapshot.macd_histogram, f, side) == Some(true) {
            card.add(side, 1.0, "macd histogram growing");
            if f.macd_zero_cross && macd_zero_cross(&snapshot.macd_histogram, f, side) {
                card.add(side, 0.5, "macd zero cross");
            }
        }
    }
}

fn score_structure(card: &mut ScoreCard, snapshot: &IndicatorSnapshot) {
    if let Some(b) = &snapshot.breakout {
        let side = match b.direction {
            BreakoutDirection::Up => Direction::Buy,
            BreakoutDirection::Down => Direction::Sell,
        };
        card.add(side, 2.0, "breakout");
        if b.volume_confirmed {
            card.add(side, 0.5, "breakout volume");
        }
        if b.retested {
            card.add(side, 0.5, "breakout retest");
        }
    }

    for m in &snapshot.harmonics {
        let side = if m.bullish {
            Direction::Buy
        } else {
            Direction::Sell
        };
        card.add(side, 1.5, &format!("{} harmonic", m.pattern));
    }

    if snapshot.dynamic_levels.support.is_some() {
        card.add(Direction::Buy, 1.0, "dynamic support");
    }
    if snapshot.dynamic_levels.resistance.is_some() {
        card.add(Direction::Sell, 1.0, "dynamic resistance");
    }

    if let Some(s) = snapshot.swing_structure {
        if s.is_uptrend() {
            card.add(Direction::Buy, 1.5, "higher high and higher low");
        } else if s.is_downtrend() {
            card.add(Direction::Sell, 1.5, "lower high and lower low");
        } else if s.higher_high || s.higher_low {
            card.add(Direction::Buy, 0.5, "single higher swing");
        } else if s.lower_high || s.lower_low {
            card.add(Direction::Sell, 0.5, "single lower swing");
        }
    }

    let candles = &snapshot.candles;
    if candles.hammer {
        card.add(Direction::Buy, 0.5, "hammer");
    }
    if candles.shooting_star {
        card.add(Direction::Sell, 0.5, "shooting star");
    }
    if candles.bullish_reversal() {
        card.add(Direction::Buy, 0.5, "bullish engulfing");
    }
    if candles.bearish_reversal() {
        card.add(Direction::Sell, 0.5, "bearish engulfing");
    }
    if candles.three_white_soldiers {
        card.add(Direction::Buy, 0.5, "three white soldiers");
    }
    if candles.three_black_crows {
        card.add(Direction::Sell, 0.5, "three black crows");
    }
    if snapshot.touches.support {
        card.add(Direction::Buy, 0.5, "at support");
    }
    if snapshot.touches.resistance {
        card.add(Direction::Sell, 0.5, "at resistance");
    }

    if let Some(level) = &snapshot.pivot {
        match level.role {
            LevelRole::Support => card.add(Direction::Buy, 0.5, "pivot support"),
            LevelRole::Resistance => card.add(Direction::Sell, 0.5, "pivot resistance"),
            LevelRole::Pivot => {}
        }
    }
}

/// Full bonus score for both sides.
pub fn score(snapshot: &IndicatorSnapshot, config: &EngineConfig) -> ScoreCard {
    let mut card = ScoreCard::default();
    score_ama(&mut card, snapshot, &config.ama);
    score_rsi(&mut card, snapshot, &config.filters);
    score_macd(&mut card, snapshot, &config.filters);
    score_structure(&mut card, snapshot);
    card
}

/// Quorum-based confluence signal for one timeframe.
pub fn evaluate(
    snapshot: &IndicatorSnapshot,
    config: &EngineConfig,
    timeframe: Timeframe,
) -> Signal {
    let card = score(snapshot, config);
    let primary = primary_setup(snapshot, &config.ama);

    if primary == Direction::Neutral {
        let mut signal = Signal::neutral(timeframe);
        signal.score = card.for_side(card.leader());
        signal.reasons.push("primary setup not met".to_string());
        debug!(%timeframe, gap = ?snapshot.ama_gap_percent(), "no primary setup");
        return signal;
    }

    let votes = filter_votes(snapshot, &config.filters, primary);
    let quorum = config.filters.effective_quorum();
    let confirmations = votes.confirmations();
    let enabled = votes.enabled();

    let mut reasons = match primary {
        Direction::Buy => card.buy_reasons.clone(),
        _ => card.sell_reasons.clone(),
    };

    let (direction, confidence) = if confirmations < quorum {
        reasons.push(format!("filters {confirmations}/{quorum} below quorum"));
        (Direction::Neutral, Confidence::Low)
    } else if enabled > 0 && confirmations == enabled {
        (primary, Confidence::High)
    } else {
        (primary, Confidence::Medium)
    };

    debug!(
        %timeframe,
        %primary,
        momentum = ?votes.momentum,
        trend = ?votes.trend,
        volatility = ?votes.volatility,
        quorum,
        buy = card.buy,
        sell = card.sell,
        "confluence"
    );

    Signal {
        direction,
        score: card.for_side(primary),
        confirmations,
        confidence,
        timeframe,
        reasons,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::snapshot::Dmi;
    use crate::domain::structure::swing::SwingStructure;
    use crate::domain::structure::volume::VolumeProfile;

    fn volume(ratio: f64) -> VolumeProfile {
        VolumeProfile {
            current_volume: ratio * 100.0,
            average_volume: 100.0,
            ratio,
            increasing: true,
            above_average: ratio > 1.0,
            wide_spread: false,
        }
    }

    /// Bullish snapshot: fast AMA 0.08% above slow, price above both,
    /// RSI 45 rising, ADX 25 with +DI leading, expanding bands on volume.
    pub(crate) fn bullish() -> IndicatorSnapshot {
        IndicatorSnapshot {
            close: 1.1020,
            prev_close: Some(1.1010),
            fast_ama: Some(1.10088),
            slow_ama: Some(1.1000),
            prev_fast_ama: Some(1.0999),
            prev_slow_ama: Some(1.1000),
            rsi: Some(45.0),
            prev_rsi: Some(42.0),
            roc: Some(0.2),
            dmi: Some(Dmi {
                adx: 25.0,
                plus_di: 28.0,
                minus_di: 14.0,
            }),
            bollinger_width: Some(1.2),
            prev_bollinger_width: Some(1.1),
            volume: Some(volume(1.5)),
            ..IndicatorSnapshot::default()
        }
    }

    #[test]
    fn primary_setup_requires_gap_and_price() {
        let ama = AmaConfig::default();
        assert_eq!(primary_setup(&bullish(), &ama), Direction::Buy);

        let narrow = IndicatorSnapshot {
            fast_ama: Some(1.10030),
            ..bullish()
        };
        assert_eq!(primary_setup(&narrow, &ama), Direction::Neutral);

        let below = IndicatorSnapshot {
            close: 1.1005,
            ..bullish()
        };
        assert_eq!(primary_setup(&below, &ama), Direction::Neutral);
    }

    #[test]
    fn bearish_mirror() {
        let snap = IndicatorSnapshot {
            close: 1.0980,
            fast_ama: Some(1.0990),
            slow_ama: Some(1.1000),
            ..IndicatorSnapshot::default()
        };
        assert_eq!(primary_setup(&snap, &AmaConfig::default()), Direction::Sell);
    }

    #[test]
    fn all_filters_confirm_gives_high() {
        let signal = evaluate(&bullish(), &EngineConfig::default(), Timeframe::M5);
        assert_eq!(signal.direction, Direction::Buy);
        assert_eq!(signal.confidence, Confidence::High);
        assert_eq!(signal.confirmations, 3);
        // setup 2 + fresh cross 1 + price above fast 0.5
        assert!((signal.score - 3.5).abs() < 1e-9);
    }

    #[test]
    fn quorum_met_gives_medium() {
        let snap = IndicatorSnapshot {
            volume: Some(volume(0.8)),
            ..bullish()
        };
        let signal = evaluate(&snap, &EngineConfig::default(), Timeframe::M5);
        assert_eq!(signal.direction, Direction::Buy);
        assert_eq!(signal.confidence, Confidence::Medium);
        assert_eq!(signal.confirmations, 2);
    }

    #[test]
    fn below_quorum_is_neutral() {
        let snap = IndicatorSnapshot {
            volume: Some(volume(0.8)),
            dmi: Some(Dmi {
                adx: 12.0,
                plus_di: 20.0,
                minus_di: 18.0,
            }),
            ..bullish()
        };
        let signal = evaluate(&snap, &EngineConfig::default(), Timeframe::M5);
        assert_eq!(signal.direction, Direction::Neutral);
        assert_eq!(signal.confidence, Confidence::Low);
    }

    #[test]
    fn disabled_filters_do_not_vote() {
        let mut cfg = EngineConfig::default();
        cfg.filters.trend_enabled = false;
        cfg.filters.volatility_enabled = false;
        let snap = IndicatorSnapshot {
            dmi: None,
            volume: None,
            ..bullish()
        };
        let signal = evaluate(&snap, &cfg, Timeframe::M5);
        // quorum 2 clamped to the single enabled filter
        assert_eq!(signal.direction, Direction::Buy);
        assert_eq!(signal.confidence, Confidence::High);
    }

    #[test]
    fn volatility_needs_momentum_enabled() {
        let mut f = FilterConfig::default();
        f.momentum_enabled = false;
        let votes = filter_votes(&bullish(), &f, Direction::Buy);
        assert_eq!(votes.momentum, None);
        assert_eq!(votes.volatility, None);
        assert_eq!(votes.trend, Some(true));
    }

    #[test]
    fn trend_filter_checks_di_alignment() {
        let f = FilterConfig::default();
        assert!(trend_filter(&bullish(), &f, Direction::Buy));
        assert!(!trend_filter(&bullish(), &f, Direction::Sell));
        let loose = FilterConfig {
            di_alignment: false,
            ..FilterConfig::default()
        };
        assert!(trend_filter(&bullish(), &loose, Direction::Sell));
    }

    #[test]
    fn macd_growth_and_zero_cross() {
        let f = FilterConfig::default();
        let snap = IndicatorSnapshot {
            macd_histogram: vec![Some(-0.0001), Some(0.0002), Some(0.00022), Some(0.00025)],
            ..IndicatorSnapshot::default()
        };
        assert_eq!(macd_growing(&snap.macd_histogram, &f, Direction::Buy), Some(true));
        assert!(macd_zero_cross(&snap.macd_histogram, &f, Direction::Buy));
        let card = score(&snap, &EngineConfig::default());
        assert!((card.buy - 1.5).abs() < 1e-12);

        let stalling = vec![Some(0.0001), Some(0.0002), Some(0.0002), Some(0.00025)];
        assert_eq!(macd_growing(&stalling, &f, Direction::Buy), Some(false));

        let falling = vec![Some(-0.0001), Some(-0.0002), Some(-0.00022), Some(-0.00025)];
        assert_eq!(macd_growing(&falling, &f, Direction::Sell), Some(true));
        assert!(!macd_zero_cross(&falling, &f, Direction::Sell));
    }

    #[test]
    fn macd_undefined_does_not_vote() {
        let f = FilterConfig::default();
        let hist = vec![None, Some(0.1), Some(0.2), Some(0.3)];
        assert_eq!(macd_growing(&hist, &f, Direction::Buy), None);
    }

    #[test]
    fn rsi_scoring_bands() {
        let card = |rsi: f64, prev: f64| {
            let snap = IndicatorSnapshot {
                rsi: Some(rsi),
                prev_rsi: Some(prev),
                ..IndicatorSnapshot::default()
            };
            score(&snap, &EngineConfig::default())
        };
        assert!((card(25.0, 28.0).buy - 1.0).abs() < 1e-12);
        assert!((card(75.0, 70.0).sell - 1.0).abs() < 1e-12);
        assert!((card(35.0, 33.0).buy - 0.5).abs() < 1e-12);
        assert!((card(65.0, 68.0).sell - 0.5).abs() < 1e-12);
        assert_eq!(card(50.0, 45.0), ScoreCard::default());
    }

    #[test]
    fn swing_structure_bonus() {
        let snap = IndicatorSnapshot {
            swing_structure: Some(SwingStructure {
                higher_high: true,
                higher_low: true,
                lower_high: false,
                lower_low: false,
            }),
            ..IndicatorSnapshot::default()
        };
        let card = score(&snap, &EngineConfig::default());
        assert!((card.buy - 1.5).abs() < 1e-12);
        assert_eq!(card.leader(), Direction::Buy);
    }

    #[test]
    fn live_price_revalidation() {
        let ama = AmaConfig::default();
        let snap = bullish();
        assert!(conditions_hold(&snap, &ama, Direction::Buy, 1.1015));
        // price fell back below the fast AMA
        assert!(!conditions_hold(&snap, &ama, Direction::Buy, 1.1005));
        assert!(!conditions_hold(&snap, &ama, Direction::Neutral, 1.1015));
    }
}
