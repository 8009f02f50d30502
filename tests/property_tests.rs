//! Property tests for engine invariants.
//!
//! Uses proptest to verify:
//! 1. An AMA gap below the minimum never yields a directional signal
//! 2. A trend conflict always overrides the confluence direction
//! 3. Lot sizes stay inside the lot band and match the risk identity
//! 4. The AMA never leaves the range of the closes it smooths
//! 5. Trailing stops only ever tighten

mod common;

use amatrader::domain::config::{AmaConfig, EngineConfig, ExitConfig, RiskConfig};
use amatrader::domain::confluence;
use amatrader::domain::exits::{ExitManager, PositionTrack};
use amatrader::domain::indicator::ama::calculate_ama;
use amatrader::domain::risk::RiskSizer;
use amatrader::domain::signal::{Confidence, Direction, Signal};
use amatrader::domain::snapshot::IndicatorSnapshot;
use amatrader::domain::structure::momentum::Momentum;
use amatrader::domain::timeframe::Timeframe;
use amatrader::domain::trend_conflict;
use common::*;
use proptest::prelude::*;

fn arb_price() -> impl Strategy<Value = f64> {
    (0.5..2.0_f64).prop_map(|p| (p * 100_000.0).round() / 100_000.0)
}

fn arb_direction() -> impl Strategy<Value = Direction> {
    prop_oneof![
        Just(Direction::Buy),
        Just(Direction::Sell),
        Just(Direction::Neutral),
    ]
}

// ── 1. Gap threshold ─────────────────────────────────────────────────

proptest! {
    #[test]
    fn narrow_gap_is_always_neutral(
        slow in arb_price(),
        gap_fraction in 0.0..0.99_f64,
        bullish in any::<bool>(),
    ) {
        let min_gap = AmaConfig::default().min_gap_percent;
        let offset = slow * min_gap / 100.0 * gap_fraction;
        let (fast, close) = if bullish {
            (slow + offset, slow + 2.0 * offset + 0.001)
        } else {
            (slow - offset, slow - 2.0 * offset - 0.001)
        };
        let snap = IndicatorSnapshot {
            close,
            fast_ama: Some(fast),
            slow_ama: Some(slow),
            ..bullish_snapshot()
        };
        let signal = confluence::evaluate(&snap, &EngineConfig::default(), Timeframe::M5);
        prop_assert_eq!(signal.direction, Direction::Neutral);
    }
}

// ── 2. Conflict override ─────────────────────────────────────────────

proptest! {
    #[test]
    fn conflict_forces_neutral(
        direction in arb_direction(),
        strength in 0.0..1.0_f64,
        score in 0.0..20.0_f64,
    ) {
        let snap = IndicatorSnapshot {
            momentum: Some(momentum(Momentum::Bearish, strength)),
            ..bullish_snapshot()
        };
        let assessment = trend_conflict::assess(&snap);
        prop_assert!(assessment.conflict);

        let signal = Signal {
            direction,
            score,
            confirmations: 3,
            confidence: Confidence::High,
            timeframe: Timeframe::M5,
            reasons: Vec::new(),
        };
        let resolved = trend_conflict::resolve(signal, &assessment);
        prop_assert_eq!(resolved.direction, Direction::Neutral);
        prop_assert!(resolved.confidence <= Confidence::Medium);
    }
}

// ── 3. Sizing ────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn lots_stay_in_band(
        balance in 0.0..1_000_000.0_f64,
        risk in 0.1..5.0_f64,
        sl_pips in 0.0..200.0_f64,
        pip_value in 0.0..20.0_f64,
    ) {
        let config = RiskConfig::default();
        let sizer = RiskSizer::new(config.clone());
        let lots = sizer.lot_size(balance, risk, sl_pips, pip_value);
        prop_assert!(lots >= config.min_lot && lots <= config.max_lot);
    }

    #[test]
    fn unclamped_lots_match_risk_amount(
        balance in 1_000.0..100_000.0_f64,
        risk in 0.5..2.0_f64,
        sl_pips in 10.0..100.0_f64,
    ) {
        let config = RiskConfig::default();
        let sizer = RiskSizer::new(config.clone());
        let pip_value = 10.0;
        let raw = balance * risk / 100.0 / (sl_pips * pip_value);
        prop_assume!(raw >= config.min_lot && raw <= config.max_lot);

        let lots = sizer.lot_size(balance, risk, sl_pips, pip_value);
        prop_assert!((lots - raw).abs() <= config.lot_step / 2.0 + 1e-9);
    }
}

// ── 4. AMA bounds ────────────────────────────────────────────────────

proptest! {
    #[test]
    fn ama_stays_within_closes(
        closes in prop::collection::vec(arb_price(), 12..80),
        period in 2usize..10,
    ) {
        let bars: Vec<Bar> = closes
            .iter()
            .enumerate()
            .map(|(i, c)| make_bar(at(0, 0) + chrono::Duration::minutes(i as i64), *c))
            .collect();
        let lo = closes.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = closes.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let series = calculate_ama(&bars, period, 2, 30);
        for value in series.simple_values().into_iter().flatten() {
            prop_assert!(value >= lo - 1e-12 && value <= hi + 1e-12);
        }
    }
}

// ── 5. Trailing ratchet ──────────────────────────────────────────────

proptest! {
    #[test]
    fn trailing_stop_only_tightens(moves in prop::collection::vec(-0.0030..0.0030_f64, 1..40)) {
        let manager = ExitManager::new(ExitConfig::default());
        let mut position = long_position(1, 1.1000, 1.0980, 0.0);
        let mut track = PositionTrack {
            best_price: position.entry_price,
            trailing_active: false,
        };
        let mut price = position.entry_price;
        for step in moves {
            price += step;
            let before = position.stop_price;
            if let Some(stop) = manager.trailing_stop(&position, &mut track, price) {
                prop_assert!(stop > before);
                position.stop_price = stop;
            }
        }
    }
}
