//! Position sizing and stop/target distances.
//!
//! Lots = balance * risk% / (stop pips * pip value), clamped to the lot band
//! and rounded to the lot step. Stops come from the recent high-low range,
//! tightened to sit just beyond the latest swing extreme.

use tracing::{debug, warn};

use crate::domain::config::RiskConfig;
use crate::domain::instrument::{SymbolInfo, is_jpy, price_to_pips};
use crate::domain::ohlcv::Bar;
use crate::domain::signal::Direction;
use crate::domain::snapshot::IndicatorSnapshot;

/// Pip value per lot used when symbol metadata is unusable.
pub const FALLBACK_PIP_VALUE: f64 = 10.0;
/// Bars required before the range-based stop is trusted.
pub const MIN_STOP_BARS: usize = 15;

const STRONG_VOLUME_RATIO: f64 = 2.0;

/// Account-currency value of one pip for one lot.
pub fn pip_value(instrument: &str, info: Option<&SymbolInfo>) -> f64 {
    let Some(info) = info else {
        warn!(instrument, "symbol info unavailable, using fallback pip value");
        return FALLBACK_PIP_VALUE;
    };
    let value = info.point * 10.0 * info.contract_size;
    let value = if is_jpy(instrument) { value / 100.0 } else { value };
    if value.is_finite() && value > 0.0 {
        value
    } else {
        warn!(instrument, value, "invalid pip value, using fallback");
        FALLBACK_PIP_VALUE
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PositionSize {
    pub lots: f64,
    pub sl_pips: f64,
    pub tp_pips: f64,
    pub pip_value: f64,
    /// Combined session, volume and VWMA multiplier applied to the base size.
    pub multiplier: f64,
    /// True when a fallback (minimum lot or default stop) was used.
    pub fallback: bool,
}

/// Inputs gathered by the engine for one sizing decision.
#[derive(Debug, Clone)]
pub struct SizingRequest<'a> {
    pub instrument: &'a str,
    pub direction: Direction,
    pub balance: f64,
    pub risk_percent: f64,
    pub bars: &'a [Bar],
    pub symbol: Option<&'a SymbolInfo>,
    pub snapshot: &'a IndicatorSnapshot,
    pub session_lot_multiplier: f64,
    /// Notional value of positions already open on the account.
    pub open_exposure: f64,
}

#[derive(Debug, Clone)]
pub struct RiskSizer {
    config: RiskConfig,
}

impl RiskSizer {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Snap to the lot step and clamp to the lot band.
    pub fn round_lot(&self, lots: f64) -> f64 {
        let c = &self.config;
        let clamped = lots.clamp(c.min_lot, c.max_lot);
        let stepped = (clamped / c.lot_step).round() * c.lot_step;
        // two decimals is the venue's lot precision
        ((stepped * 100.0).round() / 100.0).clamp(c.min_lot, c.max_lot)
    }

    pub fn lot_size(&self, balance: f64, risk_percent: f64, sl_pips: f64, pip_value: f64) -> f64 {
        let denominator = sl_pips * pip_value;
        if !(denominator > 0.0) || !balance.is_finite() || balance <= 0.0 {
            warn!(balance, sl_pips, pip_value, "lot calculation impossible, using minimum lot");
            return self.config.min_lot;
        }
        let risk_amount = balance * risk_percent / 100.0;
        self.round_lot(risk_amount / denominator)
    }

    /// Stop distance in pips, or the default when the window is too short.
    pub fn stop_loss_pips(&self, instrument: &str, bars: &[Bar], direction: Direction) -> f64 {
        let c = &self.config;
        if bars.len() < MIN_STOP_BARS {
            debug!(instrument, bars = bars.len(), "short window, default stop");
            return c.default_sl_pips;
        }

        let recent = &bars[bars.len() - c.atr_period.min(bars.len())..];
        let high = recent.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
        let low = recent.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
        let range_sl = (price_to_pips(instrument, high - low) * c.sl_atr_factor).round();

        let swing = &bars[bars.len() - c.swing_lookback.min(bars.len())..];
        let close = bars[bars.len() - 1].close;
        let swing_distance = match direction {
            Direction::Sell => {
                let swing_high = swing.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
                price_to_pips(instrument, swing_high - close)
            }
            _ => {
                let swing_low = swing.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
                price_to_pips(instrument, close - swing_low)
            }
        };

        c.min_sl_pips.max(c.max_sl_pips.min(swing_distance).min(range_sl))
    }

    pub fn take_profit_pips(&self, sl_pips: f64) -> f64 {
        (sl_pips * self.config.tp_multiplier).round()
    }

    /// Volume and VWMA confirmation multiplier for the base size.
    pub fn confirmation_multiplier(snapshot: &IndicatorSnapshot, direction: Direction) -> f64 {
        let obv_confirms = match (snapshot.obv, snapshot.obv_average, direction) {
            (Some(obv), Some(avg), Direction::Buy) => obv > avg,
            (Some(obv), Some(avg), Direction::Sell) => obv < avg,
            _ => false,
        };
        let volume = match (&snapshot.volume, obv_confirms) {
            (Some(v), true) if v.ratio > STRONG_VOLUME_RATIO => 1.2,
            (Some(_), true) => 1.0,
            _ => 0.8,
        };
        let vwma_aligned = match (snapshot.vwma, direction) {
            (Some(vwma), Direction::Buy) => snapshot.close > vwma,
            (Some(vwma), Direction::Sell) => snapshot.close < vwma,
            _ => false,
        };
        volume * if vwma_aligned { 1.1 } else { 0.9 }
    }

    /// Shrinks `lots` so total notional stays under the leverage ceiling.
    /// `None` when not even the minimum lot fits.
    pub fn apply_leverage_ceiling(
        &self,
        lots: f64,
        contract_size: f64,
        price: f64,
        balance: f64,
        open_exposure: f64,
    ) -> Option<f64> {
        let c = &self.config;
        let unit = contract_size * price;
        if !(unit > 0.0) || !(balance > 0.0) {
            return Some(lots);
        }
        let leverage = (lots * unit + open_exposure) / balance;
        if leverage <= c.max_leverage {
            return Some(lots);
        }
        let headroom = c.max_leverage * balance - open_exposure;
        let allowed = ((headroom / unit) / c.lot_step).floor() * c.lot_step;
        let allowed = (allowed * 100.0).floor() / 100.0;
        warn!(lots, leverage, max = c.max_leverage, allowed, "leverage ceiling reached");
        (allowed >= c.min_lot).then_some(allowed)
    }

    /// Full sizing pass. `None` only when the leverage ceiling leaves no room.
    pub fn size(&self, req: &SizingRequest<'_>) -> Option<PositionSize> {
        let pip_value = pip_value(req.instrument, req.symbol);
        let fallback_stop = req.bars.len() < MIN_STOP_BARS;
        let sl_pips = self.stop_loss_pips(req.instrument, req.bars, req.direction);
        let tp_pips = self.take_profit_pips(sl_pips);

        let base = self.lot_size(req.balance, req.risk_percent, sl_pips, pip_value);
        let multiplier = req.session_lot_multiplier
            * Self::confirmation_multiplier(req.snapshot, req.direction);
        let lots = self.round_lot(base * multiplier);

        let contract_size = req.symbol.map_or(100_000.0, |s| s.contract_size);
        let lots = self.apply_leverage_ceiling(
            lots,
            contract_size,
            req.snapshot.close,
            req.balance,
            req.open_exposure,
        )?;

        debug!(
            instrument = req.instrument,
            direction = %req.direction,
            base,
            multiplier,
            lots,
            sl_pips,
            tp_pips,
            "position sized"
        );

        Some(PositionSize {
            lots,
            sl_pips,
            tp_pips,
            pip_value,
            multiplier,
            fallback: fallback_stop || !(req.balance > 0.0),
        })
    }
}
