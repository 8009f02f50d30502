//! Trailing stops and ATR-based take profits for open positions.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::domain::config::ExitConfig;
use crate::domain::instrument::pips_to_price;
use crate::domain::position::{Position, Quote, TradeSide};

/// Per-position memory between exit reviews.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionTrack {
    /// Most favourable exit price seen since the position was first reviewed.
    pub best_price: f64,
    pub trailing_active: bool,
}

/// Tracks keyed by instrument, then position id.
#[derive(Debug, Clone, Default)]
pub struct ExitTracker {
    tracks: HashMap<String, HashMap<u64, PositionTrack>>,
}

impl ExitTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, instrument: &str, position_id: u64) -> Option<&PositionTrack> {
        self.tracks.get(instrument)?.get(&position_id)
    }

    pub fn tracked(&self, instrument: &str) -> usize {
        self.tracks.get(instrument).map_or(0, HashMap::len)
    }

    /// Drops tracks for positions that are no longer open.
    pub fn sync(&mut self, instrument: &str, open: &[Position]) {
        if open.is_empty() {
            if self.tracks.remove(instrument).is_some() {
                debug!(instrument, "cleared exit tracking");
            }
            return;
        }
        if let Some(by_id) = self.tracks.get_mut(instrument) {
            by_id.retain(|id, _| open.iter().any(|p| p.id == *id));
        }
    }

    fn track_mut(&mut self, position: &Position, price: f64) -> &mut PositionTrack {
        self.tracks
            .entry(position.instrument.clone())
            .or_default()
            .entry(position.id)
            .or_insert(PositionTrack {
                best_price: price,
                trailing_active: false,
            })
    }
}

/// New stop and target for one position. Fields left as they were repeat
/// the position's current values.
#[derive(Debug, Clone, PartialEq)]
pub struct ExitAdjustment {
    pub position_id: u64,
    pub stop_price: f64,
    pub target_price: f64,
    pub trailed: bool,
    pub extended_target: bool,
}

#[derive(Debug, Clone)]
pub struct ExitManager {
    config: ExitConfig,
}

impl ExitManager {
    pub fn new(config: ExitConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExitConfig {
        &self.config
    }

    /// Stop trailing the best price by the configured distance, once profit
    /// has reached the activation level. `None` unless it tightens the stop.
    pub fn trailing_stop(
        &self,
        position: &Position,
        track: &mut PositionTrack,
        price: f64,
    ) -> Option<f64> {
        track.best_price = match position.side {
            TradeSide::Buy => track.best_price.max(price),
            TradeSide::Sell => track.best_price.min(price),
        };
        if !track.trailing_active
            && position.profit_pips(price) >= self.config.trailing_activation_pips
        {
            track.trailing_active = true;
            info!(
                instrument = %position.instrument,
                position = position.id,
                "trailing stop activated"
            );
        }
        if !track.trailing_active {
            return None;
        }
        let distance = pips_to_price(&position.instrument, self.config.trailing_distance_pips);
        let stop = track.best_price - distance * position.side.sign();
        position.improves_stop(stop).then_some(stop)
    }

    /// Entry price plus `atr * multiplier` in the trade direction, when that
    /// lies beyond the current target.
    pub fn dynamic_target(&self, position: &Position, atr: Option<f64>) -> Option<f64> {
        let atr = atr.filter(|a| a.is_finite() && *a > 0.0)?;
        let offset = atr * self.config.dynamic_tp_atr_multiplier;
        let target = position.entry_price + offset * position.side.sign();
        position.improves_target(target).then_some(target)
    }

    /// Reviews every open position of one instrument.
    pub fn review(
        &self,
        tracker: &mut ExitTracker,
        instrument: &str,
        positions: &[Position],
        quote: &Quote,
        atr: Option<f64>,
    ) -> Vec<ExitAdjustment> {
        tracker.sync(instrument, positions);
        let mut adjustments = Vec::new();
        for position in positions.iter().filter(|p| p.instrument == instrument) {
            let price = quote.exit_price(position.side);
            let stop = if self.config.trailing_enabled {
                let track = tracker.track_mut(position, price);
                self.trailing_stop(position, track, price)
            } else {
                None
            };
            let target = if self.config.dynamic_tp_enabled {
                self.dynamic_target(position, atr)
            } else {
                None
            };
            if stop.is_none() && target.is_none() {
                continue;
            }
            adjustments.push(ExitAdjustment {
                position_id: position.id,
                stop_price: stop.unwrap_or(position.stop_price),
                target_price: target.unwrap_or(position.target_price),
                trailed: stop.is_some(),
                extended_target: target.is_some(),
            });
        }
        adjustments
    }
}
