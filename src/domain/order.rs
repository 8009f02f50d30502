//! Order requests, venue acknowledgements and parameter sanitising.

use std::fmt;

use tracing::warn;

use crate::domain::instrument::pips_to_price;
use crate::domain::position::{Quote, TradeSide};

pub const LOT_RANGE: (f64, f64) = (0.01, 10.0);
pub const SL_PIPS_RANGE: (f64, f64) = (5.0, 500.0);
pub const TP_PIPS_RANGE: (f64, f64) = (5.0, 1000.0);
pub const RISK_PERCENT_RANGE: (f64, f64) = (0.1, 5.0);
pub const MAX_SLIPPAGE_POINTS: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccountSnapshot {
    pub balance: f64,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub instrument: String,
    pub side: TradeSide,
    pub lots: f64,
    pub stop_price: f64,
    pub target_price: f64,
    pub slippage_points: u32,
    pub magic: u64,
    pub comment: String,
}

impl OrderRequest {
    /// Market order priced off `quote` with stop and target `sl_pips` and
    /// `tp_pips` away from the fill side.
    pub fn market(
        instrument: &str,
        side: TradeSide,
        quote: &Quote,
        params: &OrderParams,
        magic: u64,
    ) -> Self {
        let entry = quote.entry_price(side);
        let sl = pips_to_price(instrument, params.sl_pips);
        let tp = pips_to_price(instrument, params.tp_pips);
        let (stop_price, target_price) = match side {
            TradeSide::Buy => (entry - sl, entry + tp),
            TradeSide::Sell => (entry + sl, entry - tp),
        };
        Self {
            instrument: instrument.to_string(),
            side,
            lots: params.lots,
            stop_price,
            target_price,
            slippage_points: params.slippage_points,
            magic,
            comment: "ama-confluence".to_string(),
        }
    }
}

impl fmt::Display for OrderRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {:.2} lots sl={:.5} tp={:.5}",
            self.side, self.instrument, self.lots, self.stop_price, self.target_price
        )
    }
}

/// What the venue said about a request. Never authoritative: the execution
/// machine re-reads positions to decide success.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderAck {
    pub accepted: bool,
    pub ticket: Option<u64>,
    pub message: String,
}

impl OrderAck {
    pub fn accepted(ticket: u64) -> Self {
        Self {
            accepted: true,
            ticket: Some(ticket),
            message: "done".to_string(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            accepted: false,
            ticket: None,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderParams {
    pub lots: f64,
    pub sl_pips: f64,
    pub tp_pips: f64,
    pub risk_percent: f64,
    pub slippage_points: u32,
}

fn correct(field: &str, value: f64, (min, max): (f64, f64), notes: &mut Vec<String>) -> f64 {
    if value.is_nan() {
        warn!(field, "NaN order parameter replaced by minimum");
        notes.push(format!("{field} NaN -> {min}"));
        return min;
    }
    let fixed = value.clamp(min, max);
    if fixed != value {
        warn!(field, value, fixed, "order parameter out of range, corrected");
        notes.push(format!("{field} {value} -> {fixed}"));
    }
    fixed
}

impl OrderParams {
    /// Clamps every field into its valid range. Returns one note per
    /// correction made.
    pub fn sanitize(&mut self) -> Vec<String> {
        let mut notes = Vec::new();
        self.lots = correct("lots", self.lots, LOT_RANGE, &mut notes);
        self.sl_pips = correct("sl_pips", self.sl_pips, SL_PIPS_RANGE, &mut notes);
        self.tp_pips = correct("tp_pips", self.tp_pips, TP_PIPS_RANGE, &mut notes);
        self.risk_percent = correct(
            "risk_percent",
            self.risk_percent,
            RISK_PERCENT_RANGE,
            &mut notes,
        );
        if self.slippage_points > MAX_SLIPPAGE_POINTS {
            warn!(value = self.slippage_points, "slippage out of range, corrected");
            notes.push(format!(
                "slippage {} -> {MAX_SLIPPAGE_POINTS}",
                self.slippage_points
            ));
            self.slippage_points = MAX_SLIPPAGE_POINTS;
        }
        notes
    }
}
