//! Read-only mirror of venue positions and live quotes.

use std::fmt;

use chrono::NaiveDateTime;

use crate::domain::instrument::{pip_size, price_to_pips};
use crate::domain::signal::Direction;

/// Side of an order or position. Unlike [`Direction`] it is never neutral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn from_direction(direction: Direction) -> Option<TradeSide> {
        match direction {
            Direction::Buy => Some(TradeSide::Buy),
            Direction::Sell => Some(TradeSide::Sell),
            Direction::Neutral => None,
        }
    }

    pub fn opposite(self) -> TradeSide {
        match self {
            TradeSide::Buy => TradeSide::Sell,
            TradeSide::Sell => TradeSide::Buy,
        }
    }

    /// +1 for buys, -1 for sells.
    pub fn sign(self) -> f64 {
        match self {
            TradeSide::Buy => 1.0,
            TradeSide::Sell => -1.0,
        }
    }
}

impl From<TradeSide> for Direction {
    fn from(side: TradeSide) -> Self {
        match side {
            TradeSide::Buy => Direction::Buy,
            TradeSide::Sell => Direction::Sell,
        }
    }
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Direction::from(*self))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quote {
    pub time: NaiveDateTime,
    pub bid: f64,
    pub ask: f64,
}

impl Quote {
    /// Price an order on `side` would fill at.
    pub fn entry_price(&self, side: TradeSide) -> f64 {
        match side {
            TradeSide::Buy => self.ask,
            TradeSide::Sell => self.bid,
        }
    }

    /// Price a position on `side` would close at.
    pub fn exit_price(&self, side: TradeSide) -> f64 {
        self.entry_price(side.opposite())
    }

    pub fn spread_pips(&self, instrument: &str) -> f64 {
        price_to_pips(instrument, self.ask - self.bid)
    }

    pub fn mid(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub id: u64,
    pub instrument: String,
    pub side: TradeSide,
    pub lots: f64,
    pub entry_price: f64,
    /// 0 when no stop is set.
    pub stop_price: f64,
    /// 0 when no target is set.
    pub target_price: f64,
    pub opened_at: NaiveDateTime,
    pub magic: u64,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.side == TradeSide::Buy
    }

    pub fn is_short(&self) -> bool {
        self.side == TradeSide::Sell
    }

    /// Signed profit in pips at `price`.
    pub fn profit_pips(&self, price: f64) -> f64 {
        price_to_pips(&self.instrument, (price - self.entry_price) * self.side.sign())
    }

    /// Profit in account currency at `price` for a given per-lot pip value.
    pub fn unrealized_pnl(&self, price: f64, pip_value: f64) -> f64 {
        self.profit_pips(price) * pip_value * self.lots
    }

    pub fn notional(&self, contract_size: f64) -> f64 {
        self.lots * contract_size * self.entry_price
    }

    pub fn should_stop_loss(&self, price: f64) -> bool {
        if self.stop_price == 0.0 {
            return false;
        }
        if self.is_long() {
            price <= self.stop_price
        } else {
            price >= self.stop_price
        }
    }

    pub fn should_take_profit(&self, price: f64) -> bool {
        if self.target_price == 0.0 {
            return false;
        }
        if self.is_long() {
            price >= self.target_price
        } else {
            price <= self.target_price
        }
    }

    /// Whether `stop` is strictly more protective than the current stop.
    pub fn improves_stop(&self, stop: f64) -> bool {
        if self.stop_price == 0.0 {
            return true;
        }
        let min_step = pip_size(&self.instrument) / 10.0;
        match self.side {
            TradeSide::Buy => stop > self.stop_price + min_step,
            TradeSide::Sell => stop < self.stop_price - min_step,
        }
    }

    /// Whether `target` lies further in the profitable direction.
    pub fn improves_target(&self, target: f64) -> bool {
        if self.target_price == 0.0 {
            return true;
        }
        match self.side {
            TradeSide::Buy => target > self.target_price,
            TradeSide::Sell => target < self.target_price,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    StopLoss,
    TakeProfit,
    Manual,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CloseReason::StopLoss => "stop-loss",
            CloseReason::TakeProfit => "take-profit",
            CloseReason::Manual => "manual",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClosedTrade {
    pub position_id: u64,
    pub instrument: String,
    pub side: TradeSide,
    pub lots: f64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub opened_at: NaiveDateTime,
    pub closed_at: NaiveDateTime,
    pub pnl: f64,
    pub reason: CloseReason,
}

impl ClosedTrade {
    pub fn from_position(
        position: &Position,
        exit_price: f64,
        closed_at: NaiveDateTime,
        pip_value: f64,
        reason: CloseReason,
    ) -> Self {
        Self {
            position_id: position.id,
            instrument: position.instrument.clone(),
            side: position.side,
            lots: position.lots,
            entry_price: position.entry_price,
            exit_price,
            opened_at: position.opened_at,
            closed_at,
            pnl: position.unrealized_pnl(exit_price, pip_value),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn opened() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn sample_long_position() -> Position {
        Position {
            id: 1,
            instrument: "EURUSD".into(),
            side: TradeSide::Buy,
            lots: 0.5,
            entry_price: 1.1000,
            stop_price: 1.0980,
            target_price: 1.1040,
            opened_at: opened(),
            magic: 123_456,
        }
    }

    fn sample_short_position() -> Position {
        Position {
            id: 2,
            instrument: "USDJPY".into(),
            side: TradeSide::Sell,
            lots: 1.0,
            entry_price: 150.00,
            stop_price: 150.20,
            target_price: 149.60,
            opened_at: opened(),
            magic: 123_456,
        }
    }

    #[test]
    fn sides() {
        assert!(sample_long_position().is_long());
        assert!(sample_short_position().is_short());
        assert_eq!(TradeSide::from_direction(Direction::Neutral), None);
        assert_eq!(TradeSide::Buy.opposite(), TradeSide::Sell);
        assert_eq!(TradeSide::Sell.to_string(), "SELL");
    }

    #[test]
    fn profit_in_pips() {
        let long = sample_long_position();
        assert!((long.profit_pips(1.1015) - 15.0).abs() < 1e-9);
        let short = sample_short_position();
        assert!((short.profit_pips(149.90) - 10.0).abs() < 1e-9);
        assert!((short.profit_pips(150.10) + 10.0).abs() < 1e-9);
    }

    #[test]
    fn unrealized_pnl_uses_pip_value() {
        let long = sample_long_position();
        assert!((long.unrealized_pnl(1.1010, 10.0) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn stop_and_target_triggers() {
        let long = sample_long_position();
        assert!(long.should_stop_loss(1.0980));
        assert!(!long.should_stop_loss(1.0981));
        assert!(long.should_take_profit(1.1040));

        let short = sample_short_position();
        assert!(short.should_stop_loss(150.25));
        assert!(short.should_take_profit(149.50));
        assert!(!short.should_take_profit(149.70));
    }

    #[test]
    fn disabled_stop_never_triggers() {
        let mut pos = sample_long_position();
        pos.stop_price = 0.0;
        assert!(!pos.should_stop_loss(0.5));
        assert!(pos.improves_stop(1.0));
    }

    #[test]
    fn stop_only_improves_in_favour() {
        let long = sample_long_position();
        assert!(long.improves_stop(1.0990));
        assert!(!long.improves_stop(1.0970));
        let short = sample_short_position();
        assert!(short.improves_stop(150.10));
        assert!(!short.improves_stop(150.30));
    }

    #[test]
    fn quote_prices() {
        let q = Quote {
            time: opened(),
            bid: 1.1000,
            ask: 1.1002,
        };
        assert!((q.entry_price(TradeSide::Buy) - 1.1002).abs() < f64::EPSILON);
        assert!((q.exit_price(TradeSide::Buy) - 1.1000).abs() < f64::EPSILON);
        assert!((q.spread_pips("EURUSD") - 2.0).abs() < 1e-9);
    }

    #[test]
    fn closed_trade_realises_pnl() {
        let long = sample_long_position();
        let trade =
            ClosedTrade::from_position(&long, 1.0980, opened(), 10.0, CloseReason::StopLoss);
        assert!((trade.pnl + 100.0).abs() < 1e-9);
        assert_eq!(trade.reason.to_string(), "stop-loss");
    }
}
