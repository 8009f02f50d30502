#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;

use amatrader::domain::error::AmatraderError;
pub use amatrader::domain::ohlcv::Bar;
use amatrader::domain::order::{AccountSnapshot, OrderAck, OrderRequest};
use amatrader::domain::position::{Position, Quote, TradeSide};
use amatrader::domain::snapshot::{Dmi, IndicatorSnapshot};
use amatrader::domain::structure::momentum::{Momentum, PriceMomentum};
use amatrader::domain::structure::volume::VolumeProfile;
use amatrader::domain::timeframe::Timeframe;
use amatrader::ports::data_port::MarketDataPort;
use amatrader::ports::notify_port::NotifyPort;
use amatrader::ports::venue_port::VenuePort;
use chrono::{NaiveDate, NaiveDateTime};

pub fn at(h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 15)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

pub fn make_bar(timestamp: NaiveDateTime, close: f64) -> Bar {
    Bar {
        timestamp,
        open: close - 0.0001,
        high: close + 0.0003,
        low: close - 0.0003,
        close,
        volume: 1_000,
    }
}

/// `count` one-minute bars ending at `end`, oscillating two pips around
/// `center` so the AMA pair never separates.
pub fn flat_bars(end: NaiveDateTime, count: usize, center: f64) -> Vec<Bar> {
    (0..count)
        .map(|i| {
            let ts = end - chrono::Duration::minutes((count - 1 - i) as i64);
            let close = if i % 2 == 0 {
                center + 0.0001
            } else {
                center - 0.0001
            };
            make_bar(ts, close)
        })
        .collect()
}

/// Flat history followed by `trend_bars` one-minute bars that each close
/// `step` away from the previous one, ending at `end`.
pub fn trending_bars(
    end: NaiveDateTime,
    flat_count: usize,
    trend_bars: usize,
    step: f64,
) -> Vec<Bar> {
    let trend_start = end - chrono::Duration::minutes(trend_bars as i64);
    let mut bars = flat_bars(trend_start, flat_count, 1.1000);
    bars.extend((1..=trend_bars).map(|k| {
        make_bar(
            trend_start + chrono::Duration::minutes(k as i64),
            1.1000 + step * k as f64,
        )
    }));
    bars
}

pub fn quote(time: NaiveDateTime, bid: f64, spread_pips: f64) -> Quote {
    Quote {
        time,
        bid,
        ask: bid + spread_pips * 0.0001,
    }
}

pub fn momentum(direction: Momentum, strength: f64) -> PriceMomentum {
    PriceMomentum {
        direction,
        strength,
        net_movement: 0.0,
        bullish_candles: 0,
        bearish_candles: 0,
        recent_high: 0.0,
        recent_low: 0.0,
    }
}

/// Fast AMA 0.08% above the slow one, price above both, ADX 25 with +DI
/// leading, RSI 45 rising, expanding bands on strong volume.
pub fn bullish_snapshot() -> IndicatorSnapshot {
    IndicatorSnapshot {
        bar_count: 300,
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
        volume: Some(VolumeProfile {
            current_volume: 150.0,
            average_volume: 100.0,
            ratio: 1.5,
            increasing: true,
            above_average: true,
            wide_spread: false,
        }),
        momentum: Some(momentum(Momentum::Bullish, 0.8)),
        ..IndicatorSnapshot::default()
    }
}

pub struct MockMarketData {
    pub bars: HashMap<String, Vec<Bar>>,
    pub quotes: RefCell<HashMap<String, Quote>>,
}

impl MockMarketData {
    pub fn new() -> Self {
        Self {
            bars: HashMap::new(),
            quotes: RefCell::new(HashMap::new()),
        }
    }

    pub fn with_bars(mut self, instrument: &str, bars: Vec<Bar>) -> Self {
        self.bars.insert(instrument.to_string(), bars);
        self
    }

    pub fn with_quote(self, instrument: &str, quote: Quote) -> Self {
        self.set_quote(instrument, quote);
        self
    }

    pub fn set_quote(&self, instrument: &str, quote: Quote) {
        self.quotes.borrow_mut().insert(instrument.to_string(), quote);
    }
}

impl MarketDataPort for MockMarketData {
    /// Serves the same series for every timeframe.
    fn historical_bars(
        &self,
        instrument: &str,
        _timeframe: Timeframe,
        count: usize,
    ) -> Result<Option<Vec<Bar>>, AmatraderError> {
        Ok(self.bars.get(instrument).map(|bars| {
            let start = bars.len().saturating_sub(count);
            bars[start..].to_vec()
        }))
    }

    fn quote(&self, instrument: &str) -> Result<Quote, AmatraderError> {
        self.quotes
            .borrow()
            .get(instrument)
            .copied()
            .ok_or_else(|| AmatraderError::NoData {
                instrument: instrument.to_string(),
                timeframe: "tick".to_string(),
            })
    }
}

pub struct MockVenue {
    pub connected: bool,
    pub reconnect_works: bool,
    pub balance: f64,
    pub positions: Vec<Position>,
    pub submits: Vec<OrderRequest>,
    pub modifies: Vec<(u64, f64, f64)>,
    pub closes: Vec<u64>,
    /// Price market orders fill at; `None` rejects every order.
    pub fill_price: Option<f64>,
    next_id: u64,
}

impl MockVenue {
    pub fn new(balance: f64) -> Self {
        Self {
            connected: true,
            reconnect_works: true,
            balance,
            positions: Vec::new(),
            submits: Vec::new(),
            modifies: Vec::new(),
            closes: Vec::new(),
            fill_price: None,
            next_id: 1_000,
        }
    }

    pub fn filling_at(mut self, price: f64) -> Self {
        self.fill_price = Some(price);
        self
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.positions.push(position);
        self
    }

    fn online(&self) -> Result<(), AmatraderError> {
        if self.connected {
            Ok(())
        } else {
            Err(AmatraderError::Disconnected {
                reason: "mock venue offline".into(),
            })
        }
    }
}

impl VenuePort for MockVenue {
    fn is_connected(&self) -> bool {
        self.connected
    }

    fn reconnect(&mut self) -> Result<(), AmatraderError> {
        if self.reconnect_works {
            self.connected = true;
            Ok(())
        } else {
            Err(AmatraderError::Disconnected {
                reason: "handshake refused".into(),
            })
        }
    }

    fn submit_order(&mut self, request: &OrderRequest) -> Result<OrderAck, AmatraderError> {
        self.online()?;
        self.submits.push(request.clone());
        let Some(price) = self.fill_price else {
            return Ok(OrderAck::rejected("mock venue does not fill"));
        };
        self.next_id += 1;
        self.positions.push(Position {
            id: self.next_id,
            instrument: request.instrument.clone(),
            side: request.side,
            lots: request.lots,
            entry_price: price,
            stop_price: request.stop_price,
            target_price: request.target_price,
            opened_at: at(14, 0),
            magic: request.magic,
        });
        Ok(OrderAck::accepted(self.next_id))
    }

    fn modify_stop_target(
        &mut self,
        position_id: u64,
        stop_price: f64,
        target_price: f64,
    ) -> Result<OrderAck, AmatraderError> {
        self.online()?;
        self.modifies.push((position_id, stop_price, target_price));
        match self.positions.iter_mut().find(|p| p.id == position_id) {
            Some(p) => {
                p.stop_price = stop_price;
                p.target_price = target_price;
                Ok(OrderAck::accepted(position_id))
            }
            None => Ok(OrderAck::rejected("unknown position")),
        }
    }

    fn close_position(
        &mut self,
        position: &Position,
        _slippage_points: u32,
    ) -> Result<OrderAck, AmatraderError> {
        self.online()?;
        self.closes.push(position.id);
        self.positions.retain(|p| p.id != position.id);
        Ok(OrderAck::accepted(position.id))
    }

    fn open_positions(&self, instrument: &str) -> Result<Vec<Position>, AmatraderError> {
        self.online()?;
        Ok(self
            .positions
            .iter()
            .filter(|p| p.instrument == instrument)
            .cloned()
            .collect())
    }

    fn account(&self) -> Result<AccountSnapshot, AmatraderError> {
        self.online()?;
        Ok(AccountSnapshot {
            balance: self.balance,
            equity: self.balance,
        })
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub messages: RefCell<Vec<String>>,
}

impl RecordingNotifier {
    pub fn count_containing(&self, needle: &str) -> usize {
        self.messages
            .borrow()
            .iter()
            .filter(|m| m.contains(needle))
            .count()
    }
}

impl NotifyPort for RecordingNotifier {
    fn notify(&self, message: &str) -> Result<(), AmatraderError> {
        self.messages.borrow_mut().push(message.to_string());
        Ok(())
    }
}

pub fn long_position(id: u64, entry: f64, stop: f64, target: f64) -> Position {
    Position {
        id,
        instrument: "EURUSD".into(),
        side: TradeSide::Buy,
        lots: 0.5,
        entry_price: entry,
        stop_price: stop,
        target_price: target,
        opened_at: at(14, 0),
        magic: 123_456,
    }
}
