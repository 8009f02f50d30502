//! In-memory venue that fills market orders at the current quote.
//!
//! Stops and targets are settled lazily: every call first closes positions
//! whose stop or target the current quote has crossed.

use std::cell::RefCell;

use tracing::{info, warn};

use crate::domain::error::AmatraderError;
use crate::domain::order::{AccountSnapshot, OrderAck, OrderRequest};
use crate::domain::position::{CloseReason, ClosedTrade, Position};
use crate::domain::risk::pip_value;
use crate::ports::data_port::MarketDataPort;
use crate::ports::venue_port::VenuePort;

#[derive(Debug)]
struct Book {
    balance: f64,
    positions: Vec<Position>,
    closed: Vec<ClosedTrade>,
    next_id: u64,
    connected: bool,
}

pub struct PaperVenue<'a> {
    market: &'a dyn MarketDataPort,
    book: RefCell<Book>,
}

impl<'a> PaperVenue<'a> {
    pub fn new(market: &'a dyn MarketDataPort, balance: f64) -> Self {
        Self {
            market,
            book: RefCell::new(Book {
                balance,
                positions: Vec::new(),
                closed: Vec::new(),
                next_id: 1,
                connected: true,
            }),
        }
    }

    /// Simulates a dropped connection.
    pub fn disconnect(&self) {
        self.book.borrow_mut().connected = false;
    }

    pub fn closed_trades(&self) -> Vec<ClosedTrade> {
        self.settle();
        self.book.borrow().closed.clone()
    }

    pub fn balance(&self) -> f64 {
        self.settle();
        self.book.borrow().balance
    }

    fn pip_value(&self, instrument: &str) -> f64 {
        pip_value(instrument, self.market.symbol_info(instrument).as_ref())
    }

    fn settle(&self) {
        let mut book = self.book.borrow_mut();
        let mut i = 0;
        while i < book.positions.len() {
            let position = &book.positions[i];
            let Ok(quote) = self.market.quote(&position.instrument) else {
                i += 1;
                continue;
            };
            let price = quote.exit_price(position.side);
            let hit = if position.should_stop_loss(price) {
                Some((position.stop_price, CloseReason::StopLoss))
            } else if position.should_take_profit(price) {
                Some((position.target_price, CloseReason::TakeProfit))
            } else {
                None
            };
            match hit {
                Some((exit, reason)) => {
                    let position = book.positions.remove(i);
                    let trade = ClosedTrade::from_position(
                        &position,
                        exit,
                        quote.time,
                        self.pip_value(&position.instrument),
                        reason,
                    );
                    info!(
                        instrument = %trade.instrument,
                        position = trade.position_id,
                        %reason,
                        pnl = trade.pnl,
                        "paper position closed"
                    );
                    book.balance += trade.pnl;
                    book.closed.push(trade);
                }
                None => i += 1,
            }
        }
    }

    fn ensure_connected(&self) -> Result<(), AmatraderError> {
        if self.book.borrow().connected {
            Ok(())
        } else {
            Err(AmatraderError::Disconnected {
                reason: "paper venue offline".into(),
            })
        }
    }
}

impl VenuePort for PaperVenue<'_> {
    fn is_connected(&self) -> bool {
        self.book.borrow().connected
    }

    fn reconnect(&mut self) -> Result<(), AmatraderError> {
        self.book.get_mut().connected = true;
        Ok(())
    }

    fn submit_order(&mut self, request: &OrderRequest) -> Result<OrderAck, AmatraderError> {
        self.ensure_connected()?;
        self.settle();
        let quote = self.market.quote(&request.instrument)?;
        let book = self.book.get_mut();
        let id = book.next_id;
        book.next_id += 1;
        book.positions.push(Position {
            id,
            instrument: request.instrument.clone(),
            side: request.side,
            lots: request.lots,
            entry_price: quote.entry_price(request.side),
            stop_price: request.stop_price,
            target_price: request.target_price,
            opened_at: quote.time,
            magic: request.magic,
        });
        info!(position = id, "paper fill {request}");
        Ok(OrderAck::accepted(id))
    }

    fn modify_stop_target(
        &mut self,
        position_id: u64,
        stop_price: f64,
        target_price: f64,
    ) -> Result<OrderAck, AmatraderError> {
        self.ensure_connected()?;
        self.settle();
        let book = self.book.get_mut();
        match book.positions.iter_mut().find(|p| p.id == position_id) {
            Some(position) => {
                position.stop_price = stop_price;
                position.target_price = target_price;
                Ok(OrderAck::accepted(position_id))
            }
            None => Ok(OrderAck::rejected(format!("unknown position {position_id}"))),
        }
    }

    fn close_position(
        &mut self,
        position: &Position,
        _slippage_points: u32,
    ) -> Result<OrderAck, AmatraderError> {
        self.ensure_connected()?;
        self.settle();
        let quote = self.market.quote(&position.instrument)?;
        let pip_value = self.pip_value(&position.instrument);
        let book = self.book.get_mut();
        let Some(idx) = book.positions.iter().position(|p| p.id == position.id) else {
            warn!(position = position.id, "close requested for unknown position");
            return Ok(OrderAck::rejected(format!("unknown position {}", position.id)));
        };
        let open = book.positions.remove(idx);
        let trade = ClosedTrade::from_position(
            &open,
            quote.exit_price(open.side),
            quote.time,
            pip_value,
            CloseReason::Manual,
        );
        book.balance += trade.pnl;
        book.closed.push(trade);
        Ok(OrderAck::accepted(position.id))
    }

    fn open_positions(&self, instrument: &str) -> Result<Vec<Position>, AmatraderError> {
        self.ensure_connected()?;
        self.settle();
        Ok(self
            .book
            .borrow()
            .positions
            .iter()
            .filter(|p| p.instrument == instrument)
            .cloned()
            .collect())
    }

    fn account(&self) -> Result<AccountSnapshot, AmatraderError> {
        self.ensure_connected()?;
        self.settle();
        let book = self.book.borrow();
        let unrealized: f64 = book
            .positions
            .iter()
            .filter_map(|p| {
                let quote = self.market.quote(&p.instrument).ok()?;
                Some(p.unrealized_pnl(quote.exit_price(p.side), self.pip_value(&p.instrument)))
            })
            .sum();
        Ok(AccountSnapshot {
            balance: book.balance,
            equity: book.balance + unrealized,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::Bar;
    use crate::domain::position::{Quote, TradeSide};
    use crate::domain::timeframe::Timeframe;
    use chrono::{NaiveDate, NaiveDateTime};
    use std::cell::Cell;

    struct StepMarket {
        bid: Cell<f64>,
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    impl MarketDataPort for StepMarket {
        fn historical_bars(
            &self,
            _: &str,
            _: Timeframe,
            _: usize,
        ) -> Result<Option<Vec<Bar>>, AmatraderError> {
            Ok(None)
        }

        fn quote(&self, _: &str) -> Result<Quote, AmatraderError> {
            Ok(Quote {
                time: now(),
                bid: self.bid.get(),
                ask: self.bid.get() + 0.0001,
            })
        }
    }

    fn buy(lots: f64) -> OrderRequest {
        OrderRequest {
            instrument: "EURUSD".into(),
            side: TradeSide::Buy,
            lots,
            stop_price: 1.0980,
            target_price: 1.1040,
            slippage_points: 100,
            magic: 123_456,
            comment: "test".into(),
        }
    }

    #[test]
    fn fills_at_ask() {
        let market = StepMarket {
            bid: Cell::new(1.1000),
        };
        let mut venue = PaperVenue::new(&market, 10_000.0);
        let ack = venue.submit_order(&buy(0.5)).unwrap();
        assert!(ack.accepted);
        let positions = venue.open_positions("EURUSD").unwrap();
        assert_eq!(positions.len(), 1);
        assert!((positions[0].entry_price - 1.1001).abs() < 1e-12);
    }

    #[test]
    fn stop_hit_realises_loss() {
        let market = StepMarket {
            bid: Cell::new(1.1000),
        };
        let mut venue = PaperVenue::new(&market, 10_000.0);
        venue.submit_order(&buy(0.5)).unwrap();
        market.bid.set(1.0975);

        assert!(venue.open_positions("EURUSD").unwrap().is_empty());
        let trades = venue.closed_trades();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].reason, CloseReason::StopLoss);
        // 21 pips from 1.1001 to 1.0980 at 0.5 lots and $10 per pip
        assert!((venue.balance() - 9_895.0).abs() < 1e-6);
    }

    #[test]
    fn equity_includes_open_profit() {
        let market = StepMarket {
            bid: Cell::new(1.1000),
        };
        let mut venue = PaperVenue::new(&market, 10_000.0);
        venue.submit_order(&buy(1.0)).unwrap();
        market.bid.set(1.1011);
        let account = venue.account().unwrap();
        assert!((account.balance - 10_000.0).abs() < 1e-9);
        assert!((account.equity - 10_100.0).abs() < 1e-6);
    }

    #[test]
    fn offline_venue_refuses_calls() {
        let market = StepMarket {
            bid: Cell::new(1.1000),
        };
        let mut venue = PaperVenue::new(&market, 10_000.0);
        venue.disconnect();
        assert!(!venue.is_connected());
        assert!(venue.submit_order(&buy(0.1)).is_err());
        venue.reconnect().unwrap();
        assert!(venue.submit_order(&buy(0.1)).is_ok());
    }

    #[test]
    fn manual_close_books_trade() {
        let market = StepMarket {
            bid: Cell::new(1.1000),
        };
        let mut venue = PaperVenue::new(&market, 10_000.0);
        venue.submit_order(&buy(1.0)).unwrap();
        let position = venue.open_positions("EURUSD").unwrap().remove(0);
        market.bid.set(1.1006);
        let ack = venue.close_position(&position, 100).unwrap();
        assert!(ack.accepted);
        assert_eq!(venue.closed_trades()[0].reason, CloseReason::Manual);
        assert!((venue.balance() - 10_050.0).abs() < 1e-6);
    }
}
