//! Order execution port trait.
//!
//! Acknowledgements returned here are advisory. Callers confirm outcomes by
//! reading [`VenuePort::open_positions`] afterwards.

use crate::domain::error::AmatraderError;
use crate::domain::order::{AccountSnapshot, OrderAck, OrderRequest};
use crate::domain::position::Position;

pub trait VenuePort {
    fn is_connected(&self) -> bool;

    fn reconnect(&mut self) -> Result<(), AmatraderError>;

    fn submit_order(&mut self, request: &OrderRequest) -> Result<OrderAck, AmatraderError>;

    fn modify_stop_target(
        &mut self,
        position_id: u64,
        stop_price: f64,
        target_price: f64,
    ) -> Result<OrderAck, AmatraderError>;

    fn close_position(
        &mut self,
        position: &Position,
        slippage_points: u32,
    ) -> Result<OrderAck, AmatraderError>;

    fn open_positions(&self, instrument: &str) -> Result<Vec<Position>, AmatraderError>;

    fn account(&self) -> Result<AccountSnapshot, AmatraderError>;
}
