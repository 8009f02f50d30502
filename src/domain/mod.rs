//! Core domain types and logic.

pub mod config;
pub mod confluence;
pub mod connection;
pub mod cooldown;
pub mod engine;
pub mod error;
pub mod execution;
pub mod exits;
pub mod governor;
pub mod indicator;
pub mod instrument;
pub mod mtf;
pub mod ohlcv;
pub mod order;
pub mod position;
pub mod risk;
pub mod scheduler;
pub mod session;
pub mod signal;
pub mod snapshot;
pub mod structure;
pub mod timeframe;
pub mod trend_conflict;
