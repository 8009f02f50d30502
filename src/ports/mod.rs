//! Port traits for every external collaborator of the engine.

pub mod clock_port;
pub mod config_port;
pub mod data_port;
pub mod notify_port;
pub mod venue_port;
