//! Market-structure detectors: swing points, support/resistance, pivots,
//! harmonic patterns, candlestick flags, breakouts, price momentum and volume.
//!
//! Like the indicators these are pure functions over a bar window. Anything
//! that cannot be decided from the window comes back as `None` or `false`.

pub mod breakout;
pub mod candlestick;
pub mod harmonic;
pub mod momentum;
pub mod pivot;
pub mod support_resistance;
pub mod swing;
pub mod volume;
