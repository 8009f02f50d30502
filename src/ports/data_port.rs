//! Market data port trait.

use crate::domain::error::AmatraderError;
use crate::domain::instrument::SymbolInfo;
use crate::domain::ohlcv::Bar;
use crate::domain::position::Quote;
use crate::domain::timeframe::Timeframe;

pub trait MarketDataPort {
    /// The most recent `count` bars in ascending time order. `Ok(None)` means
    /// nothing is available yet and the caller should try again next cycle.
    fn historical_bars(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Option<Vec<Bar>>, AmatraderError>;

    /// Live bid/ask for `instrument`.
    fn quote(&self, instrument: &str) -> Result<Quote, AmatraderError>;

    /// Contract details. Defaults to standard forex conventions.
    fn symbol_info(&self, instrument: &str) -> Option<SymbolInfo> {
        Some(SymbolInfo::forex(instrument))
    }
}
