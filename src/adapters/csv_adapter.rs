//! CSV bar replay adapter.
//!
//! Serves bars from `<INSTRUMENT>_<TIMEFRAME>.csv` files, revealing only the
//! bars whose timestamp is not after the clock's current time. Quotes are
//! synthesised from the last visible close plus a fixed spread.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, info};

use crate::domain::error::AmatraderError;
use crate::domain::instrument::{SymbolInfo, pips_to_price};
use crate::domain::ohlcv::Bar;
use crate::domain::position::Quote;
use crate::domain::timeframe::Timeframe;
use crate::ports::clock_port::ClockPort;
use crate::ports::data_port::MarketDataPort;

const TIMESTAMP_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, AmatraderError> {
    let raw = raw.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| AmatraderError::DataSource {
            reason: format!("invalid timestamp: {raw}"),
        })
}

fn field<'r>(
    record: &'r csv::StringRecord,
    idx: usize,
    name: &str,
) -> Result<&'r str, AmatraderError> {
    record.get(idx).ok_or_else(|| AmatraderError::DataSource {
        reason: format!("missing {name} column"),
    })
}

fn number<T: std::str::FromStr>(
    record: &csv::StringRecord,
    idx: usize,
    name: &str,
) -> Result<T, AmatraderError>
where
    T::Err: std::fmt::Display,
{
    field(record, idx, name)?
        .trim()
        .parse()
        .map_err(|e| AmatraderError::DataSource {
            reason: format!("invalid {name} value: {e}"),
        })
}

/// Parses `timestamp,open,high,low,close,volume` rows, sorted ascending.
pub fn parse_bars(content: &str) -> Result<Vec<Bar>, AmatraderError> {
    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let mut bars = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|e| AmatraderError::DataSource {
            reason: format!("CSV parse error: {e}"),
        })?;
        let volume: f64 = number(&record, 5, "volume")?;
        bars.push(Bar {
            timestamp: parse_timestamp(field(&record, 0, "timestamp")?)?,
            open: number(&record, 1, "open")?,
            high: number(&record, 2, "high")?,
            low: number(&record, 3, "low")?,
            close: number(&record, 4, "close")?,
            volume: volume.round() as i64,
        });
    }
    bars.sort_by_key(|b| b.timestamp);
    bars.dedup_by_key(|b| b.timestamp);
    Ok(bars)
}

pub struct CsvMarketData {
    series: HashMap<(String, Timeframe), Vec<Bar>>,
    clock: Rc<dyn ClockPort>,
    spread_pips: f64,
}

impl CsvMarketData {
    pub fn new(clock: Rc<dyn ClockPort>, spread_pips: f64) -> Self {
        Self {
            series: HashMap::new(),
            clock,
            spread_pips,
        }
    }

    pub fn csv_path(dir: &Path, instrument: &str, timeframe: Timeframe) -> PathBuf {
        dir.join(format!("{instrument}_{timeframe}.csv"))
    }

    /// Loads every file in `dir` matching one of `instruments` and
    /// `timeframes`. Missing files are skipped. Returns the number loaded.
    pub fn load_dir(
        &mut self,
        dir: &Path,
        instruments: &[String],
        timeframes: &[Timeframe],
    ) -> Result<usize, AmatraderError> {
        let mut loaded = 0;
        for instrument in instruments {
            for &timeframe in timeframes {
                let path = Self::csv_path(dir, instrument, timeframe);
                if !path.exists() {
                    debug!(path = %path.display(), "no bar file");
                    continue;
                }
                let content = fs::read_to_string(&path).map_err(|e| AmatraderError::DataSource {
                    reason: format!("failed to read {}: {}", path.display(), e),
                })?;
                let bars = parse_bars(&content)?;
                info!(%instrument, %timeframe, bars = bars.len(), "loaded bar file");
                self.insert(instrument, timeframe, bars);
                loaded += 1;
            }
        }
        Ok(loaded)
    }

    pub fn insert(&mut self, instrument: &str, timeframe: Timeframe, mut bars: Vec<Bar>) {
        bars.sort_by_key(|b| b.timestamp);
        self.series
            .insert((instrument.to_ascii_uppercase(), timeframe), bars);
    }

    /// First and last timestamp over every loaded series.
    pub fn time_range(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let first = self.series.values().filter_map(|b| b.first()).map(|b| b.timestamp).min()?;
        let last = self.series.values().filter_map(|b| b.last()).map(|b| b.timestamp).max()?;
        Some((first, last))
    }

    fn visible(&self, instrument: &str, timeframe: Timeframe) -> Option<&[Bar]> {
        let bars = self.series.get(&(instrument.to_ascii_uppercase(), timeframe))?;
        let now = self.clock.now();
        let end = bars.partition_point(|b| b.timestamp <= now);
        Some(&bars[..end])
    }

    /// Most recent visible bar on the fastest loaded timeframe.
    fn latest_bar(&self, instrument: &str) -> Option<&Bar> {
        Timeframe::ALL
            .into_iter()
            .find_map(|tf| self.visible(instrument, tf)?.last())
    }
}

impl MarketDataPort for CsvMarketData {
    fn historical_bars(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Option<Vec<Bar>>, AmatraderError> {
        let Some(bars) = self.visible(instrument, timeframe) else {
            return Ok(None);
        };
        if bars.is_empty() {
            return Ok(None);
        }
        let start = bars.len().saturating_sub(count);
        Ok(Some(bars[start..].to_vec()))
    }

    fn quote(&self, instrument: &str) -> Result<Quote, AmatraderError> {
        let bar = self
            .latest_bar(instrument)
            .ok_or_else(|| AmatraderError::NoData {
                instrument: instrument.to_string(),
                timeframe: "any".to_string(),
            })?;
        Ok(Quote {
            time: bar.timestamp,
            bid: bar.close,
            ask: bar.close + pips_to_price(instrument, self.spread_pips),
        })
    }

    fn symbol_info(&self, instrument: &str) -> Option<SymbolInfo> {
        Some(SymbolInfo::forex(instrument))
    }
}
