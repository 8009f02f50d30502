//! Technical indicator implementations.
//!
//! This module provides types for representing indicator values and series:
//! - `IndicatorPoint`: A single point in an indicator time series
//! - `IndicatorValue`: Enum for different indicator output shapes
//! - `IndicatorType`: Enum for indicator identity + parameters (serves as HashMap key)
//! - `IndicatorSeries`: A time series of indicator values aligned to the bar window
//!
//! A point with `valid == false` is the undefined marker: not enough bars, or a
//! zero denominator. Consumers treat it as "not confirmed", never as an error.

pub mod adx;
pub mod ama;
pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod keltner;
pub mod macd;
pub mod obv;
pub mod roc;
pub mod rsi;
pub mod sma;
pub mod stddev;
pub mod vwma;

pub use adx::calculate_adx;
pub use ama::calculate_ama;
pub use atr::calculate_atr;
pub use bollinger::calculate_bollinger;
pub use ema::{calculate_ema, ema_values};
pub use keltner::calculate_keltner;
pub use macd::calculate_macd;
pub use obv::calculate_obv;
pub use roc::calculate_roc;
pub use rsi::calculate_rsi;
pub use sma::calculate_sma;
pub use stddev::calculate_stddev;
pub use vwma::calculate_vwma;

use chrono::NaiveDateTime;
use std::fmt;

#[derive(Debug, Clone)]
pub struct IndicatorPoint {
    pub timestamp: NaiveDateTime,
    pub valid: bool,
    pub value: IndicatorValue,
}

impl IndicatorPoint {
    pub fn simple(timestamp: NaiveDateTime, value: f64) -> Self {
        Self {
            timestamp,
            valid: value.is_finite(),
            value: IndicatorValue::Simple(value),
        }
    }

    pub fn undefined(timestamp: NaiveDateTime) -> Self {
        Self {
            timestamp,
            valid: false,
            value: IndicatorValue::Simple(0.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IndicatorValue {
    Simple(f64),
    Macd {
        line: f64,
        signal: f64,
        histogram: f64,
    },
    /// Bollinger bands and Keltner channels; `width` is (upper - lower) / middle * 100.
    Bands {
        upper: f64,
        middle: f64,
        lower: f64,
        width: f64,
    },
    Dmi {
        adx: f64,
        plus_di: f64,
        minus_di: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Ama {
        period: usize,
        fast: usize,
        slow: usize,
    },
    Sma(usize),
    Ema(usize),
    Vwma(usize),
    Rsi(usize),
    Roc(usize),
    Atr(usize),
    Stddev(usize),
    Adx(usize),
    Obv,
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    Bollinger {
        period: usize,
        stddev_mult_x100: u32,
    },
    Keltner {
        period: usize,
        atr_mult_x100: u32,
    },
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    pub fn empty(indicator_type: IndicatorType) -> Self {
        Self {
            indicator_type,
            values: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value `back` points before the latest one, if defined.
    pub fn value_back(&self, back: usize) -> Option<&IndicatorValue> {
        let idx = self.values.len().checked_sub(back + 1)?;
        let point = &self.values[idx];
        point.valid.then_some(&point.value)
    }

    pub fn last(&self) -> Option<&IndicatorValue> {
        self.value_back(0)
    }

    pub fn simple_back(&self, back: usize) -> Option<f64> {
        match self.value_back(back)? {
            IndicatorValue::Simple(v) => Some(*v),
            _ => None,
        }
    }

    pub fn last_simple(&self) -> Option<f64> {
        self.simple_back(0)
    }

    /// Simple values aligned to the bar window, `None` where undefined.
    pub fn simple_values(&self) -> Vec<Option<f64>> {
        self.values
            .iter()
            .map(|p| match (p.valid, &p.value) {
                (true, IndicatorValue::Simple(v)) => Some(*v),
                _ => None,
            })
            .collect()
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Ama { period, fast, slow } => {
                write!(f, "AMA({},{},{})", period, fast, slow)
            }
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Vwma(period) => write!(f, "VWMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Roc(period) => write!(f, "ROC({})", period),
            IndicatorType::Atr(period) => write!(f, "ATR({})", period),
            IndicatorType::Stddev(period) => write!(f, "STDDEV({})", period),
            IndicatorType::Adx(period) => write!(f, "ADX({})", period),
            IndicatorType::Obv => write!(f, "OBV"),
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => {
                let mult = *stddev_mult_x100 as f64 / 100.0;
                write!(f, "BOLLINGER({},{})", period, mult)
            }
            IndicatorType::Keltner {
                period,
                atr_mult_x100,
            } => {
                let mult = *atr_mult_x100 as f64 / 100.0;
                write!(f, "KELTNER({},{})", period, mult)
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indicator_type_display_ama() {
        let ama = IndicatorType::Ama {
            period: 50,
            fast: 2,
            slow: 30,
        };
        assert_eq!(ama.to_string(), "AMA(50,2,30)");
    }

    #[test]
    fn indicator_type_display_macd() {
        let macd = IndicatorType::Macd {
            fast: 12,
            slow: 26,
            signal: 9,
        };
        assert_eq!(macd.to_string(), "MACD(12,26,9)");
    }

    #[test]
    fn indicator_type_display_bands() {
        let boll = IndicatorType::Bollinger {
            period: 20,
            stddev_mult_x100: 200,
        };
        assert_eq!(boll.to_string(), "BOLLINGER(20,2)");
        let kc = IndicatorType::Keltner {
            period: 20,
            atr_mult_x100: 150,
        };
        assert_eq!(kc.to_string(), "KELTNER(20,1.5)");
    }

    #[test]
    fn indicator_type_hash_eq() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert(IndicatorType::Rsi(14), "rsi");
        map.insert(IndicatorType::Adx(14), "adx");
        assert_eq!(map.get(&IndicatorType::Rsi(14)), Some(&"rsi"));
        assert_eq!(map.get(&IndicatorType::Rsi(7)), None);
    }

    #[test]
    fn series_accessors_skip_undefined() {
        let series = IndicatorSeries {
            indicator_type: IndicatorType::Sma(2),
            values: vec![
                IndicatorPoint::undefined(test_support::ts(0)),
                IndicatorPoint::simple(test_support::ts(1), 1.5),
                IndicatorPoint::simple(test_support::ts(2), 2.5),
            ],
        };
        assert_eq!(series.last_simple(), Some(2.5));
        assert_eq!(series.simple_back(1), Some(1.5));
        assert_eq!(series.simple_back(2), None);
        assert_eq!(series.simple_back(3), None);
        assert_eq!(series.simple_values(), vec![None, Some(1.5), Some(2.5)]);
    }

    #[test]
    fn non_finite_simple_is_undefined() {
        let point = IndicatorPoint::simple(test_support::ts(0), f64::NAN);
        assert!(!point.valid);
    }
}
