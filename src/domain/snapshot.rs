//! Indicator values at the latest bar of a window.
//!
//! A snapshot is computed fresh every cycle and never mutated afterwards.
//! Undefined indicators are `None`; the scoring code treats them as
//! "not confirmed".

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use tracing::debug;

use crate::domain::config::EngineConfig;
use crate::domain::indicator::macd::histogram_values;
use crate::domain::indicator::sma::rolling_mean_opt;
use crate::domain::indicator::{
    IndicatorSeries, IndicatorValue, calculate_adx, calculate_ama, calculate_atr,
    calculate_bollinger, calculate_keltner, calculate_macd, calculate_obv, calculate_roc,
    calculate_rsi, calculate_vwma,
};
use crate::domain::instrument::pips_to_price;
use crate::domain::ohlcv::Bar;
use crate::domain::structure::breakout::{Breakout, detect_breakout};
use crate::domain::structure::candlestick::{CandlePatterns, detect_candles};
use crate::domain::structure::harmonic::{HarmonicMatch, detect_harmonics};
use crate::domain::structure::momentum::{PriceMomentum, analyze_price_momentum};
use crate::domain::structure::pivot::{PivotLevel, calculate_pivots, prior_day};
use crate::domain::structure::support_resistance::{
    LevelProximity, RecentTouch, detect_dynamic_levels, recent_touches,
};
use crate::domain::structure::swing::{SwingStructure, detect_swings, swing_structure};
use crate::domain::structure::volume::{VolumeProfile, analyze_volume};

const OBV_AVERAGE_PERIOD: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dmi {
    pub adx: f64,
    pub plus_di: f64,
    pub minus_di: f64,
}

#[derive(Debug, Clone, Default)]
pub struct IndicatorSnapshot {
    pub timestamp: Option<NaiveDateTime>,
    pub bar_count: usize,
    pub close: f64,
    pub prev_close: Option<f64>,

    pub fast_ama: Option<f64>,
    pub slow_ama: Option<f64>,
    pub prev_fast_ama: Option<f64>,
    pub prev_slow_ama: Option<f64>,

    pub rsi: Option<f64>,
    pub prev_rsi: Option<f64>,
    pub roc: Option<f64>,
    /// Trailing MACD histogram, oldest first.
    pub macd_histogram: Vec<Option<f64>>,
    pub dmi: Option<Dmi>,

    pub bollinger_width: Option<f64>,
    pub prev_bollinger_width: Option<f64>,
    pub keltner_width: Option<f64>,
    pub prev_keltner_width: Option<f64>,
    pub atr: Option<f64>,

    pub vwma: Option<f64>,
    pub obv: Option<f64>,
    pub obv_average: Option<f64>,
    pub volume: Option<VolumeProfile>,

    pub swing_structure: Option<SwingStructure>,
    pub harmonics: Vec<HarmonicMatch>,
    pub dynamic_levels: LevelProximity,
    pub touches: RecentTouch,
    pub pivot: Option<PivotLevel>,
    pub candles: CandlePatterns,
    pub breakout: Option<Breakout>,
    pub momentum: Option<PriceMomentum>,
}

fn band_width(series: &IndicatorSeries, back: usize) -> Option<f64> {
    match series.value_back(back)? {
        IndicatorValue::Bands { width, .. } => Some(*width),
        _ => None,
    }
}

fn dmi_at(series: &IndicatorSeries) -> Option<Dmi> {
    match series.last()? {
        IndicatorValue::Dmi {
            adx,
            plus_di,
            minus_di,
        } => Some(Dmi {
            adx: *adx,
            plus_di: *plus_di,
            minus_di: *minus_di,
        }),
        _ => None,
    }
}

impl IndicatorSnapshot {
    pub fn compute(instrument: &str, bars: &[Bar], config: &EngineConfig) -> Self {
        let Some(last) = bars.last() else {
            return Self::default();
        };
        let ama_cfg = &config.ama;
        let f = &config.filters;
        let s = &config.structure;

        let fast = calculate_ama(bars, ama_cfg.fast_period, ama_cfg.fast_sc, ama_cfg.slow_sc);
        let slow = calculate_ama(bars, ama_cfg.slow_period, ama_cfg.fast_sc, ama_cfg.slow_sc);
        let rsi = calculate_rsi(bars, f.rsi_period);
        let macd = calculate_macd(bars, f.macd_fast, f.macd_slow, f.macd_signal);
        let histogram = histogram_values(&macd);
        let keep = f.macd_consecutive_bars + 1;
        let macd_histogram = histogram[histogram.len().saturating_sub(keep)..].to_vec();

        let bollinger = calculate_bollinger(
            bars,
            f.bollinger_period,
            (f.bollinger_mult * 100.0).round() as u32,
        );
        let keltner =
            calculate_keltner(bars, f.keltner_period, (f.keltner_mult * 100.0).round() as u32);

        let obv_values = calculate_obv(bars).simple_values();
        let obv_average = rolling_mean_opt(&obv_values, OBV_AVERAGE_PERIOD)
            .last()
            .copied()
            .flatten();

        let swings = detect_swings(bars, s.swing_window, s.swing_window);
        let sr_buffer = pips_to_price(instrument, s.sr_buffer_pips);

        let dynamic_levels = if s.use_dynamic_sr {
            detect_dynamic_levels(bars, s.sr_lookback, s.sr_min_touches, sr_buffer)
                .proximity(last.close, sr_buffer)
        } else {
            LevelProximity::default()
        };

        let pivot = if s.use_pivots {
            prior_day(bars).and_then(|day| {
                calculate_pivots(&day, s.pivot_type)
                    .nearest_within(last.close, pips_to_price(instrument, s.pivot_buffer_pips))
                    .cloned()
            })
        } else {
            None
        };

        let snapshot = Self {
            timestamp: Some(last.timestamp),
            bar_count: bars.len(),
            close: last.close,
            prev_close: bars.len().checked_sub(2).map(|i| bars[i].close),
            fast_ama: fast.last_simple(),
            slow_ama: slow.last_simple(),
            prev_fast_ama: fast.simple_back(1),
            prev_slow_ama: slow.simple_back(1),
            rsi: rsi.last_simple(),
            prev_rsi: rsi.simple_back(1),
            roc: calculate_roc(bars, f.roc_period).last_simple(),
            macd_histogram,
            dmi: dmi_at(&calculate_adx(bars, f.adx_period)),
            bollinger_width: band_width(&bollinger, 0),
            prev_bollinger_width: band_width(&bollinger, 1),
            keltner_width: band_width(&keltner, 0),
            prev_keltner_width: band_width(&keltner, 1),
            atr: calculate_atr(bars, config.risk.atr_period).last_simple(),
            vwma: calculate_vwma(bars, f.volume_ma_period).last_simple(),
            obv: obv_values.last().copied().flatten(),
            obv_average,
            volume: analyze_volume(bars, f.volume_ma_period),
            swing_structure: if s.use_swing_points {
                swing_structure(&swings)
            } else {
                None
            },
            harmonics: if s.use_harmonics {
                detect_harmonics(&swings, s.harmonic_tolerance)
            } else {
                Vec::new()
            },
            dynamic_levels,
            touches: recent_touches(
                bars,
                s.support_lookback,
                pips_to_price(instrument, s.support_tolerance_pips),
            ),
            pivot,
            candles: detect_candles(bars),
            breakout: if s.use_breakout {
                detect_breakout(bars, s.breakout_lookback)
            } else {
                None
            },
            momentum: analyze_price_momentum(bars, s.momentum_lookback),
        };

        debug!(
            instrument,
            bars = snapshot.bar_count,
            fast_ama = ?snapshot.fast_ama,
            slow_ama = ?snapshot.slow_ama,
            rsi = ?snapshot.rsi,
            adx = ?snapshot.dmi.map(|d| d.adx),
            "indicator snapshot"
        );
        snapshot
    }

    /// |fast - slow| / slow * 100, when both AMAs are defined.
    pub fn ama_gap_percent(&self) -> Option<f64> {
        let (fast, slow) = (self.fast_ama?, self.slow_ama?);
        (slow != 0.0).then(|| (fast - slow).abs() / slow * 100.0)
    }

    /// Named scalar view used by the `analyze` command.
    pub fn values(&self) -> BTreeMap<&'static str, f64> {
        let mut map = BTreeMap::new();
        map.insert("close", self.close);
        let optional = [
            ("fast_ama", self.fast_ama),
            ("slow_ama", self.slow_ama),
            ("ama_gap_pct", self.ama_gap_percent()),
            ("rsi", self.rsi),
            ("roc", self.roc),
            ("macd_hist", self.macd_histogram.last().copied().flatten()),
            ("adx", self.dmi.map(|d| d.adx)),
            ("plus_di", self.dmi.map(|d| d.plus_di)),
            ("minus_di", self.dmi.map(|d| d.minus_di)),
            ("bollinger_width", self.bollinger_width),
            ("keltner_width", self.keltner_width),
            ("atr", self.atr),
            ("vwma", self.vwma),
            ("obv", self.obv),
            ("volume_ratio", self.volume.as_ref().map(|v| v.ratio)),
            ("momentum_strength", self.momentum.as_ref().map(|m| m.strength)),
        ];
        for (name, value) in optional {
            if let Some(v) = value {
                map.insert(name, v);
            }
        }
        map
    }
}
