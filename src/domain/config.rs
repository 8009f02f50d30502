//! Typed engine configuration.
//!
//! Built once at startup from a [`ConfigPort`]. Every option has a default;
//! values outside their valid range are clamped with a warning instead of
//! failing startup.

use std::fmt;
use std::time::Duration;

use tracing::warn;

use crate::domain::structure::pivot::PivotType;
use crate::domain::timeframe::Timeframe;
use crate::ports::config_port::ConfigPort;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub instruments: Vec<String>,
    /// Bars requested per fetch.
    pub bar_count: usize,
    /// Bars retained per instrument window.
    pub window_length: usize,
    pub cycle_interval: Duration,
    /// Offset of the session clock from UTC, in minutes (US/Eastern standard is -300).
    pub utc_offset_minutes: i32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            instruments: vec!["EURUSD".to_string()],
            bar_count: 300,
            window_length: 500,
            cycle_interval: Duration::from_secs(60),
            utc_offset_minutes: -300,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AmaConfig {
    pub fast_period: usize,
    pub slow_period: usize,
    pub fast_sc: usize,
    pub slow_sc: usize,
    pub min_gap_percent: f64,
}

impl Default for AmaConfig {
    fn default() -> Self {
        Self {
            fast_period: 50,
            slow_period: 200,
            fast_sc: 2,
            slow_sc: 30,
            min_gap_percent: 0.05,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterConfig {
    pub momentum_enabled: bool,
    pub trend_enabled: bool,
    pub volatility_enabled: bool,
    pub quorum: usize,

    pub use_rsi: bool,
    pub rsi_period: usize,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub use_roc: bool,
    pub roc_period: usize,
    pub roc_threshold: f64,
    pub use_macd: bool,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub macd_growing_factor: f64,
    pub macd_consecutive_bars: usize,
    pub macd_zero_cross: bool,

    pub adx_period: usize,
    pub adx_threshold: f64,
    pub adx_strong: f64,
    pub di_alignment: bool,

    pub volume_ma_period: usize,
    pub min_volume_ratio: f64,
    pub keltner_period: usize,
    pub keltner_mult: f64,
    pub bollinger_period: usize,
    pub bollinger_mult: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            momentum_enabled: true,
            trend_enabled: true,
            volatility_enabled: true,
            quorum: 2,
            use_rsi: true,
            rsi_period: 14,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            use_roc: true,
            roc_period: 14,
            roc_threshold: 0.0,
            use_macd: true,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            macd_growing_factor: 1.05,
            macd_consecutive_bars: 3,
            macd_zero_cross: true,
            adx_period: 14,
            adx_threshold: 20.0,
            adx_strong: 40.0,
            di_alignment: true,
            volume_ma_period: 20,
            min_volume_ratio: 1.2,
            keltner_period: 20,
            keltner_mult: 2.0,
            bollinger_period: 20,
            bollinger_mult: 2.0,
        }
    }
}

impl FilterConfig {
    /// Volatility only votes alongside momentum.
    pub fn volatility_active(&self) -> bool {
        self.volatility_enabled && self.momentum_enabled
    }

    pub fn enabled_count(&self) -> usize {
        [self.momentum_enabled, self.trend_enabled, self.volatility_active()]
            .iter()
            .filter(|on| **on)
            .count()
    }

    pub fn effective_quorum(&self) -> usize {
        self.quorum.min(self.enabled_count())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructureConfig {
    pub use_swing_points: bool,
    pub swing_window: usize,
    pub use_dynamic_sr: bool,
    pub sr_lookback: usize,
    pub sr_min_touches: usize,
    pub sr_buffer_pips: f64,
    pub support_lookback: usize,
    pub support_tolerance_pips: f64,
    pub use_pivots: bool,
    pub pivot_type: PivotType,
    pub pivot_buffer_pips: f64,
    pub use_harmonics: bool,
    pub harmonic_tolerance: f64,
    pub use_breakout: bool,
    pub breakout_lookback: usize,
    pub momentum_lookback: usize,
}

impl Default for StructureConfig {
    fn default() -> Self {
        Self {
            use_swing_points: true,
            swing_window: 3,
            use_dynamic_sr: true,
            sr_lookback: 50,
            sr_min_touches: 2,
            sr_buffer_pips: 3.0,
            support_lookback: 20,
            support_tolerance_pips: 5.0,
            use_pivots: true,
            pivot_type: PivotType::Standard,
            pivot_buffer_pips: 2.0,
            use_harmonics: true,
            harmonic_tolerance: 0.05,
            use_breakout: true,
            breakout_lookback: 20,
            momentum_lookback: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MtfConfig {
    pub enabled: bool,
    pub agreement_threshold: f64,
}

impl Default for MtfConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            agreement_threshold: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskConfig {
    pub risk_percent: f64,
    pub min_lot: f64,
    pub max_lot: f64,
    pub lot_step: f64,
    pub tp_multiplier: f64,
    pub min_sl_pips: f64,
    pub max_sl_pips: f64,
    pub atr_period: usize,
    pub sl_atr_factor: f64,
    pub default_sl_pips: f64,
    pub swing_lookback: usize,
    pub max_leverage: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            risk_percent: 1.0,
            min_lot: 0.01,
            max_lot: 10.0,
            lot_step: 0.01,
            tp_multiplier: 2.0,
            min_sl_pips: 10.0,
            max_sl_pips: 100.0,
            atr_period: 14,
            sl_atr_factor: 1.5,
            default_sl_pips: 20.0,
            swing_lookback: 5,
            max_leverage: 30.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub base_timeframe: Timeframe,
    pub overlap_lot_multiplier: f64,
    pub overlap_risk_multiplier: f64,
    pub overlap_max_spread_pips: f64,
    pub regular_max_spread_pips: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_timeframe: Timeframe::M5,
            overlap_lot_multiplier: 1.2,
            overlap_risk_multiplier: 1.2,
            overlap_max_spread_pips: 1.5,
            regular_max_spread_pips: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GovernorConfig {
    pub daily_profit_target: f64,
    /// Negative account-currency amount.
    pub daily_max_loss: f64,
    /// Negative percentage from the highest balance.
    pub max_drawdown_percent: f64,
    pub evaluation_days: u32,
    pub evaluation_risk_factor: f64,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            daily_profit_target: 50.0,
            daily_max_loss: -30.0,
            max_drawdown_percent: -10.0,
            evaluation_days: 5,
            evaluation_risk_factor: 0.75,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    pub cooldown: Duration,
    pub max_price_deviation_pips: f64,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub slippage_points: u32,
    pub magic: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(60),
            max_price_deviation_pips: 5.0,
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            slippage_points: 100,
            magic: 123_456,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionConfig {
    pub check_interval: Duration,
    pub max_attempts: u32,
    pub backoff: Vec<Duration>,
    pub history_len: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(300),
            max_attempts: 5,
            backoff: [10, 30, 60, 120, 300]
                .into_iter()
                .map(Duration::from_secs)
                .collect(),
            history_len: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExitConfig {
    pub trailing_enabled: bool,
    pub trailing_activation_pips: f64,
    pub trailing_distance_pips: f64,
    pub dynamic_tp_enabled: bool,
    pub dynamic_tp_atr_multiplier: f64,
    pub atr_period: usize,
    pub check_interval: Duration,
}

impl Default for ExitConfig {
    fn default() -> Self {
        Self {
            trailing_enabled: true,
            trailing_activation_pips: 15.0,
            trailing_distance_pips: 10.0,
            dynamic_tp_enabled: true,
            dynamic_tp_atr_multiplier: 3.0,
            atr_period: 14,
            check_interval: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineConfig {
    pub engine: EngineSettings,
    pub ama: AmaConfig,
    pub filters: FilterConfig,
    pub structure: StructureConfig,
    pub mtf: MtfConfig,
    pub risk: RiskConfig,
    pub session: SessionConfig,
    pub governor: GovernorConfig,
    pub execution: ExecutionConfig,
    pub connection: ConnectionConfig,
    pub exits: ExitConfig,
}

fn float_in(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
    min: f64,
    max: f64,
) -> f64 {
    let value = config.get_double(section, key, default);
    if !value.is_finite() {
        warn!(section, key, value, default, "non-finite config value replaced by default");
        return default;
    }
    let clamped = value.clamp(min, max);
    if clamped != value {
        warn!(section, key, value, clamped, "config value out of range, clamped");
    }
    clamped
}

fn int_in(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
    min: i64,
    max: i64,
) -> i64 {
    let value = config.get_int(section, key, default);
    let clamped = value.clamp(min, max);
    if clamped != value {
        warn!(section, key, value, clamped, "config value out of range, clamped");
    }
    clamped
}

fn usize_in(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
    min: usize,
    max: usize,
) -> usize {
    int_in(config, section, key, default as i64, min as i64, max as i64) as usize
}

fn secs_in(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: Duration,
    min: u64,
    max: u64,
) -> Duration {
    let secs = int_in(
        config,
        section,
        key,
        default.as_secs() as i64,
        min as i64,
        max as i64,
    );
    Duration::from_secs(secs as u64)
}

fn parsed_or<T: std::str::FromStr + fmt::Display + Copy>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: T,
) -> T {
    match config.get_string(section, key) {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(section, key, value = %raw, %default, "unrecognised config value, using default");
            default
        }),
    }
}

/// Raises an engine history length to the bars the slow AMA needs.
fn at_least(key: &str, value: usize, min: usize) -> usize {
    if value < min {
        warn!(
            section = "engine",
            key,
            value,
            clamped = min,
            "history shorter than slow AMA period, raised"
        );
        min
    } else {
        value
    }
}

fn parse_instruments(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_ascii_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

impl EngineConfig {
    pub fn load(config: &dyn ConfigPort) -> Self {
        let d = EngineConfig::default();

        let instruments = config
            .get_string("engine", "instruments")
            .map(|raw| parse_instruments(&raw))
            .filter(|list| !list.is_empty())
            .unwrap_or_else(|| d.engine.instruments.clone());
        let fast_period = usize_in(config, "ama", "fast_period", d.ama.fast_period, 2, 500);
        let slow_period = usize_in(config, "ama", "slow_period", d.ama.slow_period, 2, 1_000);
        let slow_period = if slow_period <= fast_period {
            warn!(
                fast_period,
                slow_period,
                "ama slow period must exceed fast period, using defaults"
            );
            d.ama.slow_period.max(fast_period + 1)
        } else {
            slow_period
        };
        let ama = AmaConfig {
            fast_period,
            slow_period,
            fast_sc: usize_in(config, "ama", "fast_sc", d.ama.fast_sc, 1, 100),
            slow_sc: usize_in(config, "ama", "slow_sc", d.ama.slow_sc, 2, 200),
            min_gap_percent: float_in(
                config,
                "ama",
                "min_gap_percent",
                d.ama.min_gap_percent,
                0.0,
                10.0,
            ),
        };

        let min_bars = ama.slow_period + 1;

        let engine = EngineSettings {
            instruments,
            bar_count: at_least(
                "bar_count",
                usize_in(config, "engine", "bar_count", d.engine.bar_count, 50, 10_000),
                min_bars,
            ),
            window_length: at_least(
                "window_length",
                usize_in(
                    config,
                    "engine",
                    "window_length",
                    d.engine.window_length,
                    50,
                    20_000,
                ),
                min_bars,
            ),
            cycle_interval: secs_in(
                config,
                "engine",
                "cycle_interval_secs",
                d.engine.cycle_interval,
                1,
                3_600,
            ),
            utc_offset_minutes: int_in(
                config,
                "engine",
                "utc_offset_minutes",
                d.engine.utc_offset_minutes as i64,
                -14 * 60,
                14 * 60,
            ) as i32,
        };

        let f = &d.filters;
        let filters = FilterConfig {
            momentum_enabled: config.get_bool("filters", "momentum_enabled", f.momentum_enabled),
            trend_enabled: config.get_bool("filters", "trend_enabled", f.trend_enabled),
            volatility_enabled: config.get_bool(
                "filters",
                "volatility_enabled",
                f.volatility_enabled,
            ),
            quorum: usize_in(config, "filters", "quorum", f.quorum, 0, 3),
            use_rsi: config.get_bool("filters", "use_rsi", f.use_rsi),
            rsi_period: usize_in(config, "filters", "rsi_period", f.rsi_period, 2, 200),
            rsi_overbought: float_in(
                config,
                "filters",
                "rsi_overbought",
                f.rsi_overbought,
                50.0,
                100.0,
            ),
            rsi_oversold: float_in(config, "filters", "rsi_oversold", f.rsi_oversold, 0.0, 50.0),
            use_roc: config.get_bool("filters", "use_roc", f.use_roc),
            roc_period: usize_in(config, "filters", "roc_period", f.roc_period, 1, 200),
            roc_threshold: float_in(
                config,
                "filters",
                "roc_threshold",
                f.roc_threshold,
                0.0,
                100.0,
            ),
            use_macd: config.get_bool("filters", "use_macd", f.use_macd),
            macd_fast: usize_in(config, "filters", "macd_fast", f.macd_fast, 1, 200),
            macd_slow: usize_in(config, "filters", "macd_slow", f.macd_slow, 2, 400),
            macd_signal: usize_in(config, "filters", "macd_signal", f.macd_signal, 1, 200),
            macd_growing_factor: float_in(
                config,
                "filters",
                "macd_growing_factor",
                f.macd_growing_factor,
                1.0,
                3.0,
            ),
            macd_consecutive_bars: usize_in(
                config,
                "filters",
                "macd_consecutive_bars",
                f.macd_consecutive_bars,
                2,
                10,
            ),
            macd_zero_cross: config.get_bool("filters", "macd_zero_cross", f.macd_zero_cross),
            adx_period: usize_in(config, "filters", "adx_period", f.adx_period, 2, 200),
            adx_threshold: float_in(
                config,
                "filters",
                "adx_threshold",
                f.adx_threshold,
                0.0,
                100.0,
            ),
            adx_strong: float_in(config, "filters", "adx_strong", f.adx_strong, 0.0, 100.0),
            di_alignment: config.get_bool("filters", "di_alignment", f.di_alignment),
            volume_ma_period: usize_in(
                config,
                "filters",
                "volume_ma_period",
                f.volume_ma_period,
                2,
                500,
            ),
            min_volume_ratio: float_in(
                config,
                "filters",
                "min_volume_ratio",
                f.min_volume_ratio,
                0.0,
                10.0,
            ),
            keltner_period: usize_in(config, "filters", "keltner_period", f.keltner_period, 2, 500),
            keltner_mult: float_in(config, "filters", "keltner_mult", f.keltner_mult, 0.1, 10.0),
            bollinger_period: usize_in(
                config,
                "filters",
                "bollinger_period",
                f.bollinger_period,
                2,
                500,
            ),
            bollinger_mult: float_in(
                config,
                "filters",
                "bollinger_mult",
                f.bollinger_mult,
                0.1,
                10.0,
            ),
        };

        let s = &d.structure;
        let structure = StructureConfig {
            use_swing_points: config.get_bool("structure", "use_swing_points", s.use_swing_points),
            swing_window: usize_in(config, "structure", "swing_window", s.swing_window, 1, 20),
            use_dynamic_sr: config.get_bool("structure", "use_dynamic_sr", s.use_dynamic_sr),
            sr_lookback: usize_in(config, "structure", "sr_lookback", s.sr_lookback, 5, 1_000),
            sr_min_touches: usize_in(
                config,
                "structure",
                "sr_min_touches",
                s.sr_min_touches,
                1,
                20,
            ),
            sr_buffer_pips: float_in(
                config,
                "structure",
                "sr_buffer_pips",
                s.sr_buffer_pips,
                0.1,
                100.0,
            ),
            support_lookback: usize_in(
                config,
                "structure",
                "support_lookback",
                s.support_lookback,
                3,
                500,
            ),
            support_tolerance_pips: float_in(
                config,
                "structure",
                "support_tolerance_pips",
                s.support_tolerance_pips,
                0.1,
                100.0,
            ),
            use_pivots: config.get_bool("structure", "use_pivots", s.use_pivots),
            pivot_type: parsed_or(config, "structure", "pivot_type", s.pivot_type),
            pivot_buffer_pips: float_in(
                config,
                "structure",
                "pivot_buffer_pips",
                s.pivot_buffer_pips,
                0.1,
                100.0,
            ),
            use_harmonics: config.get_bool("structure", "use_harmonics", s.use_harmonics),
            harmonic_tolerance: float_in(
                config,
                "structure",
                "harmonic_tolerance",
                s.harmonic_tolerance,
                0.001,
                0.5,
            ),
            use_breakout: config.get_bool("structure", "use_breakout", s.use_breakout),
            breakout_lookback: usize_in(
                config,
                "structure",
                "breakout_lookback",
                s.breakout_lookback,
                5,
                500,
            ),
            momentum_lookback: usize_in(
                config,
                "structure",
                "momentum_lookback",
                s.momentum_lookback,
                2,
                100,
            ),
        };

        let mtf = MtfConfig {
            enabled: config.get_bool("mtf", "enabled", d.mtf.enabled),
            agreement_threshold: float_in(
                config,
                "mtf",
                "agreement_threshold",
                d.mtf.agreement_threshold,
                0.0,
                1.0,
            ),
        };

        let r = &d.risk;
        let min_lot = float_in(config, "risk", "min_lot", r.min_lot, 0.01, 100.0);
        let max_lot = float_in(config, "risk", "max_lot", r.max_lot, min_lot, 100.0);
        let min_sl_pips = float_in(config, "risk", "min_sl_pips", r.min_sl_pips, 1.0, 500.0);
        let risk = RiskConfig {
            risk_percent: float_in(config, "risk", "risk_percent", r.risk_percent, 0.1, 5.0),
            min_lot,
            max_lot,
            lot_step: float_in(config, "risk", "lot_step", r.lot_step, 0.01, 1.0),
            tp_multiplier: float_in(config, "risk", "tp_multiplier", r.tp_multiplier, 0.5, 10.0),
            min_sl_pips,
            max_sl_pips: float_in(config, "risk", "max_sl_pips", r.max_sl_pips, min_sl_pips, 500.0),
            atr_period: usize_in(config, "risk", "atr_period", r.atr_period, 2, 200),
            sl_atr_factor: float_in(config, "risk", "sl_atr_factor", r.sl_atr_factor, 0.1, 10.0),
            default_sl_pips: float_in(
                config,
                "risk",
                "default_sl_pips",
                r.default_sl_pips,
                5.0,
                500.0,
            ),
            swing_lookback: usize_in(config, "risk", "swing_lookback", r.swing_lookback, 2, 100),
            max_leverage: float_in(config, "risk", "max_leverage", r.max_leverage, 1.0, 500.0),
        };

        let se = &d.session;
        let session = SessionConfig {
            base_timeframe: parsed_or(config, "session", "base_timeframe", se.base_timeframe),
            overlap_lot_multiplier: float_in(
                config,
                "session",
                "overlap_lot_multiplier",
                se.overlap_lot_multiplier,
                0.1,
                5.0,
            ),
            overlap_risk_multiplier: float_in(
                config,
                "session",
                "overlap_risk_multiplier",
                se.overlap_risk_multiplier,
                0.1,
                5.0,
            ),
            overlap_max_spread_pips: float_in(
                config,
                "session",
                "overlap_max_spread_pips",
                se.overlap_max_spread_pips,
                0.1,
                50.0,
            ),
            regular_max_spread_pips: float_in(
                config,
                "session",
                "regular_max_spread_pips",
                se.regular_max_spread_pips,
                0.1,
                50.0,
            ),
        };

        let g = &d.governor;
        let governor = GovernorConfig {
            daily_profit_target: float_in(
                config,
                "governor",
                "daily_profit_target",
                g.daily_profit_target,
                0.0,
                1e9,
            ),
            daily_max_loss: float_in(
                config,
                "governor",
                "daily_max_loss",
                g.daily_max_loss,
                -1e9,
                0.0,
            ),
            max_drawdown_percent: float_in(
                config,
                "governor",
                "max_drawdown_percent",
                g.max_drawdown_percent,
                -100.0,
                0.0,
            ),
            evaluation_days: int_in(
                config,
                "governor",
                "evaluation_days",
                g.evaluation_days as i64,
                0,
                365,
            ) as u32,
            evaluation_risk_factor: float_in(
                config,
                "governor",
                "evaluation_risk_factor",
                g.evaluation_risk_factor,
                0.1,
                1.0,
            ),
        };

        let e = &d.execution;
        let execution = ExecutionConfig {
            cooldown: secs_in(config, "execution", "cooldown_secs", e.cooldown, 0, 86_400),
            max_price_deviation_pips: float_in(
                config,
                "execution",
                "max_price_deviation_pips",
                e.max_price_deviation_pips,
                0.1,
                100.0,
            ),
            max_retries: int_in(
                config,
                "execution",
                "max_retries",
                e.max_retries as i64,
                1,
                10,
            ) as u32,
            retry_delay: Duration::from_millis(int_in(
                config,
                "execution",
                "retry_delay_ms",
                e.retry_delay.as_millis() as i64,
                0,
                60_000,
            ) as u64),
            slippage_points: int_in(
                config,
                "execution",
                "slippage_points",
                e.slippage_points as i64,
                0,
                1_000,
            ) as u32,
            magic: int_in(config, "execution", "magic", e.magic as i64, 0, i64::MAX) as u64,
        };

        let c = &d.connection;
        let backoff = config
            .get_string("connection", "backoff_secs")
            .map(|raw| {
                raw.split(',')
                    .filter_map(|s| s.trim().parse::<u64>().ok())
                    .map(Duration::from_secs)
                    .collect::<Vec<_>>()
            })
            .filter(|list| !list.is_empty())
            .unwrap_or_else(|| c.backoff.clone());
        let connection = ConnectionConfig {
            check_interval: secs_in(
                config,
                "connection",
                "check_interval_secs",
                c.check_interval,
                5,
                86_400,
            ),
            max_attempts: int_in(
                config,
                "connection",
                "max_attempts",
                c.max_attempts as i64,
                1,
                50,
            ) as u32,
            backoff,
            history_len: usize_in(config, "connection", "history_len", c.history_len, 1, 10_000),
        };

        let x = &d.exits;
        let exits = ExitConfig {
            trailing_enabled: config.get_bool("exits", "trailing_enabled", x.trailing_enabled),
            trailing_activation_pips: float_in(
                config,
                "exits",
                "trailing_activation_pips",
                x.trailing_activation_pips,
                1.0,
                1_000.0,
            ),
            trailing_distance_pips: float_in(
                config,
                "exits",
                "trailing_distance_pips",
                x.trailing_distance_pips,
                1.0,
                1_000.0,
            ),
            dynamic_tp_enabled: config.get_bool(
                "exits",
                "dynamic_tp_enabled",
                x.dynamic_tp_enabled,
            ),
            dynamic_tp_atr_multiplier: float_in(
                config,
                "exits",
                "dynamic_tp_atr_multiplier",
                x.dynamic_tp_atr_multiplier,
                0.5,
                20.0,
            ),
            atr_period: usize_in(config, "exits", "atr_period", x.atr_period, 2, 200),
            check_interval: secs_in(
                config,
                "exits",
                "check_interval_secs",
                x.check_interval,
                1,
                3_600,
            ),
        };

        EngineConfig {
            engine,
            ama,
            filters,
            structure,
            mtf,
            risk,
            session,
            governor,
            execution,
            connection,
            exits,
        }
    }
}

impl fmt::Display for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let e = &self.engine;
        writeln!(f, "[engine]")?;
        writeln!(f, "instruments = {}", e.instruments.join(","))?;
        writeln!(f, "bar_count = {}", e.bar_count)?;
        writeln!(f, "window_length = {}", e.window_length)?;
        writeln!(f, "cycle_interval_secs = {}", e.cycle_interval.as_secs())?;
        writeln!(f, "utc_offset_minutes = {}", e.utc_offset_minutes)?;

        let a = &self.ama;
        writeln!(f, "\n[ama]")?;
        writeln!(f, "fast_period = {}", a.fast_period)?;
        writeln!(f, "slow_period = {}", a.slow_period)?;
        writeln!(f, "fast_sc = {}", a.fast_sc)?;
        writeln!(f, "slow_sc = {}", a.slow_sc)?;
        writeln!(f, "min_gap_percent = {}", a.min_gap_percent)?;

        let fl = &self.filters;
        writeln!(f, "\n[filters]")?;
        writeln!(f, "momentum_enabled = {}", fl.momentum_enabled)?;
        writeln!(f, "trend_enabled = {}", fl.trend_enabled)?;
        writeln!(f, "volatility_enabled = {}", fl.volatility_enabled)?;
        writeln!(f, "quorum = {}", fl.quorum)?;
        writeln!(
            f,
            "rsi = {} ({}, {}/{})",
            fl.use_rsi, fl.rsi_period, fl.rsi_oversold, fl.rsi_overbought
        )?;
        writeln!(f, "roc = {} ({}, threshold {})", fl.use_roc, fl.roc_period, fl.roc_threshold)?;
        writeln!(
            f,
            "macd = {} ({},{},{}, growing x{}, {} bars, zero cross {})",
            fl.use_macd,
            fl.macd_fast,
            fl.macd_slow,
            fl.macd_signal,
            fl.macd_growing_factor,
            fl.macd_consecutive_bars,
            fl.macd_zero_cross
        )?;
        writeln!(
            f,
            "adx = {} threshold {} strong {} di_alignment {}",
            fl.adx_period, fl.adx_threshold, fl.adx_strong, fl.di_alignment
        )?;
        writeln!(f, "volume = ma {} min ratio {}", fl.volume_ma_period, fl.min_volume_ratio)?;
        writeln!(f, "keltner = {} x{}", fl.keltner_period, fl.keltner_mult)?;
        writeln!(f, "bollinger = {} x{}", fl.bollinger_period, fl.bollinger_mult)?;

        let s = &self.structure;
        writeln!(f, "\n[structure]")?;
        writeln!(f, "swing = {} window {}", s.use_swing_points, s.swing_window)?;
        writeln!(
            f,
            "dynamic_sr = {} lookback {} touches {} buffer {} pips",
            s.use_dynamic_sr, s.sr_lookback, s.sr_min_touches, s.sr_buffer_pips
        )?;
        writeln!(
            f,
            "pivots = {} {} buffer {} pips",
            s.use_pivots, s.pivot_type, s.pivot_buffer_pips
        )?;
        writeln!(f, "harmonics = {} tolerance {}", s.use_harmonics, s.harmonic_tolerance)?;
        writeln!(f, "breakout = {} lookback {}", s.use_breakout, s.breakout_lookback)?;
        writeln!(f, "momentum_lookback = {}", s.momentum_lookback)?;

        writeln!(f, "\n[mtf]")?;
        writeln!(f, "enabled = {}", self.mtf.enabled)?;
        writeln!(f, "agreement_threshold = {}", self.mtf.agreement_threshold)?;

        let r = &self.risk;
        writeln!(f, "\n[risk]")?;
        writeln!(f, "risk_percent = {}", r.risk_percent)?;
        writeln!(f, "lots = {}..{} step {}", r.min_lot, r.max_lot, r.lot_step)?;
        writeln!(
            f,
            "sl_pips = {}..{} default {}",
            r.min_sl_pips, r.max_sl_pips, r.default_sl_pips
        )?;
        writeln!(f, "sl_atr = period {} x{}", r.atr_period, r.sl_atr_factor)?;
        writeln!(f, "tp_multiplier = {}", r.tp_multiplier)?;
        writeln!(f, "max_leverage = {}", r.max_leverage)?;

        let se = &self.session;
        writeln!(f, "\n[session]")?;
        writeln!(f, "base_timeframe = {}", se.base_timeframe)?;
        writeln!(
            f,
            "overlap = lot x{} risk x{} max spread {} pips",
            se.overlap_lot_multiplier, se.overlap_risk_multiplier, se.overlap_max_spread_pips
        )?;
        writeln!(f, "regular_max_spread_pips = {}", se.regular_max_spread_pips)?;

        let g = &self.governor;
        writeln!(f, "\n[governor]")?;
        writeln!(f, "daily_profit_target = {}", g.daily_profit_target)?;
        writeln!(f, "daily_max_loss = {}", g.daily_max_loss)?;
        writeln!(f, "max_drawdown_percent = {}", g.max_drawdown_percent)?;
        writeln!(
            f,
            "evaluation = {} days x{}",
            g.evaluation_days, g.evaluation_risk_factor
        )?;

        let ex = &self.execution;
        writeln!(f, "\n[execution]")?;
        writeln!(f, "cooldown_secs = {}", ex.cooldown.as_secs())?;
        writeln!(f, "max_price_deviation_pips = {}", ex.max_price_deviation_pips)?;
        writeln!(f, "max_retries = {}", ex.max_retries)?;
        writeln!(f, "retry_delay_ms = {}", ex.retry_delay.as_millis())?;
        writeln!(f, "slippage_points = {}", ex.slippage_points)?;
        writeln!(f, "magic = {}", ex.magic)?;

        let c = &self.connection;
        let backoff: Vec<String> = c.backoff.iter().map(|d| d.as_secs().to_string()).collect();
        writeln!(f, "\n[connection]")?;
        writeln!(f, "check_interval_secs = {}", c.check_interval.as_secs())?;
        writeln!(f, "max_attempts = {}", c.max_attempts)?;
        writeln!(f, "backoff_secs = {}", backoff.join(","))?;
        writeln!(f, "history_len = {}", c.history_len)?;

        let x = &self.exits;
        writeln!(f, "\n[exits]")?;
        writeln!(
            f,
            "trailing = {} activation {} pips distance {} pips",
            x.trailing_enabled, x.trailing_activation_pips, x.trailing_distance_pips
        )?;
        writeln!(
            f,
            "dynamic_tp = {} atr {} x{}",
            x.dynamic_tp_enabled, x.atr_period, x.dynamic_tp_atr_multiplier
        )?;
        write!(f, "check_interval_secs = {}", x.check_interval.as_secs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn load(ini: &str) -> EngineConfig {
        EngineConfig::load(&FileConfigAdapter::from_string(ini).unwrap())
    }

    #[test]
    fn empty_config_uses_defaults() {
        assert_eq!(load(""), EngineConfig::default());
    }

    #[test]
    fn values_are_read() {
        let cfg = load(concat!(
            "[engine]\ninstruments = eurusd, usdjpy\n\n",
            "[ama]\nmin_gap_percent = 0.1\n\n",
            "[session]\nbase_timeframe = M15\n",
        ));
        assert_eq!(cfg.engine.instruments, vec!["EURUSD", "USDJPY"]);
        assert!((cfg.ama.min_gap_percent - 0.1).abs() < f64::EPSILON);
        assert_eq!(cfg.session.base_timeframe, Timeframe::M15);
    }

    #[test]
    fn out_of_range_values_clamped() {
        let cfg = load("[risk]\nrisk_percent = 12\nmax_lot = 500\n\n[filters]\nquorum = 9\n");
        assert!((cfg.risk.risk_percent - 5.0).abs() < f64::EPSILON);
        assert!((cfg.risk.max_lot - 100.0).abs() < f64::EPSILON);
        assert_eq!(cfg.filters.quorum, 3);
    }

    #[test]
    fn bad_enum_strings_fall_back() {
        let cfg = load("[structure]\npivot_type = lunar\n\n[session]\nbase_timeframe = M7\n");
        assert_eq!(cfg.structure.pivot_type, PivotType::Standard);
        assert_eq!(cfg.session.base_timeframe, Timeframe::M5);
    }

    #[test]
    fn history_raised_to_slow_period() {
        let cfg = load("[engine]\nwindow_length = 150\nbar_count = 120\n");
        assert_eq!(cfg.engine.window_length, 201);
        assert_eq!(cfg.engine.bar_count, 201);

        let cfg = load("[engine]\nwindow_length = 150\n\n[ama]\nslow_period = 100\n");
        assert_eq!(cfg.engine.window_length, 150);
    }

    #[test]
    fn slow_period_must_exceed_fast() {
        let cfg = load("[ama]\nfast_period = 100\nslow_period = 50\n");
        assert_eq!(cfg.ama.fast_period, 100);
        assert!(cfg.ama.slow_period > 100);
    }

    #[test]
    fn backoff_list_parsed() {
        let cfg = load("[connection]\nbackoff_secs = 5, 15 ,x, 45\n");
        assert_eq!(
            cfg.connection.backoff,
            vec![
                Duration::from_secs(5),
                Duration::from_secs(15),
                Duration::from_secs(45)
            ]
        );
    }

    #[test]
    fn quorum_clamped_to_enabled_filters() {
        let mut filters = FilterConfig::default();
        filters.momentum_enabled = false;
        // volatility depends on momentum, so only trend remains
        assert_eq!(filters.enabled_count(), 1);
        assert_eq!(filters.effective_quorum(), 1);
    }

    #[test]
    fn display_lists_every_section() {
        let text = EngineConfig::default().to_string();
        for section in [
            "[engine]",
            "[ama]",
            "[filters]",
            "[structure]",
            "[mtf]",
            "[risk]",
            "[session]",
            "[governor]",
            "[execution]",
            "[connection]",
            "[exits]",
        ] {
            assert!(text.contains(section), "missing {section}");
        }
    }
}
