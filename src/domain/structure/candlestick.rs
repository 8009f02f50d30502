//! Single, double and triple candle pattern flags.

use crate::domain::ohlcv::Bar;

pub const DOJI_BODY_RATIO: f64 = 0.1;
const SMALL_BODY_RATIO: f64 = 0.3;

pub fn is_doji(bar: &Bar) -> bool {
    let range = bar.range();
    range > 0.0 && bar.body() / range <= DOJI_BODY_RATIO
}

/// Small body near the top with a lower shadow at least twice the body.
/// With `bullish_only` the candle must also close above its open.
pub fn is_hammer(bar: &Bar, bullish_only: bool) -> bool {
    let (body, range) = (bar.body(), bar.range());
    if range == 0.0 || body == 0.0 || body / range > SMALL_BODY_RATIO {
        return false;
    }
    if bar.lower_shadow() < body * 2.0 || bar.upper_shadow() > body {
        return false;
    }
    !bullish_only || bar.is_bullish()
}

pub fn is_shooting_star(bar: &Bar) -> bool {
    let (body, range) = (bar.body(), bar.range());
    if range == 0.0 || body == 0.0 || body / range > SMALL_BODY_RATIO {
        return false;
    }
    bar.upper_shadow() >= body * 2.0 && bar.lower_shadow() <= body
}

pub fn is_bullish_engulfing(prev: &Bar, curr: &Bar) -> bool {
    prev.is_bearish() && curr.is_bullish() && curr.open < prev.close && curr.close > prev.open
}

pub fn is_bearish_engulfing(prev: &Bar, curr: &Bar) -> bool {
    prev.is_bullish() && curr.is_bearish() && curr.open > prev.close && curr.close < prev.open
}

pub fn is_piercing_line(prev: &Bar, curr: &Bar) -> bool {
    let midpoint = (prev.open + prev.close) / 2.0;
    prev.is_bearish() && curr.is_bullish() && curr.open < prev.close && curr.close > midpoint
}

pub fn is_dark_cloud_cover(prev: &Bar, curr: &Bar) -> bool {
    let midpoint = (prev.open + prev.close) / 2.0;
    prev.is_bullish() && curr.is_bearish() && curr.open > prev.close && curr.close < midpoint
}

pub fn is_inside_bar(prev: &Bar, curr: &Bar) -> bool {
    curr.high < prev.high && curr.low > prev.low
}

pub fn is_outside_bar(prev: &Bar, curr: &Bar) -> bool {
    curr.high > prev.high && curr.low < prev.low
}

/// Last three bars each bullish, each opening and closing above the bar before.
pub fn is_three_white_soldiers(bars: &[Bar]) -> bool {
    bars.len() >= 4
        && bars[bars.len() - 4..].windows(2).all(|w| {
            w[1].is_bullish() && w[1].close > w[0].close && w[1].open > w[0].open
        })
}

pub fn is_three_black_crows(bars: &[Bar]) -> bool {
    bars.len() >= 4
        && bars[bars.len() - 4..].windows(2).all(|w| {
            w[1].is_bearish() && w[1].close < w[0].close && w[1].open < w[0].open
        })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CandlePatterns {
    pub doji: bool,
    pub hammer: bool,
    pub shooting_star: bool,
    pub bullish_engulfing: bool,
    pub bearish_engulfing: bool,
    pub piercing_line: bool,
    pub dark_cloud_cover: bool,
    pub three_white_soldiers: bool,
    pub three_black_crows: bool,
    pub inside_bar: bool,
    pub outside_bar: bool,
}

impl CandlePatterns {
    /// Two-candle bullish reversal: engulfing or piercing line.
    pub fn bullish_reversal(&self) -> bool {
        self.bullish_engulfing || self.piercing_line
    }

    pub fn bearish_reversal(&self) -> bool {
        self.bearish_engulfing || self.dark_cloud_cover
    }
}

pub fn detect_candles(bars: &[Bar]) -> CandlePatterns {
    let Some(curr) = bars.last() else {
        return CandlePatterns::default();
    };
    let mut patterns = CandlePatterns {
        doji: is_doji(curr),
        hammer: is_hammer(curr, true),
        shooting_star: is_shooting_star(curr),
        ..CandlePatterns::default()
    };

    if bars.len() >= 2 {
        let prev = &bars[bars.len() - 2];
        patterns.bullish_engulfing = is_bullish_engulfing(prev, curr);
        patterns.bearish_engulfing = is_bearish_engulfing(prev, curr);
        patterns.piercing_line = is_piercing_line(prev, curr);
        patterns.dark_cloud_cover = is_dark_cloud_cover(prev, curr);
        patterns.inside_bar = is_inside_bar(prev, curr);
        patterns.outside_bar = is_outside_bar(prev, curr);
    }
    patterns.three_white_soldiers = is_three_white_soldiers(bars);
    patterns.three_black_crows = is_three_black_crows(bars);

    patterns
}
