//! Instrument metadata and pip arithmetic.

/// Venue-provided contract metadata for one instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolInfo {
    pub instrument: String,
    pub point: f64,
    pub digits: u32,
    pub contract_size: f64,
    pub volume_min: f64,
    pub volume_max: f64,
    pub volume_step: f64,
}

impl SymbolInfo {
    /// Standard five-digit forex metadata (three digits for JPY quotes).
    pub fn forex(instrument: &str) -> Self {
        let jpy = is_jpy(instrument);
        Self {
            instrument: instrument.to_string(),
            point: if jpy { 0.001 } else { 0.00001 },
            digits: if jpy { 3 } else { 5 },
            contract_size: 100_000.0,
            volume_min: 0.01,
            volume_max: 100.0,
            volume_step: 0.01,
        }
    }
}

pub fn is_jpy(instrument: &str) -> bool {
    instrument.to_ascii_uppercase().ends_with("JPY")
}

/// Price distance of one pip: 0.01 for JPY quotes, 0.0001 otherwise.
pub fn pip_size(instrument: &str) -> f64 {
    if is_jpy(instrument) { 0.01 } else { 0.0001 }
}

pub fn price_to_pips(instrument: &str, price_diff: f64) -> f64 {
    price_diff / pip_size(instrument)
}

pub fn pips_to_price(instrument: &str, pips: f64) -> f64 {
    pips * pip_size(instrument)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jpy_detection_is_case_insensitive() {
        assert!(is_jpy("USDJPY"));
        assert!(is_jpy("eurjpy"));
        assert!(!is_jpy("EURUSD"));
    }

    #[test]
    fn pip_conversions() {
        assert!((pip_size("EURUSD") - 0.0001).abs() < f64::EPSILON);
        assert!((pip_size("USDJPY") - 0.01).abs() < f64::EPSILON);
        assert!((price_to_pips("EURUSD", 0.0020) - 20.0).abs() < 1e-9);
        assert!((pips_to_price("USDJPY", 15.0) - 0.15).abs() < 1e-12);
    }

    #[test]
    fn forex_defaults() {
        let info = SymbolInfo::forex("GBPJPY");
        assert_eq!(info.digits, 3);
        assert!((info.contract_size - 100_000.0).abs() < f64::EPSILON);
    }
}
