//! Per-instrument record of the last trade attempt.

use std::collections::HashMap;
use std::time::Duration;

use chrono::NaiveDateTime;

#[derive(Debug, Clone, Default)]
pub struct CooldownRegistry {
    last_trade: HashMap<String, NaiveDateTime>,
}

impl CooldownRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an attempt at `at`. Entries never move backwards in time.
    pub fn record(&mut self, instrument: &str, at: NaiveDateTime) {
        self.last_trade
            .entry(instrument.to_string())
            .and_modify(|t| *t = (*t).max(at))
            .or_insert(at);
    }

    pub fn last_trade(&self, instrument: &str) -> Option<NaiveDateTime> {
        self.last_trade.get(instrument).copied()
    }

    /// Time left before `instrument` may trade again, `None` when it may
    /// trade now.
    pub fn remaining(
        &self,
        instrument: &str,
        now: NaiveDateTime,
        interval: Duration,
    ) -> Option<Duration> {
        let last = self.last_trade(instrument)?;
        let elapsed = (now - last).to_std().unwrap_or(Duration::ZERO);
        interval.checked_sub(elapsed).filter(|d| !d.is_zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn t(secs: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
            + chrono::Duration::seconds(secs)
    }

    #[test]
    fn unknown_instrument_may_trade() {
        let reg = CooldownRegistry::new();
        assert_eq!(reg.remaining("EURUSD", t(0), Duration::from_secs(60)), None);
    }

    #[test]
    fn cooling_until_interval_elapses() {
        let mut reg = CooldownRegistry::new();
        reg.record("EURUSD", t(0));
        assert_eq!(
            reg.remaining("EURUSD", t(20), Duration::from_secs(60)),
            Some(Duration::from_secs(40))
        );
        assert_eq!(reg.remaining("EURUSD", t(60), Duration::from_secs(60)), None);
        assert_eq!(reg.remaining("GBPUSD", t(20), Duration::from_secs(60)), None);
    }

    #[test]
    fn entries_are_monotonic() {
        let mut reg = CooldownRegistry::new();
        reg.record("EURUSD", t(100));
        reg.record("EURUSD", t(50));
        assert_eq!(reg.last_trade("EURUSD"), Some(t(100)));
    }

    #[test]
    fn clock_going_backwards_keeps_full_cooldown() {
        let mut reg = CooldownRegistry::new();
        reg.record("EURUSD", t(100));
        assert_eq!(
            reg.remaining("EURUSD", t(90), Duration::from_secs(60)),
            Some(Duration::from_secs(60))
        );
    }
}
