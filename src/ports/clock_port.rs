//! Time source port trait.

use std::time::Duration;

use chrono::NaiveDateTime;

pub trait ClockPort {
    /// Current UTC time.
    fn now(&self) -> NaiveDateTime;

    /// Blocks (or advances virtual time) until `deadline`.
    fn sleep_until(&self, deadline: NaiveDateTime);

    fn sleep(&self, duration: Duration) {
        let step = chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::zero());
        self.sleep_until(self.now() + step);
    }
}
