//! Wall-clock and virtual-time implementations of [`ClockPort`].

use std::cell::Cell;

use chrono::{NaiveDateTime, Utc};

use crate::ports::clock_port::ClockPort;

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl ClockPort for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Utc::now().naive_utc()
    }

    fn sleep_until(&self, deadline: NaiveDateTime) {
        if let Ok(wait) = (deadline - self.now()).to_std() {
            std::thread::sleep(wait);
        }
    }
}

/// Clock that only moves when told to. Sleeping jumps straight to the
/// deadline.
#[derive(Debug, Clone)]
pub struct VirtualClock {
    now: Cell<NaiveDateTime>,
}

impl VirtualClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            now: Cell::new(start),
        }
    }

    pub fn set(&self, at: NaiveDateTime) {
        self.now.set(at);
    }

    pub fn advance(&self, by: chrono::Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl ClockPort for VirtualClock {
    fn now(&self) -> NaiveDateTime {
        self.now.get()
    }

    fn sleep_until(&self, deadline: NaiveDateTime) {
        if deadline > self.now.get() {
            self.now.set(deadline);
        }
    }
}
