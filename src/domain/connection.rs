//! Venue connectivity monitor with backoff between reconnect attempts.

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use chrono::NaiveDateTime;
use tracing::{error, info, warn};

use crate::domain::config::ConnectionConfig;
use crate::ports::venue_port::VenuePort;

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEventKind {
    Healthy,
    Lost,
    ReconnectAttempt { attempt: u32 },
    ReconnectFailed { attempt: u32, reason: String },
    Reconnected { attempt: u32 },
    GaveUp { attempts: u32 },
}

impl fmt::Display for ConnectionEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionEventKind::Healthy => f.write_str("healthy"),
            ConnectionEventKind::Lost => f.write_str("connection lost"),
            ConnectionEventKind::ReconnectAttempt { attempt } => {
                write!(f, "reconnect attempt {attempt}")
            }
            ConnectionEventKind::ReconnectFailed { attempt, reason } => {
                write!(f, "reconnect attempt {attempt} failed: {reason}")
            }
            ConnectionEventKind::Reconnected { attempt } => {
                write!(f, "reconnected on attempt {attempt}")
            }
            ConnectionEventKind::GaveUp { attempts } => {
                write!(f, "gave up after {attempts} attempts")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionEvent {
    pub at: NaiveDateTime,
    pub kind: ConnectionEventKind,
}

/// What the caller should do after a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorStep {
    Healthy,
    Reconnected,
    /// Still down; check again after the delay.
    RetryIn(Duration),
    /// Attempts exhausted; wait for the next regular check.
    GaveUp,
}

impl MonitorStep {
    pub fn is_connected(self) -> bool {
        matches!(self, MonitorStep::Healthy | MonitorStep::Reconnected)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionStats {
    pub checks: u64,
    pub failures: u64,
    pub reconnects: u64,
}

#[derive(Debug, Clone)]
pub struct ConnectionMonitor {
    config: ConnectionConfig,
    history: VecDeque<ConnectionEvent>,
    attempt: u32,
    stats: ConnectionStats,
}

impl ConnectionMonitor {
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            history: VecDeque::with_capacity(config.history_len),
            config,
            attempt: 0,
            stats: ConnectionStats::default(),
        }
    }

    pub fn history(&self) -> impl Iterator<Item = &ConnectionEvent> {
        self.history.iter()
    }

    pub fn stats(&self) -> ConnectionStats {
        self.stats
    }

    pub fn check_interval(&self) -> Duration {
        self.config.check_interval
    }

    pub fn is_reconnecting(&self) -> bool {
        self.attempt > 0
    }

    /// Delay after the `attempt`-th failed reconnect. The schedule's last
    /// entry repeats.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let idx = (attempt.max(1) - 1) as usize;
        self.config
            .backoff
            .get(idx)
            .or(self.config.backoff.last())
            .copied()
            .unwrap_or(self.config.check_interval)
    }

    fn record(&mut self, at: NaiveDateTime, kind: ConnectionEventKind) {
        if self.config.history_len == 0 {
            return;
        }
        while self.history.len() >= self.config.history_len {
            self.history.pop_front();
        }
        self.history.push_back(ConnectionEvent { at, kind });
    }

    /// Checks the venue and makes at most one reconnect attempt.
    pub fn check(&mut self, venue: &mut dyn VenuePort, now: NaiveDateTime) -> MonitorStep {
        self.stats.checks += 1;
        if venue.is_connected() {
            if self.attempt > 0 {
                let attempt = self.attempt;
                self.attempt = 0;
                self.stats.reconnects += 1;
                info!(attempt, "venue connection restored");
                self.record(now, ConnectionEventKind::Reconnected { attempt });
                return MonitorStep::Reconnected;
            }
            self.record(now, ConnectionEventKind::Healthy);
            return MonitorStep::Healthy;
        }

        self.stats.failures += 1;
        if self.attempt == 0 {
            warn!("venue connection lost");
            self.record(now, ConnectionEventKind::Lost);
        }
        self.attempt += 1;
        let attempt = self.attempt;
        self.record(now, ConnectionEventKind::ReconnectAttempt { attempt });

        match venue.reconnect() {
            Ok(()) if venue.is_connected() => {
                self.attempt = 0;
                self.stats.reconnects += 1;
                info!(attempt, "reconnected to venue");
                self.record(now, ConnectionEventKind::Reconnected { attempt });
                return MonitorStep::Reconnected;
            }
            Ok(()) => self.record(
                now,
                ConnectionEventKind::ReconnectFailed {
                    attempt,
                    reason: "still disconnected".into(),
                },
            ),
            Err(e) => {
                warn!(attempt, error = %e, "reconnect failed");
                self.record(
                    now,
                    ConnectionEventKind::ReconnectFailed {
                        attempt,
                        reason: e.to_string(),
                    },
                );
            }
        }

        if attempt >= self.config.max_attempts {
            error!(attempts = attempt, "giving up on reconnect until next check");
            self.attempt = 0;
            self.record(now, ConnectionEventKind::GaveUp { attempts: attempt });
            MonitorStep::GaveUp
        } else {
            MonitorStep::RetryIn(self.backoff(attempt))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::AmatraderError;
    use crate::domain::order::{AccountSnapshot, OrderAck, OrderRequest};
    use crate::domain::position::Position;
    use chrono::NaiveDate;

    /// Comes back after `heal_after` reconnect calls.
    struct FlakyVenue {
        connected: bool,
        heal_after: Option<u32>,
        calls: u32,
    }

    impl VenuePort for FlakyVenue {
        fn is_connected(&self) -> bool {
            self.connected
        }

        fn reconnect(&mut self) -> Result<(), AmatraderError> {
            self.calls += 1;
            if self.heal_after.is_some_and(|n| self.calls >= n) {
                self.connected = true;
                Ok(())
            } else {
                Err(AmatraderError::Disconnected {
                    reason: "timeout".into(),
                })
            }
        }

        fn submit_order(&mut self, _r: &OrderRequest) -> Result<OrderAck, AmatraderError> {
            Ok(OrderAck::rejected("offline"))
        }

        fn modify_stop_target(
            &mut self,
            _: u64,
            _: f64,
            _: f64,
        ) -> Result<OrderAck, AmatraderError> {
            Ok(OrderAck::rejected("offline"))
        }

        fn close_position(&mut self, _: &Position, _: u32) -> Result<OrderAck, AmatraderError> {
            Ok(OrderAck::rejected("offline"))
        }

        fn open_positions(&self, _: &str) -> Result<Vec<Position>, AmatraderError> {
            Ok(Vec::new())
        }

        fn account(&self) -> Result<AccountSnapshot, AmatraderError> {
            Ok(AccountSnapshot {
                balance: 0.0,
                equity: 0.0,
            })
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn healthy_venue() {
        let mut m = ConnectionMonitor::new(ConnectionConfig::default());
        let mut venue = FlakyVenue {
            connected: true,
            heal_after: None,
            calls: 0,
        };
        assert_eq!(m.check(&mut venue, now()), MonitorStep::Healthy);
        assert_eq!(venue.calls, 0);
        assert_eq!(m.stats().checks, 1);
    }

    #[test]
    fn backoff_follows_schedule() {
        let mut m = ConnectionMonitor::new(ConnectionConfig::default());
        let mut venue = FlakyVenue {
            connected: false,
            heal_after: None,
            calls: 0,
        };
        let steps: Vec<_> = (0..5).map(|_| m.check(&mut venue, now())).collect();
        assert_eq!(
            steps,
            vec![
                MonitorStep::RetryIn(Duration::from_secs(10)),
                MonitorStep::RetryIn(Duration::from_secs(30)),
                MonitorStep::RetryIn(Duration::from_secs(60)),
                MonitorStep::RetryIn(Duration::from_secs(120)),
                MonitorStep::GaveUp,
            ]
        );
        assert!(!m.is_reconnecting());
        assert_eq!(m.backoff(9), Duration::from_secs(300));
    }

    #[test]
    fn reconnect_resets_attempts() {
        let mut m = ConnectionMonitor::new(ConnectionConfig::default());
        let mut venue = FlakyVenue {
            connected: false,
            heal_after: Some(2),
            calls: 0,
        };
        assert!(matches!(m.check(&mut venue, now()), MonitorStep::RetryIn(_)));
        assert_eq!(m.check(&mut venue, now()), MonitorStep::Reconnected);
        assert!(!m.is_reconnecting());
        assert_eq!(m.stats().reconnects, 1);
        assert!(matches!(
            m.history().last().map(|e| &e.kind),
            Some(ConnectionEventKind::Reconnected { attempt: 2 })
        ));
    }

    #[test]
    fn history_is_bounded() {
        let mut m = ConnectionMonitor::new(ConnectionConfig {
            history_len: 3,
            ..ConnectionConfig::default()
        });
        let mut venue = FlakyVenue {
            connected: true,
            heal_after: None,
            calls: 0,
        };
        for _ in 0..10 {
            m.check(&mut venue, now());
        }
        assert_eq!(m.history().count(), 3);
    }
}
