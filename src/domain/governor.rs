//! Daily profit target, daily loss limit and account drawdown ceiling.
//!
//! The governor sees one balance per cycle. Breaching any limit halts new
//! entries; open positions keep being managed.

use std::fmt;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::domain::config::GovernorConfig;
use crate::domain::error::AmatraderError;

#[derive(Debug, Clone, PartialEq)]
pub struct ProfitState {
    /// Balance at the very first observation.
    pub starting_balance: f64,
    /// Baseline for `current_profit`: the balance at the first observation
    /// of the current trading day, reset on every new day.
    pub initial_balance: f64,
    pub highest_balance: f64,
    pub current_profit: f64,
    /// Percent below the highest balance, zero or negative.
    pub drawdown_percent: f64,
    /// 1-based.
    pub trading_day_index: u32,
    pub current_day: NaiveDate,
    pub target_reached: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HaltReason {
    DailyTargetReached { profit: f64 },
    DailyLossLimit { profit: f64 },
    MaxDrawdown { drawdown_percent: f64 },
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HaltReason::DailyTargetReached { profit } => {
                write!(f, "daily target reached, profit {profit:+.2}")
            }
            HaltReason::DailyLossLimit { profit } => {
                write!(f, "daily loss limit reached, loss {:.2}", profit.abs())
            }
            HaltReason::MaxDrawdown { drawdown_percent } => {
                write!(f, "maximum drawdown reached, {drawdown_percent:.2}%")
            }
        }
    }
}

/// Outcome of one balance observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GovernorCheck {
    pub halt: Option<HaltReason>,
    /// The halt reason differs from the previous observation's.
    pub changed: bool,
    pub new_day: bool,
}

impl GovernorCheck {
    pub fn allows_entries(&self) -> bool {
        self.halt.is_none()
    }

    pub fn into_result(self) -> Result<(), AmatraderError> {
        match self.halt {
            None => Ok(()),
            Some(reason) => Err(AmatraderError::TradingHalted {
                reason: reason.to_string(),
            }),
        }
    }
}

fn halt_kind(halt: Option<HaltReason>) -> u8 {
    match halt {
        None => 0,
        Some(HaltReason::DailyTargetReached { .. }) => 1,
        Some(HaltReason::DailyLossLimit { .. }) => 2,
        Some(HaltReason::MaxDrawdown { .. }) => 3,
    }
}

#[derive(Debug, Clone)]
pub struct ProfitGovernor {
    config: GovernorConfig,
    state: Option<ProfitState>,
    last_halt: Option<HaltReason>,
}

impl ProfitGovernor {
    pub fn new(config: GovernorConfig) -> Self {
        Self {
            config,
            state: None,
            last_halt: None,
        }
    }

    pub fn state(&self) -> Option<&ProfitState> {
        self.state.as_ref()
    }

    pub fn in_evaluation(&self) -> bool {
        self.state
            .as_ref()
            .is_some_and(|s| s.trading_day_index <= self.config.evaluation_days)
    }

    /// Risk reduction factor while the account is in its evaluation period.
    pub fn evaluation_factor(&self) -> Option<f64> {
        self.in_evaluation()
            .then_some(self.config.evaluation_risk_factor)
    }

    pub fn observe(&mut self, date: NaiveDate, balance: f64) -> GovernorCheck {
        let mut new_day = false;
        let state = self.state.get_or_insert_with(|| {
            info!(balance, "profit governor initialised");
            new_day = true;
            ProfitState {
                starting_balance: balance,
                initial_balance: balance,
                highest_balance: balance,
                current_profit: 0.0,
                drawdown_percent: 0.0,
                trading_day_index: 1,
                current_day: date,
                target_reached: false,
            }
        });

        if date != state.current_day {
            state.current_day = date;
            state.initial_balance = balance;
            state.target_reached = false;
            state.trading_day_index += 1;
            new_day = true;
            info!(day = state.trading_day_index, balance, "new trading day");
        }

        state.current_profit = balance - state.initial_balance;
        if balance > state.highest_balance {
            state.highest_balance = balance;
        }
        state.drawdown_percent = if state.highest_balance > 0.0 {
            (balance - state.highest_balance) / state.highest_balance * 100.0
        } else {
            0.0
        };

        let c = &self.config;
        if !state.target_reached && state.current_profit >= c.daily_profit_target {
            state.target_reached = true;
        }

        let halt = if state.current_profit <= c.daily_max_loss {
            Some(HaltReason::DailyLossLimit {
                profit: state.current_profit,
            })
        } else if state.drawdown_percent <= c.max_drawdown_percent {
            Some(HaltReason::MaxDrawdown {
                drawdown_percent: state.drawdown_percent,
            })
        } else if state.target_reached {
            Some(HaltReason::DailyTargetReached {
                profit: state.current_profit,
            })
        } else {
            None
        };

        let changed = halt_kind(halt) != halt_kind(self.last_halt);
        if changed {
            match halt {
                Some(reason) => warn!(%reason, "new entries halted"),
                None if self.last_halt.is_some() => info!("new entries resumed"),
                None => {}
            }
        }
        self.last_halt = halt;

        GovernorCheck {
            halt,
            changed,
            new_day,
        }
    }
}
