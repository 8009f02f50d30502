//! Order placement state machine.
//!
//! An [`EntryMachine`] carries one entry intent through the cooldown,
//! position and price checks to submission. Whether an order worked is
//! decided by the positions the venue reports afterwards, never by the
//! acknowledgement returned from the submit call.
//!
//! The machine never sleeps. A retry yields [`Step::Wait`] and the caller
//! re-invokes it once the delay has passed.

use std::fmt;
use std::time::Duration;

use chrono::NaiveDateTime;
use tracing::{debug, error, info, warn};

use crate::domain::config::{AmaConfig, ExecutionConfig};
use crate::domain::confluence::conditions_hold;
use crate::domain::cooldown::CooldownRegistry;
use crate::domain::error::AmatraderError;
use crate::domain::instrument::price_to_pips;
use crate::domain::order::{OrderParams, OrderRequest};
use crate::domain::position::{Quote, TradeSide};
use crate::domain::snapshot::IndicatorSnapshot;
use crate::ports::data_port::MarketDataPort;
use crate::ports::venue_port::VenuePort;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecState {
    Idle,
    CooldownCheck,
    PositionCheck,
    PriceValidate,
    Submit,
    Verify,
    Retry,
    Done,
    Abort,
}

impl ExecState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ExecState::Done | ExecState::Abort)
    }
}

/// Everything needed to place one entry, fixed at analysis time.
#[derive(Debug, Clone)]
pub struct EntryIntent {
    pub instrument: String,
    pub side: TradeSide,
    pub params: OrderParams,
    /// Fill-side price the decision was made against.
    pub analysis_price: f64,
    pub snapshot: IndicatorSnapshot,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AbortReason {
    Disconnected { reason: String },
    CoolingDown { remaining: Duration },
    PriceDeviation { pips: f64 },
    ConditionsChanged,
    Venue { reason: String },
    RetriesExhausted { attempts: u32 },
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::Disconnected { reason } => write!(f, "venue disconnected: {reason}"),
            AbortReason::CoolingDown { remaining } => {
                write!(f, "cooling down, {}s left", remaining.as_secs())
            }
            AbortReason::PriceDeviation { pips } => {
                write!(f, "price moved {pips:.1} pips since analysis")
            }
            AbortReason::ConditionsChanged => f.write_str("entry conditions no longer hold"),
            AbortReason::Venue { reason } => write!(f, "venue error: {reason}"),
            AbortReason::RetriesExhausted { attempts } => {
                write!(f, "position not confirmed after {attempts} attempts")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExecOutcome {
    Opened { position_id: u64, attempts: u32 },
    /// A position on the requested side was already open. Nothing was sent.
    AlreadyOpen { position_id: u64 },
    /// Opposite positions were closed. The entry waits for a later cycle.
    ReversalPending { closed: usize },
    Aborted(AbortReason),
}

impl ExecOutcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            ExecOutcome::Opened { .. } | ExecOutcome::AlreadyOpen { .. }
        )
    }

    /// The error this outcome reports, if it is a failure.
    pub fn error(&self, instrument: &str) -> Option<AmatraderError> {
        let ExecOutcome::Aborted(reason) = self else {
            return None;
        };
        Some(match reason {
            AbortReason::Disconnected { reason } | AbortReason::Venue { reason } => {
                AmatraderError::Disconnected {
                    reason: reason.clone(),
                }
            }
            AbortReason::RetriesExhausted { attempts } => AmatraderError::RetriesExhausted {
                instrument: instrument.to_string(),
                attempts: *attempts,
            },
            other => AmatraderError::OrderRejected {
                instrument: instrument.to_string(),
                reason: other.to_string(),
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Continue,
    /// Invoke again after the delay.
    Wait(Duration),
    Finished(ExecOutcome),
}

/// Collaborators lent to the machine for a single invocation.
pub struct ExecutionContext<'a> {
    pub venue: &'a mut dyn VenuePort,
    pub market: &'a dyn MarketDataPort,
    pub cooldowns: &'a mut CooldownRegistry,
    pub now: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct EntryMachine {
    intent: EntryIntent,
    config: ExecutionConfig,
    ama: AmaConfig,
    state: ExecState,
    attempts: u32,
    quote: Option<Quote>,
    outcome: Option<ExecOutcome>,
}

impl EntryMachine {
    pub fn new(intent: EntryIntent, config: ExecutionConfig, ama: AmaConfig) -> Self {
        Self {
            intent,
            config,
            ama,
            state: ExecState::Idle,
            attempts: 0,
            quote: None,
            outcome: None,
        }
    }

    pub fn state(&self) -> ExecState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn intent(&self) -> &EntryIntent {
        &self.intent
    }

    /// Steps until the machine has to wait or is finished.
    pub fn advance(&mut self, ctx: &mut ExecutionContext<'_>) -> Step {
        loop {
            match self.step(ctx) {
                Step::Continue => continue,
                other => return other,
            }
        }
    }

    pub fn step(&mut self, ctx: &mut ExecutionContext<'_>) -> Step {
        let instrument = self.intent.instrument.clone();
        let side = self.intent.side;
        debug!(%instrument, state = ?self.state, "execution step");

        match self.state {
            ExecState::Idle => {
                if !ctx.venue.is_connected() {
                    return self.abort(AbortReason::Disconnected {
                        reason: "not connected before entry".into(),
                    });
                }
                self.state = ExecState::CooldownCheck;
                Step::Continue
            }
            ExecState::CooldownCheck => {
                if let Some(remaining) =
                    ctx.cooldowns
                        .remaining(&instrument, ctx.now, self.config.cooldown)
                {
                    return self.abort(AbortReason::CoolingDown { remaining });
                }
                self.state = ExecState::PositionCheck;
                Step::Continue
            }
            ExecState::PositionCheck => {
                let positions = match ctx.venue.open_positions(&instrument) {
                    Ok(p) => p,
                    Err(e) => {
                        return self.abort(AbortReason::Venue {
                            reason: e.to_string(),
                        });
                    }
                };
                if let Some(existing) = positions.iter().find(|p| p.side == side) {
                    info!(%instrument, %side, position = existing.id, "position already open");
                    return self.finish(ExecOutcome::AlreadyOpen {
                        position_id: existing.id,
                    });
                }
                let opposite: Vec<_> = positions.iter().filter(|p| p.side != side).collect();
                if !opposite.is_empty() {
                    for position in &opposite {
                        match ctx
                            .venue
                            .close_position(position, self.config.slippage_points)
                        {
                            Ok(ack) => info!(
                                %instrument,
                                position = position.id,
                                accepted = ack.accepted,
                                "closed opposite position"
                            ),
                            Err(e) => warn!(
                                %instrument,
                                position = position.id,
                                error = %e,
                                "close failed"
                            ),
                        }
                    }
                    ctx.cooldowns.record(&instrument, ctx.now);
                    return self.finish(ExecOutcome::ReversalPending {
                        closed: opposite.len(),
                    });
                }
                self.state = ExecState::PriceValidate;
                Step::Continue
            }
            ExecState::PriceValidate => {
                let quote = match ctx.market.quote(&instrument) {
                    Ok(q) => q,
                    Err(e) => {
                        return self.abort(AbortReason::Venue {
                            reason: e.to_string(),
                        });
                    }
                };
                let live = quote.entry_price(side);
                let pips = price_to_pips(&instrument, (live - self.intent.analysis_price).abs());
                if pips > self.config.max_price_deviation_pips {
                    return self.abort(AbortReason::PriceDeviation { pips });
                }
                if !conditions_hold(&self.intent.snapshot, &self.ama, side.into(), quote.bid) {
                    return self.abort(AbortReason::ConditionsChanged);
                }
                self.quote = Some(quote);
                self.state = ExecState::Submit;
                Step::Continue
            }
            ExecState::Submit => {
                if !ctx.venue.is_connected() {
                    return self.abort(AbortReason::Disconnected {
                        reason: "lost before submit".into(),
                    });
                }
                let Some(quote) = self.quote else {
                    self.state = ExecState::PriceValidate;
                    return Step::Continue;
                };
                self.attempts += 1;
                let request = OrderRequest::market(
                    &instrument,
                    side,
                    &quote,
                    &self.intent.params,
                    self.config.magic,
                );
                match ctx.venue.submit_order(&request) {
                    Ok(ack) => info!(
                        %instrument,
                        attempt = self.attempts,
                        accepted = ack.accepted,
                        message = %ack.message,
                        "submitted {request}"
                    ),
                    Err(e) => warn!(
                        %instrument,
                        attempt = self.attempts,
                        error = %e,
                        "submit failed"
                    ),
                }
                ctx.cooldowns.record(&instrument, ctx.now);
                self.state = ExecState::Verify;
                Step::Continue
            }
            ExecState::Verify => {
                let confirmed = match ctx.venue.open_positions(&instrument) {
                    Ok(positions) => positions.into_iter().find(|p| p.side == side),
                    Err(e) => {
                        warn!(%instrument, error = %e, "position query failed during verify");
                        None
                    }
                };
                if let Some(position) = confirmed {
                    info!(
                        %instrument,
                        %side,
                        position = position.id,
                        attempts = self.attempts,
                        "entry confirmed"
                    );
                    return self.finish(ExecOutcome::Opened {
                        position_id: position.id,
                        attempts: self.attempts,
                    });
                }
                if self.attempts >= self.config.max_retries {
                    return self.abort(AbortReason::RetriesExhausted {
                        attempts: self.attempts,
                    });
                }
                warn!(%instrument, attempt = self.attempts, "entry not confirmed, retrying");
                self.state = ExecState::Retry;
                Step::Wait(self.config.retry_delay)
            }
            ExecState::Retry => {
                match ctx.market.quote(&instrument) {
                    Ok(q) => self.quote = Some(q),
                    Err(e) => debug!(%instrument, error = %e, "keeping previous quote for retry"),
                }
                self.state = ExecState::Submit;
                Step::Continue
            }
            ExecState::Done | ExecState::Abort => match &self.outcome {
                Some(outcome) => Step::Finished(outcome.clone()),
                None => Step::Finished(ExecOutcome::Aborted(AbortReason::Venue {
                    reason: "no outcome recorded".into(),
                })),
            },
        }
    }

    fn finish(&mut self, outcome: ExecOutcome) -> Step {
        self.state = ExecState::Done;
        self.outcome = Some(outcome.clone());
        Step::Finished(outcome)
    }

    fn abort(&mut self, reason: AbortReason) -> Step {
        match &reason {
            AbortReason::CoolingDown { .. }
            | AbortReason::PriceDeviation { .. }
            | AbortReason::ConditionsChanged => {
                info!(instrument = %self.intent.instrument, %reason, "entry skipped")
            }
            _ => error!(instrument = %self.intent.instrument, %reason, "entry aborted"),
        }
        self.state = ExecState::Abort;
        let outcome = ExecOutcome::Aborted(reason);
        self.outcome = Some(outcome.clone());
        Step::Finished(outcome)
    }
}
