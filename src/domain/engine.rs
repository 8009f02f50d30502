//! Per-cycle orchestration.
//!
//! [`AppContext`] owns every piece of state that lives between cycles: bar
//! windows, the cooldown registry, the profit governor, exit tracking, the
//! connection monitor and entries waiting on a retry delay. Collaborators are
//! lent in through [`Ports`] on each call.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use crate::domain::config::EngineConfig;
use crate::domain::confluence;
use crate::domain::connection::{ConnectionMonitor, MonitorStep};
use crate::domain::cooldown::CooldownRegistry;
use crate::domain::error::{AmatraderError, ErrorKind};
use crate::domain::execution::{
    AbortReason, EntryIntent, EntryMachine, ExecOutcome, ExecutionContext, Step,
};
use crate::domain::exits::{ExitManager, ExitTracker};
use crate::domain::governor::{HaltReason, ProfitGovernor};
use crate::domain::indicator::atr::calculate_atr;
use crate::domain::mtf::{self, MtfAgreement};
use crate::domain::ohlcv::BarWindow;
use crate::domain::order::OrderParams;
use crate::domain::position::TradeSide;
use crate::domain::risk::{RiskSizer, SizingRequest};
use crate::domain::session::{SessionPolicy, SessionStatus, session_clock};
use crate::domain::signal::Signal;
use crate::domain::snapshot::IndicatorSnapshot;
use crate::domain::timeframe::Timeframe;
use crate::domain::trend_conflict::{self, TrendAssessment};
use crate::ports::data_port::MarketDataPort;
use crate::ports::notify_port::{NotifyPort, notify_best_effort};
use crate::ports::venue_port::VenuePort;

pub struct Ports<'a> {
    pub market: &'a dyn MarketDataPort,
    pub venue: &'a mut dyn VenuePort,
    pub notifier: &'a dyn NotifyPort,
}

/// Full analysis of one instrument at one moment.
#[derive(Debug, Clone)]
pub struct Decision {
    pub instrument: String,
    pub timeframe: Timeframe,
    pub session: SessionStatus,
    pub snapshot: IndicatorSnapshot,
    pub trend: TrendAssessment,
    pub mtf: Option<MtfAgreement>,
    pub signal: Signal,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InstrumentOutcome {
    NoSignal,
    SessionClosed,
    Halted,
    SpreadTooWide { spread_pips: f64 },
    /// Leverage ceiling leaves no room for even the minimum lot.
    NoRoom,
    /// An earlier entry is still between retries.
    InFlight,
    Waiting { resume_at: NaiveDateTime },
    Executed(ExecOutcome),
}

#[derive(Debug, Default)]
pub struct CycleReport {
    pub halt: Option<HaltReason>,
    /// Set when the venue was down and the cycle was skipped.
    pub connection: Option<MonitorStep>,
    pub outcomes: Vec<(String, InstrumentOutcome)>,
    pub errors: Vec<(String, AmatraderError)>,
}

impl CycleReport {
    pub fn outcome(&self, instrument: &str) -> Option<&InstrumentOutcome> {
        self.outcomes
            .iter()
            .find(|(i, _)| i == instrument)
            .map(|(_, o)| o)
    }
}

#[derive(Debug, Clone)]
struct PendingEntry {
    machine: EntryMachine,
    resume_at: NaiveDateTime,
}

pub struct AppContext {
    config: EngineConfig,
    session: SessionPolicy,
    sizer: RiskSizer,
    exits: ExitManager,
    windows: HashMap<(String, Timeframe), BarWindow>,
    cooldowns: CooldownRegistry,
    governor: ProfitGovernor,
    exit_tracker: ExitTracker,
    connection: ConnectionMonitor,
    pending: HashMap<String, PendingEntry>,
    last_error: HashMap<String, String>,
    halt: Option<HaltReason>,
}

impl AppContext {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            session: SessionPolicy::new(config.session.clone()),
            sizer: RiskSizer::new(config.risk.clone()),
            exits: ExitManager::new(config.exits.clone()),
            windows: HashMap::new(),
            cooldowns: CooldownRegistry::new(),
            governor: ProfitGovernor::new(config.governor.clone()),
            exit_tracker: ExitTracker::new(),
            connection: ConnectionMonitor::new(config.connection.clone()),
            pending: HashMap::new(),
            last_error: HashMap::new(),
            halt: None,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cooldowns(&self) -> &CooldownRegistry {
        &self.cooldowns
    }

    pub fn governor(&self) -> &ProfitGovernor {
        &self.governor
    }

    pub fn connection(&self) -> &ConnectionMonitor {
        &self.connection
    }

    pub fn exit_tracker(&self) -> &ExitTracker {
        &self.exit_tracker
    }

    pub fn session_policy(&self) -> &SessionPolicy {
        &self.session
    }

    pub fn window(&self, instrument: &str, timeframe: Timeframe) -> Option<&BarWindow> {
        self.windows.get(&(instrument.to_string(), timeframe))
    }

    /// Earliest time an in-flight entry wants to be resumed.
    pub fn next_pending_due(&self) -> Option<NaiveDateTime> {
        self.pending.values().map(|p| p.resume_at).min()
    }

    pub fn session_status(&self, instrument: &str, now_utc: NaiveDateTime) -> SessionStatus {
        let local = session_clock(now_utc, self.config.engine.utc_offset_minutes);
        self.session.status(instrument, local.time())
    }

    fn refresh_window(
        &mut self,
        market: &dyn MarketDataPort,
        instrument: &str,
        timeframe: Timeframe,
    ) -> Result<usize, AmatraderError> {
        let fetched = market.historical_bars(instrument, timeframe, self.config.engine.bar_count)?;
        let capacity = self.config.engine.window_length;
        let window = self
            .windows
            .entry((instrument.to_string(), timeframe))
            .or_insert_with(|| BarWindow::new(capacity));
        if let Some(bars) = fetched {
            let added = window.extend(bars);
            debug!(instrument, %timeframe, added, total = window.len(), "bar window refreshed");
        }
        if window.is_empty() {
            return Err(AmatraderError::NoData {
                instrument: instrument.to_string(),
                timeframe: timeframe.to_string(),
            });
        }
        Ok(window.len())
    }

    fn snapshot_for(
        &mut self,
        market: &dyn MarketDataPort,
        instrument: &str,
        timeframe: Timeframe,
    ) -> Result<IndicatorSnapshot, AmatraderError> {
        let minimum = self.config.ama.slow_period + 1;
        let bars = self.refresh_window(market, instrument, timeframe)?;
        if bars < minimum {
            return Err(AmatraderError::InsufficientData {
                instrument: instrument.to_string(),
                bars,
                minimum,
            });
        }
        let window = self
            .windows
            .get(&(instrument.to_string(), timeframe))
            .map(BarWindow::bars)
            .unwrap_or(&[]);
        Ok(IndicatorSnapshot::compute(instrument, window, &self.config))
    }

    /// Signal, trend resolution and optional multi-timeframe check for one
    /// instrument, on the timeframe its current session calls for.
    pub fn analyze(
        &mut self,
        market: &dyn MarketDataPort,
        instrument: &str,
        now_utc: NaiveDateTime,
    ) -> Result<Decision, AmatraderError> {
        let session = self.session_status(instrument, now_utc);
        let timeframe = session.timeframe;
        let snapshot = self.snapshot_for(market, instrument, timeframe)?;

        let signal = confluence::evaluate(&snapshot, &self.config, timeframe);
        let trend = trend_conflict::assess(&snapshot);
        let mut signal = trend_conflict::resolve(signal, &trend);

        let mut agreement = None;
        if self.config.mtf.enabled && signal.direction.is_directional() {
            let mut others = HashMap::new();
            for (tf, _) in timeframe.mtf_weights() {
                if tf == timeframe {
                    continue;
                }
                match self.snapshot_for(market, instrument, tf) {
                    Ok(snap) => {
                        others.insert(tf, snap);
                    }
                    Err(e) => debug!(instrument, timeframe = %tf, error = %e, "timeframe skipped"),
                }
            }
            let result = mtf::assess(timeframe, signal.direction, &self.config, |tf| {
                if tf == timeframe {
                    Some(&snapshot)
                } else {
                    others.get(&tf)
                }
            });
            if !result.tradable {
                signal.downgrade("MTF_DISAGREEMENT");
            }
            agreement = Some(result);
        }

        info!(
            instrument,
            %signal,
            trend = %trend.recommendation,
            session = %session.priority,
            "analysis"
        );
        Ok(Decision {
            instrument: instrument.to_string(),
            timeframe,
            session,
            snapshot,
            trend,
            mtf: agreement,
            signal,
        })
    }

    fn open_exposure(&self, venue: &dyn VenuePort, market: &dyn MarketDataPort) -> f64 {
        self.config
            .engine
            .instruments
            .iter()
            .filter_map(|i| {
                let positions = venue.open_positions(i).ok()?;
                let contract = market.symbol_info(i).map_or(100_000.0, |s| s.contract_size);
                Some(positions.iter().map(|p| p.notional(contract)).sum::<f64>())
            })
            .sum()
    }

    /// Analyses one instrument and, if a trade is warranted, starts an entry.
    pub fn evaluate_instrument(
        &mut self,
        ports: &mut Ports<'_>,
        instrument: &str,
        now: NaiveDateTime,
    ) -> Result<InstrumentOutcome, AmatraderError> {
        if self.pending.contains_key(instrument) {
            return Ok(InstrumentOutcome::InFlight);
        }

        let decision = self.analyze(ports.market, instrument, now)?;
        if !decision.session.should_trade() {
            return Ok(InstrumentOutcome::SessionClosed);
        }
        let Some(side) = TradeSide::from_direction(decision.signal.direction) else {
            return Ok(InstrumentOutcome::NoSignal);
        };
        if self.halt.is_some() {
            return Ok(InstrumentOutcome::Halted);
        }

        let quote = ports.market.quote(instrument)?;
        let spread_pips = quote.spread_pips(instrument);
        if !self.session.spread_allowed(&decision.session, spread_pips) {
            info!(
                instrument,
                spread_pips,
                max = decision.session.max_spread_pips,
                "spread too wide"
            );
            return Ok(InstrumentOutcome::SpreadTooWide { spread_pips });
        }

        let account = ports.venue.account()?;
        let symbol = ports.market.symbol_info(instrument);
        let exposure = self.open_exposure(&*ports.venue, ports.market);
        let risk_percent = self.session.effective_risk_percent(
            self.config.risk.risk_percent,
            &decision.session,
            self.governor.evaluation_factor(),
        );

        let size = {
            let bars = self
                .window(instrument, decision.timeframe)
                .map(BarWindow::bars)
                .unwrap_or(&[]);
            self.sizer.size(&SizingRequest {
                instrument,
                direction: decision.signal.direction,
                balance: account.balance,
                risk_percent,
                bars,
                symbol: symbol.as_ref(),
                snapshot: &decision.snapshot,
                session_lot_multiplier: decision.session.lot_multiplier,
                open_exposure: exposure,
            })
        };
        let Some(size) = size else {
            warn!(instrument, exposure, "no room under leverage ceiling");
            return Ok(InstrumentOutcome::NoRoom);
        };

        let mut params = OrderParams {
            lots: size.lots,
            sl_pips: size.sl_pips,
            tp_pips: size.tp_pips,
            risk_percent,
            slippage_points: self.config.execution.slippage_points,
        };
        params.sanitize();

        let intent = EntryIntent {
            instrument: instrument.to_string(),
            side,
            params,
            analysis_price: quote.entry_price(side),
            snapshot: decision.snapshot,
        };
        let machine = EntryMachine::new(
            intent,
            self.config.execution.clone(),
            self.config.ama.clone(),
        );
        Ok(self.drive(ports, machine, now))
    }

    fn drive(
        &mut self,
        ports: &mut Ports<'_>,
        mut machine: EntryMachine,
        now: NaiveDateTime,
    ) -> InstrumentOutcome {
        let instrument = machine.intent().instrument.clone();
        let mut ctx = ExecutionContext {
            venue: &mut *ports.venue,
            market: ports.market,
            cooldowns: &mut self.cooldowns,
            now,
        };
        match machine.advance(&mut ctx) {
            Step::Wait(delay) => {
                let resume_at =
                    now + chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::zero());
                self.pending
                    .insert(instrument, PendingEntry { machine, resume_at });
                InstrumentOutcome::Waiting { resume_at }
            }
            Step::Finished(outcome) => {
                self.report_outcome(ports.notifier, &instrument, &outcome);
                InstrumentOutcome::Executed(outcome)
            }
            Step::Continue => InstrumentOutcome::InFlight,
        }
    }

    fn report_outcome(
        &mut self,
        notifier: &dyn NotifyPort,
        instrument: &str,
        outcome: &ExecOutcome,
    ) {
        match outcome {
            ExecOutcome::Opened { position_id, attempts } => notify_best_effort(
                notifier,
                &format!("{instrument}: position {position_id} opened after {attempts} attempt(s)"),
            ),
            ExecOutcome::ReversalPending { closed } => notify_best_effort(
                notifier,
                &format!("{instrument}: closed {closed} opposite position(s), entry deferred"),
            ),
            ExecOutcome::AlreadyOpen { .. } | ExecOutcome::Aborted(_) => {}
        }
        if let ExecOutcome::Aborted(reason) = outcome {
            match reason {
                AbortReason::CoolingDown { .. }
                | AbortReason::PriceDeviation { .. }
                | AbortReason::ConditionsChanged => {
                    debug!(instrument, %reason, "entry not placed")
                }
                _ => {
                    if let Some(err) = outcome.error(instrument) {
                        self.report_error(notifier, instrument, &err);
                    }
                }
            }
        }
    }

    /// Notifies once per distinct error message per instrument.
    fn report_error(&mut self, notifier: &dyn NotifyPort, instrument: &str, err: &AmatraderError) {
        let message = err.to_string();
        if self.last_error.get(instrument) == Some(&message) {
            return;
        }
        warn!(instrument, kind = %err.kind(), error = %message, "instrument error");
        notify_best_effort(notifier, &format!("{instrument}: [{}] {message}", err.kind()));
        self.last_error.insert(instrument.to_string(), message);
    }

    /// Resumes entries whose retry delay has passed.
    pub fn resume_pending(
        &mut self,
        ports: &mut Ports<'_>,
        now: NaiveDateTime,
    ) -> Vec<(String, InstrumentOutcome)> {
        let mut due: Vec<String> = self
            .pending
            .iter()
            .filter(|(_, p)| p.resume_at <= now)
            .map(|(i, _)| i.clone())
            .collect();
        due.sort();
        let mut results = Vec::new();
        for instrument in due {
            if let Some(entry) = self.pending.remove(&instrument) {
                let outcome = self.drive(ports, entry.machine, now);
                results.push((instrument, outcome));
            }
        }
        results
    }

    /// Checks the venue through the connection monitor.
    pub fn monitor_connection(
        &mut self,
        venue: &mut dyn VenuePort,
        notifier: &dyn NotifyPort,
        now: NaiveDateTime,
    ) -> MonitorStep {
        let step = self.connection.check(venue, now);
        match step {
            MonitorStep::Reconnected => notify_best_effort(notifier, "venue connection restored"),
            MonitorStep::GaveUp => notify_best_effort(
                notifier,
                "venue unreachable, reconnect attempts exhausted",
            ),
            MonitorStep::Healthy | MonitorStep::RetryIn(_) => {}
        }
        step
    }

    /// One pass over every configured instrument.
    pub fn run_cycle(&mut self, ports: &mut Ports<'_>, now: NaiveDateTime) -> CycleReport {
        let mut report = CycleReport::default();

        if !ports.venue.is_connected() {
            let step = self.monitor_connection(&mut *ports.venue, ports.notifier, now);
            if !step.is_connected() {
                warn!(?step, "venue disconnected, cycle skipped");
                report.connection = Some(step);
                return report;
            }
        }

        match ports.venue.account() {
            Ok(account) => {
                let check = self.governor.observe(now.date(), account.balance);
                if check.changed {
                    match check.halt {
                        Some(reason) => {
                            notify_best_effort(ports.notifier, &format!("trading halted: {reason}"))
                        }
                        None => notify_best_effort(ports.notifier, "trading resumed"),
                    }
                }
                self.halt = check.halt;
            }
            Err(e) => {
                self.report_error(ports.notifier, "account", &e);
                report.errors.push(("account".to_string(), e));
                return report;
            }
        }
        report.halt = self.halt;

        let instruments = self.config.engine.instruments.clone();
        for instrument in &instruments {
            match self.evaluate_instrument(ports, instrument, now) {
                Ok(outcome) => {
                    if matches!(outcome, InstrumentOutcome::Executed(ref o) if o.is_success()) {
                        self.last_error.remove(instrument);
                    }
                    report.outcomes.push((instrument.clone(), outcome));
                }
                Err(e) => {
                    let connectivity = e.kind() == ErrorKind::Connectivity;
                    self.report_error(ports.notifier, instrument, &e);
                    report.errors.push((instrument.clone(), e));
                    if connectivity && !ports.venue.is_connected() {
                        warn!(instrument, "venue lost mid-cycle, skipping remaining instruments");
                        break;
                    }
                }
            }
        }
        report
    }

    /// Trails stops and extends targets on every open position. Returns the
    /// number of modifications the venue accepted.
    pub fn manage_exits(&mut self, ports: &mut Ports<'_>, now: NaiveDateTime) -> usize {
        if !ports.venue.is_connected() {
            return 0;
        }
        let mut applied = 0;
        let instruments = self.config.engine.instruments.clone();
        for instrument in &instruments {
            let positions = match ports.venue.open_positions(instrument) {
                Ok(p) => p,
                Err(e) => {
                    warn!(%instrument, error = %e, "position query failed");
                    continue;
                }
            };
            if positions.is_empty() {
                self.exit_tracker.sync(instrument, &positions);
                continue;
            }
            let quote = match ports.market.quote(instrument) {
                Ok(q) => q,
                Err(e) => {
                    warn!(%instrument, error = %e, "no quote for exit review");
                    continue;
                }
            };
            let timeframe = self.session_status(instrument, now).timeframe;
            let atr_period = self.exits.config().atr_period;
            let atr = self
                .window(instrument, timeframe)
                .and_then(|w| calculate_atr(w.bars(), atr_period).last_simple());

            let adjustments =
                self.exits
                    .review(&mut self.exit_tracker, instrument, &positions, &quote, atr);
            for adj in adjustments {
                match ports
                    .venue
                    .modify_stop_target(adj.position_id, adj.stop_price, adj.target_price)
                {
                    Ok(ack) if ack.accepted => {
                        applied += 1;
                        info!(
                            %instrument,
                            position = adj.position_id,
                            stop = adj.stop_price,
                            target = adj.target_price,
                            trailed = adj.trailed,
                            "exit levels updated"
                        );
                    }
                    Ok(ack) => warn!(
                        %instrument,
                        position = adj.position_id,
                        message = %ack.message,
                        "modify rejected"
                    ),
                    Err(e) => warn!(
                        %instrument,
                        position = adj.position_id,
                        error = %e,
                        "modify failed"
                    ),
                }
            }
        }
        applied
    }
}
