//! Task queue driving the trading cycle, the connection monitor, the exit
//! manager and delayed entry retries, each at its own cadence.
//!
//! Time comes from a [`ClockPort`], so the same loop runs against the wall
//! clock or against a virtual clock in tests and paper runs.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::NaiveDateTime;
use tracing::{debug, info};

use crate::domain::connection::MonitorStep;
use crate::domain::engine::{AppContext, CycleReport, Ports};
use crate::ports::clock_port::ClockPort;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskKind {
    ConnectionMonitor,
    TradingCycle,
    ResumeEntries,
    ExitManager,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Task {
    due: NaiveDateTime,
    seq: u64,
    kind: TaskKind,
}

/// Cooperative stop flag shared with whoever wants to end the run.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: u64,
    pub connection_checks: u64,
    pub exit_reviews: u64,
    pub exit_updates: usize,
    pub resumed_entries: usize,
    pub stopped: bool,
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or(chrono::Duration::zero())
}

#[derive(Debug)]
pub struct Scheduler {
    queue: BinaryHeap<Reverse<Task>>,
    seq: u64,
    stop: StopHandle,
    cycle_interval: Duration,
    monitor_interval: Duration,
    exit_interval: Duration,
}

impl Scheduler {
    pub fn new(
        cycle_interval: Duration,
        monitor_interval: Duration,
        exit_interval: Duration,
        start: NaiveDateTime,
    ) -> Self {
        let mut scheduler = Self {
            queue: BinaryHeap::new(),
            seq: 0,
            stop: StopHandle::default(),
            cycle_interval,
            monitor_interval,
            exit_interval,
        };
        scheduler.schedule(TaskKind::TradingCycle, start);
        scheduler.schedule(TaskKind::ConnectionMonitor, start + to_chrono(monitor_interval));
        scheduler.schedule(TaskKind::ExitManager, start + to_chrono(exit_interval));
        scheduler
    }

    /// Scheduler with the intervals of `ctx`'s configuration.
    pub fn for_context(ctx: &AppContext, start: NaiveDateTime) -> Self {
        let config = ctx.config();
        Self::new(
            config.engine.cycle_interval,
            config.connection.check_interval,
            config.exits.check_interval,
            start,
        )
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Replaces any queued task of the same kind.
    pub fn schedule(&mut self, kind: TaskKind, due: NaiveDateTime) {
        self.queue.retain(|Reverse(t)| t.kind != kind);
        self.seq += 1;
        self.queue.push(Reverse(Task {
            due,
            seq: self.seq,
            kind,
        }));
    }

    pub fn next(&self) -> Option<(TaskKind, NaiveDateTime)> {
        self.queue.peek().map(|Reverse(t)| (t.kind, t.due))
    }

    pub fn due_of(&self, kind: TaskKind) -> Option<NaiveDateTime> {
        self.queue
            .iter()
            .find(|Reverse(t)| t.kind == kind)
            .map(|Reverse(t)| t.due)
    }

    /// Runs tasks in due order until the stop flag is raised, the queue is
    /// empty, or the next task falls after `until`.
    pub fn run<F>(
        &mut self,
        ctx: &mut AppContext,
        ports: &mut Ports<'_>,
        clock: &dyn ClockPort,
        until: Option<NaiveDateTime>,
        mut on_cycle: F,
    ) -> RunSummary
    where
        F: FnMut(NaiveDateTime, &CycleReport),
    {
        let mut summary = RunSummary::default();
        loop {
            if self.stop.is_stopped() {
                info!("stop requested, scheduler exiting");
                summary.stopped = true;
                break;
            }
            let Some(Reverse(task)) = self.queue.peek().copied() else {
                break;
            };
            if until.is_some_and(|end| task.due > end) {
                break;
            }
            self.queue.pop();

            if clock.now() < task.due {
                clock.sleep_until(task.due);
            }
            let now = clock.now();
            debug!(kind = ?task.kind, %now, "running task");

            match task.kind {
                TaskKind::TradingCycle => {
                    let report = ctx.run_cycle(ports, now);
                    summary.cycles += 1;
                    if let Some(MonitorStep::RetryIn(delay)) = report.connection {
                        self.schedule(TaskKind::ConnectionMonitor, now + to_chrono(delay));
                    }
                    on_cycle(now, &report);
                    self.schedule(TaskKind::TradingCycle, now + to_chrono(self.cycle_interval));
                }
                TaskKind::ConnectionMonitor => {
                    let step = ctx.monitor_connection(&mut *ports.venue, ports.notifier, now);
                    summary.connection_checks += 1;
                    let next = match step {
                        MonitorStep::RetryIn(delay) => delay,
                        _ => self.monitor_interval,
                    };
                    self.schedule(TaskKind::ConnectionMonitor, now + to_chrono(next));
                }
                TaskKind::ExitManager => {
                    summary.exit_updates += ctx.manage_exits(ports, now);
                    summary.exit_reviews += 1;
                    self.schedule(TaskKind::ExitManager, now + to_chrono(self.exit_interval));
                }
                TaskKind::ResumeEntries => {
                    summary.resumed_entries += ctx.resume_pending(ports, now).len();
                }
            }

            if let Some(due) = ctx.next_pending_due() {
                if self.due_of(TaskKind::ResumeEntries) != Some(due) {
                    self.schedule(TaskKind::ResumeEntries, due);
                }
            }
        }
        summary
    }
}
