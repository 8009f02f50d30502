//! CLI definition and dispatch.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::rc::Rc;

use chrono::{NaiveDateTime, NaiveTime};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::adapters::clock::VirtualClock;
use crate::adapters::csv_adapter::{CsvMarketData, parse_timestamp};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::log_notifier::LogNotifier;
use crate::adapters::paper_venue::PaperVenue;
use crate::domain::config::{EngineConfig, EngineSettings};
use crate::domain::engine::{AppContext, Decision, InstrumentOutcome, Ports};
use crate::domain::error::AmatraderError;
use crate::domain::execution::ExecOutcome;
use crate::domain::scheduler::{RunSummary, Scheduler};
use crate::domain::session::{SessionPolicy, active_overlaps};
use crate::domain::timeframe::Timeframe;

#[derive(Parser, Debug)]
#[command(name = "amatrader", about = "AMA confluence forex signal engine")]
pub struct Cli {
    /// Log filter such as `info` or `amatrader=debug`. Overrides RUST_LOG.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Paper-trade over CSV bar files with the in-memory venue
    Run {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        data_dir: PathBuf,
        #[arg(long, default_value_t = 10_000.0)]
        balance: f64,
        #[arg(long, default_value_t = 1.0)]
        spread_pips: f64,
        /// First timestamp to trade (defaults to the first bar)
        #[arg(long)]
        from: Option<String>,
        /// Last timestamp to trade (defaults to the last bar)
        #[arg(long)]
        to: Option<String>,
    },
    /// Evaluate one instrument once and print the decision
    Analyze {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        data_dir: PathBuf,
        #[arg(short, long)]
        instrument: String,
        /// Evaluation time (defaults to the last bar)
        #[arg(long)]
        at: Option<String>,
        #[arg(long, default_value_t = 1.0)]
        spread_pips: f64,
    },
    /// Show the session status of an instrument at a session-clock time
    Session {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        instrument: String,
        /// Time of day on the session clock, HH:MM
        #[arg(short, long)]
        time: String,
    },
    /// Print the effective configuration after clamping
    Validate {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

/// Installs the global subscriber. Safe to call more than once.
pub fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn run(cli: Cli) -> ExitCode {
    init_logging(cli.log_level.as_deref());
    let result = match cli.command {
        Command::Run {
            config,
            data_dir,
            balance,
            spread_pips,
            from,
            to,
        } => run_paper_command(
            config.as_deref(),
            &data_dir,
            balance,
            spread_pips,
            from.as_deref(),
            to.as_deref(),
        ),
        Command::Analyze {
            config,
            data_dir,
            instrument,
            at,
            spread_pips,
        } => run_analyze(config.as_deref(), &data_dir, &instrument, at.as_deref(), spread_pips),
        Command::Session {
            config,
            instrument,
            time,
        } => run_session(config.as_deref(), &instrument, &time),
        Command::Validate { config } => run_validate(config.as_deref()),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, AmatraderError> {
    FileConfigAdapter::from_file(path).map_err(|e| AmatraderError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Typed configuration from `path`, or all defaults when no file is given.
pub fn load_engine_config(path: Option<&Path>) -> Result<EngineConfig, AmatraderError> {
    match path {
        Some(path) => {
            let adapter = load_config(path)?;
            Ok(EngineConfig::load(&adapter))
        }
        None => Ok(EngineConfig::default()),
    }
}

pub fn parse_session_time(raw: &str) -> Result<NaiveTime, AmatraderError> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw.trim(), "%H:%M:%S"))
        .map_err(|_| AmatraderError::Invalid {
            field: "time".into(),
            reason: format!("expected HH:MM, got {raw}"),
        })
}

fn load_market(
    config: &EngineConfig,
    data_dir: &Path,
    clock: Rc<VirtualClock>,
    spread_pips: f64,
) -> Result<CsvMarketData, AmatraderError> {
    let mut market = CsvMarketData::new(clock, spread_pips);
    let loaded = market.load_dir(data_dir, &config.engine.instruments, &Timeframe::ALL)?;
    if loaded == 0 {
        return Err(AmatraderError::NoData {
            instrument: config.engine.instruments.join(","),
            timeframe: "any".into(),
        });
    }
    Ok(market)
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaperSummary {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub run: RunSummary,
    pub entries: usize,
    pub closed_trades: usize,
    pub winning_trades: usize,
    pub initial_balance: f64,
    pub final_balance: f64,
}

/// Replays the bar files in `data_dir` through the full engine against the
/// in-memory venue, on a virtual clock.
pub fn run_paper(
    config: EngineConfig,
    data_dir: &Path,
    balance: f64,
    spread_pips: f64,
    from: Option<NaiveDateTime>,
    to: Option<NaiveDateTime>,
) -> Result<PaperSummary, AmatraderError> {
    let clock = Rc::new(VirtualClock::new(NaiveDateTime::MIN));
    let market = load_market(&config, data_dir, clock.clone(), spread_pips)?;
    let (first, last) = market.time_range().ok_or_else(|| AmatraderError::NoData {
        instrument: config.engine.instruments.join(","),
        timeframe: "any".into(),
    })?;
    let start = from.unwrap_or(first);
    let end = to.unwrap_or(last);
    if end < start {
        return Err(AmatraderError::Invalid {
            field: "to".into(),
            reason: format!("{end} is before {start}"),
        });
    }
    clock.set(start);
    info!(%start, %end, balance, "paper run starting");

    let notifier = LogNotifier;
    let mut venue = PaperVenue::new(&market, balance);
    let mut ctx = AppContext::new(config);
    let mut scheduler = Scheduler::for_context(&ctx, start);
    let mut entries = 0;

    let run = {
        let mut ports = Ports {
            market: &market,
            venue: &mut venue,
            notifier: &notifier,
        };
        scheduler.run(&mut ctx, &mut ports, clock.as_ref(), Some(end), |_, report| {
            entries += report
                .outcomes
                .iter()
                .filter(|(_, o)| {
                    matches!(o, InstrumentOutcome::Executed(ExecOutcome::Opened { .. }))
                })
                .count();
        })
    };

    let trades = venue.closed_trades();
    let summary = PaperSummary {
        start,
        end,
        run,
        entries,
        closed_trades: trades.len(),
        winning_trades: trades.iter().filter(|t| t.pnl > 0.0).count(),
        initial_balance: balance,
        final_balance: venue.balance(),
    };
    info!(
        cycles = summary.run.cycles,
        entries = summary.entries,
        closed = summary.closed_trades,
        final_balance = summary.final_balance,
        "paper run finished"
    );
    Ok(summary)
}

fn run_paper_command(
    config_path: Option<&Path>,
    data_dir: &Path,
    balance: f64,
    spread_pips: f64,
    from: Option<&str>,
    to: Option<&str>,
) -> Result<(), AmatraderError> {
    let config = load_engine_config(config_path)?;
    let from = from.map(parse_timestamp).transpose()?;
    let to = to.map(parse_timestamp).transpose()?;
    let s = run_paper(config, data_dir, balance, spread_pips, from, to)?;

    println!("period:        {} to {}", s.start, s.end);
    println!("cycles:        {}", s.run.cycles);
    println!("entries:       {}", s.entries);
    println!("exit updates:  {}", s.run.exit_updates);
    println!(
        "closed trades: {} ({} winning)",
        s.closed_trades, s.winning_trades
    );
    println!(
        "balance:       {:.2} -> {:.2} ({:+.2})",
        s.initial_balance,
        s.final_balance,
        s.final_balance - s.initial_balance
    );
    Ok(())
}

/// Analysis of one instrument at `at` (or the last available bar).
pub fn analyze_once(
    config: EngineConfig,
    data_dir: &Path,
    instrument: &str,
    at: Option<NaiveDateTime>,
    spread_pips: f64,
) -> Result<Decision, AmatraderError> {
    let instrument = instrument.to_ascii_uppercase();
    let config = EngineConfig {
        engine: EngineSettings {
            instruments: vec![instrument.clone()],
            ..config.engine
        },
        ..config
    };
    let clock = Rc::new(VirtualClock::new(NaiveDateTime::MIN));
    let market = load_market(&config, data_dir, clock.clone(), spread_pips)?;
    let now = match at {
        Some(at) => at,
        None => market
            .time_range()
            .map(|(_, last)| last)
            .ok_or_else(|| AmatraderError::NoData {
                instrument: instrument.clone(),
                timeframe: "any".into(),
            })?,
    };
    clock.set(now);
    let mut ctx = AppContext::new(config);
    ctx.analyze(&market, &instrument, now)
}

fn run_analyze(
    config_path: Option<&Path>,
    data_dir: &Path,
    instrument: &str,
    at: Option<&str>,
    spread_pips: f64,
) -> Result<(), AmatraderError> {
    let config = load_engine_config(config_path)?;
    let at = at.map(parse_timestamp).transpose()?;
    let d = analyze_once(config, data_dir, instrument, at, spread_pips)?;

    println!("{} on {}", d.instrument, d.timeframe);
    println!("session:   {}", d.session);
    println!("signal:    {}", d.signal);
    if !d.signal.reasons.is_empty() {
        println!("reasons:   {}", d.signal.reasons.join(", "));
    }
    println!(
        "trend:     {} (conflict={}, confidence={})",
        d.trend.recommendation, d.trend.conflict, d.trend.confidence
    );
    if let Some(mtf) = &d.mtf {
        println!(
            "mtf:       agreement {:.2}, tradable={}",
            mtf.agreement, mtf.tradable
        );
        for vote in &mtf.votes {
            println!(
                "  {} w={:.1} buy={:.1} sell={:.1} -> {}",
                vote.timeframe, vote.weight, vote.buy_score, vote.sell_score, vote.direction
            );
        }
    }
    for (name, value) in d.snapshot.values() {
        println!("  {name:<16} {value:.5}");
    }
    Ok(())
}

fn run_session(
    config_path: Option<&Path>,
    instrument: &str,
    time: &str,
) -> Result<(), AmatraderError> {
    let config = load_engine_config(config_path)?;
    let time = parse_session_time(time)?;
    let policy = SessionPolicy::new(config.session);
    let instrument = instrument.to_ascii_uppercase();
    let status = policy.status(&instrument, time);
    println!("{instrument} at {time}: {status}");
    let overlaps = active_overlaps(time);
    if !overlaps.is_empty() {
        println!("overlaps: {}", overlaps.join(", "));
    }
    println!("tradeable: {}", status.should_trade());
    Ok(())
}

fn run_validate(config_path: Option<&Path>) -> Result<(), AmatraderError> {
    let config = load_engine_config(config_path)?;
    print!("{config}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_time_parses_both_forms() {
        assert_eq!(
            parse_session_time("09:30").unwrap(),
            NaiveTime::from_hms_opt(9, 30, 0).unwrap()
        );
        assert_eq!(
            parse_session_time("23:15:10").unwrap(),
            NaiveTime::from_hms_opt(23, 15, 10).unwrap()
        );
        assert!(parse_session_time("9h30").is_err());
    }

    #[test]
    fn missing_config_file_is_config_error() {
        let err = load_engine_config(Some(Path::new("/nonexistent/amatrader.ini"))).unwrap_err();
        assert_eq!(err.kind(), crate::domain::error::ErrorKind::Config);
    }

    #[test]
    fn cli_parses_global_log_level() {
        let cli = Cli::try_parse_from([
            "amatrader",
            "session",
            "--instrument",
            "eurusd",
            "--time",
            "09:30",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(matches!(cli.command, Command::Session { .. }));
    }
}
