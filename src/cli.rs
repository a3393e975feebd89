//! CLI definition and dispatch.

use chrono::{Days, Local, NaiveDate};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::adapters::command_decision_adapter::CommandDecisionAdapter;
use crate::adapters::csv_decision_adapter::CsvDecisionAdapter;
use crate::adapters::csv_ledger_adapter::CsvLedgerAdapter;
use crate::adapters::csv_price_adapter::CsvPriceAdapter;
use crate::adapters::csv_summary_adapter::CsvSummaryAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::memory_adapter::{InMemoryLedger, InMemorySummaryStore};
use crate::adapters::timeout_adapter::{TimeoutDecisionAdapter, TimeoutPriceAdapter};
use crate::domain::account::AccountState;
use crate::domain::config_validation::{validate_ledger_config, validate_run_config};
use crate::domain::daily_run::{
    compute_all_metrics, run_daily, AssetOutcome, MetricsOutcome, RunConfig, RunReport,
};
use crate::domain::error::TradeLedgerError;
use crate::domain::metrics::Metrics;
use crate::domain::summary::{aggregate, SummaryRecord};
use crate::domain::universe::parse_assets;
use crate::ports::config_port::ConfigPort;
use crate::ports::decision_port::DecisionPort;
use crate::ports::ledger_port::LedgerStore;
use crate::ports::price_port::PricePort;
use crate::ports::summary_port::SummaryStore;

pub const DEFAULT_RECORD_FILE: &str = "multi_stock_performance.csv";
pub const DEFAULT_SUMMARY_FILE: &str = "daily_summary.csv";
const DEFAULT_PRICE_TIMEOUT_SECS: i64 = 30;
const DEFAULT_ORACLE_TIMEOUT_SECS: i64 = 600;

#[derive(Parser, Debug)]
#[command(name = "tradeledger", about = "Daily multi-asset trading ledger")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Record one trading day for every tracked asset
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// Trading date (YYYY-MM-DD); defaults to yesterday
        #[arg(short, long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Show the latest account state per asset
    Status {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Recompute and print metrics from the ledger without writing
    Report {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

/// Logs go to stderr, filtered by `RUST_LOG` (default `info`).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Run {
            config,
            date,
            dry_run,
        } => run_daily_command(&config, date, dry_run),
        Command::Status { config } => run_status(&config),
        Command::Report { config } => run_report(&config),
        Command::Validate { config } => run_validate(&config),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|err| {
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn fail(err: TradeLedgerError) -> ExitCode {
    eprintln!("error: {err}");
    (&err).into()
}

/// Yesterday in local time, the last complete trading day for a job run
/// after the close.
pub fn resolve_date(date: Option<NaiveDate>) -> NaiveDate {
    date.unwrap_or_else(|| {
        let today = Local::now().date_naive();
        today.checked_sub_days(Days::new(1)).unwrap_or(today)
    })
}

pub fn configured_assets(config: &dyn ConfigPort) -> Result<Vec<String>, TradeLedgerError> {
    let raw = config
        .get_string("portfolio", "assets")
        .ok_or_else(|| TradeLedgerError::ConfigMissing {
            section: "portfolio".into(),
            key: "assets".into(),
        })?;
    parse_assets(&raw).map_err(|e| TradeLedgerError::ConfigInvalid {
        section: "portfolio".into(),
        key: "assets".into(),
        reason: e.to_string(),
    })
}

pub fn build_run_config(
    config: &dyn ConfigPort,
    date: NaiveDate,
) -> Result<RunConfig, TradeLedgerError> {
    Ok(RunConfig {
        date,
        assets: configured_assets(config)?,
        initial_capital: config.get_double("portfolio", "initial_capital", 10_000.0),
    })
}

pub type Stores = (Box<dyn LedgerStore>, Box<dyn SummaryStore>);

/// Ledger and summary stores for the configured backend.
pub fn open_stores(config: &FileConfigAdapter) -> Result<Stores, TradeLedgerError> {
    let backend = config
        .get_string("ledger", "backend")
        .unwrap_or_else(|| "csv".to_string());

    match backend.as_str() {
        "sqlite" => open_sqlite_stores(config),
        _ => {
            let record_file = config
                .get_path("ledger", "record_file")
                .unwrap_or_else(|| config.resolve_path(DEFAULT_RECORD_FILE));
            let summary_file = config
                .get_path("ledger", "summary_file")
                .unwrap_or_else(|| config.resolve_path(DEFAULT_SUMMARY_FILE));
            info!(ledger = %record_file.display(), summary = %summary_file.display(), "using csv ledger");
            Ok((
                Box::new(CsvLedgerAdapter::new(record_file)),
                Box::new(CsvSummaryAdapter::new(summary_file)),
            ))
        }
    }
}

#[cfg(feature = "sqlite")]
fn open_sqlite_stores(config: &FileConfigAdapter) -> Result<Stores, TradeLedgerError> {
    use crate::adapters::sqlite_adapter::SqliteAdapter;

    let path = config
        .get_path("sqlite", "path")
        .ok_or_else(|| TradeLedgerError::ConfigMissing {
            section: "sqlite".into(),
            key: "path".into(),
        })?;
    let pool_size = u32::try_from(config.get_int("sqlite", "pool_size", 4))
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| TradeLedgerError::ConfigInvalid {
            section: "sqlite".into(),
            key: "pool_size".into(),
            reason: "pool_size must be between 1 and 4294967295".into(),
        })?;
    info!(path = %path.display(), pool_size, "using sqlite ledger");

    Ok((
        Box::new(SqliteAdapter::open(&path, pool_size)?),
        Box::new(SqliteAdapter::open(&path, pool_size)?),
    ))
}

#[cfg(not(feature = "sqlite"))]
fn open_sqlite_stores(_config: &FileConfigAdapter) -> Result<Stores, TradeLedgerError> {
    Err(TradeLedgerError::ConfigInvalid {
        section: "ledger".into(),
        key: "backend".into(),
        reason: "sqlite feature is required for the sqlite backend".into(),
    })
}

fn timeout_of(config: &dyn ConfigPort, section: &str, default: i64) -> Duration {
    Duration::from_secs(config.get_int(section, "timeout_secs", default).max(1) as u64)
}

/// Price and decision providers, each bounded by the configured timeout.
pub fn build_providers(
    config: &FileConfigAdapter,
) -> Result<(Box<dyn PricePort>, Box<dyn DecisionPort>), TradeLedgerError> {
    let price_dir = config
        .get_path("prices", "dir")
        .ok_or_else(|| TradeLedgerError::ConfigMissing {
            section: "prices".into(),
            key: "dir".into(),
        })?;
    let prices = TimeoutPriceAdapter::new(
        Arc::new(CsvPriceAdapter::new(price_dir)),
        timeout_of(config, "prices", DEFAULT_PRICE_TIMEOUT_SECS),
    );

    let kind = config
        .get_string("oracle", "kind")
        .unwrap_or_else(|| "csv".to_string());
    let oracle_timeout = timeout_of(config, "oracle", DEFAULT_ORACLE_TIMEOUT_SECS);
    let oracle: Box<dyn DecisionPort> = match kind.as_str() {
        // Killed at its own deadline rather than wrapped in a worker thread.
        "command" => {
            let program = config.get_string("oracle", "command").ok_or_else(|| {
                TradeLedgerError::ConfigMissing {
                    section: "oracle".into(),
                    key: "command".into(),
                }
            })?;
            let args = config.get_string("oracle", "args").unwrap_or_default();
            Box::new(
                CommandDecisionAdapter::with_arg_string(program, &args)
                    .with_timeout(oracle_timeout),
            )
        }
        _ => {
            let signals = config.get_path("oracle", "signals_file").ok_or_else(|| {
                TradeLedgerError::ConfigMissing {
                    section: "oracle".into(),
                    key: "signals_file".into(),
                }
            })?;
            Box::new(TimeoutDecisionAdapter::new(
                Arc::new(CsvDecisionAdapter::new(signals)),
                oracle_timeout,
            ))
        }
    };

    Ok((Box::new(prices), oracle))
}

/// Copies the persisted ledger and summaries into memory so a dry run can
/// go through the same flow without writing.
fn dry_run_stores(assets: &[String], stores: &Stores) -> Result<Stores, TradeLedgerError> {
    let (ledger, summaries) = stores;
    let mut records = Vec::new();
    let mut corrupt = Vec::new();
    for asset in assets {
        match ledger.load_all(asset) {
            Ok(history) => records.extend(history),
            Err(TradeLedgerError::CorruptLedger {
                source_name,
                line,
                reason,
            }) => corrupt.push((asset, source_name, line, reason)),
            Err(e) => return Err(e),
        }
    }
    let mut copy = InMemoryLedger::from_records(records);
    for (asset, source_name, line, reason) in corrupt {
        copy.mark_corrupt(asset, &source_name, line, &reason);
    }
    Ok((
        Box::new(copy),
        Box::new(InMemorySummaryStore::from_rows(summaries.load_all()?)),
    ))
}

fn run_daily_command(config_path: &Path, date: Option<NaiveDate>, dry_run: bool) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    if let Err(e) = validate_run_config(&config) {
        return fail(e);
    }

    let run_config = match build_run_config(&config, resolve_date(date)) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };
    let stores = match open_stores(&config) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    let (prices, oracle) = match build_providers(&config) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };

    let (mut ledger, mut summaries) = if dry_run {
        eprintln!("Dry run: nothing will be written");
        match dry_run_stores(&run_config.assets, &stores) {
            Ok(s) => s,
            Err(e) => return fail(e),
        }
    } else {
        stores
    };

    let report = match run_daily(
        &run_config,
        ledger.as_mut(),
        summaries.as_mut(),
        prices.as_ref(),
        oracle.as_ref(),
    ) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };

    print_run_report(&report);
    run_exit_code(&report)
}

/// Success unless every asset was skipped; then the first skip decides the
/// exit code.
pub fn run_exit_code(report: &RunReport) -> ExitCode {
    let any_ok = report
        .outcomes
        .iter()
        .any(|(_, o)| !matches!(o, AssetOutcome::Skipped(_)));
    if any_ok || report.outcomes.is_empty() {
        return ExitCode::SUCCESS;
    }
    match report.skipped().next() {
        Some((_, err)) => err.into(),
        None => ExitCode::SUCCESS,
    }
}

fn print_run_report(report: &RunReport) {
    eprintln!("\n=== Run {} ===", report.date);
    for (asset, outcome) in &report.outcomes {
        match outcome {
            AssetOutcome::Recorded(r) => {
                let sign = if r.pnl_pct >= 0.0 { "+" } else { "" };
                eprintln!(
                    "  {}: {} @ {:.2}, value {:.2} ({}{:.2}%)",
                    asset, r.decision, r.price, r.total_value, sign, r.pnl_pct
                );
            }
            AssetOutcome::AlreadyRecorded => eprintln!("  {}: already recorded", asset),
            AssetOutcome::Skipped(e) => eprintln!("  {}: skipped ({})", asset, e),
        }
    }

    print_metrics_notes(&report.metrics);
    if report.summary.is_empty() {
        eprintln!("\nNo asset has enough history for metrics yet");
        return;
    }
    print_summary_table(&report.summary);
    if !report.summary_written {
        eprintln!("Summary unchanged, not appended");
    }
}

fn print_metrics_notes(metrics: &[(String, MetricsOutcome)]) {
    for (asset, outcome) in metrics {
        match outcome {
            MetricsOutcome::Computed(_) => {}
            MetricsOutcome::InsufficientHistory { records } => {
                let err = TradeLedgerError::InsufficientHistory {
                    asset: asset.clone(),
                    records: *records,
                };
                eprintln!("  note: {err}");
            }
            MetricsOutcome::Failed(e) => eprintln!("  warning: metrics for {} failed ({})", asset, e),
        }
    }
}

pub fn print_summary_table(rows: &[SummaryRecord]) {
    eprintln!("\n=== Summary ===");
    println!(
        "{:<14} {:>14} {:>8} {:>14} {:>10}",
        "asset", "annual_ret_%", "sharpe", "max_dd_%", "pnl_%"
    );
    for row in rows {
        if row.is_portfolio_average() {
            println!("{}", "-".repeat(64));
        }
        println!(
            "{:<14} {:>14.2} {:>8.2} {:>14.2} {:>10.2}",
            row.asset_id,
            row.annual_return_pct,
            row.sharpe_ratio,
            row.max_drawdown_pct,
            row.total_pnl_pct
        );
    }
}

fn run_status(config_path: &Path) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    if let Err(e) = validate_ledger_config(&config) {
        return fail(e);
    }
    let assets = match configured_assets(&config) {
        Ok(a) => a,
        Err(e) => return fail(e),
    };
    let (ledger, _) = match open_stores(&config) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    println!(
        "{:<8} {:<10} {:<5} {:>12} {:>14} {:>12} {:>9}",
        "asset", "date", "last", "cash", "position", "value", "pnl_%"
    );
    let mut exit = ExitCode::SUCCESS;
    for asset in &assets {
        let history = match ledger.load_all(asset) {
            Ok(h) => h,
            Err(e) => {
                eprintln!("error: {asset}: {e}");
                exit = (&e).into();
                continue;
            }
        };
        match (history.last(), AccountState::from_history(&history)) {
            (Some(last), Some(state)) => println!(
                "{:<8} {:<10} {:<5} {:>12.2} {:>14.6} {:>12.2} {:>9.2}",
                asset,
                last.date,
                last.decision,
                state.cash,
                state.position,
                state.total_value,
                state.pnl_pct()
            ),
            _ => println!("{:<8} no records", asset),
        }
    }
    exit
}

fn run_report(config_path: &Path) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    if let Err(e) = validate_ledger_config(&config) {
        return fail(e);
    }
    let assets = match configured_assets(&config) {
        Ok(a) => a,
        Err(e) => return fail(e),
    };
    let (ledger, _) = match open_stores(&config) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    let mut latest: Option<NaiveDate> = None;
    for asset in &assets {
        match ledger.load_all(asset) {
            Ok(history) => {
                if let Some(last) = history.last() {
                    latest = latest.max(Some(last.date));
                }
            }
            Err(e) => warn!(asset = %asset, error = %e, "cannot load history"),
        }
    }
    let Some(as_of) = latest else {
        eprintln!("Ledger is empty");
        return ExitCode::SUCCESS;
    };

    let metrics = compute_all_metrics(&assets, ledger.as_ref());
    print_metrics_notes(&metrics);
    let computed: Vec<(String, Metrics)> = metrics
        .into_iter()
        .filter_map(|(asset, m)| match m {
            MetricsOutcome::Computed(m) => Some((asset, m)),
            _ => None,
        })
        .collect();

    let rows = aggregate(as_of, &computed);
    if rows.is_empty() {
        eprintln!("No asset has enough history for metrics yet");
        return ExitCode::SUCCESS;
    }
    eprintln!("Metrics as of {}", as_of);
    print_summary_table(&rows);
    ExitCode::SUCCESS
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    if let Err(e) = validate_run_config(&config) {
        return fail(e);
    }
    let assets = match configured_assets(&config) {
        Ok(a) => a,
        Err(e) => return fail(e),
    };

    eprintln!("  assets:          {}", assets.join(", "));
    eprintln!(
        "  initial capital: {:.2}",
        config.get_double("portfolio", "initial_capital", 10_000.0)
    );
    eprintln!(
        "  ledger backend:  {}",
        config
            .get_string("ledger", "backend")
            .unwrap_or_else(|| "csv".to_string())
    );
    eprintln!(
        "  oracle:          {}",
        config
            .get_string("oracle", "kind")
            .unwrap_or_else(|| "csv".to_string())
    );
    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::decision::Decision;
    use crate::domain::execution::execute;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 8, d).unwrap()
    }

    #[test]
    fn cli_parses_run_with_date() {
        let cli = Cli::try_parse_from([
            "tradeledger",
            "run",
            "--config",
            "t.ini",
            "--date",
            "2024-08-02",
            "--dry-run",
        ])
        .unwrap();
        match cli.command {
            Command::Run {
                config,
                date,
                dry_run,
            } => {
                assert_eq!(config, PathBuf::from("t.ini"));
                assert_eq!(date, Some(day(2)));
                assert!(dry_run);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn cli_rejects_bad_date() {
        assert!(
            Cli::try_parse_from(["tradeledger", "run", "-c", "t.ini", "-d", "08/02/2024"]).is_err()
        );
    }

    #[test]
    fn resolve_date_prefers_explicit() {
        assert_eq!(resolve_date(Some(day(5))), day(5));
        let yesterday = resolve_date(None);
        assert!(yesterday < Local::now().date_naive());
    }

    #[test]
    fn build_run_config_reads_portfolio() {
        let config = FileConfigAdapter::from_string(
            "[portfolio]\nassets = aapl, nvda\ninitial_capital = 2500\n",
        )
        .unwrap();
        let run = build_run_config(&config, day(1)).unwrap();
        assert_eq!(run.assets, vec!["AAPL", "NVDA"]);
        assert_eq!(run.initial_capital, 2500.0);
        assert_eq!(run.date, day(1));
    }

    #[test]
    fn build_run_config_defaults_capital() {
        let config = FileConfigAdapter::from_string("[portfolio]\nassets = AAPL\n").unwrap();
        assert_eq!(build_run_config(&config, day(1)).unwrap().initial_capital, 10_000.0);
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn oversized_sqlite_pool_is_config_error() {
        let config = FileConfigAdapter::from_string(
            "[ledger]\nbackend = sqlite\n[sqlite]\npath = t.db\npool_size = 4294967296\n",
        )
        .unwrap();
        assert!(matches!(
            open_stores(&config),
            Err(TradeLedgerError::ConfigInvalid { key, .. }) if key == "pool_size"
        ));
    }

    #[test]
    fn exit_code_is_success_with_partial_skip() {
        let (_, record) =
            execute("AAPL", day(1), &AccountState::new(100.0), Decision::Hold, 10.0).unwrap();
        let report = RunReport {
            date: day(1),
            outcomes: vec![
                ("AAPL".into(), AssetOutcome::Recorded(record)),
                (
                    "NVDA".into(),
                    AssetOutcome::Skipped(TradeLedgerError::MissingData {
                        asset: "NVDA".into(),
                        date: day(1),
                    }),
                ),
            ],
            metrics: vec![],
            summary: vec![],
            summary_written: false,
        };
        assert_eq!(run_exit_code(&report), ExitCode::SUCCESS);
    }

    #[test]
    fn exit_code_reflects_total_failure() {
        let report = RunReport {
            date: day(1),
            outcomes: vec![(
                "NVDA".into(),
                AssetOutcome::Skipped(TradeLedgerError::Provider {
                    asset: "NVDA".into(),
                    reason: "down".into(),
                }),
            )],
            metrics: vec![],
            summary: vec![],
            summary_written: false,
        };
        assert_eq!(run_exit_code(&report), ExitCode::from(4));
    }
}
