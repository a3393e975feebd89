//! One daily run over all tracked assets.
//!
//! Every asset is resumed from the ledger, priced, decided and executed on
//! its own; a failure for one asset skips only that asset. The day's records
//! are appended in one batch, then metrics are recomputed from full history
//! and the summary persisted.

use chrono::NaiveDate;
use tracing::{debug, error, info, warn};

use super::account::AccountState;
use super::error::TradeLedgerError;
use super::execution::execute;
use super::metrics::Metrics;
use super::summary::{aggregate, SummaryRecord};
use super::trade_record::TradeRecord;
use crate::ports::decision_port::DecisionPort;
use crate::ports::ledger_port::LedgerStore;
use crate::ports::price_port::PricePort;
use crate::ports::summary_port::SummaryStore;

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub date: NaiveDate,
    pub assets: Vec<String>,
    pub initial_capital: f64,
}

#[derive(Debug)]
pub enum AssetOutcome {
    Recorded(TradeRecord),
    /// The ledger already holds a record for this asset and date.
    AlreadyRecorded,
    Skipped(TradeLedgerError),
}

#[derive(Debug)]
pub enum MetricsOutcome {
    Computed(Metrics),
    InsufficientHistory { records: usize },
    Failed(TradeLedgerError),
}

#[derive(Debug)]
pub struct RunReport {
    pub date: NaiveDate,
    pub outcomes: Vec<(String, AssetOutcome)>,
    pub metrics: Vec<(String, MetricsOutcome)>,
    pub summary: Vec<SummaryRecord>,
    /// False when the same summary rows were already the latest for the date.
    pub summary_written: bool,
}

impl RunReport {
    pub fn recorded(&self) -> impl Iterator<Item = &TradeRecord> {
        self.outcomes.iter().filter_map(|(_, o)| match o {
            AssetOutcome::Recorded(r) => Some(r),
            _ => None,
        })
    }

    pub fn skipped(&self) -> impl Iterator<Item = (&str, &TradeLedgerError)> {
        self.outcomes.iter().filter_map(|(asset, o)| match o {
            AssetOutcome::Skipped(e) => Some((asset.as_str(), e)),
            _ => None,
        })
    }
}

/// Resume, price, decide and execute one asset. A run date older than the
/// asset's last record is refused before any provider is asked.
pub fn step_asset(
    asset: &str,
    config: &RunConfig,
    ledger: &dyn LedgerStore,
    prices: &dyn PricePort,
    oracle: &dyn DecisionPort,
) -> Result<TradeRecord, TradeLedgerError> {
    let date = config.date;
    let history = ledger.load_all(asset)?;
    match history.last() {
        Some(last) if last.date > date => {
            return Err(TradeLedgerError::StaleRunDate {
                asset: asset.to_string(),
                date,
                last_recorded: last.date,
            });
        }
        Some(_) => {}
        None => info!(asset, "no history, starting from initial capital"),
    }
    let state =
        AccountState::resume_or_new(AccountState::from_history(&history), config.initial_capital);

    let price = prices
        .fetch_close(asset, date)?
        .ok_or_else(|| TradeLedgerError::MissingData {
            asset: asset.to_string(),
            date,
        })?;

    let decision = oracle.decide(asset, date)?;
    let (_, record) = execute(asset, date, &state, decision, price)?;
    debug!(asset, %decision, price, total_value = record.total_value, "executed");
    Ok(record)
}

pub fn run_daily(
    config: &RunConfig,
    ledger: &mut dyn LedgerStore,
    summaries: &mut dyn SummaryStore,
    prices: &dyn PricePort,
    oracle: &dyn DecisionPort,
) -> Result<RunReport, TradeLedgerError> {
    let date = config.date;
    info!(%date, assets = config.assets.len(), "starting daily run");

    let mut outcomes = Vec::with_capacity(config.assets.len());
    let mut batch = Vec::new();

    for asset in &config.assets {
        let outcome = match ledger.contains(asset, date) {
            Ok(true) => {
                info!(asset = %asset, %date, "already recorded, skipping");
                AssetOutcome::AlreadyRecorded
            }
            Ok(false) => match step_asset(asset, config, &*ledger, prices, oracle) {
                Ok(record) => {
                    info!(
                        asset = %asset,
                        decision = %record.decision,
                        price = record.price,
                        total_value = record.total_value,
                        pnl_pct = record.pnl_pct,
                        "recorded"
                    );
                    batch.push(record.clone());
                    AssetOutcome::Recorded(record)
                }
                Err(e) if e.is_asset_skip() => {
                    warn!(asset = %asset, error = %e, "skipping asset");
                    AssetOutcome::Skipped(e)
                }
                Err(e) => {
                    error!(asset = %asset, error = %e, "ledger problem, skipping asset");
                    AssetOutcome::Skipped(e)
                }
            },
            Err(e) => {
                error!(asset = %asset, error = %e, "cannot read ledger, skipping asset");
                AssetOutcome::Skipped(e)
            }
        };
        outcomes.push((asset.clone(), outcome));
    }

    if !batch.is_empty() {
        ledger.append_batch(&batch)?;
        info!(records = batch.len(), "ledger updated");
    }

    let metrics = compute_all_metrics(&config.assets, &*ledger);
    let computed: Vec<(String, Metrics)> = metrics
        .iter()
        .filter_map(|(asset, m)| match m {
            MetricsOutcome::Computed(m) => Some((asset.clone(), m.clone())),
            _ => None,
        })
        .collect();

    let summary = aggregate(date, &computed);
    let summary_written = persist_summary(summaries, date, &summary)?;

    Ok(RunReport {
        date,
        outcomes,
        metrics,
        summary,
        summary_written,
    })
}

/// Metrics for every asset from its full history; failures stay per asset.
pub fn compute_all_metrics(
    assets: &[String],
    ledger: &dyn LedgerStore,
) -> Vec<(String, MetricsOutcome)> {
    assets
        .iter()
        .map(|asset| {
            let outcome = match ledger.load_all(asset) {
                Ok(history) => match Metrics::compute(&history) {
                    Some(m) => MetricsOutcome::Computed(m),
                    None => {
                        debug!(asset = %asset, records = history.len(), "insufficient history");
                        MetricsOutcome::InsufficientHistory {
                            records: history.len(),
                        }
                    }
                },
                Err(e) => {
                    warn!(asset = %asset, error = %e, "cannot load history for metrics");
                    MetricsOutcome::Failed(e)
                }
            };
            (asset.clone(), outcome)
        })
        .collect()
}

fn persist_summary(
    summaries: &mut dyn SummaryStore,
    date: NaiveDate,
    rows: &[SummaryRecord],
) -> Result<bool, TradeLedgerError> {
    if rows.is_empty() {
        info!(%date, "no assets with enough history, summary not written");
        return Ok(false);
    }
    let mut persisted = summaries.load_for_date(date)?;
    let mut fresh = rows.to_vec();
    persisted.sort_by(|a, b| a.asset_id.cmp(&b.asset_id));
    fresh.sort_by(|a, b| a.asset_id.cmp(&b.asset_id));
    if persisted == fresh {
        info!(%date, "summary unchanged since last run, not appended");
        return Ok(false);
    }
    summaries.append(rows)?;
    Ok(true)
}
