//! CSV file ledger adapter.
//!
//! One human-readable row per record, header written only when the file is
//! created. Loading validates every row. Structural damage, including a
//! truncated trailing write, fails the whole file; a row that parses but is
//! invalid fails closed for its own asset only.

use chrono::NaiveDate;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::csv_support::{append_rows, check_header, open_reader, read_error, RowContext};
use crate::domain::decision::Decision;
use crate::domain::error::TradeLedgerError;
use crate::domain::trade_record::TradeRecord;
use crate::ports::ledger_port::{check_batch, LedgerStore};

pub const LEDGER_HEADER: [&str; 10] = [
    "date",
    "asset_id",
    "decision",
    "price",
    "cash",
    "position",
    "in_position",
    "total_value",
    "pnl_pct",
    "initial_capital",
];

pub struct CsvLedgerAdapter {
    path: PathBuf,
}

impl CsvLedgerAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn source_name(&self) -> String {
        self.path.display().to_string()
    }

    /// Reads the whole file. Structural damage (foreign header, wrong field
    /// count, truncated trailing write) fails the whole file; a row that
    /// parses but breaks its checks only poisons its own asset.
    pub fn scan(&self) -> Result<LedgerScan, TradeLedgerError> {
        let source_name = self.source_name();
        let mut scan = LedgerScan::default();
        let mut reader = match open_reader(&self.path)? {
            Some(r) => r,
            None => return Ok(scan),
        };
        check_header(&mut reader, &LEDGER_HEADER, &source_name)?;

        let mut last_dates: HashMap<String, NaiveDate> = HashMap::new();

        for result in reader.records() {
            let row = result.map_err(|e| read_error(e, &source_name))?;
            let ctx = RowContext {
                source_name: &source_name,
                line: row.position().map(|p| p.line()).unwrap_or(0),
            };
            let asset_id = row_asset(&row, &ctx)?;
            if scan.corrupt.contains_key(&asset_id) {
                continue;
            }

            let checked = parse_row(&row, asset_id.clone(), &ctx).and_then(|record| {
                match last_dates.get(&record.asset_id) {
                    Some(prev) if record.date <= *prev => Err(ctx.corrupt(format!(
                        "{} on {} does not follow its previous record on {}",
                        record.asset_id, record.date, prev
                    ))),
                    _ => Ok(record),
                }
            });
            match checked {
                Ok(record) => {
                    last_dates.insert(record.asset_id.clone(), record.date);
                    scan.records.push(record);
                }
                Err(TradeLedgerError::CorruptLedger { line, reason, .. }) => {
                    warn!(path = %source_name, asset = %asset_id, line, %reason, "corrupt ledger row");
                    scan.corrupt.insert(asset_id, (line, reason));
                }
                Err(e) => return Err(e),
            }
        }

        debug!(
            path = %source_name,
            records = scan.records.len(),
            corrupt_assets = scan.corrupt.len(),
            "ledger loaded"
        );
        Ok(scan)
    }

    fn corrupt_error(&self, line: u64, reason: &str) -> TradeLedgerError {
        TradeLedgerError::CorruptLedger {
            source_name: self.source_name(),
            line,
            reason: reason.to_string(),
        }
    }
}

/// Result of reading the ledger file: the valid records, and for each asset
/// with a bad row, the first offending line and why.
#[derive(Debug, Default)]
pub struct LedgerScan {
    pub records: Vec<TradeRecord>,
    pub corrupt: HashMap<String, (u64, String)>,
}

fn row_asset(row: &csv::StringRecord, ctx: &RowContext<'_>) -> Result<String, TradeLedgerError> {
    if row.len() != LEDGER_HEADER.len() {
        return Err(ctx.corrupt(format!(
            "expected {} fields, found {}",
            LEDGER_HEADER.len(),
            row.len()
        )));
    }
    let asset_id = row.get(1).unwrap_or_default().trim().to_string();
    if asset_id.is_empty() {
        return Err(ctx.corrupt("empty asset_id"));
    }
    Ok(asset_id)
}

fn parse_row(
    row: &csv::StringRecord,
    asset_id: String,
    ctx: &RowContext<'_>,
) -> Result<TradeRecord, TradeLedgerError> {
    let date_str = row.get(0).unwrap_or_default();
    let date = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d")
        .map_err(|e| ctx.corrupt(format!("invalid date {date_str:?}: {e}")))?;

    let record = TradeRecord {
        date,
        asset_id,
        decision: ctx.field::<Decision>(row, 2, "decision")?,
        price: ctx.field(row, 3, "price")?,
        cash: ctx.field(row, 4, "cash")?,
        position: ctx.field(row, 5, "position")?,
        in_position: ctx.bool_field(row, 6, "in_position")?,
        total_value: ctx.field(row, 7, "total_value")?,
        pnl_pct: ctx.field(row, 8, "pnl_pct")?,
        initial_capital: ctx.field(row, 9, "initial_capital")?,
    };
    record.check_invariants().map_err(|reason| ctx.corrupt(reason))?;
    Ok(record)
}

pub fn format_row(record: &TradeRecord) -> Vec<String> {
    vec![
        record.date.format("%Y-%m-%d").to_string(),
        record.asset_id.clone(),
        record.decision.to_string(),
        record.price.to_string(),
        record.cash.to_string(),
        record.position.to_string(),
        record.in_position.to_string(),
        record.total_value.to_string(),
        record.pnl_pct.to_string(),
        record.initial_capital.to_string(),
    ]
}

impl LedgerStore for CsvLedgerAdapter {
    fn load_all(&self, asset_id: &str) -> Result<Vec<TradeRecord>, TradeLedgerError> {
        let scan = self.scan()?;
        if let Some((line, reason)) = scan.corrupt.get(asset_id) {
            return Err(self.corrupt_error(*line, reason));
        }
        Ok(scan
            .records
            .into_iter()
            .filter(|r| r.asset_id == asset_id)
            .collect())
    }

    fn append_batch(&mut self, records: &[TradeRecord]) -> Result<(), TradeLedgerError> {
        if records.is_empty() {
            return Ok(());
        }
        // Structural damage fails the scan, so nothing is appended behind a
        // partial line.
        let scan = self.scan()?;
        for record in records {
            if let Some((line, reason)) = scan.corrupt.get(&record.asset_id) {
                return Err(self.corrupt_error(*line, reason));
            }
        }
        check_batch(&scan.records, records)?;

        let rows: Vec<Vec<String>> = records.iter().map(format_row).collect();
        append_rows(&self.path, &LEDGER_HEADER, &rows)?;
        debug!(path = %self.source_name(), appended = rows.len(), "ledger appended");
        Ok(())
    }
}
