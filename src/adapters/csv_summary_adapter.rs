//! CSV file summary adapter.

use chrono::NaiveDate;
use std::path::{Path, PathBuf};

use super::csv_support::{append_rows, check_header, open_reader, read_error, RowContext};
use crate::domain::error::TradeLedgerError;
use crate::domain::summary::SummaryRecord;
use crate::ports::summary_port::SummaryStore;

pub const SUMMARY_HEADER: [&str; 6] = [
    "date",
    "asset_id",
    "annual_return_pct",
    "sharpe_ratio",
    "max_drawdown_pct",
    "total_pnl_pct",
];

pub struct CsvSummaryAdapter {
    path: PathBuf,
}

impl CsvSummaryAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SummaryStore for CsvSummaryAdapter {
    fn append(&mut self, rows: &[SummaryRecord]) -> Result<(), TradeLedgerError> {
        if rows.is_empty() {
            return Ok(());
        }
        // Never append behind a damaged file.
        self.load_all()?;

        let formatted: Vec<Vec<String>> = rows
            .iter()
            .map(|r| {
                vec![
                    r.date.format("%Y-%m-%d").to_string(),
                    r.asset_id.clone(),
                    r.annual_return_pct.to_string(),
                    r.sharpe_ratio.to_string(),
                    r.max_drawdown_pct.to_string(),
                    r.total_pnl_pct.to_string(),
                ]
            })
            .collect();
        append_rows(&self.path, &SUMMARY_HEADER, &formatted)
    }

    fn load_all(&self) -> Result<Vec<SummaryRecord>, TradeLedgerError> {
        let source_name = self.path.display().to_string();
        let mut reader = match open_reader(&self.path)? {
            Some(r) => r,
            None => return Ok(Vec::new()),
        };
        check_header(&mut reader, &SUMMARY_HEADER, &source_name)?;

        let mut rows = Vec::new();
        for result in reader.records() {
            let row = result.map_err(|e| read_error(e, &source_name))?;
            let ctx = RowContext {
                source_name: &source_name,
                line: row.position().map(|p| p.line()).unwrap_or(0),
            };
            let date_str = row.get(0).unwrap_or_default();
            let date = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d")
                .map_err(|e| ctx.corrupt(format!("invalid date {date_str:?}: {e}")))?;
            rows.push(SummaryRecord {
                date,
                asset_id: row.get(1).unwrap_or_default().trim().to_string(),
                annual_return_pct: ctx.field(&row, 2, "annual_return_pct")?,
                sharpe_ratio: ctx.field(&row, 3, "sharpe_ratio")?,
                max_drawdown_pct: ctx.field(&row, 4, "max_drawdown_pct")?,
                total_pnl_pct: ctx.field(&row, 5, "total_pnl_pct")?,
            });
        }
        Ok(rows)
    }
}
