//! In-memory ledger and summary stores, used for dry runs.

use std::collections::HashMap;

use crate::domain::error::TradeLedgerError;
use crate::domain::summary::SummaryRecord;
use crate::domain::trade_record::TradeRecord;
use crate::ports::ledger_port::{check_batch, LedgerStore};
use crate::ports::summary_port::SummaryStore;

#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    records: Vec<TradeRecord>,
    /// Assets whose persisted history could not be read: source, line, reason.
    corrupt: HashMap<String, (String, u64, String)>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the ledger with already validated records, e.g. a copy of the
    /// persisted ledger.
    pub fn from_records(records: Vec<TradeRecord>) -> Self {
        Self {
            records,
            corrupt: HashMap::new(),
        }
    }

    /// Carries a `CorruptLedger` failure over from the persisted ledger so
    /// the asset stays unreadable here too.
    pub fn mark_corrupt(&mut self, asset_id: &str, source_name: &str, line: u64, reason: &str) {
        self.corrupt.insert(
            asset_id.to_string(),
            (source_name.to_string(), line, reason.to_string()),
        );
    }

    fn check_readable(&self, asset_id: &str) -> Result<(), TradeLedgerError> {
        match self.corrupt.get(asset_id) {
            Some((source_name, line, reason)) => Err(TradeLedgerError::CorruptLedger {
                source_name: source_name.clone(),
                line: *line,
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }

    pub fn records(&self) -> &[TradeRecord] {
        &self.records
    }
}

impl LedgerStore for InMemoryLedger {
    fn load_all(&self, asset_id: &str) -> Result<Vec<TradeRecord>, TradeLedgerError> {
        self.check_readable(asset_id)?;
        Ok(self
            .records
            .iter()
            .filter(|r| r.asset_id == asset_id)
            .cloned()
            .collect())
    }

    fn append_batch(&mut self, records: &[TradeRecord]) -> Result<(), TradeLedgerError> {
        for record in records {
            self.check_readable(&record.asset_id)?;
        }
        check_batch(&self.records, records)?;
        self.records.extend_from_slice(records);
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemorySummaryStore {
    rows: Vec<SummaryRecord>,
}

impl InMemorySummaryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<SummaryRecord>) -> Self {
        Self { rows }
    }
}

impl SummaryStore for InMemorySummaryStore {
    fn append(&mut self, rows: &[SummaryRecord]) -> Result<(), TradeLedgerError> {
        self.rows.extend_from_slice(rows);
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<SummaryRecord>, TradeLedgerError> {
        Ok(self.rows.clone())
    }
}
