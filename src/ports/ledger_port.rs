//! Ledger storage port: the append-only per-asset trade log.

use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};

use crate::domain::account::AccountState;
use crate::domain::error::TradeLedgerError;
use crate::domain::trade_record::TradeRecord;

pub trait LedgerStore {
    /// All records for `asset_id`, ordered by date.
    fn load_all(&self, asset_id: &str) -> Result<Vec<TradeRecord>, TradeLedgerError>;

    /// Appends every record and makes them durable together. A record whose
    /// `(asset_id, date)` is already stored, or that repeats a key within the
    /// batch, rejects the whole batch with `DuplicateRecord`.
    fn append_batch(&mut self, records: &[TradeRecord]) -> Result<(), TradeLedgerError>;

    /// State after the asset's last record; `None` if it has no history.
    fn load_last(&self, asset_id: &str) -> Result<Option<AccountState>, TradeLedgerError> {
        Ok(AccountState::from_history(&self.load_all(asset_id)?))
    }

    fn contains(&self, asset_id: &str, date: NaiveDate) -> Result<bool, TradeLedgerError> {
        Ok(self.load_all(asset_id)?.iter().any(|r| r.date == date))
    }

    fn append(&mut self, record: &TradeRecord) -> Result<(), TradeLedgerError> {
        self.append_batch(std::slice::from_ref(record))
    }
}

/// Checks a batch against already stored records (which must include every
/// stored record of the batch's assets): no repeated `(asset_id, date)` key
/// and no record dated before an asset's last stored date.
pub fn check_batch(existing: &[TradeRecord], batch: &[TradeRecord]) -> Result<(), TradeLedgerError> {
    let mut keys: HashSet<(&str, NaiveDate)> = HashSet::new();
    let mut last: HashMap<&str, NaiveDate> = HashMap::new();
    for r in existing {
        keys.insert((r.asset_id.as_str(), r.date));
        let entry = last.entry(r.asset_id.as_str()).or_insert(r.date);
        if r.date > *entry {
            *entry = r.date;
        }
    }

    for r in batch {
        if !keys.insert((r.asset_id.as_str(), r.date)) {
            return Err(TradeLedgerError::DuplicateRecord {
                asset: r.asset_id.clone(),
                date: r.date,
            });
        }
        if let Some(&prev) = last.get(r.asset_id.as_str()) {
            if r.date < prev {
                return Err(TradeLedgerError::Storage {
                    reason: format!(
                        "record for {} on {} is older than its last stored date {}",
                        r.asset_id, r.date, prev
                    ),
                });
            }
        }
        last.insert(r.asset_id.as_str(), r.date);
    }
    Ok(())
}
