//! Summary storage port: append-only daily metrics rows.

use chrono::NaiveDate;
use std::collections::HashMap;

use crate::domain::error::TradeLedgerError;
use crate::domain::summary::SummaryRecord;

pub trait SummaryStore {
    fn append(&mut self, rows: &[SummaryRecord]) -> Result<(), TradeLedgerError>;

    /// Every persisted row in write order.
    fn load_all(&self) -> Result<Vec<SummaryRecord>, TradeLedgerError>;

    /// Rows for `date`, keeping only the latest write per asset id, in the
    /// order each asset id first appeared.
    fn load_for_date(&self, date: NaiveDate) -> Result<Vec<SummaryRecord>, TradeLedgerError> {
        let mut order: Vec<String> = Vec::new();
        let mut latest: HashMap<String, SummaryRecord> = HashMap::new();
        for row in self.load_all()?.into_iter().filter(|r| r.date == date) {
            if !latest.contains_key(&row.asset_id) {
                order.push(row.asset_id.clone());
            }
            latest.insert(row.asset_id.clone(), row);
        }
        Ok(order
            .into_iter()
            .filter_map(|asset| latest.remove(&asset))
            .collect())
    }
}
