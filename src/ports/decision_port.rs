//! Decision oracle port.

use chrono::NaiveDate;

use crate::domain::decision::Decision;
use crate::domain::error::TradeLedgerError;

/// Opaque source of BUY/SELL/HOLD signals. Its answer is taken as-is.
pub trait DecisionPort {
    fn decide(&self, asset_id: &str, date: NaiveDate) -> Result<Decision, TradeLedgerError>;
}
