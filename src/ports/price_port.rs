//! Price provider port.

use chrono::NaiveDate;

use crate::domain::error::TradeLedgerError;
use crate::domain::ohlcv::{close_on, OhlcvBar};

pub trait PricePort {
    fn fetch_ohlcv(
        &self,
        asset_id: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, TradeLedgerError>;

    /// Closing price on exactly `date`; `Ok(None)` when the provider has no
    /// bar for that date.
    fn fetch_close(&self, asset_id: &str, date: NaiveDate) -> Result<Option<f64>, TradeLedgerError> {
        let bars = self.fetch_ohlcv(asset_id, date, date)?;
        Ok(close_on(&bars, date))
    }
}
