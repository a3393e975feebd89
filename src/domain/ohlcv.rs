//! OHLCV bar as returned by a price provider.

use chrono::NaiveDate;

#[derive(Debug, Clone)]
pub struct OhlcvBar {
    pub code: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

/// Close of the bar dated exactly `date`, if any. Never falls back to an
/// earlier bar.
pub fn close_on(bars: &[OhlcvBar], date: NaiveDate) -> Option<f64> {
    bars.iter().find(|b| b.date == date).map(|b| b.close)
}
