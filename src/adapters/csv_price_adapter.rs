//! CSV directory price adapter: one `<ASSET>.csv` per symbol.

use crate::domain::error::TradeLedgerError;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::price_port::PricePort;
use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;

pub struct CsvPriceAdapter {
    base_path: PathBuf,
}

impl CsvPriceAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, asset_id: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", asset_id))
    }
}

fn column<T: std::str::FromStr>(
    record: &csv::StringRecord,
    index: usize,
    name: &str,
    asset_id: &str,
) -> Result<T, TradeLedgerError>
where
    T::Err: std::fmt::Display,
{
    let provider = |reason: String| TradeLedgerError::Provider {
        asset: asset_id.to_string(),
        reason,
    };
    record
        .get(index)
        .ok_or_else(|| provider(format!("missing {} column", name)))?
        .trim()
        .parse()
        .map_err(|e| provider(format!("invalid {} value: {}", name, e)))
}

impl PricePort for CsvPriceAdapter {
    fn fetch_ohlcv(
        &self,
        asset_id: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, TradeLedgerError> {
        let path = self.csv_path(asset_id);
        let content = fs::read_to_string(&path).map_err(|e| TradeLedgerError::Provider {
            asset: asset_id.to_string(),
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| TradeLedgerError::Provider {
                asset: asset_id.to_string(),
                reason: format!("CSV parse error: {}", e),
            })?;

            let date_str: String = column(&record, 0, "date", asset_id)?;
            let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map_err(|e| {
                TradeLedgerError::Provider {
                    asset: asset_id.to_string(),
                    reason: format!("invalid date format: {}", e),
                }
            })?;

            if date < start_date || date > end_date {
                continue;
            }

            // Some exports write volume as a float.
            let volume: f64 = column(&record, 5, "volume", asset_id)?;

            bars.push(OhlcvBar {
                code: asset_id.to_string(),
                date,
                open: column(&record, 1, "open", asset_id)?,
                high: column(&record, 2, "high", asset_id)?,
                low: column(&record, 3, "low", asset_id)?,
                close: column(&record, 4, "close", asset_id)?,
                volume: volume as i64,
            });
        }

        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }
}
