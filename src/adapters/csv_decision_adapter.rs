//! Decision adapter backed by a signal file of `date,asset_id,decision` rows.

use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;

use crate::domain::decision::Decision;
use crate::domain::error::TradeLedgerError;
use crate::ports::decision_port::DecisionPort;

pub struct CsvDecisionAdapter {
    path: PathBuf,
}

impl CsvDecisionAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl DecisionPort for CsvDecisionAdapter {
    /// The last matching row wins, so a signal file can be corrected by
    /// appending.
    fn decide(&self, asset_id: &str, date: NaiveDate) -> Result<Decision, TradeLedgerError> {
        let provider = |reason: String| TradeLedgerError::Provider {
            asset: asset_id.to_string(),
            reason,
        };
        let content = fs::read_to_string(&self.path)
            .map_err(|e| provider(format!("failed to read {}: {}", self.path.display(), e)))?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut found = None;

        for result in rdr.records() {
            let record = result.map_err(|e| provider(format!("CSV parse error: {}", e)))?;
            let (Some(date_str), Some(asset), Some(value)) =
                (record.get(0), record.get(1), record.get(2))
            else {
                return Err(provider(format!(
                    "signal row has {} fields, expected 3",
                    record.len()
                )));
            };

            if !asset.trim().eq_ignore_ascii_case(asset_id) {
                continue;
            }
            let row_date = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d")
                .map_err(|e| provider(format!("invalid date {date_str:?}: {e}")))?;
            if row_date == date {
                found = Some(value.parse::<Decision>()?);
            }
        }

        found.ok_or_else(|| provider(format!("no signal for {}", date)))
    }
}
