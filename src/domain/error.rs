//! Domain error types.

use chrono::NaiveDate;
use std::time::Duration;

/// Top-level error type for tradeledger.
#[derive(Debug, thiserror::Error)]
pub enum TradeLedgerError {
    #[error("storage error: {reason}")]
    Storage { reason: String },

    #[error("corrupt ledger {source_name} at line {line}: {reason}")]
    CorruptLedger {
        source_name: String,
        line: u64,
        reason: String,
    },

    #[error("duplicate record for {asset} on {date}")]
    DuplicateRecord { asset: String, date: NaiveDate },

    #[error("run date {date} for {asset} is before its last recorded date {last_recorded}")]
    StaleRunDate {
        asset: String,
        date: NaiveDate,
        last_recorded: NaiveDate,
    },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("no price for {asset} on {date}")]
    MissingData { asset: String, date: NaiveDate },

    #[error("invalid price for {asset} on {date}: {price}")]
    InvalidPrice {
        asset: String,
        date: NaiveDate,
        price: f64,
    },

    #[error("insufficient history for {asset}: have {records} records, need 2")]
    InsufficientHistory { asset: String, records: usize },

    #[error("provider error for {asset}: {reason}")]
    Provider { asset: String, reason: String },

    #[error("{operation} for {asset} timed out after {timeout:?}")]
    Timeout {
        asset: String,
        operation: String,
        timeout: Duration,
    },

    #[error("invalid decision {value:?} (expected BUY, SELL or HOLD)")]
    InvalidDecision { value: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TradeLedgerError {
    /// Data and provider conditions expected to skip an asset now and then.
    /// Anything else skipping an asset points at the ledger and is logged
    /// as an error.
    pub fn is_asset_skip(&self) -> bool {
        matches!(
            self,
            TradeLedgerError::MissingData { .. }
                | TradeLedgerError::InvalidPrice { .. }
                | TradeLedgerError::Provider { .. }
                | TradeLedgerError::Timeout { .. }
                | TradeLedgerError::InvalidDecision { .. }
        )
    }
}

impl From<&TradeLedgerError> for std::process::ExitCode {
    fn from(err: &TradeLedgerError) -> Self {
        let code: u8 = match err {
            TradeLedgerError::Io(_) => 1,
            TradeLedgerError::ConfigParse { .. }
            | TradeLedgerError::ConfigMissing { .. }
            | TradeLedgerError::ConfigInvalid { .. } => 2,
            TradeLedgerError::Storage { .. }
            | TradeLedgerError::CorruptLedger { .. }
            | TradeLedgerError::DuplicateRecord { .. }
            | TradeLedgerError::StaleRunDate { .. } => 3,
            TradeLedgerError::InvalidDecision { .. }
            | TradeLedgerError::Provider { .. }
            | TradeLedgerError::Timeout { .. } => 4,
            TradeLedgerError::MissingData { .. }
            | TradeLedgerError::InvalidPrice { .. }
            | TradeLedgerError::InsufficientHistory { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
