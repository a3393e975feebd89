//! Per-asset account state, derived from the ledger at the start of a run.

use super::trade_record::TradeRecord;

/// Whether an account is fully in cash or fully invested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Out,
    In,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccountState {
    pub cash: f64,
    pub position: f64,
    pub in_position: bool,
    pub total_value: f64,
    pub initial_capital: f64,
}

impl AccountState {
    pub fn new(initial_capital: f64) -> Self {
        AccountState {
            cash: initial_capital,
            position: 0.0,
            in_position: false,
            total_value: initial_capital,
            initial_capital,
        }
    }

    /// State carried by a persisted record.
    pub fn from_record(record: &TradeRecord) -> Self {
        AccountState {
            cash: record.cash,
            position: record.position,
            in_position: record.in_position,
            total_value: record.total_value,
            initial_capital: record.initial_capital,
        }
    }

    /// State after the last record of an asset's date-ordered history, or
    /// `None` when there is no history yet.
    pub fn from_history(records: &[TradeRecord]) -> Option<Self> {
        records.last().map(Self::from_record)
    }

    /// Falls back to a fresh account when the asset has no history.
    pub fn resume_or_new(last: Option<AccountState>, initial_capital: f64) -> Self {
        last.unwrap_or_else(|| Self::new(initial_capital))
    }

    pub fn phase(&self) -> Phase {
        if self.in_position {
            Phase::In
        } else {
            Phase::Out
        }
    }

    pub fn value_at(&self, price: f64) -> f64 {
        self.cash + self.position * price
    }

    pub fn pnl_pct(&self) -> f64 {
        (self.total_value - self.initial_capital) / self.initial_capital * 100.0
    }
}
