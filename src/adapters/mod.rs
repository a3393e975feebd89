//! Concrete adapter implementations for ports.

pub mod command_decision_adapter;
pub mod csv_decision_adapter;
pub mod csv_ledger_adapter;
pub mod csv_price_adapter;
pub mod csv_summary_adapter;
mod csv_support;
pub mod file_config_adapter;
pub mod memory_adapter;
#[cfg(feature = "sqlite")]
pub mod sqlite_adapter;
pub mod timeout_adapter;
