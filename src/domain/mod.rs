//! Core domain types and logic.

pub mod account;
pub mod config_validation;
pub mod daily_run;
pub mod decision;
pub mod error;
pub mod execution;
pub mod metrics;
pub mod ohlcv;
pub mod summary;
pub mod trade_record;
pub mod universe;
