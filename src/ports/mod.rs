//! Port traits: the seams between the domain and storage, providers, and
//! configuration.

pub mod config_port;
pub mod decision_port;
pub mod ledger_port;
pub mod price_port;
pub mod summary_port;
