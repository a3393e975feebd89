//! Timeout wrappers for the price and decision ports.
//!
//! Each call runs on its own worker thread. When the deadline passes the
//! worker is abandoned and the caller gets `Timeout`; its late result is
//! dropped with the channel.

use chrono::NaiveDate;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::warn;

use crate::domain::decision::Decision;
use crate::domain::error::TradeLedgerError;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::decision_port::DecisionPort;
use crate::ports::price_port::PricePort;

fn call_with_timeout<T, F>(
    asset_id: &str,
    operation: &str,
    timeout: Duration,
    f: F,
) -> Result<T, TradeLedgerError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, TradeLedgerError> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name(format!("{operation}-{asset_id}"))
        .spawn(move || {
            let _ = tx.send(f());
        })?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => {
            warn!(asset = asset_id, operation, ?timeout, "call timed out");
            Err(TradeLedgerError::Timeout {
                asset: asset_id.to_string(),
                operation: operation.to_string(),
                timeout,
            })
        }
        Err(RecvTimeoutError::Disconnected) => Err(TradeLedgerError::Provider {
            asset: asset_id.to_string(),
            reason: format!("{operation} worker exited without a result"),
        }),
    }
}

pub struct TimeoutPriceAdapter {
    inner: Arc<dyn PricePort + Send + Sync>,
    timeout: Duration,
}

impl TimeoutPriceAdapter {
    pub fn new(inner: Arc<dyn PricePort + Send + Sync>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

impl PricePort for TimeoutPriceAdapter {
    fn fetch_ohlcv(
        &self,
        asset_id: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, TradeLedgerError> {
        let inner = Arc::clone(&self.inner);
        let asset = asset_id.to_string();
        call_with_timeout(asset_id, "price fetch", self.timeout, move || {
            inner.fetch_ohlcv(&asset, start_date, end_date)
        })
    }
}

pub struct TimeoutDecisionAdapter {
    inner: Arc<dyn DecisionPort + Send + Sync>,
    timeout: Duration,
}

impl TimeoutDecisionAdapter {
    pub fn new(inner: Arc<dyn DecisionPort + Send + Sync>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

impl DecisionPort for TimeoutDecisionAdapter {
    fn decide(&self, asset_id: &str, date: NaiveDate) -> Result<Decision, TradeLedgerError> {
        let inner = Arc::clone(&self.inner);
        let asset = asset_id.to_string();
        call_with_timeout(asset_id, "decision", self.timeout, move || {
            inner.decide(&asset, date)
        })
    }
}
