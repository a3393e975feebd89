#![allow(dead_code)]

use chrono::NaiveDate;
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;
use tradeledger::domain::daily_run::RunConfig;
use tradeledger::domain::decision::Decision;
use tradeledger::domain::error::TradeLedgerError;
pub use tradeledger::domain::ohlcv::OhlcvBar;
use tradeledger::ports::decision_port::DecisionPort;
use tradeledger::ports::price_port::PricePort;

/// Price port serving fixed bars per asset, with optional per-asset errors.
pub struct MockPricePort {
    pub data: HashMap<String, Vec<OhlcvBar>>,
    pub errors: HashMap<String, String>,
}

impl MockPricePort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_close(mut self, asset: &str, date: NaiveDate, close: f64) -> Self {
        self.data
            .entry(asset.to_string())
            .or_default()
            .push(make_bar(asset, date, close));
        self
    }

    pub fn with_closes(mut self, asset: &str, start: NaiveDate, closes: &[f64]) -> Self {
        for (i, close) in closes.iter().enumerate() {
            self = self.with_close(asset, start + chrono::Duration::days(i as i64), *close);
        }
        self
    }

    pub fn with_error(mut self, asset: &str, reason: &str) -> Self {
        self.errors.insert(asset.to_string(), reason.to_string());
        self
    }
}

impl PricePort for MockPricePort {
    fn fetch_ohlcv(
        &self,
        asset_id: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, TradeLedgerError> {
        if let Some(reason) = self.errors.get(asset_id) {
            return Err(TradeLedgerError::Provider {
                asset: asset_id.to_string(),
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(asset_id)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.date >= start_date && b.date <= end_date)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Oracle answering from a script keyed by asset and date, falling back to a
/// default. Records every call.
pub struct ScriptedOracle {
    pub script: HashMap<(String, NaiveDate), Decision>,
    pub default: Decision,
    pub failing: HashMap<String, String>,
    pub calls: RefCell<Vec<(String, NaiveDate)>>,
}

impl ScriptedOracle {
    pub fn always(default: Decision) -> Self {
        Self {
            script: HashMap::new(),
            default,
            failing: HashMap::new(),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn with(mut self, asset: &str, date: NaiveDate, decision: Decision) -> Self {
        self.script.insert((asset.to_string(), date), decision);
        self
    }

    /// One decision per consecutive day starting at `start`.
    pub fn with_sequence(mut self, asset: &str, start: NaiveDate, decisions: &[Decision]) -> Self {
        for (i, d) in decisions.iter().enumerate() {
            self = self.with(asset, start + chrono::Duration::days(i as i64), *d);
        }
        self
    }

    pub fn failing_for(mut self, asset: &str, reason: &str) -> Self {
        self.failing.insert(asset.to_string(), reason.to_string());
        self
    }

    pub fn call_count(&self, asset: &str) -> usize {
        self.calls.borrow().iter().filter(|(a, _)| a == asset).count()
    }
}

impl DecisionPort for ScriptedOracle {
    fn decide(&self, asset_id: &str, date: NaiveDate) -> Result<Decision, TradeLedgerError> {
        self.calls.borrow_mut().push((asset_id.to_string(), date));
        if let Some(reason) = self.failing.get(asset_id) {
            return Err(TradeLedgerError::Provider {
                asset: asset_id.to_string(),
                reason: reason.clone(),
            });
        }
        Ok(self
            .script
            .get(&(asset_id.to_string(), date))
            .copied()
            .unwrap_or(self.default))
    }
}

pub fn make_bar(asset: &str, date: NaiveDate, close: f64) -> OhlcvBar {
    OhlcvBar {
        code: asset.to_string(),
        date,
        open: close - 1.0,
        high: close + 1.0,
        low: close - 2.0,
        close,
        volume: 1000,
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn run_config(date: NaiveDate, assets: &[&str]) -> RunConfig {
    RunConfig {
        date,
        assets: assets.iter().map(|a| a.to_string()).collect(),
        initial_capital: 10_000.0,
    }
}

pub fn write_file(path: &std::path::Path, content: &str) {
    let mut file = std::fs::File::create(path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
}
