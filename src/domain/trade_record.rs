//! Trade record: one ledger row per asset per run date.

use chrono::NaiveDate;

use super::decision::Decision;

/// Relative tolerance when re-checking `total_value` of a persisted row.
const VALUE_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct TradeRecord {
    pub date: NaiveDate,
    pub asset_id: String,
    pub decision: Decision,
    pub price: f64,
    pub cash: f64,
    pub position: f64,
    pub in_position: bool,
    pub total_value: f64,
    pub pnl_pct: f64,
    pub initial_capital: f64,
}

impl TradeRecord {
    /// Checks the row-level invariants of a record read back from storage.
    pub fn check_invariants(&self) -> Result<(), String> {
        if !(self.price.is_finite() && self.price > 0.0) {
            return Err(format!("price must be positive, got {}", self.price));
        }
        if !(self.cash.is_finite() && self.cash >= 0.0) {
            return Err(format!("cash must be non-negative, got {}", self.cash));
        }
        if !(self.position.is_finite() && self.position >= 0.0) {
            return Err(format!(
                "position must be non-negative, got {}",
                self.position
            ));
        }
        if self.in_position != (self.position > 0.0) {
            return Err(format!(
                "in_position={} disagrees with position={}",
                self.in_position, self.position
            ));
        }
        if self.cash > 0.0 && self.position > 0.0 {
            return Err("cash and position are both nonzero".to_string());
        }
        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return Err(format!(
                "initial_capital must be positive, got {}",
                self.initial_capital
            ));
        }
        let expected = self.cash + self.position * self.price;
        if (self.total_value - expected).abs() > VALUE_TOLERANCE * expected.abs().max(1.0) {
            return Err(format!(
                "total_value {} does not match cash + position * price = {}",
                self.total_value, expected
            ));
        }
        Ok(())
    }
}
