//! Trade execution: all-in/all-out transitions of one asset's account.
//!
//! | state | decision    | action                               | next |
//! |-------|-------------|--------------------------------------|------|
//! | OUT   | BUY         | position = cash / price; cash = 0    | IN   |
//! | OUT   | SELL / HOLD | none                                 | OUT  |
//! | IN    | SELL        | cash = position * price; position = 0| OUT  |
//! | IN    | BUY / HOLD  | none                                 | IN   |

use chrono::NaiveDate;

use super::account::{AccountState, Phase};
use super::decision::Decision;
use super::error::TradeLedgerError;
use super::trade_record::TradeRecord;

/// Apply `decision` at `price`, returning the next state and the row to
/// append to the ledger. A non-finite or non-positive price is refused.
pub fn execute(
    asset_id: &str,
    date: NaiveDate,
    state: &AccountState,
    decision: Decision,
    price: f64,
) -> Result<(AccountState, TradeRecord), TradeLedgerError> {
    if !(price.is_finite() && price > 0.0) {
        return Err(TradeLedgerError::InvalidPrice {
            asset: asset_id.to_string(),
            date,
            price,
        });
    }

    let mut next = state.clone();
    match (state.phase(), decision) {
        (Phase::Out, Decision::Buy) => {
            next.position = state.cash / price;
            next.cash = 0.0;
        }
        (Phase::In, Decision::Sell) => {
            next.cash = state.position * price;
            next.position = 0.0;
        }
        _ => {}
    }
    next.in_position = next.position > 0.0;
    next.total_value = next.value_at(price);

    let record = TradeRecord {
        date,
        asset_id: asset_id.to_string(),
        decision,
        price,
        cash: next.cash,
        position: next.position,
        in_position: next.in_position,
        total_value: next.total_value,
        pnl_pct: next.pnl_pct(),
        initial_capital: next.initial_capital,
    };

    Ok((next, record))
}
