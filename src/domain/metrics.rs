//! Performance metrics over an asset's full ledger history.

use super::trade_record::TradeRecord;

const TRADING_DAYS_PER_YEAR: i32 = 252;

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub annual_return_pct: f64,
    pub annual_volatility: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown_pct: f64,
    pub total_pnl_pct: f64,
    pub observations: usize,
}

impl Metrics {
    /// Statistics over a date-ordered history; `None` with fewer than two
    /// records.
    pub fn compute(history: &[TradeRecord]) -> Option<Self> {
        if history.len() < 2 {
            return None;
        }

        let values: Vec<f64> = history.iter().map(|r| r.total_value).collect();
        let returns = aligned_returns(&values);

        let mean = mean(&returns);
        let annual_return = (1.0 + mean).powi(TRADING_DAYS_PER_YEAR) - 1.0;
        let annual_volatility =
            sample_std_dev(&returns, mean) * f64::from(TRADING_DAYS_PER_YEAR).sqrt();

        // No risk-free rate: raw annual return over annual volatility.
        let sharpe_ratio = if annual_volatility != 0.0 {
            annual_return / annual_volatility
        } else {
            0.0
        };

        let max_drawdown_pct = max_drawdown(&values) * 100.0;
        let total_pnl_pct = history.last().map(|r| r.pnl_pct).unwrap_or(0.0);

        Some(Metrics {
            annual_return_pct: annual_return * 100.0,
            annual_volatility,
            sharpe_ratio,
            max_drawdown_pct,
            total_pnl_pct,
            observations: history.len(),
        })
    }
}

/// `v[i] / v[i-1] - 1` for each consecutive pair. A return that cannot be
/// computed (zero or non-finite prior value) is 0.
pub fn period_returns(values: &[f64]) -> Vec<f64> {
    values
        .windows(2)
        .map(|w| {
            let r = w[1] / w[0] - 1.0;
            if r.is_finite() { r } else { 0.0 }
        })
        .collect()
}

/// Period returns aligned to the records: the first record has no prior
/// value and carries a filled return of 0, which takes part in the mean and
/// standard deviation.
pub fn aligned_returns(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let mut returns = Vec::with_capacity(values.len());
    returns.push(0.0);
    returns.extend(period_returns(values));
    returns
}

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Sample standard deviation (n - 1 denominator).
fn sample_std_dev(xs: &[f64], mean: f64) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    let ss: f64 = xs.iter().map(|x| (x - mean).powi(2)).sum();
    (ss / (xs.len() - 1) as f64).sqrt()
}

/// Deepest peak-to-current decline as a non-positive fraction.
pub fn max_drawdown(values: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    for &v in values {
        if v > peak {
            peak = v;
        }
        if peak > 0.0 {
            let dd = (v - peak) / peak;
            if dd < worst {
                worst = dd;
            }
        }
    }
    worst
}
