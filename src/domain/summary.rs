//! Daily summary rows: per-asset metrics plus a portfolio-wide average.

use chrono::NaiveDate;

use super::metrics::Metrics;

/// Asset id of the synthetic portfolio-average row.
pub const PORTFOLIO_AVG: &str = "PORTFOLIO_AVG";

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRecord {
    pub date: NaiveDate,
    pub asset_id: String,
    pub annual_return_pct: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown_pct: f64,
    pub total_pnl_pct: f64,
}

impl SummaryRecord {
    pub fn from_metrics(date: NaiveDate, asset_id: &str, metrics: &Metrics) -> Self {
        SummaryRecord {
            date,
            asset_id: asset_id.to_string(),
            annual_return_pct: metrics.annual_return_pct,
            sharpe_ratio: metrics.sharpe_ratio,
            max_drawdown_pct: metrics.max_drawdown_pct,
            total_pnl_pct: metrics.total_pnl_pct,
        }
    }

    pub fn is_portfolio_average(&self) -> bool {
        self.asset_id == PORTFOLIO_AVG
    }
}

/// One row per asset, in input order, followed by the `PORTFOLIO_AVG` row.
///
/// The average is unweighted: each statistic is averaged independently
/// across the assets that produced metrics. Empty input yields no rows.
pub fn aggregate(date: NaiveDate, per_asset: &[(String, Metrics)]) -> Vec<SummaryRecord> {
    if per_asset.is_empty() {
        return Vec::new();
    }

    let mut rows: Vec<SummaryRecord> = per_asset
        .iter()
        .map(|(asset, metrics)| SummaryRecord::from_metrics(date, asset, metrics))
        .collect();

    let n = rows.len() as f64;
    let avg = |f: fn(&SummaryRecord) -> f64| rows.iter().map(f).sum::<f64>() / n;

    let portfolio = SummaryRecord {
        date,
        asset_id: PORTFOLIO_AVG.to_string(),
        annual_return_pct: avg(|r| r.annual_return_pct),
        sharpe_ratio: avg(|r| r.sharpe_ratio),
        max_drawdown_pct: avg(|r| r.max_drawdown_pct),
        total_pnl_pct: avg(|r| r.total_pnl_pct),
    };
    rows.push(portfolio);
    rows
}
