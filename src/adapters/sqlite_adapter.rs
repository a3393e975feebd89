//! SQLite ledger and summary adapter.

use chrono::NaiveDate;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::path::Path;

use crate::domain::decision::Decision;
use crate::domain::error::TradeLedgerError;
use crate::domain::summary::SummaryRecord;
use crate::domain::trade_record::TradeRecord;
use crate::ports::ledger_port::{check_batch, LedgerStore};
use crate::ports::summary_port::SummaryStore;

const SOURCE_NAME: &str = "sqlite:trade_records";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn db_err(e: r2d2::Error) -> TradeLedgerError {
    TradeLedgerError::Storage {
        reason: e.to_string(),
    }
}

fn query_err(e: rusqlite::Error) -> TradeLedgerError {
    TradeLedgerError::Storage {
        reason: e.to_string(),
    }
}

impl SqliteAdapter {
    pub fn open(db_path: &Path, pool_size: u32) -> Result<Self, TradeLedgerError> {
        let manager = SqliteConnectionManager::file(db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(db_err)?;

        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    pub fn in_memory() -> Result<Self, TradeLedgerError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager).map_err(db_err)?;

        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, TradeLedgerError> {
        self.pool.get().map_err(db_err)
    }

    pub fn initialize_schema(&self) -> Result<(), TradeLedgerError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS trade_records (
                    asset_id TEXT NOT NULL,
                    date TEXT NOT NULL,
                    decision TEXT NOT NULL,
                    price REAL NOT NULL,
                    cash REAL NOT NULL,
                    position REAL NOT NULL,
                    in_position INTEGER NOT NULL,
                    total_value REAL NOT NULL,
                    pnl_pct REAL NOT NULL,
                    initial_capital REAL NOT NULL,
                    PRIMARY KEY (asset_id, date)
                );
                CREATE TABLE IF NOT EXISTS summary_records (
                    seq INTEGER PRIMARY KEY AUTOINCREMENT,
                    date TEXT NOT NULL,
                    asset_id TEXT NOT NULL,
                    annual_return_pct REAL NOT NULL,
                    sharpe_ratio REAL NOT NULL,
                    max_drawdown_pct REAL NOT NULL,
                    total_pnl_pct REAL NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_summary_date ON summary_records(date);",
            )
            .map_err(query_err)
    }
}

fn parse_date(raw: &str, line: u64, source_name: &str) -> Result<NaiveDate, TradeLedgerError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| TradeLedgerError::CorruptLedger {
        source_name: source_name.to_string(),
        line,
        reason: format!("invalid date {raw:?}: {e}"),
    })
}

struct RawTradeRow {
    rowid: i64,
    asset_id: String,
    date: String,
    decision: String,
    price: f64,
    cash: f64,
    position: f64,
    in_position: bool,
    total_value: f64,
    pnl_pct: f64,
    initial_capital: f64,
}

impl RawTradeRow {
    fn into_record(self) -> Result<TradeRecord, TradeLedgerError> {
        let line = self.rowid as u64;
        let corrupt = |reason: String| TradeLedgerError::CorruptLedger {
            source_name: SOURCE_NAME.to_string(),
            line,
            reason,
        };
        let record = TradeRecord {
            date: parse_date(&self.date, line, SOURCE_NAME)?,
            asset_id: self.asset_id,
            decision: self
                .decision
                .parse::<Decision>()
                .map_err(|e| corrupt(e.to_string()))?,
            price: self.price,
            cash: self.cash,
            position: self.position,
            in_position: self.in_position,
            total_value: self.total_value,
            pnl_pct: self.pnl_pct,
            initial_capital: self.initial_capital,
        };
        record.check_invariants().map_err(corrupt)?;
        Ok(record)
    }
}

impl LedgerStore for SqliteAdapter {
    fn load_all(&self, asset_id: &str) -> Result<Vec<TradeRecord>, TradeLedgerError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT rowid, asset_id, date, decision, price, cash, position, in_position,
                        total_value, pnl_pct, initial_capital
                 FROM trade_records
                 WHERE asset_id = ?1
                 ORDER BY date ASC",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map(params![asset_id], |row| {
                Ok(RawTradeRow {
                    rowid: row.get(0)?,
                    asset_id: row.get(1)?,
                    date: row.get(2)?,
                    decision: row.get(3)?,
                    price: row.get(4)?,
                    cash: row.get(5)?,
                    position: row.get(6)?,
                    in_position: row.get(7)?,
                    total_value: row.get(8)?,
                    pnl_pct: row.get(9)?,
                    initial_capital: row.get(10)?,
                })
            })
            .map_err(query_err)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row.map_err(query_err)?.into_record()?);
        }
        Ok(records)
    }

    fn contains(&self, asset_id: &str, date: NaiveDate) -> Result<bool, TradeLedgerError> {
        let count: i64 = self
            .conn()?
            .query_row(
                "SELECT COUNT(*) FROM trade_records WHERE asset_id = ?1 AND date = ?2",
                params![asset_id, date.format("%Y-%m-%d").to_string()],
                |row| row.get(0),
            )
            .map_err(query_err)?;
        Ok(count > 0)
    }

    fn append_batch(&mut self, records: &[TradeRecord]) -> Result<(), TradeLedgerError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut existing = Vec::new();
        let mut assets: Vec<&str> = records.iter().map(|r| r.asset_id.as_str()).collect();
        assets.sort_unstable();
        assets.dedup();
        for asset in assets {
            existing.extend(LedgerStore::load_all(self, asset)?);
        }
        check_batch(&existing, records)?;

        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        for r in records {
            tx.execute(
                "INSERT INTO trade_records (asset_id, date, decision, price, cash, position,
                     in_position, total_value, pnl_pct, initial_capital)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    r.asset_id,
                    r.date.format("%Y-%m-%d").to_string(),
                    r.decision.as_str(),
                    r.price,
                    r.cash,
                    r.position,
                    r.in_position,
                    r.total_value,
                    r.pnl_pct,
                    r.initial_capital
                ],
            )
            .map_err(query_err)?;
        }
        tx.commit().map_err(query_err)?;
        Ok(())
    }
}

impl SummaryStore for SqliteAdapter {
    fn append(&mut self, rows: &[SummaryRecord]) -> Result<(), TradeLedgerError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        for r in rows {
            tx.execute(
                "INSERT INTO summary_records (date, asset_id, annual_return_pct, sharpe_ratio,
                     max_drawdown_pct, total_pnl_pct)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    r.date.format("%Y-%m-%d").to_string(),
                    r.asset_id,
                    r.annual_return_pct,
                    r.sharpe_ratio,
                    r.max_drawdown_pct,
                    r.total_pnl_pct
                ],
            )
            .map_err(query_err)?;
        }
        tx.commit().map_err(query_err)
    }

    fn load_all(&self) -> Result<Vec<SummaryRecord>, TradeLedgerError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT seq, date, asset_id, annual_return_pct, sharpe_ratio, max_drawdown_pct,
                        total_pnl_pct
                 FROM summary_records
                 ORDER BY seq ASC",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    SummaryRecord {
                        date: NaiveDate::MIN,
                        asset_id: row.get(2)?,
                        annual_return_pct: row.get(3)?,
                        sharpe_ratio: row.get(4)?,
                        max_drawdown_pct: row.get(5)?,
                        total_pnl_pct: row.get(6)?,
                    },
                ))
            })
            .map_err(query_err)?;

        let mut out = Vec::new();
        for row in rows {
            let (seq, date, mut record) = row.map_err(query_err)?;
            record.date = parse_date(&date, seq as u64, "sqlite:summary_records")?;
            out.push(record);
        }
        Ok(out)
    }
}
