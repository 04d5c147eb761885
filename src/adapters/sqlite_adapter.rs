//! SQLite candle store.
//!
//! Bars live in one `candles` table keyed by (symbol, timeframe, open_time).
//! Only rows flagged `closed = 1` are ever served.

use crate::domain::error::BarscanError;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::candle_port::CandlePort;
use crate::ports::config_port::ConfigPort;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::path::Path;

pub struct SqliteCandleStore {
    pool: Pool<SqliteConnectionManager>,
}

fn query_err(e: rusqlite::Error) -> BarscanError {
    BarscanError::StoreQuery {
        reason: e.to_string(),
    }
}

impl SqliteCandleStore {
    pub fn open<P: AsRef<Path>>(path: P, pool_size: u32) -> Result<Self, BarscanError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(BarscanError::Store {
                reason: format!("database not found: {}", path.display()),
            });
        }

        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder()
            .max_size(pool_size.max(1))
            .build(manager)
            .map_err(|e: r2d2::Error| BarscanError::Store {
                reason: e.to_string(),
            })?;

        tracing::debug!(path = %path.display(), pool_size, "opened candle store");
        Ok(Self { pool })
    }

    /// Opens the database named by `[store] path`.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, BarscanError> {
        let db_path = config
            .get_string("store", "path")
            .ok_or_else(|| BarscanError::ConfigMissing {
                section: "store".into(),
                key: "path".into(),
            })?;

        let pool_size = config.get_int("store", "pool_size", 4);
        let pool_size = u32::try_from(pool_size).map_err(|_| BarscanError::ConfigInvalid {
            section: "store".into(),
            key: "pool_size".into(),
            reason: "pool_size must be a positive integer".into(),
        })?;

        Self::open(db_path, pool_size)
    }

    pub fn in_memory() -> Result<Self, BarscanError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| BarscanError::Store {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, BarscanError> {
        self.pool.get().map_err(|e: r2d2::Error| BarscanError::Store {
            reason: e.to_string(),
        })
    }

    pub fn initialize_schema(&self) -> Result<(), BarscanError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS candles (
                    symbol TEXT NOT NULL,
                    timeframe TEXT NOT NULL,
                    open_time INTEGER NOT NULL,
                    open REAL NOT NULL,
                    high REAL NOT NULL,
                    low REAL NOT NULL,
                    close REAL NOT NULL,
                    volume REAL NOT NULL,
                    closed INTEGER NOT NULL DEFAULT 1,
                    PRIMARY KEY (symbol, timeframe, open_time)
                );
                CREATE INDEX IF NOT EXISTS idx_candles_symbol_timeframe
                    ON candles(symbol, timeframe);",
            )
            .map_err(query_err)
    }

    /// Upsert bars for one key in a single transaction.
    pub fn insert_bars(
        &self,
        symbol: &str,
        timeframe: &str,
        bars: &[OhlcvBar],
        closed: bool,
    ) -> Result<(), BarscanError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        for bar in bars {
            tx.execute(
                "INSERT OR REPLACE INTO candles
                    (symbol, timeframe, open_time, open, high, low, close, volume, closed)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    symbol,
                    timeframe,
                    bar.open_time,
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume,
                    closed
                ],
            )
            .map_err(query_err)?;
        }

        tx.commit().map_err(query_err)
    }

    pub fn list_symbols(&self, timeframe: &str) -> Result<Vec<String>, BarscanError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT DISTINCT symbol FROM candles
                 WHERE timeframe = ?1 AND closed = 1
                 ORDER BY symbol",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map(params![timeframe], |row| row.get(0))
            .map_err(query_err)?;

        rows.collect::<Result<Vec<String>, _>>().map_err(query_err)
    }
}

impl CandlePort for SqliteCandleStore {
    fn load_recent(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<Vec<OhlcvBar>, BarscanError> {
        let conn = self.conn()?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        // Newest N first, then flipped to ascending below.
        let mut stmt = conn
            .prepare(
                "SELECT open_time, open, high, low, close, volume
                 FROM candles
                 WHERE symbol = ?1 AND timeframe = ?2 AND closed = 1
                 ORDER BY open_time DESC
                 LIMIT ?3",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map(params![symbol, timeframe, limit], |row| {
                Ok(OhlcvBar {
                    open_time: row.get(0)?,
                    open: row.get(1)?,
                    high: row.get(2)?,
                    low: row.get(3)?,
                    close: row.get(4)?,
                    volume: row.get(5)?,
                })
            })
            .map_err(query_err)?;

        let mut bars = rows.collect::<Result<Vec<_>, _>>().map_err(query_err)?;
        bars.reverse();
        Ok(bars)
    }
}
