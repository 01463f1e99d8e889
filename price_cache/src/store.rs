//! Persistent price cache

use chrono::{DateTime, SecondsFormat, Utc};
use forecast_engine::PricePoint;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::entity::{Asset, AssetCategory, NewAsset, PriceObservation};
use crate::error::StoreError;

/// Upper bound on rows returned by [`PriceStore::recent_prices`]
pub const MAX_RECENT_PRICES: usize = 1000;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS assets (
    id TEXT PRIMARY KEY,
    symbol TEXT NOT NULL UNIQUE,
    asset_type TEXT NOT NULL,
    name TEXT NOT NULL,
    currency TEXT NOT NULL DEFAULT 'USD',
    last_updated TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS historical_prices (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    asset_id TEXT NOT NULL REFERENCES assets(id),
    timestamp TEXT NOT NULL,
    open_price REAL NOT NULL,
    high_price REAL NOT NULL,
    low_price REAL NOT NULL,
    close_price REAL NOT NULL,
    volume INTEGER NOT NULL DEFAULT 0,
    UNIQUE(asset_id, timestamp)
);
"#;

const ASSET_COLUMNS: &str = "id, symbol, asset_type, name, currency, last_updated, created_at";

/// Narrow read/write contract over the cache.
///
/// Implementations must be shareable across worker threads. Price rows are
/// unique on `(asset_id, timestamp)` and a repeated write replaces the
/// earlier values.
pub trait PriceStore: Send + Sync {
    fn find_asset(&self, symbol: &str) -> Result<Option<Asset>, StoreError>;

    /// Insert the asset unless its symbol already exists, then return the stored row
    fn ensure_asset(&self, asset: &NewAsset) -> Result<Asset, StoreError>;

    fn list_assets(&self) -> Result<Vec<Asset>, StoreError>;

    /// Record the time of the latest successful sync
    fn touch_asset(&self, asset_id: &str, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Write all rows atomically; returns the number of rows written
    fn upsert_prices(&self, rows: &[PriceObservation]) -> Result<usize, StoreError>;

    fn count_prices(&self, asset_id: &str) -> Result<usize, StoreError>;

    /// Closing prices ordered oldest first
    fn close_history(&self, asset_id: &str) -> Result<Vec<PricePoint>, StoreError>;

    /// Newest rows first, at most `limit` (capped at [`MAX_RECENT_PRICES`])
    fn recent_prices(&self, asset_id: &str, limit: usize) -> Result<Vec<PriceObservation>, StoreError>;
}

/// SQLite-backed store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (or create) the database file, creating its parent directory
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Unavailable(format!("cannot create {}: {}", parent.display(), e))
                })?;
            }
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("connection lock poisoned".to_string()))
    }
}

fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_ts(idx: usize, text: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn asset_from_row(row: &Row<'_>) -> rusqlite::Result<Asset> {
    let asset_type: String = row.get(2)?;
    let asset_type = asset_type
        .parse::<AssetCategory>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;
    let last_updated: Option<String> = row.get(5)?;
    let created_at: String = row.get(6)?;

    Ok(Asset {
        id: row.get(0)?,
        symbol: row.get(1)?,
        asset_type,
        name: row.get(3)?,
        currency: row.get(4)?,
        last_updated: last_updated.map(|ts| parse_ts(5, &ts)).transpose()?,
        created_at: parse_ts(6, &created_at)?,
    })
}

impl PriceStore for SqliteStore {
    fn find_asset(&self, symbol: &str) -> Result<Option<Asset>, StoreError> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM assets WHERE symbol = ?1", ASSET_COLUMNS);
        let asset = conn.query_row(&sql, params![symbol], asset_from_row).optional()?;
        Ok(asset)
    }

    fn ensure_asset(&self, asset: &NewAsset) -> Result<Asset, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO assets (id, symbol, asset_type, name, currency, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(symbol) DO NOTHING",
            params![
                Uuid::new_v4().to_string(),
                asset.symbol,
                asset.asset_type.as_str(),
                asset.name,
                asset.currency,
                format_ts(&Utc::now()),
            ],
        )?;
        let sql = format!("SELECT {} FROM assets WHERE symbol = ?1", ASSET_COLUMNS);
        let stored = conn.query_row(&sql, params![asset.symbol], asset_from_row)?;
        Ok(stored)
    }

    fn list_assets(&self) -> Result<Vec<Asset>, StoreError> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM assets ORDER BY symbol", ASSET_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let assets = stmt
            .query_map([], asset_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(assets)
    }

    fn touch_asset(&self, asset_id: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE assets SET last_updated = ?1 WHERE id = ?2",
            params![format_ts(&at), asset_id],
        )?;
        if updated == 0 {
            return Err(StoreError::Corrupt(format!("asset {} does not exist", asset_id)));
        }
        Ok(())
    }

    fn upsert_prices(&self, rows: &[PriceObservation]) -> Result<usize, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO historical_prices
                     (asset_id, timestamp, open_price, high_price, low_price, close_price, volume)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(asset_id, timestamp) DO UPDATE SET
                     open_price = excluded.open_price,
                     high_price = excluded.high_price,
                     low_price = excluded.low_price,
                     close_price = excluded.close_price,
                     volume = excluded.volume",
            )?;
            for row in rows {
                stmt.execute(params![
                    row.asset_id,
                    format_ts(&row.timestamp),
                    row.open,
                    row.high,
                    row.low,
                    row.close,
                    row.volume,
                ])?;
            }
        }
        tx.commit()?;
        Ok(rows.len())
    }

    fn count_prices(&self, asset_id: &str) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM historical_prices WHERE asset_id = ?1",
            params![asset_id],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as usize)
    }

    fn close_history(&self, asset_id: &str) -> Result<Vec<PricePoint>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT timestamp, close_price FROM historical_prices
             WHERE asset_id = ?1 ORDER BY timestamp ASC",
        )?;
        let points = stmt
            .query_map(params![asset_id], |row| {
                let ts: String = row.get(0)?;
                Ok(PricePoint::new(parse_ts(0, &ts)?, row.get(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(points)
    }

    fn recent_prices(&self, asset_id: &str, limit: usize) -> Result<Vec<PriceObservation>, StoreError> {
        let limit = limit.min(MAX_RECENT_PRICES) as i64;
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT asset_id, timestamp, open_price, high_price, low_price, close_price, volume
             FROM historical_prices WHERE asset_id = ?1
             ORDER BY timestamp DESC LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![asset_id, limit], |row| {
                let ts: String = row.get(1)?;
                Ok(PriceObservation {
                    asset_id: row.get(0)?,
                    timestamp: parse_ts(1, &ts)?,
                    open: row.get(2)?,
                    high: row.get(3)?,
                    low: row.get(4)?,
                    close: row.get(5)?,
                    volume: row.get(6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_text_round_trip() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 4, 5, 6, 7).unwrap();
        let text = format_ts(&ts);
        assert_eq!(text, "2024-03-04T05:06:07Z");
        assert_eq!(parse_ts(0, &text).unwrap(), ts);
    }

    #[test]
    fn test_ensure_asset_is_idempotent() {
        let store = SqliteStore::open_in_memory().unwrap();
        let first = store
            .ensure_asset(&NewAsset::for_symbol("AAPL", AssetCategory::Stock))
            .unwrap();
        let second = store
            .ensure_asset(&NewAsset::for_symbol("AAPL", AssetCategory::Stock))
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(store.list_assets().unwrap().len(), 1);
    }
}
