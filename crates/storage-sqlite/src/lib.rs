//! SQLite storage implementation for Coinwatch.
//!
//! This crate provides all database-related functionality using rusqlite.
//! It implements the `DurableStore` trait defined in `coinwatch-market-data`
//! and contains:
//! - Schema bootstrap and connection management
//! - The durable last-known-good market data store
//! - Watch-list and price-alert repositories
//!
//! # Architecture
//!
//! This crate is the only place in the application where SQLite dependencies
//! exist. Everything above it is database-agnostic and works with traits.
//!
//! ```text
//!   market-data (domain)
//!          |
//!          v
//!   storage-sqlite (this crate)
//!          |
//!          v
//!      SQLite DB
//! ```

mod errors;
mod market;

pub mod alerts;
pub mod watchlists;

pub use alerts::{AlertCondition, PriceAlert};
pub use errors::StorageError;
pub use watchlists::Watchlist;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use log::{info, warn};
use rusqlite::Connection;

/// Durable last-known-good store over a single SQLite database.
///
/// The connection sits behind a mutex; queries are short and never suspend,
/// so one writer at a time is enough for this workload.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and bootstrap the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::from_connection(conn)
    }

    /// In-memory database, used by tests and ephemeral deployments.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.pragma_update(None, "foreign_keys", true)?;
        init_schema(&conn)?;
        info!("SQLite store initialized");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Lock the connection, recovering from poison if necessary.
    pub(crate) fn lock_conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| {
            warn!("SQLite connection mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS assets (
    id TEXT PRIMARY KEY,
    symbol TEXT NOT NULL,
    name TEXT NOT NULL,
    image TEXT,
    current_price REAL,
    market_cap REAL,
    market_cap_rank INTEGER,
    price_change_24h REAL,
    price_change_percentage_24h REAL,
    total_volume REAL,
    high_24h REAL,
    low_24h REAL,
    ath REAL,
    ath_date TEXT,
    atl REAL,
    atl_date TEXT,
    circulating_supply REAL,
    total_supply REAL,
    max_supply REAL,
    last_updated TEXT
);

CREATE TABLE IF NOT EXISTS price_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    asset_id TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    price REAL NOT NULL,
    volume REAL,
    UNIQUE(asset_id, timestamp)
);

CREATE TABLE IF NOT EXISTS watchlists (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS watchlist_assets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    watchlist_id INTEGER REFERENCES watchlists(id) ON DELETE CASCADE,
    asset_id TEXT NOT NULL,
    added_at TEXT DEFAULT CURRENT_TIMESTAMP,
    UNIQUE(watchlist_id, asset_id)
);

CREATE TABLE IF NOT EXISTS price_alerts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    asset_id TEXT NOT NULL,
    target_price REAL NOT NULL,
    condition TEXT CHECK(condition IN ('above', 'below')),
    triggered INTEGER DEFAULT 0,
    triggered_at TEXT,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_assets_rank ON assets(market_cap_rank);
CREATE INDEX IF NOT EXISTS idx_price_history_asset ON price_history(asset_id, timestamp);
CREATE INDEX IF NOT EXISTS idx_watchlist_assets ON watchlist_assets(watchlist_id);
CREATE INDEX IF NOT EXISTS idx_alerts_asset ON price_alerts(asset_id);
";

fn init_schema(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(SCHEMA)?;
    seed_default_watchlist(conn)?;
    Ok(())
}

fn seed_default_watchlist(conn: &Connection) -> Result<(), StorageError> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM watchlists", [], |row| row.get(0))?;
    if count == 0 {
        conn.execute("INSERT INTO watchlists (name) VALUES (?1)", ["My Watchlist"])?;
        info!("Created default watchlist");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory_bootstraps_schema() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.lock_conn();

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('assets', 'price_history', 'watchlists',
                              'watchlist_assets', 'price_alerts')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 5);
    }

    #[test]
    fn test_default_watchlist_is_seeded_once() {
        let store = SqliteStore::open_in_memory().unwrap();
        let watchlists = store.watchlists().unwrap();
        assert_eq!(watchlists.len(), 1);
        assert_eq!(watchlists[0].name, "My Watchlist");
    }

    #[test]
    fn test_open_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coinwatch.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.create_watchlist("DeFi").unwrap();
        }

        // Reopening keeps data and does not reseed the default watchlist
        let store = SqliteStore::open(&path).unwrap();
        let names: Vec<String> = store
            .watchlists()
            .unwrap()
            .into_iter()
            .map(|w| w.name)
            .collect();
        assert_eq!(names, vec!["My Watchlist", "DeFi"]);
    }
}
