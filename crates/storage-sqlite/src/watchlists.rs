//! Watch-list repository.
//!
//! Membership is keyed by the canonical asset id, the same join key the
//! market data layer caches under, so a watch-list row stays valid no matter
//! which provider last refreshed the asset.

use log::debug;
use rusqlite::{params, OptionalExtension, Row};
use serde::Serialize;

use coinwatch_market_data::Asset;

use crate::errors::StorageError;
use crate::market::{row_to_asset, ASSET_COLUMNS};
use crate::SqliteStore;

/// A named collection of watched assets.
#[derive(Clone, Debug, Serialize)]
pub struct Watchlist {
    pub id: i64,
    pub name: String,
    pub created_at: String,
}

impl SqliteStore {
    /// Create a watch list and return the stored row.
    pub fn create_watchlist(&self, name: &str) -> Result<Watchlist, StorageError> {
        let conn = self.lock_conn();
        conn.execute("INSERT INTO watchlists (name) VALUES (?1)", params![name])?;
        let id = conn.last_insert_rowid();
        let watchlist = conn.query_row(
            "SELECT id, name, created_at FROM watchlists WHERE id = ?1",
            params![id],
            row_to_watchlist,
        )?;
        debug!("Created watchlist '{}' ({})", watchlist.name, watchlist.id);
        Ok(watchlist)
    }

    /// All watch lists, oldest first.
    pub fn watchlists(&self) -> Result<Vec<Watchlist>, StorageError> {
        let conn = self.lock_conn();
        let mut stmt =
            conn.prepare("SELECT id, name, created_at FROM watchlists ORDER BY id ASC")?;
        let rows = stmt.query_map([], row_to_watchlist)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Look up one watch list by id.
    pub fn watchlist(&self, id: i64) -> Result<Option<Watchlist>, StorageError> {
        let conn = self.lock_conn();
        let watchlist = conn
            .query_row(
                "SELECT id, name, created_at FROM watchlists WHERE id = ?1",
                params![id],
                row_to_watchlist,
            )
            .optional()?;
        Ok(watchlist)
    }

    /// Rename a watch list. Returns false when the id does not exist.
    pub fn rename_watchlist(&self, id: i64, name: &str) -> Result<bool, StorageError> {
        let conn = self.lock_conn();
        let changed = conn.execute(
            "UPDATE watchlists SET name = ?1 WHERE id = ?2",
            params![name, id],
        )?;
        Ok(changed > 0)
    }

    /// Delete a watch list and its membership rows.
    /// Returns false when the id does not exist.
    pub fn delete_watchlist(&self, id: i64) -> Result<bool, StorageError> {
        let conn = self.lock_conn();
        let changed = conn.execute("DELETE FROM watchlists WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    /// Add an asset to a watch list. Re-adding an existing member is a no-op.
    pub fn add_to_watchlist(&self, watchlist_id: i64, asset_id: &str) -> Result<(), StorageError> {
        let conn = self.lock_conn();
        conn.execute(
            "INSERT OR IGNORE INTO watchlist_assets (watchlist_id, asset_id) VALUES (?1, ?2)",
            params![watchlist_id, asset_id],
        )?;
        Ok(())
    }

    /// Remove an asset from a watch list.
    /// Returns false when it was not a member.
    pub fn remove_from_watchlist(
        &self,
        watchlist_id: i64,
        asset_id: &str,
    ) -> Result<bool, StorageError> {
        let conn = self.lock_conn();
        let changed = conn.execute(
            "DELETE FROM watchlist_assets WHERE watchlist_id = ?1 AND asset_id = ?2",
            params![watchlist_id, asset_id],
        )?;
        Ok(changed > 0)
    }

    /// The member assets of a watch list, ordered by market cap rank.
    ///
    /// Members whose asset row has not been cached yet are simply absent
    /// from the result; they appear once the market layer writes them
    /// through.
    pub fn watchlist_assets(&self, watchlist_id: i64) -> Result<Vec<Asset>, StorageError> {
        let conn = self.lock_conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM assets
             JOIN watchlist_assets ON watchlist_assets.asset_id = assets.id
             WHERE watchlist_assets.watchlist_id = ?1
             ORDER BY assets.market_cap_rank ASC",
            ASSET_COLUMNS
        ))?;
        let rows = stmt.query_map(params![watchlist_id], row_to_asset)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

fn row_to_watchlist(row: &Row<'_>) -> rusqlite::Result<Watchlist> {
    Ok(Watchlist {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: row.get(2)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use coinwatch_market_data::DurableStore;

    fn ranked_asset(id: &str, symbol: &str, name: &str, rank: u32) -> Asset {
        let mut asset = Asset::new(id, symbol, name);
        asset.market_cap_rank = Some(rank);
        asset
    }

    #[test]
    fn test_create_and_list() {
        let store = SqliteStore::open_in_memory().unwrap();

        let created = store.create_watchlist("DeFi").unwrap();
        assert_eq!(created.name, "DeFi");
        assert!(!created.created_at.is_empty());

        // Default watchlist plus the new one
        assert_eq!(store.watchlists().unwrap().len(), 2);
    }

    #[test]
    fn test_rename() {
        let store = SqliteStore::open_in_memory().unwrap();
        let created = store.create_watchlist("DeFi").unwrap();

        assert!(store.rename_watchlist(created.id, "DeFi Majors").unwrap());
        assert_eq!(
            store.watchlist(created.id).unwrap().unwrap().name,
            "DeFi Majors"
        );

        assert!(!store.rename_watchlist(9999, "Ghost").unwrap());
    }

    #[tokio::test]
    async fn test_membership_is_idempotent() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .upsert_assets(&[ranked_asset("bitcoin", "BTC", "Bitcoin", 1)])
            .await
            .unwrap();
        let watchlist = store.create_watchlist("Core").unwrap();

        store.add_to_watchlist(watchlist.id, "bitcoin").unwrap();
        store.add_to_watchlist(watchlist.id, "bitcoin").unwrap();

        assert_eq!(store.watchlist_assets(watchlist.id).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_members_are_ordered_by_rank() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .upsert_assets(&[
                ranked_asset("tether", "USDT", "Tether", 3),
                ranked_asset("bitcoin", "BTC", "Bitcoin", 1),
            ])
            .await
            .unwrap();
        let watchlist = store.create_watchlist("Mixed").unwrap();
        store.add_to_watchlist(watchlist.id, "tether").unwrap();
        store.add_to_watchlist(watchlist.id, "bitcoin").unwrap();

        let members = store.watchlist_assets(watchlist.id).unwrap();
        assert_eq!(members[0].id, "bitcoin");
        assert_eq!(members[1].id, "tether");
    }

    #[tokio::test]
    async fn test_delete_cascades_membership() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .upsert_assets(&[ranked_asset("bitcoin", "BTC", "Bitcoin", 1)])
            .await
            .unwrap();
        let watchlist = store.create_watchlist("Doomed").unwrap();
        store.add_to_watchlist(watchlist.id, "bitcoin").unwrap();

        assert!(store.delete_watchlist(watchlist.id).unwrap());
        assert!(store.watchlist(watchlist.id).unwrap().is_none());

        let orphans: i64 = store
            .lock_conn()
            .query_row(
                "SELECT COUNT(*) FROM watchlist_assets WHERE watchlist_id = ?1",
                params![watchlist.id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(orphans, 0);
    }

    #[test]
    fn test_remove_member() {
        let store = SqliteStore::open_in_memory().unwrap();
        let watchlist = store.create_watchlist("Core").unwrap();
        store.add_to_watchlist(watchlist.id, "bitcoin").unwrap();

        assert!(store.remove_from_watchlist(watchlist.id, "bitcoin").unwrap());
        assert!(!store.remove_from_watchlist(watchlist.id, "bitcoin").unwrap());
    }
}
