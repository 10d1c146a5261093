//! `DurableStore` implementation over the assets and price_history tables.
//!
//! Upserts use `INSERT OR REPLACE`, so re-writing an existing `id` or
//! `(asset_id, timestamp)` is last-write-wins rather than a duplicate row.
//! Reads on a cold database return empty collections, never errors.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use rusqlite::{params, OptionalExtension, Row};

use coinwatch_market_data::{Asset, DurableStore, PricePoint, SearchHit, StoreError};

use crate::errors::StorageError;
use crate::SqliteStore;

/// Qualified column list shared by every asset read, so row indexes stay
/// stable across plain selects and joins.
pub(crate) const ASSET_COLUMNS: &str = "assets.id, assets.symbol, assets.name, assets.image, \
    assets.current_price, assets.market_cap, assets.market_cap_rank, \
    assets.price_change_24h, assets.price_change_percentage_24h, assets.total_volume, \
    assets.high_24h, assets.low_24h, assets.ath, assets.ath_date, assets.atl, assets.atl_date, \
    assets.circulating_supply, assets.total_supply, assets.max_supply, assets.last_updated";

impl SqliteStore {
    fn upsert_assets_impl(&self, assets: &[Asset]) -> Result<(), StorageError> {
        let mut conn = self.lock_conn();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO assets (
                    id, symbol, name, image, current_price, market_cap, market_cap_rank,
                    price_change_24h, price_change_percentage_24h, total_volume,
                    high_24h, low_24h, ath, ath_date, atl, atl_date,
                    circulating_supply, total_supply, max_supply, last_updated
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                          ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
            )?;
            for asset in assets {
                stmt.execute(params![
                    asset.id,
                    asset.symbol,
                    asset.name,
                    asset.image,
                    asset.current_price,
                    asset.market_cap,
                    asset.market_cap_rank,
                    asset.price_change_24h,
                    asset.price_change_percentage_24h,
                    asset.total_volume,
                    asset.high_24h,
                    asset.low_24h,
                    asset.ath,
                    asset.ath_date.map(|d| d.to_rfc3339()),
                    asset.atl,
                    asset.atl_date.map(|d| d.to_rfc3339()),
                    asset.circulating_supply,
                    asset.total_supply,
                    asset.max_supply,
                    asset.last_updated.map(|d| d.to_rfc3339()),
                ])?;
            }
        }
        tx.commit()?;
        debug!("Upserted {} asset rows", assets.len());
        Ok(())
    }

    fn assets_by_rank_impl(&self, limit: usize) -> Result<Vec<Asset>, StorageError> {
        let conn = self.lock_conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM assets ORDER BY market_cap_rank ASC LIMIT ?1",
            ASSET_COLUMNS
        ))?;
        let rows = stmt.query_map(params![limit as i64], row_to_asset)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn asset_impl(&self, id: &str) -> Result<Option<Asset>, StorageError> {
        let conn = self.lock_conn();
        let asset = conn
            .query_row(
                &format!("SELECT {} FROM assets WHERE assets.id = ?1", ASSET_COLUMNS),
                params![id],
                row_to_asset,
            )
            .optional()?;
        Ok(asset)
    }

    fn upsert_history_impl(
        &self,
        asset_id: &str,
        points: &[PricePoint],
    ) -> Result<(), StorageError> {
        let mut conn = self.lock_conn();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO price_history (asset_id, timestamp, price, volume)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for point in points {
                stmt.execute(params![asset_id, point.timestamp, point.price, point.volume])?;
            }
        }
        tx.commit()?;
        debug!("Upserted {} history points for '{}'", points.len(), asset_id);
        Ok(())
    }

    fn history_since_impl(
        &self,
        asset_id: &str,
        since: i64,
    ) -> Result<Vec<PricePoint>, StorageError> {
        let conn = self.lock_conn();
        let mut stmt = conn.prepare(
            "SELECT timestamp, price, volume FROM price_history
             WHERE asset_id = ?1 AND timestamp >= ?2
             ORDER BY timestamp ASC",
        )?;
        let rows = stmt.query_map(params![asset_id, since], |row| {
            Ok(PricePoint {
                timestamp: row.get(0)?,
                price: row.get(1)?,
                volume: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn search_impl(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, StorageError> {
        let pattern = format!("%{}%", query.to_lowercase());
        let conn = self.lock_conn();
        let mut stmt = conn.prepare(
            "SELECT id, symbol, name, market_cap_rank, image FROM assets
             WHERE LOWER(name) LIKE ?1 OR LOWER(symbol) LIKE ?1
             ORDER BY market_cap_rank ASC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![pattern, limit as i64], |row| {
            Ok(SearchHit {
                id: row.get(0)?,
                symbol: row.get(1)?,
                name: row.get(2)?,
                market_cap_rank: row.get(3)?,
                thumb: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

#[async_trait]
impl DurableStore for SqliteStore {
    async fn upsert_assets(&self, assets: &[Asset]) -> Result<(), StoreError> {
        Ok(self.upsert_assets_impl(assets)?)
    }

    async fn assets_by_rank(&self, limit: usize) -> Result<Vec<Asset>, StoreError> {
        Ok(self.assets_by_rank_impl(limit)?)
    }

    async fn asset(&self, id: &str) -> Result<Option<Asset>, StoreError> {
        Ok(self.asset_impl(id)?)
    }

    async fn upsert_history(
        &self,
        asset_id: &str,
        points: &[PricePoint],
    ) -> Result<(), StoreError> {
        Ok(self.upsert_history_impl(asset_id, points)?)
    }

    async fn history_since(
        &self,
        asset_id: &str,
        since: i64,
    ) -> Result<Vec<PricePoint>, StoreError> {
        Ok(self.history_since_impl(asset_id, since)?)
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, StoreError> {
        Ok(self.search_impl(query, limit)?)
    }
}

pub(crate) fn row_to_asset(row: &Row<'_>) -> rusqlite::Result<Asset> {
    Ok(Asset {
        id: row.get(0)?,
        symbol: row.get(1)?,
        name: row.get(2)?,
        image: row.get(3)?,
        current_price: row.get(4)?,
        market_cap: row.get(5)?,
        market_cap_rank: row.get(6)?,
        price_change_24h: row.get(7)?,
        price_change_percentage_24h: row.get(8)?,
        total_volume: row.get(9)?,
        high_24h: row.get(10)?,
        low_24h: row.get(11)?,
        ath: row.get(12)?,
        ath_date: parse_stored_datetime(row.get(13)?),
        atl: row.get(14)?,
        atl_date: parse_stored_datetime(row.get(15)?),
        circulating_supply: row.get(16)?,
        total_supply: row.get(17)?,
        max_supply: row.get(18)?,
        last_updated: parse_stored_datetime(row.get(19)?),
    })
}

/// Timestamps are stored as RFC 3339 text; anything unparseable reads back
/// as absent.
fn parse_stored_datetime(value: Option<String>) -> Option<DateTime<Utc>> {
    value.and_then(|raw| {
        DateTime::parse_from_rfc3339(&raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranked_asset(id: &str, symbol: &str, name: &str, rank: u32) -> Asset {
        let mut asset = Asset::new(id, symbol, name);
        asset.market_cap_rank = Some(rank);
        asset.current_price = Some(1000.0 / f64::from(rank));
        asset.last_updated = Some(Utc::now());
        asset
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let store = SqliteStore::open_in_memory().unwrap();
        let asset = ranked_asset("bitcoin", "BTC", "Bitcoin", 1);

        store.upsert_assets(&[asset.clone()]).await.unwrap();
        store.upsert_assets(&[asset]).await.unwrap();

        let count: i64 = store
            .lock_conn()
            .query_row("SELECT COUNT(*) FROM assets", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_upsert_replaces_fields() {
        let store = SqliteStore::open_in_memory().unwrap();

        let mut asset = ranked_asset("bitcoin", "BTC", "Bitcoin", 1);
        store.upsert_assets(&[asset.clone()]).await.unwrap();

        asset.current_price = Some(50000.0);
        store.upsert_assets(&[asset]).await.unwrap();

        let stored = store.asset("bitcoin").await.unwrap().unwrap();
        assert_eq!(stored.current_price, Some(50000.0));
    }

    #[tokio::test]
    async fn test_assets_by_rank_orders_and_limits() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .upsert_assets(&[
                ranked_asset("tether", "USDT", "Tether", 3),
                ranked_asset("bitcoin", "BTC", "Bitcoin", 1),
                ranked_asset("ethereum", "ETH", "Ethereum", 2),
            ])
            .await
            .unwrap();

        let assets = store.assets_by_rank(2).await.unwrap();
        assert_eq!(assets.len(), 2);
        assert_eq!(assets[0].id, "bitcoin");
        assert_eq!(assets[1].id, "ethereum");
    }

    #[tokio::test]
    async fn test_cold_reads_return_empty() {
        let store = SqliteStore::open_in_memory().unwrap();

        assert!(store.assets_by_rank(10).await.unwrap().is_empty());
        assert!(store.asset("bitcoin").await.unwrap().is_none());
        assert!(store.history_since("bitcoin", 0).await.unwrap().is_empty());
        assert!(store.search("bit", 20).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_asset_round_trips_dates() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut asset = ranked_asset("bitcoin", "BTC", "Bitcoin", 1);
        asset.ath_date = Some(
            DateTime::parse_from_rfc3339("2021-11-10T14:24:11Z")
                .unwrap()
                .with_timezone(&Utc),
        );

        store.upsert_assets(&[asset.clone()]).await.unwrap();
        let stored = store.asset("bitcoin").await.unwrap().unwrap();

        assert_eq!(stored.ath_date, asset.ath_date);
        assert_eq!(stored.last_updated, asset.last_updated);
    }

    #[tokio::test]
    async fn test_history_upsert_replaces_same_timestamp() {
        let store = SqliteStore::open_in_memory().unwrap();

        store
            .upsert_history("bitcoin", &[PricePoint::new(1_704_067_200_000, 42000.0)])
            .await
            .unwrap();
        store
            .upsert_history("bitcoin", &[PricePoint::new(1_704_067_200_000, 42500.0)])
            .await
            .unwrap();

        let points = store.history_since("bitcoin", 0).await.unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].price, 42500.0);
    }

    #[tokio::test]
    async fn test_history_since_filters_and_orders() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .upsert_history(
                "bitcoin",
                &[
                    PricePoint::new(3_000, 43200.0),
                    PricePoint::new(1_000, 43000.0),
                    PricePoint::new(2_000, 43100.0),
                ],
            )
            .await
            .unwrap();

        let points = store.history_since("bitcoin", 2_000).await.unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].timestamp, 2_000);
        assert_eq!(points[1].timestamp, 3_000);
    }

    #[tokio::test]
    async fn test_history_is_scoped_per_asset() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .upsert_history("bitcoin", &[PricePoint::new(1_000, 43000.0)])
            .await
            .unwrap();
        store
            .upsert_history("ethereum", &[PricePoint::new(1_000, 2280.0)])
            .await
            .unwrap();

        let points = store.history_since("bitcoin", 0).await.unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].price, 43000.0);
    }

    #[tokio::test]
    async fn test_search_matches_name_and_symbol() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .upsert_assets(&[
                ranked_asset("bitcoin", "BTC", "Bitcoin", 1),
                ranked_asset("ethereum", "ETH", "Ethereum", 2),
            ])
            .await
            .unwrap();

        let by_name = store.search("bitc", 20).await.unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].id, "bitcoin");

        let by_symbol = store.search("eth", 20).await.unwrap();
        assert_eq!(by_symbol.len(), 1);
        assert_eq!(by_symbol[0].id, "ethereum");
    }
}
