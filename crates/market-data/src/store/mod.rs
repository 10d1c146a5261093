//! Durable last-known-good storage consumed by the aggregator.

use async_trait::async_trait;

use crate::errors::StoreError;
use crate::models::{Asset, PricePoint, SearchHit};

/// Persistent fallback store of last-known-good market data.
///
/// The aggregator writes through on every successful provider fetch and
/// reads back when every provider has failed, so the store always reflects
/// the most recent successfully-observed truth.
///
/// Implementations must make upserts idempotent; `id` for assets and
/// `(asset, timestamp)` for history are last-write-wins keys, never
/// duplicated. Reads must degrade gracefully: a cold store returns
/// empty collections, not errors.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Insert or replace asset rows by `id`.
    async fn upsert_assets(&self, assets: &[Asset]) -> Result<(), StoreError>;

    /// Read up to `limit` assets ordered by market cap rank.
    async fn assets_by_rank(&self, limit: usize) -> Result<Vec<Asset>, StoreError>;

    /// Read one asset by id.
    async fn asset(&self, id: &str) -> Result<Option<Asset>, StoreError>;

    /// Insert or replace history points for an asset, keyed by timestamp.
    async fn upsert_history(
        &self,
        asset_id: &str,
        points: &[PricePoint],
    ) -> Result<(), StoreError>;

    /// Read history points at or after `since` (epoch millis), ascending.
    async fn history_since(
        &self,
        asset_id: &str,
        since: i64,
    ) -> Result<Vec<PricePoint>, StoreError>;

    /// Case-insensitive substring search over asset names and symbols,
    /// ordered by rank, capped to `limit`.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, StoreError>;
}
