//! Aggregation layer orchestrating providers, caches, and the durable store.
//!
//! Every public operation follows the same shape:
//!
//! 1. Result cache hit? Return immediately, with no provider or health check.
//! 2. History only: a fresh-enough durable read returns without contacting
//!    any provider.
//! 3. Try providers in priority order, skipping ones that lack the
//!    capability or are unavailable. Each attempt passes the rate throttle
//!    first. Success: record health, write through to the durable store,
//!    fill the result cache, return. Failure: record the error, move on.
//! 4. All providers failed or skipped: fall back to the durable store. An
//!    empty collection is a valid, non-error outcome; the dashboard keeps
//!    rendering last-known data through an extended outage.

mod cache;
mod health;
mod throttle;

pub use cache::{CacheKey, CachedValue, ResultCache};
pub use health::HealthTracker;
pub use throttle::RateThrottle;

use std::sync::Arc;

use chrono::Utc;
use log::{debug, info, warn};

use crate::errors::MarketDataError;
use crate::models::{Asset, AssetDetail, PricePoint, ProviderHealth, SearchHit};
use crate::provider::MarketDataProvider;
use crate::store::DurableStore;

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Durable history whose newest point is older than this is treated as
/// absent, forcing a live refetch instead of presenting an hour-old chart
/// as current.
const HISTORY_FRESH_MILLIS: i64 = 60 * 60 * 1000;

/// Queries shorter than this short-circuit to an empty result.
const MIN_QUERY_CHARS: usize = 2;

/// Durable search fallback cap, matching the provider-side cap.
const SEARCH_RESULT_CAP: usize = 20;

/// Size of the listing that trending ids are materialized from.
const TRENDING_POOL: u32 = 100;

/// Breadth of the top-by-rank approximation when the primary is down.
const TRENDING_FALLBACK: u32 = 10;

/// Market data aggregator.
///
/// Owns the result cache, health records, and throttle state for the process
/// lifetime. Construct one instance and share it behind an `Arc`.
pub struct Aggregator {
    providers: Vec<Arc<dyn MarketDataProvider>>,
    throttle: RateThrottle,
    health: HealthTracker,
    cache: ResultCache,
    store: Arc<dyn DurableStore>,
}

impl Aggregator {
    /// Create an aggregator over the given providers and durable store.
    ///
    /// Providers are ordered by ascending `priority()`; the throttle is wired
    /// from each provider's declared minimum interval.
    pub fn new(
        mut providers: Vec<Arc<dyn MarketDataProvider>>,
        store: Arc<dyn DurableStore>,
    ) -> Self {
        providers.sort_by_key(|provider| provider.priority());

        let throttle = RateThrottle::new();
        let health = HealthTracker::new();
        for provider in &providers {
            throttle.configure(provider.id(), provider.min_interval());
            health.register(provider.id());
        }

        Self {
            providers,
            throttle,
            health,
            cache: ResultCache::new(),
            store,
        }
    }

    /// One page of the market listing, most valuable assets first.
    ///
    /// Falls back to the durable store (by rank) when every provider fails.
    pub async fn assets(&self, page: u32, limit: u32) -> Result<Vec<Asset>, MarketDataError> {
        let key = CacheKey::AssetList { page, limit };
        let ttl = key.ttl();

        if let Some(CachedValue::Assets(assets)) = self.cache.get(&key) {
            debug!("Asset list served from cache (page {}, limit {})", page, limit);
            return Ok(assets);
        }

        for provider in &self.providers {
            let name = provider.id();
            if !self.health.is_available(name) {
                debug!("Skipping unavailable provider '{}'", name);
                continue;
            }

            self.throttle.acquire(name).await;

            match provider.list_assets(page, limit).await {
                Ok(assets) => {
                    self.health.record_success(name);
                    self.write_through_assets(&assets).await;
                    info!("Fetched {} assets from '{}'", assets.len(), name);
                    self.cache.put(key, CachedValue::Assets(assets.clone()), ttl);
                    return Ok(assets);
                }
                Err(MarketDataError::NotSupported { .. }) => continue,
                Err(e) => {
                    warn!("Provider '{}' list failed: {}", name, e);
                    self.health.record_error(name);
                }
            }
        }

        debug!("All providers failed for asset list, reading durable store");
        Ok(self.store.assets_by_rank(limit as usize).await?)
    }

    /// A single asset with detail fields.
    ///
    /// `Ok(None)` means the id is unknown to every provider and the durable
    /// store: an explicit absence, distinct from an empty listing. Providers
    /// without a descriptive schema contribute details with those fields
    /// absent, as does the durable fallback.
    pub async fn asset_detail(&self, id: &str) -> Result<Option<AssetDetail>, MarketDataError> {
        let key = CacheKey::AssetDetail { id: id.to_string() };
        let ttl = key.ttl();

        if let Some(CachedValue::Detail(detail)) = self.cache.get(&key) {
            debug!("Detail for '{}' served from cache", id);
            return Ok(Some(*detail));
        }

        for provider in &self.providers {
            if !provider.capabilities().supports_detail {
                continue;
            }
            let name = provider.id();
            if !self.health.is_available(name) {
                debug!("Skipping unavailable provider '{}'", name);
                continue;
            }

            self.throttle.acquire(name).await;

            match provider.asset_detail(id).await {
                Ok(detail) => {
                    self.health.record_success(name);
                    self.write_through_assets(std::slice::from_ref(&detail.asset))
                        .await;
                    self.cache
                        .put(key, CachedValue::Detail(Box::new(detail.clone())), ttl);
                    return Ok(Some(detail));
                }
                Err(MarketDataError::NotSupported { .. }) => continue,
                Err(e) => {
                    warn!("Provider '{}' detail for '{}' failed: {}", name, id, e);
                    self.health.record_error(name);
                }
            }
        }

        Ok(self.store.asset(id).await?.map(AssetDetail::from))
    }

    /// Price series for an asset over the last `days` days.
    ///
    /// The durable store is consulted ahead of the providers; a copy whose
    /// newest point is within the freshness window is served directly. When
    /// the durable copy is stale and every provider fails, the result is
    /// empty; stale chart data is never presented as current.
    pub async fn price_history(
        &self,
        id: &str,
        days: u32,
    ) -> Result<Vec<PricePoint>, MarketDataError> {
        let key = CacheKey::History {
            id: id.to_string(),
            days,
        };
        let ttl = key.ttl();

        if let Some(CachedValue::History(points)) = self.cache.get(&key) {
            debug!("History for '{}' served from cache", id);
            return Ok(points);
        }

        let since = Utc::now().timestamp_millis() - i64::from(days) * MILLIS_PER_DAY;
        let stored = self.store.history_since(id, since).await?;
        if is_fresh(&stored) {
            debug!(
                "Serving {} durable history points for '{}'",
                stored.len(),
                id
            );
            return Ok(stored);
        }

        for provider in &self.providers {
            if !provider.capabilities().supports_history {
                continue;
            }
            let name = provider.id();
            if !self.health.is_available(name) {
                debug!("Skipping unavailable provider '{}'", name);
                continue;
            }

            self.throttle.acquire(name).await;

            match provider.price_history(id, days).await {
                Ok(points) => {
                    self.health.record_success(name);
                    if let Err(e) = self.store.upsert_history(id, &points).await {
                        warn!(
                            "Write-through of {} history points for '{}' failed: {}",
                            points.len(),
                            id,
                            e
                        );
                    }
                    info!(
                        "Fetched {} history points for '{}' from '{}'",
                        points.len(),
                        id,
                        name
                    );
                    self.cache.put(key, CachedValue::History(points.clone()), ttl);
                    return Ok(points);
                }
                Err(MarketDataError::NotSupported { .. }) => continue,
                Err(e) => {
                    warn!("Provider '{}' history for '{}' failed: {}", name, id, e);
                    self.health.record_error(name);
                }
            }
        }

        Ok(Vec::new())
    }

    /// Search assets by name or symbol.
    ///
    /// Queries shorter than two characters return empty immediately, with no
    /// provider or durable call. The durable store serves as a substring
    /// fallback when every search-capable provider fails.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchHit>, MarketDataError> {
        let query = query.trim();
        if query.chars().count() < MIN_QUERY_CHARS {
            return Ok(Vec::new());
        }

        let key = CacheKey::search(query);
        let ttl = key.ttl();

        if let Some(CachedValue::Hits(hits)) = self.cache.get(&key) {
            debug!("Search '{}' served from cache", query);
            return Ok(hits);
        }

        for provider in &self.providers {
            if !provider.capabilities().supports_search {
                continue;
            }
            let name = provider.id();
            if !self.health.is_available(name) {
                debug!("Skipping unavailable provider '{}'", name);
                continue;
            }

            self.throttle.acquire(name).await;

            match provider.search(query).await {
                Ok(hits) => {
                    self.health.record_success(name);
                    self.cache.put(key, CachedValue::Hits(hits.clone()), ttl);
                    return Ok(hits);
                }
                Err(MarketDataError::NotSupported { .. }) => continue,
                Err(e) => {
                    warn!("Provider '{}' search '{}' failed: {}", name, query, e);
                    self.health.record_error(name);
                }
            }
        }

        Ok(self
            .store
            .search(&query.to_lowercase(), SEARCH_RESULT_CAP)
            .await?)
    }

    /// Trending assets as reported by the primary provider, materialized
    /// through the list operation (with its own independent caching).
    ///
    /// Only the primary knows trending. When it is unavailable or fails,
    /// this degrades to the top assets by rank, a deliberate approximation and
    /// not an error.
    pub async fn trending(&self) -> Result<Vec<Asset>, MarketDataError> {
        let key = CacheKey::Trending;
        let ttl = key.ttl();

        if let Some(CachedValue::Assets(assets)) = self.cache.get(&key) {
            debug!("Trending served from cache");
            return Ok(assets);
        }

        if let Some(provider) = self
            .providers
            .iter()
            .find(|p| p.capabilities().supports_trending)
        {
            let name = provider.id();
            if self.health.is_available(name) {
                self.throttle.acquire(name).await;

                match provider.trending_ids().await {
                    Ok(ids) => {
                        self.health.record_success(name);
                        let pool = self.assets(1, TRENDING_POOL).await?;
                        let trending: Vec<Asset> = pool
                            .into_iter()
                            .filter(|asset| ids.contains(&asset.id))
                            .collect();
                        info!("Materialized {} trending assets", trending.len());
                        self.cache
                            .put(key, CachedValue::Assets(trending.clone()), ttl);
                        return Ok(trending);
                    }
                    Err(e) => {
                        warn!("Provider '{}' trending failed: {}", name, e);
                        self.health.record_error(name);
                    }
                }
            }
        }

        debug!("Trending degraded to top {} by rank", TRENDING_FALLBACK);
        self.assets(1, TRENDING_FALLBACK).await
    }

    /// Health snapshot of every provider, in priority order.
    ///
    /// Operational visibility only; not meant to drive control decisions.
    pub fn source_status(&self) -> Vec<ProviderHealth> {
        self.providers
            .iter()
            .map(|provider| self.health.health_of(provider.id()))
            .collect()
    }

    async fn write_through_assets(&self, assets: &[Asset]) {
        if let Err(e) = self.store.upsert_assets(assets).await {
            warn!("Write-through of {} assets failed: {}", assets.len(), e);
        }
    }
}

fn is_fresh(points: &[PricePoint]) -> bool {
    points
        .last()
        .is_some_and(|point| Utc::now().timestamp_millis() - point.timestamp < HISTORY_FRESH_MILLIS)
}
