//! Short-lived in-memory memoization of aggregator results.
//!
//! Pure memoization keyed by logical query: a key is absent if it was never
//! stored or its TTL has passed, and expired entries are evicted lazily on
//! the lookup that finds them. No capacity bound or LRU: the key space is
//! bounded by the set of distinct queries actually requested.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, warn};
use tokio::time::Instant;

use crate::models::{Asset, AssetDetail, PricePoint, SearchHit};

/// TTL for asset listings and trending results.
pub const LIST_TTL: Duration = Duration::from_secs(60);
/// TTL for per-asset detail.
pub const DETAIL_TTL: Duration = Duration::from_secs(120);
/// TTL for price history.
pub const HISTORY_TTL: Duration = Duration::from_secs(300);
/// TTL for search results.
pub const SEARCH_TTL: Duration = Duration::from_secs(600);

/// Logical query identity. Parameters are normalized (lower-cased query)
/// before keying so equivalent requests share an entry.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CacheKey {
    AssetList { page: u32, limit: u32 },
    AssetDetail { id: String },
    History { id: String, days: u32 },
    Search { query: String },
    Trending,
}

impl CacheKey {
    /// Key for a search query, normalized to lowercase.
    pub fn search(query: &str) -> Self {
        Self::Search {
            query: query.to_lowercase(),
        }
    }

    /// How long entries of this kind stay servable, reflecting how fast each
    /// kind of data actually changes and each provider's rate sensitivity.
    pub fn ttl(&self) -> Duration {
        match self {
            Self::AssetList { .. } | Self::Trending => LIST_TTL,
            Self::AssetDetail { .. } => DETAIL_TTL,
            Self::History { .. } => HISTORY_TTL,
            Self::Search { .. } => SEARCH_TTL,
        }
    }
}

/// A cached aggregator result.
#[derive(Clone, Debug)]
pub enum CachedValue {
    Assets(Vec<Asset>),
    Detail(Box<AssetDetail>),
    History(Vec<PricePoint>),
    Hits(Vec<SearchHit>),
}

#[derive(Debug)]
struct CacheEntry {
    value: CachedValue,
    stored_at: Instant,
    ttl: Duration,
}

/// In-memory result cache with per-entry TTL and lazy eviction.
pub struct ResultCache {
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Lock the entry map, recovering from poison if necessary.
    fn lock_entries(&self) -> MutexGuard<'_, HashMap<CacheKey, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| {
            warn!("Result cache mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Look up a key. An entry past its TTL is removed and reported absent.
    pub fn get(&self, key: &CacheKey) -> Option<CachedValue> {
        let mut entries = self.lock_entries();

        let expired = match entries.get(key) {
            Some(entry) => entry.stored_at.elapsed() >= entry.ttl,
            None => return None,
        };

        if expired {
            debug!("Result cache: evicting expired entry {:?}", key);
            entries.remove(key);
            return None;
        }

        entries.get(key).map(|entry| entry.value.clone())
    }

    /// Store a value under a key for `ttl`.
    pub fn put(&self, key: CacheKey, value: CachedValue, ttl: Duration) {
        let mut entries = self.lock_entries();
        entries.insert(
            key,
            CacheEntry {
                value,
                stored_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Number of live-or-expired entries currently held.
    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Asset;

    fn sample_assets() -> Vec<Asset> {
        vec![Asset::new("bitcoin", "BTC", "Bitcoin")]
    }

    #[tokio::test(start_paused = true)]
    async fn test_round_trip() {
        let cache = ResultCache::new();
        let key = CacheKey::AssetList { page: 1, limit: 100 };

        cache.put(
            key.clone(),
            CachedValue::Assets(sample_assets()),
            key.ttl(),
        );

        match cache.get(&key) {
            Some(CachedValue::Assets(assets)) => assert_eq!(assets[0].id, "bitcoin"),
            other => panic!("unexpected cache result: {:?}", other.is_some()),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let cache = ResultCache::new();
        let key = CacheKey::AssetList { page: 1, limit: 100 };

        cache.put(
            key.clone(),
            CachedValue::Assets(sample_assets()),
            Duration::from_secs(60),
        );

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(cache.get(&key).is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.get(&key).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_evicted_on_lookup() {
        let cache = ResultCache::new();
        let key = CacheKey::Trending;

        cache.put(
            key.clone(),
            CachedValue::Assets(sample_assets()),
            Duration::from_secs(1),
        );
        assert_eq!(cache.len(), 1);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get(&key).is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_search_key_is_normalized() {
        assert_eq!(CacheKey::search("BitCoin"), CacheKey::search("bitcoin"));
    }

    #[test]
    fn test_ttl_per_kind() {
        assert_eq!(CacheKey::AssetList { page: 1, limit: 10 }.ttl(), LIST_TTL);
        assert_eq!(
            CacheKey::AssetDetail { id: "bitcoin".into() }.ttl(),
            DETAIL_TTL
        );
        assert_eq!(
            CacheKey::History { id: "bitcoin".into(), days: 7 }.ttl(),
            HISTORY_TTL
        );
        assert_eq!(CacheKey::search("btc").ttl(), SEARCH_TTL);
        assert_eq!(CacheKey::Trending.ttl(), LIST_TTL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_replaces_existing_entry() {
        let cache = ResultCache::new();
        let key = CacheKey::search("btc");

        cache.put(key.clone(), CachedValue::Hits(Vec::new()), key.ttl());
        cache.put(
            key.clone(),
            CachedValue::Hits(vec![crate::models::SearchHit::new(
                "bitcoin", "BTC", "Bitcoin",
            )]),
            key.ttl(),
        );

        match cache.get(&key) {
            Some(CachedValue::Hits(hits)) => assert_eq!(hits.len(), 1),
            _ => panic!("expected replaced entry"),
        }
        assert_eq!(cache.len(), 1);
    }
}
