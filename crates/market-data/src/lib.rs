//! Coinwatch Market Data Crate
//!
//! This crate provides provider-agnostic cryptocurrency market data fetching
//! for the Coinwatch dashboard.
//!
//! # Overview
//!
//! The market data crate supports:
//! - Multiple providers: CoinGecko, CoinCap, CoinPaprika
//! - Normalization of disparate upstream schemas into canonical entities
//! - In-memory result caching and a durable last-known-good store
//! - Failover with per-provider health tracking and request spacing
//!
//! # Architecture
//!
//! ```text
//! +------------------+
//! |      Caller      |  (route handlers, streaming broadcaster)
//! +------------------+
//!          |
//!          v
//! +------------------+     +------------------+
//! |    Aggregator    | --> |   Result Cache   |  (per-kind TTL)
//! +------------------+     +------------------+
//!          |
//!          |  per provider: health check -> rate throttle -> fetch
//!          v
//! +------------------+     +------------------+
//! | Provider Adapter | --> |      Asset       |  (canonical entities)
//! +------------------+     +------------------+
//!          |
//!          v
//! +------------------+
//! |  Durable Store   |  (write-through, outage fallback)
//! +------------------+
//! ```
//!
//! # Core Types
//!
//! - [`Aggregator`] - Orchestrates caches, providers, and the durable store
//! - [`MarketDataProvider`] - Trait implemented by each upstream adapter
//! - [`Asset`] / [`AssetDetail`] - Canonical coin records
//! - [`PricePoint`] - One sample of a price series
//! - [`SearchHit`] - A provider-returned search match
//! - [`ProviderHealth`] - Per-provider availability snapshot
//! - [`DurableStore`] - Contract for the persistent fallback store

pub mod aggregator;
pub mod errors;
pub mod models;
pub mod provider;
pub mod store;

// Re-export all public types from models
pub use models::{Asset, AssetDetail, PricePoint, ProviderHealth, SearchHit};

// Re-export errors
pub use errors::{MarketDataError, StoreError};

// Re-export provider types
pub use provider::coincap::CoinCapProvider;
pub use provider::coingecko::CoinGeckoProvider;
pub use provider::coinpaprika::CoinPaprikaProvider;
pub use provider::{MarketDataProvider, ProviderCapabilities};

// Re-export aggregator types
pub use aggregator::{Aggregator, CacheKey, CachedValue, HealthTracker, RateThrottle, ResultCache};

// Re-export the durable store contract
pub use store::DurableStore;
