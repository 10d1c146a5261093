//! Market data provider trait definition.
//!
//! Implement [`MarketDataProvider`] to add a new upstream source. The
//! aggregator uses the provider's capabilities and priority to decide when
//! to call it, and its declared minimum interval to space requests out.

use std::time::Duration;

use async_trait::async_trait;

use crate::errors::MarketDataError;
use crate::models::{Asset, AssetDetail, PricePoint, SearchHit};

use super::capabilities::ProviderCapabilities;

/// Trait for market data providers.
///
/// An adapter owns its HTTP client configuration and nothing else: it issues
/// one upstream request per call, normalizes the response into canonical
/// entities, and reports any failure as a single error value. Retry and
/// failover policy live in the aggregator, never inside an adapter.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Unique identifier for this provider.
    ///
    /// A constant string like "COINGECKO", used for logging, health
    /// tracking, and throttle bookkeeping.
    fn id(&self) -> &'static str;

    /// Provider priority for ordering. Lower values are tried first.
    fn priority(&self) -> u8 {
        10
    }

    /// Describes what this provider can do.
    fn capabilities(&self) -> ProviderCapabilities;

    /// Minimum spacing between consecutive requests to this provider.
    ///
    /// The aggregator feeds this into the rate throttle at construction.
    fn min_interval(&self) -> Duration;

    /// Fetch one page of the market listing, most valuable assets first.
    async fn list_assets(&self, page: u32, limit: u32) -> Result<Vec<Asset>, MarketDataError>;

    /// Fetch a single asset with descriptive detail fields.
    ///
    /// Default implementation reports the capability as missing.
    async fn asset_detail(&self, id: &str) -> Result<AssetDetail, MarketDataError> {
        let _ = id;
        Err(MarketDataError::NotSupported {
            provider: self.id().to_string(),
            operation: "detail".to_string(),
        })
    }

    /// Fetch the price series for an asset over the last `days` days,
    /// ordered ascending by timestamp.
    ///
    /// Default implementation reports the capability as missing.
    async fn price_history(&self, id: &str, days: u32) -> Result<Vec<PricePoint>, MarketDataError> {
        let _ = (id, days);
        Err(MarketDataError::NotSupported {
            provider: self.id().to_string(),
            operation: "history".to_string(),
        })
    }

    /// Search assets by name or symbol, capped to 20 hits.
    ///
    /// Default implementation reports the capability as missing.
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, MarketDataError> {
        let _ = query;
        Err(MarketDataError::NotSupported {
            provider: self.id().to_string(),
            operation: "search".to_string(),
        })
    }

    /// Fetch the identifiers of currently trending assets.
    ///
    /// Default implementation reports the capability as missing.
    async fn trending_ids(&self) -> Result<Vec<String>, MarketDataError> {
        Err(MarketDataError::NotSupported {
            provider: self.id().to_string(),
            operation: "trending".to_string(),
        })
    }
}
