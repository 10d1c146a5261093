//! CoinCap market data provider implementation.
//!
//! First fallback. CoinCap encodes every numeric field as a string; those are
//! parsed to floats at the boundary, and anything it does not cover (images,
//! absolute 24h change, daily high/low, ATH/ATL, total supply) stays absent.
//!
//! - Market listing and per-asset lookup via /assets
//! - Price history via /assets/{id}/history
//! - Search via /assets?search=
//!
//! API documentation: https://docs.coincap.io

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::errors::MarketDataError;
use crate::models::{Asset, AssetDetail, PricePoint, SearchHit};
use crate::provider::{MarketDataProvider, ProviderCapabilities};

const BASE_URL: &str = "https://api.coincap.io/v2";
const PROVIDER_ID: &str = "COINCAP";

const METADATA_TIMEOUT: Duration = Duration::from_secs(10);
const HISTORY_TIMEOUT: Duration = Duration::from_secs(15);

const SEARCH_RESULT_CAP: u32 = 20;

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

// ============================================================================
// API Response Structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct AssetsEnvelope {
    data: Vec<CoinCapAsset>,
}

#[derive(Debug, Deserialize)]
struct AssetEnvelope {
    data: CoinCapAsset,
}

/// One asset record. Every numeric comes string-encoded.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CoinCapAsset {
    id: String,
    rank: Option<String>,
    symbol: String,
    name: String,
    supply: Option<String>,
    max_supply: Option<String>,
    market_cap_usd: Option<String>,
    volume_usd_24_hr: Option<String>,
    price_usd: Option<String>,
    change_percent_24_hr: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HistoryEnvelope {
    data: Vec<HistoryPoint>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryPoint {
    price_usd: String,
    time: i64,
}

// ============================================================================
// CoinCapProvider
// ============================================================================

/// CoinCap market data provider.
///
/// No descriptive detail schema: a detail request resolves to the plain
/// asset record with descriptive fields absent.
pub struct CoinCapProvider {
    client: Client,
    base_url: String,
}

impl CoinCapProvider {
    /// Create a provider against the public CoinCap API.
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL)
    }

    /// Create a provider against a custom base URL (proxies, tests).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
        timeout: Duration,
    ) -> Result<T, MarketDataError> {
        let url = format!("{}{}", self.base_url, path);

        debug!("CoinCap request: {} with {} params", path, params.len());

        let response = self
            .client
            .get(&url)
            .query(params)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    MarketDataError::Timeout {
                        provider: PROVIDER_ID.to_string(),
                    }
                } else {
                    MarketDataError::Provider {
                        provider: PROVIDER_ID.to_string(),
                        message: format!("Request failed: {}", e),
                    }
                }
            })?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(MarketDataError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }

        if !status.is_success() {
            return Err(MarketDataError::Provider {
                provider: PROVIDER_ID.to_string(),
                message: format!("HTTP {}", status),
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| MarketDataError::Provider {
                provider: PROVIDER_ID.to_string(),
                message: format!("Failed to read response: {}", e),
            })?;

        serde_json::from_str(&text).map_err(|e| MarketDataError::Provider {
            provider: PROVIDER_ID.to_string(),
            message: format!("Failed to parse response: {}", e),
        })
    }
}

impl Default for CoinCapProvider {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// MarketDataProvider Implementation
// ============================================================================

#[async_trait]
impl MarketDataProvider for CoinCapProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn priority(&self) -> u8 {
        2
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            supports_detail: true,
            supports_history: true,
            supports_search: true,
            supports_trending: false,
        }
    }

    fn min_interval(&self) -> Duration {
        // 200 requests/minute allowed; stay well under it
        Duration::from_millis(500)
    }

    async fn list_assets(&self, _page: u32, limit: u32) -> Result<Vec<Asset>, MarketDataError> {
        let params = [("limit", limit.to_string())];

        let envelope: AssetsEnvelope = self.fetch("/assets", &params, METADATA_TIMEOUT).await?;

        debug!("CoinCap: fetched {} assets", envelope.data.len());

        Ok(envelope.data.into_iter().map(normalize_asset).collect())
    }

    async fn asset_detail(&self, id: &str) -> Result<AssetDetail, MarketDataError> {
        let envelope: AssetEnvelope = self
            .fetch(&format!("/assets/{}", id), &[], METADATA_TIMEOUT)
            .await?;

        Ok(AssetDetail::from(normalize_asset(envelope.data)))
    }

    async fn price_history(&self, id: &str, days: u32) -> Result<Vec<PricePoint>, MarketDataError> {
        let end = Utc::now().timestamp_millis();
        let start = end - i64::from(days) * MILLIS_PER_DAY;

        let params = [
            ("interval", history_interval(days).to_string()),
            ("start", start.to_string()),
            ("end", end.to_string()),
        ];

        let envelope: HistoryEnvelope = self
            .fetch(&format!("/assets/{}/history", id), &params, HISTORY_TIMEOUT)
            .await?;

        debug!(
            "CoinCap: fetched {} history points for '{}'",
            envelope.data.len(),
            id
        );

        Ok(envelope
            .data
            .into_iter()
            .filter_map(|point| {
                parse_numeric(Some(&point.price_usd))
                    .map(|price| PricePoint::new(point.time, price))
            })
            .collect())
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, MarketDataError> {
        let params = [
            ("search", query.to_string()),
            ("limit", SEARCH_RESULT_CAP.to_string()),
        ];

        let envelope: AssetsEnvelope = self.fetch("/assets", &params, METADATA_TIMEOUT).await?;

        Ok(envelope
            .data
            .into_iter()
            .map(|asset| SearchHit {
                id: asset.id,
                symbol: asset.symbol.to_uppercase(),
                name: asset.name,
                market_cap_rank: asset.rank.as_deref().and_then(|r| r.parse().ok()),
                thumb: None,
            })
            .collect())
    }
}

// ============================================================================
// Normalization
// ============================================================================

fn normalize_asset(asset: CoinCapAsset) -> Asset {
    Asset {
        id: asset.id,
        symbol: asset.symbol.to_uppercase(),
        name: asset.name,
        image: None,
        current_price: parse_numeric(asset.price_usd.as_deref()),
        market_cap: parse_numeric(asset.market_cap_usd.as_deref()),
        market_cap_rank: asset.rank.as_deref().and_then(|r| r.parse().ok()),
        price_change_24h: None,
        price_change_percentage_24h: parse_numeric(asset.change_percent_24_hr.as_deref()),
        total_volume: parse_numeric(asset.volume_usd_24_hr.as_deref()),
        high_24h: None,
        low_24h: None,
        ath: None,
        ath_date: None,
        atl: None,
        atl_date: None,
        circulating_supply: parse_numeric(asset.supply.as_deref()),
        total_supply: None,
        max_supply: parse_numeric(asset.max_supply.as_deref()),
        last_updated: Some(Utc::now()),
    }
}

/// String-encoded numerics; anything unparseable stays absent, never zero.
fn parse_numeric(value: Option<&str>) -> Option<f64> {
    value.and_then(|raw| raw.parse().ok())
}

/// Sample resolution by requested span, matching the chart granularity the
/// dashboard expects.
fn history_interval(days: u32) -> &'static str {
    if days <= 1 {
        "m5"
    } else if days <= 7 {
        "h1"
    } else {
        "d1"
    }
}

// ============================================================================
// Tests
// ============================================================================
