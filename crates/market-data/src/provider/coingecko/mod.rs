//! CoinGecko market data provider implementation.
//!
//! Primary provider with the richest schema:
//! - Market listing via /coins/markets
//! - Asset detail (description, links, sentiment) via /coins/{id}
//! - Price history via /coins/{id}/market_chart
//! - Search via /search
//! - Trending ids via /search/trending
//!
//! The free tier allows roughly 40 requests per minute, hence the wide
//! request spacing. API documentation: https://www.coingecko.com/api/docs/v3

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::errors::MarketDataError;
use crate::models::{Asset, AssetDetail, PricePoint, SearchHit};
use crate::provider::{MarketDataProvider, ProviderCapabilities};

const BASE_URL: &str = "https://api.coingecko.com/api/v3";
const PROVIDER_ID: &str = "COINGECKO";

/// Timeout for metadata and search endpoints.
const METADATA_TIMEOUT: Duration = Duration::from_secs(10);
/// Timeout for the heavier chart endpoint.
const HISTORY_TIMEOUT: Duration = Duration::from_secs(15);

/// Search responses are truncated to this many hits.
const SEARCH_RESULT_CAP: usize = 20;

// ============================================================================
// API Response Structures
// ============================================================================

/// One entry of the /coins/markets response.
#[derive(Debug, Deserialize)]
struct MarketCoin {
    id: String,
    symbol: String,
    name: String,
    image: Option<String>,
    current_price: Option<f64>,
    market_cap: Option<f64>,
    market_cap_rank: Option<u32>,
    price_change_24h: Option<f64>,
    price_change_percentage_24h: Option<f64>,
    total_volume: Option<f64>,
    high_24h: Option<f64>,
    low_24h: Option<f64>,
    ath: Option<f64>,
    ath_date: Option<String>,
    atl: Option<f64>,
    atl_date: Option<String>,
    circulating_supply: Option<f64>,
    total_supply: Option<f64>,
    max_supply: Option<f64>,
    last_updated: Option<String>,
}

/// Response from /coins/{id}.
#[derive(Debug, Deserialize)]
struct DetailResponse {
    id: String,
    symbol: String,
    name: String,
    #[serde(default)]
    description: Localized,
    #[serde(default)]
    links: Links,
    #[serde(default)]
    image: DetailImage,
    genesis_date: Option<NaiveDate>,
    sentiment_votes_up_percentage: Option<f64>,
    sentiment_votes_down_percentage: Option<f64>,
    market_cap_rank: Option<u32>,
    market_data: MarketData,
}

#[derive(Debug, Default, Deserialize)]
struct Localized {
    en: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Links {
    #[serde(default)]
    homepage: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DetailImage {
    large: Option<String>,
}

/// Per-currency maps of the /coins/{id} market_data block. Only the USD
/// entries are consumed.
#[derive(Debug, Deserialize)]
struct MarketData {
    #[serde(default)]
    current_price: HashMap<String, f64>,
    #[serde(default)]
    market_cap: HashMap<String, f64>,
    #[serde(default)]
    total_volume: HashMap<String, f64>,
    #[serde(default)]
    high_24h: HashMap<String, f64>,
    #[serde(default)]
    low_24h: HashMap<String, f64>,
    price_change_24h: Option<f64>,
    price_change_percentage_24h: Option<f64>,
    circulating_supply: Option<f64>,
    total_supply: Option<f64>,
    max_supply: Option<f64>,
    #[serde(default)]
    ath: HashMap<String, f64>,
    #[serde(default)]
    ath_date: HashMap<String, String>,
    #[serde(default)]
    atl: HashMap<String, f64>,
    #[serde(default)]
    atl_date: HashMap<String, String>,
}

/// Response from /coins/{id}/market_chart. Prices come as `[millis, price]`
/// pairs.
#[derive(Debug, Deserialize)]
struct MarketChartResponse {
    #[serde(default)]
    prices: Vec<(f64, f64)>,
}

/// Response from /search.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    coins: Vec<SearchCoin>,
}

#[derive(Debug, Deserialize)]
struct SearchCoin {
    id: String,
    symbol: String,
    name: String,
    market_cap_rank: Option<u32>,
    thumb: Option<String>,
}

/// Response from /search/trending.
#[derive(Debug, Deserialize)]
struct TrendingResponse {
    #[serde(default)]
    coins: Vec<TrendingEntry>,
}

#[derive(Debug, Deserialize)]
struct TrendingEntry {
    item: TrendingItem,
}

#[derive(Debug, Deserialize)]
struct TrendingItem {
    id: String,
}

// ============================================================================
// CoinGeckoProvider
// ============================================================================

/// CoinGecko market data provider.
///
/// The only provider that supplies descriptive detail fields and trending
/// data, which makes it the primary in the failover chain.
pub struct CoinGeckoProvider {
    client: Client,
    base_url: String,
}

impl CoinGeckoProvider {
    /// Create a provider against the public CoinGecko API.
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

    /// Issue one GET request and decode the JSON body.
    ///
    /// Timeouts, non-2xx statuses, and undecodable bodies all surface as a
    /// single error value; the aggregator does not distinguish them.
    async fn fetch<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
        timeout: Duration,
    ) -> Result<T, MarketDataError> {
        let url = format!("{}{}", self.base_url, path);

        debug!("CoinGecko request: {} with {} params", path, params.len());

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

impl Default for CoinGeckoProvider {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// MarketDataProvider Implementation
// ============================================================================

#[async_trait]
impl MarketDataProvider for CoinGeckoProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn priority(&self) -> u8 {
        1
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            supports_detail: true,
            supports_history: true,
            supports_search: true,
            supports_trending: true,
        }
    }

    fn min_interval(&self) -> Duration {
        // ~40 requests/minute on the free tier
        Duration::from_millis(1500)
    }

    async fn list_assets(&self, page: u32, limit: u32) -> Result<Vec<Asset>, MarketDataError> {
        let params = [
            ("vs_currency", "usd".to_string()),
            ("order", "market_cap_desc".to_string()),
            ("per_page", limit.to_string()),
            ("page", page.to_string()),
            ("sparkline", "false".to_string()),
        ];

        let coins: Vec<MarketCoin> = self
            .fetch("/coins/markets", &params, METADATA_TIMEOUT)
            .await?;

        debug!("CoinGecko: fetched {} market entries", coins.len());

        Ok(coins.into_iter().map(normalize_market_coin).collect())
    }

    async fn asset_detail(&self, id: &str) -> Result<AssetDetail, MarketDataError> {
        let params = [
            ("localization", "false".to_string()),
            ("tickers", "false".to_string()),
            ("market_data", "true".to_string()),
            ("community_data", "false".to_string()),
            ("developer_data", "false".to_string()),
        ];

        let detail: DetailResponse = self
            .fetch(&format!("/coins/{}", id), &params, METADATA_TIMEOUT)
            .await?;

        Ok(normalize_detail(detail))
    }

    async fn price_history(&self, id: &str, days: u32) -> Result<Vec<PricePoint>, MarketDataError> {
        let params = [
            ("vs_currency", "usd".to_string()),
            ("days", days.to_string()),
        ];

        let chart: MarketChartResponse = self
            .fetch(
                &format!("/coins/{}/market_chart", id),
                &params,
                HISTORY_TIMEOUT,
            )
            .await?;

        debug!(
            "CoinGecko: fetched {} history points for '{}'",
            chart.prices.len(),
            id
        );

        Ok(chart
            .prices
            .into_iter()
            .map(|(timestamp, price)| PricePoint::new(timestamp as i64, price))
            .collect())
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, MarketDataError> {
        let params = [("query", query.to_string())];

        let response: SearchResponse = self.fetch("/search", &params, METADATA_TIMEOUT).await?;

        Ok(response
            .coins
            .into_iter()
            .take(SEARCH_RESULT_CAP)
            .map(|coin| SearchHit {
                id: coin.id,
                symbol: coin.symbol.to_uppercase(),
                name: coin.name,
                market_cap_rank: coin.market_cap_rank,
                thumb: coin.thumb,
            })
            .collect())
    }

    async fn trending_ids(&self) -> Result<Vec<String>, MarketDataError> {
        let response: TrendingResponse =
            self.fetch("/search/trending", &[], METADATA_TIMEOUT).await?;

        Ok(response.coins.into_iter().map(|entry| entry.item.id).collect())
    }
}

// ============================================================================
// Normalization
// ============================================================================

fn normalize_market_coin(coin: MarketCoin) -> Asset {
    Asset {
        id: coin.id,
        symbol: coin.symbol.to_uppercase(),
        name: coin.name,
        image: coin.image,
        current_price: coin.current_price,
        market_cap: coin.market_cap,
        market_cap_rank: coin.market_cap_rank,
        price_change_24h: coin.price_change_24h,
        price_change_percentage_24h: coin.price_change_percentage_24h,
        total_volume: coin.total_volume,
        high_24h: coin.high_24h,
        low_24h: coin.low_24h,
        ath: coin.ath,
        ath_date: parse_rfc3339(coin.ath_date.as_deref()),
        atl: coin.atl,
        atl_date: parse_rfc3339(coin.atl_date.as_deref()),
        circulating_supply: coin.circulating_supply,
        total_supply: coin.total_supply,
        max_supply: coin.max_supply,
        last_updated: parse_rfc3339(coin.last_updated.as_deref()),
    }
}

fn normalize_detail(detail: DetailResponse) -> AssetDetail {
    let DetailResponse {
        id,
        symbol,
        name,
        description,
        links,
        image,
        genesis_date,
        sentiment_votes_up_percentage,
        sentiment_votes_down_percentage,
        market_cap_rank,
        market_data: md,
    } = detail;

    let asset = Asset {
        id,
        symbol: symbol.to_uppercase(),
        name,
        image: image.large,
        current_price: usd(&md.current_price),
        market_cap: usd(&md.market_cap),
        market_cap_rank,
        price_change_24h: md.price_change_24h,
        price_change_percentage_24h: md.price_change_percentage_24h,
        total_volume: usd(&md.total_volume),
        high_24h: usd(&md.high_24h),
        low_24h: usd(&md.low_24h),
        ath: usd(&md.ath),
        ath_date: parse_rfc3339(md.ath_date.get("usd").map(String::as_str)),
        atl: usd(&md.atl),
        atl_date: parse_rfc3339(md.atl_date.get("usd").map(String::as_str)),
        circulating_supply: md.circulating_supply,
        total_supply: md.total_supply,
        max_supply: md.max_supply,
        last_updated: Some(Utc::now()),
    };

    AssetDetail {
        asset,
        description: description.en.filter(|text| !text.is_empty()),
        homepage: links.homepage.into_iter().find(|url| !url.is_empty()),
        genesis_date,
        sentiment_votes_up_percentage,
        sentiment_votes_down_percentage,
    }
}

fn usd(map: &HashMap<String, f64>) -> Option<f64> {
    map.get("usd").copied()
}

/// Unparseable dates stay absent rather than being fabricated.
fn parse_rfc3339(value: Option<&str>) -> Option<DateTime<Utc>> {
    value.and_then(|raw| {
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    })
}

// ============================================================================
// Tests
// ============================================================================
