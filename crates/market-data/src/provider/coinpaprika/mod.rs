//! CoinPaprika market data provider implementation.
//!
//! Last-resort fallback, list-only: /tickers returns the whole market in one
//! response, which is truncated client-side to the requested limit. Market
//! numbers sit in a nested per-currency quote block; only USD is consumed.
//!
//! API documentation: https://api.coinpaprika.com

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::errors::MarketDataError;
use crate::models::Asset;
use crate::provider::{MarketDataProvider, ProviderCapabilities};

const BASE_URL: &str = "https://api.coinpaprika.com/v1";
const PROVIDER_ID: &str = "COINPAPRIKA";

const METADATA_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// API Response Structures
// ============================================================================

/// One entry of the /tickers response.
#[derive(Debug, Deserialize)]
struct Ticker {
    id: String,
    name: String,
    symbol: String,
    rank: Option<u32>,
    circulating_supply: Option<f64>,
    total_supply: Option<f64>,
    max_supply: Option<f64>,
    last_updated: Option<String>,
    #[serde(default)]
    quotes: Quotes,
}

#[derive(Debug, Default, Deserialize)]
struct Quotes {
    #[serde(rename = "USD")]
    usd: Option<UsdQuote>,
}

#[derive(Debug, Deserialize)]
struct UsdQuote {
    price: Option<f64>,
    volume_24h: Option<f64>,
    market_cap: Option<f64>,
    percent_change_24h: Option<f64>,
    ath_price: Option<f64>,
    ath_date: Option<String>,
}

// ============================================================================
// CoinPaprikaProvider
// ============================================================================

/// CoinPaprika market data provider.
pub struct CoinPaprikaProvider {
    client: Client,
    base_url: String,
}

impl CoinPaprikaProvider {
    /// Create a provider against the public CoinPaprika API.
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
        timeout: Duration,
    ) -> Result<T, MarketDataError> {
        let url = format!("{}{}", self.base_url, path);

        debug!("CoinPaprika request: {}", path);

        let response = self
            .client
            .get(&url)
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

impl Default for CoinPaprikaProvider {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// MarketDataProvider Implementation
// ============================================================================

#[async_trait]
impl MarketDataProvider for CoinPaprikaProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn priority(&self) -> u8 {
        3
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::list_only()
    }

    fn min_interval(&self) -> Duration {
        // Generous limits
        Duration::from_millis(100)
    }

    async fn list_assets(&self, _page: u32, limit: u32) -> Result<Vec<Asset>, MarketDataError> {
        let tickers: Vec<Ticker> = self.fetch("/tickers", METADATA_TIMEOUT).await?;

        debug!(
            "CoinPaprika: fetched {} tickers, keeping {}",
            tickers.len(),
            limit
        );

        Ok(tickers
            .into_iter()
            .take(limit as usize)
            .map(normalize_ticker)
            .collect())
    }
}

// ============================================================================
// Normalization
// ============================================================================

fn normalize_ticker(ticker: Ticker) -> Asset {
    let usd = ticker.quotes.usd;

    Asset {
        id: ticker.id,
        symbol: ticker.symbol.to_uppercase(),
        name: ticker.name,
        image: None,
        current_price: usd.as_ref().and_then(|q| q.price),
        market_cap: usd.as_ref().and_then(|q| q.market_cap),
        market_cap_rank: ticker.rank,
        price_change_24h: None,
        price_change_percentage_24h: usd.as_ref().and_then(|q| q.percent_change_24h),
        total_volume: usd.as_ref().and_then(|q| q.volume_24h),
        high_24h: None,
        low_24h: None,
        ath: usd.as_ref().and_then(|q| q.ath_price),
        ath_date: usd
            .as_ref()
            .and_then(|q| parse_rfc3339(q.ath_date.as_deref())),
        atl: None,
        atl_date: None,
        circulating_supply: ticker.circulating_supply,
        total_supply: ticker.total_supply,
        max_supply: ticker.max_supply,
        last_updated: parse_rfc3339(ticker.last_updated.as_deref()),
    }
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

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TICKER_JSON: &str = r#"{
        "id": "btc-bitcoin",
        "name": "Bitcoin",
        "symbol": "BTC",
        "rank": 1,
        "circulating_supply": 19600000,
        "total_supply": 19600000,
        "max_supply": 21000000,
        "beta_value": 0.95,
        "first_data_at": "2010-07-17T00:00:00Z",
        "last_updated": "2024-01-15T10:30:00Z",
        "quotes": {
            "USD": {
                "price": 43250.50,
                "volume_24h": 18212345678.9,
                "volume_24h_change_24h": 2.1,
                "market_cap": 847213456789.1,
                "market_cap_change_24h": -0.3,
                "percent_change_15m": 0.01,
                "percent_change_30m": 0.02,
                "percent_change_1h": 0.05,
                "percent_change_6h": -0.1,
                "percent_change_12h": -0.2,
                "percent_change_24h": -0.28,
                "percent_change_7d": 3.4,
                "percent_change_30d": 12.1,
                "percent_change_1y": 150.2,
                "ath_price": 69045.0,
                "ath_date": "2021-11-10T14:24:11Z",
                "percent_from_price_ath": -37.4
            }
        }
    }"#;

    #[test]
    fn test_provider_is_list_only() {
        let provider = CoinPaprikaProvider::new();
        assert_eq!(provider.id(), "COINPAPRIKA");
        assert_eq!(provider.priority(), 3);

        let caps = provider.capabilities();
        assert!(!caps.supports_detail);
        assert!(!caps.supports_history);
        assert!(!caps.supports_search);
        assert!(!caps.supports_trending);
    }

    #[test]
    fn test_ticker_normalization() {
        let ticker: Ticker = serde_json::from_str(TICKER_JSON).unwrap();
        let asset = normalize_ticker(ticker);

        assert_eq!(asset.id, "btc-bitcoin");
        assert_eq!(asset.symbol, "BTC");
        assert_eq!(asset.market_cap_rank, Some(1));
        assert_eq!(asset.current_price, Some(43250.50));
        assert_eq!(asset.ath, Some(69045.0));
        assert!(asset.ath_date.is_some());
        // CoinPaprika has no ATL or high/low data
        assert!(asset.atl.is_none());
        assert!(asset.high_24h.is_none());
        assert!(asset.image.is_none());
    }

    #[test]
    fn test_missing_usd_quote_leaves_market_fields_absent() {
        let json = r#"{
            "id": "odd-coin",
            "name": "Odd Coin",
            "symbol": "odd",
            "rank": null,
            "circulating_supply": null,
            "total_supply": null,
            "max_supply": null,
            "last_updated": null,
            "quotes": {}
        }"#;

        let asset = normalize_ticker(serde_json::from_str(json).unwrap());

        assert_eq!(asset.symbol, "ODD");
        assert!(asset.current_price.is_none());
        assert!(asset.market_cap.is_none());
        assert!(asset.total_volume.is_none());
    }

    #[tokio::test]
    async fn test_list_truncates_to_limit() {
        let body = format!("[{}, {}, {}]", TICKER_JSON, TICKER_JSON, TICKER_JSON);

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tickers"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/json"))
            .mount(&server)
            .await;

        let provider = CoinPaprikaProvider::with_base_url(server.uri());
        let assets = provider.list_assets(1, 2).await.unwrap();

        assert_eq!(assets.len(), 2);
    }

    #[tokio::test]
    async fn test_detail_is_not_supported() {
        let provider = CoinPaprikaProvider::new();
        let error = provider.asset_detail("btc-bitcoin").await.unwrap_err();
        assert!(matches!(error, MarketDataError::NotSupported { .. }));
    }
}
