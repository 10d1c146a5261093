use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Canonical coin record.
///
/// `id` is stable across providers for the same asset and is the join key
/// for caching and watch-list membership. `symbol` is uppercased at the
/// adapter boundary for display consistency.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    /// Provider-neutral identifier (e.g., "bitcoin")
    pub id: String,

    /// Ticker symbol, uppercased (e.g., "BTC")
    pub symbol: String,

    /// Display name (e.g., "Bitcoin")
    pub name: String,

    /// Logo URL, where the provider has one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Latest price in USD
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_price: Option<f64>,

    /// Market capitalization in USD
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<f64>,

    /// Rank by market capitalization (1 = largest)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap_rank: Option<u32>,

    /// Absolute price change over 24h
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_change_24h: Option<f64>,

    /// Relative price change over 24h, in percent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_change_percentage_24h: Option<f64>,

    /// Trading volume over 24h in USD
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_volume: Option<f64>,

    /// 24h high
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high_24h: Option<f64>,

    /// 24h low
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low_24h: Option<f64>,

    /// All-time-high price
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ath: Option<f64>,

    /// When the all-time high was reached
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ath_date: Option<DateTime<Utc>>,

    /// All-time-low price
    #[serde(skip_serializing_if = "Option::is_none")]
    pub atl: Option<f64>,

    /// When the all-time low was reached
    #[serde(skip_serializing_if = "Option::is_none")]
    pub atl_date: Option<DateTime<Utc>>,

    /// Circulating supply
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circulating_supply: Option<f64>,

    /// Total supply
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_supply: Option<f64>,

    /// Maximum supply, where one exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_supply: Option<f64>,

    /// When the provider last refreshed this record
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl Asset {
    /// Create an asset with only the identity fields set.
    pub fn new(id: impl Into<String>, symbol: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            symbol: symbol.into(),
            name: name.into(),
            image: None,
            current_price: None,
            market_cap: None,
            market_cap_rank: None,
            price_change_24h: None,
            price_change_percentage_24h: None,
            total_volume: None,
            high_24h: None,
            low_24h: None,
            ath: None,
            ath_date: None,
            atl: None,
            atl_date: None,
            circulating_supply: None,
            total_supply: None,
            max_supply: None,
            last_updated: None,
        }
    }
}

/// Asset plus the descriptive fields only the richest provider supplies.
///
/// Adapters without a descriptive schema (and the durable fallback path)
/// produce details with all descriptive fields absent via [`From<Asset>`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssetDetail {
    #[serde(flatten)]
    pub asset: Asset,

    /// Long-form description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Project homepage URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,

    /// Genesis block date
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genesis_date: Option<NaiveDate>,

    /// Share of positive sentiment votes, in percent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentiment_votes_up_percentage: Option<f64>,

    /// Share of negative sentiment votes, in percent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentiment_votes_down_percentage: Option<f64>,
}

impl From<Asset> for AssetDetail {
    fn from(asset: Asset) -> Self {
        Self {
            asset,
            description: None,
            homepage: None,
            genesis_date: None,
            sentiment_votes_up_percentage: None,
            sentiment_votes_down_percentage: None,
        }
    }
}
