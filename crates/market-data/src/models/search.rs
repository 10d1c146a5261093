//! Search result models for asset lookup.

use serde::{Deserialize, Serialize};

/// A provider-returned match for a name or symbol query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Provider-neutral asset identifier
    pub id: String,

    /// Ticker symbol, uppercased
    pub symbol: String,

    /// Display name
    pub name: String,

    /// Rank by market capitalization, where known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap_rank: Option<u32>,

    /// Thumbnail URL, where the provider has one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumb: Option<String>,
}

impl SearchHit {
    /// Create a search hit with required fields.
    pub fn new(
        id: impl Into<String>,
        symbol: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            symbol: symbol.into(),
            name: name.into(),
            market_cap_rank: None,
            thumb: None,
        }
    }

    /// Set the market cap rank.
    pub fn with_rank(mut self, rank: u32) -> Self {
        self.market_cap_rank = Some(rank);
        self
    }

    /// Set the thumbnail URL.
    pub fn with_thumb(mut self, thumb: impl Into<String>) -> Self {
        self.thumb = Some(thumb.into());
        self
    }
}
