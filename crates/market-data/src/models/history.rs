use serde::{Deserialize, Serialize};

/// One sample of an asset's price over time.
///
/// Series are ordered ascending by timestamp; the durable store replaces
/// rather than duplicates a point at an existing `(asset, timestamp)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Sample time as epoch milliseconds
    pub timestamp: i64,

    /// Price in USD
    pub price: f64,

    /// Trading volume at the sample, where the provider reports one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

impl PricePoint {
    pub fn new(timestamp: i64, price: f64) -> Self {
        Self {
            timestamp,
            price,
            volume: None,
        }
    }
}
