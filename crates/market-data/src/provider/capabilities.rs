//! Provider capability declarations.
//!
//! Not every provider implements every operation; the aggregator uses these
//! flags to skip providers that cannot serve the current request instead of
//! sending them a doomed call.

/// Describes which operations a market data provider implements.
///
/// Listing the market is universal and has no flag.
#[derive(Clone, Copy, Debug)]
pub struct ProviderCapabilities {
    /// Whether the provider can fetch a single asset with detail fields.
    pub supports_detail: bool,

    /// Whether the provider can fetch historical price series.
    pub supports_history: bool,

    /// Whether the provider can search by name or symbol.
    pub supports_search: bool,

    /// Whether the provider reports trending assets.
    pub supports_trending: bool,
}

impl ProviderCapabilities {
    /// A provider that only supports the list operation.
    pub fn list_only() -> Self {
        Self {
            supports_detail: false,
            supports_history: false,
            supports_search: false,
            supports_trending: false,
        }
    }
}
