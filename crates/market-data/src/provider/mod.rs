//! Provider adapters for the upstream market data sources.

pub mod capabilities;
pub mod coincap;
pub mod coingecko;
pub mod coinpaprika;
pub mod traits;

pub use capabilities::ProviderCapabilities;
pub use traits::MarketDataProvider;
