//! Canonical, provider-neutral market data entities.
//!
//! Every provider adapter normalizes its upstream schema into these types.
//! Nullability is deliberate: providers disagree on coverage, and a field one
//! of them does not supply stays `None` rather than being zero-filled.

mod asset;
mod health;
mod history;
mod search;

pub use asset::{Asset, AssetDetail};
pub use health::ProviderHealth;
pub use history::PricePoint;
pub use search::SearchHit;
