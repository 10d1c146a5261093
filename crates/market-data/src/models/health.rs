use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Availability snapshot for one provider.
///
/// Produced by the health tracker for operational visibility; consumers must
/// not drive control decisions from it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderHealth {
    /// Provider identifier (e.g., "COINGECKO")
    pub name: String,

    /// Whether the provider is currently in rotation
    pub available: bool,

    /// When the provider last returned a successful response
    pub last_success_at: Option<DateTime<Utc>>,

    /// Errors since the last success; frozen while unavailable
    pub consecutive_errors: u32,
}

impl ProviderHealth {
    /// The state of a provider that has seen no traffic yet.
    pub fn untouched(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            available: true,
            last_success_at: None,
            consecutive_errors: 0,
        }
    }
}
