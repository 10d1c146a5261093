//! Error types for the market data crate.

use thiserror::Error;

/// Errors that can occur during market data operations.
///
/// Adapter failures are deliberately coarse: the aggregator treats a timeout,
/// a non-2xx status, and a malformed payload identically when deciding
/// failover, so the variants exist for logging and health bookkeeping, not
/// for control flow. The exceptions are [`NotSupported`](Self::NotSupported),
/// which is skipped without a health penalty, and
/// [`Store`](Self::Store), the only variant that reaches callers.
#[derive(Error, Debug)]
pub enum MarketDataError {
    /// A provider-specific failure: transport error, non-2xx status, or a
    /// body that failed schema validation.
    #[error("Provider error: {provider} - {message}")]
    Provider {
        /// The provider that returned the error
        provider: String,
        /// What went wrong
        message: String,
    },

    /// The request to the provider timed out.
    #[error("Timeout: {provider}")]
    Timeout {
        /// The provider that timed out
        provider: String,
    },

    /// The provider rate limited the request (HTTP 429).
    #[error("Rate limited: {provider}")]
    RateLimited {
        /// The provider that rate limited the request
        provider: String,
    },

    /// The provider does not implement the requested operation.
    /// Not a failure; the aggregator moves on without a health penalty.
    #[error("Operation not supported by {provider}: {operation}")]
    NotSupported {
        /// The provider lacking the capability
        provider: String,
        /// The operation that was requested
        operation: String,
    },

    /// The durable store failed. This is the one genuinely exceptional
    /// condition that propagates to callers as a hard error.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failure inside the durable store collaborator.
///
/// Cold reads are not errors (they return empty collections); this type is
/// reserved for real faults such as corruption or an unreachable database.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Durable store failure: {0}")]
    Failure(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = MarketDataError::Provider {
            provider: "COINGECKO".to_string(),
            message: "HTTP 500".to_string(),
        };
        assert_eq!(format!("{}", error), "Provider error: COINGECKO - HTTP 500");

        let error = MarketDataError::Timeout {
            provider: "COINCAP".to_string(),
        };
        assert_eq!(format!("{}", error), "Timeout: COINCAP");

        let error = MarketDataError::NotSupported {
            provider: "COINPAPRIKA".to_string(),
            operation: "search".to_string(),
        };
        assert_eq!(
            format!("{}", error),
            "Operation not supported by COINPAPRIKA: search"
        );
    }

    #[test]
    fn test_store_error_converts() {
        let error: MarketDataError = StoreError::Failure("disk gone".to_string()).into();
        assert!(matches!(error, MarketDataError::Store(_)));
    }
}
