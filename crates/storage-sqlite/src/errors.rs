//! Storage-specific error types for SQLite operations.
//!
//! These wrap rusqlite failures and convert into the database-agnostic
//! `StoreError` defined in `coinwatch-market-data` before crossing the
//! crate boundary on the `DurableStore` trait.

use coinwatch_market_data::StoreError;
use thiserror::Error;

/// Storage-specific errors that wrap rusqlite types.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Query execution failed: {0}")]
    QueryFailed(#[from] rusqlite::Error),
}

impl From<StorageError> for StoreError {
    fn from(err: StorageError) -> Self {
        StoreError::Failure(err.to_string())
    }
}
