//! Error types for the price_cache crate

use thiserror::Error;

/// Failures talking to the persistent store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// Failures fetching history from a market-data provider
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Transient connectivity or upstream service failure
    #[error("network error: {0}")]
    Network(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<csv::Error> for ProviderError {
    fn from(err: csv::Error) -> Self {
        ProviderError::Parse(err.to_string())
    }
}

/// Failures of a sync run
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("invalid symbol: {0}")]
    InvalidSymbol(String),

    /// Provider returned no usable history
    #[error("no market data found for '{symbol}'; check the symbol spelling and try again")]
    NotFound { symbol: String },

    #[error("price store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    #[error("market data provider failed: {0}")]
    Provider(#[from] ProviderError),
}
