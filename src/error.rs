//! Outward error taxonomy

use forecast_engine::ForecastError;
use price_cache::{ProviderError, StoreError, SyncError};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Failure categories a caller can act on.
///
/// Each kind has a stable code string and a distinct HTTP-style status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InsufficientData,
    ValidationError,
    StoreUnavailable,
    UpstreamUnavailable,
    UnsupportedCapability,
    NotFitted,
    InternalError,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 8] = [
        ErrorKind::NotFound,
        ErrorKind::InsufficientData,
        ErrorKind::ValidationError,
        ErrorKind::StoreUnavailable,
        ErrorKind::UpstreamUnavailable,
        ErrorKind::UnsupportedCapability,
        ErrorKind::NotFitted,
        ErrorKind::InternalError,
    ];

    pub const fn code(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::InsufficientData => "insufficient_data",
            ErrorKind::ValidationError => "validation_error",
            ErrorKind::StoreUnavailable => "store_unavailable",
            ErrorKind::UpstreamUnavailable => "upstream_unavailable",
            ErrorKind::UnsupportedCapability => "unsupported_capability",
            ErrorKind::NotFitted => "not_fitted",
            ErrorKind::InternalError => "internal_error",
        }
    }

    pub const fn status_code(&self) -> u16 {
        match self {
            ErrorKind::NotFound => 404,
            ErrorKind::InsufficientData => 422,
            ErrorKind::ValidationError => 400,
            ErrorKind::StoreUnavailable => 503,
            ErrorKind::UpstreamUnavailable => 502,
            ErrorKind::UnsupportedCapability => 501,
            ErrorKind::NotFitted => 409,
            ErrorKind::InternalError => 500,
        }
    }

    /// Process exit code used by the CLI
    pub const fn exit_code(&self) -> i32 {
        match self {
            ErrorKind::ValidationError => 2,
            ErrorKind::NotFound => 3,
            ErrorKind::InsufficientData => 4,
            ErrorKind::UnsupportedCapability => 5,
            ErrorKind::NotFitted => 6,
            ErrorKind::StoreUnavailable => 7,
            ErrorKind::UpstreamUnavailable => 8,
            ErrorKind::InternalError => 10,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Errors surfaced by [`crate::ForecastService`] and the CLI
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Forecast(#[from] ForecastError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("internal error: {0}")]
    Internal(String),
}

fn store_kind(err: &StoreError) -> ErrorKind {
    match err {
        StoreError::Unavailable(_) | StoreError::Database(_) => ErrorKind::StoreUnavailable,
        StoreError::Corrupt(_) => ErrorKind::InternalError,
    }
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Forecast(err) => match err {
                ForecastError::DataError(_) | ForecastError::ValidationError(_) => ErrorKind::ValidationError,
                ForecastError::InsufficientData { .. } => ErrorKind::InsufficientData,
                ForecastError::NotFitted(_) => ErrorKind::NotFitted,
                ForecastError::UnsupportedCapability(_) => ErrorKind::UnsupportedCapability,
                ForecastError::TrainingError(_) | ForecastError::MathError(_) => ErrorKind::InternalError,
            },
            ServiceError::Sync(err) => match err {
                SyncError::InvalidSymbol(_) => ErrorKind::ValidationError,
                SyncError::NotFound { .. } => ErrorKind::NotFound,
                SyncError::StoreUnavailable(store) => store_kind(store),
                SyncError::Provider(ProviderError::Network(_)) | SyncError::Provider(ProviderError::Io(_)) => {
                    ErrorKind::UpstreamUnavailable
                }
                SyncError::Provider(ProviderError::Parse(_)) => ErrorKind::InternalError,
            },
            ServiceError::Store(err) => store_kind(err),
            ServiceError::NotFound(_) => ErrorKind::NotFound,
            ServiceError::Validation(_) | ServiceError::Config(_) => ErrorKind::ValidationError,
            ServiceError::Internal(_) => ErrorKind::InternalError,
        }
    }

    /// Whether retrying the same call later may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::StoreUnavailable | ErrorKind::UpstreamUnavailable
        )
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
