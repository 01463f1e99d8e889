//! Error types for the forecast_engine crate

use thiserror::Error;
use trade_math::MathError;

/// Custom error types for the forecast_engine crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Input series is malformed (ordering, missing values, empty)
    #[error("Data error: {0}")]
    DataError(String),

    /// Request or model parameter outside its allowed range
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Fewer samples than a policy or model requires
    #[error("Insufficient data: need at least {minimum} {unit}, got {actual}")]
    InsufficientData {
        minimum: usize,
        actual: usize,
        unit: String,
    },

    /// Lifecycle operation invoked out of order
    #[error("Model not fitted: {0}")]
    NotFitted(String),

    /// Optional backend missing from this build
    #[error("Unsupported capability: {0}")]
    UnsupportedCapability(String),

    /// Model training failed after input validation passed
    #[error("Training error: {0}")]
    TrainingError(String),

    /// Error from numeric primitives
    #[error("Math error: {0}")]
    MathError(#[from] MathError),
}

impl ForecastError {
    pub(crate) fn insufficient(minimum: usize, actual: usize, unit: impl Into<String>) -> Self {
        ForecastError::InsufficientData {
            minimum,
            actual,
            unit: unit.into(),
        }
    }
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;
