//! # Trade Math
//!
//! Numeric building blocks used by the forecasting models: exponential
//! smoothing, descriptive statistics, min-max scaling and penalised
//! least squares.

use thiserror::Error;

pub mod moving_averages;
pub mod regression;
pub mod scaling;
pub mod statistics;

pub use moving_averages::{ewm, ExponentialMovingAverage};
pub use regression::ridge_solve;
pub use scaling::MinMaxScaler;
pub use statistics::{mean, median, quantile, std_dev, Ddof};

/// Errors that can occur in numeric calculations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

/// Result type for numeric operations
pub type Result<T> = std::result::Result<T, MathError>;

/// Round to a fixed number of decimal places
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(1.234_56, 4), 1.2346);
        assert_eq!(round_to(-2.000_04, 4), -2.0);
    }
}
