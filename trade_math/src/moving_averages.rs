//! Exponentially weighted moving average
//!
//! Recursive form without bias adjustment: the first observation seeds the
//! average and every later value is blended in with `alpha = 2 / (span + 1)`.

use crate::{MathError, Result};

/// Streaming exponential moving average
#[derive(Debug, Clone)]
pub struct ExponentialMovingAverage {
    span: usize,
    alpha: f64,
    current: Option<f64>,
}

impl ExponentialMovingAverage {
    /// Create a new EMA with the given span
    pub fn new(span: usize) -> Result<Self> {
        if span == 0 {
            return Err(MathError::InvalidInput(
                "Span must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            span,
            alpha: 2.0 / (span as f64 + 1.0),
            current: None,
        })
    }

    /// Blend a new value into the average and return the updated level
    pub fn update(&mut self, value: f64) -> f64 {
        let next = match self.current {
            None => value,
            // EMA = alpha * x + (1 - alpha) * EMA(previous)
            Some(prev) => self.alpha * value + (1.0 - self.alpha) * prev,
        };
        self.current = Some(next);
        next
    }

    /// Current smoothed value
    pub fn value(&self) -> Result<f64> {
        self.current.ok_or_else(|| {
            MathError::InsufficientData("EMA has not seen any values".to_string())
        })
    }

    pub fn span(&self) -> usize {
        self.span
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}

/// Smooth a whole series, returning one EMA value per input value
pub fn ewm(values: &[f64], span: usize) -> Result<Vec<f64>> {
    if values.is_empty() {
        return Err(MathError::InsufficientData(
            "Cannot smooth an empty series".to_string(),
        ));
    }

    let mut ema = ExponentialMovingAverage::new(span)?;
    Ok(values.iter().map(|&v| ema.update(v)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_ewm_seeds_with_first_value() {
        let smoothed = ewm(&[10.0, 12.0, 14.0], 3).unwrap();

        // alpha = 0.5
        assert_relative_eq!(smoothed[0], 10.0);
        assert_relative_eq!(smoothed[1], 11.0);
        assert_relative_eq!(smoothed[2], 12.5);
    }

    #[test]
    fn test_constant_series_stays_constant() {
        let smoothed = ewm(&[5.0; 30], 20).unwrap();
        assert!(smoothed.iter().all(|v| (v - 5.0).abs() < 1e-12));
    }

    #[test]
    fn test_invalid_span() {
        assert!(ExponentialMovingAverage::new(0).is_err());
        assert!(ewm(&[], 5).is_err());
    }

    #[test]
    fn test_streaming_matches_batch() {
        let values = [3.0, 4.5, 2.0, 8.0, 7.5];
        let mut ema = ExponentialMovingAverage::new(4).unwrap();
        assert!(ema.value().is_err());
        for v in values {
            ema.update(v);
        }
        let batch = ewm(&values, 4).unwrap();
        assert_relative_eq!(ema.value().unwrap(), batch[4]);
    }
}
