//! Price series handling for forecasting
//!
//! A [`PriceSeries`] is the only input the models accept: closing prices
//! indexed by strictly increasing UTC timestamps with no missing values.

use crate::error::{ForecastError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One (timestamp, close) observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
}

impl PricePoint {
    pub fn new(timestamp: DateTime<Utc>, close: f64) -> Self {
        Self { timestamp, close }
    }
}

/// Ordered closing-price series fed to a forecast model
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    timestamps: Vec<DateTime<Utc>>,
    closes: Vec<f64>,
}

impl PriceSeries {
    /// Build a series from points already in chronological order
    pub fn new(points: Vec<PricePoint>) -> Result<Self> {
        let (timestamps, closes) = points.into_iter().map(|p| (p.timestamp, p.close)).unzip();
        Self::from_parts(timestamps, closes)
    }

    /// Build a series from points in any order
    pub fn from_unsorted(mut points: Vec<PricePoint>) -> Result<Self> {
        points.sort_by_key(|p| p.timestamp);
        Self::new(points)
    }

    /// Build a series from parallel timestamp and close vectors
    pub fn from_parts(timestamps: Vec<DateTime<Utc>>, closes: Vec<f64>) -> Result<Self> {
        if timestamps.len() != closes.len() {
            return Err(ForecastError::DataError(format!(
                "Timestamps length ({}) doesn't match closes length ({})",
                timestamps.len(),
                closes.len()
            )));
        }
        if closes.is_empty() {
            return Err(ForecastError::DataError(
                "Empty time series data".to_string(),
            ));
        }
        if let Some(pos) = closes.iter().position(|c| !c.is_finite()) {
            return Err(ForecastError::DataError(format!(
                "Series contains a missing value at {}",
                timestamps[pos]
            )));
        }
        if let Some(pair) = timestamps.windows(2).find(|w| w[1] <= w[0]) {
            return Err(ForecastError::DataError(format!(
                "Timestamps must be strictly increasing: {} is followed by {}",
                pair[0], pair[1]
            )));
        }

        Ok(Self { timestamps, closes })
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    pub fn closes(&self) -> &[f64] {
        &self.closes
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    /// Timestamp of the newest observation
    pub fn last_timestamp(&self) -> DateTime<Utc> {
        // Construction guarantees at least one point.
        self.timestamps[self.timestamps.len() - 1]
    }

    pub fn first_timestamp(&self) -> DateTime<Utc> {
        self.timestamps[0]
    }

    pub fn min_close(&self) -> f64 {
        self.closes.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn max_close(&self) -> f64 {
        self.closes.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Fail with `InsufficientData` unless the series has `minimum` points
    pub fn require_len(&self, minimum: usize) -> Result<()> {
        if self.len() < minimum {
            return Err(ForecastError::insufficient(minimum, self.len(), "data points"));
        }
        Ok(())
    }

    /// Median sampling step in whole days, never below one
    pub fn infer_step_days(&self) -> i64 {
        let diffs: Vec<i64> = self
            .timestamps
            .windows(2)
            .map(|w| (w[1] - w[0]).num_days())
            .collect();

        if diffs.is_empty() {
            return 1;
        }

        let mut sorted = diffs;
        sorted.sort_unstable();
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) as f64 / 2.0
        } else {
            sorted[mid] as f64
        };

        (median.trunc() as i64).max(1)
    }
}
