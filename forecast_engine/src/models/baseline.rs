//! Exponentially weighted baseline model
//!
//! Projects the last smoothed level flat into the future. The band comes
//! from the in-sample residuals around the smoothed curve and widens with
//! `sqrt(step)`.

use crate::confidence::{check_level, widening_bands};
use crate::data::PriceSeries;
use crate::error::{ForecastError, Result};
use crate::models::{check_periods, ForecastModel, ForecastResult, ModelInfo, TrainedForecastModel};
use crate::utils::{future_timestamps, round_all};
use chrono::{DateTime, Utc};
use trade_math::{ewm, std_dev, Ddof};

pub const DEFAULT_SPAN: usize = 20;
pub const DEFAULT_CONFIDENCE: f64 = 0.95;

/// EWM baseline forecaster
#[derive(Debug, Clone)]
pub struct BaselineModel {
    name: String,
    span: usize,
    confidence_level: f64,
}

/// Trained baseline model
#[derive(Debug, Clone)]
pub struct TrainedBaseline {
    name: String,
    span: usize,
    confidence_level: f64,
    last_ema: f64,
    residual_std: f64,
    step_days: i64,
    last_timestamp: DateTime<Utc>,
}

impl BaselineModel {
    /// Create a new baseline model
    pub fn new(span: usize, confidence_level: f64) -> Result<Self> {
        if span == 0 {
            return Err(ForecastError::ValidationError(
                "Span must be greater than zero".to_string(),
            ));
        }
        check_level(confidence_level)?;

        Ok(Self {
            name: "BaselineModel".to_string(),
            span,
            confidence_level,
        })
    }

    pub fn span(&self) -> usize {
        self.span
    }
}

impl Default for BaselineModel {
    fn default() -> Self {
        Self {
            name: "BaselineModel".to_string(),
            span: DEFAULT_SPAN,
            confidence_level: DEFAULT_CONFIDENCE,
        }
    }
}

impl ForecastModel for BaselineModel {
    type Trained = TrainedBaseline;

    fn train(&self, series: &PriceSeries) -> Result<Self::Trained> {
        series.require_len(self.min_samples())?;

        let prices = series.closes();
        let ema = ewm(prices, self.span)?;
        let residuals: Vec<f64> = prices.iter().zip(&ema).map(|(p, e)| p - e).collect();

        // A single observation has no spread to measure.
        let residual_std = match std_dev(&residuals, Ddof::Sample) {
            Ok(std) => std,
            Err(_) => 0.0,
        };
        let last_ema = ema[ema.len() - 1];

        tracing::debug!(span = self.span, residual_std, last_ema, "baseline fitted");

        Ok(TrainedBaseline {
            name: self.name.clone(),
            span: self.span,
            confidence_level: self.confidence_level,
            last_ema,
            residual_std,
            step_days: series.infer_step_days(),
            last_timestamp: series.last_timestamp(),
        })
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn min_samples(&self) -> usize {
        self.span
    }

    fn info(&self) -> ModelInfo {
        ModelInfo::new(&self.name)
            .with("span", self.span)
            .with("confidence_level", self.confidence_level)
            .with("is_fitted", false)
    }
}

impl TrainedBaseline {
    pub fn residual_std(&self) -> f64 {
        self.residual_std
    }

    pub fn last_ema(&self) -> f64 {
        self.last_ema
    }

    pub fn step_days(&self) -> i64 {
        self.step_days
    }
}

impl TrainedForecastModel for TrainedBaseline {
    fn forecast(&self, periods: usize) -> Result<ForecastResult> {
        check_periods(periods)?;

        // Flat projection
        let point = vec![self.last_ema; periods];
        let (lower, upper) = widening_bands(&point, self.residual_std, self.confidence_level)?;

        ForecastResult::new(
            future_timestamps(self.last_timestamp, periods, self.step_days),
            round_all(&point),
            round_all(&lower),
            round_all(&upper),
            self.confidence_level,
            self.info(),
        )
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn info(&self) -> ModelInfo {
        ModelInfo::new(&self.name)
            .with("span", self.span)
            .with("confidence_level", self.confidence_level)
            .with("is_fitted", true)
            .with("residual_std", self.residual_std)
            .with("step_days", self.step_days)
    }
}
