//! Recurrent sequence model
//!
//! Prices are min-max scaled, cut into overlapping `lookback_window`
//! windows and fed to a regressor that predicts the next scaled value.
//! Forecasting is iterative: each prediction is appended to the window
//! before the next step. The band is driven by residuals on a
//! chronologically held-out validation tail.
//!
//! The network itself sits behind [`SequenceBackend`] so the model can be
//! built without the numeric backend compiled in; construction then fails
//! with `UnsupportedCapability`.

use crate::capability::Capabilities;
use crate::confidence::{check_level, widening_bands};
use crate::data::PriceSeries;
use crate::error::{ForecastError, Result};
use crate::models::{check_periods, ForecastModel, ForecastResult, ModelInfo, TrainedForecastModel};
use crate::utils::{future_timestamps, round_all};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;
use trade_math::{std_dev, Ddof, MinMaxScaler};

#[cfg(feature = "sequence")]
pub mod lstm;

/// Share of the observed price range used as the band scale when no
/// validation windows exist
pub const FALLBACK_RANGE_FRACTION: f64 = 0.05;

/// Tuning knobs for the sequence model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceParams {
    pub lookback_window: usize,
    pub epochs: usize,
    pub batch_size: usize,
    pub validation_fraction: f64,
    pub confidence_level: f64,
    pub seed: u64,
    pub recurrent_units: (usize, usize),
    pub dense_units: usize,
    pub dropout: f64,
    pub learning_rate: f64,
}

impl Default for SequenceParams {
    fn default() -> Self {
        Self {
            lookback_window: 20,
            epochs: 50,
            batch_size: 16,
            validation_fraction: 0.2,
            confidence_level: 0.95,
            seed: 42,
            recurrent_units: (64, 32),
            dense_units: 16,
            dropout: 0.2,
            learning_rate: 0.001,
        }
    }
}

impl SequenceParams {
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(ForecastError::ValidationError(msg.to_string()));

        if self.lookback_window == 0 {
            return invalid("lookback_window must be at least 1");
        }
        if self.epochs == 0 {
            return invalid("epochs must be at least 1");
        }
        if self.batch_size == 0 {
            return invalid("batch_size must be at least 1");
        }
        if self.recurrent_units.0 == 0 || self.recurrent_units.1 == 0 || self.dense_units == 0 {
            return invalid("layer sizes must be positive");
        }
        if !(0.0..1.0).contains(&self.validation_fraction) {
            return invalid("validation_fraction must lie in [0, 1)");
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return invalid("dropout must lie in [0, 1)");
        }
        if !(self.learning_rate > 0.0) {
            return invalid("learning_rate must be positive");
        }
        check_level(self.confidence_level)
    }

    fn network(&self) -> NetworkConfig {
        NetworkConfig {
            lookback: self.lookback_window,
            recurrent_units: self.recurrent_units,
            dense_units: self.dense_units,
            dropout: self.dropout,
            epochs: self.epochs,
            batch_size: self.batch_size,
            learning_rate: self.learning_rate,
            seed: self.seed,
        }
    }
}

/// Architecture and optimiser settings handed to a backend
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkConfig {
    pub lookback: usize,
    pub recurrent_units: (usize, usize),
    pub dense_units: usize,
    pub dropout: f64,
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub seed: u64,
}

/// Factory for next-value regressors
pub trait SequenceBackend: Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Build an untrained regressor for the given architecture
    fn build(&self, config: &NetworkConfig) -> Result<Box<dyn SequenceRegressor>>;
}

/// Regressor mapping a window of scaled values to the next scaled value
pub trait SequenceRegressor: Debug + Send {
    /// Train on `windows[i] -> targets[i]`, returning the final epoch loss
    fn fit(&mut self, windows: &[Vec<f64>], targets: &[f64]) -> Result<f64>;

    fn predict(&self, window: &[f64]) -> Result<f64>;

    fn predict_batch(&self, windows: &[Vec<f64>]) -> Result<Vec<f64>> {
        windows.iter().map(|w| self.predict(w)).collect()
    }
}

/// Recurrent next-value forecaster
#[derive(Debug, Clone)]
pub struct SequenceModel {
    name: String,
    params: SequenceParams,
    backend: Arc<dyn SequenceBackend>,
}

/// Trained sequence model
#[derive(Debug)]
pub struct TrainedSequence {
    name: String,
    params: SequenceParams,
    regressor: Box<dyn SequenceRegressor>,
    scaler: MinMaxScaler,
    seed_window: Vec<f64>,
    val_residual_std: f64,
    training_loss: f64,
    step_days: i64,
    last_timestamp: DateTime<Utc>,
}

impl SequenceModel {
    /// Create a sequence model using the backend reported by `capabilities`
    pub fn new(params: SequenceParams, capabilities: &Capabilities) -> Result<Self> {
        let backend = capabilities.sequence_backend().ok_or_else(|| {
            ForecastError::UnsupportedCapability(
                "sequence model needs a neural backend; rebuild with the `sequence` feature".to_string(),
            )
        })?;
        Self::with_backend(params, backend)
    }

    /// Create a sequence model on an explicit backend
    pub fn with_backend(params: SequenceParams, backend: Arc<dyn SequenceBackend>) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            name: "SequenceModel".to_string(),
            params,
            backend,
        })
    }

    pub fn params(&self) -> &SequenceParams {
        &self.params
    }
}

/// Overlapping `lookback` windows with the following value as label
fn build_windows(scaled: &[f64], lookback: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
    (lookback..scaled.len())
        .map(|i| (scaled[i - lookback..i].to_vec(), scaled[i]))
        .unzip()
}

impl ForecastModel for SequenceModel {
    type Trained = TrainedSequence;

    fn train(&self, series: &PriceSeries) -> Result<Self::Trained> {
        let lookback = self.params.lookback_window;
        series.require_len(self.min_samples())?;

        tracing::info!(samples = series.len(), lookback, backend = self.backend.name(), "fitting sequence model");

        let prices = series.closes();
        let scaler = MinMaxScaler::fit(prices)?;
        let scaled = scaler.transform_all(prices);

        let (windows, targets) = build_windows(&scaled, lookback);
        let split = (windows.len() as f64 * (1.0 - self.params.validation_fraction)) as usize;
        if split == 0 {
            return Err(ForecastError::insufficient(1, 0, "training windows"));
        }

        let mut regressor = self.backend.build(&self.params.network())?;
        let training_loss = regressor.fit(&windows[..split], &targets[..split])?;

        let val_windows = &windows[split..];
        let val_residual_std = if val_windows.is_empty() {
            (series.max_close() - series.min_close()) * FALLBACK_RANGE_FRACTION
        } else {
            let preds = scaler.inverse_transform_all(&regressor.predict_batch(val_windows)?);
            let actuals = scaler.inverse_transform_all(&targets[split..]);
            let residuals: Vec<f64> = actuals.iter().zip(&preds).map(|(a, p)| a - p).collect();
            std_dev(&residuals, Ddof::Population)?
        };

        tracing::info!(val_residual_std, training_loss, "sequence model fitted");

        Ok(TrainedSequence {
            name: self.name.clone(),
            params: self.params.clone(),
            regressor,
            scaler,
            seed_window: scaled[scaled.len() - lookback..].to_vec(),
            val_residual_std,
            training_loss,
            step_days: series.infer_step_days(),
            last_timestamp: series.last_timestamp(),
        })
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn min_samples(&self) -> usize {
        self.params.lookback_window + 1
    }

    fn info(&self) -> ModelInfo {
        ModelInfo::new(&self.name)
            .with("lookback_window", self.params.lookback_window)
            .with("epochs", self.params.epochs)
            .with("batch_size", self.params.batch_size)
            .with("confidence_level", self.params.confidence_level)
            .with("backend", self.backend.name())
            .with("is_fitted", false)
    }
}

impl TrainedSequence {
    pub fn val_residual_std(&self) -> f64 {
        self.val_residual_std
    }

    pub fn training_loss(&self) -> f64 {
        self.training_loss
    }
}

impl TrainedForecastModel for TrainedSequence {
    fn forecast(&self, periods: usize) -> Result<ForecastResult> {
        check_periods(periods)?;

        let lookback = self.params.lookback_window;
        let mut window = self.seed_window.clone();
        let mut scaled_preds = Vec::with_capacity(periods);

        for _ in 0..periods {
            let next = self.regressor.predict(&window[window.len() - lookback..])?;
            scaled_preds.push(next);
            window.push(next);
        }

        let point = self.scaler.inverse_transform_all(&scaled_preds);
        let (lower, upper) = widening_bands(&point, self.val_residual_std, self.params.confidence_level)?;

        ForecastResult::new(
            future_timestamps(self.last_timestamp, periods, self.step_days),
            round_all(&point),
            round_all(&lower),
            round_all(&upper),
            self.params.confidence_level,
            self.info(),
        )
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn info(&self) -> ModelInfo {
        ModelInfo::new(&self.name)
            .with("lookback_window", self.params.lookback_window)
            .with("epochs", self.params.epochs)
            .with("batch_size", self.params.batch_size)
            .with("confidence_level", self.params.confidence_level)
            .with("is_fitted", true)
            .with("val_residual_std", self.val_residual_std)
            .with("training_loss", self.training_loss)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_windows() {
        let (windows, targets) = build_windows(&[0.0, 0.1, 0.2, 0.3, 0.4], 3);
        assert_eq!(windows, vec![vec![0.0, 0.1, 0.2], vec![0.1, 0.2, 0.3]]);
        assert_eq!(targets, vec![0.3, 0.4]);
    }

    #[test]
    fn test_params_validation() {
        let mut params = SequenceParams::default();
        assert!(params.validate().is_ok());

        params.validation_fraction = 1.0;
        assert!(params.validate().is_err());

        let params = SequenceParams { lookback_window: 0, ..Default::default() };
        assert!(params.validate().is_err());
    }
}
