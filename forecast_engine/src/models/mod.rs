//! Forecasting models for price series
//!
//! Every model follows the same two-step shape: [`ForecastModel::train`]
//! consumes a [`PriceSeries`] and returns an immutable trained value, and
//! [`TrainedForecastModel::forecast`] projects it forward. [`Forecaster`]
//! wraps that pair in an explicit `Unfitted → Fitted | FitFailed` lifecycle
//! for callers that hold a model before data is available.

use crate::data::PriceSeries;
use crate::error::{ForecastError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Debug;

pub mod baseline;
pub mod decomposition;
pub mod sequence;

pub use baseline::{BaselineModel, TrainedBaseline};
pub use decomposition::{DecompositionModel, DecompositionParams, TrainedDecomposition};
pub use sequence::{SequenceModel, SequenceParams, TrainedSequence};

/// Version tag reported by every model
pub const MODEL_VERSION: &str = "1.0";

/// Descriptive metadata reported alongside a forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub version: String,
    pub params: BTreeMap<String, Value>,
}

impl ModelInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: MODEL_VERSION.to_string(),
            params: BTreeMap::new(),
        }
    }

    /// Add one fitted or configured parameter
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }
}

/// Output of a single `forecast` call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastResult {
    timestamps: Vec<DateTime<Utc>>,
    point: Vec<f64>,
    lower: Vec<f64>,
    upper: Vec<f64>,
    confidence_level: f64,
    model_info: ModelInfo,
}

impl ForecastResult {
    /// Create a forecast result, enforcing `lower <= point <= upper`
    pub fn new(
        timestamps: Vec<DateTime<Utc>>,
        point: Vec<f64>,
        lower: Vec<f64>,
        upper: Vec<f64>,
        confidence_level: f64,
        model_info: ModelInfo,
    ) -> Result<Self> {
        let n = timestamps.len();
        if point.len() != n || lower.len() != n || upper.len() != n {
            return Err(ForecastError::ValidationError(format!(
                "Forecast sequences differ in length: dates {}, point {}, lower {}, upper {}",
                n,
                point.len(),
                lower.len(),
                upper.len()
            )));
        }

        for (i, ((l, p), u)) in lower.iter().zip(&point).zip(&upper).enumerate() {
            if !(l <= p && p <= u) {
                return Err(ForecastError::ValidationError(format!(
                    "Band violated at step {}: lower {} point {} upper {}",
                    i + 1,
                    l,
                    p,
                    u
                )));
            }
        }

        Ok(Self {
            timestamps,
            point,
            lower,
            upper,
            confidence_level,
            model_info,
        })
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn point(&self) -> &[f64] {
        &self.point
    }

    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    pub fn confidence_level(&self) -> f64 {
        self.confidence_level
    }

    pub fn model_info(&self) -> &ModelInfo {
        &self.model_info
    }

    /// Number of forecast steps
    pub fn len(&self) -> usize {
        self.point.len()
    }

    pub fn is_empty(&self) -> bool {
        self.point.is_empty()
    }
}

/// Trained forecast model
pub trait TrainedForecastModel: Debug + Send {
    /// Generate forecast for future periods
    fn forecast(&self, periods: usize) -> Result<ForecastResult>;

    /// Name of the model
    fn name(&self) -> &str;

    /// Metadata including fitted parameters
    fn info(&self) -> ModelInfo;
}

/// Forecast model that can be trained on a price series
pub trait ForecastModel: Debug + Clone + Send {
    /// The type of trained model produced
    type Trained: TrainedForecastModel;

    /// Train the model on a price series
    fn train(&self, series: &PriceSeries) -> Result<Self::Trained>;

    /// Get the name of the model
    fn name(&self) -> &str;

    /// Fewest observations `train` accepts
    fn min_samples(&self) -> usize;

    /// Metadata before training
    fn info(&self) -> ModelInfo;
}

pub(crate) fn check_periods(periods: usize) -> Result<()> {
    if periods == 0 {
        return Err(ForecastError::ValidationError(
            "Periods must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// Lifecycle of a [`Forecaster`]
#[derive(Debug)]
pub enum ModelState<T> {
    Unfitted,
    Fitted(T),
    FitFailed(String),
}

/// Single-use model wrapper that enforces fit-before-forecast
#[derive(Debug)]
pub struct Forecaster<M: ForecastModel> {
    model: M,
    state: ModelState<M::Trained>,
}

impl<M: ForecastModel> Forecaster<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            state: ModelState::Unfitted,
        }
    }

    /// Train once; a second call fails whatever the first outcome was
    pub fn fit(&mut self, series: &PriceSeries) -> Result<()> {
        match &self.state {
            ModelState::Unfitted => {}
            ModelState::Fitted(_) => {
                return Err(ForecastError::NotFitted(format!(
                    "{} is already fitted; build a new model for new data",
                    self.model.name()
                )))
            }
            ModelState::FitFailed(reason) => {
                return Err(ForecastError::NotFitted(format!(
                    "{} failed to fit earlier: {}",
                    self.model.name(),
                    reason
                )))
            }
        }

        match self.model.train(series) {
            Ok(trained) => {
                self.state = ModelState::Fitted(trained);
                Ok(())
            }
            Err(err) => {
                self.state = ModelState::FitFailed(err.to_string());
                Err(err)
            }
        }
    }

    pub fn forecast(&self, periods: usize) -> Result<ForecastResult> {
        match &self.state {
            ModelState::Fitted(trained) => trained.forecast(periods),
            ModelState::Unfitted => Err(ForecastError::NotFitted(format!(
                "Call fit() before forecast() on {}",
                self.model.name()
            ))),
            ModelState::FitFailed(reason) => Err(ForecastError::NotFitted(format!(
                "{} failed to fit: {}",
                self.model.name(),
                reason
            ))),
        }
    }

    pub fn state(&self) -> &ModelState<M::Trained> {
        &self.state
    }

    pub fn is_fitted(&self) -> bool {
        matches!(self.state, ModelState::Fitted(_))
    }

    pub fn model_info(&self) -> ModelInfo {
        match &self.state {
            ModelState::Fitted(trained) => trained.info(),
            _ => self.model.info(),
        }
    }
}

/// Object-safe view of a [`Forecaster`] so variants can be chosen at runtime
pub trait Forecast: Debug + Send {
    fn fit(&mut self, series: &PriceSeries) -> Result<()>;
    fn forecast(&self, periods: usize) -> Result<ForecastResult>;
    fn model_info(&self) -> ModelInfo;
    fn is_fitted(&self) -> bool;
    fn min_samples(&self) -> usize;
}

impl<M> Forecast for Forecaster<M>
where
    M: ForecastModel,
{
    fn fit(&mut self, series: &PriceSeries) -> Result<()> {
        Forecaster::fit(self, series)
    }

    fn forecast(&self, periods: usize) -> Result<ForecastResult> {
        Forecaster::forecast(self, periods)
    }

    fn model_info(&self) -> ModelInfo {
        Forecaster::model_info(self)
    }

    fn is_fitted(&self) -> bool {
        Forecaster::is_fitted(self)
    }

    fn min_samples(&self) -> usize {
        self.model.min_samples()
    }
}
