//! Request validation and model dispatch
//!
//! The orchestrator gates a series on the interval policy, builds a fresh
//! model for the requested variant, fits it and assembles the report with
//! horizon metadata. Nothing is cached between runs.

use crate::capability::Capabilities;
use crate::data::PriceSeries;
use crate::error::{ForecastError, Result};
use crate::interval::{horizon_label, Interval, IntervalPolicy};
use crate::models::decomposition::{DecompositionModel, DecompositionParams};
use crate::models::{BaselineModel, Forecast, Forecaster, ModelInfo, SequenceModel, SequenceParams};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

pub const PERIODS_RANGE: RangeInclusive<usize> = 1..=52;
pub const LOOKBACK_RANGE: RangeInclusive<usize> = 5..=60;
pub const EPOCHS_RANGE: RangeInclusive<usize> = 10..=200;
pub const CONFIDENCE_RANGE: RangeInclusive<f64> = 0.5..=0.99;

/// Date format used in reports
pub const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Forecasting strategy selected by a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ModelKind {
    /// Exponentially weighted baseline
    #[default]
    #[serde(rename = "base")]
    Base,
    /// Recurrent neural predictor
    #[serde(rename = "lstm")]
    Sequence,
    /// Trend + seasonality decomposition
    #[serde(rename = "prophet")]
    Decomposition,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Base => "base",
            ModelKind::Sequence => "lstm",
            ModelKind::Decomposition => "prophet",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "base" => Ok(ModelKind::Base),
            "lstm" | "sequence" => Ok(ModelKind::Sequence),
            "prophet" | "decomposition" => Ok(ModelKind::Decomposition),
            other => Err(ForecastError::ValidationError(format!(
                "Unknown model '{}': expected base, lstm or prophet",
                other
            ))),
        }
    }
}

/// Parameters shared by every model variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastRequest {
    pub symbol: String,
    pub interval: Interval,
    pub periods: usize,
    /// Sequence model only
    pub lookback_window: usize,
    /// Sequence model only
    pub epochs: usize,
    pub confidence_level: f64,
    pub model: ModelKind,
}

impl Default for ForecastRequest {
    fn default() -> Self {
        Self {
            symbol: String::new(),
            interval: Interval::Weekly,
            periods: 4,
            lookback_window: 20,
            epochs: 50,
            confidence_level: 0.95,
            model: ModelKind::Base,
        }
    }
}

fn out_of_range<T: fmt::Debug>(field: &str, value: T, range: &RangeInclusive<T>) -> ForecastError {
    ForecastError::ValidationError(format!(
        "{} must be between {:?} and {:?}, got {:?}",
        field,
        range.start(),
        range.end(),
        value
    ))
}

impl ForecastRequest {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Default::default()
        }
    }

    /// Upper-case the symbol and check every range
    pub fn normalize(mut self) -> Result<Self> {
        self.symbol = normalize_symbol(&self.symbol)?;
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.symbol.trim().is_empty() {
            return Err(ForecastError::ValidationError(
                "Symbol must not be empty".to_string(),
            ));
        }
        if !PERIODS_RANGE.contains(&self.periods) {
            return Err(out_of_range("periods", self.periods, &PERIODS_RANGE));
        }
        if !LOOKBACK_RANGE.contains(&self.lookback_window) {
            return Err(out_of_range("lookback_window", self.lookback_window, &LOOKBACK_RANGE));
        }
        if !EPOCHS_RANGE.contains(&self.epochs) {
            return Err(out_of_range("epochs", self.epochs, &EPOCHS_RANGE));
        }
        if !CONFIDENCE_RANGE.contains(&self.confidence_level) {
            return Err(out_of_range("confidence_level", self.confidence_level, &CONFIDENCE_RANGE));
        }
        Ok(())
    }
}

/// Trim and upper-case a ticker symbol
pub fn normalize_symbol(symbol: &str) -> Result<String> {
    let symbol = symbol.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(ForecastError::ValidationError(
            "Symbol must not be empty".to_string(),
        ));
    }
    Ok(symbol)
}

/// Forecast plus the request echo and horizon metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastReport {
    pub symbol: String,
    pub interval: Interval,
    pub periods_ahead: usize,
    pub forecast_horizon_label: String,
    pub data_points_used: usize,
    pub dates: Vec<String>,
    pub point_forecast: Vec<f64>,
    pub lower_bound: Vec<f64>,
    pub upper_bound: Vec<f64>,
    pub confidence_level: f64,
    pub model_info: ModelInfo,
}

/// Gate, dispatch and assemble forecasts
#[derive(Debug, Clone)]
pub struct ForecastOrchestrator {
    capabilities: Capabilities,
    sequence_defaults: SequenceParams,
    decomposition_defaults: DecompositionParams,
}

impl ForecastOrchestrator {
    pub fn new(capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            sequence_defaults: SequenceParams::default(),
            decomposition_defaults: DecompositionParams::default(),
        }
    }

    /// Override batch size, validation split, seed and layer sizes
    pub fn with_sequence_defaults(mut self, params: SequenceParams) -> Self {
        self.sequence_defaults = params;
        self
    }

    pub fn with_decomposition_defaults(mut self, params: DecompositionParams) -> Self {
        self.decomposition_defaults = params;
        self
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Build an unfitted model for `request`
    pub fn build_model(&self, request: &ForecastRequest, series_len: usize) -> Result<Box<dyn Forecast>> {
        let model: Box<dyn Forecast> = match request.model {
            ModelKind::Base => {
                let span = request.lookback_window.min(series_len.saturating_sub(1)).max(1);
                Box::new(Forecaster::new(BaselineModel::new(span, request.confidence_level)?))
            }
            ModelKind::Sequence => {
                let params = SequenceParams {
                    lookback_window: request.lookback_window,
                    epochs: request.epochs,
                    confidence_level: request.confidence_level,
                    ..self.sequence_defaults.clone()
                };
                Box::new(Forecaster::new(SequenceModel::new(params, &self.capabilities)?))
            }
            ModelKind::Decomposition => {
                let params = DecompositionParams {
                    confidence_level: request.confidence_level,
                    ..self.decomposition_defaults.clone()
                };
                Box::new(Forecaster::new(DecompositionModel::new(params)?))
            }
        };
        Ok(model)
    }

    /// Gate on the interval policy, then fit and forecast a fresh model
    pub fn run(&self, series: &PriceSeries, request: &ForecastRequest) -> Result<ForecastReport> {
        request.validate()?;

        let policy = IntervalPolicy::for_interval(request.interval);
        if let Err(err) = policy.validate(series.len()) {
            tracing::warn!(
                symbol = %request.symbol,
                interval = %request.interval,
                required = policy.min_samples,
                actual = series.len(),
                "insufficient history for forecast"
            );
            return Err(err);
        }

        let mut model = self.build_model(request, series.len())?;
        tracing::info!(
            symbol = %request.symbol,
            model = %request.model,
            samples = series.len(),
            periods = request.periods,
            "running forecast"
        );
        model.fit(series)?;
        let result = model.forecast(request.periods)?;

        Ok(ForecastReport {
            symbol: request.symbol.clone(),
            interval: request.interval,
            periods_ahead: request.periods,
            forecast_horizon_label: horizon_label(request.periods, request.interval),
            data_points_used: series.len(),
            dates: result
                .timestamps()
                .iter()
                .map(|t| t.format(DATE_FORMAT).to_string())
                .collect(),
            point_forecast: result.point().to_vec(),
            lower_bound: result.lower().to_vec(),
            upper_bound: result.upper().to_vec(),
            confidence_level: result.confidence_level(),
            model_info: result.model_info().clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("base", ModelKind::Base)]
    #[case("LSTM", ModelKind::Sequence)]
    #[case("prophet", ModelKind::Decomposition)]
    fn test_model_kind_parse(#[case] input: &str, #[case] expected: ModelKind) {
        assert_eq!(input.parse::<ModelKind>().unwrap(), expected);
    }

    #[test]
    fn test_normalize_symbol() {
        assert_eq!(normalize_symbol("  aapl ").unwrap(), "AAPL");
        assert!(normalize_symbol("   ").is_err());
    }
}
