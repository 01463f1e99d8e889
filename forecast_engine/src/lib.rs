//! # Forecast Engine
//!
//! Interchangeable forecasting strategies for periodic closing prices.
//!
//! ## Features
//!
//! - Price series validation and sampling-step inference
//! - Interval policy (minimum history per sampling interval) and horizon labels
//! - Models: exponentially weighted baseline, recurrent sequence model
//!   (behind the `sequence` feature), trend + seasonality decomposition
//! - Confidence bands that contain the point forecast at every step
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use forecast_engine::{Capabilities, ForecastOrchestrator, ForecastRequest, PriceSeries};
//!
//! let orchestrator = ForecastOrchestrator::new(Capabilities::probe());
//! let request = ForecastRequest::new("aapl").normalize()?;
//! let report = orchestrator.run(&series, &request)?;
//! println!("{}: {:?}", report.forecast_horizon_label, report.point_forecast);
//! ```

pub mod capability;
pub mod confidence;
pub mod data;
pub mod error;
pub mod interval;
pub mod models;
pub mod orchestrator;
pub mod utils;

// Re-export commonly used types
pub use crate::capability::Capabilities;
pub use crate::data::{PricePoint, PriceSeries};
pub use crate::error::{ForecastError, Result};
pub use crate::interval::{horizon_label, Interval, IntervalPolicy};
pub use crate::models::{
    DecompositionParams, Forecast, ForecastModel, ForecastResult, Forecaster, ModelInfo, ModelState, SequenceParams,
    TrainedForecastModel,
};
pub use crate::orchestrator::{ForecastOrchestrator, ForecastReport, ForecastRequest, ModelKind};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
