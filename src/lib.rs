//! # Owlcast
//!
//! Price-history cache and forecasting service.
//!
//! The [`ForecastService`] ties the [`price_cache`] sync coordinator and the
//! [`forecast_engine`] orchestrator together behind a bounded
//! [`WorkerPool`], and maps every failure onto an [`ErrorKind`] a caller can
//! act on.
//!
//! ## Example
//!
//! ```rust,ignore
//! use owlcast::{AppConfig, ForecastService, SyncRequest};
//!
//! let config = AppConfig::load(None)?;
//! let service = ForecastService::from_config(&config)?;
//! let report = service.sync(SyncRequest::new("aapl")).await?;
//! println!("{}", report.message);
//! ```

pub mod config;
pub mod error;
pub mod pool;
pub mod service;
pub mod telemetry;

pub use crate::config::{AppConfig, ProviderKind};
pub use crate::error::{ErrorKind, Result, ServiceError};
pub use crate::pool::WorkerPool;
pub use crate::service::{
    AnalyzeReport, AnalyzeRequest, ForecastService, SyncReport, SyncRequest, SyncSummary, DEFAULT_PRICE_LIMIT,
};
