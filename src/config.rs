//! Application configuration
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `OWLCAST__SECTION__KEY` environment variables.

use forecast_engine::{ForecastRequest, Interval, ModelKind, SequenceParams};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, ServiceError};

pub const ENV_PREFIX: &str = "OWLCAST";
pub const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub workers: WorkerConfig,
    pub database: DatabaseConfig,
    pub provider: ProviderConfig,
    pub forecast: ForecastDefaults,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Jobs (syncs and model fits) allowed to run at once
    pub size: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { size: 2 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/owlcast.db"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Yahoo,
    Csv,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    /// Directory searched by the csv provider
    pub csv_dir: PathBuf,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::Yahoo,
            csv_dir: PathBuf::from("data/csv"),
        }
    }
}

/// Request defaults applied when a caller leaves a field unset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastDefaults {
    pub interval: Interval,
    pub periods: usize,
    pub model: ModelKind,
    pub lookback_window: usize,
    pub epochs: usize,
    pub confidence_level: f64,
    pub validation_fraction: f64,
    pub batch_size: usize,
    pub seed: u64,
}

impl Default for ForecastDefaults {
    fn default() -> Self {
        let request = ForecastRequest::default();
        let sequence = SequenceParams::default();
        Self {
            interval: request.interval,
            periods: request.periods,
            model: request.model,
            lookback_window: request.lookback_window,
            epochs: request.epochs,
            confidence_level: request.confidence_level,
            validation_fraction: sequence.validation_fraction,
            batch_size: sequence.batch_size,
            seed: sequence.seed,
        }
    }
}

impl ForecastDefaults {
    pub fn request(&self, symbol: impl Into<String>) -> ForecastRequest {
        ForecastRequest {
            symbol: symbol.into(),
            interval: self.interval,
            periods: self.periods,
            lookback_window: self.lookback_window,
            epochs: self.epochs,
            confidence_level: self.confidence_level,
            model: self.model,
        }
    }

    pub fn sequence_params(&self) -> SequenceParams {
        SequenceParams {
            lookback_window: self.lookback_window,
            epochs: self.epochs,
            batch_size: self.batch_size,
            validation_fraction: self.validation_fraction,
            confidence_level: self.confidence_level,
            seed: self.seed,
            ..SequenceParams::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load defaults, then `path` if given, then the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()?;

        let config: AppConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers.size == 0 {
            return Err(ServiceError::Validation(
                "workers.size must be at least 1".to_string(),
            ));
        }
        self.forecast
            .request("CONFIG")
            .validate()
            .map_err(|e| ServiceError::Validation(format!("forecast defaults: {}", e)))?;
        self.forecast
            .sequence_params()
            .validate()
            .map_err(|e| ServiceError::Validation(format!("forecast defaults: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.workers.size, 2);
        assert_eq!(config.database.path, PathBuf::from("data/owlcast.db"));
        assert_eq!(config.provider.kind, ProviderKind::Yahoo);
        assert_eq!(config.forecast.interval, Interval::Weekly);
        assert_eq!(config.forecast.periods, 4);
        assert_eq!(config.forecast.confidence_level, 0.95);
        assert_eq!(config.log.filter, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = AppConfig::default();
        config.workers.size = 0;
        assert!(matches!(config.validate(), Err(ServiceError::Validation(_))));
    }

    #[test]
    fn test_out_of_range_defaults_rejected() {
        let mut config = AppConfig::default();
        config.forecast.confidence_level = 0.999;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.forecast.periods = 53;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_sequence_defaults_rejected() {
        let mut config = AppConfig::default();
        config.forecast.batch_size = 0;
        assert!(matches!(config.validate(), Err(ServiceError::Validation(_))));

        let mut config = AppConfig::default();
        config.forecast.validation_fraction = 1.0;
        assert!(matches!(config.validate(), Err(ServiceError::Validation(_))));
    }

    #[test]
    fn test_sequence_params_follow_defaults() {
        let mut defaults = ForecastDefaults::default();
        defaults.batch_size = 8;
        defaults.seed = 7;
        let params = defaults.sequence_params();
        assert_eq!(params.batch_size, 8);
        assert_eq!(params.seed, 7);
        assert_eq!(params.recurrent_units, (64, 32));
    }
}
