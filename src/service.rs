//! Request-level operations over the cache and the forecasting engine

use forecast_engine::interval;
use forecast_engine::orchestrator::normalize_symbol;
use forecast_engine::{
    Capabilities, ForecastOrchestrator, ForecastReport, ForecastRequest, Interval, ModelKind, PriceSeries,
    SequenceParams,
};
use price_cache::{
    Asset, AssetCategory, CsvProvider, HistoryProvider, PriceObservation, PriceStore, SqliteStore, SyncCoordinator,
    YahooProvider, MAX_RECENT_PRICES,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{AppConfig, ProviderKind};
use crate::error::{Result, ServiceError};
use crate::pool::{run_blocking, WorkerPool};

/// Rows returned by [`ForecastService::prices`] when no limit is given
pub const DEFAULT_PRICE_LIMIT: usize = 200;

/// Sync-only request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncRequest {
    pub symbol: String,
    pub category: AssetCategory,
    pub interval: Interval,
}

impl SyncRequest {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Default::default()
        }
    }
}

impl Default for SyncRequest {
    fn default() -> Self {
        Self {
            symbol: String::new(),
            category: AssetCategory::Stock,
            interval: Interval::Weekly,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    pub status: String,
    pub message: String,
    pub symbol: String,
    pub rows_synced: usize,
}

/// Combined sync + forecast request; the forecast symbol is taken from the call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzeRequest {
    /// Category recorded if the asset has to be created
    pub category: AssetCategory,
    #[serde(flatten)]
    pub forecast: ForecastRequest,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncSummary {
    pub performed: bool,
    pub rows_synced: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyzeReport {
    pub sync: SyncSummary,
    pub model: ModelKind,
    #[serde(flatten)]
    pub forecast: ForecastReport,
}

/// Entry point for the request path.
///
/// Built once at start-up and shared by reference. Syncs and model fits run
/// on the bounded [`WorkerPool`]; store reads run on plain blocking threads.
#[derive(Clone)]
pub struct ForecastService {
    store: Arc<dyn PriceStore>,
    coordinator: SyncCoordinator,
    orchestrator: ForecastOrchestrator,
    pool: WorkerPool,
}

impl std::fmt::Debug for ForecastService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForecastService")
            .field("coordinator", &self.coordinator)
            .field("orchestrator", &self.orchestrator)
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

impl ForecastService {
    pub fn new(
        store: Arc<dyn PriceStore>,
        provider: Arc<dyn HistoryProvider>,
        capabilities: Capabilities,
        pool: WorkerPool,
    ) -> Self {
        Self {
            coordinator: SyncCoordinator::new(store.clone(), provider),
            store,
            orchestrator: ForecastOrchestrator::new(capabilities),
            pool,
        }
    }

    /// Wire the SQLite store, configured provider and probed capabilities
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let store: Arc<dyn PriceStore> = Arc::new(SqliteStore::open(&config.database.path)?);
        let provider: Arc<dyn HistoryProvider> = match config.provider.kind {
            ProviderKind::Yahoo => Arc::new(
                YahooProvider::new().map_err(|e| ServiceError::Internal(format!("yahoo provider: {}", e)))?,
            ),
            ProviderKind::Csv => Arc::new(CsvProvider::new(&config.provider.csv_dir)),
        };
        let capabilities = Capabilities::probe();
        info!(
            database = %config.database.path.display(),
            provider = provider.name(),
            workers = config.workers.size,
            sequence_backend = capabilities.has_sequence(),
            "service configured"
        );

        let pool = WorkerPool::new(config.workers.size)?;
        Ok(Self::new(store, provider, capabilities, pool)
            .with_sequence_defaults(config.forecast.sequence_params()))
    }

    pub fn with_sequence_defaults(mut self, params: SequenceParams) -> Self {
        self.orchestrator = self.orchestrator.with_sequence_defaults(params);
        self
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn capabilities(&self) -> &Capabilities {
        self.orchestrator.capabilities()
    }

    /// Pull full history for one symbol into the cache
    pub async fn sync(&self, request: SyncRequest) -> Result<SyncReport> {
        let symbol = normalize_symbol(&request.symbol)?;
        let coordinator = self.coordinator.clone();
        let job_symbol = symbol.clone();
        let outcome = self
            .pool
            .run(move || Ok(coordinator.sync(&job_symbol, request.category, request.interval)?))
            .await?;

        Ok(SyncReport {
            status: "success".to_string(),
            message: outcome.message,
            symbol,
            rows_synced: outcome.rows_written,
        })
    }

    /// Forecast from cached prices only
    pub async fn forecast(&self, request: ForecastRequest) -> Result<ForecastReport> {
        let request = request.normalize()?;
        let series = self.load_series(&request.symbol).await?;
        self.run_forecast(series, request).await
    }

    /// Sync the symbol unless it already has cached prices, then forecast
    pub async fn analyze(&self, symbol: &str, request: AnalyzeRequest) -> Result<AnalyzeReport> {
        let forecast_request = ForecastRequest {
            symbol: symbol.to_string(),
            ..request.forecast
        }
        .normalize()?;
        let symbol = forecast_request.symbol.clone();

        let store = self.store.clone();
        let lookup = symbol.clone();
        let cached = run_blocking(move || match store.find_asset(&lookup)? {
            Some(asset) => Ok(store.count_prices(&asset.id)? > 0),
            None => Ok(false),
        })
        .await?;

        let sync = if cached {
            info!(symbol = %symbol, "already cached, skipping sync");
            SyncSummary {
                performed: false,
                rows_synced: 0,
                message: format!("'{}' already cached, sync skipped", symbol),
            }
        } else {
            info!(symbol = %symbol, interval = %forecast_request.interval, "not cached, syncing");
            let report = self
                .sync(SyncRequest {
                    symbol: symbol.clone(),
                    category: request.category,
                    interval: forecast_request.interval,
                })
                .await?;
            SyncSummary {
                performed: true,
                rows_synced: report.rows_synced,
                message: report.message,
            }
        };

        let series = self.load_series(&symbol).await?;
        let model = forecast_request.model;
        let forecast = self.run_forecast(series, forecast_request).await?;

        Ok(AnalyzeReport { sync, model, forecast })
    }

    /// Every cached asset ordered by symbol
    pub async fn list_assets(&self) -> Result<Vec<Asset>> {
        let store = self.store.clone();
        run_blocking(move || Ok(store.list_assets()?)).await
    }

    /// Newest cached rows first; `limit` defaults to 200 and may not exceed 1000
    pub async fn prices(&self, symbol: &str, limit: Option<usize>) -> Result<Vec<PriceObservation>> {
        let symbol = normalize_symbol(symbol)?;
        let limit = limit.unwrap_or(DEFAULT_PRICE_LIMIT);
        if limit == 0 || limit > MAX_RECENT_PRICES {
            return Err(ServiceError::Validation(format!(
                "limit must be between 1 and {}, got {}",
                MAX_RECENT_PRICES, limit
            )));
        }

        let store = self.store.clone();
        run_blocking(move || {
            let asset = store
                .find_asset(&symbol)?
                .ok_or_else(|| ServiceError::NotFound(format!("Asset '{}' not found", symbol)))?;
            Ok(store.recent_prices(&asset.id, limit)?)
        })
        .await
    }

    async fn load_series(&self, symbol: &str) -> Result<PriceSeries> {
        let store = self.store.clone();
        let symbol = symbol.to_string();
        run_blocking(move || {
            let missing = || {
                ServiceError::NotFound(format!(
                    "No price data cached for '{}'; sync the symbol first",
                    symbol
                ))
            };
            let asset = store.find_asset(&symbol)?.ok_or_else(missing)?;
            let points = store.close_history(&asset.id)?;
            if points.is_empty() {
                return Err(missing());
            }
            // Stored rows were validated on write; a bad row here is corruption
            PriceSeries::from_unsorted(points)
                .map_err(|e| ServiceError::Internal(format!("cached prices for '{}' are unusable: {}", symbol, e)))
        })
        .await
    }

    async fn run_forecast(&self, series: PriceSeries, request: ForecastRequest) -> Result<ForecastReport> {
        if let Err(err) = interval::validate(series.len(), request.interval) {
            warn!(
                symbol = %request.symbol,
                interval = %request.interval,
                samples = series.len(),
                "rejecting forecast on thin history"
            );
            return Err(err.into());
        }

        let orchestrator = self.orchestrator.clone();
        self.pool
            .run(move || Ok(orchestrator.run(&series, &request)?))
            .await
    }
}
