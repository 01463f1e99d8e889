//! Fetch-transform-upsert pipeline for one symbol

use chrono::{DateTime, Utc};
use forecast_engine::Interval;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::entity::{Asset, AssetCategory, NewAsset, PriceObservation, RawBar, SyncOutcome};
use crate::error::SyncError;
use crate::provider::HistoryProvider;
use crate::store::PriceStore;

/// Pulls history from a provider into the store.
///
/// Every sync rewrites the provider's full history for the symbol. Rows are
/// keyed by `(asset, timestamp)`, so repeating a sync leaves the row count
/// unchanged and later values replace earlier ones.
#[derive(Clone)]
pub struct SyncCoordinator {
    store: Arc<dyn PriceStore>,
    provider: Arc<dyn HistoryProvider>,
}

impl std::fmt::Debug for SyncCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncCoordinator")
            .field("provider", &self.provider.name())
            .finish_non_exhaustive()
    }
}

impl SyncCoordinator {
    pub fn new(store: Arc<dyn PriceStore>, provider: Arc<dyn HistoryProvider>) -> Self {
        Self { store, provider }
    }

    pub fn sync(
        &self,
        symbol: &str,
        category: AssetCategory,
        interval: Interval,
    ) -> Result<SyncOutcome, SyncError> {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(SyncError::InvalidSymbol("symbol must not be empty".to_string()));
        }

        let asset = self.resolve_asset(&symbol, category)?;

        info!(symbol = %symbol, interval = %interval, provider = self.provider.name(), "fetching history");
        let bars = self.provider.fetch_history(&symbol, interval)?;
        if bars.is_empty() {
            warn!(symbol = %symbol, "provider returned no history");
            return Err(SyncError::NotFound { symbol });
        }
        info!(symbol = %symbol, rows = bars.len(), "fetched history");

        let rows = transform(&asset.id, &symbol, bars);
        if rows.is_empty() {
            warn!(symbol = %symbol, "provider history had no usable rows");
            return Err(SyncError::NotFound { symbol });
        }

        let written = self.store.upsert_prices(&rows)?;
        self.store.touch_asset(&asset.id, Utc::now())?;

        info!(symbol = %symbol, rows = written, "sync complete");
        Ok(SyncOutcome {
            performed: true,
            rows_written: written,
            message: format!("Synced {} ({}): {} rows written", symbol, interval, written),
        })
    }

    fn resolve_asset(&self, symbol: &str, category: AssetCategory) -> Result<Asset, SyncError> {
        if let Some(asset) = self.store.find_asset(symbol)? {
            return Ok(asset);
        }
        let asset = self.store.ensure_asset(&NewAsset::for_symbol(symbol, category))?;
        info!(symbol, asset_id = %asset.id, category = %category, "created asset");
        Ok(asset)
    }
}

/// Normalise provider rows: missing volume becomes zero, rows without a
/// finite close are dropped and duplicate timestamps keep the last row.
fn transform(asset_id: &str, symbol: &str, bars: Vec<RawBar>) -> Vec<PriceObservation> {
    let mut by_timestamp: BTreeMap<DateTime<Utc>, PriceObservation> = BTreeMap::new();
    for bar in bars {
        if !bar.close.is_finite() {
            warn!(symbol, timestamp = %bar.timestamp, "dropping row without a close price");
            continue;
        }
        let or_close = |value: f64| if value.is_finite() { value } else { bar.close };
        let volume = bar
            .volume
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map(|v| v.round() as i64)
            .unwrap_or(0);

        by_timestamp.insert(
            bar.timestamp,
            PriceObservation {
                asset_id: asset_id.to_string(),
                timestamp: bar.timestamp,
                open: or_close(bar.open),
                high: or_close(bar.high),
                low: or_close(bar.low),
                close: bar.close,
                volume,
            },
        );
    }
    by_timestamp.into_values().collect()
}
