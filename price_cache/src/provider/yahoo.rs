use chrono::{TimeZone, Utc};
use forecast_engine::Interval;
use std::future::Future;
use tracing::{debug, warn};
use yahoo_finance_api::{YahooConnector, YahooError};

use super::HistoryProvider;
use crate::entity::RawBar;
use crate::error::ProviderError;

const FULL_RANGE: &str = "max";

/// Yahoo Finance chart API
pub struct YahooProvider {
    connector: YahooConnector,
}

impl std::fmt::Debug for YahooProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YahooProvider").finish_non_exhaustive()
    }
}

impl YahooProvider {
    pub fn new() -> Result<Self, ProviderError> {
        let connector = YahooConnector::new().map_err(|e| ProviderError::Network(e.to_string()))?;
        Ok(Self { connector })
    }
}

/// Drive a provider future from synchronous code.
///
/// Worker threads spawned by the runtime's blocking pool reuse its handle;
/// anywhere else a throwaway current-thread runtime is built.
fn block_on<F: Future>(fut: F) -> Result<F::Output, ProviderError> {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => Ok(handle.block_on(fut)),
        Err(_) => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            Ok(runtime.block_on(fut))
        }
    }
}

impl HistoryProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo"
    }

    fn fetch_history(&self, symbol: &str, interval: Interval) -> Result<Vec<RawBar>, ProviderError> {
        debug!(symbol, interval = interval.as_str(), "fetching history from yahoo");
        let response = block_on(self.connector.get_quote_range(symbol, interval.as_str(), FULL_RANGE))?;

        let response = match response {
            Ok(response) => response,
            Err(YahooError::NoQuotes) | Err(YahooError::NoResult) => return Ok(Vec::new()),
            Err(e) => return Err(ProviderError::Network(e.to_string())),
        };

        let quotes = match response.quotes() {
            Ok(quotes) => quotes,
            Err(YahooError::NoQuotes) | Err(YahooError::NoResult) => return Ok(Vec::new()),
            Err(e) => return Err(ProviderError::Parse(e.to_string())),
        };

        let mut bars = Vec::with_capacity(quotes.len());
        for quote in quotes {
            let Some(timestamp) = Utc.timestamp_opt(quote.timestamp as i64, 0).single() else {
                warn!(symbol, timestamp = quote.timestamp as i64, "skipping quote with invalid timestamp");
                continue;
            };
            bars.push(RawBar {
                timestamp,
                open: quote.open,
                high: quote.high,
                low: quote.low,
                close: quote.close,
                volume: Some(quote.volume as f64),
            });
        }
        Ok(bars)
    }
}
