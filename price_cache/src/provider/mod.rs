//! Market-data providers

mod csv_files;
mod yahoo;

pub use self::csv_files::CsvProvider;
pub use self::yahoo::YahooProvider;

use forecast_engine::Interval;

use crate::entity::RawBar;
use crate::error::ProviderError;

/// Source of full periodic history for a symbol.
///
/// An empty result means the provider knows nothing about the symbol at this
/// interval; transport failures are reported as [`ProviderError::Network`].
pub trait HistoryProvider: Send + Sync {
    fn name(&self) -> &str;

    fn fetch_history(&self, symbol: &str, interval: Interval) -> Result<Vec<RawBar>, ProviderError>;
}
