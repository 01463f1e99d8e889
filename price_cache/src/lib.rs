//! # Price Cache
//!
//! Persistent, deduplicated cache of periodic OHLCV history and the
//! coordinator that fills it from an external market-data provider.
//!
//! - [`store::PriceStore`] is the narrow read/write contract over the cache,
//!   with a SQLite implementation in [`store::SqliteStore`].
//! - [`provider::HistoryProvider`] fetches full history for a symbol; Yahoo
//!   Finance and local CSV files are supported.
//! - [`coordinator::SyncCoordinator`] resolves the asset, fetches, transforms
//!   and upserts keyed by `(asset, timestamp)`, so re-syncing is idempotent.

pub mod coordinator;
pub mod entity;
pub mod error;
pub mod provider;
pub mod store;

pub use crate::coordinator::SyncCoordinator;
pub use crate::entity::{Asset, AssetCategory, NewAsset, PriceObservation, RawBar, SyncOutcome};
pub use crate::error::{ProviderError, StoreError, SyncError};
pub use crate::provider::{CsvProvider, HistoryProvider, YahooProvider};
pub use crate::store::{PriceStore, SqliteStore, MAX_RECENT_PRICES};
