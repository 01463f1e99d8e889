//! Cached records and provider rows

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Default currency for assets created by a sync
pub const DEFAULT_CURRENCY: &str = "USD";

/// Broad asset class recorded with each asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetCategory {
    #[default]
    Stock,
    Crypto,
    Index,
}

#[derive(Debug, Error)]
#[error("unknown asset category '{0}': expected stock, crypto or index")]
pub struct UnknownCategory(pub String);

impl AssetCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetCategory::Stock => "stock",
            AssetCategory::Crypto => "crypto",
            AssetCategory::Index => "index",
        }
    }
}

impl fmt::Display for AssetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetCategory {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stock" => Ok(AssetCategory::Stock),
            "crypto" => Ok(AssetCategory::Crypto),
            "index" => Ok(AssetCategory::Index),
            _ => Err(UnknownCategory(s.to_string())),
        }
    }
}

/// Identity record for a tradable symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: String,
    pub symbol: String,
    pub asset_type: AssetCategory,
    pub name: String,
    pub currency: String,
    pub last_updated: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to create an asset
#[derive(Debug, Clone, PartialEq)]
pub struct NewAsset {
    pub symbol: String,
    pub asset_type: AssetCategory,
    pub name: String,
    pub currency: String,
}

impl NewAsset {
    /// Asset named after its symbol in the default currency
    pub fn for_symbol(symbol: &str, asset_type: AssetCategory) -> Self {
        Self {
            symbol: symbol.to_string(),
            asset_type,
            name: symbol.to_string(),
            currency: DEFAULT_CURRENCY.to_string(),
        }
    }
}

/// One cached OHLCV sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceObservation {
    pub asset_id: String,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

/// Row as delivered by a provider, before normalisation
#[derive(Debug, Clone, PartialEq)]
pub struct RawBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: Option<f64>,
}

/// Result of one sync invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub performed: bool,
    pub rows_written: usize,
    pub message: String,
}

impl SyncOutcome {
    pub fn skipped(message: impl Into<String>) -> Self {
        Self {
            performed: false,
            rows_written: 0,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_round_trip() {
        for category in [AssetCategory::Stock, AssetCategory::Crypto, AssetCategory::Index] {
            assert_eq!(category.as_str().parse::<AssetCategory>().unwrap(), category);
        }
        assert!("bond".parse::<AssetCategory>().is_err());
    }

    #[test]
    fn test_new_asset_defaults() {
        let asset = NewAsset::for_symbol("BTC-USD", AssetCategory::Crypto);
        assert_eq!(asset.name, "BTC-USD");
        assert_eq!(asset.currency, "USD");
    }
}
