use chrono::{DateTime, NaiveDate, Utc};
use forecast_engine::Interval;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::HistoryProvider;
use crate::entity::RawBar;
use crate::error::ProviderError;

/// Reads `<dir>/<SYMBOL>_<interval>.csv` files with a
/// `timestamp,open,high,low,close[,volume]` header.
///
/// Timestamps may be RFC 3339 or plain `YYYY-MM-DD` dates (taken as UTC midnight).
#[derive(Debug, Clone)]
pub struct CsvProvider {
    dir: PathBuf,
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: Option<f64>,
}

impl CsvProvider {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, symbol: &str, interval: Interval) -> PathBuf {
        self.dir.join(format!("{}_{}.csv", symbol, interval.as_str()))
    }
}

fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, ProviderError> {
    let text = text.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| ProviderError::Parse(format!("invalid timestamp '{}'", text)))
}

impl HistoryProvider for CsvProvider {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch_history(&self, symbol: &str, interval: Interval) -> Result<Vec<RawBar>, ProviderError> {
        let path = self.path_for(symbol, interval);
        if !path.exists() {
            debug!(path = %path.display(), "no csv history file");
            return Ok(Vec::new());
        }

        let mut reader = csv::Reader::from_path(&path)?;
        let mut bars = Vec::new();
        for row in reader.deserialize::<CsvRow>() {
            let row = row?;
            bars.push(RawBar {
                timestamp: parse_timestamp(&row.timestamp)?,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
            });
        }
        Ok(bars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 8, 0, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2024-01-08").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-01-08T00:00:00Z").unwrap(), expected);
        assert!(parse_timestamp("08/01/2024").is_err());
    }
}
