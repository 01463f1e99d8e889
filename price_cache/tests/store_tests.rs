use chrono::{Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;
use price_cache::{AssetCategory, NewAsset, PriceObservation, PriceStore, SqliteStore, MAX_RECENT_PRICES};
use tempfile::tempdir;

fn observations(asset_id: &str, n: usize, base: f64) -> Vec<PriceObservation> {
    let start = Utc.with_ymd_and_hms(2020, 1, 6, 0, 0, 0).unwrap();
    (0..n)
        .map(|i| PriceObservation {
            asset_id: asset_id.to_string(),
            timestamp: start + Duration::weeks(i as i64),
            open: base + i as f64,
            high: base + i as f64 + 1.0,
            low: base + i as f64 - 1.0,
            close: base + i as f64 + 0.5,
            volume: 1000 + i as i64,
        })
        .collect()
}

#[test]
fn test_open_creates_parent_directory() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("cache.db");
    let store = SqliteStore::open(&path).unwrap();
    assert!(path.exists());
    assert!(store.list_assets().unwrap().is_empty());
}

#[test]
fn test_data_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cache.db");
    let asset_id = {
        let store = SqliteStore::open(&path).unwrap();
        let asset = store
            .ensure_asset(&NewAsset::for_symbol("MSFT", AssetCategory::Stock))
            .unwrap();
        store.upsert_prices(&observations(&asset.id, 5, 100.0)).unwrap();
        asset.id
    };

    let store = SqliteStore::open(&path).unwrap();
    assert_eq!(store.count_prices(&asset_id).unwrap(), 5);
    assert_eq!(store.find_asset("MSFT").unwrap().unwrap().id, asset_id);
}

#[test]
fn test_upsert_is_idempotent_and_last_write_wins() {
    let store = SqliteStore::open_in_memory().unwrap();
    let asset = store
        .ensure_asset(&NewAsset::for_symbol("AAPL", AssetCategory::Stock))
        .unwrap();

    store.upsert_prices(&observations(&asset.id, 10, 100.0)).unwrap();
    store.upsert_prices(&observations(&asset.id, 10, 200.0)).unwrap();

    assert_eq!(store.count_prices(&asset.id).unwrap(), 10);
    let history = store.close_history(&asset.id).unwrap();
    assert_eq!(history[0].close, 200.5);
    assert_eq!(history[9].close, 209.5);
}

#[test]
fn test_close_history_is_oldest_first() {
    let store = SqliteStore::open_in_memory().unwrap();
    let asset = store
        .ensure_asset(&NewAsset::for_symbol("AAPL", AssetCategory::Stock))
        .unwrap();
    let mut rows = observations(&asset.id, 6, 10.0);
    rows.reverse();
    store.upsert_prices(&rows).unwrap();

    let history = store.close_history(&asset.id).unwrap();
    assert!(history.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
}

#[test]
fn test_recent_prices_newest_first_with_limit() {
    let store = SqliteStore::open_in_memory().unwrap();
    let asset = store
        .ensure_asset(&NewAsset::for_symbol("AAPL", AssetCategory::Stock))
        .unwrap();
    let rows = observations(&asset.id, 20, 10.0);
    store.upsert_prices(&rows).unwrap();

    let recent = store.recent_prices(&asset.id, 3).unwrap();
    assert_eq!(recent.len(), 3);
    assert_eq!(recent[0], rows[19]);
    assert!(recent[0].timestamp > recent[2].timestamp);
}

#[test]
fn test_recent_prices_limit_is_capped() {
    let store = SqliteStore::open_in_memory().unwrap();
    let asset = store
        .ensure_asset(&NewAsset::for_symbol("SPY", AssetCategory::Index))
        .unwrap();
    store
        .upsert_prices(&observations(&asset.id, MAX_RECENT_PRICES + 5, 10.0))
        .unwrap();

    let recent = store.recent_prices(&asset.id, usize::MAX).unwrap();
    assert_eq!(recent.len(), MAX_RECENT_PRICES);
}

#[test]
fn test_list_assets_sorted_by_symbol() {
    let store = SqliteStore::open_in_memory().unwrap();
    for symbol in ["TSLA", "AAPL", "BTC-USD"] {
        store
            .ensure_asset(&NewAsset::for_symbol(symbol, AssetCategory::Stock))
            .unwrap();
    }
    let symbols: Vec<String> = store.list_assets().unwrap().into_iter().map(|a| a.symbol).collect();
    assert_eq!(symbols, vec!["AAPL", "BTC-USD", "TSLA"]);
}

#[test]
fn test_touch_asset_sets_last_updated() {
    let store = SqliteStore::open_in_memory().unwrap();
    let asset = store
        .ensure_asset(&NewAsset::for_symbol("AAPL", AssetCategory::Stock))
        .unwrap();
    assert!(asset.last_updated.is_none());

    let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    store.touch_asset(&asset.id, at).unwrap();
    assert_eq!(store.find_asset("AAPL").unwrap().unwrap().last_updated, Some(at));
    assert!(store.touch_asset("missing", at).is_err());
}

#[test]
fn test_prices_are_isolated_per_asset() {
    let store = SqliteStore::open_in_memory().unwrap();
    let a = store
        .ensure_asset(&NewAsset::for_symbol("AAPL", AssetCategory::Stock))
        .unwrap();
    let b = store
        .ensure_asset(&NewAsset::for_symbol("MSFT", AssetCategory::Stock))
        .unwrap();
    store.upsert_prices(&observations(&a.id, 4, 10.0)).unwrap();
    store.upsert_prices(&observations(&b.id, 7, 10.0)).unwrap();

    assert_eq!(store.count_prices(&a.id).unwrap(), 4);
    assert_eq!(store.count_prices(&b.id).unwrap(), 7);
}
