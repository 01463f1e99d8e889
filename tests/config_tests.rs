use forecast_engine::Interval;
use owlcast::{AppConfig, ErrorKind, ProviderKind};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

// Environment variables are process-wide, so every layering check lives in one test.
#[test]
fn test_file_then_environment_layering() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("owlcast.toml");
    fs::write(
        &path,
        r#"
[workers]
size = 3

[database]
path = "/tmp/owlcast-test.db"

[provider]
kind = "csv"
csv_dir = "fixtures"

[forecast]
interval = "1mo"
periods = 6
"#,
    )
    .unwrap();

    let config = AppConfig::load(Some(path.as_path())).unwrap();
    assert_eq!(config.workers.size, 3);
    assert_eq!(config.database.path, PathBuf::from("/tmp/owlcast-test.db"));
    assert_eq!(config.provider.kind, ProviderKind::Csv);
    assert_eq!(config.provider.csv_dir, PathBuf::from("fixtures"));
    assert_eq!(config.forecast.interval, Interval::Monthly);
    assert_eq!(config.forecast.periods, 6);
    // untouched keys keep their defaults
    assert_eq!(config.forecast.lookback_window, 20);
    assert_eq!(config.log.filter, "info");

    std::env::set_var("OWLCAST__WORKERS__SIZE", "5");
    std::env::set_var("OWLCAST__LOG__FILTER", "debug");
    let config = AppConfig::load(Some(path.as_path())).unwrap();
    assert_eq!(config.workers.size, 5);
    assert_eq!(config.log.filter, "debug");

    std::env::set_var("OWLCAST__WORKERS__SIZE", "0");
    let err = AppConfig::load(Some(path.as_path())).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);

    std::env::remove_var("OWLCAST__WORKERS__SIZE");
    std::env::remove_var("OWLCAST__LOG__FILTER");

    let missing = dir.path().join("missing.toml");
    assert!(AppConfig::load(Some(missing.as_path())).is_err());

    // sequence training defaults are validated at load time
    let bad = dir.path().join("bad.toml");
    fs::write(&bad, "[forecast]\nbatch_size = 0\n").unwrap();
    let err = AppConfig::load(Some(bad.as_path())).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);
    assert!(err.to_string().contains("batch_size"));
}
