use chrono::{DateTime, Duration, Months, TimeZone, Utc};
use forecast_engine::models::decomposition::{DecompositionModel, DecompositionParams};
use forecast_engine::models::sequence::{NetworkConfig, SequenceBackend, SequenceRegressor};
use forecast_engine::models::{BaselineModel, SequenceModel, SequenceParams};
use forecast_engine::{
    Capabilities, Forecast, ForecastError, ForecastModel, Forecaster, PricePoint, PriceSeries,
    TrainedForecastModel,
};
use rstest::rstest;
use std::sync::Arc;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 1, 6, 0, 0, 0).unwrap()
}

fn weekly_series(n: usize) -> PriceSeries {
    let points = (0..n)
        .map(|i| {
            let t = i as f64;
            let close = 100.0 + 0.4 * t + 3.0 * (t / 3.0).sin();
            PricePoint::new(start() + Duration::weeks(i as i64), close)
        })
        .collect();
    PriceSeries::new(points).unwrap()
}

/// Predicts the last value of the window
#[derive(Debug)]
struct Persistence;

impl SequenceRegressor for Persistence {
    fn fit(&mut self, _windows: &[Vec<f64>], _targets: &[f64]) -> forecast_engine::Result<f64> {
        Ok(0.0)
    }

    fn predict(&self, window: &[f64]) -> forecast_engine::Result<f64> {
        Ok(window[window.len() - 1])
    }
}

#[derive(Debug)]
struct PersistenceBackend;

impl SequenceBackend for PersistenceBackend {
    fn name(&self) -> &str {
        "persistence"
    }

    fn build(&self, _config: &NetworkConfig) -> forecast_engine::Result<Box<dyn SequenceRegressor>> {
        Ok(Box::new(Persistence))
    }
}

fn stub_capabilities() -> Capabilities {
    Capabilities::none().with_sequence_backend(Arc::new(PersistenceBackend))
}

fn sequence_params(confidence_level: f64) -> SequenceParams {
    SequenceParams {
        lookback_window: 10,
        epochs: 10,
        confidence_level,
        ..Default::default()
    }
}

fn build(kind: &str, confidence_level: f64) -> Box<dyn Forecast> {
    match kind {
        "base" => Box::new(Forecaster::new(BaselineModel::new(20, confidence_level).unwrap())),
        "sequence" => Box::new(Forecaster::new(
            SequenceModel::new(sequence_params(confidence_level), &stub_capabilities()).unwrap(),
        )),
        "decomposition" => Box::new(Forecaster::new(
            DecompositionModel::with_confidence(confidence_level).unwrap(),
        )),
        other => panic!("unknown model {}", other),
    }
}

#[rstest]
fn test_band_contains_point(
    #[values("base", "sequence", "decomposition")] kind: &str,
    #[values(0.5, 0.8, 0.95, 0.99)] confidence_level: f64,
) {
    let series = weekly_series(80);
    let mut model = build(kind, confidence_level);
    model.fit(&series).unwrap();
    let forecast = model.forecast(8).unwrap();

    assert_eq!(forecast.len(), 8);
    assert_eq!(forecast.confidence_level(), confidence_level);
    for i in 0..forecast.len() {
        assert!(forecast.lower()[i] <= forecast.point()[i]);
        assert!(forecast.point()[i] <= forecast.upper()[i]);
    }
}

#[rstest]
#[case("base")]
#[case("sequence")]
fn test_band_widens_with_horizon(#[case] kind: &str) {
    let series = weekly_series(80);
    let mut model = build(kind, 0.95);
    model.fit(&series).unwrap();
    let forecast = model.forecast(12).unwrap();

    let widths: Vec<f64> = forecast
        .upper()
        .iter()
        .zip(forecast.lower())
        .map(|(u, l)| u - l)
        .collect();
    // Allow for rounding to 4 decimals
    assert!(widths.windows(2).all(|w| w[1] >= w[0] - 1e-4));
}

#[rstest]
#[case("base")]
#[case("sequence")]
#[case("decomposition")]
fn test_timestamps_follow_sampling_step(#[case] kind: &str) {
    let series = weekly_series(60);
    let mut model = build(kind, 0.95);
    model.fit(&series).unwrap();
    let forecast = model.forecast(5).unwrap();

    let mut previous = series.last_timestamp();
    for ts in forecast.timestamps() {
        assert_eq!(*ts - previous, Duration::days(7));
        previous = *ts;
    }
}

#[rstest]
#[case("base")]
#[case("sequence")]
#[case("decomposition")]
fn test_forecast_before_fit_fails(#[case] kind: &str) {
    let model = build(kind, 0.95);
    assert!(!model.is_fitted());
    assert!(matches!(model.forecast(4), Err(ForecastError::NotFitted(_))));
}

#[test]
fn test_baseline_projection_is_flat() {
    let series = weekly_series(60);
    let trained = BaselineModel::new(20, 0.95).unwrap().train(&series).unwrap();
    let forecast = trained.forecast(10).unwrap();

    let first = forecast.point()[0];
    assert!(forecast.point().iter().all(|&p| p == first));
    assert!(trained.residual_std() > 0.0);
    assert_eq!(trained.step_days(), 7);
}

#[test]
fn test_baseline_requires_span_samples() {
    let series = weekly_series(10);
    let err = BaselineModel::new(20, 0.95).unwrap().train(&series).unwrap_err();
    assert!(matches!(
        err,
        ForecastError::InsufficientData { minimum: 20, actual: 10, .. }
    ));
}

#[test]
fn test_lifecycle_is_single_use() {
    let series = weekly_series(60);
    let mut model = Forecaster::new(BaselineModel::default());
    model.fit(&series).unwrap();
    assert!(model.is_fitted());

    // Refit on the same instance is rejected
    assert!(matches!(model.fit(&series), Err(ForecastError::NotFitted(_))));

    let mut failed = Forecaster::new(BaselineModel::default());
    assert!(failed.fit(&weekly_series(5)).is_err());
    assert!(matches!(failed.forecast(3), Err(ForecastError::NotFitted(_))));
}

#[test]
fn test_sequence_requires_backend() {
    let err = SequenceModel::new(SequenceParams::default(), &Capabilities::none()).unwrap_err();
    assert!(matches!(err, ForecastError::UnsupportedCapability(_)));
}

#[test]
fn test_sequence_minimum_length() {
    let model = SequenceModel::new(sequence_params(0.95), &stub_capabilities()).unwrap();
    assert_eq!(model.min_samples(), 11);

    let err = model.train(&weekly_series(10)).unwrap_err();
    assert!(matches!(err, ForecastError::InsufficientData { minimum: 11, .. }));
}

#[test]
fn test_sequence_without_training_windows() {
    // One window, and a validation fraction that leaves none for training
    let params = SequenceParams {
        validation_fraction: 0.5,
        ..sequence_params(0.95)
    };
    let model = SequenceModel::new(params, &stub_capabilities()).unwrap();
    let err = model.train(&weekly_series(11)).unwrap_err();
    assert!(matches!(err, ForecastError::InsufficientData { actual: 0, .. }));
}

#[test]
fn test_sequence_range_fallback_without_validation() {
    let params = SequenceParams {
        validation_fraction: 0.0,
        ..sequence_params(0.95)
    };
    let series = weekly_series(40);
    let trained = SequenceModel::new(params, &stub_capabilities())
        .unwrap()
        .train(&series)
        .unwrap();

    let expected = (series.max_close() - series.min_close()) * 0.05;
    assert!((trained.val_residual_std() - expected).abs() < 1e-9);
}

#[test]
fn test_sequence_iterates_on_own_predictions() {
    let series = weekly_series(40);
    let trained = SequenceModel::new(sequence_params(0.9), &stub_capabilities())
        .unwrap()
        .train(&series)
        .unwrap();
    let forecast = trained.forecast(4).unwrap();

    // Persistence repeats the last observed close
    let last = series.closes()[series.len() - 1];
    for p in forecast.point() {
        assert!((p - last).abs() < 1e-3);
    }
}

#[test]
fn test_decomposition_follows_trend() {
    let points = (0..104)
        .map(|i| PricePoint::new(start() + Duration::weeks(i), 50.0 + 0.5 * i as f64))
        .collect();
    let series = PriceSeries::new(points).unwrap();

    let trained = DecompositionModel::default().train(&series).unwrap();
    let forecast = trained.forecast(4).unwrap();

    // Continues upward from the last value (101.5)
    assert!(forecast.point()[0] > 100.0);
    assert!(forecast.point()[3] > forecast.point()[0]);
    assert!(trained.changepoint_count() > 0);
}

fn monthly_series(n: usize) -> PriceSeries {
    let points = (0..n)
        .map(|i| {
            let t = i as f64;
            let jitter = 0.3 * ((i * 7 % 5) as f64 - 2.0);
            let close = 100.0 + 2.0 * (2.0 * std::f64::consts::PI * t / 12.0).sin() + jitter;
            PricePoint::new(start() + Months::new(i as u32), close)
        })
        .collect();
    PriceSeries::new(points).unwrap()
}

#[rstest]
#[case(26)]
#[case(30)]
fn test_decomposition_on_monthly_history(#[case] n: usize) {
    let series = monthly_series(n);
    let (lo, hi) = (series.min_close(), series.max_close());
    let range = hi - lo;

    let trained = DecompositionModel::default().train(&series).unwrap();
    let forecast = trained.forecast(6).unwrap();

    assert!(!trained.has_weekly());
    assert!(trained.has_yearly());
    assert!(trained.parameter_count() <= n / 2);
    assert!(trained.residual_std() >= 0.05 * range - 1e-9);

    for i in 0..6 {
        let p = forecast.point()[i];
        assert!(p > lo - range && p < hi + range, "point {} = {} outside [{}, {}]", i, p, lo, hi);
        let width = forecast.upper()[i] - forecast.lower()[i];
        assert!(width >= trained.residual_std(), "band {} narrower than residual scale", i);
    }
    // calendar months, not fixed 30-day steps
    let last = series.last_timestamp();
    assert_eq!(forecast.timestamps()[0], last + Months::new(1));
    assert_eq!(forecast.timestamps()[5], last + Months::new(6));
}

#[test]
fn test_decomposition_rejects_short_series() {
    let err = DecompositionModel::default().train(&weekly_series(9)).unwrap_err();
    assert!(matches!(err, ForecastError::InsufficientData { minimum: 10, .. }));
}

#[test]
fn test_decomposition_is_reproducible() {
    let series = weekly_series(60);
    let model = DecompositionModel::new(DecompositionParams {
        uncertainty_samples: 200,
        ..Default::default()
    })
    .unwrap();

    let a = model.train(&series).unwrap().forecast(6).unwrap();
    let b = model.train(&series).unwrap().forecast(6).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_zero_periods_rejected() {
    let trained = BaselineModel::default().train(&weekly_series(30)).unwrap();
    assert!(matches!(trained.forecast(0), Err(ForecastError::ValidationError(_))));
}

#[cfg(feature = "sequence")]
#[test]
fn test_lstm_backend_is_deterministic() {
    let params = SequenceParams {
        lookback_window: 5,
        epochs: 10,
        batch_size: 8,
        recurrent_units: (8, 4),
        dense_units: 4,
        ..Default::default()
    };
    let series = weekly_series(40);
    let capabilities = Capabilities::probe();

    let run = || {
        SequenceModel::new(params.clone(), &capabilities)
            .unwrap()
            .train(&series)
            .unwrap()
            .forecast(3)
            .unwrap()
    };

    let first = run();
    let second = run();
    assert_eq!(first.point(), second.point());
    assert!(first.point().iter().all(|p| p.is_finite()));
}
