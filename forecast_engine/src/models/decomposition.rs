//! Additive trend + seasonality decomposition
//!
//! `y(t) = trend(t) + weekly(t) + yearly(t) + noise`, with a piecewise
//! linear trend whose slope may change at evenly spaced changepoints in the
//! first part of the history, and Fourier seasonal terms. All components
//! are fitted jointly by penalised least squares on max-abs-scaled prices;
//! the penalties play the role of priors (Laplace-like shrinkage on slope
//! changes, wide Gaussian on seasonal terms).
//!
//! The band is the model's own: future slope changes are simulated at the
//! historical changepoint rate and observation noise is added, then
//! empirical quantiles of the simulated paths are taken per step.

use crate::confidence::check_level;
use crate::data::PriceSeries;
use crate::error::{ForecastError, Result};
use crate::models::{check_periods, ForecastModel, ForecastResult, ModelInfo, TrainedForecastModel};
use crate::utils::{future_timestamps, round_all};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Normal;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use trade_math::{quantile, ridge_solve};

pub const MIN_SAMPLES: usize = 10;

const WEEK_DAYS: f64 = 7.0;
const YEAR_DAYS: f64 = 365.25;
const SECONDS_PER_DAY: f64 = 86_400.0;
/// Yearly terms are only fitted on histories at least this long
const YEARLY_MIN_SPAN_DAYS: f64 = 2.0 * YEAR_DAYS;
/// Assumed noise scale (scaled units) used to turn prior scales into penalties
const NOISE_PRIOR: f64 = 0.01;
const SEASONALITY_PRIOR: f64 = 10.0;
/// Design width is kept at or below `rows / ROWS_PER_COLUMN`
const ROWS_PER_COLUMN: usize = 2;
/// Lower bound on the noise scale, as a share of the observed price range
const SIGMA_RANGE_FLOOR: f64 = 0.05;

/// Settings for the decomposition model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecompositionParams {
    pub confidence_level: f64,
    pub n_changepoints: usize,
    /// Share of the history in which changepoints may be placed
    pub changepoint_range: f64,
    pub changepoint_prior_scale: f64,
    pub weekly_order: usize,
    pub yearly_order: usize,
    pub uncertainty_samples: usize,
    pub seed: u64,
}

impl Default for DecompositionParams {
    fn default() -> Self {
        Self {
            confidence_level: 0.95,
            n_changepoints: 25,
            changepoint_range: 0.8,
            changepoint_prior_scale: 0.05,
            weekly_order: 3,
            yearly_order: 10,
            uncertainty_samples: 1000,
            seed: 42,
        }
    }
}

/// Trend + seasonality forecaster
#[derive(Debug, Clone)]
pub struct DecompositionModel {
    name: String,
    params: DecompositionParams,
}

/// Column layout of the design matrix
#[derive(Debug, Clone)]
struct Layout {
    t0: f64,
    span: f64,
    changepoints: Vec<f64>,
    weekly_order: usize,
    yearly_order: usize,
}

fn day_number(ts: &DateTime<Utc>) -> f64 {
    ts.timestamp() as f64 / SECONDS_PER_DAY
}

fn push_fourier(row: &mut Vec<f64>, day: f64, period: f64, order: usize) {
    for k in 1..=order {
        let angle = 2.0 * PI * k as f64 * day / period;
        row.push(angle.sin());
        row.push(angle.cos());
    }
}

/// Highest Fourier order below the Nyquist limit of `step_days` sampling
fn resolvable_order(period: f64, step_days: f64, requested: usize) -> usize {
    let limit = (period / (2.0 * step_days.max(1.0))).ceil() as usize;
    requested.min(limit.saturating_sub(1))
}

impl Layout {
    fn scaled_time(&self, day: f64) -> f64 {
        (day - self.t0) / self.span
    }

    fn row(&self, day: f64) -> Vec<f64> {
        let s = self.scaled_time(day);
        let mut row = Vec::with_capacity(self.width());
        row.push(1.0);
        row.push(s);
        row.extend(self.changepoints.iter().map(|&c| (s - c).max(0.0)));
        push_fourier(&mut row, day, WEEK_DAYS, self.weekly_order);
        push_fourier(&mut row, day, YEAR_DAYS, self.yearly_order);
        row
    }

    fn width(&self) -> usize {
        2 + self.changepoints.len() + 2 * (self.weekly_order + self.yearly_order)
    }

    fn penalties(&self, params: &DecompositionParams) -> Vec<f64> {
        let noise = NOISE_PRIOR * NOISE_PRIOR;
        // Level and base slope are left free
        let mut penalties = vec![0.0; 2];
        penalties.extend(
            std::iter::repeat(noise / params.changepoint_prior_scale.powi(2)).take(self.changepoints.len()),
        );
        penalties.extend(
            std::iter::repeat(noise / (SEASONALITY_PRIOR * SEASONALITY_PRIOR))
                .take(2 * (self.weekly_order + self.yearly_order)),
        );
        penalties
    }
}

/// Trained decomposition model
#[derive(Debug, Clone)]
pub struct TrainedDecomposition {
    name: String,
    params: DecompositionParams,
    layout: Layout,
    coefficients: Vec<f64>,
    y_scale: f64,
    sigma: f64,
    mean_abs_delta: f64,
    changepoint_rate: f64,
    step_days: i64,
    last_timestamp: DateTime<Utc>,
}

impl DecompositionModel {
    /// Create a new decomposition model
    pub fn new(params: DecompositionParams) -> Result<Self> {
        check_level(params.confidence_level)?;
        if !(params.changepoint_range > 0.0 && params.changepoint_range <= 1.0) {
            return Err(ForecastError::ValidationError(
                "changepoint_range must lie in (0, 1]".to_string(),
            ));
        }
        if !(params.changepoint_prior_scale > 0.0) {
            return Err(ForecastError::ValidationError(
                "changepoint_prior_scale must be positive".to_string(),
            ));
        }
        if params.uncertainty_samples == 0 {
            return Err(ForecastError::ValidationError(
                "uncertainty_samples must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            name: "DecompositionModel".to_string(),
            params,
        })
    }

    /// Model at the given confidence with default settings
    pub fn with_confidence(confidence_level: f64) -> Result<Self> {
        Self::new(DecompositionParams {
            confidence_level,
            ..Default::default()
        })
    }

    fn layout(&self, days: &[f64], step_days: f64) -> Layout {
        let n = days.len();
        let t0 = days[0];
        let span = (days[n - 1] - t0).max(f64::EPSILON);

        // Intercept and slope, then at most half of the rest for seasonality
        let free = (n / ROWS_PER_COLUMN).max(2) - 2;
        let mut seasonal_columns = free / 2;
        let weekly_order = resolvable_order(WEEK_DAYS, step_days, self.params.weekly_order).min(seasonal_columns / 2);
        seasonal_columns -= 2 * weekly_order;
        let yearly_order = if span >= YEARLY_MIN_SPAN_DAYS {
            resolvable_order(YEAR_DAYS, step_days, self.params.yearly_order).min(seasonal_columns / 2)
        } else {
            0
        };

        // Evenly spaced over the first part of the history, excluding the origin
        let hist = ((n as f64 * self.params.changepoint_range).floor() as usize).max(1);
        let count = self
            .params
            .n_changepoints
            .min(hist.saturating_sub(1))
            .min(free - 2 * (weekly_order + yearly_order));
        let changepoints = (1..=count)
            .map(|j| {
                let idx = (j as f64 * (hist - 1) as f64 / count as f64).round() as usize;
                (days[idx] - t0) / span
            })
            .collect();

        Layout {
            t0,
            span,
            changepoints,
            weekly_order,
            yearly_order,
        }
    }
}

impl Default for DecompositionModel {
    fn default() -> Self {
        Self {
            name: "DecompositionModel".to_string(),
            params: DecompositionParams::default(),
        }
    }
}

impl ForecastModel for DecompositionModel {
    type Trained = TrainedDecomposition;

    fn train(&self, series: &PriceSeries) -> Result<Self::Trained> {
        series.require_len(MIN_SAMPLES)?;

        let days: Vec<f64> = series.timestamps().iter().map(day_number).collect();
        let step_days = series.infer_step_days();
        let layout = self.layout(&days, step_days as f64);

        let y_scale = series
            .closes()
            .iter()
            .fold(0.0f64, |acc, v| acc.max(v.abs()));
        let y_scale = if y_scale > 0.0 { y_scale } else { 1.0 };
        let target: Vec<f64> = series.closes().iter().map(|v| v / y_scale).collect();

        let design: Vec<Vec<f64>> = days.iter().map(|&d| layout.row(d)).collect();
        let coefficients = ridge_solve(&design, &target, &layout.penalties(&self.params))?;

        let residuals: Vec<f64> = design
            .iter()
            .zip(&target)
            .map(|(row, y)| y - dot(row, &coefficients))
            .collect();
        // Degrees-of-freedom corrected, floored so a near-interpolating fit keeps a usable band
        let dof = series.len().saturating_sub(layout.width()).max(1);
        let fitted_sigma = (residuals.iter().map(|r| r * r).sum::<f64>() / dof as f64).sqrt();
        let range_floor = (series.max_close() - series.min_close()) / y_scale * SIGMA_RANGE_FLOOR;
        let sigma = fitted_sigma.max(range_floor);

        let n_cp = layout.changepoints.len();
        let deltas = &coefficients[2..2 + n_cp];
        let mean_abs_delta = if n_cp > 0 {
            deltas.iter().map(|d| d.abs()).sum::<f64>() / n_cp as f64
        } else {
            0.0
        };

        tracing::debug!(
            changepoints = n_cp,
            weekly_order = layout.weekly_order,
            yearly_order = layout.yearly_order,
            residual_std = sigma * y_scale,
            "decomposition fitted"
        );

        Ok(TrainedDecomposition {
            name: self.name.clone(),
            params: self.params.clone(),
            changepoint_rate: n_cp as f64 / series.len() as f64,
            layout,
            coefficients,
            y_scale,
            sigma,
            mean_abs_delta,
            step_days,
            last_timestamp: series.last_timestamp(),
        })
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn min_samples(&self) -> usize {
        MIN_SAMPLES
    }

    fn info(&self) -> ModelInfo {
        ModelInfo::new(&self.name)
            .with("confidence_level", self.params.confidence_level)
            .with("weekly_seasonality", self.params.weekly_order > 0)
            .with("daily_seasonality", false)
            .with("is_fitted", false)
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Laplace(0, scale) draw by inverse CDF
fn sample_laplace(rng: &mut StdRng, scale: f64) -> f64 {
    let u: f64 = rng.gen_range(-0.5..0.5);
    let magnitude = (1.0 - 2.0 * u.abs()).max(f64::MIN_POSITIVE).ln();
    -scale * u.signum() * magnitude
}

impl TrainedDecomposition {
    /// In-sample residual standard deviation in price units
    pub fn residual_std(&self) -> f64 {
        self.sigma * self.y_scale
    }

    pub fn changepoint_count(&self) -> usize {
        self.layout.changepoints.len()
    }

    pub fn has_weekly(&self) -> bool {
        self.layout.weekly_order > 0
    }

    pub fn has_yearly(&self) -> bool {
        self.layout.yearly_order > 0
    }

    /// Columns in the fitted design
    pub fn parameter_count(&self) -> usize {
        self.layout.width()
    }

    /// Simulated scaled values, indexed `[sample][step]`
    fn simulate(&self, scaled_times: &[f64], point: &[f64]) -> Result<Vec<Vec<f64>>> {
        let mut rng = StdRng::seed_from_u64(self.params.seed);
        let noise = Normal::new(0.0, self.sigma)
            .map_err(|e| ForecastError::TrainingError(format!("Invalid noise scale: {}", e)))?;
        let last_s = self.layout.scaled_time(day_number(&self.last_timestamp));

        let mut paths = Vec::with_capacity(self.params.uncertainty_samples);
        for _ in 0..self.params.uncertainty_samples {
            let mut slope_change = 0.0;
            let mut offset = 0.0;
            let mut prev_s = last_s;
            let mut path = Vec::with_capacity(point.len());

            for (&s, &p) in scaled_times.iter().zip(point) {
                if self.mean_abs_delta > 0.0 && rng.gen::<f64>() < self.changepoint_rate {
                    slope_change += sample_laplace(&mut rng, self.mean_abs_delta);
                }
                offset += slope_change * (s - prev_s);
                prev_s = s;
                path.push(p + offset + rng.sample(&noise));
            }
            paths.push(path);
        }

        Ok(paths)
    }
}

impl TrainedForecastModel for TrainedDecomposition {
    fn forecast(&self, periods: usize) -> Result<ForecastResult> {
        check_periods(periods)?;

        let timestamps = future_timestamps(self.last_timestamp, periods, self.step_days);
        let days: Vec<f64> = timestamps.iter().map(day_number).collect();
        let scaled_times: Vec<f64> = days.iter().map(|&d| self.layout.scaled_time(d)).collect();
        let point: Vec<f64> = days
            .iter()
            .map(|&d| dot(&self.layout.row(d), &self.coefficients))
            .collect();

        let paths = self.simulate(&scaled_times, &point)?;
        let alpha = (1.0 - self.params.confidence_level) / 2.0;

        let mut lower = Vec::with_capacity(periods);
        let mut upper = Vec::with_capacity(periods);
        for (step, &p) in point.iter().enumerate() {
            let draws: Vec<f64> = paths.iter().map(|path| path[step]).collect();
            lower.push(quantile(&draws, alpha)?.min(p) * self.y_scale);
            upper.push(quantile(&draws, 1.0 - alpha)?.max(p) * self.y_scale);
        }
        let point: Vec<f64> = point.iter().map(|p| p * self.y_scale).collect();

        ForecastResult::new(
            timestamps,
            round_all(&point),
            round_all(&lower),
            round_all(&upper),
            self.params.confidence_level,
            self.info(),
        )
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn info(&self) -> ModelInfo {
        ModelInfo::new(&self.name)
            .with("confidence_level", self.params.confidence_level)
            .with("weekly_seasonality", self.has_weekly())
            .with("daily_seasonality", false)
            .with("yearly_seasonality", self.has_yearly())
            .with("changepoints", self.changepoint_count())
            .with("residual_std", self.residual_std())
            .with("is_fitted", true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_laplace_is_symmetric() {
        let mut rng = StdRng::seed_from_u64(1);
        let draws: Vec<f64> = (0..20_000).map(|_| sample_laplace(&mut rng, 0.5)).collect();
        let mean = draws.iter().sum::<f64>() / draws.len() as f64;
        let mean_abs = draws.iter().map(|d| d.abs()).sum::<f64>() / draws.len() as f64;

        assert!(mean.abs() < 0.05);
        // E|X| equals the scale for a Laplace distribution
        assert!((mean_abs - 0.5).abs() < 0.05);
    }

    #[test]
    fn test_layout_places_changepoints_early() {
        let model = DecompositionModel::default();
        let days: Vec<f64> = (0..100).map(|i| i as f64 * 7.0).collect();
        let layout = model.layout(&days, 7.0);

        assert_eq!(layout.changepoints.len(), 25);
        assert!(layout.changepoints.iter().all(|&c| c > 0.0 && c <= 0.8));
        assert_eq!(layout.yearly_order, 0);
        // weekly terms alias at a weekly step
        assert_eq!(layout.weekly_order, 0);
        assert_eq!(layout.row(days[3]).len(), layout.width());
    }

    #[test]
    fn test_daily_history_keeps_weekly_terms() {
        let model = DecompositionModel::default();
        let days: Vec<f64> = (0..100).map(|i| i as f64).collect();
        assert_eq!(model.layout(&days, 1.0).weekly_order, 3);
    }

    #[test]
    fn test_resolvable_order_stops_below_nyquist() {
        assert_eq!(resolvable_order(WEEK_DAYS, 1.0, 3), 3);
        assert_eq!(resolvable_order(WEEK_DAYS, 7.0, 3), 0);
        assert_eq!(resolvable_order(YEAR_DAYS, 7.0, 10), 10);
        assert_eq!(resolvable_order(YEAR_DAYS, 31.0, 10), 5);
    }

    #[test]
    fn test_monthly_layout_stays_narrow() {
        let model = DecompositionModel::default();
        let days: Vec<f64> = (0..26).map(|i| i as f64 * 30.4).collect();
        let layout = model.layout(&days, 30.0);

        assert!(layout.width() <= 13);
        assert_eq!(layout.weekly_order, 0);
        assert!(layout.yearly_order > 0);
    }

    #[test]
    fn test_short_history_caps_changepoints() {
        let model = DecompositionModel::default();
        let days: Vec<f64> = (0..10).map(|i| i as f64 * 30.0).collect();
        assert_eq!(model.layout(&days, 30.0).changepoints.len(), 3);
    }
}
