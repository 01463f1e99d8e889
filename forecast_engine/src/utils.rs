//! Utility functions for the forecast_engine crate

use chrono::{DateTime, Duration, Months, Utc};
use std::ops::RangeInclusive;

pub use trade_math::round_to;

/// Decimal places kept in every forecast value
pub const OUTPUT_DECIMALS: i32 = 4;

/// Inferred steps treated as calendar months
pub const MONTHLY_STEP_DAYS: RangeInclusive<i64> = 28..=31;

/// Timestamps `last + i * step_days` for `i` in `1..=horizon`.
///
/// Month-sized steps advance by calendar months so the forecast stays on the
/// same day-of-month grid as monthly history.
pub fn future_timestamps(last_timestamp: DateTime<Utc>, horizon: usize, step_days: i64) -> Vec<DateTime<Utc>> {
    let step = Duration::days(step_days.max(1));
    let monthly = MONTHLY_STEP_DAYS.contains(&step_days);
    (1..=horizon as u32)
        .map(|i| {
            let by_days = last_timestamp + step * i as i32;
            if monthly {
                last_timestamp.checked_add_months(Months::new(i)).unwrap_or(by_days)
            } else {
                by_days
            }
        })
        .collect()
}

/// Round every value to the output precision
pub fn round_all(values: &[f64]) -> Vec<f64> {
    values.iter().map(|&v| round_to(v, OUTPUT_DECIMALS)).collect()
}
