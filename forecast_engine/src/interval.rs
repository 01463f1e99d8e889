//! Sampling intervals, minimum-sample policy and horizon labels

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sampling cadence of cached price observations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Interval {
    #[default]
    #[serde(rename = "1wk")]
    Weekly,
    #[serde(rename = "1mo")]
    Monthly,
}

impl Interval {
    /// Wire code used by market-data providers
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Weekly => "1wk",
            Interval::Monthly => "1mo",
        }
    }

    pub fn policy(&self) -> IntervalPolicy {
        IntervalPolicy::for_interval(*self)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "1wk" => Ok(Interval::Weekly),
            "1mo" => Ok(Interval::Monthly),
            other => Err(ForecastError::ValidationError(format!(
                "Unsupported interval '{}': expected 1wk or 1mo",
                other
            ))),
        }
    }
}

/// Minimum sample count and unit labels for one interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalPolicy {
    pub interval: Interval,
    pub min_samples: usize,
    pub label_singular: &'static str,
    pub label_plural: &'static str,
}

impl IntervalPolicy {
    pub const WEEKLY: IntervalPolicy = IntervalPolicy {
        interval: Interval::Weekly,
        min_samples: 52,
        label_singular: "week",
        label_plural: "weeks",
    };

    pub const MONTHLY: IntervalPolicy = IntervalPolicy {
        interval: Interval::Monthly,
        min_samples: 24,
        label_singular: "month",
        label_plural: "months",
    };

    pub fn for_interval(interval: Interval) -> Self {
        match interval {
            Interval::Weekly => Self::WEEKLY,
            Interval::Monthly => Self::MONTHLY,
        }
    }

    /// Unit label, singular only for exactly one period
    pub fn unit(&self, periods: usize) -> &'static str {
        if periods == 1 {
            self.label_singular
        } else {
            self.label_plural
        }
    }

    /// Gate a series length against the interval minimum
    pub fn validate(&self, series_length: usize) -> Result<()> {
        if series_length < self.min_samples {
            return Err(ForecastError::insufficient(
                self.min_samples,
                series_length,
                self.label_plural,
            ));
        }
        Ok(())
    }
}

/// Check `series_length` against the minimum for `interval`
pub fn validate(series_length: usize, interval: Interval) -> Result<()> {
    IntervalPolicy::for_interval(interval).validate(series_length)
}

fn years_phrase(years: f64) -> String {
    let suffix = if years >= 2.0 { "s" } else { "" };
    format!("~{:.1} year{} ahead", years, suffix)
}

fn months_phrase(months: usize) -> String {
    let suffix = if months != 1 { "s" } else { "" };
    format!("~{} month{} ahead", months, suffix)
}

/// Human-readable horizon, e.g. `"8 weeks (~2 months ahead)"`
pub fn horizon_label(periods: usize, interval: Interval) -> String {
    let policy = IntervalPolicy::for_interval(interval);
    let unit = policy.unit(periods);

    let approx = match interval {
        Interval::Weekly => {
            let months = (periods as f64 / 4.33).round_ties_even() as usize;
            if months >= 12 {
                years_phrase(months as f64 / 12.0)
            } else if months >= 1 {
                months_phrase(months)
            } else {
                "~days ahead".to_string()
            }
        }
        Interval::Monthly => {
            if periods >= 12 {
                years_phrase(periods as f64 / 12.0)
            } else {
                months_phrase(periods)
            }
        }
    };

    format!("{} {} ({})", periods, unit, approx)
}
