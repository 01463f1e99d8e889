//! Normal-theory confidence bands that widen with the horizon

use crate::error::{ForecastError, Result};
use statrs::distribution::{ContinuousCDF, Normal};

/// Reject confidence levels outside the open unit interval
pub fn check_level(confidence_level: f64) -> Result<()> {
    if !(confidence_level > 0.0 && confidence_level < 1.0) {
        return Err(ForecastError::ValidationError(format!(
            "Confidence level must be between 0 and 1, got {}",
            confidence_level
        )));
    }
    Ok(())
}

/// Two-tailed standard normal critical value for `confidence_level`
pub fn z_score(confidence_level: f64) -> Result<f64> {
    check_level(confidence_level)?;
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| ForecastError::ValidationError(e.to_string()))?;
    Ok(normal.inverse_cdf((1.0 + confidence_level) / 2.0))
}

/// Symmetric `(lower, upper)` bands around `points` at step-scaled width
///
/// Step `i` (1-indexed) gets margin `z * std * sqrt(i)`.
pub fn widening_bands(points: &[f64], residual_std: f64, confidence_level: f64) -> Result<(Vec<f64>, Vec<f64>)> {
    let z = z_score(confidence_level)?;
    let std = if residual_std.is_finite() { residual_std.max(0.0) } else { 0.0 };

    let (lower, upper) = points
        .iter()
        .enumerate()
        .map(|(i, &p)| {
            let margin = z * std * ((i + 1) as f64).sqrt();
            (p - margin, p + margin)
        })
        .unzip();

    Ok((lower, upper))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_z_scores() {
        assert_abs_diff_eq!(z_score(0.95).unwrap(), 1.959964, epsilon = 1e-5);
        assert_abs_diff_eq!(z_score(0.5).unwrap(), 0.674490, epsilon = 1e-5);
        assert!(z_score(1.0).is_err());
        assert!(z_score(0.0).is_err());
    }

    #[test]
    fn test_bands_widen() {
        let (lower, upper) = widening_bands(&[10.0, 10.0, 10.0], 1.0, 0.9).unwrap();
        let widths: Vec<f64> = upper.iter().zip(&lower).map(|(u, l)| u - l).collect();
        assert!(widths.windows(2).all(|w| w[1] >= w[0]));
        assert!(lower.iter().all(|&l| l <= 10.0));
    }
}
