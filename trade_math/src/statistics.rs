//! Descriptive statistics over slices of `f64`

use crate::{MathError, Result};

/// Delta degrees of freedom used by [`std_dev`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ddof {
    /// Divide by `n`
    Population,
    /// Divide by `n - 1`
    Sample,
}

/// Arithmetic mean
pub fn mean(values: &[f64]) -> Result<f64> {
    if values.is_empty() {
        return Err(MathError::InsufficientData(
            "Cannot take the mean of an empty slice".to_string(),
        ));
    }
    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

/// Standard deviation with the requested estimator
pub fn std_dev(values: &[f64], ddof: Ddof) -> Result<f64> {
    let n = values.len();
    let divisor = match ddof {
        Ddof::Population if n >= 1 => n as f64,
        Ddof::Sample if n >= 2 => (n - 1) as f64,
        _ => {
            return Err(MathError::InsufficientData(format!(
                "Not enough values for standard deviation ({:?}): have {}",
                ddof, n
            )))
        }
    };

    let m = mean(values)?;
    let sum_sq: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Ok((sum_sq / divisor).sqrt())
}

/// Median; even-length input averages the two middle values
pub fn median(values: &[f64]) -> Result<f64> {
    if values.is_empty() {
        return Err(MathError::InsufficientData(
            "Cannot take the median of an empty slice".to_string(),
        ));
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Ok((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Ok(sorted[mid])
    }
}

/// Quantile with linear interpolation between closest ranks
pub fn quantile(values: &[f64], q: f64) -> Result<f64> {
    if values.is_empty() {
        return Err(MathError::InsufficientData(
            "Cannot take a quantile of an empty slice".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&q) {
        return Err(MathError::InvalidInput(format!(
            "Quantile must lie in [0, 1], got {}",
            q
        )));
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Ok(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[test]
    fn test_std_dev_estimators() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_relative_eq!(std_dev(&values, Ddof::Population).unwrap(), 2.0);
        assert_relative_eq!(
            std_dev(&values, Ddof::Sample).unwrap(),
            (32.0f64 / 7.0).sqrt()
        );
    }

    #[test]
    fn test_sample_std_needs_two_values() {
        assert!(std_dev(&[1.0], Ddof::Sample).is_err());
        assert_relative_eq!(std_dev(&[1.0], Ddof::Population).unwrap(), 0.0);
    }

    #[rstest]
    #[case(&[3.0, 1.0, 2.0], 2.0)]
    #[case(&[7.0, 7.0, 1.0, 8.0], 7.0)]
    #[case(&[7.0, 6.0], 6.5)]
    fn test_median(#[case] values: &[f64], #[case] expected: f64) {
        assert_relative_eq!(median(values).unwrap(), expected);
    }

    #[test]
    fn test_quantile_interpolates() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_relative_eq!(quantile(&values, 0.0).unwrap(), 1.0);
        assert_relative_eq!(quantile(&values, 0.5).unwrap(), 3.0);
        assert_relative_eq!(quantile(&values, 0.125).unwrap(), 1.5);
        assert!(quantile(&values, 1.5).is_err());
    }
}
