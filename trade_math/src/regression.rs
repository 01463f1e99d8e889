//! Penalised linear least squares
//!
//! Solves `(XᵀX + diag(λ)) β = Xᵀy` with a Cholesky factorisation. Used by
//! the decomposition model to fit trend and seasonal terms together.

use crate::{MathError, Result};

/// Fit ridge coefficients for a row-major design matrix
///
/// `penalties` holds one λ per column; zero leaves a column unpenalised.
pub fn ridge_solve(design: &[Vec<f64>], target: &[f64], penalties: &[f64]) -> Result<Vec<f64>> {
    if design.is_empty() {
        return Err(MathError::InsufficientData(
            "Design matrix has no rows".to_string(),
        ));
    }
    if design.len() != target.len() {
        return Err(MathError::InvalidInput(format!(
            "Design matrix has {} rows but target has {} values",
            design.len(),
            target.len()
        )));
    }

    let cols = penalties.len();
    if design.iter().any(|row| row.len() != cols) {
        return Err(MathError::InvalidInput(format!(
            "Every design row must have {} columns",
            cols
        )));
    }

    // Normal equations
    let mut gram = vec![vec![0.0; cols]; cols];
    let mut rhs = vec![0.0; cols];
    for (row, &y) in design.iter().zip(target) {
        for i in 0..cols {
            rhs[i] += row[i] * y;
            for j in 0..=i {
                gram[i][j] += row[i] * row[j];
            }
        }
    }
    for i in 0..cols {
        for j in 0..i {
            gram[j][i] = gram[i][j];
        }
        gram[i][i] += penalties[i];
    }

    cholesky_solve(gram, rhs)
}

/// Solve `A x = b` for a symmetric positive definite `A`
pub fn cholesky_solve(a: Vec<Vec<f64>>, b: Vec<f64>) -> Result<Vec<f64>> {
    let n = b.len();
    let mut l = vec![vec![0.0; n]; n];

    for i in 0..n {
        for j in 0..=i {
            let sum: f64 = (0..j).map(|k| l[i][k] * l[j][k]).sum();
            if i == j {
                let diag = a[i][i] - sum;
                if !diag.is_finite() || diag <= 1e-10 * a[i][i].abs() {
                    return Err(MathError::CalculationError(
                        "Matrix is not positive definite".to_string(),
                    ));
                }
                l[i][j] = diag.sqrt();
            } else {
                l[i][j] = (a[i][j] - sum) / l[j][j];
            }
        }
    }

    // Forward substitution: L z = b
    let mut z = vec![0.0; n];
    for i in 0..n {
        let sum: f64 = (0..i).map(|k| l[i][k] * z[k]).sum();
        z[i] = (b[i] - sum) / l[i][i];
    }

    // Back substitution: Lᵀ x = z
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let sum: f64 = (i + 1..n).map(|k| l[k][i] * x[k]).sum();
        x[i] = (z[i] - sum) / l[i][i];
    }

    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_recovers_exact_line() {
        let design: Vec<Vec<f64>> = (0..10).map(|i| vec![1.0, i as f64]).collect();
        let target: Vec<f64> = (0..10).map(|i| 3.0 + 2.0 * i as f64).collect();

        let beta = ridge_solve(&design, &target, &[0.0, 0.0]).unwrap();
        assert_relative_eq!(beta[0], 3.0, epsilon = 1e-9);
        assert_relative_eq!(beta[1], 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_penalty_shrinks_coefficient() {
        let design: Vec<Vec<f64>> = (0..10).map(|i| vec![1.0, i as f64]).collect();
        let target: Vec<f64> = (0..10).map(|i| 2.0 * i as f64).collect();

        let free = ridge_solve(&design, &target, &[0.0, 0.0]).unwrap();
        let shrunk = ridge_solve(&design, &target, &[0.0, 1000.0]).unwrap();
        assert!(shrunk[1].abs() < free[1].abs());
    }

    #[test]
    fn test_singular_system_fails() {
        let design = vec![vec![1.0, 1.0], vec![1.0, 1.0]];
        assert!(ridge_solve(&design, &[1.0, 1.0], &[0.0, 0.0]).is_err());
    }

    #[test]
    fn test_shape_mismatch() {
        let design = vec![vec![1.0, 2.0]];
        assert!(ridge_solve(&design, &[1.0, 2.0], &[0.0, 0.0]).is_err());
        assert!(ridge_solve(&design, &[1.0], &[0.0]).is_err());
    }
}
