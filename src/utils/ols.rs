//! Ordinary least squares for exogenous regressor coefficients.

use crate::error::{AnalysisError, Result};

/// Fitted `y = intercept + Σ coefficients[j] · x_j`.
#[derive(Debug, Clone, PartialEq)]
pub struct OlsFit {
    pub intercept: f64,
    /// One coefficient per regressor column, in input order.
    pub coefficients: Vec<f64>,
}

/// Fit OLS with an intercept by solving the normal equations.
///
/// `columns` holds one slice per regressor, each as long as `y`. With no
/// columns the intercept is the mean of `y`.
pub fn ols_fit(y: &[f64], columns: &[&[f64]]) -> Result<OlsFit> {
    let n = y.len();
    if n == 0 {
        return Err(AnalysisError::InsufficientData { needed: 1, got: 0 });
    }
    if let Some(col) = columns.iter().find(|c| c.len() != n) {
        return Err(AnalysisError::DimensionMismatch {
            expected: n,
            got: col.len(),
        });
    }

    let k = columns.len() + 1;
    let mut xtx = vec![vec![0.0; k]; k];
    let mut xty = vec![0.0; k];
    let mut row = vec![1.0; k];

    for obs in 0..n {
        for (j, col) in columns.iter().enumerate() {
            row[j + 1] = col[obs];
        }
        for i in 0..k {
            xty[i] += row[i] * y[obs];
            for j in 0..=i {
                xtx[i][j] += row[i] * row[j];
            }
        }
    }
    for i in 0..k {
        for j in 0..i {
            xtx[j][i] = xtx[i][j];
        }
        // Ridge term keeps near-collinear designs solvable.
        xtx[i][i] += 1e-8;
    }

    let beta = cholesky_solve(&xtx, &xty).ok_or_else(|| {
        AnalysisError::ModelFit("regressor design matrix is not positive definite".to_string())
    })?;

    Ok(OlsFit {
        intercept: beta[0],
        coefficients: beta[1..].to_vec(),
    })
}

/// Solve `A x = b` for symmetric positive definite `A`.
fn cholesky_solve(a: &[Vec<f64>], b: &[f64]) -> Option<Vec<f64>> {
    let n = b.len();
    let mut l = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..=i {
            let sum = a[i][j] - (0..j).map(|k| l[i][k] * l[j][k]).sum::<f64>();
            if i == j {
                if sum <= 0.0 || !sum.is_finite() {
                    return None;
                }
                l[i][j] = sum.sqrt();
            } else {
                l[i][j] = sum / l[j][j];
            }
        }
    }

    let mut z = vec![0.0; n];
    for i in 0..n {
        z[i] = (b[i] - (0..i).map(|j| l[i][j] * z[j]).sum::<f64>()) / l[i][i];
    }
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        x[i] = (z[i] - ((i + 1)..n).map(|j| l[j][i] * x[j]).sum::<f64>()) / l[i][i];
    }
    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn ols_fit_simple_linear() {
        // y = 2 + 3*x
        let y = [5.0, 8.0, 11.0, 14.0, 17.0];
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];

        let fit = ols_fit(&y, &[&x]).unwrap();
        assert_relative_eq!(fit.intercept, 2.0, epsilon = 1e-6);
        assert_relative_eq!(fit.coefficients[0], 3.0, epsilon = 1e-6);
    }

    #[test]
    fn ols_fit_multiple_regressors() {
        let x1 = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let x2 = [0.5, 2.5, 1.0, 3.0, 1.5, 3.5, 2.0, 4.0];
        let y: Vec<f64> = x1
            .iter()
            .zip(&x2)
            .map(|(a, b)| 1.0 + 2.0 * a + 3.0 * b)
            .collect();

        let fit = ols_fit(&y, &[&x1, &x2]).unwrap();
        assert_relative_eq!(fit.intercept, 1.0, epsilon = 1e-4);
        assert_relative_eq!(fit.coefficients[0], 2.0, epsilon = 1e-4);
        assert_relative_eq!(fit.coefficients[1], 3.0, epsilon = 1e-4);
    }

    #[test]
    fn ols_fit_no_regressors_is_mean() {
        let fit = ols_fit(&[2.0, 4.0, 6.0, 8.0, 10.0], &[]).unwrap();
        assert_relative_eq!(fit.intercept, 6.0, epsilon = 1e-6);
        assert!(fit.coefficients.is_empty());
    }

    #[test]
    fn ols_fit_dimension_mismatch() {
        let err = ols_fit(&[1.0, 2.0, 3.0], &[&[1.0, 2.0]]).unwrap_err();
        assert_eq!(err, AnalysisError::DimensionMismatch { expected: 3, got: 2 });
        assert!(ols_fit(&[], &[]).is_err());
    }
}
