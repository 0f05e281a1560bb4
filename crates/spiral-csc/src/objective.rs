// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Composite objective and its gradients.
//!
//! ```text
//! f(R, D) = ‖X − Σ_j R_j ∗ D_j‖²
//!         + λ_D · Σ_j Σ_i (D[i+1, j] − D[i, j])²
//!         + λ_R · Σ |R|
//! ```
//!
//! With `e = X − Σ_j R_j ∗ D_j`, the data term contributes
//! `−2 · corr(e, D_j)` to `∂f/∂R_j` and `−2 · corr(e, R_j)` to `∂f/∂D_j`,
//! where `corr` keeps only fully overlapping lags. The sparsity term adds the
//! constant `λ_R` (positions are kept non-negative).

use crate::convolution::{correlate_valid, multiconv};
use crate::matrix::Matrix;
use crate::ops;
use crate::report::{CscError, CscResult, ObjectiveBreakdown};

/// Sum of squared first differences down every column of `features`.
pub fn smoothness_penalty(features: &Matrix) -> f64 {
    features.columns().map(ops::squared_differences).sum()
}

/// Sum of absolute values of `positions`.
pub fn sparsity_penalty(positions: &Matrix) -> f64 {
    positions.l1_norm()
}

/// `Σ_j R_j ∗ D_j`, of length `rows(R) + rows(D) − 1`.
pub fn reconstruct(positions: &Matrix, features: &Matrix) -> CscResult<Vec<f64>> {
    multiconv(positions, features)
}

/// `X − Σ_j R_j ∗ D_j`.
pub fn residual(signal: &[f64], positions: &Matrix, features: &Matrix) -> CscResult<Vec<f64>> {
    let reconstruction = reconstruct(positions, features)?;
    if reconstruction.len() != signal.len() {
        return Err(CscError::DataLength {
            expected: signal.len(),
            got: reconstruction.len(),
        });
    }
    Ok(signal
        .iter()
        .zip(reconstruction)
        .map(|(x, r)| x - r)
        .collect())
}

/// Evaluates the objective from a precomputed residual.
pub fn evaluate(
    residual: &[f64],
    positions: &Matrix,
    features: &Matrix,
    lambda_d_smooth: f64,
    lambda_r_sparse: f64,
) -> ObjectiveBreakdown {
    ObjectiveBreakdown::new(
        ops::sum_squares(residual),
        smoothness_penalty(features),
        sparsity_penalty(positions),
        lambda_d_smooth,
        lambda_r_sparse,
    )
}

/// Gradients of the smooth objective with respect to both factors.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradients {
    pub positions: Matrix,
    pub features: Matrix,
}

/// Computes `∂f/∂R` and `∂f/∂D` column by column.
pub fn gradients(
    residual: &[f64],
    positions: &Matrix,
    features: &Matrix,
    lambda_d_smooth: f64,
    lambda_r_sparse: f64,
) -> CscResult<Gradients> {
    if positions.cols() != features.cols() {
        return Err(CscError::ShapeMismatch {
            left: positions.shape(),
            right: features.shape(),
        });
    }

    let column = |j: usize| {
        column_gradients(
            residual,
            positions.column(j),
            features.column(j),
            lambda_d_smooth,
            lambda_r_sparse,
        )
    };

    #[cfg(feature = "parallel")]
    let per_column: Vec<(Vec<f64>, Vec<f64>)> = {
        use rayon::prelude::*;

        if ops::should_parallelise(residual.len(), positions.cols()) {
            (0..positions.cols())
                .into_par_iter()
                .map(column)
                .collect::<CscResult<_>>()?
        } else {
            (0..positions.cols()).map(column).collect::<CscResult<_>>()?
        }
    };
    #[cfg(not(feature = "parallel"))]
    let per_column: Vec<(Vec<f64>, Vec<f64>)> =
        (0..positions.cols()).map(column).collect::<CscResult<_>>()?;

    let mut grad_r = Vec::with_capacity(positions.len());
    let mut grad_d = Vec::with_capacity(features.len());
    for (r, d) in per_column {
        grad_r.extend(r);
        grad_d.extend(d);
    }
    Ok(Gradients {
        positions: Matrix::from_column_major(positions.rows(), positions.cols(), grad_r)?,
        features: Matrix::from_column_major(features.rows(), features.cols(), grad_d)?,
    })
}

fn column_gradients(
    residual: &[f64],
    position: &[f64],
    feature: &[f64],
    lambda_d_smooth: f64,
    lambda_r_sparse: f64,
) -> CscResult<(Vec<f64>, Vec<f64>)> {
    let mut grad_r = correlate_valid(residual, feature)?;
    for value in grad_r.iter_mut() {
        *value = -2.0 * *value + lambda_r_sparse;
    }

    let mut grad_d = correlate_valid(residual, position)?;
    for value in grad_d.iter_mut() {
        *value *= -2.0;
    }
    if lambda_d_smooth > 0.0 {
        ops::accumulate_difference_gradient(feature, lambda_d_smooth, &mut grad_d);
    }
    Ok((grad_r, grad_d))
}
