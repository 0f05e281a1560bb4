// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Full discrete convolution and its multi-channel sum.

use crate::matrix::Matrix;
use crate::report::{CscError, CscResult};

/// Full convolution of `a` and `b` (length `a.len() + b.len() - 1`).
///
/// Returns an empty vector when either input is empty.
pub fn convolve(a: &[f64], b: &[f64]) -> Vec<f64> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let mut out = vec![0.0; a.len() + b.len() - 1];
    convolve_into(a, b, &mut out);
    out
}

/// Overwrites `out` with the full convolution of `a` and `b`.
fn convolve_into(a: &[f64], b: &[f64], out: &mut [f64]) {
    debug_assert_eq!(out.len() + 1, a.len() + b.len());
    out.fill(0.0);
    for (i, &x) in a.iter().enumerate() {
        // Position vectors are mostly zero after projection.
        if x == 0.0 {
            continue;
        }
        for (acc, &y) in out[i..i + b.len()].iter_mut().zip(b) {
            *acc += x * y;
        }
    }
}

/// Sums the full convolutions of matching columns of `a` and `b`.
///
/// `a` is `Na × W`, `b` is `Nb × W`; the result has length `Na + Nb − 1`.
/// Per-column convolutions are always added in column order, so the parallel
/// build produces the same bits as the sequential one.
pub fn multiconv(a: &Matrix, b: &Matrix) -> CscResult<Vec<f64>> {
    if a.cols() != b.cols() {
        return Err(CscError::ShapeMismatch {
            left: a.shape(),
            right: b.shape(),
        });
    }
    let len = a.rows() + b.rows() - 1;
    let mut out = vec![0.0; len];

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;

        if crate::ops::should_parallelise(a.rows().max(b.rows()), a.cols()) {
            let partials: Vec<Vec<f64>> = a
                .columns()
                .zip(b.columns())
                .collect::<Vec<_>>()
                .into_par_iter()
                .map(|(col_a, col_b)| convolve(col_a, col_b))
                .collect();
            for partial in &partials {
                accumulate(&mut out, partial);
            }
            return Ok(out);
        }
    }

    let mut scratch = vec![0.0; len];
    for (col_a, col_b) in a.columns().zip(b.columns()) {
        convolve_into(col_a, col_b, &mut scratch);
        accumulate(&mut out, &scratch);
    }
    Ok(out)
}

#[inline]
fn accumulate(out: &mut [f64], partial: &[f64]) {
    for (acc, value) in out.iter_mut().zip(partial) {
        *acc += value;
    }
}

/// Cross-correlation of `signal` with `kernel` over the lags where the
/// kernel lies fully inside the signal:
/// `out[t] = Σ_s signal[t + s] · kernel[s]`, length `signal.len() − kernel.len() + 1`.
///
/// Costs `O(nnz(kernel) · out.len())`; zero kernel taps are skipped.
pub fn correlate_valid(signal: &[f64], kernel: &[f64]) -> CscResult<Vec<f64>> {
    if kernel.is_empty() || kernel.len() > signal.len() {
        return Err(CscError::ShapeMismatch {
            left: (signal.len(), 1),
            right: (kernel.len(), 1),
        });
    }
    let lags = signal.len() - kernel.len() + 1;
    let mut out = vec![0.0; lags];
    for (s, &tap) in kernel.iter().enumerate() {
        if tap == 0.0 {
            continue;
        }
        for (acc, &x) in out.iter_mut().zip(&signal[s..s + lags]) {
            *acc += tap * x;
        }
    }
    Ok(out)
}
