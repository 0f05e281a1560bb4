// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Slice kernels shared by the matrix, convolution and learner modules.

#[cfg(feature = "parallel")]
const PARALLEL_THRESHOLD: usize = 4096;

/// Returns `true` when column-wise work over `cols` columns of `rows`
/// entries is large enough to hand to rayon.
#[cfg(feature = "parallel")]
#[inline]
pub(crate) fn should_parallelise(rows: usize, cols: usize) -> bool {
    cols > 1 && rows.saturating_mul(cols) >= PARALLEL_THRESHOLD
}

#[inline]
pub(crate) fn sum_squares(values: &[f64]) -> f64 {
    let mut acc0 = 0.0f64;
    let mut acc1 = 0.0f64;

    let mut chunks = values.chunks_exact(4);
    for lanes in &mut chunks {
        acc0 = lanes[0].mul_add(lanes[0], acc0);
        acc1 = lanes[1].mul_add(lanes[1], acc1);
        acc0 = lanes[2].mul_add(lanes[2], acc0);
        acc1 = lanes[3].mul_add(lanes[3], acc1);
    }

    let mut acc = acc0 + acc1;
    for &value in chunks.remainder() {
        acc = value.mul_add(value, acc);
    }

    acc
}

#[inline]
pub(crate) fn l1_norm(values: &[f64]) -> f64 {
    values.iter().map(|v| v.abs()).sum()
}

#[inline]
pub(crate) fn all_finite(values: &[f64]) -> bool {
    values.iter().all(|v| v.is_finite())
}

/// Sum of squared first differences `Σ (x[i + 1] - x[i])²`.
#[inline]
pub(crate) fn squared_differences(values: &[f64]) -> f64 {
    values
        .windows(2)
        .map(|pair| {
            let delta = pair[1] - pair[0];
            delta * delta
        })
        .sum()
}

/// Accumulates `scale * ∂/∂x Σ (x[i + 1] - x[i])²` into `grad`.
pub(crate) fn accumulate_difference_gradient(values: &[f64], scale: f64, grad: &mut [f64]) {
    debug_assert_eq!(values.len(), grad.len());
    for (i, pair) in values.windows(2).enumerate() {
        let delta = 2.0 * scale * (pair[1] - pair[0]);
        grad[i] -= delta;
        grad[i + 1] += delta;
    }
}

/// Clamps every entry to be at least zero.
#[inline]
pub(crate) fn clamp_non_negative(values: &mut [f64]) {
    for value in values.iter_mut() {
        if *value < 0.0 {
            *value = 0.0;
        }
    }
}
