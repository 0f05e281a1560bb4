// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Euclidean projection onto the L1 ball.
//!
//! Given `v` and a radius `b`, the projection returns the unique `w`
//! minimising `‖w − v‖₂` subject to `‖w‖₁ ≤ b`. The solution is a uniform
//! soft threshold `w_i = sign(v_i) · max(|v_i| − θ, 0)` whose threshold `θ` is
//! found in closed form from the sorted magnitudes of `v` (Duchi et al.,
//! 2008), so the cost is dominated by one `O(N log N)` sort.

use crate::ops;
use crate::report::{CscError, CscResult};
use std::cmp::Ordering;

/// Projects `values` onto the L1 ball of `radius`, returning a new vector.
pub fn project_onto_l1_ball(values: &[f64], radius: f64) -> CscResult<Vec<f64>> {
    let mut projected = values.to_vec();
    L1BallProjector::new().project_inplace(&mut projected, radius)?;
    Ok(projected)
}

/// Reusable projector that keeps its sort buffer between calls.
#[derive(Debug, Clone, Default)]
pub struct L1BallProjector {
    magnitudes: Vec<f64>,
}

impl L1BallProjector {
    pub fn new() -> Self {
        Self {
            magnitudes: Vec::new(),
        }
    }

    pub fn with_capacity(len: usize) -> Self {
        Self {
            magnitudes: Vec::with_capacity(len),
        }
    }

    /// Projects `values` in place and returns the shrinkage threshold `θ`
    /// that was applied (`0.0` when `values` already lay inside the ball).
    pub fn project_inplace(&mut self, values: &mut [f64], radius: f64) -> CscResult<f64> {
        check_radius(radius)?;
        if !ops::all_finite(values) {
            return Err(CscError::NonFiniteInput {
                label: "L1 projection input",
            });
        }
        if ops::l1_norm(values) <= radius {
            return Ok(0.0);
        }

        let theta = self.threshold(values, radius);
        for value in values.iter_mut() {
            let shrunk = (value.abs() - theta).max(0.0);
            *value = if shrunk > 0.0 {
                value.signum() * shrunk
            } else {
                0.0
            };
        }
        Ok(theta)
    }

    /// Clamps `values` at zero, then projects onto the L1 ball. The result is
    /// the projection onto the non-negative part of the ball.
    pub fn project_non_negative_inplace(
        &mut self,
        values: &mut [f64],
        radius: f64,
    ) -> CscResult<f64> {
        check_radius(radius)?;
        ops::clamp_non_negative(values);
        self.project_inplace(values, radius)
    }

    /// Projects a copy of `values`.
    pub fn project(&mut self, values: &[f64], radius: f64) -> CscResult<Vec<f64>> {
        let mut projected = values.to_vec();
        self.project_inplace(&mut projected, radius)?;
        Ok(projected)
    }

    /// Soft threshold for a vector known to lie outside the ball.
    fn threshold(&mut self, values: &[f64], radius: f64) -> f64 {
        self.magnitudes.clear();
        self.magnitudes.extend(values.iter().map(|v| v.abs()));

        // With a zero radius no prefix satisfies the pivot condition; the
        // largest magnitude zeroes every entry.
        if radius == 0.0 {
            return self.magnitudes.iter().copied().fold(0.0, f64::max);
        }

        self.magnitudes
            .sort_unstable_by(|a, b| b.partial_cmp(a).unwrap_or(Ordering::Equal));

        // The pivot condition holds on a prefix of the sorted magnitudes, so
        // the last candidate that satisfies it belongs to the largest rho.
        // rho = 1 always qualifies; seeding it keeps the threshold correct
        // when the radius is absorbed by magnitudes far larger than it.
        let mut cumulative = self.magnitudes[0];
        let mut theta = cumulative - radius;
        for (index, &magnitude) in self.magnitudes.iter().enumerate().skip(1) {
            cumulative += magnitude;
            let candidate = (cumulative - radius) / (index + 1) as f64;
            if magnitude > candidate {
                theta = candidate;
            } else {
                break;
            }
        }
        theta.max(0.0)
    }
}

fn check_radius(radius: f64) -> CscResult<()> {
    if radius.is_finite() && radius >= 0.0 {
        Ok(())
    } else {
        Err(CscError::InvalidRadius { radius })
    }
}
