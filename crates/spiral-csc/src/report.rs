// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use crate::matrix::Matrix;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type CscResult<T> = Result<T, CscError>;

/// Errors emitted by the projector, the convolver and the learner.
#[derive(Debug, Error)]
pub enum CscError {
    #[error("invalid matrix dimensions ({rows} x {cols}); both axes must be non-zero")]
    InvalidDimensions { rows: usize, cols: usize },
    #[error("data length mismatch: expected {expected}, got {got}")]
    DataLength { expected: usize, got: usize },
    #[error("shape mismatch: left={left:?}, right={right:?} cannot be combined")]
    ShapeMismatch {
        left: (usize, usize),
        right: (usize, usize),
    },
    #[error("L1 ball radius must be a non-negative finite number, got {radius}")]
    InvalidRadius { radius: f64 },
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter {
        name: &'static str,
        reason: String,
    },
    #[error("non-finite value in {label}")]
    NonFiniteInput { label: &'static str },
    #[error("feature column {column} has near-zero norm {norm:e} and cannot be normalised")]
    DegenerateFeature { column: usize, norm: f64 },
    #[error(
        "optimisation diverged at iteration {iteration} after {completed} finite iterations (non-finite {quantity})"
    )]
    Diverged {
        iteration: usize,
        completed: usize,
        quantity: &'static str,
        last_finite: Box<DivergenceSnapshot>,
    },
}

impl CscError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        CscError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// Last finite learner state captured when a run diverges.
#[derive(Debug, Clone, PartialEq)]
pub struct DivergenceSnapshot {
    pub positions: Matrix,
    pub features: Matrix,
    pub objective_trace: Vec<f64>,
}

/// Objective value split into its three terms.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ObjectiveBreakdown {
    /// Squared Euclidean norm of the residual.
    pub reconstruction: f64,
    /// Sum of squared first differences over every feature column, unweighted.
    pub smoothness: f64,
    /// Sum of absolute position amplitudes, unweighted.
    pub sparsity: f64,
    /// `reconstruction + lambda_d_smooth * smoothness + lambda_r_sparse * sparsity`.
    pub total: f64,
}

impl ObjectiveBreakdown {
    pub(crate) fn new(
        reconstruction: f64,
        smoothness: f64,
        sparsity: f64,
        lambda_d_smooth: f64,
        lambda_r_sparse: f64,
    ) -> Self {
        Self {
            reconstruction,
            smoothness,
            sparsity,
            total: reconstruction + lambda_d_smooth * smoothness + lambda_r_sparse * sparsity,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.total.is_finite()
            && self.reconstruction.is_finite()
            && self.smoothness.is_finite()
            && self.sparsity.is_finite()
    }
}

/// Summary emitted by every optimisation step.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IterationReport {
    pub iteration: usize,
    pub step_size: f64,
    /// Objective evaluated before the step was taken.
    pub objective: ObjectiveBreakdown,
    /// Non-zero position entries after projection.
    pub active_positions: usize,
    /// Largest L1 shrinkage threshold applied to any position column.
    pub max_shrinkage: f64,
}
