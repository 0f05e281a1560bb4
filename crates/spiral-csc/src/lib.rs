// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Constrained convolutional sparse coding for SpiralTorch.
//!
//! A one-dimensional signal `X` is decomposed as `Σ_j R_j ∗ D_j`, where the
//! columns of `D` are short, smooth, unit-norm features and the columns of
//! `R` are sparse, non-negative position vectors. Learning alternates a
//! gradient step on both factors with exact Euclidean projections back onto
//! their constraint sets.
//!
//! ```no_run
//! use spiral_csc::{learn_constrained_sparse_dictionary, LearnerConfig};
//!
//! let signal: Vec<f64> = (0..256).map(|i| (i as f64 * 0.1).sin()).collect();
//! let config = LearnerConfig::new(16, 3).with_zero_edge(true).with_seed(7);
//! let (positions, features, trace) =
//!     learn_constrained_sparse_dictionary(&signal, &config)?.into_parts();
//! # Ok::<(), spiral_csc::CscError>(())
//! ```
//!
//! Everything runs on plain `f64` slices without a tensor runtime. Enable the
//! `parallel` feature to spread per-column work over rayon; results are
//! identical to the sequential build.

pub mod convolution;
pub mod learner;
pub mod matrix;
pub mod objective;
mod ops;
pub mod projection;
pub mod report;
pub mod schedule;

pub use convolution::{convolve, correlate_valid, multiconv};
pub use learner::{
    learn_constrained_sparse_dictionary, learn_with_rng, DictionaryLearner, LearnedDictionary,
    LearnerConfig, LearnerPhase,
};
pub use matrix::Matrix;
pub use projection::{project_onto_l1_ball, L1BallProjector};
pub use report::{CscError, CscResult, DivergenceSnapshot, IterationReport, ObjectiveBreakdown};
pub use schedule::StepSchedule;
