// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Projected-gradient dictionary learner.
//!
//! A run owns a position matrix `R` (`(N − n + 1) × K`, non-negative, every
//! column inside the L1 ball of the sparsity budget) and a feature matrix `D`
//! (`n × K`, unit-norm columns, optionally pinned to zero at both ends). Each
//! iteration evaluates the objective, takes one gradient step on both factors
//! and projects them back onto their feasible sets.

use crate::matrix::Matrix;
use crate::objective;
use crate::ops;
use crate::projection::L1BallProjector;
use crate::report::{CscError, CscResult, DivergenceSnapshot, IterationReport};
use crate::schedule::StepSchedule;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use spiral_config::determinism;
use tracing::{debug, info, info_span, warn};

pub const DEFAULT_LAMBDA_D_SMOOTH: f64 = 0.01;
pub const DEFAULT_LAMBDA_R_SPARSE: f64 = 0.01;
pub const DEFAULT_GAMMA_0: f64 = 0.01;
pub const DEFAULT_NUM_ITERATIONS: usize = 200;

/// Feature columns whose norm falls below this value cannot be normalised.
const MIN_FEATURE_NORM: f64 = 1e-12;
const MAX_FEATURE_REDRAWS: usize = 8;
const RNG_LABEL: &str = "spiral-csc/learner";

/// Hyperparameters of one learning run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LearnerConfig {
    /// Length `n` of every feature.
    pub feature_len: usize,
    /// Number `K` of features.
    pub feature_count: usize,
    /// Weight of the smoothness penalty on the features.
    pub lambda_d_smooth: f64,
    /// Weight of the sparsity penalty on the positions.
    pub lambda_r_sparse: f64,
    /// Initial step size.
    pub gamma_0: f64,
    pub num_iterations: usize,
    /// Pin the first and last entry of every feature to zero.
    pub zero_edge: bool,
    /// Per-column L1 budget for the positions. `None` uses
    /// `1 / lambda_r_sparse`.
    pub sparsity_budget: Option<f64>,
    pub schedule: StepSchedule,
    /// Seed for the initial draws; `None` defers to [`determinism`].
    pub seed: Option<u64>,
}

impl LearnerConfig {
    pub fn new(feature_len: usize, feature_count: usize) -> Self {
        Self {
            feature_len,
            feature_count,
            lambda_d_smooth: DEFAULT_LAMBDA_D_SMOOTH,
            lambda_r_sparse: DEFAULT_LAMBDA_R_SPARSE,
            gamma_0: DEFAULT_GAMMA_0,
            num_iterations: DEFAULT_NUM_ITERATIONS,
            zero_edge: false,
            sparsity_budget: None,
            schedule: StepSchedule::default(),
            seed: None,
        }
    }

    pub fn with_lambda_d_smooth(mut self, lambda: f64) -> Self {
        self.lambda_d_smooth = lambda;
        self
    }

    pub fn with_lambda_r_sparse(mut self, lambda: f64) -> Self {
        self.lambda_r_sparse = lambda;
        self
    }

    pub fn with_gamma_0(mut self, gamma_0: f64) -> Self {
        self.gamma_0 = gamma_0;
        self
    }

    pub fn with_num_iterations(mut self, num_iterations: usize) -> Self {
        self.num_iterations = num_iterations;
        self
    }

    pub fn with_zero_edge(mut self, zero_edge: bool) -> Self {
        self.zero_edge = zero_edge;
        self
    }

    pub fn with_sparsity_budget(mut self, budget: f64) -> Self {
        self.sparsity_budget = Some(budget);
        self
    }

    pub fn with_schedule(mut self, schedule: StepSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Per-column L1 radius enforced on the positions.
    pub fn budget(&self) -> f64 {
        self.sparsity_budget
            .unwrap_or_else(|| 1.0 / self.lambda_r_sparse)
    }

    /// Number of valid offsets `N − n + 1` for a signal of `signal_len`,
    /// zero when the feature does not fit.
    pub fn positions_len(&self, signal_len: usize) -> usize {
        (signal_len + 1).saturating_sub(self.feature_len)
    }

    /// Checks every argument against a signal of `signal_len` samples.
    pub fn validate(&self, signal_len: usize) -> CscResult<()> {
        if signal_len == 0 {
            return Err(CscError::invalid("signal", "must contain at least one sample"));
        }
        if self.feature_len == 0 {
            return Err(CscError::invalid("feature_len", "must be positive"));
        }
        if self.feature_len > signal_len {
            return Err(CscError::invalid(
                "feature_len",
                format!(
                    "feature length {} exceeds signal length {signal_len}",
                    self.feature_len
                ),
            ));
        }
        if self.feature_count == 0 {
            return Err(CscError::invalid("feature_count", "must be positive"));
        }
        if !(self.lambda_r_sparse.is_finite() && self.lambda_r_sparse > 0.0) {
            return Err(CscError::invalid(
                "lambda_r_sparse",
                format!("must be positive and finite, got {}", self.lambda_r_sparse),
            ));
        }
        if !(self.lambda_d_smooth.is_finite() && self.lambda_d_smooth >= 0.0) {
            return Err(CscError::invalid(
                "lambda_d_smooth",
                format!("must be non-negative and finite, got {}", self.lambda_d_smooth),
            ));
        }
        if !(self.gamma_0.is_finite() && self.gamma_0 >= 0.0) {
            return Err(CscError::invalid(
                "gamma_0",
                format!("must be non-negative and finite, got {}", self.gamma_0),
            ));
        }
        if let Some(budget) = self.sparsity_budget {
            if !(budget.is_finite() && budget >= 0.0) {
                return Err(CscError::invalid(
                    "sparsity_budget",
                    format!("must be non-negative and finite, got {budget}"),
                ));
            }
        }
        if self.zero_edge && self.feature_len < 3 {
            return Err(CscError::invalid(
                "zero_edge",
                format!(
                    "needs features of length >= 3, got {}; every entry would be pinned to zero",
                    self.feature_len
                ),
            ));
        }
        Ok(())
    }
}

/// Coarse state of a learner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LearnerPhase {
    /// Factors drawn, no step taken yet.
    Initialized,
    /// The next step to run is `iteration`.
    Optimizing { iteration: usize },
    /// All configured iterations have run.
    Converged,
    /// `iteration` produced a non-finite value; no further steps run.
    Diverged { iteration: usize },
}

/// Output of a completed run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LearnedDictionary {
    /// `R`, `(N − n + 1) × K`.
    pub positions: Matrix,
    /// `D`, `n × K`.
    pub features: Matrix,
    /// Objective value at the start of every iteration.
    pub objective_trace: Vec<f64>,
}

impl LearnedDictionary {
    /// `(R, D, objective_trace)`.
    pub fn into_parts(self) -> (Matrix, Matrix, Vec<f64>) {
        (self.positions, self.features, self.objective_trace)
    }

    /// `Σ_j R_j ∗ D_j`.
    pub fn reconstruct(&self) -> CscResult<Vec<f64>> {
        objective::reconstruct(&self.positions, &self.features)
    }

    /// Euclidean norm of `signal − reconstruct()`.
    pub fn residual_norm(&self, signal: &[f64]) -> CscResult<f64> {
        let residual = objective::residual(signal, &self.positions, &self.features)?;
        Ok(ops::sum_squares(&residual).sqrt())
    }
}

/// Learns a dictionary for `signal`, seeding the initial draws from
/// `config.seed` (or the process determinism settings).
pub fn learn_constrained_sparse_dictionary(
    signal: &[f64],
    config: &LearnerConfig,
) -> CscResult<LearnedDictionary> {
    let mut rng = determinism::rng_from_optional(config.seed, RNG_LABEL);
    learn_with_rng(signal, config, &mut rng)
}

/// Learns a dictionary for `signal`, drawing the initial factors from `rng`.
pub fn learn_with_rng<R: Rng + ?Sized>(
    signal: &[f64],
    config: &LearnerConfig,
    rng: &mut R,
) -> CscResult<LearnedDictionary> {
    DictionaryLearner::initialize(signal, config.clone(), rng)?.run()
}

/// Step-wise driver for one learning run.
#[derive(Debug, Clone)]
pub struct DictionaryLearner<'a> {
    signal: &'a [f64],
    config: LearnerConfig,
    budget: f64,
    positions: Matrix,
    features: Matrix,
    objective_trace: Vec<f64>,
    phase: LearnerPhase,
    projector: L1BallProjector,
}

impl<'a> DictionaryLearner<'a> {
    /// Validates the configuration and draws the initial factors.
    ///
    /// Features are standard normal, optionally zero-edged, then normalised
    /// per column. Positions are `N(0, (‖X‖ / K)²)` draws clamped at zero.
    pub fn initialize<R: Rng + ?Sized>(
        signal: &'a [f64],
        config: LearnerConfig,
        rng: &mut R,
    ) -> CscResult<Self> {
        config.validate(signal.len())?;
        if !ops::all_finite(signal) {
            return Err(CscError::NonFiniteInput { label: "signal" });
        }

        let features = initial_features(&config, rng)?;

        let std = ops::sum_squares(signal).sqrt() / config.feature_count as f64;
        let mut positions = Matrix::random_normal(
            config.positions_len(signal.len()),
            config.feature_count,
            0.0,
            std,
            rng,
        )?;
        positions.clamp_non_negative();

        let budget = config.budget();
        debug!(
            signal_len = signal.len(),
            feature_len = config.feature_len,
            feature_count = config.feature_count,
            budget,
            position_std = std,
            "initialised dictionary learner"
        );

        Ok(Self {
            signal,
            projector: L1BallProjector::with_capacity(positions.rows()),
            budget,
            positions,
            features,
            objective_trace: Vec::with_capacity(config.num_iterations),
            phase: LearnerPhase::Initialized,
            config,
        })
    }

    pub fn phase(&self) -> LearnerPhase {
        self.phase
    }

    pub fn config(&self) -> &LearnerConfig {
        &self.config
    }

    pub fn signal(&self) -> &[f64] {
        self.signal
    }

    /// Per-column L1 radius enforced on the positions.
    pub fn budget(&self) -> f64 {
        self.budget
    }

    pub fn positions(&self) -> &Matrix {
        &self.positions
    }

    pub fn features(&self) -> &Matrix {
        &self.features
    }

    pub fn objective_trace(&self) -> &[f64] {
        &self.objective_trace
    }

    /// Runs one projected gradient iteration. Returns `None` once the
    /// configured number of iterations has been reached.
    pub fn step(&mut self) -> CscResult<Option<IterationReport>> {
        let iteration = match self.phase {
            LearnerPhase::Initialized => 0,
            LearnerPhase::Optimizing { iteration } => iteration,
            LearnerPhase::Converged | LearnerPhase::Diverged { .. } => return Ok(None),
        };
        if iteration >= self.config.num_iterations {
            self.phase = LearnerPhase::Converged;
            return Ok(None);
        }
        self.phase = LearnerPhase::Optimizing { iteration };

        let residual = objective::residual(self.signal, &self.positions, &self.features)?;
        let breakdown = objective::evaluate(
            &residual,
            &self.positions,
            &self.features,
            self.config.lambda_d_smooth,
            self.config.lambda_r_sparse,
        );
        if !breakdown.is_finite() {
            return Err(self.diverged(iteration, "objective"));
        }
        self.objective_trace.push(breakdown.total);

        let step_size = self
            .config
            .schedule
            .step_size(self.config.gamma_0, iteration);
        let grads = objective::gradients(
            &residual,
            &self.positions,
            &self.features,
            self.config.lambda_d_smooth,
            self.config.lambda_r_sparse,
        )?;

        let mut positions = self.positions.clone();
        positions.add_scaled(&grads.positions, -step_size)?;
        if !positions.is_finite() {
            return Err(self.diverged(iteration, "positions"));
        }
        let mut features = self.features.clone();
        features.add_scaled(&grads.features, -step_size)?;
        if !features.is_finite() {
            return Err(self.diverged(iteration, "features"));
        }

        let max_shrinkage = self.enforce_position_budget(&mut positions)?;
        normalise_features(&mut features, self.config.zero_edge)?;

        self.positions = positions;
        self.features = features;

        let report = IterationReport {
            iteration,
            step_size,
            objective: breakdown,
            active_positions: self.positions.count_nonzero(),
            max_shrinkage,
        };
        debug!(
            iteration,
            step_size,
            objective = breakdown.total,
            reconstruction = breakdown.reconstruction,
            smoothness = breakdown.smoothness,
            sparsity = breakdown.sparsity,
            active_positions = report.active_positions,
            max_shrinkage,
            "learner step"
        );

        self.phase = if iteration + 1 >= self.config.num_iterations {
            LearnerPhase::Converged
        } else {
            LearnerPhase::Optimizing {
                iteration: iteration + 1,
            }
        };
        Ok(Some(report))
    }

    /// Runs every remaining iteration and returns the learned factors.
    pub fn run(mut self) -> CscResult<LearnedDictionary> {
        let span = info_span!(
            "csc_learn",
            signal_len = self.signal.len(),
            feature_len = self.config.feature_len,
            feature_count = self.config.feature_count,
            iterations = self.config.num_iterations,
        );
        let _entered = span.enter();

        info!(
            lambda_d_smooth = self.config.lambda_d_smooth,
            lambda_r_sparse = self.config.lambda_r_sparse,
            gamma_0 = self.config.gamma_0,
            budget = self.budget,
            zero_edge = self.config.zero_edge,
            "starting dictionary learning"
        );
        while self.step()?.is_some() {}

        info!(
            final_objective = self.objective_trace.last().copied(),
            active_positions = self.positions.count_nonzero(),
            "dictionary learning converged"
        );
        Ok(self.into_result())
    }

    /// Consumes the learner, returning the current factors and trace.
    pub fn into_result(self) -> LearnedDictionary {
        LearnedDictionary {
            positions: self.positions,
            features: self.features,
            objective_trace: self.objective_trace,
        }
    }

    /// Clamps each position column at zero and projects it onto the L1
    /// ball. Returns the largest threshold applied.
    fn enforce_position_budget(&mut self, positions: &mut Matrix) -> CscResult<f64> {
        let budget = self.budget;

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;

            let rows = positions.rows();
            if ops::should_parallelise(rows, positions.cols()) {
                let thresholds: Vec<f64> = positions
                    .data_mut()
                    .par_chunks_mut(rows)
                    .map_init(L1BallProjector::new, |projector, column| {
                        projector.project_non_negative_inplace(column, budget)
                    })
                    .collect::<CscResult<_>>()?;
                return Ok(thresholds.into_iter().fold(0.0, f64::max));
            }
        }

        let mut max_theta = 0.0f64;
        for column in positions.columns_mut() {
            let theta = self
                .projector
                .project_non_negative_inplace(column, budget)?;
            max_theta = max_theta.max(theta);
        }
        Ok(max_theta)
    }

    fn diverged(&mut self, iteration: usize, quantity: &'static str) -> CscError {
        self.phase = LearnerPhase::Diverged { iteration };
        warn!(
            iteration,
            quantity,
            completed = iteration,
            "optimisation diverged; consider a smaller gamma_0"
        );
        CscError::Diverged {
            iteration,
            completed: iteration,
            quantity,
            last_finite: Box::new(DivergenceSnapshot {
                positions: self.positions.clone(),
                features: self.features.clone(),
                objective_trace: self.objective_trace.clone(),
            }),
        }
    }
}

fn initial_features<R: Rng + ?Sized>(config: &LearnerConfig, rng: &mut R) -> CscResult<Matrix> {
    let mut features =
        Matrix::random_normal(config.feature_len, config.feature_count, 0.0, 1.0, rng)?;
    for column in 0..config.feature_count {
        let mut redraws = 0;
        loop {
            let values = features.column_mut(column);
            match normalise_column(values, config.zero_edge) {
                Ok(()) => break,
                Err(norm) if redraws < MAX_FEATURE_REDRAWS => {
                    redraws += 1;
                    warn!(column, norm, redraws, "redrawing degenerate feature column");
                    for value in values.iter_mut() {
                        *value = StandardNormal.sample(&mut *rng);
                    }
                }
                Err(norm) => return Err(CscError::DegenerateFeature { column, norm }),
            }
        }
    }
    Ok(features)
}

/// Re-applies the zero-edge constraint and rescales every column to unit
/// norm.
fn normalise_features(features: &mut Matrix, zero_edge: bool) -> CscResult<()> {
    for (column, values) in features.columns_mut().enumerate() {
        normalise_column(values, zero_edge)
            .map_err(|norm| CscError::DegenerateFeature { column, norm })?;
    }
    Ok(())
}

/// Returns the offending norm when the column cannot be normalised.
///
/// The norm is taken on the column scaled by its largest magnitude, so
/// entries beyond `sqrt(f64::MAX)` do not overflow the sum of squares.
fn normalise_column(values: &mut [f64], zero_edge: bool) -> Result<(), f64> {
    if zero_edge {
        if let Some(first) = values.first_mut() {
            *first = 0.0;
        }
        if let Some(last) = values.last_mut() {
            *last = 0.0;
        }
    }
    let scale = values.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
    if !scale.is_finite() {
        return Err(scale);
    }
    if scale == 0.0 {
        return Err(0.0);
    }
    let scaled_sq: f64 = values.iter().map(|v| (v / scale).powi(2)).sum();
    let norm = scale * scaled_sq.sqrt();
    if !(norm.is_finite() && norm > MIN_FEATURE_NORM) {
        return Err(norm);
    }
    for value in values.iter_mut() {
        *value /= norm;
    }
    Ok(())
}
