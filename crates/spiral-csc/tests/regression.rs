// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use approx::assert_abs_diff_eq;
use rand::{rngs::StdRng, SeedableRng};
use spiral_csc::{
    convolve, learn_constrained_sparse_dictionary, learn_with_rng, DictionaryLearner,
    LearnerConfig, LearnerPhase, StepSchedule,
};

fn init_logging() {
    // Several tests race to install the subscriber; only the first wins.
    let _ = spiral_config::init_tracing();
}

/// A single smooth bump placed at three offsets.
fn synthetic_signal() -> (Vec<f64>, usize) {
    let bump = [0.0, 0.5, 1.0, 0.5, 0.0];
    let norm = bump.iter().map(|v| v * v).sum::<f64>().sqrt();
    let feature: Vec<f64> = bump.iter().map(|v| v / norm).collect();

    let mut positions = vec![0.0; 36];
    positions[5] = 2.0;
    positions[20] = 1.5;
    positions[30] = 1.0;
    (convolve(&positions, &feature), feature.len())
}

fn assert_feasible(result: &spiral_csc::LearnedDictionary, budget: f64, zero_edge: bool) {
    assert!(result.positions.data().iter().all(|v| *v >= 0.0));
    for l1 in result.positions.column_l1_norms() {
        assert!(l1 <= budget + 1e-9, "column L1 {l1} exceeds budget {budget}");
    }
    for norm in result.features.column_l2_norms() {
        assert_abs_diff_eq!(norm, 1.0, epsilon = 1e-12);
    }
    if zero_edge {
        let last = result.features.rows() - 1;
        for column in result.features.columns() {
            assert_eq!(column[0], 0.0);
            assert_eq!(column[last], 0.0);
        }
    }
}

#[test]
fn zero_iterations_return_initial_draws() {
    let signal: Vec<f64> = (0..20).map(|i| ((i as f64) * 0.4).cos()).collect();
    let config = LearnerConfig::new(5, 1).with_num_iterations(0);

    let mut rng = StdRng::seed_from_u64(21);
    let result = learn_with_rng(&signal, &config, &mut rng).expect("learning should succeed");

    assert_eq!(result.positions.shape(), (16, 1));
    assert_eq!(result.features.shape(), (5, 1));
    assert!(result.objective_trace.is_empty());
    assert!(result.positions.data().iter().all(|v| *v >= 0.0));
    assert_abs_diff_eq!(result.features.column_l2_norms()[0], 1.0, epsilon = 1e-12);

    let mut rng = StdRng::seed_from_u64(21);
    let initial = DictionaryLearner::initialize(&signal, config, &mut rng).unwrap();
    assert_eq!(&result.positions, initial.positions());
    assert_eq!(&result.features, initial.features());
}

#[test]
fn seeded_runs_are_reproducible() {
    let (signal, n) = synthetic_signal();
    let config = LearnerConfig::new(n, 2)
        .with_num_iterations(25)
        .with_seed(1234);
    let first = learn_constrained_sparse_dictionary(&signal, &config).unwrap();
    let second = learn_constrained_sparse_dictionary(&signal, &config).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.objective_trace.len(), 25);
}

#[test]
fn sweep_runs_draw_independent_initialisations() {
    let (signal, n) = synthetic_signal();
    let config = LearnerConfig::new(n, 2).with_num_iterations(0);
    let mut run0 = spiral_config::rng_for_run(Some(99), "sweep", 0);
    let mut run1 = spiral_config::rng_for_run(Some(99), "sweep", 1);
    let a = learn_with_rng(&signal, &config, &mut run0).unwrap();
    let b = learn_with_rng(&signal, &config, &mut run1).unwrap();
    assert_ne!(a.features, b.features);
}

#[test]
fn constraints_hold_after_every_step() {
    init_logging();
    let (signal, n) = synthetic_signal();
    let config = LearnerConfig::new(n, 3)
        .with_zero_edge(true)
        .with_sparsity_budget(2.0)
        .with_num_iterations(40);
    let mut rng = StdRng::seed_from_u64(8);
    let mut learner = DictionaryLearner::initialize(&signal, config, &mut rng).unwrap();

    let mut reports = Vec::new();
    while let Some(report) = learner.step().unwrap() {
        for l1 in learner.positions().column_l1_norms() {
            assert!(l1 <= 2.0 + 1e-9);
        }
        assert!(learner.positions().data().iter().all(|v| *v >= 0.0));
        assert_eq!(report.active_positions, learner.positions().count_nonzero());
        reports.push(report);
    }
    assert_eq!(learner.phase(), LearnerPhase::Converged);
    assert_eq!(reports.len(), 40);
    assert!(reports.iter().all(|r| r.objective.total >= 0.0));
    assert!(reports.windows(2).all(|w| w[1].step_size <= w[0].step_size));

    let result = learner.into_result();
    assert_feasible(&result, 2.0, true);
    let trace: Vec<f64> = reports.iter().map(|r| r.objective.total).collect();
    assert_eq!(result.objective_trace, trace);
}

#[test]
fn large_sparsity_weight_drives_positions_to_zero() {
    let (signal, n) = synthetic_signal();
    let config = LearnerConfig::new(n, 2)
        .with_lambda_r_sparse(100.0)
        .with_zero_edge(true)
        .with_num_iterations(100)
        .with_seed(5);
    let result = learn_constrained_sparse_dictionary(&signal, &config).unwrap();

    assert_feasible(&result, 0.01, true);
    assert_eq!(result.positions.count_nonzero(), 0);
    let reconstruction = result.reconstruct().unwrap();
    assert!(reconstruction.iter().all(|v| *v == 0.0));
}

#[test]
fn objective_decreases_on_a_single_feature_signal() {
    init_logging();
    let (signal, n) = synthetic_signal();
    let config = LearnerConfig::new(n, 1)
        .with_schedule(StepSchedule::Constant)
        .with_gamma_0(0.01)
        .with_num_iterations(200)
        .with_seed(11);
    let result = learn_constrained_sparse_dictionary(&signal, &config).unwrap();
    let trace = &result.objective_trace;

    assert_eq!(trace.len(), 200);
    assert!(trace.iter().all(|v| v.is_finite() && *v >= 0.0));
    assert!(
        trace[199] < 0.5 * trace[0],
        "objective did not drop: {} -> {}",
        trace[0],
        trace[199]
    );
    for window in trace[100..].windows(2) {
        assert!(
            window[1] <= window[0] * (1.0 + 1e-6),
            "objective increased late in the run: {} -> {}",
            window[0],
            window[1]
        );
    }
    assert_feasible(&result, config.budget(), false);

    let residual = result.residual_norm(&signal).unwrap();
    let signal_norm = signal.iter().map(|v| v * v).sum::<f64>().sqrt();
    assert!(residual < signal_norm);
}

#[test]
fn decaying_schedule_still_makes_progress() {
    let (signal, n) = synthetic_signal();
    let config = LearnerConfig::new(n, 1).with_seed(3);
    let result = learn_constrained_sparse_dictionary(&signal, &config).unwrap();
    let trace = &result.objective_trace;
    assert_eq!(trace.len(), 200);
    assert!(trace[199] < trace[0]);
}
