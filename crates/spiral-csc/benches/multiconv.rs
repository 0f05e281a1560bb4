use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use rand::{rngs::StdRng, SeedableRng};
use spiral_csc::{multiconv, DictionaryLearner, LearnerConfig, Matrix};

#[track_caller]
fn unwrap_ok<T, E: core::fmt::Debug>(context: &str, result: Result<T, E>) -> T {
    match result {
        Ok(value) => value,
        Err(error) => panic!("{context}: {error:?}"),
    }
}

fn bench_multiconv(c: &mut Criterion) {
    let mut group = c.benchmark_group("csc_multiconv");
    let mut rng = StdRng::seed_from_u64(7);

    for (len, width) in [(1024usize, 4usize), (4096, 8)] {
        let positions = unwrap_ok(
            "positions initialiser failed",
            Matrix::random_normal(len, width, 0.0, 1.0, &mut rng),
        );
        let features = unwrap_ok(
            "features initialiser failed",
            Matrix::random_normal(32, width, 0.0, 1.0, &mut rng),
        );
        group.bench_function(format!("dense_{len}x{width}"), |b| {
            b.iter(|| black_box(unwrap_ok("multiconv failed", multiconv(&positions, &features))));
        });
    }

    group.finish();
}

fn bench_learner_step(c: &mut Criterion) {
    let signal: Vec<f64> = (0..2048).map(|i| (i as f64 * 0.05).sin()).collect();
    let config = LearnerConfig::new(32, 4).with_zero_edge(true);

    c.bench_function("csc_learner_step_2048", |b| {
        b.iter_batched(
            || {
                let mut rng = StdRng::seed_from_u64(13);
                unwrap_ok(
                    "learner initialisation failed",
                    DictionaryLearner::initialize(&signal, config.clone(), &mut rng),
                )
            },
            |mut learner| black_box(unwrap_ok("learner step failed", learner.step())),
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_multiconv, bench_learner_step);
criterion_main!(benches);
