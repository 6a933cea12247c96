use RustedRegNet::model::context::{Bounds, ModelContext};
use RustedRegNet::model::data::{PairSeries, TrainingData};
use RustedRegNet::model::objective::ObjectiveEvaluator;
use RustedRegNet::model::parameters::ParameterRegistry;
use RustedRegNet::numerical::finite_diff::{GradientEstimator, GradientOptions};
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use nalgebra::DVector;

/// `n_tf` x `n_tg` pairs over `len` pseudotime points with smooth synthetic series
fn synthetic_context(n_tf: usize, n_tg: usize, len: usize) -> ModelContext {
    let mut rows = Vec::new();
    for f in 0..n_tf {
        for g in 0..n_tg {
            let key = format!("B1_TG{}~TF{}_{}", g, f, f * n_tg + g);
            let wave = |phase: f64| -> Vec<f64> {
                (0..len)
                    .map(|t| 1.0 + 0.5 * (phase + t as f64 * 0.3).sin())
                    .collect()
            };
            rows.push(
                PairSeries::new(
                    &key,
                    0.1 * (f + g + 1) as f64,
                    wave(f as f64),
                    wave(g as f64 + 0.5),
                    wave((f + g) as f64),
                )
                .unwrap(),
            );
        }
    }
    let data = TrainingData::new(rows).unwrap();
    let n_slots = data.n_slots();
    let n = ParameterRegistry::from_data(&data).len();
    ModelContext::new(data, Bounds::uniform(n, -10.0, 10.0), vec![1.0; n_slots]).unwrap()
}

fn bench_objective(c: &mut Criterion) {
    let ctx = synthetic_context(5, 20, 10);
    let eval = ObjectiveEvaluator::new(&ctx).unwrap();
    let theta = DVector::from_element(ctx.n_params(), 0.3);
    c.bench_function("objective 100 pairs x 10 points", |b| {
        b.iter(|| eval.evaluate(black_box(&theta)).unwrap())
    });
}

fn bench_gradient(c: &mut Criterion) {
    let ctx = synthetic_context(2, 10, 8);
    let eval = ObjectiveEvaluator::new(&ctx).unwrap();
    let theta = DVector::from_element(ctx.n_params(), 0.3);
    let mut group = c.benchmark_group("gradient 20 pairs x 8 points");
    for ncores in [1usize, 4] {
        let options = GradientOptions {
            ncores,
            ..GradientOptions::default()
        };
        let est = GradientEstimator::new(&eval, ctx.bounds(), options).unwrap();
        group.bench_function(format!("{} workers", ncores), |b| {
            b.iter(|| est.estimate(black_box(&theta)).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_objective, bench_gradient);
criterion_main!(benches);
