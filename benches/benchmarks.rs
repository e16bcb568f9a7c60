// benches/benchmarks.rs — Performance benchmarks (criterion)
//
// Hot paths that run once per call or per pairing:
//   1. Pairing planning for a tournament round
//   2. Elo updates over a round of decided pairings
//   3. Budget admission against a busy window
//   4. Step resolution and generator picks

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;

use evokoi::core::budget::{Admission, BudgetThrottle};
use evokoi::core::selector::GeneratorSelector;
use evokoi::core::steps::{resolve, GeneratorEntry, StepSpec};
use evokoi::core::types::{Params, Step};
use evokoi::evaluator::elo::{rating_deltas, DEFAULT_K_FACTOR, DEFAULT_RATING};
use evokoi::evaluator::tournament::plan_pairings;
use evokoi::Outcome;

// ─── Benchmark: Pairing planning ────────────────────────────────────────────

fn bench_pairings(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan_pairings");

    for n in [8usize, 64, 512] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            let mut rng = StdRng::seed_from_u64(7);
            b.iter(|| plan_pairings(black_box(n), 2, &mut rng))
        });
    }

    group.finish();
}

// ─── Benchmark: Elo updates ─────────────────────────────────────────────────

fn bench_elo(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(11);
    let pairs = plan_pairings(64, 4, &mut rng);
    let outcomes = [Outcome::FirstWins, Outcome::SecondWins, Outcome::Tie];

    c.bench_function("elo_round_64x4", |b| {
        b.iter(|| {
            let mut ratings = vec![DEFAULT_RATING; 64];
            for (i, &(a, bb)) in pairs.iter().enumerate() {
                let (da, db) = rating_deltas(
                    ratings[a],
                    ratings[bb],
                    outcomes[i % outcomes.len()],
                    DEFAULT_K_FACTOR,
                );
                ratings[a] += da;
                ratings[bb] += db;
            }
            black_box(ratings)
        })
    });
}

// ─── Benchmark: Budget admission ────────────────────────────────────────────

fn bench_admission(c: &mut Criterion) {
    let mut group = c.benchmark_group("budget");

    group.bench_function("admit_record_1000_calls", |b| {
        b.iter(|| {
            let throttle = BudgetThrottle::with_ceiling(10.0, Duration::from_secs(3600));
            for _ in 0..1000 {
                if let Admission::Admitted(r) = throttle.admit(black_box(0.005)) {
                    throttle.record(r, 0.004);
                }
            }
            throttle.total_spent()
        })
    });

    group.bench_function("admit_saturated_window", |b| {
        let throttle = BudgetThrottle::with_ceiling(1.0, Duration::from_secs(3600));
        while let Admission::Admitted(r) = throttle.admit(0.001) {
            throttle.record(r, 0.001);
        }
        b.iter(|| matches!(throttle.admit(black_box(0.001)), Admission::Wait(_)))
    });

    group.finish();
}

// ─── Benchmark: Step resolution ─────────────────────────────────────────────

fn bench_resolution(c: &mut Criterion) {
    let mut base = Params::new();
    for i in 0..16 {
        base.insert(format!("opt_{i}"), serde_json::json!(i));
    }
    let spec = StepSpec::new()
        .with_generators(
            (0..8)
                .map(|i| {
                    let mut p = Params::new();
                    p.insert("temperature".into(), serde_json::json!(i as f64 / 8.0));
                    GeneratorEntry::WithParams(i, p)
                })
                .collect(),
        )
        .with_param("max_tokens", 512);

    c.bench_function("resolve_pool_of_8", |b| {
        b.iter(|| resolve(Step::Mutation, black_box(&base), &0, &spec).map(|cfg| cfg.pool().len()))
    });

    let resolved = match resolve(Step::Mutation, &base, &0, &spec) {
        Ok(cfg) => cfg,
        Err(e) => panic!("resolve: {e}"),
    };
    let mut selector = GeneratorSelector::new(StdRng::seed_from_u64(3));
    c.bench_function("pick_from_pool_of_8", |b| {
        b.iter(|| selector.pick(black_box(&resolved)).callable)
    });
}

criterion_group!(
    benches,
    bench_pairings,
    bench_elo,
    bench_admission,
    bench_resolution,
);
criterion_main!(benches);
