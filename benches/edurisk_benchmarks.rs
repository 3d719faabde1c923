use criterion::{black_box, criterion_group, criterion_main, Criterion};
use edurisk::bundle::ArtifactBundle;
use edurisk::forest::RandomForest;
use edurisk::linear::LogisticRegression;
use edurisk::preprocessor::Preprocessor;
use edurisk::synthetic::synthetic_dataset;
use edurisk::train_best_model;
use edurisk::tree::Tree;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;

pub fn risk_benchmarks(c: &mut Criterion) {
    let table = synthetic_dataset(42);
    let preprocessor = Preprocessor::fit(&table.rows).unwrap();
    let data = preprocessor.transform(&table.rows);
    let y = table.labels.clone();
    let index: Vec<usize> = (0..data.rows).collect();
    let weights = vec![1.0; data.rows];

    c.bench_function("Preprocess rows", |b| {
        b.iter(|| preprocessor.transform(black_box(&table.rows)))
    });

    c.bench_function("Train Tree", |b| {
        b.iter(|| {
            let mut rng = StdRng::seed_from_u64(0);
            let mut tree = Tree::new();
            tree.fit(
                black_box(&data),
                black_box(&y),
                black_box(index.clone()),
                black_box(&weights),
                black_box(4),
                &mut rng,
            );
        })
    });

    c.bench_function("Train Logistic Regression", |b| {
        b.iter(|| {
            let mut model = LogisticRegression::new();
            model.fit(black_box(&data), black_box(&y)).unwrap();
        })
    });

    let mut forest_train = c.benchmark_group("train_forest");
    forest_train.warm_up_time(Duration::from_secs(5));
    forest_train.sample_size(10);
    forest_train.bench_function("train_forest_default", |b| {
        b.iter(|| {
            let mut forest = RandomForest::candidate(42);
            forest.fit(black_box(&data), black_box(&y)).unwrap();
        })
    });
    forest_train.finish();

    let bundle = ArtifactBundle::from_trained(train_best_model(&table, 42).unwrap(), "synthetic-fallback");
    let row = &table.rows[0];
    c.bench_function("Score with explanations", |b| b.iter(|| bundle.score(black_box(row))));
    c.bench_function("Score batch", |b| b.iter(|| bundle.probabilities(black_box(&table.rows))));
}

criterion_group!(benches, risk_benchmarks);
criterion_main!(benches);
