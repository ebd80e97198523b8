use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use crossbeam_channel::unbounded;
use ndarray::Array2;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use std::time::Duration;
use streamkmeans::{KMeans, KMeansConfig, OnlineConfig};

fn benchmark_learn_varying_samples(c: &mut Criterion) {
    let mut group = c.benchmark_group("learn_samples");
    group.sample_size(10);
    group.warm_up_time(Duration::from_millis(500));
    group.measurement_time(Duration::from_secs(2));

    let n_features = 16;
    let k = 10;
    let sample_sizes = [1_000, 5_000, 10_000];

    for n_samples in sample_sizes.iter() {
        group.throughput(Throughput::Elements(*n_samples as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(n_samples),
            n_samples,
            |b, &n_samples| {
                let data = Array2::random((n_samples, n_features), Uniform::new(-1.0, 1.0));
                let config = KMeansConfig::new(k).with_max_iters(5).with_seed(42);

                b.iter(|| {
                    let kmeans = KMeans::with_config(config.clone()).unwrap();
                    kmeans.learn(black_box(&data.view())).unwrap();
                    kmeans
                });
            },
        );
    }
    group.finish();
}

fn benchmark_learn_varying_clusters(c: &mut Criterion) {
    let mut group = c.benchmark_group("learn_clusters");
    group.sample_size(10);
    group.warm_up_time(Duration::from_millis(500));
    group.measurement_time(Duration::from_secs(2));

    let n_samples = 2_000;
    let n_features = 16;
    let cluster_counts = [4, 16, 64];

    for k in cluster_counts.iter() {
        group.throughput(Throughput::Elements(*k as u64));
        group.bench_with_input(BenchmarkId::from_parameter(k), k, |b, &k| {
            let data = Array2::random((n_samples, n_features), Uniform::new(-1.0, 1.0));
            let config = KMeansConfig::new(k).with_max_iters(5).with_seed(42);

            b.iter(|| {
                let kmeans = KMeans::with_config(config.clone()).unwrap();
                kmeans.learn(black_box(&data.view())).unwrap();
                kmeans
            });
        });
    }
    group.finish();
}

fn benchmark_predict(c: &mut Criterion) {
    let mut group = c.benchmark_group("predict");
    group.sample_size(10);
    group.warm_up_time(Duration::from_millis(500));
    group.measurement_time(Duration::from_secs(2));

    let train_data = Array2::random((5_000, 32), Uniform::new(-1.0, 1.0));
    let kmeans = KMeans::with_config(KMeansConfig::new(32).with_max_iters(10).with_seed(42)).unwrap();
    kmeans.learn(&train_data.view()).unwrap();

    let test_data = Array2::random((1_000, 32), Uniform::new(-1.0, 1.0));
    group.throughput(Throughput::Elements(1_000));
    group.bench_function("1k_points", |b| {
        b.iter(|| {
            for point in test_data.outer_iter() {
                black_box(kmeans.predict(&point).unwrap());
            }
        });
    });
    group.finish();
}

fn benchmark_online_session(c: &mut Criterion) {
    let mut group = c.benchmark_group("online");
    group.sample_size(10);
    group.warm_up_time(Duration::from_millis(500));
    group.measurement_time(Duration::from_secs(2));

    let n_observations = 10_000;
    let observations = Array2::random((n_observations, 8), Uniform::new(-5.0, 5.0));

    group.throughput(Throughput::Elements(n_observations as u64));
    group.bench_function("10k_observations", |b| {
        b.iter(|| {
            let kmeans = KMeans::with_config(KMeansConfig::new(16).with_seed(42))
                .unwrap()
                .with_online(OnlineConfig::new(0.05, 8))
                .unwrap();

            let (obs_tx, obs_rx) = unbounded();
            let (done_tx, done_rx) = unbounded();
            let session = kmeans.online(obs_rx, done_rx).unwrap();

            for row in observations.outer_iter() {
                obs_tx.send(row.to_owned()).unwrap();
            }
            done_tx.send(()).unwrap();

            black_box(session.events().iter().count());
            session.wait();
            kmeans
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    benchmark_learn_varying_samples,
    benchmark_learn_varying_clusters,
    benchmark_predict,
    benchmark_online_session,
);

criterion_main!(benches);
