use crate::config::{ConvergenceRule, KMeansConfig, STABILITY_THRESHOLD};
use crate::distance::{nearest_centroid, Distance};
use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut1, Zip};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

/// Outcome of one batch training session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainReport {
    /// Number of assign/update rounds that were run
    pub rounds: usize,

    /// `true` if training stopped because the reassignment count was stable,
    /// `false` if the round budget ran out first
    pub converged: bool,
}

/// Reassignment bookkeeping used as the batch stopping condition
#[derive(Debug, Clone, Default)]
pub(crate) struct ChangeCounter {
    pub changes: usize,
    pub oldchanges: usize,
    pub counter: usize,
    pub threshold: usize,
}

impl ChangeCounter {
    pub fn new() -> Self {
        Self {
            threshold: STABILITY_THRESHOLD,
            ..Default::default()
        }
    }

    pub fn is_stable(&self) -> bool {
        self.counter == self.threshold
    }

    /// Compare this round's count with the previous one
    pub fn check(&mut self) {
        if self.changes == self.oldchanges {
            self.counter += 1;
        }
        self.oldchanges = self.changes;
    }
}

/// Choose `k` initial centroids from `data` with k-means++ sampling.
///
/// The first centroid is drawn uniformly from `[0, n - 1)`, so the last point
/// is never picked first (a single-point dataset uses its only point). Every
/// following centroid is drawn with probability proportional to the squared
/// distance to the closest centroid chosen so far.
pub fn kmeans_plus_plus(
    data: &ArrayView2<f64>,
    k: usize,
    distance: &dyn Distance,
    rng: &mut ChaCha8Rng,
) -> Array2<f64> {
    let n_samples = data.nrows();
    let mut centroids = Array2::zeros((k, data.ncols()));

    let first = if n_samples > 1 {
        rng.gen_range(0..n_samples - 1)
    } else {
        0
    };
    centroids.row_mut(0).assign(&data.row(first));

    let mut weights = Array1::<f64>::zeros(n_samples);
    for i in 1..k {
        let mut total = 0.0;
        {
            let chosen = centroids.slice(s![..i, ..]);
            for (j, point) in data.outer_iter().enumerate() {
                let (_, l) = nearest_centroid(distance, point, &chosen);
                weights[j] = l * l;
                total += weights[j];
            }
        }

        let threshold = rng.gen::<f64>() * total;
        let picked = sample_cumulative(&weights.view(), threshold);
        centroids.row_mut(i).assign(&data.row(picked));
    }

    centroids
}

/// First index whose running weight sum reaches `threshold`
fn sample_cumulative(weights: &ArrayView1<f64>, threshold: f64) -> usize {
    let mut idx = 0;
    let mut acc = weights[0];
    while acc < threshold && idx + 1 < weights.len() {
        idx += 1;
        acc += weights[idx];
    }
    idx
}

/// Seed `k` centroids uniformly at random in `[-range, range)^dimension`
pub fn random_centroids(
    k: usize,
    dimension: usize,
    range: f64,
    rng: &mut ChaCha8Rng,
) -> Array2<f64> {
    Array2::random_using((k, dimension), Uniform::new(-range, range), rng)
}

/// Run Lloyd's algorithm on `data`, starting from `centroids`.
///
/// `assignments` holds 1-based cluster ids (0 = unassigned) and must have one
/// entry per row of `data`; `sizes` must have one entry per centroid. Both are
/// overwritten, as are the centroids.
pub(crate) fn lloyd(
    data: &ArrayView2<f64>,
    centroids: &mut Array2<f64>,
    assignments: &mut Array1<usize>,
    sizes: &mut Array1<usize>,
    config: &KMeansConfig,
    distance: &dyn Distance,
    rng: &mut ChaCha8Rng,
) -> TrainReport {
    let mut accumulators = Array2::<f64>::zeros(centroids.raw_dim());
    let mut counter = ChangeCounter::new();
    let mut rounds = 0;

    while rounds < config.max_iters && !counter.is_stable() {
        if config.convergence == ConvergenceRule::RoundChanges {
            counter.changes = 0;
        }

        assign_step(
            data,
            &centroids.view(),
            assignments,
            sizes,
            &mut accumulators,
            &mut counter,
            distance,
        );
        update_step(data, centroids, sizes, &mut accumulators, rng);
        counter.check();
        rounds += 1;

        debug!(
            round = rounds,
            changes = counter.changes,
            stable_rounds = counter.counter,
            "lloyd round finished"
        );
    }

    TrainReport {
        rounds,
        converged: counter.is_stable(),
    }
}

fn assign_step(
    data: &ArrayView2<f64>,
    centroids: &ArrayView2<f64>,
    assignments: &mut Array1<usize>,
    sizes: &mut Array1<usize>,
    accumulators: &mut Array2<f64>,
    counter: &mut ChangeCounter,
    distance: &dyn Distance,
) {
    sizes.fill(0);

    for (i, point) in data.outer_iter().enumerate() {
        let (label, _) = nearest_centroid(distance, point, centroids);
        let cluster = label + 1;

        if assignments[i] != cluster {
            counter.changes += 1;
        }

        assignments[i] = cluster;
        sizes[label] += 1;

        let mut sum = accumulators.row_mut(label);
        sum += &point;
    }
}

fn update_step(
    data: &ArrayView2<f64>,
    centroids: &mut Array2<f64>,
    sizes: &Array1<usize>,
    accumulators: &mut Array2<f64>,
    rng: &mut ChaCha8Rng,
) {
    for (cluster_idx, (mut centroid, sum)) in centroids
        .outer_iter_mut()
        .zip(accumulators.outer_iter())
        .enumerate()
    {
        let count = sizes[cluster_idx];
        if count > 0 {
            let scale = 1.0 / count as f64;
            Zip::from(&mut centroid)
                .and(&sum)
                .for_each(|c, &s| *c = s * scale);
        } else {
            // Empty cluster: move it onto a random point instead of dividing by zero
            let data_idx = rng.gen_range(0..data.nrows());
            centroid.assign(&data.row(data_idx));
            debug!(cluster = cluster_idx, point = data_idx, "reseeded empty cluster");
        }
    }

    accumulators.fill(0.0);
}

/// Move `centroid` towards `observation` by exponential smoothing:
/// `c[i] = alpha * o[i] + (1 - alpha) * c[i]`
pub fn smooth_towards(mut centroid: ArrayViewMut1<f64>, observation: ArrayView1<f64>, alpha: f64) {
    let keep = 1.0 - alpha;
    Zip::from(&mut centroid)
        .and(&observation)
        .for_each(|c, &o| *c = alpha * o + keep * *c);
}

/// Assign every point to its nearest centroid.
///
/// Returns the 1-based assignment vector and the per-cluster sizes.
pub fn assign_nearest(
    data: &ArrayView2<f64>,
    centroids: &ArrayView2<f64>,
    distance: &dyn Distance,
) -> (Array1<usize>, Array1<usize>) {
    let mut assignments = Array1::zeros(data.nrows());
    let mut sizes = Array1::zeros(centroids.nrows());

    for (i, point) in data.outer_iter().enumerate() {
        let (label, _) = nearest_centroid(distance, point, centroids);
        assignments[i] = label + 1;
        sizes[label] += 1;
    }

    (assignments, sizes)
}
