use crate::algorithm::{kmeans_plus_plus, lloyd, random_centroids, TrainReport};
use crate::config::{KMeansConfig, OnlineConfig};
use crate::distance::{nearest_centroid, Distance, Euclidean};
use crate::error::KMeansError;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use parking_lot::RwLock;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Lifecycle of the model.
///
/// `Idle -> Training -> Idle` for [`KMeans::learn`] and
/// `Idle -> Streaming -> Finalizing -> Idle` for [`KMeans::online`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Phase {
    Idle = 0,
    Training = 1,
    Streaming = 2,
    Finalizing = 3,
}

impl Phase {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Phase::Training,
            2 => Phase::Streaming,
            3 => Phase::Finalizing,
            _ => Phase::Idle,
        }
    }
}

/// Everything the trainers mutate. Only ever touched through the model lock.
pub(crate) struct ModelState {
    pub data: Array2<f64>,
    pub centroids: Option<Array2<f64>>,
    pub assignments: Array1<usize>,
    pub sizes: Array1<usize>,
    pub online: Option<OnlineConfig>,
    pub rng: ChaCha8Rng,
}

pub(crate) struct Shared {
    pub config: KMeansConfig,
    pub distance: Box<dyn Distance>,
    pub state: Arc<RwLock<ModelState>>,
    phase: AtomicU8,
}

impl Shared {
    pub fn set_phase(&self, phase: Phase) {
        self.phase.store(phase as u8, Ordering::Release);
    }

    /// Set `phase` now and go back to [`Phase::Idle`] when the returned guard
    /// is dropped
    pub fn enter(&self, phase: Phase) -> PhaseGuard<'_> {
        self.set_phase(phase);
        PhaseGuard { shared: self }
    }
}

pub(crate) struct PhaseGuard<'a> {
    shared: &'a Shared,
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        self.shared.set_phase(Phase::Idle);
    }
}

/// k-means++ clustering with batch and online training.
///
/// A `KMeans` is a handle to one shared model: clones refer to the same
/// centroids and assignments, so one call site can train while others query.
/// Training takes the model lock exclusively and every query takes it shared,
/// so a query issued during training blocks until the session is over and
/// never sees a half-updated model.
///
/// Cluster ids in [`assignments`](KMeans::assignments) and the index accepted
/// by [`centroid`](KMeans::centroid) are 1-based (0 means unassigned);
/// [`predict`](KMeans::predict) returns a 0-based index.
///
/// # Example
///
/// ```
/// use streamkmeans::KMeans;
/// use ndarray::array;
///
/// let data = array![[0.0, 0.0], [0.0, 1.0], [100.0, 0.0], [100.0, 1.0]];
///
/// let kmeans = KMeans::new(10, 2).unwrap();
/// kmeans.learn(&data.view()).unwrap();
///
/// let assignments = kmeans.assignments();
/// assert_eq!(assignments[0], assignments[1]);
/// assert_ne!(assignments[0], assignments[2]);
/// assert_eq!(kmeans.sizes().sum(), 4);
/// ```
#[derive(Clone)]
pub struct KMeans {
    pub(crate) shared: Arc<Shared>,
}

impl KMeans {
    /// Create a model with `k` clusters, a budget of `max_iters` rounds per
    /// `learn` call and Euclidean distance.
    ///
    /// # Errors
    ///
    /// - [`KMeansError::ZeroIterations`] if `max_iters < 1`
    /// - [`KMeansError::OneCluster`] if `k < 2`
    pub fn new(max_iters: usize, k: usize) -> Result<Self, KMeansError> {
        Self::with_config(KMeansConfig::new(k).with_max_iters(max_iters))
    }

    /// Create a model with custom configuration and Euclidean distance.
    pub fn with_config(config: KMeansConfig) -> Result<Self, KMeansError> {
        Self::with_distance(config, Euclidean)
    }

    /// Create a model with custom configuration and distance strategy.
    pub fn with_distance<D>(config: KMeansConfig, distance: D) -> Result<Self, KMeansError>
    where
        D: Distance + 'static,
    {
        config.validate()?;

        let state = ModelState {
            data: Array2::zeros((0, 0)),
            centroids: None,
            assignments: Array1::zeros(0),
            sizes: Array1::zeros(config.k),
            online: None,
            rng: ChaCha8Rng::seed_from_u64(config.seed),
        };

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                distance: Box::new(distance),
                state: Arc::new(RwLock::new(state)),
                phase: AtomicU8::new(Phase::Idle as u8),
            }),
        })
    }

    /// Prepare the model for [`online`](KMeans::online) training.
    ///
    /// Clears the dataset and seeds `k` centroids uniformly at random in
    /// `[-init_range, init_range)^dimension`.
    ///
    /// # Errors
    ///
    /// Returns an error if `alpha` is outside of `(0, 1]` or `dimension` is 0.
    pub fn with_online(self, online: OnlineConfig) -> Result<Self, KMeansError> {
        online.validate()?;

        {
            let mut guard = self.shared.state.write();
            let state = &mut *guard;

            state.online = Some(online);
            state.data = Array2::zeros((0, online.dimension));
            state.centroids = Some(random_centroids(
                self.shared.config.k,
                online.dimension,
                self.shared.config.init_range,
                &mut state.rng,
            ));
        }

        debug!(
            alpha = online.alpha,
            dimension = online.dimension,
            "configured online learning"
        );
        Ok(self)
    }

    /// Train on `data` (one point per row) with k-means++ seeding followed by
    /// Lloyd rounds.
    ///
    /// Replaces the dataset, centroids, assignments and sizes. The model is
    /// locked exclusively for the whole call.
    ///
    /// # Errors
    ///
    /// - [`KMeansError::EmptySet`] if `data` has no rows
    /// - [`KMeansError::InvalidDimensions`] if `data` has no columns
    pub fn learn(&self, data: &ArrayView2<f64>) -> Result<TrainReport, KMeansError> {
        let n_samples = data.nrows();
        if n_samples == 0 {
            return Err(KMeansError::EmptySet);
        }
        if data.ncols() == 0 {
            return Err(KMeansError::InvalidDimensions(
                "points must have at least one feature".to_string(),
            ));
        }

        let shared = &*self.shared;
        let config = &shared.config;

        let mut guard = shared.state.write();
        let _phase = shared.enter(Phase::Training);
        let state = &mut *guard;

        state.data = data.to_owned();
        state.assignments = Array1::zeros(n_samples);
        state.sizes = Array1::zeros(config.k);

        let mut centroids = kmeans_plus_plus(
            &state.data.view(),
            config.k,
            shared.distance.as_ref(),
            &mut state.rng,
        );

        let report = lloyd(
            &state.data.view(),
            &mut centroids,
            &mut state.assignments,
            &mut state.sizes,
            config,
            shared.distance.as_ref(),
            &mut state.rng,
        );
        state.centroids = Some(centroids);

        debug!(
            samples = n_samples,
            features = data.ncols(),
            k = config.k,
            rounds = report.rounds,
            converged = report.converged,
            "batch training finished"
        );

        Ok(report)
    }

    /// 1-based cluster id for every point of the dataset (0 = unassigned).
    pub fn assignments(&self) -> Array1<usize> {
        self.shared.state.read().assignments.clone()
    }

    /// Number of points assigned to each cluster.
    pub fn sizes(&self) -> Array1<usize> {
        self.shared.state.read().sizes.clone()
    }

    /// Centroid of the 1-based cluster `index`.
    ///
    /// # Errors
    ///
    /// - [`KMeansError::NotFitted`] if no centroids exist yet
    /// - [`KMeansError::ClusterOutOfRange`] if `index` is not in `[1, k]`
    pub fn centroid(&self, index: usize) -> Result<Array1<f64>, KMeansError> {
        let state = self.shared.state.read();
        let centroids = state.centroids.as_ref().ok_or(KMeansError::NotFitted)?;

        if index == 0 || index > centroids.nrows() {
            return Err(KMeansError::ClusterOutOfRange {
                index,
                k: centroids.nrows(),
            });
        }

        Ok(centroids.row(index - 1).to_owned())
    }

    /// All centroids, one per row, or `None` before the first training or
    /// online seeding.
    pub fn centroids(&self) -> Option<Array2<f64>> {
        self.shared.state.read().centroids.clone()
    }

    /// 0-based index of the centroid closest to `point`.
    ///
    /// # Errors
    ///
    /// - [`KMeansError::NotFitted`] if no centroids exist yet
    /// - [`KMeansError::InvalidDimensions`] if `point` has the wrong length
    pub fn predict(&self, point: &ArrayView1<f64>) -> Result<usize, KMeansError> {
        let state = self.shared.state.read();
        let centroids = state.centroids.as_ref().ok_or(KMeansError::NotFitted)?;

        if point.len() != centroids.ncols() {
            return Err(KMeansError::InvalidDimensions(format!(
                "Expected {} features, got {}",
                centroids.ncols(),
                point.len()
            )));
        }

        let (label, _) = nearest_centroid(self.shared.distance.as_ref(), *point, &centroids.view());
        Ok(label)
    }

    /// Number of points in the dataset.
    pub fn dataset_len(&self) -> usize {
        self.shared.state.read().data.nrows()
    }

    /// Current lifecycle phase. Does not take the model lock.
    pub fn phase(&self) -> Phase {
        Phase::from_u8(self.shared.phase.load(Ordering::Acquire))
    }

    /// Whether this model supports [`online`](KMeans::online) training.
    pub fn is_online(&self) -> bool {
        true
    }

    /// Get the number of clusters.
    pub fn k(&self) -> usize {
        self.shared.config.k
    }

    /// Get the configuration.
    pub fn config(&self) -> &KMeansConfig {
        &self.shared.config
    }
}
