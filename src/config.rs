use crate::error::KMeansError;

/// Number of consecutive stable rounds after which batch training stops.
pub const STABILITY_THRESHOLD: usize = 2;

/// How the batch trainer decides that two rounds were "stable".
///
/// Both rules compare the reassignment count of the current round against the
/// previous one and stop once that comparison has matched
/// [`STABILITY_THRESHOLD`] times. They differ in what is being counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConvergenceRule {
    /// The reassignment counter is never reset, so the comparison detects a
    /// plateau in the total number of reassignments over the whole run.
    #[default]
    CumulativePlateau,

    /// The reassignment counter is reset at the start of every round, so the
    /// comparison looks at per-round reassignments.
    RoundChanges,
}

/// Configuration for the KMeans model
#[derive(Debug, Clone)]
pub struct KMeansConfig {
    /// Number of clusters
    pub k: usize,

    /// Maximum number of Lloyd rounds per `learn` call
    pub max_iters: usize,

    /// Random seed for k-means++ sampling, online seeding and empty-cluster
    /// reseeding
    pub seed: u64,

    /// Stopping rule for batch training
    pub convergence: ConvergenceRule,

    /// Online seeding draws every centroid component from
    /// `[-init_range, init_range)`.
    pub init_range: f64,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            k: 8,
            max_iters: 25,
            seed: 0,
            convergence: ConvergenceRule::default(),
            init_range: 5.0,
        }
    }
}

impl KMeansConfig {
    /// Create a new configuration with the specified number of clusters
    pub fn new(k: usize) -> Self {
        Self {
            k,
            ..Default::default()
        }
    }

    /// Set the maximum number of iterations
    pub fn with_max_iters(mut self, max_iters: usize) -> Self {
        self.max_iters = max_iters;
        self
    }

    /// Set the random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the convergence rule
    pub fn with_convergence(mut self, convergence: ConvergenceRule) -> Self {
        self.convergence = convergence;
        self
    }

    /// Set the half-width of the online seeding range
    pub fn with_init_range(mut self, init_range: f64) -> Self {
        self.init_range = init_range;
        self
    }

    /// Check the construction preconditions.
    ///
    /// The round budget is checked before the cluster count, so a config that
    /// violates both reports [`KMeansError::ZeroIterations`].
    pub fn validate(&self) -> Result<(), KMeansError> {
        if self.max_iters < 1 {
            return Err(KMeansError::ZeroIterations);
        }
        if self.k < 2 {
            return Err(KMeansError::OneCluster);
        }
        if !(self.init_range.is_finite() && self.init_range > 0.0) {
            return Err(KMeansError::InvalidInitRange(self.init_range));
        }
        Ok(())
    }
}

/// Parameters of an online (streaming) session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OnlineConfig {
    /// Exponential smoothing factor, `0 < alpha <= 1`
    pub alpha: f64,

    /// Dimension of every streamed observation
    pub dimension: usize,
}

impl OnlineConfig {
    pub fn new(alpha: f64, dimension: usize) -> Self {
        Self { alpha, dimension }
    }

    pub fn validate(&self) -> Result<(), KMeansError> {
        if !(self.alpha > 0.0 && self.alpha <= 1.0) {
            return Err(KMeansError::InvalidAlpha(self.alpha));
        }
        if self.dimension == 0 {
            return Err(KMeansError::InvalidDimensions(
                "online dimension must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
