use thiserror::Error;

/// Error types for the streamkmeans library
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KMeansError {
    /// The round budget must allow at least one Lloyd iteration
    #[error("max_iters must be at least 1")]
    ZeroIterations,

    /// k-means needs at least two clusters to partition anything
    #[error("k must be at least 2")]
    OneCluster,

    /// Training was requested on a dataset with no points
    #[error("cannot train on an empty dataset")]
    EmptySet,

    /// Smoothing factor outside of (0, 1]
    #[error("Invalid alpha value: {0} (expected 0 < alpha <= 1)")]
    InvalidAlpha(f64),

    /// Online seeding range must be a positive, finite half-width
    #[error("Invalid init_range: {0} (expected a positive finite value)")]
    InvalidInitRange(f64),

    /// Dimension mismatch between data and model
    #[error("Dimension mismatch: {0}")]
    InvalidDimensions(String),

    /// Model has no centroids yet
    #[error("Model has not been fitted. Call learn() or with_online() first.")]
    NotFitted,

    /// `online()` was called on a model without online parameters
    #[error("Online learning is not configured. Call with_online() first.")]
    OnlineNotConfigured,

    /// 1-based cluster index outside of `[1, k]`
    #[error("Cluster index {index} is out of range (expected 1..={k})")]
    ClusterOutOfRange { index: usize, k: usize },
}
