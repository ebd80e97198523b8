//! # streamkmeans
//!
//! k-means clustering with k-means++ seeding and an incremental ("online")
//! training mode, compatible with ndarray.
//!
//! ## Features
//!
//! - **k-means++ seeding**: initial centroids are sampled with probability
//!   proportional to the squared distance to the centroids chosen so far
//! - **Batch training**: Lloyd's algorithm (assign, recompute, check) with a
//!   round budget and a reassignment-count stopping rule
//! - **Online training**: stream observations through a channel and nudge the
//!   nearest centroid towards each one by exponential smoothing
//! - **Shared model**: `KMeans` handles are cheap clones of one model; queries
//!   never observe a half-trained state
//! - **Pluggable distance**: Euclidean by default, or any
//!   `Fn(ArrayView1<f64>, ArrayView1<f64>) -> f64`
//!
//! ## Example
//!
//! ```rust
//! use streamkmeans::{KMeans, KMeansConfig};
//! use ndarray::Array2;
//! use ndarray_rand::RandomExt;
//! use ndarray_rand::rand_distr::Uniform;
//!
//! let data = Array2::random((1000, 16), Uniform::new(-1.0, 1.0));
//!
//! let kmeans = KMeans::with_config(KMeansConfig::new(10).with_max_iters(50)).unwrap();
//! kmeans.learn(&data.view()).unwrap();
//!
//! // 1-based cluster ids, one per point
//! let assignments = kmeans.assignments();
//! assert_eq!(assignments.len(), 1000);
//! assert_eq!(kmeans.sizes().sum(), 1000);
//! ```
//!
//! ## Online Learning
//!
//! ```rust
//! use streamkmeans::{KMeans, OnlineConfig};
//! use crossbeam_channel::unbounded;
//! use ndarray::array;
//!
//! let kmeans = KMeans::new(10, 2)
//!     .unwrap()
//!     .with_online(OnlineConfig::new(0.2, 2))
//!     .unwrap();
//!
//! let (observations, observations_rx) = unbounded();
//! let (done, done_rx) = unbounded();
//! let session = kmeans.online(observations_rx, done_rx).unwrap();
//!
//! observations.send(array![1.0, 1.0]).unwrap();
//! let event = session.events().recv().unwrap();
//! assert!(event.cluster < 2);
//!
//! done.send(()).unwrap();
//! session.wait();
//! assert_eq!(kmeans.assignments().len(), 1);
//! ```

mod algorithm;
mod config;
mod distance;
mod error;
mod kmeans;
mod online;

pub use algorithm::TrainReport;
pub use config::{ConvergenceRule, KMeansConfig, OnlineConfig, STABILITY_THRESHOLD};
pub use distance::{Distance, Euclidean, Manhattan};
pub use error::KMeansError;
pub use kmeans::{KMeans, Phase};
pub use online::{OnlineEvent, OnlineSession};
