use ndarray::{ArrayView1, ArrayView2, Zip};

/// A distance between two vectors of equal length.
///
/// Implementations are expected to be symmetric, non-negative and zero only
/// for identical inputs; the trainers rely on that without checking it.
/// Any `Fn(ArrayView1<f64>, ArrayView1<f64>) -> f64` closure is a `Distance`.
pub trait Distance: Send + Sync {
    fn distance(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64;
}

impl<F> Distance for F
where
    F: Fn(ArrayView1<f64>, ArrayView1<f64>) -> f64 + Send + Sync,
{
    #[inline]
    fn distance(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        self(a, b)
    }
}

/// L2 distance, the default strategy
#[derive(Debug, Clone, Copy, Default)]
pub struct Euclidean;

impl Distance for Euclidean {
    #[inline]
    fn distance(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        Zip::from(&a)
            .and(&b)
            .fold(0.0, |acc, &x, &y| acc + (x - y) * (x - y))
            .sqrt()
    }
}

/// L1 distance
#[derive(Debug, Clone, Copy, Default)]
pub struct Manhattan;

impl Distance for Manhattan {
    #[inline]
    fn distance(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        Zip::from(&a)
            .and(&b)
            .fold(0.0, |acc, &x, &y| acc + (x - y).abs())
    }
}

/// Find the centroid closest to `point`.
///
/// Returns the 0-based centroid index and its distance. Ties go to the lowest
/// index since only a strictly smaller distance replaces the current best.
/// `centroids` must have at least one row.
pub fn nearest_centroid(
    distance: &dyn Distance,
    point: ArrayView1<f64>,
    centroids: &ArrayView2<f64>,
) -> (usize, f64) {
    let mut best_label = 0;
    let mut best_dist = distance.distance(point, centroids.row(0));

    for (j, centroid) in centroids.outer_iter().enumerate().skip(1) {
        let dist = distance.distance(point, centroid);
        if dist < best_dist {
            best_dist = dist;
            best_label = j;
        }
    }

    (best_label, best_dist)
}

/// Same as [`nearest_centroid`] but ranks centroids by squared distance, as
/// the online trainer does.
pub fn nearest_centroid_squared(
    distance: &dyn Distance,
    point: ArrayView1<f64>,
    centroids: &ArrayView2<f64>,
) -> (usize, f64) {
    let mut best_label = 0;
    let mut best_dist = distance.distance(point, centroids.row(0)).powi(2);

    for (j, centroid) in centroids.outer_iter().enumerate().skip(1) {
        let dist = distance.distance(point, centroid).powi(2);
        if dist < best_dist {
            best_dist = dist;
            best_label = j;
        }
    }

    (best_label, best_dist)
}
