//! Basic example demonstrating streamkmeans usage
//!
//! Run with: cargo run --example basic --release

use crossbeam_channel::unbounded;
use ndarray::{array, Array2};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use streamkmeans::{KMeans, KMeansConfig, OnlineConfig};

fn main() {
    println!("=== streamkmeans example ===\n");

    // Generate synthetic data: 3 clusters in 2D for easy visualization
    let n_samples = 300;
    let n_features = 2;
    let n_clusters = 3;

    println!("Generating {} samples with {} features...", n_samples, n_features);

    let centers = [[-5.0, -5.0], [0.0, 5.0], [5.0, -5.0]];
    let noise = Array2::random((n_samples, n_features), Uniform::new(-1.0, 1.0));
    let data = Array2::from_shape_fn((n_samples, n_features), |(i, j)| {
        centers[i % n_clusters][j] + noise[[i, j]]
    });

    println!("True cluster centers:");
    for (i, center) in centers.iter().enumerate() {
        println!("  Cluster {}: ({:.2}, {:.2})", i + 1, center[0], center[1]);
    }
    println!();

    // Configure and run batch k-means
    let config = KMeansConfig::new(n_clusters).with_max_iters(100).with_seed(42);

    println!("Running k-means with k={}...\n", n_clusters);

    let kmeans = KMeans::with_config(config)
        .expect("Invalid configuration")
        .with_online(OnlineConfig::new(0.1, n_features))
        .expect("Invalid online parameters");
    let report = kmeans.learn(&data.view()).expect("Training failed");

    println!(
        "Finished after {} rounds ({})",
        report.rounds,
        if report.converged { "converged" } else { "round budget exhausted" }
    );

    println!("\nLearned centroids:");
    for i in 1..=n_clusters {
        let centroid = kmeans.centroid(i).expect("Missing centroid");
        println!("  Centroid {}: ({:.4}, {:.4})", i, centroid[0], centroid[1]);
    }
    println!();

    let sizes = kmeans.sizes();
    println!("Cluster distribution:");
    for (i, count) in sizes.iter().enumerate() {
        println!(
            "  Cluster {}: {} samples ({:.1}%)",
            i + 1,
            count,
            (*count as f64 / n_samples as f64) * 100.0
        );
    }
    println!();

    // Keep refining the same centroids with a stream of new points
    println!("Streaming 3 new observations...");
    let (observations, observations_rx) = unbounded();
    let (done, done_rx) = unbounded();
    let session = kmeans
        .online(observations_rx, done_rx)
        .expect("Could not start online session");

    for observation in [array![-4.5, -5.5], array![0.5, 4.0], array![6.0, -4.0]] {
        observations.send(observation).expect("Session stopped early");
        let event = session.events().recv().expect("Session stopped early");
        println!(
            "  ({:.2}, {:.2}) -> Cluster {}",
            event.observation[0],
            event.observation[1],
            event.cluster + 1
        );
    }
    done.send(()).expect("Session stopped early");
    session.wait();

    println!(
        "\nDataset now holds {} points, sizes {:?}",
        kmeans.dataset_len(),
        kmeans.sizes().to_vec()
    );

    println!("\n=== Done! ===");
}
