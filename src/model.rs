//! Clustering engines: centroid (K-Means) and density (DBSCAN) strategies

use linfa::prelude::*;
use linfa_clustering::KMeans;
use linfa_nn::distance::L2Dist;
use ndarray::{Array1, Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::VecDeque;

use crate::EngageError;

/// Cluster assignment per row, in input row order.
///
/// The single concrete label type shared by both strategies and the
/// evaluator. −1 marks noise and is only ever produced by the density
/// strategy.
pub type LabelVector = Vec<i32>;

/// Conventional label for points density clustering could not assign.
pub const NOISE_LABEL: i32 = -1;

/// Independent k-means++ initializations; the lowest-inertia run wins.
const N_RUNS: usize = 10;

// Internal DBSCAN bookkeeping state, never emitted.
const UNVISITED: i32 = -2;

/// Fitted centroid-strategy result.
#[derive(Debug)]
pub struct KMeansOutcome {
    /// One label in [0, k) per row, in input row order
    pub labels: LabelVector,
    /// Cluster centroids in the clustering space
    pub centroids: Array2<f64>,
    /// Within-cluster sum of squares
    pub inertia: f64,
}

/// Fitted density-strategy result.
#[derive(Debug)]
pub struct DbscanOutcome {
    /// One label per row; −1 marks noise
    pub labels: LabelVector,
    /// Number of rows labeled noise
    pub n_noise: usize,
}

/// Partition rows into k groups by iterative nearest-centroid assignment.
///
/// Runs k-means++ with multi-start initialization under an explicit seed,
/// so identical input and seed reproduce identical labels.
pub fn fit_kmeans(
    features: &Array2<f64>,
    k: usize,
    seed: u64,
    max_iters: usize,
    tolerance: f64,
) -> crate::Result<KMeansOutcome> {
    let n_samples = features.nrows();
    if n_samples == 0 {
        return Err(EngageError::InvalidParameter(
            "cannot cluster an empty table".to_string(),
        )
        .into());
    }
    if k < 2 {
        return Err(EngageError::InvalidParameter(format!(
            "cluster count must be at least 2, got {}",
            k
        ))
        .into());
    }
    if k > n_samples {
        return Err(EngageError::InvalidParameter(format!(
            "cluster count {} exceeds the row count {}",
            k, n_samples
        ))
        .into());
    }

    let targets: Array1<usize> = Array1::zeros(n_samples);
    let dataset = Dataset::new(features.clone(), targets);

    let rng = StdRng::seed_from_u64(seed);
    let model = KMeans::params_with(k, rng, L2Dist)
        .n_runs(N_RUNS)
        .max_n_iterations(max_iters as u64)
        .tolerance(tolerance)
        .fit(&dataset)?;

    let assignments = model.predict(&dataset);
    let centroids = model.centroids().clone();
    let inertia = compute_inertia(features, &assignments, &centroids);
    let labels = assignments.iter().map(|&label| label as i32).collect();

    Ok(KMeansOutcome {
        labels,
        centroids,
        inertia,
    })
}

/// Group rows by local point density.
///
/// A core point has at least `min_samples` neighbors (itself included)
/// within `eps`; core points chain transitively into one group, border
/// points join an adjacent core's group, everything else is labeled −1.
/// Group numbering follows first-visit order, so identical input ordering
/// reproduces identical labels. Every point ending up as noise is a
/// valid terminal state, not an error.
pub fn fit_dbscan(
    features: &Array2<f64>,
    eps: f64,
    min_samples: usize,
) -> crate::Result<DbscanOutcome> {
    let n_samples = features.nrows();
    if n_samples == 0 {
        return Err(EngageError::InvalidParameter(
            "cannot cluster an empty table".to_string(),
        )
        .into());
    }
    if !(eps > 0.0) {
        return Err(EngageError::InvalidParameter(format!(
            "eps must be positive, got {}",
            eps
        ))
        .into());
    }
    if min_samples < 1 {
        return Err(EngageError::InvalidParameter(
            "min_samples must be at least 1".to_string(),
        )
        .into());
    }

    let mut labels: LabelVector = vec![UNVISITED; n_samples];
    let mut cluster_id = 0;

    for i in 0..n_samples {
        if labels[i] != UNVISITED {
            continue;
        }

        let neighbors = region_query(features, i, eps);
        if neighbors.len() < min_samples {
            labels[i] = NOISE_LABEL;
            continue;
        }

        labels[i] = cluster_id;
        let mut queue: VecDeque<usize> = neighbors.into();
        while let Some(j) = queue.pop_front() {
            if labels[j] == NOISE_LABEL {
                // Border point: reachable from a core point
                labels[j] = cluster_id;
            }
            if labels[j] != UNVISITED {
                continue;
            }
            labels[j] = cluster_id;

            let expanded = region_query(features, j, eps);
            if expanded.len() >= min_samples {
                queue.extend(expanded);
            }
        }

        cluster_id += 1;
    }

    let n_noise = labels.iter().filter(|&&l| l == NOISE_LABEL).count();
    Ok(DbscanOutcome { labels, n_noise })
}

/// Indices of all points within `eps` of point `i`, itself included.
fn region_query(features: &Array2<f64>, i: usize, eps: f64) -> Vec<usize> {
    let point = features.row(i);
    (0..features.nrows())
        .filter(|&j| euclidean_distance(&point, &features.row(j)) <= eps)
        .collect()
}

/// Compute within-cluster sum of squares (inertia)
fn compute_inertia(
    features: &Array2<f64>,
    labels: &Array1<usize>,
    centroids: &Array2<f64>,
) -> f64 {
    let mut inertia = 0.0;

    for (i, &cluster) in labels.iter().enumerate() {
        if cluster < centroids.nrows() {
            let point = features.row(i);
            let centroid = centroids.row(cluster);
            inertia += point
                .iter()
                .zip(centroid.iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>();
        }
    }

    inertia
}

/// Calculate Euclidean distance between two points
pub(crate) fn euclidean_distance(point1: &ArrayView1<f64>, point2: &ArrayView1<f64>) -> f64 {
    point1
        .iter()
        .zip(point2.iter())
        .map(|(a, b)| (a - b).powi(2))
        .sum::<f64>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Nine points in three tight, well-separated groups
    fn three_group_features() -> Array2<f64> {
        Array2::from_shape_vec(
            (9, 2),
            vec![
                0.0, 0.0, 0.1, 0.2, 0.2, 0.1, // near (0, 0)
                10.0, 10.0, 10.1, 10.2, 10.2, 10.1, // near (10, 10)
                20.0, 0.0, 20.1, 0.2, 20.2, 0.1, // near (20, 0)
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_kmeans_recovers_obvious_groups() {
        let features = three_group_features();
        let outcome = fit_kmeans(&features, 3, 42, 300, 1e-4).unwrap();

        assert_eq!(outcome.labels.len(), 9);
        assert_eq!(outcome.centroids.shape(), &[3, 2]);
        // Never emits the noise label
        assert!(outcome.labels.iter().all(|&l| (0..3).contains(&l)));
        // Points within each visual group share a label
        for group in [&outcome.labels[0..3], &outcome.labels[3..6], &outcome.labels[6..9]] {
            assert!(group.iter().all(|&l| l == group[0]));
        }
        // And the three groups get three distinct labels
        assert_ne!(outcome.labels[0], outcome.labels[3]);
        assert_ne!(outcome.labels[3], outcome.labels[6]);
        assert_ne!(outcome.labels[0], outcome.labels[6]);
    }

    #[test]
    fn test_kmeans_fixed_seed_is_reproducible() {
        let features = three_group_features();
        let first = fit_kmeans(&features, 3, 42, 300, 1e-4).unwrap();
        let second = fit_kmeans(&features, 3, 42, 300, 1e-4).unwrap();
        assert_eq!(first.labels, second.labels);
    }

    #[test]
    fn test_kmeans_invalid_parameters() {
        let features = three_group_features();

        // k below the useful minimum
        assert!(fit_kmeans(&features, 1, 42, 300, 1e-4).is_err());
        // k exceeding the row count
        assert!(fit_kmeans(&features, 10, 42, 300, 1e-4).is_err());
        // Empty input
        let empty = Array2::<f64>::zeros((0, 2));
        assert!(fit_kmeans(&empty, 2, 42, 300, 1e-4).is_err());
    }

    #[test]
    fn test_kmeans_inertia_is_finite_and_nonnegative() {
        let features = three_group_features();
        let outcome = fit_kmeans(&features, 3, 42, 300, 1e-4).unwrap();
        assert!(outcome.inertia.is_finite());
        assert!(outcome.inertia >= 0.0);
    }

    #[test]
    fn test_dbscan_single_group_when_eps_covers_everything() {
        let features = three_group_features();
        let outcome = fit_dbscan(&features, 1000.0, 1).unwrap();

        assert_eq!(outcome.labels, vec![0; 9]);
        assert_eq!(outcome.n_noise, 0);
    }

    #[test]
    fn test_dbscan_all_noise_when_eps_is_tiny() {
        let features = three_group_features();
        let outcome = fit_dbscan(&features, 1e-9, 2).unwrap();

        assert_eq!(outcome.labels, vec![NOISE_LABEL; 9]);
        assert_eq!(outcome.n_noise, 9);
    }

    #[test]
    fn test_dbscan_separates_groups_and_flags_outlier() {
        let mut values = three_group_features().into_raw_vec();
        values.extend_from_slice(&[100.0, 100.0]);
        let features = Array2::from_shape_vec((10, 2), values).unwrap();

        let outcome = fit_dbscan(&features, 1.0, 2).unwrap();

        assert_eq!(outcome.labels[0..3], [0, 0, 0]);
        assert_eq!(outcome.labels[3..6], [1, 1, 1]);
        assert_eq!(outcome.labels[6..9], [2, 2, 2]);
        assert_eq!(outcome.labels[9], NOISE_LABEL);
        assert_eq!(outcome.n_noise, 1);
    }

    #[test]
    fn test_dbscan_numbering_stable_for_identical_input() {
        let features = three_group_features();
        let first = fit_dbscan(&features, 1.0, 2).unwrap();
        let second = fit_dbscan(&features, 1.0, 2).unwrap();
        assert_eq!(first.labels, second.labels);
    }

    #[test]
    fn test_dbscan_invalid_parameters() {
        let features = three_group_features();
        assert!(fit_dbscan(&features, 0.0, 2).is_err());
        assert!(fit_dbscan(&features, -1.0, 2).is_err());
        assert!(fit_dbscan(&features, 0.5, 0).is_err());

        let empty = Array2::<f64>::zeros((0, 2));
        assert!(fit_dbscan(&empty, 0.5, 2).is_err());
    }
}
