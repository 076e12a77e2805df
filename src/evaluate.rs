//! Unsupervised clustering quality scores: Silhouette, Davies-Bouldin and
//! Calinski-Harabasz

use ndarray::{Array1, Array2};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;

use crate::model::{euclidean_distance, LabelVector};
use crate::EngageError;

/// Quality scores for one clustering result.
///
/// Scores are absent exactly when fewer than two real groups exist (a
/// single cluster, or density clustering that produced only noise); the
/// note then explains why. All stored values are unrounded; use
/// [`EvaluationResult::display_json`] for the conventional display
/// rounding and keep comparisons on the raw fields.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationResult {
    /// Distinct group labels present, excluding the noise label
    pub cluster_count: usize,
    /// Mean silhouette coefficient, in [−1, 1], higher is better
    pub silhouette: Option<f64>,
    /// Davies-Bouldin index, lower is better
    pub davies_bouldin: Option<f64>,
    /// Calinski-Harabasz score, higher is better
    pub calinski_harabasz: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl EvaluationResult {
    /// Display rendering with the conventional rounding: silhouette and
    /// Davies-Bouldin to 4 decimal places, Calinski-Harabasz to 2.
    pub fn display_json(&self) -> serde_json::Value {
        json!({
            "cluster_count": self.cluster_count,
            "silhouette": self.silhouette.map(|v| round_to(v, 4)),
            "davies_bouldin": self.davies_bouldin.map(|v| round_to(v, 4)),
            "calinski_harabasz": self.calinski_harabasz.map(|v| round_to(v, 2)),
            "note": self.note.clone(),
        })
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Score a clustering of `features` described by `labels`.
///
/// `noise_label`, when given, marks rows excluded from both the group
/// count and every score (pass `Some(NOISE_LABEL)` for density results,
/// `None` for centroid results which never emit noise).
pub fn evaluate_clustering(
    features: &Array2<f64>,
    labels: &LabelVector,
    noise_label: Option<i32>,
) -> crate::Result<EvaluationResult> {
    if labels.len() != features.nrows() {
        return Err(EngageError::InvalidParameter(format!(
            "label vector length {} does not match the row count {}",
            labels.len(),
            features.nrows()
        ))
        .into());
    }

    // Members per real group, keyed by label for stable iteration
    let mut clusters: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
    for (i, &label) in labels.iter().enumerate() {
        if Some(label) != noise_label {
            clusters.entry(label).or_default().push(i);
        }
    }

    let cluster_count = clusters.len();
    if cluster_count <= 1 {
        return Ok(EvaluationResult {
            cluster_count,
            silhouette: None,
            davies_bouldin: None,
            calinski_harabasz: None,
            note: Some(
                "fewer than two clusters formed; quality scores are undefined".to_string(),
            ),
        });
    }

    Ok(EvaluationResult {
        cluster_count,
        silhouette: Some(silhouette(features, &clusters)),
        davies_bouldin: Some(davies_bouldin(features, &clusters)),
        calinski_harabasz: Some(calinski_harabasz(features, &clusters)),
        note: None,
    })
}

/// Mean over points of (b − a) / max(a, b), where a is the mean distance
/// to the point's own cluster and b the mean distance to the nearest
/// other cluster. Singleton clusters contribute 0.
fn silhouette(features: &Array2<f64>, clusters: &BTreeMap<i32, Vec<usize>>) -> f64 {
    let mut total = 0.0;
    let mut count = 0usize;

    for (&label, members) in clusters {
        for &i in members {
            let point = features.row(i);

            let a = if members.len() < 2 {
                0.0
            } else {
                members
                    .iter()
                    .filter(|&&j| j != i)
                    .map(|&j| euclidean_distance(&point, &features.row(j)))
                    .sum::<f64>()
                    / (members.len() - 1) as f64
            };

            let b = clusters
                .iter()
                .filter(|(&other, _)| other != label)
                .map(|(_, others)| {
                    others
                        .iter()
                        .map(|&j| euclidean_distance(&point, &features.row(j)))
                        .sum::<f64>()
                        / others.len() as f64
                })
                .fold(f64::INFINITY, f64::min);

            let s = if members.len() < 2 || a.max(b) == 0.0 {
                0.0
            } else {
                (b - a) / a.max(b)
            };

            total += s;
            count += 1;
        }
    }

    total / count as f64
}

/// Average over clusters of the worst (s_i + s_j) / d(c_i, c_j) ratio
/// against every other cluster, where s is the mean member distance to
/// the cluster centroid. Lower is better.
fn davies_bouldin(features: &Array2<f64>, clusters: &BTreeMap<i32, Vec<usize>>) -> f64 {
    let centroids: Vec<Array1<f64>> = clusters
        .values()
        .map(|members| centroid(features, members))
        .collect();
    let scatters: Vec<f64> = clusters
        .values()
        .zip(&centroids)
        .map(|(members, c)| {
            members
                .iter()
                .map(|&i| euclidean_distance(&features.row(i), &c.view()))
                .sum::<f64>()
                / members.len() as f64
        })
        .collect();

    let k = centroids.len();
    let mut total = 0.0;
    for i in 0..k {
        let mut worst = 0.0f64;
        for j in 0..k {
            if i == j {
                continue;
            }
            let separation = euclidean_distance(&centroids[i].view(), &centroids[j].view());
            if separation > 0.0 {
                worst = worst.max((scatters[i] + scatters[j]) / separation);
            }
        }
        total += worst;
    }

    total / k as f64
}

/// Ratio of between-cluster to within-cluster dispersion, scaled by
/// (n − k) / (k − 1). Higher is better. A zero within-dispersion
/// (every cluster collapsed to its centroid) scores 1.0.
fn calinski_harabasz(features: &Array2<f64>, clusters: &BTreeMap<i32, Vec<usize>>) -> f64 {
    let all_members: Vec<usize> = clusters.values().flatten().copied().collect();
    let overall = centroid(features, &all_members);
    let n = all_members.len();
    let k = clusters.len();

    let mut between = 0.0;
    let mut within = 0.0;
    for members in clusters.values() {
        let c = centroid(features, members);
        let gap = euclidean_distance(&c.view(), &overall.view());
        between += members.len() as f64 * gap * gap;
        for &i in members {
            let d = euclidean_distance(&features.row(i), &c.view());
            within += d * d;
        }
    }

    if within == 0.0 {
        return 1.0;
    }
    (between / (k as f64 - 1.0)) / (within / (n as f64 - k as f64))
}

fn centroid(features: &Array2<f64>, members: &[usize]) -> Array1<f64> {
    let mut c = Array1::zeros(features.ncols());
    for &i in members {
        c += &features.row(i);
    }
    c / members.len() as f64
}
