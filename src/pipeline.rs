//! End-to-end orchestration: derive, filter, normalize, project, cluster,
//! evaluate, and join labels back onto the original rows

use std::collections::HashMap;

use crate::data::{ClusteredVideo, FeatureTable, VideoStats};
use crate::evaluate::{evaluate_clustering, EvaluationResult};
use crate::model::{fit_dbscan, fit_kmeans, LabelVector, NOISE_LABEL};
use crate::preprocess::{apply_pca, handle_outliers_iqr, normalize_minmax};
use crate::EngageError;

/// Strategy selection with its parameters.
#[derive(Debug, Clone)]
pub enum ClusterConfig {
    Centroid {
        k: usize,
        seed: u64,
        max_iters: usize,
        tolerance: f64,
    },
    Density {
        eps: f64,
        min_samples: usize,
    },
}

impl ClusterConfig {
    /// Noise convention the evaluator should apply for this strategy.
    fn noise_label(&self) -> Option<i32> {
        match self {
            ClusterConfig::Centroid { .. } => None,
            ClusterConfig::Density { .. } => Some(NOISE_LABEL),
        }
    }
}

/// The feature space clustering and evaluation run in. Both are valid
/// configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterSpace {
    Normalized,
    Reduced,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub cluster: ClusterConfig,
    /// Principal components to project onto
    pub n_components: usize,
    pub space: ClusterSpace,
}

/// Everything one run produces, for presentation and export.
#[derive(Debug)]
pub struct PipelineOutcome {
    /// Pre-filter table with the derived engagement rate
    pub raw: FeatureTable,
    /// Survivors of outlier filtering
    pub cleaned: FeatureTable,
    pub normalized: FeatureTable,
    /// Principal component projection, when the row count admits one
    pub reduced: Option<FeatureTable>,
    /// One label per cleaned row, in cleaned row order
    pub labels: LabelVector,
    pub evaluation: EvaluationResult,
    /// Original rows restricted to survivors, with labels attached
    pub results: Vec<ClusteredVideo>,
    /// Within-cluster sum of squares (centroid strategy only)
    pub inertia: Option<f64>,
    /// Rows labeled noise (density strategy only; centroid never emits noise)
    pub n_noise: usize,
}

/// Run the full analysis pipeline once, synchronously.
pub fn run_pipeline(stats: &[VideoStats], config: &PipelineConfig) -> crate::Result<PipelineOutcome> {
    let raw = FeatureTable::from_stats(stats);

    let cleaned = handle_outliers_iqr(&raw);
    if cleaned.is_empty() {
        return Err(EngageError::EmptyResult(format!(
            "no rows survived outlier filtering ({} in)",
            raw.n_rows()
        ))
        .into());
    }

    let (normalized, _params) = normalize_minmax(&cleaned);

    // The projection feeds the scatter plot even when clustering runs in
    // the normalized space, but it needs at least two rows to exist.
    let reduced = if config.space == ClusterSpace::Reduced || normalized.n_rows() >= 2 {
        Some(apply_pca(&normalized, config.n_components)?)
    } else {
        None
    };

    let space_table = match config.space {
        ClusterSpace::Reduced => reduced.as_ref().expect("projection computed above"),
        ClusterSpace::Normalized => &normalized,
    };

    let (labels, inertia, n_noise) = match &config.cluster {
        ClusterConfig::Centroid {
            k,
            seed,
            max_iters,
            tolerance,
        } => {
            let outcome = fit_kmeans(&space_table.features, *k, *seed, *max_iters, *tolerance)?;
            (outcome.labels, Some(outcome.inertia), 0)
        }
        ClusterConfig::Density { eps, min_samples } => {
            let outcome = fit_dbscan(&space_table.features, *eps, *min_samples)?;
            let n_noise = outcome.n_noise;
            (outcome.labels, None, n_noise)
        }
    };

    let evaluation =
        evaluate_clustering(&space_table.features, &labels, config.cluster.noise_label())?;

    let results = join_labels(stats, &raw, &cleaned, &labels)?;

    Ok(PipelineOutcome {
        raw,
        cleaned,
        normalized,
        reduced,
        labels,
        evaluation,
        results,
        inertia,
        n_noise,
    })
}

/// Attach labels to the original rows by retained video id.
///
/// The join is identifier-based, never positional: the cleaned table's id
/// list drives the output, so dropped rows can never shift a survivor's
/// label. The engagement rate is read back from the pre-filter table's
/// derived column rather than recomputed.
pub fn join_labels(
    stats: &[VideoStats],
    raw: &FeatureTable,
    cleaned: &FeatureTable,
    labels: &LabelVector,
) -> crate::Result<Vec<ClusteredVideo>> {
    if labels.len() != cleaned.n_rows() {
        return Err(EngageError::InvalidParameter(format!(
            "label vector length {} does not match the filtered row count {}",
            labels.len(),
            cleaned.n_rows()
        ))
        .into());
    }

    let by_id: HashMap<&str, usize> = raw
        .video_ids
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();

    let rate_column = raw
        .columns
        .iter()
        .position(|c| c == "engagement_rate")
        .expect("raw table carries the derived column");

    cleaned
        .video_ids
        .iter()
        .zip(labels)
        .map(|(id, &cluster)| {
            let &row = by_id.get(id.as_str()).ok_or_else(|| {
                anyhow::Error::from(EngageError::InvalidParameter(format!(
                    "surviving id {} is missing from the original table",
                    id
                )))
            })?;
            let source = &stats[row];
            Ok(ClusteredVideo {
                video_id: source.video_id.clone(),
                views: source.views,
                likes: source.likes,
                comments: source.comments,
                engagement_rate: raw.features[[row, rate_column]],
                cluster,
            })
        })
        .collect()
}

/// Mean feature values per cluster, for the per-cluster insight table.
/// Noise rows group under the noise label.
pub fn summarize_clusters(results: &[ClusteredVideo]) -> Vec<ClusterSummary> {
    let mut grouped: std::collections::BTreeMap<i32, Vec<&ClusteredVideo>> =
        std::collections::BTreeMap::new();
    for r in results {
        grouped.entry(r.cluster).or_default().push(r);
    }

    grouped
        .into_iter()
        .map(|(cluster, members)| {
            let n = members.len() as f64;
            ClusterSummary {
                cluster,
                size: members.len(),
                mean_views: members.iter().map(|m| m.views as f64).sum::<f64>() / n,
                mean_likes: members.iter().map(|m| m.likes as f64).sum::<f64>() / n,
                mean_comments: members.iter().map(|m| m.comments as f64).sum::<f64>() / n,
                mean_engagement_rate: members.iter().map(|m| m.engagement_rate).sum::<f64>() / n,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClusterSummary {
    pub cluster: i32,
    pub size: usize,
    pub mean_views: f64,
    pub mean_likes: f64,
    pub mean_comments: f64,
    pub mean_engagement_rate: f64,
}
