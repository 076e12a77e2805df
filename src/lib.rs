//! EngageLens: a Rust CLI for clustering video audiences by engagement
//!
//! This library fetches per-video engagement statistics (views, likes,
//! comments) from the YouTube Data API or a local CSV, cleans and rescales
//! them, groups the videos into behaviorally similar clusters and scores
//! the clustering quality.

pub mod cli;
pub mod data;
pub mod evaluate;
pub mod fetch;
pub mod model;
pub mod pipeline;
pub mod preprocess;
pub mod viz;

use thiserror::Error;

// Re-export public items for easier access
pub use cli::{Args, Strategy};
pub use data::{FeatureTable, VideoStats, FEATURE_COLUMNS};
pub use evaluate::{evaluate_clustering, EvaluationResult};
pub use model::{fit_dbscan, fit_kmeans, DbscanOutcome, KMeansOutcome, LabelVector, NOISE_LABEL};
pub use pipeline::{run_pipeline, ClusterConfig, ClusterSpace, PipelineConfig, PipelineOutcome};

/// Common result type used throughout the application
pub type Result<T> = anyhow::Result<T>;

/// Run-aborting conditions surfaced to the caller.
///
/// Degenerate-but-valid clustering outcomes (every point labeled noise, a
/// single cluster) are not represented here; those flow through to
/// [`EvaluationResult`] with absent scores and a diagnostic note.
#[derive(Debug, Error)]
pub enum EngageError {
    /// The remote statistics service returned an error payload. The remote
    /// message is carried verbatim.
    #[error("upstream data error: {0}")]
    Upstream(String),

    /// Zero rows survived outlier filtering, so there is nothing to
    /// normalize or cluster.
    #[error("empty result: {0}")]
    EmptyResult(String),

    /// A caller-supplied parameter is out of range for the input at hand.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}
