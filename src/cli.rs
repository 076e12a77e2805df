//! Command-line interface definitions and argument parsing

use clap::{Parser, ValueEnum};

use crate::pipeline::{ClusterConfig, ClusterSpace, PipelineConfig};

/// Video engagement clustering CLI over YouTube statistics
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// YouTube playlist ID to fetch statistics for (fetch mode)
    #[arg(short, long)]
    pub playlist: Option<String>,

    /// Path to an input CSV with video_id,views,likes,comments (offline mode)
    #[arg(short, long)]
    pub input: Option<String>,

    /// YouTube Data API key, required with --playlist
    #[arg(long)]
    pub api_key: Option<String>,

    /// Clustering strategy
    #[arg(long, value_enum, default_value = "kmeans")]
    pub strategy: Strategy,

    /// Number of clusters for the centroid strategy
    #[arg(short = 'k', long, default_value = "3")]
    pub clusters: usize,

    /// Neighborhood radius for the density strategy
    #[arg(long, default_value = "0.5")]
    pub eps: f64,

    /// Minimum neighbors (including the point itself) for a core point
    #[arg(long, default_value = "5")]
    pub min_samples: usize,

    /// Seed for reproducible centroid initialization
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Number of principal components to project onto
    #[arg(long, default_value = "2")]
    pub components: usize,

    /// Cluster and evaluate in the reduced space instead of the normalized one
    #[arg(long)]
    pub cluster_on_pca: bool,

    /// Output path for the joined results CSV
    #[arg(short, long, default_value = "clustering_results.csv")]
    pub output: String,

    /// Output path for the cluster scatter plot
    #[arg(long, default_value = "cluster_plot.png")]
    pub plot: String,

    /// Maximum iterations for the centroid strategy
    #[arg(long, default_value = "300")]
    pub max_iters: usize,

    /// Convergence tolerance for the centroid strategy
    #[arg(long, default_value = "1e-4")]
    pub tolerance: f64,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// Centroid-based partitioning (never emits noise)
    Kmeans,
    /// Density-based grouping with explicit noise designation
    Dbscan,
}

impl Args {
    /// Check the mode selection before any work starts.
    pub fn validate(&self) -> crate::Result<()> {
        match (&self.playlist, &self.input) {
            (None, None) => anyhow::bail!("either --playlist or --input must be given"),
            (Some(_), Some(_)) => {
                anyhow::bail!("--playlist and --input are mutually exclusive")
            }
            (Some(_), None) if self.api_key.is_none() => {
                anyhow::bail!("--api-key is required with --playlist")
            }
            _ => Ok(()),
        }
    }

    pub fn cluster_config(&self) -> ClusterConfig {
        match self.strategy {
            Strategy::Kmeans => ClusterConfig::Centroid {
                k: self.clusters,
                seed: self.seed,
                max_iters: self.max_iters,
                tolerance: self.tolerance,
            },
            Strategy::Dbscan => ClusterConfig::Density {
                eps: self.eps,
                min_samples: self.min_samples,
            },
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            cluster: self.cluster_config(),
            n_components: self.components,
            space: if self.cluster_on_pca {
                ClusterSpace::Reduced
            } else {
                ClusterSpace::Normalized
            },
        }
    }
}
