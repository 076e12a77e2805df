//! Feature table construction and CSV loading/export using Polars

use ndarray::{Array2, ArrayView1};
use polars::prelude::*;

/// Feature schema shared by every table in a run, in column order.
pub const FEATURE_COLUMNS: [&str; 4] = ["views", "likes", "comments", "engagement_rate"];

/// Raw per-video engagement counts as delivered by the acquisition layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoStats {
    pub video_id: String,
    pub views: u64,
    pub likes: u64,
    pub comments: u64,
}

/// One video together with its cluster assignment, ready for export.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusteredVideo {
    pub video_id: String,
    pub views: u64,
    pub likes: u64,
    pub comments: u64,
    pub engagement_rate: f64,
    pub cluster: i32,
}

/// The authoritative derivation of the engagement ratio.
///
/// Computed exactly once when a table is built from raw counts; every
/// downstream consumer (filtering, export, summaries) reuses the stored
/// column instead of re-deriving it. Zero views, or a non-finite ratio,
/// yields exactly 0.0.
pub fn engagement_rate(views: u64, likes: u64, comments: u64) -> f64 {
    if views == 0 {
        return 0.0;
    }
    let rate = (likes + comments) as f64 / views as f64;
    if rate.is_finite() {
        rate
    } else {
        0.0
    }
}

/// Ordered numeric feature table keyed by video id.
///
/// Row order is stable across transforms and `video_ids` is the join key
/// used to re-attach cluster labels to the original rows after filtering.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    /// Video ids, one per row, in row order
    pub video_ids: Vec<String>,
    /// Column names, in column order
    pub columns: Vec<String>,
    /// Feature values as ndarray (n_rows, n_columns)
    pub features: Array2<f64>,
}

impl FeatureTable {
    /// Build the feature table from raw counts, deriving `engagement_rate`.
    pub fn from_stats(stats: &[VideoStats]) -> Self {
        let mut values = Vec::with_capacity(stats.len() * FEATURE_COLUMNS.len());
        let mut video_ids = Vec::with_capacity(stats.len());

        for s in stats {
            video_ids.push(s.video_id.clone());
            values.extend_from_slice(&[
                s.views as f64,
                s.likes as f64,
                s.comments as f64,
                engagement_rate(s.views, s.likes, s.comments),
            ]);
        }

        let features = Array2::from_shape_vec((stats.len(), FEATURE_COLUMNS.len()), values)
            .expect("row-major stats buffer matches (n, 4)");

        FeatureTable {
            video_ids,
            columns: FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
            features,
        }
    }

    /// New table with the same ids but a different feature matrix, for
    /// transforms that keep every row (normalization, projection).
    pub fn with_features(&self, columns: Vec<String>, features: Array2<f64>) -> Self {
        assert_eq!(features.nrows(), self.video_ids.len());
        FeatureTable {
            video_ids: self.video_ids.clone(),
            columns,
            features,
        }
    }

    /// New table keeping only the rows at `keep`, in the given order.
    pub fn select_rows(&self, keep: &[usize]) -> Self {
        let mut values = Vec::with_capacity(keep.len() * self.features.ncols());
        let mut video_ids = Vec::with_capacity(keep.len());

        for &i in keep {
            video_ids.push(self.video_ids[i].clone());
            values.extend(self.features.row(i).iter().copied());
        }

        let features = Array2::from_shape_vec((keep.len(), self.features.ncols()), values)
            .expect("row-major selection buffer matches shape");

        FeatureTable {
            video_ids,
            columns: self.columns.clone(),
            features,
        }
    }

    pub fn n_rows(&self) -> usize {
        self.features.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.features.nrows() == 0
    }

    pub fn row(&self, i: usize) -> ArrayView1<'_, f64> {
        self.features.row(i)
    }
}

/// Load raw video statistics from a CSV with columns
/// `video_id,views,likes,comments` (the offline alternative to the API).
pub fn load_stats_csv(file_path: &str) -> crate::Result<Vec<VideoStats>> {
    let df = LazyCsvReader::new(file_path)
        .finish()?
        .select([
            col("video_id"),
            col("views").cast(DataType::Int64),
            col("likes").cast(DataType::Int64),
            col("comments").cast(DataType::Int64),
        ])
        .collect()?;

    if df.height() == 0 {
        anyhow::bail!("no rows found in {}", file_path);
    }

    let ids = df.column("video_id")?.utf8()?;
    let views = df.column("views")?.i64()?;
    let likes = df.column("likes")?.i64()?;
    let comments = df.column("comments")?.i64()?;

    let mut stats = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let video_id = ids
            .get(i)
            .ok_or_else(|| anyhow::anyhow!("missing video_id in row {}", i))?
            .to_string();
        let row = [views.get(i), likes.get(i), comments.get(i)];
        for (name, value) in ["views", "likes", "comments"].iter().zip(row) {
            if value.unwrap_or(0) < 0 {
                anyhow::bail!("negative {} for video {}", name, video_id);
            }
        }
        stats.push(VideoStats {
            video_id,
            views: row[0].unwrap_or(0) as u64,
            likes: row[1].unwrap_or(0) as u64,
            comments: row[2].unwrap_or(0) as u64,
        });
    }

    Ok(stats)
}

/// Write the joined result table as UTF-8 CSV with a header row.
///
/// Column order is stable: the original columns followed by `Cluster`.
pub fn export_results_csv(results: &[ClusteredVideo], file_path: &str) -> crate::Result<()> {
    let mut df = df!(
        "video_id" => results.iter().map(|r| r.video_id.as_str()).collect::<Vec<_>>(),
        "views" => results.iter().map(|r| r.views as i64).collect::<Vec<_>>(),
        "likes" => results.iter().map(|r| r.likes as i64).collect::<Vec<_>>(),
        "comments" => results.iter().map(|r| r.comments as i64).collect::<Vec<_>>(),
        "engagement_rate" => results.iter().map(|r| r.engagement_rate).collect::<Vec<_>>(),
        "Cluster" => results.iter().map(|r| i64::from(r.cluster)).collect::<Vec<_>>(),
    )?;

    let mut file = std::fs::File::create(file_path)?;
    CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;
    Ok(())
}
