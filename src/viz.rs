//! Visualization functions using Plotters for cluster analysis

use plotters::prelude::*;

use crate::data::{ClusteredVideo, FeatureTable};
use crate::model::{LabelVector, NOISE_LABEL};
use crate::pipeline::summarize_clusters;

/// Color palette for different clusters
const CLUSTER_COLORS: [RGBColor; 5] = [RED, BLUE, GREEN, YELLOW, MAGENTA];

fn cluster_color(label: i32) -> RGBColor {
    if label == NOISE_LABEL {
        return BLACK;
    }
    CLUSTER_COLORS
        .get(label as usize)
        .copied()
        .unwrap_or(BLACK)
}

/// Scatter plot of the clustering space (first two columns) colored by
/// cluster, with noise drawn in black.
pub fn create_cluster_scatter(
    space: &FeatureTable,
    labels: &LabelVector,
    output_path: &str,
    plot_title: Option<&str>,
) -> crate::Result<()> {
    if space.n_features() < 2 {
        anyhow::bail!("scatter plot needs at least two feature columns");
    }

    let title = plot_title.unwrap_or("Video Engagement Clusters");
    let xs: Vec<f64> = space.features.column(0).to_vec();
    let ys: Vec<f64> = space.features.column(1).to_vec();

    // Plot bounds with some padding
    let x_min = xs.iter().fold(f64::INFINITY, |a, &b| a.min(b)) - 0.5;
    let x_max = xs.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b)) + 0.5;
    let y_min = ys.iter().fold(f64::INFINITY, |a, &b| a.min(b)) - 0.5;
    let y_max = ys.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b)) + 0.5;

    let root = BitMapBackend::new(output_path, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)?;

    chart
        .configure_mesh()
        .x_desc(space.columns[0].as_str())
        .y_desc(space.columns[1].as_str())
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    for (i, (&x, &y)) in xs.iter().zip(ys.iter()).enumerate() {
        let color = cluster_color(labels[i]);
        chart.draw_series(std::iter::once(Circle::new((x, y), 4, color.filled())))?;
    }

    root.present()?;
    println!("Cluster scatter saved to: {}", output_path);

    Ok(())
}

/// Bar chart of cluster sizes; the noise group appears at −1.
pub fn create_cluster_size_chart(labels: &LabelVector, output_path: &str) -> crate::Result<()> {
    let mut sizes: std::collections::BTreeMap<i32, usize> = std::collections::BTreeMap::new();
    for &label in labels {
        *sizes.entry(label).or_insert(0) += 1;
    }
    if sizes.is_empty() {
        anyhow::bail!("no labels to chart");
    }

    let max_size = *sizes.values().max().unwrap_or(&1) as f64;
    let min_label = *sizes.keys().next().unwrap() as f64;
    let max_label = *sizes.keys().last().unwrap() as f64;

    let root = BitMapBackend::new(output_path, (600, 400)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Cluster Sizes", ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d((min_label - 1.0)..(max_label + 1.0), 0f64..(max_size * 1.1))?;

    chart
        .configure_mesh()
        .x_desc("Cluster")
        .y_desc("Number of Videos")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    for (&label, &size) in &sizes {
        let color = cluster_color(label);
        chart.draw_series(std::iter::once(Rectangle::new(
            [
                (label as f64 - 0.4, 0.0),
                (label as f64 + 0.4, size as f64),
            ],
            color.filled(),
        )))?;
    }

    root.present()?;
    println!("Cluster size chart saved to: {}", output_path);

    Ok(())
}

/// Print per-cluster mean statistics to the console.
pub fn print_cluster_summary(results: &[ClusteredVideo]) {
    println!("\n=== Cluster Summary ===");
    println!("  Cluster |  Size |     Views |    Likes | Comments | Engagement");
    println!("  --------|-------|-----------|----------|----------|-----------");
    for summary in summarize_clusters(results) {
        println!(
            "  {:7} | {:5} | {:9.2} | {:8.2} | {:8.2} | {:10.4}",
            summary.cluster,
            summary.size,
            summary.mean_views,
            summary.mean_likes,
            summary.mean_comments,
            summary.mean_engagement_rate
        );
    }
}

/// Generate the scatter and size charts for one pipeline outcome.
pub fn generate_visualization_report(
    space: &FeatureTable,
    labels: &LabelVector,
    base_output_path: &str,
) -> crate::Result<()> {
    create_cluster_scatter(space, labels, base_output_path, None)?;

    let size_chart_path = base_output_path.replace(".png", "_sizes.png");
    create_cluster_size_chart(labels, &size_chart_path)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use std::path::Path;
    use tempfile::tempdir;

    fn test_space_and_labels() -> (FeatureTable, LabelVector) {
        let features = Array2::from_shape_vec(
            (6, 2),
            vec![0.0, 0.0, 0.1, 0.1, 0.2, 0.2, 0.9, 0.9, 1.0, 1.0, 0.5, 0.5],
        )
        .unwrap();
        let space = FeatureTable {
            video_ids: (0..6).map(|i| format!("v{}", i)).collect(),
            columns: vec!["PC1".to_string(), "PC2".to_string()],
            features,
        };
        let labels = vec![0, 0, 0, 1, 1, NOISE_LABEL];
        (space, labels)
    }

    #[test]
    fn test_create_cluster_scatter() {
        let (space, labels) = test_space_and_labels();
        let temp_dir = tempdir().unwrap();
        let output_path = temp_dir.path().join("test_plot.png");
        let output_str = output_path.to_str().unwrap();

        create_cluster_scatter(&space, &labels, output_str, None).unwrap();
        assert!(Path::new(output_str).exists());
    }

    #[test]
    fn test_create_cluster_size_chart() {
        let (_, labels) = test_space_and_labels();
        let temp_dir = tempdir().unwrap();
        let output_path = temp_dir.path().join("test_sizes.png");
        let output_str = output_path.to_str().unwrap();

        create_cluster_size_chart(&labels, output_str).unwrap();
        assert!(Path::new(output_str).exists());
    }

    #[test]
    fn test_generate_visualization_report() {
        let (space, labels) = test_space_and_labels();
        let temp_dir = tempdir().unwrap();
        let output_path = temp_dir.path().join("test_report.png");
        let output_str = output_path.to_str().unwrap();

        generate_visualization_report(&space, &labels, output_str).unwrap();
        assert!(Path::new(output_str).exists());
        assert!(temp_dir.path().join("test_report_sizes.png").exists());
    }

    #[test]
    fn test_cluster_color_noise_is_black() {
        assert_eq!(cluster_color(NOISE_LABEL), BLACK);
        assert_eq!(cluster_color(0), RED);
        assert_eq!(cluster_color(99), BLACK);
    }
}
