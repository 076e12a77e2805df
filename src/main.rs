//! EngageLens: video engagement clustering CLI
//!
//! This is the main entrypoint that orchestrates data acquisition, the
//! analysis pipeline, visualization, and CSV export.

use anyhow::Result;
use clap::Parser;
use engagelens::fetch::{ApiConfig, YouTubeClient};
use engagelens::{data, run_pipeline, viz, Args, VideoStats};
use std::time::Instant;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();
    args.validate()?;

    if args.verbose {
        println!("EngageLens - Video Engagement Clustering");
        println!("========================================\n");
    }

    let start_time = Instant::now();

    // Step 1: Acquire video statistics
    if args.verbose {
        println!("Step 1: Acquiring video statistics");
    }
    let fetch_start = Instant::now();
    let stats = acquire_stats(&args)?;
    let fetch_time = fetch_start.elapsed();

    println!("✓ Statistics acquired: {} videos", stats.len());
    if args.verbose {
        println!("  Acquisition time: {:.2}s", fetch_time.as_secs_f64());
    }

    // Step 2: Run the analysis pipeline
    if args.verbose {
        println!("\nStep 2: Running the analysis pipeline");
        println!("  Strategy: {:?}", args.strategy);
        println!("  Components: {}", args.components);
        println!("  Seed: {}", args.seed);
    }

    let pipeline_start = Instant::now();
    let config = args.pipeline_config();
    let outcome = run_pipeline(&stats, &config)?;
    let pipeline_time = pipeline_start.elapsed();

    println!(
        "✓ Pipeline complete: {} of {} rows survived outlier filtering",
        outcome.cleaned.n_rows(),
        outcome.raw.n_rows()
    );
    if args.verbose {
        println!("  Pipeline time: {:.2}s", pipeline_time.as_secs_f64());
    }
    if let Some(inertia) = outcome.inertia {
        println!("  Within-cluster sum of squares: {:.2}", inertia);
    }
    if outcome.n_noise > 0 {
        println!("  Noise points: {}", outcome.n_noise);
    }

    // Step 3: Report evaluation and per-cluster statistics
    println!("\n=== Clustering Evaluation ===");
    println!(
        "{}",
        serde_json::to_string_pretty(&outcome.evaluation.display_json())?
    );

    viz::print_cluster_summary(&outcome.results);

    // Step 4: Export the joined result table
    data::export_results_csv(&outcome.results, &args.output)?;
    println!("\n✓ Results exported to: {}", args.output);

    // Step 5: Generate visualizations
    let plot_space = outcome.reduced.as_ref().unwrap_or(&outcome.normalized);
    viz::generate_visualization_report(plot_space, &outcome.labels, &args.plot)?;

    let total_time = start_time.elapsed();
    println!("\n=== Analysis Complete ===");
    println!("Total processing time: {:.2}s", total_time.as_secs_f64());

    Ok(())
}

/// Fetch statistics from the API or load them from a local CSV.
fn acquire_stats(args: &Args) -> Result<Vec<VideoStats>> {
    if let Some(playlist_id) = &args.playlist {
        let api_key = args
            .api_key
            .as_ref()
            .expect("validated: --api-key accompanies --playlist");
        let client = YouTubeClient::new(ApiConfig::new(api_key.clone()));

        if args.verbose {
            println!("  Fetching playlist: {}", playlist_id);
        }
        let video_ids = client.playlist_video_ids(playlist_id)?;
        if args.verbose {
            println!("  Playlist contains {} videos", video_ids.len());
        }
        client.video_statistics(&video_ids)
    } else {
        let input = args.input.as_ref().expect("validated: one mode is set");
        if args.verbose {
            println!("  Loading CSV: {}", input);
        }
        data::load_stats_csv(input)
    }
}
