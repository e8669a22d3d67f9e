//! Output formatting for CLI results

use anyhow::Result;
use colorful::Colorful;
use serde::Serialize;

use crate::core::engine::Comparison;
use crate::core::lsh::QueryResponse;
use crate::core::model::Neighbor;
use crate::core::scanner::ScanSummary;
use crate::storage::{Store, Track, TrackId};

/// Print any result as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn track_label(store: &dyn Store, id: TrackId) -> String {
    match store.track(id) {
        Ok(Some(track)) => track.display_name(),
        _ => format!("track {}", id),
    }
}

pub fn print_scan_summary(summary: &ScanSummary) {
    let status = if summary.cancelled {
        "⚠ CANCELLED".yellow()
    } else if summary.failed > 0 {
        "✓ DONE WITH ERRORS".yellow()
    } else {
        "✓ DONE".green()
    };
    println!("{}", status);
    println!("  Indexed: {}", summary.indexed);
    println!("  Skipped (unchanged): {}", summary.skipped);
    if summary.failed > 0 {
        println!("  Failed: {}", summary.failed.to_string().red());
    }
    if summary.not_run > 0 {
        println!("  Not run (cancelled): {}", summary.not_run);
    }
    println!("  Elapsed: {:.1}s", summary.elapsed.as_secs_f64());
}

pub fn print_neighbors(neighbors: &[Neighbor], store: &dyn Store) {
    if neighbors.is_empty() {
        println!("{}", "No similar tracks found".yellow());
        return;
    }
    for (rank, n) in neighbors.iter().enumerate() {
        println!(
            "  {:>3}. {} {}",
            rank + 1,
            track_label(store, n.track_id).cyan(),
            format!("(distance {:.3})", n.distance).dim()
        );
    }
}

pub fn print_matches(response: &QueryResponse, store: &dyn Store, verbose: bool) {
    if let Some(failure) = &response.failure {
        println!("{} {}", "✗ NO MATCH".red(), failure.message);
        return;
    }
    for (rank, stats) in response.matches.iter().enumerate() {
        println!(
            "  {:>3}. {} {}",
            rank + 1,
            track_label(store, stats.track_id).cyan(),
            format!(
                "(score {:.1}, min hamming {}, jaccard {:.2})",
                stats.score(),
                stats.min_hamming,
                stats.similarity
            )
            .dim()
        );
        if verbose {
            println!(
                "       occurrences {}, votes {} (max {}), hamming sum {}",
                stats.occurrences, stats.total_votes, stats.max_votes, stats.hamming_sum
            );
        }
    }
}

pub fn print_comparison(comparison: &Comparison) {
    match comparison.model_distance {
        Some(d) => println!("  Model distance: {:.4}", d),
        None => println!("  Model distance: {}", "unavailable (no model)".yellow()),
    }
    println!(
        "  Fingerprints: {} vs {}",
        comparison.fingerprints.0, comparison.fingerprints.1
    );
    match comparison.min_hamming() {
        Some(0) => println!("  Aligned Hamming: {}", "0 (identical fingerprints)".green()),
        Some(h) => println!("  Aligned Hamming: min {}", h),
        None => println!("  Aligned Hamming: {}", "no aligned fingerprints".yellow()),
    }
    println!("  Best Jaccard: {:.3}", comparison.best_jaccard);
}

pub fn print_tracks(tracks: &[Track]) {
    if tracks.is_empty() {
        println!("{}", "Store is empty".yellow());
        return;
    }
    for track in tracks {
        println!(
            "  {:>5}  {}  {:.1}s  {}",
            track.id,
            track.display_name().cyan(),
            track.duration_ms as f64 / 1000.0,
            track.path.display().to_string().dim()
        );
    }
}
