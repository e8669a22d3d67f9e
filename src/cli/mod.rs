// src/cli/mod.rs
//
// Command-line interface module

mod args;
mod output;

use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{mpsc, Arc};
use std::thread;

use anyhow::{bail, Context, Result};
use colorful::Colorful;
use indicatif::{ProgressBar, ProgressStyle};
use log::debug;

use crate::core::engine::{Engine, EngineBuilder};
use crate::core::scanner::{CorpusScanner, ScanEvent};
use crate::core::visualization::{write_fingerprints, write_spectrogram, ImageConfig};
use crate::storage::{MemoryStore, TrackStore};

pub use args::{collect_audio_files, Args, Command, AUDIO_EXTENSIONS};
pub use output::{print_comparison, print_json, print_matches, print_neighbors, print_scan_summary, print_tracks};

/// Run one CLI command; `cancel` is raised by the Ctrl-C handler
pub fn run(args: Args, cancel: Arc<AtomicBool>) -> Result<()> {
    let config = args.engine_config()?;
    if let Command::Config = args.command {
        return print_json(&config);
    }

    let store_path = args.store_path()?;
    let store = Arc::new(
        MemoryStore::open(&store_path)
            .with_context(|| format!("failed to open store {}", store_path.display()))?,
    );
    let engine = EngineBuilder::new().config(config).store(store.clone()).build()?;
    debug!("store {} ({} tracks)", store_path.display(), store.track_count()?);

    match &args.command {
        Command::Scan { paths, threads, rescan } => {
            let files = collect_audio_files(paths);
            if files.is_empty() {
                println!("{}", "No audio files found!".red());
                return Ok(());
            }
            println!("Found {} audio file(s)\n", files.len());

            let mut scanner = CorpusScanner::new(engine).threads(*threads).cancel_flag(cancel);
            if *rescan {
                scanner = scanner.rescan_known();
            }
            let (tx, rx) = mpsc::channel();
            let progress = thread::spawn(move || drive_progress(rx));
            let result = scanner.events(tx).scan(&files);
            // The scanner owned the sender; the progress thread ends once it is dropped
            let _ = progress.join();
            let summary = result?;

            store
                .save(&store_path)
                .with_context(|| format!("failed to save store {}", store_path.display()))?;
            if args.json {
                print_json(&summary)?;
            } else {
                print_scan_summary(&summary);
            }
        }
        Command::Similar { file, ids, .. } => {
            let neighbors = match (file, ids.is_empty()) {
                (Some(path), _) => engine
                    .similar_to_file(path)
                    .with_context(|| format!("failed to analyze {}", path.display()))?,
                (None, false) => engine.similar_tracks(ids)?,
                (None, true) => bail!("pass a file or at least one --id"),
            };
            if args.json {
                print_json(&neighbors)?;
            } else {
                print_neighbors(&neighbors, engine.store());
            }
        }
        Command::Match { file, .. } => {
            let response = engine.match_file(file);
            if args.json {
                print_json(&response)?;
            } else {
                println!("Matching: {}", file.display().to_string().cyan());
                print_matches(&response, engine.store(), args.verbose);
            }
        }
        Command::Compare { a, b } => {
            let comparison = engine.compare_files(a, b)?;
            if args.json {
                print_json(&comparison)?;
            } else {
                println!("{} vs {}", a.display().to_string().cyan(), b.display().to_string().cyan());
                print_comparison(&comparison);
            }
        }
        Command::Inspect { file, images } => inspect(&engine, file, images)?,
        Command::Tracks => {
            let tracks = store.tracks()?;
            if args.json {
                print_json(&tracks)?;
            } else {
                print_tracks(&tracks);
            }
        }
        Command::Config => print_json(engine.config())?,
    }
    Ok(())
}

fn drive_progress(rx: mpsc::Receiver<ScanEvent>) {
    let bar = ProgressBar::hidden();
    for event in rx {
        match event {
            ScanEvent::Started { total } => {
                bar.set_length(total as u64);
                bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
                if let Ok(style) = ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
                {
                    bar.set_style(style.progress_chars("#>-"));
                }
            }
            ScanEvent::TrackDone { path, .. } | ScanEvent::TrackSkipped { path, .. } => {
                bar.set_message(path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default());
                bar.inc(1);
            }
            ScanEvent::TrackFailed { path, reason } => {
                bar.println(format!("  {} {}: {}", "✗".red(), path.display(), reason));
                bar.inc(1);
            }
            ScanEvent::Finished(_) => bar.finish_with_message("Scan complete"),
        }
    }
}

fn inspect(engine: &Engine, file: &Path, dir: &Path) -> Result<()> {
    let audio = engine
        .decode(file)
        .with_context(|| format!("failed to decode {}", file.display()))?;
    let config = engine.config();
    let fp = &config.fingerprint;
    let generator = engine.context().generator();

    let spectrum = generator.log_spectrogram(&audio.samples)?;
    let fingerprints = engine.fingerprints(&audio, &fp.stride)?;
    let stem = file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "track".to_string());

    std::fs::create_dir_all(dir)?;
    let image_config = ImageConfig::default();
    let spectrum_path = dir.join(format!("{}_spectrum.png", stem));
    write_spectrogram(&spectrum, &spectrum_path, &image_config)?;
    let written = write_fingerprints(&fingerprints, fp.fingerprint_length, fp.log_bins, dir, &stem, &image_config)?;

    println!("Inspecting: {}", file.display().to_string().cyan());
    println!("  Duration: {:.2}s", audio.duration_ms as f64 / 1000.0);
    println!("  Spectrogram: {} frames x {} bands", spectrum.rows(), spectrum.cols());
    println!(
        "  Fingerprints: {} ({} silent)",
        fingerprints.len(),
        fingerprints.iter().filter(|f| f.is_silent()).count()
    );
    println!("  Images saved to: {} ({} files)", dir.display(), written.len() + 1);
    Ok(())
}
