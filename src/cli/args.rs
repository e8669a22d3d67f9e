//! CLI argument parsing with preset support

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use walkdir::WalkDir;

use crate::config::{AnalysisMethod, ConfigPreset, EngineConfig};
use crate::storage::TrackId;

/// Extensions picked up when scanning directories
pub const AUDIO_EXTENSIONS: [&str; 7] = ["flac", "wav", "mp3", "ogg", "m4a", "aac", "aiff"];

#[derive(Parser, Debug)]
#[command(name = "findsimilar", version)]
#[command(about = "Find similar-sounding tracks and duplicates by audio content")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Store file (defaults to the user data directory)
    #[arg(long, global = true, env = "FINDSIMILAR_STORE")]
    pub store: Option<PathBuf>,

    /// JSON configuration file; overrides --preset
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Configuration preset (default, full-frequency)
    #[arg(long, global = true, default_value = "full-frequency")]
    pub preset: String,

    /// Track model to build and search (scms, mandel-ellis)
    #[arg(long, global = true)]
    pub method: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Index audio files or directory trees
    Scan {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Worker threads (0 = one per core)
        #[arg(short = 'j', long, default_value_t = 0)]
        threads: usize,

        /// Re-index files whose contents are already stored
        #[arg(long)]
        rescan: bool,
    },

    /// Tracks whose model is closest to a file or to stored tracks
    Similar {
        /// Audio file to use as the seed
        file: Option<PathBuf>,

        /// Stored track ids to use as seeds (can repeat)
        #[arg(long = "id")]
        ids: Vec<TrackId>,

        #[arg(short = 'k', long)]
        top: Option<usize>,

        /// Only consider tracks within this fraction of the seed duration
        #[arg(long)]
        duration_filter: Option<f64>,
    },

    /// Find stored copies of a file through the fingerprint index
    Match {
        file: PathBuf,

        /// Minimum distinct hash tables a candidate must share (0 and 1 disable filtering)
        #[arg(short, long)]
        threshold: Option<usize>,

        #[arg(short = 'k', long)]
        top: Option<usize>,
    },

    /// Compare two files directly
    Compare { a: PathBuf, b: PathBuf },

    /// Render the log spectrogram and fingerprints of a file as PNG images
    Inspect {
        file: PathBuf,

        #[arg(long, default_value = "fingerprints")]
        images: PathBuf,
    },

    /// List indexed tracks
    Tracks,

    /// Print the effective configuration as JSON
    Config,
}

impl Args {
    /// Configuration from --config, else from --preset, with command overrides applied
    pub fn engine_config(&self) -> Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::load(path)
                .with_context(|| format!("failed to load configuration {}", path.display()))?,
            None => {
                let preset = ConfigPreset::from_name(&self.preset)
                    .ok_or_else(|| anyhow!("Unknown preset: {}", self.preset))?;
                EngineConfig::from_preset(preset)
            }
        };

        if let Some(name) = &self.method {
            config.scms.method =
                AnalysisMethod::from_name(name).ok_or_else(|| anyhow!("Unknown analysis method: {}", name))?;
        }

        match &self.command {
            Command::Similar { top, duration_filter, .. } => {
                if let Some(k) = top {
                    config.query.top_k = *k;
                }
                if duration_filter.is_some() {
                    config.query.duration_filter = *duration_filter;
                }
            }
            Command::Match { threshold, top, .. } => {
                if let Some(t) = threshold {
                    config.query.threshold_tables = *t;
                }
                if let Some(k) = top {
                    config.query.top_k = *k;
                }
            }
            _ => {}
        }
        config.validate().context("invalid configuration")?;
        Ok(config)
    }

    pub fn store_path(&self) -> Result<PathBuf> {
        match &self.store {
            Some(path) => Ok(path.clone()),
            None => dirs::data_dir()
                .map(|dir| dir.join("findsimilar").join("store.json"))
                .ok_or_else(|| anyhow!("no data directory on this platform, pass --store")),
        }
    }
}

fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| AUDIO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Audio files under each path, sorted and deduplicated
pub fn collect_audio_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_file() {
            if is_audio_file(path) {
                files.push(path.to_path_buf());
            }
        } else if path.is_dir() {
            files.extend(
                WalkDir::new(path)
                    .follow_links(true)
                    .into_iter()
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_type().is_file() && is_audio_file(e.path()))
                    .map(|e| e.into_path()),
            );
        }
    }
    files.sort();
    files.dedup();
    files
}
