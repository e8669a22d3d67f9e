// src/core/scanner.rs
//
// Parallel corpus ingest with cooperative cancellation and progress events.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::{info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::engine::{Engine, IndexOutcome};
use crate::error::{FindSimilarError, Result};
use crate::storage::TrackId;

/// Progress notifications emitted while scanning
#[derive(Debug, Clone)]
pub enum ScanEvent {
    Started { total: usize },
    TrackDone { path: PathBuf, outcome: IndexOutcome },
    /// File contents already indexed under `existing`
    TrackSkipped { path: PathBuf, existing: TrackId },
    TrackFailed { path: PathBuf, reason: String },
    Finished(ScanSummary),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub total: usize,
    pub indexed: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Files left untouched because the scan was cancelled first
    pub not_run: usize,
    /// Stopped early through the cancellation flag
    pub cancelled: bool,
    pub elapsed: Duration,
}

enum FileStatus {
    Indexed,
    Skipped,
    Failed,
    NotRun,
}

/// Hex MD5 of a file's contents
pub fn file_digest(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    Ok(format!("{:x}", md5::compute(bytes)))
}

/// Ingests many files on a bounded worker pool.
///
/// Each worker runs the whole decode, analyze and store pipeline for one
/// file. Cancellation is checked between files; a file already in flight
/// is finished first.
pub struct CorpusScanner {
    engine: Engine,
    threads: usize,
    cancel: Arc<AtomicBool>,
    events: Option<Sender<ScanEvent>>,
    skip_known: bool,
}

impl CorpusScanner {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            threads: 0,
            cancel: Arc::new(AtomicBool::new(false)),
            events: None,
            skip_known: true,
        }
    }

    /// Worker count; 0 uses one per core
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn events(mut self, sender: Sender<ScanEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    /// Re-index files whose digest is already stored
    pub fn rescan_known(mut self) -> Self {
        self.skip_known = false;
        self
    }

    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    fn emit(sender: &Option<Sender<ScanEvent>>, event: ScanEvent) {
        if let Some(tx) = sender {
            // A dropped receiver only means nobody is watching
            let _ = tx.send(event);
        }
    }

    /// Index every file, returning once all workers are idle.
    ///
    /// Per-file input and numerical failures are logged and counted. The
    /// first configuration or storage error stops the remaining files and
    /// is returned.
    pub fn scan(&self, files: &[PathBuf]) -> Result<ScanSummary> {
        let started = Instant::now();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .build()
            .map_err(|e| FindSimilarError::InvalidConfig(format!("cannot start worker pool: {}", e)))?;

        Self::emit(&self.events, ScanEvent::Started { total: files.len() });
        info!("scanning {} files", files.len());

        let abort = AtomicBool::new(false);
        let fatal: Mutex<Option<FindSimilarError>> = Mutex::new(None);

        let statuses: Vec<FileStatus> = pool.install(|| {
            files
                .par_iter()
                .map_with(self.events.clone(), |events, path| {
                    if self.cancel.load(Ordering::Relaxed) || abort.load(Ordering::Relaxed) {
                        return FileStatus::NotRun;
                    }
                    match self.scan_file(path) {
                        Ok(ScanOutcome::Indexed(outcome)) => {
                            Self::emit(events, ScanEvent::TrackDone { path: path.clone(), outcome });
                            FileStatus::Indexed
                        }
                        Ok(ScanOutcome::Known(existing)) => {
                            Self::emit(events, ScanEvent::TrackSkipped { path: path.clone(), existing });
                            FileStatus::Skipped
                        }
                        Err(e) if e.is_recoverable() => {
                            warn!("skipping {}: {}", path.display(), e);
                            Self::emit(
                                events,
                                ScanEvent::TrackFailed { path: path.clone(), reason: e.to_string() },
                            );
                            FileStatus::Failed
                        }
                        Err(e) => {
                            abort.store(true, Ordering::Relaxed);
                            Self::emit(
                                events,
                                ScanEvent::TrackFailed { path: path.clone(), reason: e.to_string() },
                            );
                            if let Ok(mut slot) = fatal.lock() {
                                slot.get_or_insert(e);
                            }
                            FileStatus::Failed
                        }
                    }
                })
                .collect()
        });

        if let Some(e) = fatal.into_inner().ok().flatten() {
            return Err(e);
        }

        let mut summary = ScanSummary {
            total: files.len(),
            ..ScanSummary::default()
        };
        for status in &statuses {
            match status {
                FileStatus::Indexed => summary.indexed += 1,
                FileStatus::Skipped => summary.skipped += 1,
                FileStatus::Failed => summary.failed += 1,
                FileStatus::NotRun => {
                    summary.not_run += 1;
                    summary.cancelled = true;
                }
            }
        }
        summary.elapsed = started.elapsed();

        info!(
            "scan finished: {} indexed, {} skipped, {} failed{} in {:.1}s",
            summary.indexed,
            summary.skipped,
            summary.failed,
            if summary.cancelled { " (cancelled)" } else { "" },
            summary.elapsed.as_secs_f64()
        );
        Self::emit(&self.events, ScanEvent::Finished(summary.clone()));
        Ok(summary)
    }

    fn scan_file(&self, path: &Path) -> Result<ScanOutcome> {
        let digest = file_digest(path)?;
        if self.skip_known {
            if let Some(track) = self.engine.store().find_by_digest(&digest)? {
                return Ok(ScanOutcome::Known(track.id));
            }
        }
        Ok(ScanOutcome::Indexed(self.engine.index_file(path, Some(digest))?))
    }
}

enum ScanOutcome {
    Indexed(IndexOutcome),
    Known(TrackId),
}
