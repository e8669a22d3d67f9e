// src/main.rs
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use findsimilar::cli::{self, Args};

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    // First Ctrl-C lets the in-flight tracks finish; the store is still saved
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::Relaxed);
        eprintln!("Stopping after the current tracks...");
    })
    .context("failed to install Ctrl-C handler")?;

    cli::run(args, cancel)
}
