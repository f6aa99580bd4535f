//! File logging example
//!
//! Demonstrates a rotating, compressed JSON log file next to console output.
//!
//! Run with: cargo run --example file_logging

use rust_log_engine::prelude::*;
use rust_log_engine::writers::FileFailureMode;
use rust_log_engine::{info, warn};
use std::sync::Arc;

fn main() -> Result<()> {
    println!("=== Rust Log Engine - File Logging Example ===\n");

    let file = Arc::new(FileLogWriter::new(
        FileLogWriterOptions::new("logs/application.log")
            .with_formatter(JsonFormatter::new())
            .with_max_file_size(4 * 1024)
            .with_rolling_interval(RollingInterval::Daily)
            .with_retained_file_count(3)
            .with_compression(true)
            .with_failure_mode(FileFailureMode::Ignore)
            .with_failure_callback(|failure| {
                eprintln!(
                    "log file {} failed: {} (retry: {})",
                    failure.path.display(),
                    failure.error,
                    failure.will_retry
                );
            }),
    )?);

    let manager = LogManager::with_config(
        LogManagerConfig::new().with_root(
            LoggerConfig::root()
                .with_minimum_level(LogLevel::Debug)
                .with_writer(file.clone())
                .with_writer_at(Arc::new(ConsoleWriter::new()), LogLevel::Warn),
        ),
    )?;
    let logger = manager.get_logger("app")?;

    println!("1. Logging to the file (warnings also reach the console):");
    logger.info("Application started");
    logger.debug("Loading configuration...");
    logger.warn("Using default settings for some options");
    logger.error("Failed to load optional plugin");

    println!("\n2. Enough volume to rotate the file:");
    for i in 1..=200 {
        info!(logger, "Processing item {}/200", i);
        if i % 50 == 0 {
            warn!(logger, "Checkpoint {} reached", i);
        }
    }

    manager.shutdown()?;

    println!("\n=== Example completed successfully! ===");
    println!("Active file: {}", file.path().display());
    for archive in file.archives() {
        println!("Archive:     {}", archive.display());
    }
    Ok(())
}
