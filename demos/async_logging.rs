//! Async logging example
//!
//! Demonstrates the global manager with the async processor, several producer threads
//! and the overflow callback.
//!
//! Run with: cargo run --example async_logging

use rust_log_engine::info;
use rust_log_engine::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

fn main() -> Result<()> {
    println!("=== Rust Log Engine - Async Logging Example ===\n");

    let last_drop_total = Arc::new(AtomicU64::new(0));
    let drops = Arc::clone(&last_drop_total);

    let manager = LogManager::global();
    manager.initialize(
        LogManagerConfig::new()
            .with_processor(ProcessorKind::Async)
            .with_queue_capacity(256)
            .with_overflow_mode(OverflowMode::DropAndNotify)
            .with_overflow_callback(move |total| drops.store(total, Ordering::Relaxed))
            .with_root(
                LoggerConfig::root().with_writer(Arc::new(
                    ConsoleWriter::new().with_formatter(TemplateFormatter::new(LogTemplate::detailed())),
                )),
            )
            // Audit messages are never dropped
            .with_logger(LoggerConfig::new("audit").with_overflow_mode(OverflowMode::Block)),
    )?;

    println!("1. High-volume async logging:");
    let logger = manager.get_logger("app")?;
    for i in 0..100 {
        info!(logger, "Message #{}", i);
    }
    manager.flush()?;

    println!("\n2. Multi-threaded logging:");
    thread::scope(|scope| {
        for thread_id in 0..5 {
            let logger = manager.get_logger(&format!("app.worker{}", thread_id));
            let audit = manager.get_logger("audit");
            scope.spawn(move || {
                let (Ok(logger), Ok(audit)) = (logger, audit) else {
                    return;
                };
                for i in 0..20 {
                    info!(logger, "Thread {} - Message {}", thread_id, i);
                }
                info!(audit, "Worker {} finished", thread_id);
            });
        }
    });

    manager.shutdown()?;

    let diagnostics = manager.diagnostics();
    println!("\n3. Diagnostics after shutdown:");
    println!(
        "   processed={} dropped={} errors={} (callback saw {} drops)",
        diagnostics.processed_messages,
        diagnostics.dropped_messages,
        diagnostics.error_count,
        last_drop_total.load(Ordering::Relaxed)
    );

    println!("\n=== Example completed successfully! ===");
    Ok(())
}
