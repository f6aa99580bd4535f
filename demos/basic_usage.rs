//! Basic engine usage example
//!
//! Demonstrates synchronous logging to the console, per-logger levels and structured
//! properties.
//!
//! Run with: cargo run --example basic_usage

use rust_log_engine::prelude::*;
use rust_log_engine::{info, warn};
use std::sync::Arc;

fn main() -> Result<()> {
    println!("=== Rust Log Engine - Basic Usage Example ===\n");

    let console = Arc::new(ConsoleWriter::new());
    let manager = LogManager::with_config(
        LogManagerConfig::new()
            .with_processor(ProcessorKind::Sync)
            .with_root(
                LoggerConfig::root()
                    .with_minimum_level(LogLevel::Trace)
                    .with_writer(console),
            )
            .with_logger(LoggerConfig::new("app.db").with_minimum_level(LogLevel::Warn)),
    )?;

    println!("1. Logging at different levels:");
    let logger = manager.get_logger("app")?;
    logger.trace("This is a trace message");
    logger.debug("This is a debug message");
    logger.info("This is an info message");
    logger.warn("This is a warning message");
    logger.error("This is an error message");
    logger.fatal("This is a fatal message");

    println!("\n2. A more specific config raises the level for app.db:");
    let db = manager.get_logger("app.db")?;
    db.info("Info message (hidden)");
    db.warn("Warning message (visible)");

    println!("\n3. Formatting and structured properties:");
    let port = 8080;
    info!(logger, "Server listening on port {}", port);
    let props = LogProperties::new().with("UserId", 42).with("Name", "Ada");
    logger.log_properties(LogLevel::Info, "User signed in", &props);

    println!("\n4. Event ids and scopes:");
    let _request = logger.begin_scope(&LogProperties::new().with("RequestId", "r-17"));
    logger.log_with(
        LogLevel::Warn,
        &LogEventId::with_name(7, "OrderRejected"),
        "Order rejected",
        LogProperties::empty(),
        None,
    );
    warn!(db, "Slow query inside request scope");

    manager.shutdown()?;
    println!("\n=== Example completed successfully! ===");
    Ok(())
}
