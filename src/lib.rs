//! # Rust Log Engine
//!
//! An in-process structured logging engine. Applications log through cheap [`Logger`]
//! handles; the engine routes messages through a hierarchical configuration, buffers them
//! in pooled slots on a lock-free queue, renders them with template or JSON formatters and
//! persists them to rotating files.
//!
//! ## Features
//!
//! - **Async transport**: one consumer thread, bounded queue with `Block`, `Drop`,
//!   `DropAndNotify` and `Allocate` overflow modes
//! - **Pooled messages**: steady-state logging reuses message slots and property buffers
//! - **Structured data**: properties, nested thread-local scopes, event ids, captured errors
//! - **Templates**: `{Timestamp} {Level:tri} {LoggerName}: {Text}` with alignment and
//!   conditional sections; output is tagged with segments for coloring
//! - **Durable files**: size and interval rotation, retention, gzip archives, failure modes
//!
//! ## Example
//!
//! ```
//! use rust_log_engine::prelude::*;
//! use rust_log_engine::info;
//! use std::sync::Arc;
//!
//! let memory = Arc::new(MemoryWriter::new());
//! let manager = LogManager::with_config(
//!     LogManagerConfig::new()
//!         .with_root(LoggerConfig::root().with_writer(memory.clone()))
//!         .with_logger(LoggerConfig::new("app.db").with_minimum_level(LogLevel::Warn)),
//! )
//! .unwrap();
//!
//! let logger = manager.get_logger("app.http").unwrap();
//! info!(logger, "listening on port {}", 8080);
//! manager.flush().unwrap();
//!
//! assert_eq!(memory.lines(), vec!["listening on port 8080"]);
//! ```

pub mod core;
pub mod formatters;
pub mod macros;
pub mod writers;

pub mod prelude {
    pub use crate::core::{
        LogEventId, LogException, LogLevel, LogManager, LogManagerConfig, LogProperties,
        LogScope, LogWriter, Logger, LoggerConfig, LoggerError, OverflowMode, ProcessorKind,
        Result, TimestampFormat,
    };
    pub use crate::formatters::{JsonFormatter, JsonSchema, LogTemplate, TemplateFormatter};
    #[cfg(feature = "console")]
    pub use crate::writers::ConsoleWriter;
    #[cfg(feature = "file")]
    pub use crate::writers::{FileLogWriter, FileLogWriterOptions, RollingInterval};
    pub use crate::writers::{MemoryWriter, StreamWriter};
}

pub use core::{
    LogEventId, LogException, LogLevel, LogManager, LogManagerConfig, LogManagerDiagnostics,
    LogProperties, LogScope, LogWriter, Logger, LoggerConfig, LoggerError, LoggerMetrics,
    OverflowMode, ProcessorKind, Result, TimestampFormat, DEFAULT_SHUTDOWN_TIMEOUT,
};
