//! Logging macros with `format!`-style arguments.
//!
//! The level is checked before anything is formatted, and enabled messages are rendered
//! into a reused per-thread buffer, so disabled calls cost one atomic load.
//!
//! # Examples
//!
//! ```
//! use rust_log_engine::prelude::*;
//! use rust_log_engine::{info, warn};
//!
//! let manager = LogManager::new();
//! let logger = manager.get_logger("app").unwrap();
//!
//! // Disabled until the manager is initialized; nothing is formatted
//! info!(logger, "Server started");
//!
//! let port = 8080;
//! warn!(logger, "Port {} already in use", port);
//! ```

/// Log at an explicit level.
///
/// # Examples
///
/// ```
/// # use rust_log_engine::prelude::*;
/// # let manager = LogManager::new();
/// # let logger = manager.get_logger("app").unwrap();
/// use rust_log_engine::log;
/// log!(logger, LogLevel::Info, "Simple message");
/// log!(logger, LogLevel::Error, "Error code: {}", 500);
/// ```
#[macro_export]
macro_rules! log {
    ($logger:expr, $level:expr, $($arg:tt)+) => {{
        let logger = &$logger;
        let level: $crate::LogLevel = $level;
        if logger.is_enabled(level) {
            logger.log_fmt(level, format_args!($($arg)+));
        }
    }};
}

/// Log a trace-level message.
#[macro_export]
macro_rules! trace {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Trace, $($arg)+)
    };
}

/// Log a debug-level message.
#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Debug, $($arg)+)
    };
}

/// Log an info-level message.
///
/// # Examples
///
/// ```
/// # use rust_log_engine::prelude::*;
/// # let manager = LogManager::new();
/// # let logger = manager.get_logger("app").unwrap();
/// use rust_log_engine::info;
/// info!(logger, "Application started");
/// info!(logger, "Processing {} items", 100);
/// ```
#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Info, $($arg)+)
    };
}

/// Log a warning-level message.
#[macro_export]
macro_rules! warn {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Warn, $($arg)+)
    };
}

/// Log an error-level message.
///
/// # Examples
///
/// ```
/// # use rust_log_engine::prelude::*;
/// # let manager = LogManager::new();
/// # let logger = manager.get_logger("app").unwrap();
/// use rust_log_engine::error;
/// error!(logger, "Error code: {}, message: {}", 500, "Internal error");
/// ```
#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Error, $($arg)+)
    };
}

/// Log a fatal-level message.
#[macro_export]
macro_rules! fatal {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Fatal, $($arg)+)
    };
}

#[cfg(test)]
mod tests {
    use crate::core::{LogLevel, LogManager, LogManagerConfig, LoggerConfig, ProcessorKind};
    use crate::writers::MemoryWriter;
    use std::cell::Cell;
    use std::fmt;
    use std::sync::Arc;

    fn setup(level: LogLevel) -> (LogManager, Arc<MemoryWriter>) {
        let memory = Arc::new(MemoryWriter::new());
        let manager = LogManager::with_config(
            LogManagerConfig::new()
                .with_processor(ProcessorKind::Sync)
                .with_root(
                    LoggerConfig::root()
                        .with_minimum_level(level)
                        .with_writer(memory.clone()),
                ),
        )
        .unwrap();
        (manager, memory)
    }

    struct CountingDisplay<'a>(&'a Cell<usize>);

    impl fmt::Display for CountingDisplay<'_> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            self.0.set(self.0.get() + 1);
            f.write_str("counted")
        }
    }

    #[test]
    fn test_level_macros() {
        let (manager, memory) = setup(LogLevel::Trace);
        let logger = manager.get_logger("app").unwrap();

        trace!(logger, "trace {}", 1);
        debug!(logger, "debug {}", 2);
        info!(logger, "info {}", 3);
        warn!(logger, "warn {}", 4);
        error!(logger, "error {}", 5);
        fatal!(logger, "fatal {}", 6);
        log!(logger, LogLevel::Info, "plain");

        assert_eq!(
            memory.lines(),
            vec!["trace 1", "debug 2", "info 3", "warn 4", "error 5", "fatal 6", "plain"]
        );
    }

    #[test]
    fn test_disabled_level_skips_formatting() {
        let (manager, memory) = setup(LogLevel::Warn);
        let logger = manager.get_logger("app").unwrap();
        let calls = Cell::new(0);

        info!(logger, "{}", CountingDisplay(&calls));
        assert_eq!(calls.get(), 0);

        warn!(logger, "{}", CountingDisplay(&calls));
        assert_eq!(calls.get(), 1);
        assert_eq!(memory.lines(), vec!["counted"]);
    }

    #[test]
    fn test_logger_expression_evaluated_once() {
        let (manager, memory) = setup(LogLevel::Info);
        let evaluations = Cell::new(0);
        let get = || {
            evaluations.set(evaluations.get() + 1);
            manager.get_logger("app").unwrap()
        };

        info!(get(), "once");
        assert_eq!(evaluations.get(), 1);
        assert_eq!(memory.len(), 1);
    }
}
