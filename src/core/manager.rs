//! Logger registry, configuration lifecycle and diagnostics

use super::config::{validate_logger_name, LogManagerConfig};
use super::error::{LoggerError, Result};
use super::logger::{Logger, LoggerShared};
use super::metrics::LoggerMetrics;
use super::processor::{LogProcessor, ProcessorKind, DEFAULT_SHUTDOWN_TIMEOUT};
use super::resolver::{resolve, ComputedLoggerState};
use super::writer::LogWriter;
use parking_lot::{Mutex, MutexGuard, RwLock};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

static GLOBAL: LazyLock<LogManager> = LazyLock::new(LogManager::new);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Uninitialized,
    Running,
    Stopped,
}

struct Applied {
    status: Status,
    config: LogManagerConfig,
    processor: Option<Arc<LogProcessor>>,
    /// Every writer any applied configuration referenced; disposed at shutdown
    writers: Vec<Arc<dyn LogWriter>>,
}

/// Read-only snapshot of the manager's health
#[derive(Debug, Clone, Serialize)]
pub struct LogManagerDiagnostics {
    pub is_initialized: bool,
    pub processor_kind: ProcessorKind,
    pub is_async: bool,
    pub queue_length: usize,
    pub queue_capacity: usize,
    pub dropped_messages: u64,
    pub error_count: u64,
    pub processed_messages: u64,
    pub configuration_version: u64,
    pub logger_count: usize,
}

/// Owns the configuration, the processor and every logger.
///
/// Lifecycle: [`new`](Self::new) (uninitialized) → [`initialize`](Self::initialize) →
/// [`shutdown`](Self::shutdown). Loggers can be requested in any state; before
/// initialization they are disabled and become live once the manager starts, and after
/// shutdown they are disabled again.
///
/// Configuration changes are made on the editable copy returned by
/// [`config`](Self::config) and take effect on [`apply_changes`](Self::apply_changes).
/// The processor kind, queue capacity, overflow callback and clock are fixed at
/// initialization.
pub struct LogManager {
    editing: Mutex<LogManagerConfig>,
    applied: Mutex<Applied>,
    loggers: RwLock<HashMap<Arc<str>, Arc<LoggerShared>>>,
    version: AtomicU64,
    metrics: Arc<LoggerMetrics>,
    disabled: Arc<ComputedLoggerState>,
}

impl LogManager {
    /// An uninitialized manager
    pub fn new() -> Self {
        Self {
            editing: Mutex::new(LogManagerConfig::new()),
            applied: Mutex::new(Applied {
                status: Status::Uninitialized,
                config: LogManagerConfig::new(),
                processor: None,
                writers: Vec::new(),
            }),
            loggers: RwLock::new(HashMap::new()),
            version: AtomicU64::new(0),
            metrics: Arc::new(LoggerMetrics::new()),
            disabled: Arc::new(ComputedLoggerState::disabled()),
        }
    }

    /// Create and initialize a manager
    pub fn with_config(config: LogManagerConfig) -> Result<Self> {
        let manager = Self::new();
        manager.initialize(config)?;
        Ok(manager)
    }

    /// Process-wide manager.
    ///
    /// It is never dropped, so call [`shutdown`](Self::shutdown) before exit to drain
    /// the queue.
    pub fn global() -> &'static LogManager {
        &GLOBAL
    }

    /// Start the processor and resolve every logger created so far
    pub fn initialize(&self, config: LogManagerConfig) -> Result<()> {
        let mut applied = self.applied.lock();
        match applied.status {
            Status::Running => return Err(LoggerError::AlreadyInitialized),
            Status::Stopped => return Err(LoggerError::ManagerStopped),
            Status::Uninitialized => {}
        }

        config.validate()?;
        let processor = Arc::new(LogProcessor::start(&config, Arc::clone(&self.metrics))?);

        *self.editing.lock() = config.clone();
        applied.config = config;
        applied.processor = Some(processor);
        applied.status = Status::Running;
        self.recompute(&mut applied);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.applied.lock().status == Status::Running
    }

    /// Logger handle for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`LoggerError::InvalidLoggerName`] for empty names or names with empty
    /// dot-separated segments.
    pub fn get_logger(&self, name: &str) -> Result<Logger> {
        validate_logger_name(name)?;

        if let Some(shared) = self.loggers.read().get(name) {
            return Ok(Logger::from_shared(Arc::clone(shared)));
        }

        let applied = self.applied.lock();
        let mut loggers = self.loggers.write();
        if let Some(shared) = loggers.get(name) {
            return Ok(Logger::from_shared(Arc::clone(shared)));
        }

        let state = match applied.status {
            Status::Running => Arc::new(resolve(
                name,
                &applied.config,
                self.version.load(Ordering::Acquire),
                applied.processor.clone(),
            )),
            Status::Uninitialized | Status::Stopped => Arc::clone(&self.disabled),
        };
        let name: Arc<str> = Arc::from(name);
        let shared = Arc::new(LoggerShared::new(Arc::clone(&name), state));
        loggers.insert(name, Arc::clone(&shared));
        Ok(Logger::from_shared(shared))
    }

    /// Editable configuration; edits take effect on [`apply_changes`](Self::apply_changes).
    ///
    /// Drop the guard before calling `apply_changes`.
    pub fn config(&self) -> MutexGuard<'_, LogManagerConfig> {
        self.editing.lock()
    }

    /// Validate the edited configuration, bump the version and re-resolve every logger
    pub fn apply_changes(&self) -> Result<()> {
        let config = self.editing.lock().clone();
        config.validate()?;

        let mut applied = self.applied.lock();
        match applied.status {
            Status::Uninitialized => return Err(LoggerError::NotInitialized),
            Status::Stopped => return Err(LoggerError::ManagerStopped),
            Status::Running => {}
        }
        applied.config = config;
        self.recompute(&mut applied);
        Ok(())
    }

    fn recompute(&self, applied: &mut Applied) {
        let version = self.version.fetch_add(1, Ordering::AcqRel) + 1;

        for writer in applied.config.writers() {
            writer.core().configure(version);
            if !applied
                .writers
                .iter()
                .any(|w| w.core().id() == writer.core().id())
            {
                applied.writers.push(writer);
            }
        }

        let loggers = self.loggers.read();
        for shared in loggers.values() {
            shared.publish(Arc::new(resolve(
                shared.name(),
                &applied.config,
                version,
                applied.processor.clone(),
            )));
        }
    }

    /// Current configuration version; bumped by `initialize` and every `apply_changes`
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    pub fn diagnostics(&self) -> LogManagerDiagnostics {
        let applied = self.applied.lock();
        let processor = applied.processor.as_deref();
        LogManagerDiagnostics {
            is_initialized: applied.status == Status::Running,
            processor_kind: processor.map_or(applied.config.processor, LogProcessor::kind),
            is_async: processor.is_some_and(LogProcessor::is_async),
            queue_length: processor.map_or(0, LogProcessor::queue_length),
            queue_capacity: processor.map_or(0, LogProcessor::queue_capacity),
            dropped_messages: self.metrics.dropped_count(),
            error_count: self.metrics.error_count(),
            processed_messages: self.metrics.processed_count(),
            configuration_version: self.version(),
            logger_count: self.loggers.read().len(),
        }
    }

    /// Pipeline counters
    pub fn metrics(&self) -> &LoggerMetrics {
        &self.metrics
    }

    /// Wait for queued messages to be written, then flush every writer
    pub fn flush(&self) -> Result<()> {
        let (processor, writers) = {
            let applied = self.applied.lock();
            (applied.processor.clone(), applied.writers.clone())
        };

        if let Some(processor) = processor {
            if !processor.wait_idle(DEFAULT_SHUTDOWN_TIMEOUT) {
                eprintln!("[LOGGER WARNING] Queue did not drain before flush timeout");
            }
        }

        let mut first_error = None;
        for writer in writers {
            if let Err(e) = writer.flush() {
                eprintln!("[LOGGER ERROR] Writer '{}' flush failed: {}", writer.name(), e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// [`shutdown_with_timeout`](Self::shutdown_with_timeout) with
    /// [`DEFAULT_SHUTDOWN_TIMEOUT`]
    pub fn shutdown(&self) -> Result<()> {
        self.shutdown_with_timeout(DEFAULT_SHUTDOWN_TIMEOUT)
    }

    /// Disable every logger, drain and stop the processor, then dispose every writer.
    ///
    /// Messages submitted before this call are delivered. Calling it again is a no-op.
    ///
    /// If the consumer is still dispatching when `timeout` elapses, this returns
    /// [`LoggerError::ShutdownTimeout`] and leaves the writers open: they close once the
    /// consumer lets go of them.
    pub fn shutdown_with_timeout(&self, timeout: Duration) -> Result<()> {
        let (processor, writers) = {
            let mut applied = self.applied.lock();
            if applied.status != Status::Running {
                applied.status = Status::Stopped;
                return Ok(());
            }
            applied.status = Status::Stopped;

            for shared in self.loggers.read().values() {
                shared.publish(Arc::clone(&self.disabled));
            }
            (applied.processor.take(), std::mem::take(&mut applied.writers))
        };

        // Drained without holding the lock: writers may call back into the manager
        if let Some(processor) = processor {
            if !processor.shutdown(timeout) {
                let pending = processor.queue_length();
                eprintln!(
                    "[LOGGER ERROR] Shutdown timed out with {} message(s) queued; \
                     {} writer(s) left open",
                    pending,
                    writers.len()
                );
                return Err(LoggerError::ShutdownTimeout {
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    pending,
                });
            }
        }

        let mut first_error = None;
        for writer in writers {
            if let Err(e) = writer.dispose() {
                eprintln!("[LOGGER ERROR] Writer '{}' failed to close: {}", writer.name(), e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl Default for LogManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LogManager {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            eprintln!("[LOGGER ERROR] Shutdown during drop failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::LoggerConfig;
    use crate::core::log_level::LogLevel;
    use crate::writers::MemoryWriter;

    fn sync_config(writer: Arc<MemoryWriter>) -> LogManagerConfig {
        LogManagerConfig::new()
            .with_processor(ProcessorKind::Sync)
            .with_root(LoggerConfig::root().with_writer(writer))
    }

    #[test]
    fn test_invalid_logger_names() {
        let manager = LogManager::new();
        assert!(matches!(
            manager.get_logger(""),
            Err(LoggerError::InvalidLoggerName { .. })
        ));
        assert!(manager.get_logger("a..b").is_err());
    }

    #[test]
    fn test_same_name_shares_state() {
        let manager = LogManager::new();
        let a = manager.get_logger("app").unwrap();
        let b = manager.get_logger("app").unwrap();
        assert_eq!(manager.diagnostics().logger_count, 1);

        manager
            .initialize(sync_config(Arc::new(MemoryWriter::new())))
            .unwrap();
        assert_eq!(a.version(), b.version());
        assert!(b.is_enabled(LogLevel::Info));
    }

    #[test]
    fn test_logger_created_before_initialize_becomes_live() {
        let memory = Arc::new(MemoryWriter::new());
        let manager = LogManager::new();
        let logger = manager.get_logger("early").unwrap();

        logger.info("before");
        assert!(!logger.is_enabled(LogLevel::Info));

        manager.initialize(sync_config(memory.clone())).unwrap();
        assert!(logger.is_enabled(LogLevel::Info));
        logger.info("after");

        assert_eq!(memory.lines(), vec!["after".to_string()]);
    }

    #[test]
    fn test_double_initialize_fails() {
        let manager = LogManager::with_config(sync_config(Arc::new(MemoryWriter::new()))).unwrap();
        assert!(matches!(
            manager.initialize(LogManagerConfig::new()),
            Err(LoggerError::AlreadyInitialized)
        ));
    }

    #[test]
    fn test_apply_changes_requires_initialize() {
        let manager = LogManager::new();
        assert!(matches!(
            manager.apply_changes(),
            Err(LoggerError::NotInitialized)
        ));
    }

    #[test]
    fn test_apply_changes_recomputes_loggers() {
        let memory = Arc::new(MemoryWriter::new());
        let manager = LogManager::with_config(sync_config(memory.clone())).unwrap();
        let logger = manager.get_logger("app").unwrap();
        let version = manager.version();

        logger.debug("hidden");
        manager.config().root.minimum_level = Some(LogLevel::Debug);
        manager.apply_changes().unwrap();
        logger.debug("shown");

        assert_eq!(manager.version(), version + 1);
        assert_eq!(logger.version(), version + 1);
        assert_eq!(memory.lines(), vec!["shown".to_string()]);
    }

    #[test]
    fn test_invalid_changes_are_rejected() {
        let manager = LogManager::with_config(sync_config(Arc::new(MemoryWriter::new()))).unwrap();
        manager.config().loggers.push(LoggerConfig::new("bad."));
        assert!(manager.apply_changes().is_err());
        assert_eq!(manager.version(), 1);
    }

    #[test]
    fn test_logging_after_shutdown_is_noop() {
        let memory = Arc::new(MemoryWriter::new());
        let manager = LogManager::with_config(sync_config(memory.clone())).unwrap();
        let logger = manager.get_logger("app").unwrap();

        manager.shutdown().unwrap();
        manager.shutdown().unwrap();
        logger.error("ignored");

        assert!(memory.is_empty());
        assert!(memory.is_disposed());
        assert!(!manager.diagnostics().is_initialized);
        assert!(matches!(
            manager.apply_changes(),
            Err(LoggerError::ManagerStopped)
        ));
    }

    #[test]
    fn test_diagnostics() {
        let memory = Arc::new(MemoryWriter::new());
        let manager = LogManager::with_config(
            LogManagerConfig::new()
                .with_queue_capacity(64)
                .with_root(LoggerConfig::root().with_writer(memory.clone())),
        )
        .unwrap();
        let logger = manager.get_logger("app").unwrap();
        logger.info("one");
        manager.flush().unwrap();

        let diagnostics = manager.diagnostics();
        assert!(diagnostics.is_initialized);
        assert!(diagnostics.is_async);
        assert_eq!(diagnostics.processor_kind, ProcessorKind::Async);
        assert_eq!(diagnostics.queue_capacity, 64);
        assert_eq!(diagnostics.processed_messages, 1);
        assert_eq!(diagnostics.dropped_messages, 0);
        assert_eq!(diagnostics.logger_count, 1);
    }
}
