//! Logger handles

use super::event_id::LogEventId;
use super::log_level::LogLevel;
use super::message::{LogException, LogMessage, ThreadInfo};
use super::properties::LogProperties;
use super::resolver::ComputedLoggerState;
use super::scope::{LogScope, LogScopeGuard};
use arc_swap::ArcSwap;
use std::cell::RefCell;
use std::fmt::{self, Write as _};
use std::sync::Arc;

thread_local! {
    static FORMAT_BUFFER: RefCell<String> = const { RefCell::new(String::new()) };
}

/// Registry entry behind every handle for one logger name
pub(crate) struct LoggerShared {
    name: Arc<str>,
    state: ArcSwap<ComputedLoggerState>,
}

impl LoggerShared {
    pub(crate) fn new(name: Arc<str>, state: Arc<ComputedLoggerState>) -> Self {
        Self {
            name,
            state: ArcSwap::new(state),
        }
    }

    pub(crate) fn name(&self) -> &Arc<str> {
        &self.name
    }

    pub(crate) fn publish(&self, state: Arc<ComputedLoggerState>) {
        self.state.store(state);
    }
}

/// A named logging handle.
///
/// Handles are cheap to clone and read their resolved state without locking. Obtain one
/// from [`LogManager::get_logger`](super::manager::LogManager::get_logger).
///
/// # Example
///
/// ```
/// use rust_log_engine::prelude::*;
/// use std::sync::Arc;
///
/// let memory = Arc::new(MemoryWriter::new());
/// let manager = LogManager::with_config(
///     LogManagerConfig::new()
///         .with_processor(ProcessorKind::Sync)
///         .with_root(LoggerConfig::root().with_writer(memory.clone())),
/// )
/// .unwrap();
///
/// let logger = manager.get_logger("app.http").unwrap();
/// logger.info("listening");
/// logger.debug("not enabled at the default Info level");
///
/// assert_eq!(memory.len(), 1);
/// ```
#[derive(Clone)]
pub struct Logger {
    shared: Arc<LoggerShared>,
}

impl Logger {
    pub(crate) fn from_shared(shared: Arc<LoggerShared>) -> Self {
        Self { shared }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Whether a message at `level` would reach any writer
    #[inline]
    pub fn is_enabled(&self, level: LogLevel) -> bool {
        self.shared.state.load().is_enabled(level)
    }

    pub fn minimum_level(&self) -> LogLevel {
        self.shared.state.load().minimum_level()
    }

    /// Configuration version this handle currently resolves against
    pub fn version(&self) -> u64 {
        self.shared.state.load().version()
    }

    /// Log a plain message
    ///
    /// # Panics
    ///
    /// Panics if `level` is `LogLevel::All` or `LogLevel::None`.
    #[inline]
    pub fn log(&self, level: LogLevel, text: &str) {
        self.log_with(level, LogEventId::empty(), text, LogProperties::empty(), None);
    }

    /// Log a message with every optional part
    ///
    /// # Panics
    ///
    /// Panics if `level` is `LogLevel::All` or `LogLevel::None`.
    pub fn log_with(
        &self,
        level: LogLevel,
        event_id: &LogEventId,
        text: &str,
        properties: &LogProperties,
        exception: Option<&LogException>,
    ) {
        assert!(
            !level.is_sentinel(),
            "{} is a threshold, not a message level",
            level
        );

        let state = self.shared.state.load();
        if !state.is_enabled(level) {
            return;
        }
        let Some(processor) = state.processor() else {
            return;
        };

        let thread = ThreadInfo::current();
        let scope = LogScope::current();
        let message = LogMessage {
            logger_name: &self.shared.name,
            level,
            sequence_id: processor.next_sequence(),
            timestamp: processor.now(),
            event_id,
            thread: &thread,
            scope: &scope,
            text,
            properties,
            exception,
        };
        processor.submit(&state, &self.shared.name, &message);
    }

    /// Log a message with structured properties
    pub fn log_properties(&self, level: LogLevel, text: &str, properties: &LogProperties) {
        self.log_with(level, LogEventId::empty(), text, properties, None);
    }

    /// Log a message with a captured error
    pub fn log_exception(&self, level: LogLevel, text: &str, exception: &LogException) {
        self.log_with(
            level,
            LogEventId::empty(),
            text,
            LogProperties::empty(),
            Some(exception),
        );
    }

    /// Render `args` into a reused per-thread buffer and log it.
    ///
    /// This is what the logging macros expand to. Nothing is formatted when the level is
    /// disabled.
    ///
    /// # Panics
    ///
    /// Panics if `level` is `LogLevel::All` or `LogLevel::None`.
    pub fn log_fmt(&self, level: LogLevel, args: fmt::Arguments<'_>) {
        assert!(!level.is_sentinel(), "{} is a threshold, not a message level", level);
        if !self.is_enabled(level) {
            return;
        }
        if let Some(text) = args.as_str() {
            self.log(level, text);
            return;
        }

        FORMAT_BUFFER.with(|buffer| match buffer.try_borrow_mut() {
            Ok(mut buffer) => {
                buffer.clear();
                let _ = buffer.write_fmt(args);
                self.log(level, &buffer);
            }
            // A writer is logging from inside a dispatch on this thread
            Err(_) => self.log(level, &fmt::format(args)),
        });
    }

    #[inline]
    pub fn trace(&self, text: &str) {
        self.log(LogLevel::Trace, text);
    }

    #[inline]
    pub fn debug(&self, text: &str) {
        self.log(LogLevel::Debug, text);
    }

    #[inline]
    pub fn info(&self, text: &str) {
        self.log(LogLevel::Info, text);
    }

    #[inline]
    pub fn warn(&self, text: &str) {
        self.log(LogLevel::Warn, text);
    }

    #[inline]
    pub fn error(&self, text: &str) {
        self.log(LogLevel::Error, text);
    }

    #[inline]
    pub fn fatal(&self, text: &str) {
        self.log(LogLevel::Fatal, text);
    }

    /// Attach `properties` to every message logged on this thread until the guard drops
    pub fn begin_scope(&self, properties: &LogProperties) -> LogScopeGuard {
        LogScope::begin(properties)
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name())
            .field("state", &*self.shared.state.load())
            .finish()
    }
}
