//! Declarative logger configuration
//!
//! A [`LogManagerConfig`] holds a root [`LoggerConfig`] plus named configs matched against
//! logger names hierarchically: `"app.db"` matches loggers `app.db` and `app.db.pool` but
//! not `app.dbx`.

use super::error::{LoggerError, Result};
use super::log_level::LogLevel;
use super::overflow_policy::{OverflowCallback, OverflowMode};
use super::processor::ProcessorKind;
use super::timestamp::{Clock, SystemClock};
use super::writer::LogWriter;
use std::fmt;
use std::sync::Arc;

/// Default async queue capacity
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// A writer attached to a logger config, with an extra minimum level for this binding
#[derive(Clone)]
pub struct LogWriterBinding {
    pub writer: Arc<dyn LogWriter>,
    pub minimum_level: LogLevel,
}

impl LogWriterBinding {
    pub fn new(writer: Arc<dyn LogWriter>) -> Self {
        Self {
            writer,
            minimum_level: LogLevel::Trace,
        }
    }

    #[must_use]
    pub fn with_minimum_level(mut self, level: LogLevel) -> Self {
        self.minimum_level = level;
        self
    }
}

impl fmt::Debug for LogWriterBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogWriterBinding")
            .field("writer", &self.writer.name())
            .field("minimum_level", &self.minimum_level)
            .finish()
    }
}

/// Settings for one node of the logger hierarchy
#[derive(Clone, Debug)]
pub struct LoggerConfig {
    pub name: String,
    pub minimum_level: Option<LogLevel>,
    pub overflow_mode: Option<OverflowMode>,
    /// When `false`, writers inherited from less specific configs are discarded
    pub include_parent_writers: bool,
    pub writers: Vec<LogWriterBinding>,
}

impl LoggerConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            minimum_level: None,
            overflow_mode: None,
            include_parent_writers: true,
            writers: Vec::new(),
        }
    }

    /// Config for the root of the hierarchy (its name is ignored)
    pub fn root() -> Self {
        Self::new("")
    }

    #[must_use]
    pub fn with_minimum_level(mut self, level: LogLevel) -> Self {
        self.minimum_level = Some(level);
        self
    }

    #[must_use]
    pub fn with_overflow_mode(mut self, mode: OverflowMode) -> Self {
        self.overflow_mode = Some(mode);
        self
    }

    #[must_use]
    pub fn with_include_parent_writers(mut self, include: bool) -> Self {
        self.include_parent_writers = include;
        self
    }

    /// Attach a writer with no extra level restriction
    #[must_use]
    pub fn with_writer(mut self, writer: Arc<dyn LogWriter>) -> Self {
        self.writers.push(LogWriterBinding::new(writer));
        self
    }

    /// Attach a writer that only receives `minimum_level` and above
    #[must_use]
    pub fn with_writer_at(mut self, writer: Arc<dyn LogWriter>, minimum_level: LogLevel) -> Self {
        self.writers
            .push(LogWriterBinding::new(writer).with_minimum_level(minimum_level));
        self
    }

    /// Whether this (named) config applies to `logger_name`
    pub fn matches(&self, logger_name: &str) -> bool {
        match logger_name.strip_prefix(self.name.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('.'),
            None => false,
        }
    }
}

/// Full configuration of a [`LogManager`](super::manager::LogManager)
#[derive(Clone)]
pub struct LogManagerConfig {
    pub root: LoggerConfig,
    pub loggers: Vec<LoggerConfig>,
    pub processor: ProcessorKind,
    pub queue_capacity: usize,
    /// Overflow mode for loggers whose configs do not set one
    pub overflow_mode: OverflowMode,
    pub on_overflow: Option<OverflowCallback>,
    pub clock: Arc<dyn Clock>,
}

impl LogManagerConfig {
    pub fn new() -> Self {
        Self {
            root: LoggerConfig::root(),
            loggers: Vec::new(),
            processor: ProcessorKind::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            overflow_mode: OverflowMode::default(),
            on_overflow: None,
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_root(mut self, root: LoggerConfig) -> Self {
        self.root = root;
        self
    }

    #[must_use]
    pub fn with_logger(mut self, config: LoggerConfig) -> Self {
        self.loggers.push(config);
        self
    }

    #[must_use]
    pub fn with_processor(mut self, processor: ProcessorKind) -> Self {
        self.processor = processor;
        self
    }

    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_overflow_mode(mut self, mode: OverflowMode) -> Self {
        self.overflow_mode = mode;
        self
    }

    /// Called with the cumulative drop count whenever `DropAndNotify` discards a message
    #[must_use]
    pub fn with_overflow_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(u64) + Send + Sync + 'static,
    {
        self.on_overflow = Some(Arc::new(callback));
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Named config with exactly this name, for in-place edits
    pub fn logger_mut(&mut self, name: &str) -> Option<&mut LoggerConfig> {
        self.loggers.iter_mut().find(|c| c.name == name)
    }

    /// Every distinct writer referenced by the configuration
    pub fn writers(&self) -> Vec<Arc<dyn LogWriter>> {
        let mut seen = Vec::new();
        let mut writers: Vec<Arc<dyn LogWriter>> = Vec::new();
        for binding in std::iter::once(&self.root)
            .chain(self.loggers.iter())
            .flat_map(|c| c.writers.iter())
        {
            let id = binding.writer.core().id();
            if !seen.contains(&id) {
                seen.push(id);
                writers.push(Arc::clone(&binding.writer));
            }
        }
        writers
    }

    /// Check names and capacity
    pub fn validate(&self) -> Result<()> {
        for config in &self.loggers {
            validate_logger_name(&config.name)?;
        }
        if self.processor == ProcessorKind::Async && self.queue_capacity == 0 {
            return Err(LoggerError::config(
                "LogManagerConfig",
                "queue capacity must be greater than zero for the async processor",
            ));
        }
        Ok(())
    }
}

impl Default for LogManagerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LogManagerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogManagerConfig")
            .field("root", &self.root)
            .field("loggers", &self.loggers)
            .field("processor", &self.processor)
            .field("queue_capacity", &self.queue_capacity)
            .field("overflow_mode", &self.overflow_mode)
            .field("on_overflow", &self.on_overflow.is_some())
            .finish()
    }
}

/// Logger names are non-empty and have no empty dot-separated segment
pub fn validate_logger_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(LoggerError::logger_name(name, "name must not be empty"));
    }
    if name.split('.').any(str::is_empty) {
        return Err(LoggerError::logger_name(
            name,
            "name must not contain empty segments",
        ));
    }
    Ok(())
}
