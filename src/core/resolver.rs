//! Per-logger configuration resolution
//!
//! Turns the hierarchical configuration into a flat, immutable [`ComputedLoggerState`]:
//! the effective minimum level, the overflow mode, and for each level the ordered list of
//! writers (with their frozen filters) that receive messages at that level.

use super::config::{LogManagerConfig, LoggerConfig};
use super::log_level::LogLevel;
use super::overflow_policy::OverflowMode;
use super::processor::LogProcessor;
use super::writer::{FrozenFilters, LogWriter};
use std::fmt;
use std::sync::Arc;

/// A writer bound to a logger, with the filters frozen for the state's version
#[derive(Clone)]
pub struct WriterEntry {
    pub writer: Arc<dyn LogWriter>,
    pub filters: Arc<FrozenFilters>,
}

impl fmt::Debug for WriterEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriterEntry")
            .field("writer", &self.writer.name())
            .field("id", &self.writer.core().id())
            .finish()
    }
}

/// Resolved state of one logger for one configuration version
pub struct ComputedLoggerState {
    version: u64,
    minimum_level: LogLevel,
    overflow_mode: OverflowMode,
    writers: [Box<[WriterEntry]>; LogLevel::COUNT],
    processor: Option<Arc<LogProcessor>>,
}

impl ComputedLoggerState {
    /// State used before initialization and after shutdown: nothing is enabled
    pub fn disabled() -> Self {
        Self {
            version: 0,
            minimum_level: LogLevel::None,
            overflow_mode: OverflowMode::default(),
            writers: Default::default(),
            processor: None,
        }
    }

    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[inline]
    pub fn minimum_level(&self) -> LogLevel {
        self.minimum_level
    }

    #[inline]
    pub fn overflow_mode(&self) -> OverflowMode {
        self.overflow_mode
    }

    /// Writers receiving `level`, in resolution order
    #[inline]
    pub fn writers_for(&self, level: LogLevel) -> &[WriterEntry] {
        &self.writers[level.index()]
    }

    /// Whether a message at `level` would reach at least one writer
    #[inline]
    pub fn is_enabled(&self, level: LogLevel) -> bool {
        !level.is_sentinel()
            && level >= self.minimum_level
            && self.processor.is_some()
            && !self.writers_for(level).is_empty()
    }

    pub(crate) fn processor(&self) -> Option<&Arc<LogProcessor>> {
        self.processor.as_ref()
    }
}

impl fmt::Debug for ComputedLoggerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: Vec<usize> = self.writers.iter().map(|w| w.len()).collect();
        f.debug_struct("ComputedLoggerState")
            .field("version", &self.version)
            .field("minimum_level", &self.minimum_level)
            .field("overflow_mode", &self.overflow_mode)
            .field("writers_per_level", &counts)
            .finish()
    }
}

/// Resolve the state of logger `name`.
///
/// The root config applies first, then every matching named config in ordinal name
/// order. Each config may override the minimum level and overflow mode, may discard the
/// writers gathered so far (`include_parent_writers = false`), and appends its own
/// bindings. A writer lands in every level bucket from
/// `max(writer minimum, binding minimum, Trace)` up to `Fatal`, once per bucket, in
/// first-seen order. Buckets below the final minimum level (default `Info`) are emptied.
///
/// Writers are expected to be configured for `version` already so the captured frozen
/// filters belong to it.
pub fn resolve(
    name: &str,
    config: &LogManagerConfig,
    version: u64,
    processor: Option<Arc<LogProcessor>>,
) -> ComputedLoggerState {
    let mut matches: Vec<&LoggerConfig> =
        config.loggers.iter().filter(|c| c.matches(name)).collect();
    matches.sort_by(|a, b| a.name.cmp(&b.name));

    let mut minimum_level = None;
    let mut overflow_mode = None;
    let mut buckets: [Vec<WriterEntry>; LogLevel::COUNT] = Default::default();

    for logger_config in std::iter::once(&config.root).chain(matches) {
        if let Some(level) = logger_config.minimum_level {
            minimum_level = Some(level);
        }
        if let Some(mode) = logger_config.overflow_mode {
            overflow_mode = Some(mode);
        }
        if !logger_config.include_parent_writers {
            buckets.iter_mut().for_each(Vec::clear);
        }

        for binding in &logger_config.writers {
            let core = binding.writer.core();
            let start = core
                .minimum_level()
                .max(binding.minimum_level)
                .max(LogLevel::Trace);
            let filters = core.frozen_filters();

            for level in LogLevel::MESSAGE_LEVELS.iter().filter(|l| **l >= start) {
                let bucket = &mut buckets[level.index()];
                if bucket.iter().any(|e| e.writer.core().id() == core.id()) {
                    continue;
                }
                bucket.push(WriterEntry {
                    writer: Arc::clone(&binding.writer),
                    filters: Arc::clone(&filters),
                });
            }
        }
    }

    let minimum_level = minimum_level.unwrap_or(LogLevel::Info);
    for bucket in buckets.iter_mut().take(minimum_level.index()) {
        bucket.clear();
    }

    ComputedLoggerState {
        version,
        minimum_level,
        overflow_mode: overflow_mode.unwrap_or(config.overflow_mode),
        writers: buckets.map(Vec::into_boxed_slice),
        processor,
    }
}
