//! Writer trait for log output destinations

use super::error::Result;
use super::log_level::LogLevel;
use super::message::LogMessage;
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Predicate over a message, used as an accept or reject filter
pub type LogFilter = Arc<dyn Fn(&LogMessage<'_>) -> bool + Send + Sync>;

/// Destination for rendered messages.
///
/// Writers are shared between loggers and may be called from the consumer thread and
/// from producers (sync processor) at the same time, so implementations synchronize
/// internally.
///
/// # Example
///
/// ```
/// use rust_log_engine::core::message::LogMessage;
/// use rust_log_engine::core::writer::{LogWriter, LogWriterCore};
/// use rust_log_engine::core::error::Result;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// #[derive(Default)]
/// struct CountingWriter {
///     core: LogWriterCore,
///     seen: AtomicUsize,
/// }
///
/// impl LogWriter for CountingWriter {
///     fn core(&self) -> &LogWriterCore {
///         &self.core
///     }
///
///     fn log(&self, _message: &LogMessage<'_>) -> Result<()> {
///         self.seen.fetch_add(1, Ordering::Relaxed);
///         Ok(())
///     }
///
///     fn name(&self) -> &str {
///         "counting"
///     }
/// }
/// ```
pub trait LogWriter: Send + Sync {
    /// Shared writer state: minimum level and filters
    fn core(&self) -> &LogWriterCore;

    /// Render and persist one message
    fn log(&self, message: &LogMessage<'_>) -> Result<()>;

    fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Release resources; called once when the manager shuts down
    fn dispose(&self) -> Result<()> {
        self.flush()
    }

    fn name(&self) -> &str;
}

/// Filters copied out of a writer for one configuration version
#[derive(Default)]
pub struct FrozenFilters {
    accept: Box<[LogFilter]>,
    reject: Box<[LogFilter]>,
}

impl FrozenFilters {
    /// Rejects run first and any match skips the writer; then, if accept filters exist,
    /// at least one must match.
    pub fn allows(&self, message: &LogMessage<'_>) -> bool {
        if self.reject.iter().any(|filter| filter(message)) {
            return false;
        }
        self.accept.is_empty() || self.accept.iter().any(|filter| filter(message))
    }

    pub fn accept_count(&self) -> usize {
        self.accept.len()
    }

    pub fn reject_count(&self) -> usize {
        self.reject.len()
    }
}

static NEXT_WRITER_ID: AtomicU64 = AtomicU64::new(1);

/// State every writer carries.
///
/// Filter edits land in mutable lists; [`configure`](Self::configure) copies them into an
/// immutable [`FrozenFilters`] once per configuration version, and only that frozen copy is
/// consulted while logging.
pub struct LogWriterCore {
    id: u64,
    minimum_level: Mutex<LogLevel>,
    accept: Mutex<Vec<LogFilter>>,
    reject: Mutex<Vec<LogFilter>>,
    frozen: ArcSwap<FrozenFilters>,
    configured_version: AtomicU64,
}

impl LogWriterCore {
    pub fn new() -> Self {
        Self {
            id: NEXT_WRITER_ID.fetch_add(1, Ordering::Relaxed),
            minimum_level: Mutex::new(LogLevel::Trace),
            accept: Mutex::new(Vec::new()),
            reject: Mutex::new(Vec::new()),
            frozen: ArcSwap::from_pointee(FrozenFilters::default()),
            configured_version: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn with_minimum_level(self, level: LogLevel) -> Self {
        *self.minimum_level.lock() = level;
        self
    }

    /// Process-unique identity used to deduplicate writers during resolution
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn minimum_level(&self) -> LogLevel {
        *self.minimum_level.lock()
    }

    /// Takes effect at the next configuration change
    pub fn set_minimum_level(&self, level: LogLevel) {
        *self.minimum_level.lock() = level;
    }

    /// Takes effect at the next configuration change
    pub fn add_accept_filter<F>(&self, filter: F)
    where
        F: Fn(&LogMessage<'_>) -> bool + Send + Sync + 'static,
    {
        self.accept.lock().push(Arc::new(filter));
    }

    /// Takes effect at the next configuration change
    pub fn add_reject_filter<F>(&self, filter: F)
    where
        F: Fn(&LogMessage<'_>) -> bool + Send + Sync + 'static,
    {
        self.reject.lock().push(Arc::new(filter));
    }

    pub fn clear_filters(&self) {
        self.accept.lock().clear();
        self.reject.lock().clear();
    }

    /// Freeze the filter lists for `version`.
    ///
    /// Returns `false` without doing anything when the writer is already configured for
    /// that version.
    pub fn configure(&self, version: u64) -> bool {
        if self.configured_version.load(Ordering::Acquire) == version {
            return false;
        }

        let accept: Box<[LogFilter]> = self.accept.lock().iter().cloned().collect();
        let reject: Box<[LogFilter]> = self.reject.lock().iter().cloned().collect();
        self.frozen.store(Arc::new(FrozenFilters { accept, reject }));
        self.configured_version.store(version, Ordering::Release);
        true
    }

    /// The filters frozen by the last [`configure`](Self::configure)
    pub fn frozen_filters(&self) -> Arc<FrozenFilters> {
        self.frozen.load_full()
    }

    pub fn configured_version(&self) -> u64 {
        self.configured_version.load(Ordering::Acquire)
    }
}

impl Default for LogWriterCore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LogWriterCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogWriterCore")
            .field("id", &self.id)
            .field("minimum_level", &self.minimum_level())
            .field("accept_filters", &self.accept.lock().len())
            .field("reject_filters", &self.reject.lock().len())
            .field("configured_version", &self.configured_version())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::ThreadInfo;

    fn message<'a>(text: &'a str, thread: &'a ThreadInfo) -> LogMessage<'a> {
        LogMessage::new("app.db", LogLevel::Info, text, thread)
    }

    #[test]
    fn test_no_filters_allow_everything() {
        let thread = ThreadInfo::current();
        assert!(FrozenFilters::default().allows(&message("x", &thread)));
    }

    #[test]
    fn test_reject_wins_over_accept() {
        let core = LogWriterCore::new();
        core.add_accept_filter(|m| m.text.contains("db"));
        core.add_reject_filter(|m| m.text.contains("secret"));
        core.configure(1);

        let thread = ThreadInfo::current();
        let filters = core.frozen_filters();
        assert!(filters.allows(&message("db up", &thread)));
        assert!(!filters.allows(&message("db secret", &thread)));
        assert!(!filters.allows(&message("cache up", &thread)));
    }

    #[test]
    fn test_any_accept_filter_suffices() {
        let core = LogWriterCore::new();
        core.add_accept_filter(|m| m.text == "a");
        core.add_accept_filter(|m| m.text == "b");
        core.configure(1);

        let thread = ThreadInfo::current();
        let filters = core.frozen_filters();
        assert!(filters.allows(&message("b", &thread)));
        assert!(!filters.allows(&message("c", &thread)));
    }

    #[test]
    fn test_configure_once_per_version() {
        let core = LogWriterCore::new();
        assert!(core.configure(1));
        assert!(!core.configure(1));

        // Edits are invisible until the next version
        core.add_reject_filter(|_| true);
        assert_eq!(core.frozen_filters().reject_count(), 0);
        assert!(core.configure(2));
        assert_eq!(core.frozen_filters().reject_count(), 1);
        assert_eq!(core.configured_version(), 2);
    }

    #[test]
    fn test_writer_ids_are_unique() {
        let a = LogWriterCore::new();
        let b = LogWriterCore::new();
        assert_ne!(a.id(), b.id());
    }
}
