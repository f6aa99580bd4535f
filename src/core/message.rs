//! The message passed to writers and its pooled, owned form

use super::event_id::LogEventId;
use super::log_level::LogLevel;
use super::pool::Recyclable;
use super::properties::LogProperties;
use super::resolver::ComputedLoggerState;
use super::scope::ScopeSnapshot;
use chrono::{DateTime, Utc};
use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static EMPTY_SCOPE: ScopeSnapshot = ScopeSnapshot::empty();

/// A captured error: its type, display text and `source()` chain.
///
/// Cloning is a reference-count bump.
#[derive(Clone)]
pub struct LogException {
    inner: Arc<ExceptionInner>,
}

struct ExceptionInner {
    type_name: Box<str>,
    message: Box<str>,
    causes: Box<[Box<str>]>,
    error: Option<Box<dyn Error + Send + Sync>>,
}

/// How an exception is rendered as text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExceptionFormat {
    /// Type name only
    Type,
    /// Display message only
    Message,
    /// `type: message` followed by one `caused by:` line per source
    #[default]
    Full,
}

impl LogException {
    /// Capture an error value, keeping it for later downcasting
    pub fn new<E>(error: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        let mut causes = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            causes.push(cause.to_string().into_boxed_str());
            source = cause.source();
        }

        Self {
            inner: Arc::new(ExceptionInner {
                type_name: std::any::type_name::<E>().into(),
                message: error.to_string().into_boxed_str(),
                causes: causes.into_boxed_slice(),
                error: Some(Box::new(error)),
            }),
        }
    }

    /// Describe a failure that is not a `std::error::Error` value
    pub fn from_message(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(ExceptionInner {
                type_name: type_name.into().into_boxed_str(),
                message: message.into().into_boxed_str(),
                causes: Box::new([]),
                error: None,
            }),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.inner.type_name
    }

    pub fn message(&self) -> &str {
        &self.inner.message
    }

    /// Display text of each `source()`, nearest first
    pub fn causes(&self) -> impl Iterator<Item = &str> + '_ {
        self.inner.causes.iter().map(|c| c.as_ref())
    }

    /// The original error, if one was captured
    pub fn error(&self) -> Option<&(dyn Error + Send + Sync + 'static)> {
        self.inner.error.as_deref()
    }

    /// Write the exception using `format`
    pub fn write_to<W: fmt::Write + ?Sized>(&self, out: &mut W, format: ExceptionFormat) -> fmt::Result {
        match format {
            ExceptionFormat::Type => out.write_str(self.type_name()),
            ExceptionFormat::Message => out.write_str(self.message()),
            ExceptionFormat::Full => {
                write!(out, "{}: {}", self.type_name(), self.message())?;
                for cause in self.causes() {
                    write!(out, "\n  caused by: {}", cause)?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for LogException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_to(f, ExceptionFormat::Full)
    }
}

impl fmt::Debug for LogException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogException")
            .field("type_name", &self.type_name())
            .field("message", &self.message())
            .field("causes", &self.inner.causes)
            .finish()
    }
}

static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT_THREAD: ThreadInfo = ThreadInfo::capture();
}

/// Identity of the thread that produced a message.
///
/// Ids come from a process-wide counter and are cached per thread on first use.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadInfo {
    id: u64,
    name: Option<Arc<str>>,
}

impl ThreadInfo {
    fn capture() -> Self {
        Self {
            id: NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed),
            name: std::thread::current().name().map(Arc::from),
        }
    }

    /// The calling thread's cached info
    pub fn current() -> ThreadInfo {
        CURRENT_THREAD
            .try_with(ThreadInfo::clone)
            .unwrap_or_else(|_| ThreadInfo::capture())
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// A message as seen by writers and formatters.
///
/// This is a borrowed view: it is only valid for the duration of one dispatch and must
/// not be retained.
#[derive(Debug, Clone, Copy)]
pub struct LogMessage<'a> {
    pub logger_name: &'a str,
    pub level: LogLevel,
    pub sequence_id: u64,
    pub timestamp: DateTime<Utc>,
    pub event_id: &'a LogEventId,
    pub thread: &'a ThreadInfo,
    pub scope: &'a ScopeSnapshot,
    pub text: &'a str,
    pub properties: &'a LogProperties,
    pub exception: Option<&'a LogException>,
}

impl<'a> LogMessage<'a> {
    /// A message with no event id, scope, properties or exception, stamped now
    pub fn new(logger_name: &'a str, level: LogLevel, text: &'a str, thread: &'a ThreadInfo) -> Self {
        Self {
            logger_name,
            level,
            sequence_id: 0,
            timestamp: Utc::now(),
            event_id: LogEventId::empty(),
            thread,
            scope: &EMPTY_SCOPE,
            text,
            properties: LogProperties::empty(),
            exception: None,
        }
    }

    #[must_use]
    pub fn with_sequence_id(mut self, sequence_id: u64) -> Self {
        self.sequence_id = sequence_id;
        self
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    #[must_use]
    pub fn with_event_id(mut self, event_id: &'a LogEventId) -> Self {
        self.event_id = event_id;
        self
    }

    #[must_use]
    pub fn with_scope(mut self, scope: &'a ScopeSnapshot) -> Self {
        self.scope = scope;
        self
    }

    #[must_use]
    pub fn with_properties(mut self, properties: &'a LogProperties) -> Self {
        self.properties = properties;
        self
    }

    #[must_use]
    pub fn with_exception(mut self, exception: &'a LogException) -> Self {
        self.exception = Some(exception);
        self
    }
}

/// Owned copy of a message that travels through the async queue.
///
/// Slots are pooled; recycling clears them but keeps the text and property buffers.
#[derive(Default)]
pub struct LogMessageSlot {
    state: Option<Arc<ComputedLoggerState>>,
    logger_name: Option<Arc<str>>,
    level: LogLevel,
    sequence_id: u64,
    timestamp: DateTime<Utc>,
    event_id: LogEventId,
    thread: ThreadInfo,
    scope: ScopeSnapshot,
    text: String,
    properties: LogProperties,
    exception: Option<LogException>,
}

impl LogMessageSlot {
    pub(crate) fn fill(
        &mut self,
        state: &Arc<ComputedLoggerState>,
        logger_name: &Arc<str>,
        message: &LogMessage<'_>,
    ) {
        self.state = Some(Arc::clone(state));
        self.logger_name = Some(Arc::clone(logger_name));
        self.level = message.level;
        self.sequence_id = message.sequence_id;
        self.timestamp = message.timestamp;
        self.event_id.clone_from(message.event_id);
        self.thread.clone_from(message.thread);
        self.scope.clone_from(message.scope);
        self.text.clear();
        self.text.push_str(message.text);
        self.properties.copy_from(message.properties);
        self.exception = message.exception.cloned();
    }

    /// State of the logger that produced the message
    pub(crate) fn state(&self) -> Option<&Arc<ComputedLoggerState>> {
        self.state.as_ref()
    }

    /// Borrow the slot as a message
    pub fn as_message(&self) -> LogMessage<'_> {
        LogMessage {
            logger_name: self.logger_name.as_deref().unwrap_or(""),
            level: self.level,
            sequence_id: self.sequence_id,
            timestamp: self.timestamp,
            event_id: &self.event_id,
            thread: &self.thread,
            scope: &self.scope,
            text: &self.text,
            properties: &self.properties,
            exception: self.exception.as_ref(),
        }
    }
}

impl Recyclable for LogMessageSlot {
    fn recycle(&mut self) {
        self.state = None;
        self.logger_name = None;
        self.event_id = LogEventId::EMPTY;
        self.scope = ScopeSnapshot::empty();
        self.text.clear();
        self.properties.reset();
        self.exception = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[derive(Debug)]
    struct ConfigError {
        source: io::Error,
    }

    impl fmt::Display for ConfigError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "could not load config")
        }
    }

    impl Error for ConfigError {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            Some(&self.source)
        }
    }

    #[test]
    fn test_exception_captures_chain() {
        let exception = LogException::new(ConfigError {
            source: io::Error::new(io::ErrorKind::NotFound, "app.toml missing"),
        });

        assert!(exception.type_name().ends_with("ConfigError"));
        assert_eq!(exception.message(), "could not load config");
        assert_eq!(exception.causes().collect::<Vec<_>>(), vec!["app.toml missing"]);
        assert!(exception.error().is_some());

        let text = exception.to_string();
        assert!(text.contains("ConfigError: could not load config"));
        assert!(text.ends_with("\n  caused by: app.toml missing"));
    }

    #[test]
    fn test_exception_formats() {
        let exception = LogException::from_message("Timeout", "no reply");
        let mut out = String::new();
        exception.write_to(&mut out, ExceptionFormat::Type).unwrap();
        out.push('|');
        exception.write_to(&mut out, ExceptionFormat::Message).unwrap();
        assert_eq!(out, "Timeout|no reply");
    }

    #[test]
    fn test_thread_info_is_cached() {
        let first = ThreadInfo::current();
        let second = ThreadInfo::current();
        assert_eq!(first, second);

        let other = std::thread::Builder::new()
            .name("worker-7".into())
            .spawn(ThreadInfo::current)
            .unwrap()
            .join()
            .unwrap();
        assert_ne!(other.id(), first.id());
        assert_eq!(other.name(), Some("worker-7"));
    }

    #[test]
    fn test_slot_round_trip_and_recycle() {
        let thread = ThreadInfo::current();
        let props = LogProperties::new().with("k", 1);
        let event = LogEventId::with_name(3, "Boot");
        let message = LogMessage::new("app", LogLevel::Warn, "hello", &thread)
            .with_event_id(&event)
            .with_properties(&props)
            .with_sequence_id(9);

        let state = Arc::new(ComputedLoggerState::disabled());
        let name: Arc<str> = Arc::from("app");
        let mut slot = LogMessageSlot::default();
        slot.fill(&state, &name, &message);

        let view = slot.as_message();
        assert_eq!(view.logger_name, "app");
        assert_eq!(view.text, "hello");
        assert_eq!(view.sequence_id, 9);
        assert_eq!(view.event_id, &event);
        assert!(view.properties.contains("k", 1));

        slot.recycle();
        assert!(slot.state().is_none());
        assert!(slot.as_message().text.is_empty());
        assert!(slot.as_message().properties.is_empty());
    }
}
