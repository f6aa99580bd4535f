//! Writer over any `io::Write`

use crate::core::error::{LoggerError, Result};
use crate::core::log_level::LogLevel;
use crate::core::message::LogMessage;
use crate::core::writer::{LogWriter, LogWriterCore};
use crate::formatters::{LogFormatter, RenderBuffer, TemplateFormatter};
use parking_lot::Mutex;
use std::io::Write;

/// Writes one formatted line per message to a stream
///
/// # Example
///
/// ```
/// use rust_log_engine::core::{LogLevel, LogMessage, LogWriter, ThreadInfo};
/// use rust_log_engine::writers::StreamWriter;
///
/// let writer = StreamWriter::new(Vec::new());
/// let thread = ThreadInfo::current();
/// writer.log(&LogMessage::new("app", LogLevel::Info, "ready", &thread)).unwrap();
///
/// let bytes = writer.into_inner();
/// assert!(String::from_utf8(bytes).unwrap().ends_with("INF app: ready\n"));
/// ```
pub struct StreamWriter<W: Write + Send> {
    core: LogWriterCore,
    formatter: Box<dyn LogFormatter>,
    inner: Mutex<StreamState<W>>,
}

struct StreamState<W> {
    stream: W,
    render: RenderBuffer,
}

impl<W: Write + Send> StreamWriter<W> {
    /// Stream writer using the standard template
    pub fn new(stream: W) -> Self {
        Self {
            core: LogWriterCore::new(),
            formatter: Box::new(TemplateFormatter::default()),
            inner: Mutex::new(StreamState {
                stream,
                render: RenderBuffer::new(),
            }),
        }
    }

    #[must_use]
    pub fn with_formatter(mut self, formatter: impl LogFormatter + 'static) -> Self {
        self.formatter = Box::new(formatter);
        self
    }

    #[must_use]
    pub fn with_minimum_level(self, level: LogLevel) -> Self {
        self.core.set_minimum_level(level);
        self
    }

    /// Give back the underlying stream
    pub fn into_inner(self) -> W {
        self.inner.into_inner().stream
    }
}

impl<W: Write + Send> LogWriter for StreamWriter<W> {
    fn core(&self) -> &LogWriterCore {
        &self.core
    }

    fn log(&self, message: &LogMessage<'_>) -> Result<()> {
        let mut inner = self.inner.lock();
        let StreamState { stream, render } = &mut *inner;
        let bytes = render.render(self.formatter.as_ref(), message)?;
        stream
            .write_all(bytes)
            .and_then(|()| stream.write_all(b"\n"))
            .map_err(|e| LoggerError::io_operation("writing log line", "stream write failed", e))
    }

    fn flush(&self) -> Result<()> {
        self.inner
            .lock()
            .stream
            .flush()
            .map_err(|e| LoggerError::io_operation("flushing stream", "stream flush failed", e))
    }

    fn name(&self) -> &str {
        "stream"
    }
}
