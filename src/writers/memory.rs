//! In-memory writer for tests and diagnostics

use crate::core::error::Result;
use crate::core::log_level::LogLevel;
use crate::core::message::LogMessage;
use crate::core::writer::{LogWriter, LogWriterCore};
use crate::formatters::{LogFormatter, LogTemplate, RenderBuffer, TemplateFormatter};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// One message as the memory writer saw it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedMessage {
    pub logger_name: String,
    pub level: LogLevel,
    pub sequence_id: u64,
    pub thread_id: u64,
    /// Output of the writer's formatter
    pub line: String,
}

/// Keeps every rendered message in memory.
///
/// The default formatter renders only the message text.
pub struct MemoryWriter {
    core: LogWriterCore,
    formatter: Box<dyn LogFormatter>,
    state: Mutex<MemoryState>,
    flushes: AtomicUsize,
    disposed: AtomicBool,
}

#[derive(Default)]
struct MemoryState {
    render: RenderBuffer,
    captured: Vec<CapturedMessage>,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self {
            core: LogWriterCore::new(),
            formatter: Box::new(TemplateFormatter::new(text_only())),
            state: Mutex::new(MemoryState::default()),
            flushes: AtomicUsize::new(0),
            disposed: AtomicBool::new(false),
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

    pub fn len(&self) -> usize {
        self.state.lock().captured.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rendered lines in arrival order
    pub fn lines(&self) -> Vec<String> {
        self.state
            .lock()
            .captured
            .iter()
            .map(|m| m.line.clone())
            .collect()
    }

    pub fn messages(&self) -> Vec<CapturedMessage> {
        self.state.lock().captured.clone()
    }

    pub fn clear(&self) {
        self.state.lock().captured.clear();
    }

    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::Acquire)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

fn text_only() -> LogTemplate {
    match LogTemplate::parse("{Text}") {
        Ok(template) => template,
        Err(e) => unreachable!("built-in template does not compile: {}", e),
    }
}

impl Default for MemoryWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl LogWriter for MemoryWriter {
    fn core(&self) -> &LogWriterCore {
        &self.core
    }

    fn log(&self, message: &LogMessage<'_>) -> Result<()> {
        let mut state = self.state.lock();
        let MemoryState { render, captured } = &mut *state;
        render.render(self.formatter.as_ref(), message)?;
        captured.push(CapturedMessage {
            logger_name: message.logger_name.to_string(),
            level: message.level,
            sequence_id: message.sequence_id,
            thread_id: message.thread.id(),
            line: render.as_str().to_string(),
        });
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.flushes.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn dispose(&self) -> Result<()> {
        self.disposed.store(true, Ordering::Release);
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
