//! Console writer with segment-based coloring

use crate::core::error::{LoggerError, Result};
use crate::core::log_level::LogLevel;
use crate::core::message::LogMessage;
use crate::core::writer::{LogWriter, LogWriterCore};
use crate::formatters::{LogFormatter, RenderBuffer, SegmentKind, TemplateFormatter};
use colored::{Color, Colorize};
use parking_lot::Mutex;
use std::io::Write;

/// Writes to stdout, or stderr for `Error` and `Fatal`.
///
/// With colors enabled, each segment reported by the formatter is colored by its kind
/// and the level segment by the message level.
pub struct ConsoleWriter {
    core: LogWriterCore,
    formatter: Box<dyn LogFormatter>,
    use_colors: bool,
    state: Mutex<ConsoleState>,
}

#[derive(Default)]
struct ConsoleState {
    render: RenderBuffer,
    line: String,
}

impl ConsoleWriter {
    pub fn new() -> Self {
        Self {
            core: LogWriterCore::new(),
            formatter: Box::new(TemplateFormatter::default()),
            use_colors: true,
            state: Mutex::new(ConsoleState::default()),
        }
    }

    #[must_use]
    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    /// Set the formatter for this writer
    ///
    /// # Example
    ///
    /// ```
    /// use rust_log_engine::formatters::{LogTemplate, TemplateFormatter};
    /// use rust_log_engine::writers::ConsoleWriter;
    ///
    /// let writer = ConsoleWriter::new()
    ///     .with_formatter(TemplateFormatter::new(LogTemplate::compact()));
    /// ```
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
}

impl Default for ConsoleWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn segment_color(kind: SegmentKind, level: LogLevel) -> Option<Color> {
    match kind {
        SegmentKind::Level => Some(level.color_code()),
        SegmentKind::Timestamp | SegmentKind::ThreadId | SegmentKind::SequenceId => {
            Some(Color::BrightBlack)
        }
        SegmentKind::LoggerName => Some(Color::Cyan),
        SegmentKind::EventId => Some(Color::Magenta),
        SegmentKind::Exception => Some(Color::Red),
        SegmentKind::Scope | SegmentKind::Properties => Some(Color::Blue),
        SegmentKind::SecondaryText => Some(Color::BrightBlack),
        SegmentKind::Text => None,
    }
}

/// Rebuild `text` with ANSI colors around each segment
fn colorize(render: &RenderBuffer, level: LogLevel, out: &mut String) {
    use std::fmt::Write as _;

    let text = render.as_str();
    let mut cursor = 0;
    for segment in render.segments() {
        let (Some(before), Some(value)) = (text.get(cursor..segment.start), text.get(segment.range()))
        else {
            break;
        };
        out.push_str(before);
        match segment_color(segment.kind, level) {
            Some(color) => {
                let _ = write!(out, "{}", value.color(color));
            }
            None => out.push_str(value),
        }
        cursor = segment.end();
    }
    out.push_str(text.get(cursor..).unwrap_or_default());
}

impl LogWriter for ConsoleWriter {
    fn core(&self) -> &LogWriterCore {
        &self.core
    }

    fn log(&self, message: &LogMessage<'_>) -> Result<()> {
        let mut state = self.state.lock();
        let ConsoleState { render, line } = &mut *state;
        render.render(self.formatter.as_ref(), message)?;

        line.clear();
        if self.use_colors {
            colorize(render, message.level, line);
        } else {
            line.push_str(render.as_str());
        }
        line.push('\n');

        // Route Error and Fatal levels to stderr, others to stdout
        let result = match message.level {
            LogLevel::Error | LogLevel::Fatal => std::io::stderr().lock().write_all(line.as_bytes()),
            _ => std::io::stdout().lock().write_all(line.as_bytes()),
        };
        result.map_err(|e| LoggerError::io_operation("writing to console", "console write failed", e))
    }

    fn flush(&self) -> Result<()> {
        // Flush both stdout and stderr since we write to both
        std::io::stdout().flush()?;
        std::io::stderr().flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        "console"
    }
}
