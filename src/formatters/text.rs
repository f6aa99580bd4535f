//! Template-driven text formatter

use super::segment::{SegmentKind, SegmentList};
use super::template::{
    EventIdPart, FieldFormat, FieldKind, LogTemplate, TemplateField, TemplateItem, ThreadPart,
    DEFAULT_SEPARATOR,
};
use super::{LogFormatter, SpanWriter};
use crate::core::message::{ExceptionFormat, LogMessage};
use crate::core::properties::LogProperty;
use chrono::Local;
use std::fmt::Write;

/// Renders messages with a compiled [`LogTemplate`].
///
/// Every non-empty field gets a segment covering its text without alignment padding, and
/// every run of non-whitespace literal text gets a [`SegmentKind::SecondaryText`] segment.
///
/// # Example
///
/// ```
/// use rust_log_engine::core::{LogLevel, LogMessage, ThreadInfo};
/// use rust_log_engine::formatters::{LogFormatter, LogTemplate, SegmentList, TemplateFormatter};
///
/// let formatter = TemplateFormatter::new(LogTemplate::parse("{Level,-5:tri}|{Text}").unwrap());
/// let thread = ThreadInfo::current();
/// let message = LogMessage::new("app", LogLevel::Warn, "disk low", &thread);
///
/// let mut buf = [0u8; 64];
/// let mut segments = SegmentList::new();
/// let len = formatter.try_format(&message, &mut buf, &mut segments).unwrap();
/// assert_eq!(&buf[..len], b"WRN  |disk low");
/// ```
#[derive(Debug, Clone)]
pub struct TemplateFormatter {
    template: LogTemplate,
    local_time: bool,
}

impl TemplateFormatter {
    pub fn new(template: LogTemplate) -> Self {
        Self {
            template,
            local_time: false,
        }
    }

    /// Render timestamps in the local time zone instead of UTC
    #[must_use]
    pub fn with_local_time(mut self, local_time: bool) -> Self {
        self.local_time = local_time;
        self
    }

    pub fn template(&self) -> &LogTemplate {
        &self.template
    }

    fn render_items(
        &self,
        items: &[TemplateItem],
        message: &LogMessage<'_>,
        out: &mut SpanWriter<'_>,
        segments: &mut SegmentList,
    ) -> Option<()> {
        for item in items {
            match item {
                TemplateItem::Literal(text) => write_literal(text, out, segments)?,
                TemplateItem::Field(field) => self.render_field(field, message, out, segments)?,
                TemplateItem::Conditional(inner) => {
                    if should_emit(inner, message) {
                        self.render_items(inner, message, out, segments)?;
                    }
                }
            }
        }
        Some(())
    }

    fn render_field(
        &self,
        field: &TemplateField,
        message: &LogMessage<'_>,
        out: &mut SpanWriter<'_>,
        segments: &mut SegmentList,
    ) -> Option<()> {
        let start = out.position();
        self.write_value(field, message, out).ok()?;

        let mut value_start = start;
        let length = out.position() - start;
        let width = field.alignment.unsigned_abs() as usize;
        let chars = out.chars_since(start);
        if width > chars {
            let padding = width - chars;
            if field.alignment > 0 {
                out.insert_padding(start, padding)?;
                value_start += padding;
            } else {
                out.fill(b' ', padding)?;
            }
        }

        if let Some(kind) = segment_kind(field.kind) {
            segments.push(value_start, length, kind);
        }
        Some(())
    }

    fn write_value(
        &self,
        field: &TemplateField,
        message: &LogMessage<'_>,
        out: &mut SpanWriter<'_>,
    ) -> std::fmt::Result {
        match field.kind {
            FieldKind::Timestamp => {
                let pattern = self.template.timestamp_pattern();
                if self.local_time {
                    write!(out, "{}", message.timestamp.with_timezone(&Local).format(pattern))
                } else {
                    write!(out, "{}", message.timestamp.format(pattern))
                }
            }
            FieldKind::Level => out.write_str(message.level.name(self.template.level_format())),
            FieldKind::LoggerName => out.write_str(message.logger_name),
            FieldKind::EventId => {
                let event_id = message.event_id;
                if event_id.is_empty() {
                    return Ok(());
                }
                match field.format {
                    FieldFormat::EventId(EventIdPart::Id) => write!(out, "{}", event_id.id()),
                    FieldFormat::EventId(EventIdPart::Name) => {
                        out.write_str(event_id.name().unwrap_or_default())
                    }
                    _ => write!(out, "{}", event_id),
                }
            }
            FieldKind::Text => out.write_str(message.text),
            FieldKind::Exception => match message.exception {
                Some(exception) => {
                    let format = match field.format {
                        FieldFormat::Exception(format) => format,
                        _ => ExceptionFormat::Full,
                    };
                    exception.write_to(out, format)
                }
                None => Ok(()),
            },
            FieldKind::Thread => match (&field.format, message.thread.name()) {
                (FieldFormat::Thread(ThreadPart::Name), Some(name)) => out.write_str(name),
                _ => write!(out, "{}", message.thread.id()),
            },
            FieldKind::SequenceId => match field.format {
                FieldFormat::SequenceId { width } => {
                    write!(out, "{:0width$}", message.sequence_id, width = width)
                }
                _ => write!(out, "{}", message.sequence_id),
            },
            FieldKind::Scope => write_joined(message.scope.properties(), separator(field), out),
            FieldKind::Properties => {
                write_joined(message.properties.iter(), separator(field), out)
            }
            FieldKind::NewLine => out.write_char('\n'),
        }
    }
}

impl Default for TemplateFormatter {
    fn default() -> Self {
        Self::new(LogTemplate::standard())
    }
}

impl LogFormatter for TemplateFormatter {
    fn try_format(
        &self,
        message: &LogMessage<'_>,
        out: &mut [u8],
        segments: &mut SegmentList,
    ) -> Option<usize> {
        segments.clear();
        let mut writer = SpanWriter::new(out);
        self.render_items(self.template.items(), message, &mut writer, segments)?;
        Some(writer.position())
    }
}

fn separator(field: &TemplateField) -> &str {
    match &field.format {
        FieldFormat::Separator(separator) => separator,
        _ => DEFAULT_SEPARATOR,
    }
}

fn write_joined<'p>(
    properties: impl Iterator<Item = LogProperty<'p>>,
    separator: &str,
    out: &mut SpanWriter<'_>,
) -> std::fmt::Result {
    for (i, property) in properties.enumerate() {
        if i > 0 {
            out.write_str(separator)?;
        }
        write!(out, "{}", property)?;
    }
    Ok(())
}

/// Write literal text, tagging each non-whitespace run
fn write_literal(text: &str, out: &mut SpanWriter<'_>, segments: &mut SegmentList) -> Option<()> {
    let base = out.position();
    out.write_bytes(text.as_bytes())?;

    let mut run_start = None;
    for (i, c) in text.char_indices() {
        match (c.is_whitespace(), run_start) {
            (false, None) => run_start = Some(i),
            (true, Some(start)) => {
                segments.push(base + start, i - start, SegmentKind::SecondaryText);
                run_start = None;
            }
            _ => {}
        }
    }
    if let Some(start) = run_start {
        segments.push(base + start, text.len() - start, SegmentKind::SecondaryText);
    }
    Some(())
}

/// A conditional is emitted when any of its emptyable fields has content, or always when it
/// has none
fn should_emit(items: &[TemplateItem], message: &LogMessage<'_>) -> bool {
    let mut emptyable = items.iter().filter_map(|item| match item {
        TemplateItem::Field(field) if field.kind.is_emptyable() => Some(field.kind),
        _ => None,
    });

    let Some(first) = emptyable.next() else {
        return true;
    };
    std::iter::once(first).chain(emptyable).any(|kind| match kind {
        FieldKind::EventId => !message.event_id.is_empty(),
        FieldKind::Exception => message.exception.is_some(),
        FieldKind::Scope => !message.scope.is_empty(),
        FieldKind::Properties => !message.properties.is_empty(),
        FieldKind::Text => !message.text.is_empty(),
        _ => false,
    })
}

fn segment_kind(kind: FieldKind) -> Option<SegmentKind> {
    let kind = match kind {
        FieldKind::Timestamp => SegmentKind::Timestamp,
        FieldKind::Level => SegmentKind::Level,
        FieldKind::LoggerName => SegmentKind::LoggerName,
        FieldKind::EventId => SegmentKind::EventId,
        FieldKind::Text => SegmentKind::Text,
        FieldKind::Exception => SegmentKind::Exception,
        FieldKind::Thread => SegmentKind::ThreadId,
        FieldKind::SequenceId => SegmentKind::SequenceId,
        FieldKind::Scope => SegmentKind::Scope,
        FieldKind::Properties => SegmentKind::Properties,
        FieldKind::NewLine => return None,
    };
    Some(kind)
}
