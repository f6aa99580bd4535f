//! JSON formatter
//!
//! Serializes one JSON object per message with `serde_json`, straight into the output
//! buffer. Two layouts are supported: a nested default layout and a flattened Elastic
//! Common Schema layout.

use super::segment::{SegmentKind, SegmentList};
use super::{LogFormatter, SpanWriter};
use crate::core::event_id::LogEventId;
use crate::core::log_level::LogLevel;
use crate::core::message::{LogException, LogMessage};
use crate::core::properties::{LogProperties, LogProperty, PropertyValue};
use crate::core::scope::ScopeSnapshot;
use crate::core::timestamp::TimestampFormat;
use chrono::{DateTime, Utc};
use serde::ser::{SerializeMap, SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::io::{self, Write as _};

/// Object layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum JsonSchema {
    /// `timestamp`, `level`, `logger`, `event_id{id,name}`, `message`, `thread_id`,
    /// `thread_name`, `sequence_id`, `exception{type,message}`, `scope[]`, `properties{}`
    #[default]
    Default,
    /// Flattened ECS keys: `@timestamp`, `log.level`, `log.logger`, `message`,
    /// `event.code`, `event.action`, `event.sequence`, `process.thread.id`,
    /// `process.thread.name`, `error.type`, `error.message`, `labels{}`
    Ecs,
}

/// Casing of the default layout's own keys; property names are written as given
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FieldNaming {
    #[default]
    SnakeCase,
    CamelCase,
    PascalCase,
}

#[derive(Debug, Clone, Copy)]
enum Key {
    Timestamp,
    Level,
    Logger,
    EventId,
    Id,
    Name,
    Message,
    ThreadId,
    ThreadName,
    SequenceId,
    Exception,
    Type,
    Scope,
    Properties,
}

impl Key {
    fn name(self, naming: FieldNaming) -> &'static str {
        use FieldNaming::*;
        match (self, naming) {
            (Key::Timestamp, SnakeCase | CamelCase) => "timestamp",
            (Key::Timestamp, PascalCase) => "Timestamp",
            (Key::Level, SnakeCase | CamelCase) => "level",
            (Key::Level, PascalCase) => "Level",
            (Key::Logger, SnakeCase | CamelCase) => "logger",
            (Key::Logger, PascalCase) => "Logger",
            (Key::EventId, SnakeCase) => "event_id",
            (Key::EventId, CamelCase) => "eventId",
            (Key::EventId, PascalCase) => "EventId",
            (Key::Id, SnakeCase | CamelCase) => "id",
            (Key::Id, PascalCase) => "Id",
            (Key::Name, SnakeCase | CamelCase) => "name",
            (Key::Name, PascalCase) => "Name",
            (Key::Message, SnakeCase | CamelCase) => "message",
            (Key::Message, PascalCase) => "Message",
            (Key::ThreadId, SnakeCase) => "thread_id",
            (Key::ThreadId, CamelCase) => "threadId",
            (Key::ThreadId, PascalCase) => "ThreadId",
            (Key::ThreadName, SnakeCase) => "thread_name",
            (Key::ThreadName, CamelCase) => "threadName",
            (Key::ThreadName, PascalCase) => "ThreadName",
            (Key::SequenceId, SnakeCase) => "sequence_id",
            (Key::SequenceId, CamelCase) => "sequenceId",
            (Key::SequenceId, PascalCase) => "SequenceId",
            (Key::Exception, SnakeCase | CamelCase) => "exception",
            (Key::Exception, PascalCase) => "Exception",
            (Key::Type, SnakeCase | CamelCase) => "type",
            (Key::Type, PascalCase) => "Type",
            (Key::Scope, SnakeCase | CamelCase) => "scope",
            (Key::Scope, PascalCase) => "Scope",
            (Key::Properties, SnakeCase | CamelCase) => "properties",
            (Key::Properties, PascalCase) => "Properties",
        }
    }
}

/// Formats messages as single-line JSON objects.
///
/// # Examples
///
/// ```
/// use rust_log_engine::core::{LogLevel, LogMessage, LogProperties, ThreadInfo};
/// use rust_log_engine::formatters::{JsonFormatter, JsonSchema, LogFormatter, SegmentList};
///
/// let formatter = JsonFormatter::new().with_schema(JsonSchema::Ecs);
/// let thread = ThreadInfo::current();
/// let props = LogProperties::new().with("port", 8080);
/// let message = LogMessage::new("http", LogLevel::Info, "listening", &thread)
///     .with_properties(&props);
///
/// let mut buf = [0u8; 512];
/// let len = formatter
///     .try_format(&message, &mut buf, &mut SegmentList::new())
///     .unwrap();
/// let json = std::str::from_utf8(&buf[..len]).unwrap();
/// assert!(json.contains(r#""labels":{"port":8080}"#));
/// ```
#[derive(Debug, Clone, Default)]
pub struct JsonFormatter {
    schema: JsonSchema,
    naming: FieldNaming,
    timestamp_format: TimestampFormat,
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_schema(mut self, schema: JsonSchema) -> Self {
        self.schema = schema;
        self
    }

    #[must_use]
    pub fn with_field_naming(mut self, naming: FieldNaming) -> Self {
        self.naming = naming;
        self
    }

    /// Set the timestamp rendering; numeric formats are written as JSON numbers.
    ///
    /// An invalid custom pattern falls back to ISO 8601.
    #[must_use]
    pub fn with_timestamp_format(mut self, format: TimestampFormat) -> Self {
        if format.is_valid() {
            self.timestamp_format = format;
        } else {
            eprintln!(
                "[WARN] Invalid timestamp pattern {:?}, using ISO 8601 instead",
                format
            );
            self.timestamp_format = TimestampFormat::Iso8601;
        }
        self
    }

    pub fn schema(&self) -> JsonSchema {
        self.schema
    }
}

impl LogFormatter for JsonFormatter {
    fn try_format(
        &self,
        message: &LogMessage<'_>,
        out: &mut [u8],
        segments: &mut SegmentList,
    ) -> Option<usize> {
        segments.clear();
        let marks = SegmentMarks {
            position: Cell::new(0),
            segments: RefCell::new(std::mem::take(segments)),
        };
        let mut span = SpanWriter::new(out);

        let written = serde_json::to_writer(
            TrackedWriter {
                inner: &mut span,
                position: &marks.position,
            },
            &Record {
                formatter: self,
                message,
                marks: &marks,
            },
        );
        *segments = marks.segments.into_inner();

        written.ok().map(|()| span.position())
    }
}

/// Publishes the output position so values can record their segments
struct TrackedWriter<'w, 'b> {
    inner: &'w mut SpanWriter<'b>,
    position: &'w Cell<usize>,
}

impl io::Write for TrackedWriter<'_, '_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.position.set(self.inner.position());
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct SegmentMarks {
    position: Cell<usize>,
    segments: RefCell<SegmentList>,
}

impl SegmentMarks {
    /// Record what was written since `start`, without the quotes of a string
    fn record(&self, start: usize, quoted: bool, kind: SegmentKind) {
        let end = self.position.get();
        let (start, end) = if quoted {
            (start + 1, end.saturating_sub(1))
        } else {
            (start, end)
        };
        if end > start {
            self.segments.borrow_mut().push(start, end - start, kind);
        }
    }
}

/// A value whose output range becomes a segment
struct Marked<'r, T> {
    value: T,
    kind: SegmentKind,
    quoted: bool,
    marks: &'r SegmentMarks,
}

impl<T: Serialize> Serialize for Marked<'_, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let start = self.marks.position.get();
        let ok = self.value.serialize(serializer)?;
        self.marks.record(start, self.quoted, self.kind);
        Ok(ok)
    }
}

struct Record<'r, 'm> {
    formatter: &'r JsonFormatter,
    message: &'r LogMessage<'m>,
    marks: &'r SegmentMarks,
}

impl<'r> Record<'r, '_> {
    fn text(&self, value: &'r str, kind: SegmentKind) -> Marked<'r, &'r str> {
        Marked {
            value,
            kind,
            quoted: true,
            marks: self.marks,
        }
    }

    fn timestamp(&self) -> Marked<'r, TimestampValue<'r>> {
        let format = &self.formatter.timestamp_format;
        Marked {
            value: TimestampValue {
                format,
                timestamp: &self.message.timestamp,
            },
            kind: SegmentKind::Timestamp,
            quoted: !format.is_numeric(),
            marks: self.marks,
        }
    }

    fn serialize_default<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let formatter = self.formatter;
        let message = self.message;
        let naming = formatter.naming;
        let key = |key: Key| key.name(naming);

        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry(key(Key::Timestamp), &self.timestamp())?;
        map.serialize_entry(key(Key::Level), &self.text(message.level.to_str(), SegmentKind::Level))?;
        map.serialize_entry(
            key(Key::Logger),
            &self.text(message.logger_name, SegmentKind::LoggerName),
        )?;
        if !message.event_id.is_empty() {
            map.serialize_entry(
                key(Key::EventId),
                &EventIdObject {
                    event_id: message.event_id,
                    naming,
                },
            )?;
        }
        map.serialize_entry(key(Key::Message), &self.text(message.text, SegmentKind::Text))?;
        map.serialize_entry(key(Key::ThreadId), &message.thread.id())?;
        if let Some(name) = message.thread.name() {
            map.serialize_entry(key(Key::ThreadName), name)?;
        }
        map.serialize_entry(key(Key::SequenceId), &message.sequence_id)?;
        if let Some(exception) = message.exception {
            map.serialize_entry(key(Key::Exception), &ExceptionObject { exception, naming })?;
        }
        if !message.scope.is_empty() {
            map.serialize_entry(key(Key::Scope), &ScopeArray(message.scope))?;
        }
        if !message.properties.is_empty() {
            map.serialize_entry(key(Key::Properties), &PropertyObject(message.properties))?;
        }
        map.end()
    }

    fn serialize_ecs<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let message = self.message;

        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("@timestamp", &self.timestamp())?;
        map.serialize_entry("log.level", &self.text(ecs_level(message.level), SegmentKind::Level))?;
        map.serialize_entry(
            "log.logger",
            &self.text(message.logger_name, SegmentKind::LoggerName),
        )?;
        map.serialize_entry("message", &self.text(message.text, SegmentKind::Text))?;
        if !message.event_id.is_empty() {
            map.serialize_entry("event.code", &message.event_id.id())?;
            if let Some(name) = message.event_id.name() {
                map.serialize_entry("event.action", name)?;
            }
        }
        map.serialize_entry("event.sequence", &message.sequence_id)?;
        map.serialize_entry("process.thread.id", &message.thread.id())?;
        if let Some(name) = message.thread.name() {
            map.serialize_entry("process.thread.name", name)?;
        }
        if let Some(exception) = message.exception {
            map.serialize_entry("error.type", exception.type_name())?;
            map.serialize_entry("error.message", exception.message())?;
        }
        if !message.scope.is_empty() || !message.properties.is_empty() {
            map.serialize_entry("labels", &Labels(message))?;
        }
        map.end()
    }
}

impl Serialize for Record<'_, '_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.formatter.schema {
            JsonSchema::Default => self.serialize_default(serializer),
            JsonSchema::Ecs => self.serialize_ecs(serializer),
        }
    }
}

/// Numeric formats serialize as numbers, the others as strings
struct TimestampValue<'a> {
    format: &'a TimestampFormat,
    timestamp: &'a DateTime<Utc>,
}

impl fmt::Display for TimestampValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.format.write_to(self.timestamp, f)
    }
}

impl Serialize for TimestampValue<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.format.unix_value(self.timestamp) {
            Some(value) => serializer.serialize_i64(value),
            None => serializer.collect_str(self),
        }
    }
}

struct EventIdObject<'a> {
    event_id: &'a LogEventId,
    naming: FieldNaming,
}

impl Serialize for EventIdObject<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry(Key::Id.name(self.naming), &self.event_id.id())?;
        if let Some(name) = self.event_id.name() {
            map.serialize_entry(Key::Name.name(self.naming), name)?;
        }
        map.end()
    }
}

struct ExceptionObject<'a> {
    exception: &'a LogException,
    naming: FieldNaming,
}

impl Serialize for ExceptionObject<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry(Key::Type.name(self.naming), self.exception.type_name())?;
        map.serialize_entry(Key::Message.name(self.naming), self.exception.message())?;
        map.end()
    }
}

struct ScopeArray<'a>(&'a ScopeSnapshot);

impl Serialize for ScopeArray<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.0.depth()))?;
        for properties in self.0.iter() {
            seq.serialize_element(&PropertyObject(properties))?;
        }
        seq.end()
    }
}

/// `"name":value` pairs; unnamed entries are keyed `_<index>`
struct PropertyObject<'a>(&'a LogProperties);

impl Serialize for PropertyObject<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (index, property) in self.0.iter().enumerate() {
            map.serialize_entry(
                &PropertyKey::new(&property, "_", index),
                &JsonValue(&property.value),
            )?;
        }
        map.end()
    }
}

/// Scope and message properties in one object.
///
/// A named entry is written once, with the innermost value: message properties win over
/// scopes, and deeper scopes over outer ones. Unnamed scope entries are keyed
/// `scope_<index>` and unnamed message entries `_<index>`, each counted within its source.
struct Labels<'a, 'm>(&'a LogMessage<'m>);

impl Serialize for Labels<'_, '_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let scope = self.0.scope;
        let properties = self.0.properties;
        let mut map = serializer.serialize_map(None)?;
        for (index, property) in scope.properties().enumerate() {
            if !property.is_unnamed()
                && (properties.iter().any(|p| p.name == property.name)
                    || scope.properties().skip(index + 1).any(|p| p.name == property.name))
            {
                continue;
            }
            map.serialize_entry(
                &PropertyKey::new(&property, "scope_", index),
                &JsonValue(&property.value),
            )?;
        }
        for (index, property) in properties.iter().enumerate() {
            map.serialize_entry(
                &PropertyKey::new(&property, "_", index),
                &JsonValue(&property.value),
            )?;
        }
        map.end()
    }
}

enum PropertyKey<'p> {
    Named(&'p str),
    Unnamed(&'static str, usize),
}

impl<'p> PropertyKey<'p> {
    fn new(property: &LogProperty<'p>, prefix: &'static str, index: usize) -> Self {
        if property.is_unnamed() {
            PropertyKey::Unnamed(prefix, index)
        } else {
            PropertyKey::Named(property.name)
        }
    }
}

impl Serialize for PropertyKey<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PropertyKey::Named(name) => serializer.serialize_str(name),
            PropertyKey::Unnamed(prefix, index) => {
                serializer.collect_str(&format_args!("{}{}", prefix, index))
            }
        }
    }
}

/// Finite numbers and booleans stay JSON scalars; everything else is its canonical text
struct JsonValue<'v, 'p>(&'v PropertyValue<'p>);

impl Serialize for JsonValue<'_, '_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            PropertyValue::I64(v) => serializer.serialize_i64(*v),
            PropertyValue::U64(v) => serializer.serialize_u64(*v),
            PropertyValue::F64(v) if v.is_finite() => serializer.serialize_f64(*v),
            PropertyValue::Bool(v) => serializer.serialize_bool(*v),
            PropertyValue::Str(v) => serializer.serialize_str(v),
            other => serializer.collect_str(other),
        }
    }
}

fn ecs_level(level: LogLevel) -> &'static str {
    match level {
        LogLevel::All => "all",
        LogLevel::Trace => "trace",
        LogLevel::Debug => "debug",
        LogLevel::Info => "info",
        LogLevel::Warn => "warn",
        LogLevel::Error => "error",
        LogLevel::Fatal => "fatal",
        LogLevel::None => "none",
    }
}
