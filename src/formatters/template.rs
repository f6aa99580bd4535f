//! Output template compiler
//!
//! Syntax:
//!
//! - literal text, with `{{` and `}}` for literal braces
//! - fields `{Name[,alignment][:format]}` with case-insensitive names
//! - one level of conditional blocks `{? ... ?}`, emitted only when one of their
//!   emptyable fields (EventId, Exception, Scope, Properties, Text) has content
//!
//! | Field | Format |
//! |---|---|
//! | `Timestamp` | strftime pattern, default `%Y-%m-%d %H:%M:%S%.3f` |
//! | `Level` | `short`, `long`, `tri`, `char` |
//! | `LoggerName`, `Text`, `NewLine` | none |
//! | `EventId` | `id`, `name` (default `id:name`) |
//! | `Exception` | `type`, `message` (default type, message and causes) |
//! | `Thread` | `id`, `name` (default `id`; `name` falls back to the id) |
//! | `SequenceId` | zero-pad width, `D8` or `8` |
//! | `Scope`, `Properties` | `separator=<text>` (default `, `) |
//!
//! Timestamp and level formats are template-wide: the first explicit one wins and a
//! different later one is reported as a warning.

use crate::core::error::{LoggerError, Result};
use crate::core::log_level::LevelFormat;
use crate::core::message::ExceptionFormat;
use crate::core::timestamp::is_valid_pattern;

/// Timestamp pattern used when the template does not give one
pub const DEFAULT_TIMESTAMP_PATTERN: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Separator used between scope or property entries
pub const DEFAULT_SEPARATOR: &str = ", ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Timestamp,
    Level,
    LoggerName,
    EventId,
    Text,
    Exception,
    Thread,
    SequenceId,
    Scope,
    Properties,
    NewLine,
}

impl FieldKind {
    fn parse(name: &str) -> Option<Self> {
        let kind = match name.to_ascii_lowercase().as_str() {
            "timestamp" => FieldKind::Timestamp,
            "level" => FieldKind::Level,
            "loggername" => FieldKind::LoggerName,
            "eventid" => FieldKind::EventId,
            "text" => FieldKind::Text,
            "exception" => FieldKind::Exception,
            "thread" => FieldKind::Thread,
            "sequenceid" => FieldKind::SequenceId,
            "scope" => FieldKind::Scope,
            "properties" => FieldKind::Properties,
            "newline" => FieldKind::NewLine,
            _ => return None,
        };
        Some(kind)
    }

    /// Fields that can render as nothing and so drive conditional blocks
    pub fn is_emptyable(self) -> bool {
        matches!(
            self,
            FieldKind::EventId
                | FieldKind::Exception
                | FieldKind::Scope
                | FieldKind::Properties
                | FieldKind::Text
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventIdPart {
    Id,
    Name,
    /// `id:name`, or `id` when unnamed
    #[default]
    Combined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThreadPart {
    #[default]
    Id,
    /// Thread name, or the id for unnamed threads
    Name,
}

/// Per-field format options
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldFormat {
    Default,
    EventId(EventIdPart),
    Exception(ExceptionFormat),
    Thread(ThreadPart),
    SequenceId { width: usize },
    Separator(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateField {
    pub kind: FieldKind,
    /// Minimum width in characters; negative values left-justify
    pub alignment: i32,
    pub format: FieldFormat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateItem {
    Literal(String),
    Field(TemplateField),
    Conditional(Vec<TemplateItem>),
}

/// A compiled output template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogTemplate {
    source: String,
    items: Vec<TemplateItem>,
    timestamp_pattern: String,
    level_format: LevelFormat,
    warnings: Vec<String>,
}

impl LogTemplate {
    /// Compile `source`.
    ///
    /// # Errors
    ///
    /// Returns [`LoggerError::Template`] with the byte position of the problem for unknown
    /// fields, bad alignments or formats, nested or empty conditionals, stray `}` and
    /// unterminated fields or conditionals.
    ///
    /// # Example
    ///
    /// ```
    /// use rust_log_engine::formatters::template::LogTemplate;
    ///
    /// let template = LogTemplate::parse("{Level:tri} {LoggerName}{? [{EventId}]?}: {Text}").unwrap();
    /// assert!(template.warnings().is_empty());
    ///
    /// assert!(LogTemplate::parse("{Colour}").is_err());
    /// ```
    pub fn parse(source: &str) -> Result<Self> {
        Parser::new(source).parse()
    }

    /// `{Timestamp:%H:%M:%S%.3f} {Level:tri} {Text}`
    pub fn compact() -> Self {
        Self::preset("{Timestamp:%H:%M:%S%.3f} {Level:tri} {Text}")
    }

    /// Timestamp, level, logger name, optional event id, text and optional exception
    pub fn standard() -> Self {
        Self::preset(
            "{Timestamp} {Level:tri} {LoggerName}{? [{EventId}]?}: {Text}{?{NewLine}{Exception}?}",
        )
    }

    /// Everything, including thread, sequence id, properties and scopes
    pub fn detailed() -> Self {
        Self::preset(
            "{Timestamp:%Y-%m-%d %H:%M:%S%.6f} [{Thread}] #{SequenceId:D8} {Level:tri} \
             {LoggerName}{? [{EventId}]?}: {Text}{? {{{Properties}}}?}{? <{Scope}>?}\
             {?{NewLine}{Exception}?}",
        )
    }

    fn preset(source: &str) -> Self {
        match Self::parse(source) {
            Ok(template) => template,
            Err(e) => unreachable!("built-in template does not compile: {}", e),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn items(&self) -> &[TemplateItem] {
        &self.items
    }

    /// Pattern every `Timestamp` field renders with
    pub fn timestamp_pattern(&self) -> &str {
        &self.timestamp_pattern
    }

    /// Naming convention every `Level` field renders with
    pub fn level_format(&self) -> LevelFormat {
        self.level_format
    }

    /// Non-fatal problems found while compiling
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

impl std::str::FromStr for LogTemplate {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

struct Parser<'a> {
    source: &'a str,
    position: usize,
    timestamp_pattern: Option<String>,
    level_format: Option<LevelFormat>,
    warnings: Vec<String>,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            position: 0,
            timestamp_pattern: None,
            level_format: None,
            warnings: Vec::new(),
        }
    }

    fn rest(&self) -> &'a str {
        &self.source[self.position..]
    }

    fn parse(mut self) -> Result<LogTemplate> {
        let mut items = Vec::new();
        let mut literal = String::new();

        while let Some(c) = self.rest().chars().next() {
            let rest = self.rest();
            if rest.starts_with("{{") {
                literal.push('{');
                self.position += 2;
            } else if rest.starts_with("}}") {
                literal.push('}');
                self.position += 2;
            } else if rest.starts_with("{?") {
                flush_literal(&mut literal, &mut items);
                items.push(self.parse_conditional()?);
            } else if c == '{' {
                flush_literal(&mut literal, &mut items);
                items.push(TemplateItem::Field(self.parse_field()?));
            } else if c == '}' {
                return Err(LoggerError::template(self.position, "unexpected '}'"));
            } else {
                literal.push(c);
                self.position += c.len_utf8();
            }
        }
        flush_literal(&mut literal, &mut items);

        Ok(LogTemplate {
            source: self.source.to_string(),
            items,
            timestamp_pattern: self
                .timestamp_pattern
                .unwrap_or_else(|| DEFAULT_TIMESTAMP_PATTERN.to_string()),
            level_format: self.level_format.unwrap_or_default(),
            warnings: self.warnings,
        })
    }

    fn parse_conditional(&mut self) -> Result<TemplateItem> {
        let start = self.position;
        self.position += 2;

        let mut items = Vec::new();
        let mut literal = String::new();
        loop {
            let rest = self.rest();
            let Some(c) = rest.chars().next() else {
                return Err(LoggerError::template(start, "unterminated conditional block"));
            };

            if rest.starts_with("?}") {
                self.position += 2;
                break;
            } else if rest.starts_with("{?") {
                return Err(LoggerError::template(
                    self.position,
                    "conditional blocks cannot be nested",
                ));
            } else if rest.starts_with("{{") {
                literal.push('{');
                self.position += 2;
            } else if rest.starts_with("}}") {
                literal.push('}');
                self.position += 2;
            } else if c == '{' {
                flush_literal(&mut literal, &mut items);
                items.push(TemplateItem::Field(self.parse_field()?));
            } else if c == '}' {
                return Err(LoggerError::template(self.position, "unexpected '}'"));
            } else {
                literal.push(c);
                self.position += c.len_utf8();
            }
        }
        flush_literal(&mut literal, &mut items);

        let fields: Vec<FieldKind> = items
            .iter()
            .filter_map(|item| match item {
                TemplateItem::Field(field) => Some(field.kind),
                _ => None,
            })
            .collect();
        if fields.is_empty() {
            return Err(LoggerError::template(
                start,
                "conditional block must contain at least one field",
            ));
        }
        if !fields.iter().any(|kind| kind.is_emptyable()) {
            self.warnings.push(format!(
                "conditional block at position {} has no field that can be empty and is always emitted",
                start
            ));
        }

        Ok(TemplateItem::Conditional(items))
    }

    fn parse_field(&mut self) -> Result<TemplateField> {
        let start = self.position;
        let body_start = start + 1;
        let Some(length) = self.source[body_start..].find('}') else {
            return Err(LoggerError::template(start, "unterminated field"));
        };
        let body = &self.source[body_start..body_start + length];
        self.position = body_start + length + 1;

        let (head, format) = match body.split_once(':') {
            Some((head, format)) => (head, Some(format)),
            None => (body, None),
        };
        let (name, alignment) = match head.split_once(',') {
            Some((name, alignment)) => (name.trim(), Some(alignment.trim())),
            None => (head.trim(), None),
        };

        let kind = FieldKind::parse(name)
            .ok_or_else(|| LoggerError::template(start, format!("unknown field '{}'", name)))?;

        let alignment = match alignment {
            None => 0,
            Some(_) if kind == FieldKind::NewLine => {
                return Err(LoggerError::template(start, "NewLine takes no alignment"));
            }
            Some(text) => text.parse::<i32>().map_err(|_| {
                LoggerError::template(start, format!("invalid alignment '{}'", text))
            })?,
        };

        let format = match format {
            None => FieldFormat::Default,
            Some(spec) => self.field_format(kind, spec, start)?,
        };

        Ok(TemplateField {
            kind,
            alignment,
            format,
        })
    }

    fn field_format(&mut self, kind: FieldKind, spec: &str, position: usize) -> Result<FieldFormat> {
        let invalid = |what: &str| {
            LoggerError::template(position, format!("invalid {} format '{}'", what, spec))
        };

        match kind {
            FieldKind::Timestamp => {
                if spec.is_empty() || !is_valid_pattern(spec) {
                    return Err(invalid("timestamp"));
                }
                match &self.timestamp_pattern {
                    None => self.timestamp_pattern = Some(spec.to_string()),
                    Some(first) if first != spec => self.warnings.push(format!(
                        "timestamp format '{}' at position {} ignored, '{}' is already in use",
                        spec, position, first
                    )),
                    Some(_) => {}
                }
                Ok(FieldFormat::Default)
            }
            FieldKind::Level => {
                let format = LevelFormat::parse(spec).ok_or_else(|| invalid("level"))?;
                match self.level_format {
                    None => self.level_format = Some(format),
                    Some(first) if first != format => self.warnings.push(format!(
                        "level format '{}' at position {} ignored, an earlier field set {:?}",
                        spec, position, first
                    )),
                    Some(_) => {}
                }
                Ok(FieldFormat::Default)
            }
            FieldKind::EventId => match spec.to_ascii_lowercase().as_str() {
                "id" => Ok(FieldFormat::EventId(EventIdPart::Id)),
                "name" => Ok(FieldFormat::EventId(EventIdPart::Name)),
                _ => Err(invalid("event id")),
            },
            FieldKind::Exception => match spec.to_ascii_lowercase().as_str() {
                "type" => Ok(FieldFormat::Exception(ExceptionFormat::Type)),
                "message" => Ok(FieldFormat::Exception(ExceptionFormat::Message)),
                _ => Err(invalid("exception")),
            },
            FieldKind::Thread => match spec.to_ascii_lowercase().as_str() {
                "id" => Ok(FieldFormat::Thread(ThreadPart::Id)),
                "name" => Ok(FieldFormat::Thread(ThreadPart::Name)),
                _ => Err(invalid("thread")),
            },
            FieldKind::SequenceId => {
                let digits = spec
                    .strip_prefix('D')
                    .or_else(|| spec.strip_prefix('d'))
                    .unwrap_or(spec);
                let width = digits.parse::<usize>().map_err(|_| invalid("sequence id"))?;
                Ok(FieldFormat::SequenceId { width })
            }
            FieldKind::Scope | FieldKind::Properties => spec
                .strip_prefix("separator=")
                .map(|separator| FieldFormat::Separator(separator.to_string()))
                .ok_or_else(|| invalid("separator")),
            FieldKind::LoggerName | FieldKind::Text | FieldKind::NewLine => Err(
                LoggerError::template(position, format!("field {:?} takes no format", kind)),
            ),
        }
    }
}

fn flush_literal(literal: &mut String, items: &mut Vec<TemplateItem>) {
    if !literal.is_empty() {
        items.push(TemplateItem::Literal(std::mem::take(literal)));
    }
}
