//! Structured properties encoded into a single pooled byte buffer
//!
//! Each entry is serialized inline as
//! `[name_len: u32 LE][name][kind: u8][payload]`, where numbers, booleans and chars use a
//! fixed-width payload and strings and byte spans use `[len: u32 LE][bytes]`.

use super::error::{LoggerError, Result};
use super::pool::property_buffers;
use std::fmt::{self, Write as _};

const INITIAL_CAPACITY: usize = 128;

const KIND_I64: u8 = 0;
const KIND_U64: u8 = 1;
const KIND_F64: u8 = 2;
const KIND_BOOL: u8 = 3;
const KIND_CHAR: u8 = 4;
const KIND_STR: u8 = 5;
const KIND_BYTES: u8 = 6;

/// A borrowed property value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PropertyValue<'a> {
    I64(i64),
    U64(u64),
    F64(f64),
    Bool(bool),
    Char(char),
    Str(&'a str),
    /// Raw byte span, rendered as lossy UTF-8
    Bytes(&'a [u8]),
}

impl PropertyValue<'_> {
    /// Whether the value is a number that JSON can carry unquoted
    pub fn is_finite_number(&self) -> bool {
        match self {
            PropertyValue::I64(_) | PropertyValue::U64(_) => true,
            PropertyValue::F64(v) => v.is_finite(),
            _ => false,
        }
    }
}

/// Canonical textual form: integers in decimal, floats via `Display`, booleans as
/// `true`/`false`, chars and strings verbatim, bytes as lossy UTF-8.
impl fmt::Display for PropertyValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::I64(v) => write!(f, "{}", v),
            PropertyValue::U64(v) => write!(f, "{}", v),
            PropertyValue::F64(v) => write!(f, "{}", v),
            PropertyValue::Bool(v) => write!(f, "{}", v),
            PropertyValue::Char(v) => f.write_char(*v),
            PropertyValue::Str(v) => f.write_str(v),
            PropertyValue::Bytes(v) => {
                for chunk in v.utf8_chunks() {
                    f.write_str(chunk.valid())?;
                    if !chunk.invalid().is_empty() {
                        f.write_char(char::REPLACEMENT_CHARACTER)?;
                    }
                }
                Ok(())
            }
        }
    }
}

macro_rules! impl_from_value {
    ($variant:ident as $target:ty: $($source:ty),*) => {
        $(
            impl From<$source> for PropertyValue<'_> {
                fn from(value: $source) -> Self {
                    PropertyValue::$variant(value as $target)
                }
            }
        )*
    };
}

impl_from_value!(I64 as i64: i8, i16, i32, i64, isize);
impl_from_value!(U64 as u64: u8, u16, u32, u64, usize);
impl_from_value!(F64 as f64: f32, f64);

impl From<bool> for PropertyValue<'_> {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<char> for PropertyValue<'_> {
    fn from(value: char) -> Self {
        PropertyValue::Char(value)
    }
}

impl<'a> From<&'a str> for PropertyValue<'a> {
    fn from(value: &'a str) -> Self {
        PropertyValue::Str(value)
    }
}

impl<'a> From<&'a String> for PropertyValue<'a> {
    fn from(value: &'a String) -> Self {
        PropertyValue::Str(value.as_str())
    }
}

impl<'a> From<&'a [u8]> for PropertyValue<'a> {
    fn from(value: &'a [u8]) -> Self {
        PropertyValue::Bytes(value)
    }
}

/// One decoded entry; unnamed entries have an empty name
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogProperty<'a> {
    pub name: &'a str,
    pub value: PropertyValue<'a>,
}

impl LogProperty<'_> {
    #[inline]
    pub fn is_unnamed(&self) -> bool {
        self.name.is_empty()
    }
}

/// `name=value`, or just the value for unnamed entries
impl fmt::Display for LogProperty<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unnamed() {
            write!(f, "{}", self.value)
        } else {
            write!(f, "{}={}", self.name, self.value)
        }
    }
}

/// Ordered, append-only property list.
///
/// The backing buffer is rented from a process-wide pool on first use. [`reset`] rewinds
/// the write cursor and keeps the buffer; [`dispose`] hands it back and may be called any
/// number of times. Dropping the value disposes it.
///
/// # Example
///
/// ```
/// use rust_log_engine::core::properties::LogProperties;
///
/// let mut props = LogProperties::new();
/// props.add("UserId", 42).add("Name", "Ada");
///
/// let rendered: Vec<String> = props.iter().map(|p| p.to_string()).collect();
/// assert_eq!(rendered, ["UserId=42", "Name=Ada"]);
/// assert!(props.contains("UserId", 42));
/// ```
///
/// [`reset`]: LogProperties::reset
/// [`dispose`]: LogProperties::dispose
pub struct LogProperties {
    buffer: Option<Vec<u8>>,
    count: usize,
}

static EMPTY: LogProperties = LogProperties::new();

impl LogProperties {
    pub const fn new() -> Self {
        Self {
            buffer: None,
            count: 0,
        }
    }

    /// Shared empty property list
    pub fn empty() -> &'static LogProperties {
        &EMPTY
    }

    /// Append a named entry.
    ///
    /// An entry whose name or value is too long to encode is left out with a warning on
    /// stderr; use [`try_add`](Self::try_add) to handle that case.
    pub fn add<'v>(&mut self, name: &str, value: impl Into<PropertyValue<'v>>) -> &mut Self {
        if let Err(e) = self.try_add(name, value) {
            eprintln!("[LOGGER WARNING] Property '{}' dropped: {}", name, e);
        }
        self
    }

    /// Append a named entry, failing with [`LoggerError::BufferTooLarge`] when the name or
    /// a string or byte value exceeds `u32::MAX` bytes. The list is unchanged on failure.
    pub fn try_add<'v>(
        &mut self,
        name: &str,
        value: impl Into<PropertyValue<'v>>,
    ) -> Result<&mut Self> {
        let value = value.into();
        let buffer = self.buffer_mut();
        let mark = buffer.len();
        if let Err(e) = put_span(buffer, name.as_bytes()).and_then(|()| put_value(buffer, &value)) {
            buffer.truncate(mark);
            return Err(e);
        }
        self.count += 1;
        Ok(self)
    }

    /// Append an entry without a name
    pub fn add_unnamed<'v>(&mut self, value: impl Into<PropertyValue<'v>>) -> &mut Self {
        self.add("", value)
    }

    /// Builder-style [`add`](Self::add)
    #[must_use]
    pub fn with<'v>(mut self, name: &str, value: impl Into<PropertyValue<'v>>) -> Self {
        self.add(name, value);
        self
    }

    /// Replace the contents with a copy of `other`, reusing this buffer
    pub fn copy_from(&mut self, other: &LogProperties) {
        self.reset();
        if let Some(source) = other.encoded() {
            if !source.is_empty() {
                self.buffer_mut().extend_from_slice(source);
            }
        }
        self.count = other.count;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Entries in insertion order
    pub fn iter(&self) -> PropertyIter<'_> {
        PropertyIter {
            bytes: self.encoded().unwrap_or(&[]),
            remaining: self.count,
        }
    }

    /// Whether an entry named `name` has the same canonical text as `value`
    pub fn contains<'v>(&self, name: &str, value: impl Into<PropertyValue<'v>>) -> bool {
        let expected = value.into().to_string();
        self.iter()
            .any(|p| p.name == name && text_matches(&p.value, &expected))
    }

    /// Rewind the write cursor, keeping the buffer for reuse
    pub fn reset(&mut self) {
        if let Some(buffer) = self.buffer.as_mut() {
            buffer.clear();
        }
        self.count = 0;
    }

    /// Return the buffer to the pool; later calls are no-ops
    pub fn dispose(&mut self) {
        self.count = 0;
        if let Some(buffer) = self.buffer.take() {
            property_buffers().put(buffer);
        }
    }

    fn buffer_mut(&mut self) -> &mut Vec<u8> {
        self.buffer
            .get_or_insert_with(|| property_buffers().take(INITIAL_CAPACITY))
    }

    fn encoded(&self) -> Option<&[u8]> {
        self.buffer.as_deref()
    }
}

impl Default for LogProperties {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for LogProperties {
    fn clone(&self) -> Self {
        let mut copy = LogProperties::new();
        copy.copy_from(self);
        copy
    }
}

impl Drop for LogProperties {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for LogProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<'a> IntoIterator for &'a LogProperties {
    type Item = LogProperty<'a>;
    type IntoIter = PropertyIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Decoding iterator over [`LogProperties`]
pub struct PropertyIter<'a> {
    bytes: &'a [u8],
    remaining: usize,
}

impl<'a> PropertyIter<'a> {
    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        if self.bytes.len() < n {
            return None;
        }
        let (head, tail) = self.bytes.split_at(n);
        self.bytes = tail;
        Some(head)
    }

    fn take_array<const N: usize>(&mut self) -> Option<[u8; N]> {
        self.take(N)?.try_into().ok()
    }

    fn take_span(&mut self) -> Option<&'a [u8]> {
        let len = u32::from_le_bytes(self.take_array()?) as usize;
        self.take(len)
    }

    fn decode(&mut self) -> Option<LogProperty<'a>> {
        let name = std::str::from_utf8(self.take_span()?).ok()?;
        let kind = self.take(1)?[0];
        let value = match kind {
            KIND_I64 => PropertyValue::I64(i64::from_le_bytes(self.take_array()?)),
            KIND_U64 => PropertyValue::U64(u64::from_le_bytes(self.take_array()?)),
            KIND_F64 => PropertyValue::F64(f64::from_le_bytes(self.take_array()?)),
            KIND_BOOL => PropertyValue::Bool(self.take(1)?[0] != 0),
            KIND_CHAR => PropertyValue::Char(char::from_u32(u32::from_le_bytes(
                self.take_array()?,
            ))?),
            KIND_STR => PropertyValue::Str(std::str::from_utf8(self.take_span()?).ok()?),
            KIND_BYTES => PropertyValue::Bytes(self.take_span()?),
            _ => return None,
        };
        Some(LogProperty { name, value })
    }
}

impl<'a> Iterator for PropertyIter<'a> {
    type Item = LogProperty<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        match self.decode() {
            Some(property) => {
                self.remaining -= 1;
                Some(property)
            }
            None => {
                self.remaining = 0;
                None
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

fn span_len(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| LoggerError::BufferTooLarge {
        max: u32::MAX as usize,
    })
}

fn put_span(buffer: &mut Vec<u8>, bytes: &[u8]) -> Result<()> {
    let len = span_len(bytes.len())?;
    buffer.extend_from_slice(&len.to_le_bytes());
    buffer.extend_from_slice(bytes);
    Ok(())
}

fn put_value(buffer: &mut Vec<u8>, value: &PropertyValue<'_>) -> Result<()> {
    match value {
        PropertyValue::I64(v) => {
            buffer.push(KIND_I64);
            buffer.extend_from_slice(&v.to_le_bytes());
        }
        PropertyValue::U64(v) => {
            buffer.push(KIND_U64);
            buffer.extend_from_slice(&v.to_le_bytes());
        }
        PropertyValue::F64(v) => {
            buffer.push(KIND_F64);
            buffer.extend_from_slice(&v.to_le_bytes());
        }
        PropertyValue::Bool(v) => {
            buffer.push(KIND_BOOL);
            buffer.push(u8::from(*v));
        }
        PropertyValue::Char(v) => {
            buffer.push(KIND_CHAR);
            buffer.extend_from_slice(&u32::from(*v).to_le_bytes());
        }
        PropertyValue::Str(v) => {
            buffer.push(KIND_STR);
            return put_span(buffer, v.as_bytes());
        }
        PropertyValue::Bytes(v) => {
            buffer.push(KIND_BYTES);
            return put_span(buffer, v);
        }
    }
    Ok(())
}

/// Compares a value's canonical text against `expected` without allocating
fn text_matches(value: &PropertyValue<'_>, expected: &str) -> bool {
    struct Matcher<'e> {
        rest: &'e str,
    }

    impl fmt::Write for Matcher<'_> {
        fn write_str(&mut self, s: &str) -> fmt::Result {
            match self.rest.strip_prefix(s) {
                Some(rest) => {
                    self.rest = rest;
                    Ok(())
                }
                None => Err(fmt::Error),
            }
        }
    }

    let mut matcher = Matcher { rest: expected };
    write!(matcher, "{}", value).is_ok() && matcher.rest.is_empty()
}
