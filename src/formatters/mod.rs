//! Formatters turning messages into bytes plus tagged segments

pub mod json;
pub mod segment;
pub mod template;
pub mod text;

pub use json::{FieldNaming, JsonFormatter, JsonSchema};
pub use segment::{LogMessageFormatSegment, SegmentKind, SegmentList};
pub use template::LogTemplate;
pub use text::TemplateFormatter;

use crate::core::error::Result;
use crate::core::message::LogMessage;
use crate::core::pool::ScratchBuffer;
use std::fmt;
use std::io;

/// Renders a message into a caller-provided buffer.
///
/// `try_format` returns the number of bytes written, or `None` when `out` is too small.
/// After `None` the contents of `out` and `segments` are unspecified and the caller retries
/// with a larger buffer.
pub trait LogFormatter: Send + Sync {
    fn try_format(
        &self,
        message: &LogMessage<'_>,
        out: &mut [u8],
        segments: &mut SegmentList,
    ) -> Option<usize>;
}

/// `fmt::Write` and `io::Write` over a fixed byte slice; writes fail once the slice is full
pub struct SpanWriter<'b> {
    buf: &'b mut [u8],
    len: usize,
}

impl<'b> SpanWriter<'b> {
    pub fn new(buf: &'b mut [u8]) -> Self {
        Self { buf, len: 0 }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.len
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Option<()> {
        let end = self.len.checked_add(bytes.len())?;
        self.buf.get_mut(self.len..end)?.copy_from_slice(bytes);
        self.len = end;
        Some(())
    }

    /// Append `count` copies of `byte`
    pub fn fill(&mut self, byte: u8, count: usize) -> Option<()> {
        let end = self.len.checked_add(count)?;
        self.buf.get_mut(self.len..end)?.fill(byte);
        self.len = end;
        Some(())
    }

    /// Insert `count` spaces at `at`, moving what follows to the right
    pub fn insert_padding(&mut self, at: usize, count: usize) -> Option<()> {
        if at > self.len || count > self.remaining() {
            return None;
        }
        self.buf.copy_within(at..self.len, at + count);
        self.buf[at..at + count].fill(b' ');
        self.len += count;
        Some(())
    }

    /// Characters in the written range `from..position()`
    pub fn chars_since(&self, from: usize) -> usize {
        self.buf[from..self.len]
            .iter()
            .filter(|b| (**b & 0xC0) != 0x80)
            .count()
    }

    pub fn written(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

impl fmt::Write for SpanWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write_bytes(s.as_bytes()).ok_or(fmt::Error)
    }
}

/// All-or-nothing: a write that does not fit fails with `WriteZero` and leaves the span as is
impl io::Write for SpanWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf)
            .map(|()| buf.len())
            .ok_or_else(|| io::Error::from(io::ErrorKind::WriteZero))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Scratch space and segment list reused across messages by one writer
#[derive(Default)]
pub struct RenderBuffer {
    scratch: ScratchBuffer,
    segments: SegmentList,
    len: usize,
}

impl RenderBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render `message`, growing the scratch buffer until it fits
    pub fn render(&mut self, formatter: &dyn LogFormatter, message: &LogMessage<'_>) -> Result<&[u8]> {
        let segments = &mut self.segments;
        self.len = self
            .scratch
            .format_with(|buf| formatter.try_format(message, buf, segments))?;
        Ok(self.scratch.slice(self.len))
    }

    /// Bytes produced by the last successful render
    pub fn bytes(&self) -> &[u8] {
        self.scratch.slice(self.len)
    }

    /// Segments of the last successful render
    pub fn segments(&self) -> &SegmentList {
        &self.segments
    }

    /// Text of the last render; formatters only produce UTF-8
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(self.bytes()).unwrap_or_default()
    }
}
