//! Tagged byte ranges of rendered output

use std::ops::Range;

/// What a rendered byte range shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    Timestamp,
    Level,
    LoggerName,
    EventId,
    Text,
    Exception,
    ThreadId,
    SequenceId,
    Scope,
    Properties,
    /// Non-whitespace literal text of a template
    SecondaryText,
}

/// A range of the UTF-8 output, in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogMessageFormatSegment {
    pub start: usize,
    pub length: usize,
    pub kind: SegmentKind,
}

impl LogMessageFormatSegment {
    #[inline]
    pub fn end(&self) -> usize {
        self.start + self.length
    }

    #[inline]
    pub fn range(&self) -> Range<usize> {
        self.start..self.end()
    }
}

/// Reusable list of segments filled by a formatter
#[derive(Debug, Clone, Default)]
pub struct SegmentList {
    segments: Vec<LogMessageFormatSegment>,
}

impl SegmentList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a segment; empty ranges are skipped
    pub fn push(&mut self, start: usize, length: usize, kind: SegmentKind) {
        if length == 0 {
            return;
        }
        debug_assert!(
            self.segments.last().map_or(true, |last| last.end() <= start),
            "segments must be pushed in order"
        );
        self.segments.push(LogMessageFormatSegment {
            start,
            length,
            kind,
        });
    }

    pub fn clear(&mut self) {
        self.segments.clear();
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn as_slice(&self) -> &[LogMessageFormatSegment] {
        &self.segments
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LogMessageFormatSegment> {
        self.segments.iter()
    }

    /// First segment of `kind`
    pub fn find(&self, kind: SegmentKind) -> Option<&LogMessageFormatSegment> {
        self.segments.iter().find(|s| s.kind == kind)
    }
}

impl<'a> IntoIterator for &'a SegmentList {
    type Item = &'a LogMessageFormatSegment;
    type IntoIter = std::slice::Iter<'a, LogMessageFormatSegment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_segments_are_skipped() {
        let mut segments = SegmentList::new();
        segments.push(0, 0, SegmentKind::Text);
        segments.push(0, 4, SegmentKind::Level);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments.as_slice()[0].range(), 0..4);
    }
}
