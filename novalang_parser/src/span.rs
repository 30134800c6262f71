//! Source location tracking.
//!
//! Every token and every IR node downstream carries a [`Span`] so that
//! diagnostics can always point back at the originating source text.

use serde::{Deserialize, Serialize};

/// Identifies which source file a [`Span`] belongs to.
///
/// Multi-file builds assign each compiled unit a small integer id up front;
/// spans never embed a file path directly so they stay `Copy`.
pub type FileId = u32;

/// A half-open byte range in a source file, plus the 1-indexed line/column
/// of its endpoints.
///
/// Spans are immutable and cheap to copy. A lowered node inherits the span
/// of its primary syntactic origin, so spans survive unchanged from the
/// lexer all the way through to the back end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    pub file_id: FileId,
    pub start: usize,
    pub end: usize,
    pub start_line: usize,
    pub end_line: usize,
    pub start_column: usize,
    pub end_column: usize,
}

impl Span {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        file_id: FileId,
        start: usize,
        end: usize,
        start_line: usize,
        end_line: usize,
        start_column: usize,
        end_column: usize,
    ) -> Self {
        Self {
            file_id,
            start,
            end,
            start_line,
            end_line,
            start_column,
            end_column,
        }
    }

    /// A span with no location information, used for synthetic nodes that
    /// have no direct syntactic origin (e.g. a generated default-argument
    /// thunk).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Merge two spans into the smallest span that covers both.
    ///
    /// Used when a parent node's span is the union of its children, e.g. a
    /// binary expression spans from the start of its left operand to the
    /// end of its right operand.
    pub fn merge(&self, other: &Span) -> Span {
        Span {
            file_id: self.file_id,
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            start_line: self.start_line.min(other.start_line),
            end_line: self.end_line.max(other.end_line),
            start_column: if self.start <= other.start {
                self.start_column
            } else {
                other.start_column
            },
            end_column: if self.end >= other.end {
                self.end_column
            } else {
                other.end_column
            },
        }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn contains(&self, offset: usize) -> bool {
        offset >= self.start && offset < self.end
    }
}

/// Maps byte offsets within one source file to 1-indexed (line, column)
/// pairs, via a binary search over recorded line-start offsets.
#[derive(Debug, Clone)]
pub struct SourceMap {
    file_id: FileId,
    line_starts: Vec<usize>,
}

impl SourceMap {
    pub fn new(file_id: FileId, source: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, c) in source.char_indices() {
            if c == '\n' {
                line_starts.push(i + 1);
            }
        }
        Self {
            file_id,
            line_starts,
        }
    }

    pub fn file_id(&self) -> FileId {
        self.file_id
    }

    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(line) => line.saturating_sub(1),
        };
        let line_start = self.line_starts.get(line).copied().unwrap_or(0);
        let column = offset - line_start + 1;
        (line + 1, column)
    }

    pub fn span(&self, start: usize, end: usize) -> Span {
        let (start_line, start_column) = self.line_col(start);
        let (end_line, end_column) = self.line_col(end);
        Span {
            file_id: self.file_id,
            start,
            end,
            start_line,
            end_line,
            start_column,
            end_column,
        }
    }

    /// The full source line containing `line` (1-indexed), for diagnostic
    /// rendering. `source` must be the same text the map was built from.
    pub fn line_text<'s>(&self, source: &'s str, line: usize) -> Option<&'s str> {
        let idx = line.checked_sub(1)?;
        let start = *self.line_starts.get(idx)?;
        let end = self
            .line_starts
            .get(idx + 1)
            .map(|&e| e.saturating_sub(1))
            .unwrap_or(source.len());
        source.get(start..end.max(start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_col_tracks_newlines() {
        let source = "hello\nworld\n";
        let map = SourceMap::new(0, source);
        assert_eq!(map.line_col(0), (1, 1));
        assert_eq!(map.line_col(5), (1, 6));
        assert_eq!(map.line_col(6), (2, 1));
        assert_eq!(map.line_col(11), (2, 6));
    }

    #[test]
    fn merge_widens_to_cover_both() {
        let a = Span::new(0, 0, 5, 1, 1, 1, 6);
        let b = Span::new(0, 10, 15, 2, 2, 5, 10);
        let merged = a.merge(&b);
        assert_eq!(merged.start, 0);
        assert_eq!(merged.end, 15);
        assert_eq!(merged.start_line, 1);
        assert_eq!(merged.end_line, 2);
    }

    #[test]
    fn line_text_extracts_single_line() {
        let source = "val x = 1\nval y = 2\n";
        let map = SourceMap::new(0, source);
        assert_eq!(map.line_text(source, 1), Some("val x = 1"));
        assert_eq!(map.line_text(source, 2), Some("val y = 2"));
    }
}
