//! Positional drift tracking for sequential edits within one file.

use crate::autofix::errors::SpliceError;
use crate::rule_match::RuleMatch;

/// Cumulative drift caused by earlier edits to a file during one pass.
///
/// Valid only while edits arrive in non-decreasing line order and no file
/// is revisited after the pass. Overlapping spans are not handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileOffsets {
    /// Net change in the file's line count from all edits so far
    pub line_offset: isize,
    /// Column drift on `active_line`, reset whenever a new line is entered
    pub col_offset: isize,
    /// Original (1-indexed) start line of the most recent match
    pub active_line: usize,
}

impl FileOffsets {
    pub fn new(active_line: usize) -> Self {
        Self {
            line_offset: 0,
            col_offset: 0,
            active_line,
        }
    }

    /// Track the start line of the next match; column drift only carries
    /// over between matches on the same original line.
    pub fn enter_line(&mut self, line: usize) {
        if self.active_line != line {
            self.active_line = line;
            self.col_offset = 0;
        }
    }

    /// Translate a match's original 1-indexed span into a 0-indexed span of
    /// the file as it is now.
    pub fn locate(&self, rule_match: &RuleMatch) -> Result<Span, SpliceError> {
        let shift = |value: usize, offset: isize| value as isize - 1 + offset;

        let start_line = to_index(shift(rule_match.start.line, self.line_offset))?;
        let end_line = to_index(shift(rule_match.end.line, self.line_offset))?;
        if end_line < start_line {
            return Err(SpliceError::InvertedSpan {
                start_line: start_line + 1,
                end_line: end_line + 1,
            });
        }

        let start_col = shift(rule_match.start.col, self.col_offset);
        let end_col = shift(rule_match.end.col, self.col_offset);
        let start_col = usize::try_from(start_col).map_err(|_| SpliceError::NegativeColumn {
            line: start_line + 1,
            col: start_col,
        })?;
        let end_col = usize::try_from(end_col).map_err(|_| SpliceError::NegativeColumn {
            line: end_line + 1,
            col: end_col,
        })?;

        Ok(Span {
            start_line,
            start_col,
            end_line,
            end_col,
        })
    }

    /// Account for a literal fix: line drift always, column drift only
    /// when the match sat on a single line.
    pub fn record_literal(&mut self, span: &Span, line_delta: isize, fix_chars: usize) {
        self.line_offset += line_delta;
        if span.is_single_line() {
            self.col_offset += fix_chars as isize - span.width() as isize;
        }
    }

    /// Regex fixes may reshape lines arbitrarily, so only line drift is
    /// tracked.
    pub fn record_regex(&mut self, line_delta: isize) {
        self.line_offset += line_delta;
    }
}

fn to_index(line: isize) -> Result<usize, SpliceError> {
    usize::try_from(line).map_err(|_| SpliceError::LineOutOfRange {
        line: line + 1,
        line_count: 0,
    })
}

/// A 0-indexed, end-exclusive span in the current file contents.
/// Columns count characters, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start_line: usize,
    pub start_col: usize,
    pub end_line: usize,
    pub end_col: usize,
}

impl Span {
    pub fn is_single_line(&self) -> bool {
        self.start_line == self.end_line
    }

    fn width(&self) -> usize {
        self.end_col.saturating_sub(self.start_col)
    }
}
