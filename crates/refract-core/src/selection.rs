//! Line/column selections and their resolution to byte ranges.
//!
//! Lines and columns are 1-based. Columns count Unicode scalar values from the start of the
//! line (a tab is one column). The start position is inclusive and the end position is
//! exclusive: `4:16-4:17` selects exactly one character.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::{Document, TextRange, TextSize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct LineColumnSelection {
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("lines and columns are 1-based (got {line}:{column})")]
    ZeroPosition { line: u32, column: u32 },
    #[error("line {line} is past the end of the document ({line_count} lines)")]
    LineOutOfBounds { line: u32, line_count: u32 },
    #[error("column {column} is past the end of line {line} ({line_len} columns)")]
    ColumnOutOfBounds { line: u32, column: u32, line_len: u32 },
    #[error("selection end {end_line}:{end_column} is before its start {start_line}:{start_column}")]
    Inverted {
        start_line: u32,
        start_column: u32,
        end_line: u32,
        end_column: u32,
    },
    #[error("invalid selection syntax `{0}` (expected `LINE:COL-LINE:COL`)")]
    Syntax(String),
}

impl LineColumnSelection {
    pub const fn new(start_line: u32, start_column: u32, end_line: u32, end_column: u32) -> Self {
        Self {
            start_line,
            start_column,
            end_line,
            end_column,
        }
    }

    /// An empty selection (caret) at `line:column`.
    pub const fn caret(line: u32, column: u32) -> Self {
        Self::new(line, column, line, column)
    }

    /// Resolve the selection against `document` to a byte range.
    pub fn resolve(&self, document: &Document) -> Result<TextRange, SelectionError> {
        let start = position_to_offset(document, self.start_line, self.start_column)?;
        let end = position_to_offset(document, self.end_line, self.end_column)?;
        if end < start {
            return Err(SelectionError::Inverted {
                start_line: self.start_line,
                start_column: self.start_column,
                end_line: self.end_line,
                end_column: self.end_column,
            });
        }
        Ok(TextRange::new(start, end))
    }

    /// Reverse mapping, used for diagnostics and fixtures.
    ///
    /// Offsets inside a line terminator map to the end of that line.
    pub fn from_range(document: &Document, range: TextRange) -> Self {
        let (start_line, start_column) = offset_to_position(document, range.start());
        let (end_line, end_column) = offset_to_position(document, range.end());
        Self::new(start_line, start_column, end_line, end_column)
    }
}

fn position_to_offset(document: &Document, line: u32, column: u32) -> Result<TextSize, SelectionError> {
    if line == 0 || column == 0 {
        return Err(SelectionError::ZeroPosition { line, column });
    }
    let index = document.line_index();
    let line_count = index.line_count();
    let line_text = document
        .line_text(line - 1)
        .ok_or(SelectionError::LineOutOfBounds { line, line_count })?;
    let line_start = index
        .line_start(line - 1)
        .ok_or(SelectionError::LineOutOfBounds { line, line_count })?;

    let wanted = (column - 1) as usize;
    let mut chars = 0usize;
    for (byte_idx, _) in line_text.char_indices() {
        if chars == wanted {
            return Ok(line_start + TextSize::from(byte_idx as u32));
        }
        chars += 1;
    }
    if chars == wanted {
        return Ok(line_start + TextSize::from(line_text.len() as u32));
    }
    Err(SelectionError::ColumnOutOfBounds {
        line,
        column,
        line_len: chars as u32,
    })
}

fn offset_to_position(document: &Document, offset: TextSize) -> (u32, u32) {
    let index = document.line_index();
    let line = index.line_of(offset);
    let line_start = index.line_start(line).unwrap_or_default();
    let line_end = index.line_end(line).unwrap_or(line_start);
    let offset = offset.min(line_end);
    let prefix = document
        .slice(TextRange::new(line_start, offset))
        .unwrap_or_default();
    (line + 1, prefix.chars().count() as u32 + 1)
}

impl fmt::Display for LineColumnSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}-{}:{}",
            self.start_line, self.start_column, self.end_line, self.end_column
        )
    }
}

impl FromStr for LineColumnSelection {
    type Err = SelectionError;

    /// Parses `LINE:COL-LINE:COL` or a caret position `LINE:COL`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let syntax = || SelectionError::Syntax(s.to_string());
        let parse_pos = |pos: &str| -> Result<(u32, u32), SelectionError> {
            let (line, col) = pos.trim().split_once(':').ok_or_else(syntax)?;
            let line = line.trim().parse().map_err(|_| syntax())?;
            let col = col.trim().parse().map_err(|_| syntax())?;
            Ok((line, col))
        };

        match s.split_once('-') {
            Some((start, end)) => {
                let (start_line, start_column) = parse_pos(start)?;
                let (end_line, end_column) = parse_pos(end)?;
                Ok(Self::new(start_line, start_column, end_line, end_column))
            }
            None => {
                let (line, column) = parse_pos(s)?;
                Ok(Self::caret(line, column))
            }
        }
    }
}
