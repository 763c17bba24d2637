//! Source location types.
//!
//! Locations are derived from reader marks after the fact: a mark only
//! records a byte offset, and the line/column pair is computed from the
//! buffered file content when a diagnostic needs it.
//!
//! # Example
//!
//! ```rust
//! use psp_compiler::location::{Location, Position};
//!
//! let start = Position::new("page.psp", 3, 40, 45);
//! let loc = Location::at(start);
//!
//! assert_eq!(loc.file_name(), "page.psp");
//! assert_eq!(format!("{}", loc), "page.psp:3:6");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// A position in a source file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    /// File name.
    pub file_name: String,
    /// Line number (1-indexed).
    pub line: usize,
    /// Byte offset of the beginning of the line.
    pub bol: usize,
    /// Byte offset from beginning of file.
    pub cnum: usize,
}

impl Position {
    /// Create a new position.
    pub fn new(file_name: impl Into<String>, line: usize, bol: usize, cnum: usize) -> Self {
        Self {
            file_name: file_name.into(),
            line,
            bol,
            cnum,
        }
    }

    /// Create a position at the start of a file.
    pub fn at_file_start(file_name: impl Into<String>) -> Self {
        Self::new(file_name, 1, 0, 0)
    }

    /// Compute the position of byte `offset` within `text`.
    pub fn from_offset(file_name: impl Into<String>, text: &str, offset: usize) -> Self {
        let offset = offset.min(text.len());
        let before = &text[..offset];
        let line = before.matches('\n').count() + 1;
        let bol = before.rfind('\n').map_or(0, |nl| nl + 1);
        Self::new(file_name, line, bol, offset)
    }

    /// Get the column number (0-indexed).
    pub fn column(&self) -> usize {
        self.cnum - self.bol
    }

    /// Get the column number (1-indexed, for display).
    pub fn column_1indexed(&self) -> usize {
        self.column() + 1
    }
}

/// A location span in a template.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    /// Start position.
    pub loc_start: Position,
    /// End position.
    pub loc_end: Position,
}

impl Location {
    /// Create a new location from start and end positions.
    pub fn from_positions(start: Position, end: Position) -> Self {
        Self {
            loc_start: start,
            loc_end: end,
        }
    }

    /// Create a zero-width location.
    pub fn at(pos: Position) -> Self {
        Self {
            loc_start: pos.clone(),
            loc_end: pos,
        }
    }

    /// Get the file name.
    pub fn file_name(&self) -> &str {
        &self.loc_start.file_name
    }

    /// Get the start line number.
    pub fn start_line(&self) -> usize {
        self.loc_start.line
    }

    /// Get the start column (0-indexed).
    pub fn start_column(&self) -> usize {
        self.loc_start.column()
    }

    /// Merge two locations into a span covering both.
    pub fn merge(&self, other: &Location) -> Self {
        Self {
            loc_start: self.loc_start.clone(),
            loc_end: other.loc_end.clone(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let start = &self.loc_start;
        let end = &self.loc_end;
        if start.file_name != end.file_name || start.cnum >= end.cnum {
            write!(
                f,
                "{}:{}:{}",
                start.file_name,
                start.line,
                start.column_1indexed()
            )
        } else if start.line == end.line {
            write!(
                f,
                "{}:{}:{}-{}",
                start.file_name,
                start.line,
                start.column_1indexed(),
                end.column()
            )
        } else {
            write!(
                f,
                "{}:{}:{}-{}:{}",
                start.file_name,
                start.line,
                start.column_1indexed(),
                end.line,
                end.column()
            )
        }
    }
}
