//! Character cursor over a stack of template files.
//!
//! The reader buffers every file it opens in a registry and reads through a
//! stack of frames, one per file being read. Pushing a file (the root
//! template, or one named by an include directive) starts a new frame; when
//! a frame runs out of input it is popped and reading resumes in the file
//! that included it.
//!
//! A [`Mark`] is a snapshot of the whole frame stack. Taking one is cheap,
//! and resetting to it restores the reader exactly, including frames that
//! were popped after it was taken. Marks are also used to slice the text
//! between two points with [`Reader::get_chars`].
//!
//! # Example
//!
//! ```rust
//! use std::path::PathBuf;
//! use psp_compiler::reader::Reader;
//!
//! let mut reader = Reader::new(false);
//! reader.push_source("page.psp", "Hello <%= name %>!", PathBuf::from("."));
//!
//! let text = reader.next_content();
//! assert_eq!(text, "Hello ");
//! assert!(reader.matches("<%="));
//! ```

mod attributes;

pub use attributes::Attributes;

use std::path::{Path, PathBuf};

use crate::diagnostics::{CompileError, CompileResult, ErrorKind};
use crate::location::{Location, Position};

/// Deepest include nesting accepted, counting the root template.
pub const MAX_INCLUDE_DEPTH: usize = 64;

/// Character encoding of a template file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceEncoding {
    /// UTF-8; invalid sequences are replaced.
    #[default]
    Utf8,
    /// ISO-8859-1.
    Latin1,
}

impl SourceEncoding {
    /// Look up an encoding by its usual label.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" | "ascii" | "us-ascii" => Some(SourceEncoding::Utf8),
            "latin-1" | "latin1" | "iso-8859-1" | "iso8859-1" | "l1" => Some(SourceEncoding::Latin1),
            _ => None,
        }
    }

    /// Decode raw file content.
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            SourceEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            SourceEncoding::Latin1 => bytes.iter().map(|&b| b as char).collect(),
        }
    }
}

/// A buffered template file.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Name used in diagnostics.
    pub name: String,
    /// Content with line endings normalized to `\n`.
    pub content: String,
    /// Canonical path of a file read from disk.
    pub path: Option<PathBuf>,
}

/// Read state of one file on the include stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Registry id of the file.
    pub file_id: usize,
    /// Byte offset of the next character.
    pub cursor: usize,
    /// Directory that relative paths in this file resolve against.
    pub base_dir: PathBuf,
    /// Encoding the file was read with.
    pub encoding: SourceEncoding,
}

/// Immutable snapshot of the reader position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mark {
    frames: Vec<Frame>,
}

impl Mark {
    fn top(&self) -> Option<&Frame> {
        self.frames.last()
    }

    /// Registry id of the file the mark points into.
    pub fn file_id(&self) -> Option<usize> {
        self.top().map(|frame| frame.file_id)
    }

    /// Byte offset within that file.
    pub fn cursor(&self) -> usize {
        self.top().map_or(0, |frame| frame.cursor)
    }

    /// Number of files on the include stack.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn base_dir(&self) -> Option<&Path> {
        self.top().map(|frame| frame.base_dir.as_path())
    }

    pub fn encoding(&self) -> SourceEncoding {
        self.top().map_or(SourceEncoding::default(), |frame| frame.encoding)
    }
}

/// Cursor over the stacked template files.
#[derive(Debug)]
pub struct Reader {
    files: Vec<SourceFile>,
    current: Mark,
    delimiters_cross_includes: bool,
}

impl Reader {
    /// Create an empty reader.
    ///
    /// With `delimiters_cross_includes`, [`skip_until`](Self::skip_until)
    /// keeps searching in the including file when the current one ends.
    pub fn new(delimiters_cross_includes: bool) -> Self {
        Self {
            files: Vec::new(),
            current: Mark::default(),
            delimiters_cross_includes,
        }
    }

    fn register(&mut self, name: String, content: String, path: Option<PathBuf>) -> usize {
        self.files.push(SourceFile { name, content, path });
        self.files.len() - 1
    }

    /// Whether the file at canonical `path` is being read or included.
    fn is_open(&self, path: &Path) -> bool {
        self.current
            .frames
            .iter()
            .any(|frame| self.files[frame.file_id].path.as_deref() == Some(path))
    }

    /// Resolve `path` against the base directory of the current file.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        match self.current.base_dir() {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Read a file and continue reading from its start.
    ///
    /// Relative paths resolve against the current file's base directory.
    /// An unknown `encoding` label or an unreadable file is a
    /// `ResourceError`.
    pub fn push_file(&mut self, path: impl AsRef<Path>, encoding: Option<&str>) -> CompileResult<()> {
        let requested = path.as_ref();
        let resolved = self.resolve(requested);
        let resource_error = |message: String| ErrorKind::ResourceError {
            path: requested.display().to_string(),
            message,
        };

        let encoding = match encoding {
            Some(label) => SourceEncoding::from_label(label)
                .ok_or_else(|| self.error(resource_error(format!("unknown encoding `{}`", label))))?,
            None => SourceEncoding::default(),
        };
        if self.current.depth() >= MAX_INCLUDE_DEPTH {
            return Err(self.error(resource_error(format!(
                "includes are nested more than {} levels deep",
                MAX_INCLUDE_DEPTH
            ))));
        }
        let bytes = std::fs::read(&resolved).map_err(|err| self.error(resource_error(err.to_string())))?;
        let canonical = std::fs::canonicalize(&resolved).ok();
        if canonical.as_deref().is_some_and(|path| self.is_open(path)) {
            return Err(self.error(resource_error("file includes itself".to_string())));
        }
        let content = normalize_newlines(&encoding.decode(&bytes));

        let base_dir = match resolved.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        log::debug!("Reading {} (depth {})", resolved.display(), self.current.depth() + 1);
        let file_id = self.register(resolved.display().to_string(), content, canonical);
        self.current.frames.push(Frame {
            file_id,
            cursor: 0,
            base_dir,
            encoding,
        });
        Ok(())
    }

    /// Read in-memory template text as if it were a file named `name`.
    pub fn push_source(&mut self, name: impl Into<String>, text: &str, base_dir: PathBuf) {
        let file_id = self.register(name.into(), normalize_newlines(text), None);
        self.current.frames.push(Frame {
            file_id,
            cursor: 0,
            base_dir,
            encoding: SourceEncoding::Utf8,
        });
    }

    /// Override the base directory of the current file.
    pub fn set_base_dir(&mut self, base_dir: PathBuf) {
        if let Some(frame) = self.current.frames.last_mut() {
            frame.base_dir = base_dir;
        }
    }

    /// Return to the file that included the current one.
    ///
    /// The root file is never popped; returns false when there is nothing
    /// to return to.
    pub fn pop_file(&mut self) -> bool {
        if self.current.frames.len() <= 1 {
            return false;
        }
        self.current.frames.pop();
        true
    }

    /// Snapshot of the current position.
    pub fn mark(&self) -> Mark {
        self.current.clone()
    }

    /// Restore a previously taken mark.
    pub fn reset(&mut self, mark: Mark) {
        self.current = mark;
    }

    /// Registry id of the file being read.
    pub fn current_file_id(&self) -> Option<usize> {
        self.current.file_id()
    }

    /// Number of files on the include stack.
    pub fn depth(&self) -> usize {
        self.current.depth()
    }

    fn content(&self, file_id: usize) -> &str {
        self.files.get(file_id).map_or("", |file| file.content.as_str())
    }

    /// Unread text of the current file.
    fn rest(&self) -> &str {
        match self.current.top() {
            Some(frame) => self.content(frame.file_id).get(frame.cursor..).unwrap_or(""),
            None => "",
        }
    }

    fn bump(&mut self, bytes: usize) {
        if let Some(frame) = self.current.frames.last_mut() {
            frame.cursor += bytes;
        }
    }

    fn move_to_end(&mut self) {
        let len = self.rest().len();
        self.bump(len);
    }

    /// Whether any input is left, popping exhausted files.
    pub fn has_more_input(&mut self) -> bool {
        if !self.rest().is_empty() {
            return true;
        }
        while self.pop_file() {
            if !self.rest().is_empty() {
                return true;
            }
        }
        false
    }

    /// Whether the current file continues with `literal`.
    pub fn matches(&self, literal: &str) -> bool {
        self.rest().starts_with(literal)
    }

    /// Consume `count` characters, continuing into the including file when
    /// the current one ends.
    pub fn advance(&mut self, count: usize) -> CompileResult<()> {
        let mut remaining = count;
        loop {
            let rest = self.rest();
            match rest.char_indices().nth(remaining) {
                Some((offset, _)) => {
                    self.bump(offset);
                    return Ok(());
                }
                None => {
                    let available = rest.chars().count();
                    self.move_to_end();
                    remaining -= available;
                    if remaining == 0 {
                        return Ok(());
                    }
                    if !self.has_more_input() {
                        return Err(self.error(ErrorKind::UnexpectedEndOfInput));
                    }
                }
            }
        }
    }

    /// Next character of the current file, without consuming it.
    pub fn peek_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    /// Consume and return the next character of the input.
    pub fn next_char(&mut self) -> Option<char> {
        if !self.has_more_input() {
            return None;
        }
        let ch = self.peek_char()?;
        self.bump(ch.len_utf8());
        Some(ch)
    }

    /// Skip spaces, tabs and line breaks; returns how many were skipped.
    pub fn skip_spaces(&mut self) -> usize {
        let mut skipped = 0;
        while let Some(ch @ (' ' | '\n' | '\t' | '\r')) = self.peek_char() {
            self.bump(ch.len_utf8());
            skipped += 1;
        }
        skipped
    }

    /// Move past the next occurrence of `literal`.
    ///
    /// Returns the mark just before the literal. If the current file does
    /// not contain it the construct is malformed, unless delimiters may
    /// cross include boundaries, in which case the search continues in the
    /// including files.
    pub fn skip_until(&mut self, literal: &str) -> CompileResult<Mark> {
        let start = self.mark();
        loop {
            if let Some(offset) = self.rest().find(literal) {
                self.bump(offset);
                let before = self.mark();
                self.bump(literal.len());
                return Ok(before);
            }
            self.move_to_end();
            if !(self.delimiters_cross_includes && self.has_more_input()) {
                let location = self.location(&start);
                return Err(CompileError::at(
                    ErrorKind::MalformedConstruct {
                        expected: literal.to_string(),
                    },
                    location,
                ));
            }
        }
    }

    /// Text between two marks.
    ///
    /// When `start` lies in an included file and `stop` in a file that
    /// included it, the text runs to the end of each included file and
    /// resumes where the including file continued.
    pub fn get_chars(&self, start: &Mark, stop: &Mark) -> String {
        let mut chars = String::new();
        let floor = start.depth().min(stop.depth());
        if floor == 0 {
            return chars;
        }
        for (idx, frame) in start.frames.iter().enumerate().skip(floor - 1).rev() {
            let content = self.content(frame.file_id);
            let end = if idx + 1 == floor {
                stop.frames[floor - 1].cursor
            } else {
                content.len()
            };
            if let Some(text) = content.get(frame.cursor..end) {
                chars.push_str(text);
            }
        }
        chars
    }

    /// Consume at least one character and then everything up to the next
    /// `<` in the current file.
    pub fn next_content(&mut self) -> String {
        let rest = self.rest();
        let first = rest.chars().next().map_or(0, char::len_utf8);
        let end = rest[first..].find('<').map_or(rest.len(), |pos| pos + first);
        let text = rest[..end].to_string();
        self.bump(end);
        text
    }

    /// Template location of a mark.
    pub fn location(&self, mark: &Mark) -> Location {
        match mark.top() {
            Some(frame) => {
                let file = &self.files[frame.file_id];
                Location::at(Position::from_offset(
                    file.name.clone(),
                    &file.content,
                    frame.cursor,
                ))
            }
            None => Location::at(Position::default()),
        }
    }

    /// Template location of the cursor.
    pub fn current_location(&self) -> Location {
        self.location(&self.current)
    }

    /// An error located at the cursor.
    pub fn error(&self, kind: ErrorKind) -> CompileError {
        if self.current.depth() == 0 {
            CompileError::new(kind)
        } else {
            CompileError::at(kind, self.current_location())
        }
    }
}

fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}
