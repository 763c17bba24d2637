//! Diagnostics types for warnings and errors.
//!
//! Every error the compiler can raise is fatal for the compile in progress:
//! the caller gets a [`CompileError`] carrying the kind and, when known, the
//! template location derived from the reader's active mark. Non-fatal
//! conditions are collected as [`Warning`]s in a [`DiagnosticsContext`] that
//! belongs to one compile and travels back with the compiled page.
//!
//! # Example
//!
//! ```rust
//! use psp_compiler::diagnostics::{DiagnosticsContext, Warning};
//!
//! let mut ctx = DiagnosticsContext::new();
//! ctx.warn(Warning::TrailingEndBlockMarker, None);
//!
//! assert!(ctx.has_warnings());
//! assert_eq!(ctx.diagnostics().len(), 1);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::location::Location;

/// Non-fatal conditions reported while compiling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Warning {
    /// An end-block tag carried the `$` marker before `%>`, which has no
    /// effect there.
    TrailingEndBlockMarker,
}

impl Warning {
    /// Human-readable message for the warning.
    pub fn message(&self) -> String {
        match self {
            Warning::TrailingEndBlockMarker => {
                "a `$` before the closing `%>` of an end tag does nothing".to_string()
            }
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

/// A reported warning with its location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The warning.
    pub warning: Warning,
    /// Location in the template, if known.
    pub location: Option<Location>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(loc) => write!(f, "{}: warning: {}", loc, self.warning),
            None => write!(f, "warning: {}", self.warning),
        }
    }
}

/// Per-compile collection of warnings.
#[derive(Debug, Default)]
pub struct DiagnosticsContext {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticsContext {
    /// Create a new diagnostics context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a warning.
    pub fn warn(&mut self, warning: Warning, location: Option<Location>) {
        let diagnostic = Diagnostic { warning, location };
        log::warn!("{}", diagnostic);
        self.diagnostics.push(diagnostic);
    }

    /// Check if any warnings were reported.
    pub fn has_warnings(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    /// Get all diagnostics.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Take all diagnostics, leaving the context empty.
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }
}

/// The kind of a fatal compile error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// An opening delimiter never found its closing delimiter.
    MalformedConstruct {
        /// The delimiter that was expected.
        expected: String,
    },
    /// The reader ran past the end of all input.
    UnexpectedEndOfInput,
    /// An unknown directive, or an unknown page directive attribute.
    UnknownDirective {
        /// The offending name.
        name: String,
    },
    /// A known page directive attribute with an unusable value.
    InvalidDirectiveValue {
        /// Attribute name.
        name: String,
        /// The rejected value.
        value: String,
    },
    /// Input ended inside a tag's attribute list or a quoted value.
    UnterminatedAttribute,
    /// An attribute name was not followed by `=`.
    MissingAttributeValue {
        /// Attribute name.
        name: String,
    },
    /// A script block in brace syntax ended inside a string literal.
    UnterminatedQuote {
        /// The quote marker that was left open.
        quote: String,
    },
    /// A tag is missing an attribute it cannot work without.
    MissingRequiredAttribute {
        /// The tag or directive.
        tag: String,
        /// The missing attribute.
        attribute: String,
    },
    /// A referenced template, include or insert file could not be read.
    ResourceError {
        /// The path that was requested.
        path: String,
        /// Underlying reason.
        message: String,
    },
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::MalformedConstruct { expected } => {
                write!(f, "reached end of input while looking for `{}`", expected)
            }
            ErrorKind::UnexpectedEndOfInput => write!(f, "unexpected end of input"),
            ErrorKind::UnknownDirective { name } => write!(f, "unknown directive `{}`", name),
            ErrorKind::InvalidDirectiveValue { name, value } => {
                write!(f, "invalid value `{}` for page directive `{}`", value, name)
            }
            ErrorKind::UnterminatedAttribute => write!(f, "unterminated tag attribute"),
            ErrorKind::MissingAttributeValue { name } => {
                write!(f, "attribute `{}` has no value", name)
            }
            ErrorKind::UnterminatedQuote { quote } => {
                write!(f, "script block ends inside a {} string", quote)
            }
            ErrorKind::MissingRequiredAttribute { tag, attribute } => {
                write!(f, "`{}` requires a `{}` attribute", tag, attribute)
            }
            ErrorKind::ResourceError { path, message } => {
                write!(f, "cannot read `{}`: {}", path, message)
            }
        }
    }
}

/// A fatal compile error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileError {
    /// What went wrong.
    pub kind: ErrorKind,
    /// Where it went wrong, if known.
    pub location: Option<Location>,
}

impl CompileError {
    /// Create an error without location information.
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            location: None,
        }
    }

    /// Create an error at a location.
    pub fn at(kind: ErrorKind, location: Location) -> Self {
        Self {
            kind,
            location: Some(location),
        }
    }

    /// Attach a location if the error does not carry one yet.
    pub fn or_at(mut self, location: impl FnOnce() -> Location) -> Self {
        if self.location.is_none() {
            self.location = Some(location());
        }
        self
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(loc) => write!(f, "{}: {}", loc, self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for CompileError {}

/// Result alias used throughout the compiler.
pub type CompileResult<T> = Result<T, CompileError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::Position;

    #[test]
    fn test_diagnostics_context() {
        let mut ctx = DiagnosticsContext::new();
        assert!(!ctx.has_warnings());

        let loc = Location::at(Position::new("page.psp", 2, 10, 14));
        ctx.warn(Warning::TrailingEndBlockMarker, Some(loc));

        assert!(ctx.has_warnings());
        assert_eq!(
            ctx.diagnostics()[0].to_string(),
            "page.psp:2:5: warning: a `$` before the closing `%>` of an end tag does nothing"
        );

        let taken = ctx.take_diagnostics();
        assert_eq!(taken.len(), 1);
        assert!(!ctx.has_warnings());
    }

    #[test]
    fn test_error_display() {
        let err = CompileError::new(ErrorKind::UnknownDirective {
            name: "taglib".to_string(),
        });
        assert_eq!(err.to_string(), "unknown directive `taglib`");

        let located = err.or_at(|| Location::at(Position::at_file_start("page.psp")));
        assert_eq!(located.to_string(), "page.psp:1:1: unknown directive `taglib`");
    }

    #[test]
    fn test_or_at_keeps_existing_location() {
        let first = Location::at(Position::new("a.psp", 4, 0, 0));
        let err = CompileError::at(ErrorKind::UnterminatedAttribute, first.clone())
            .or_at(|| Location::at(Position::at_file_start("b.psp")));
        assert_eq!(err.location, Some(first));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + std::error::Error>() {}
        assert_send_sync::<CompileError>();
    }
}
