//! Compiler configuration types.
//!
//! Configuration is immutable once built and shared by every compile a
//! [`Compiler`](crate::driver::Compiler) runs. Page directives inside a
//! template override the indentation and gobbling defaults for that page
//! only; they never write back into the configuration.
//!
//! # Example
//!
//! ```rust
//! use psp_compiler::config::{CompilerConfig, IndentStyle};
//!
//! let config = CompilerConfig::builder()
//!     .class_name("index_psp")
//!     .default_indent_style(IndentStyle::Spaces)
//!     .build();
//!
//! assert_eq!(config.class_name.as_deref(), Some("index_psp"));
//! assert_eq!(config.default_indent_spaces, 4);
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How the generated module is indented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndentStyle {
    /// One tab per level.
    #[default]
    Tabs,
    /// A fixed number of spaces per level.
    Spaces,
    /// Spaces, and script blocks are written in brace syntax that is
    /// rewritten into indentation.
    Braces,
}

impl IndentStyle {
    /// The directive spelling of this style.
    pub fn as_str(self) -> &'static str {
        match self {
            IndentStyle::Tabs => "tabs",
            IndentStyle::Spaces => "spaces",
            IndentStyle::Braces => "braces",
        }
    }
}

impl std::fmt::Display for IndentStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for IndentStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tabs" => Ok(IndentStyle::Tabs),
            "spaces" => Ok(IndentStyle::Spaces),
            "braces" => Ok(IndentStyle::Braces),
            other => Err(format!("unknown indent style: {}", other)),
        }
    }
}

/// Immutable compiler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// Name of the generated class. Derived from the template file name
    /// when unset.
    pub class_name: Option<String>,
    /// Directory that relative include and insert paths resolve against.
    /// Defaults to the directory of the root template.
    pub base_dir: Option<PathBuf>,
    /// Let a closing delimiter be found past the end of an included file,
    /// in the file that included it. Only for templates that rely on the
    /// historical behavior.
    pub delimiters_cross_includes: bool,
    /// Indent style used unless the page sets `indentType`.
    pub default_indent_style: IndentStyle,
    /// Spaces per level unless the page sets `indentSpaces`.
    pub default_indent_spaces: usize,
    /// Whether whitespace-only text between script tags is dropped unless
    /// the page sets `gobbleWhitespace`.
    pub gobble_whitespace: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            class_name: None,
            base_dir: None,
            delimiters_cross_includes: false,
            default_indent_style: IndentStyle::Tabs,
            default_indent_spaces: 4,
            gobble_whitespace: true,
        }
    }
}

impl CompilerConfig {
    /// Create a new builder for `CompilerConfig`.
    pub fn builder() -> CompilerConfigBuilder {
        CompilerConfigBuilder::default()
    }

    /// Tool name written into generated headers.
    pub const TOOL_NAME: &'static str = "PSP compiler";
}

/// Builder for `CompilerConfig`.
#[derive(Debug, Default)]
pub struct CompilerConfigBuilder {
    config: CompilerConfig,
}

impl CompilerConfigBuilder {
    /// Set the generated class name.
    pub fn class_name(mut self, value: impl Into<String>) -> Self {
        self.config.class_name = Some(value.into());
        self
    }

    /// Set the base directory for relative paths.
    pub fn base_dir(mut self, value: impl Into<PathBuf>) -> Self {
        self.config.base_dir = Some(value.into());
        self
    }

    /// Allow closing delimiters to be found across include boundaries.
    pub fn delimiters_cross_includes(mut self, value: bool) -> Self {
        self.config.delimiters_cross_includes = value;
        self
    }

    /// Set the default indent style.
    pub fn default_indent_style(mut self, value: IndentStyle) -> Self {
        self.config.default_indent_style = value;
        self
    }

    /// Set the default number of spaces per level.
    pub fn default_indent_spaces(mut self, value: usize) -> Self {
        self.config.default_indent_spaces = value;
        self
    }

    /// Set the default gobbling behavior.
    pub fn gobble_whitespace(mut self, value: bool) -> Self {
        self.config.gobble_whitespace = value;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> CompilerConfig {
        self.config
    }
}
