//! PSP template compiler.
//!
//! Translates PSP templates, markup with embedded Python, into Python
//! servlet modules. A template is read by the [`reader`], split into
//! constructs by the [`parser`] and turned into [`generators`] by the
//! [`handler`], which writes the module through a [`writer`].
//!
//! # Example
//!
//! ```rust
//! use psp_compiler::{Compiler, CompilerConfig};
//!
//! let compiler = Compiler::new(CompilerConfig::default());
//! let page = compiler
//!     .compile_str("greeting.psp", "<% for i in range(3): %>Hi <%= i %>\n<% end %>")
//!     .unwrap();
//!
//! assert!(page.source.contains("for i in range(3):"));
//! assert!(page.diagnostics.is_empty());
//! ```

pub mod braces;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod driver;
pub mod generators;
pub mod handler;
pub mod indent;
pub mod location;
pub mod parser;
pub mod reader;
pub mod writer;

pub use config::{CompilerConfig, IndentStyle};
pub use diagnostics::{CompileError, CompileResult, Diagnostic, ErrorKind, Warning};
pub use driver::{CompiledPage, Compiler, class_name_for_path, write_atomically};
