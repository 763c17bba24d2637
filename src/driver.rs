//! Compiler entry point.
//!
//! A [`Compiler`] holds an immutable [`CompilerConfig`] and can be shared
//! between threads: every compile builds its own reader, parser, handler and
//! writer.
//!
//! # Example
//!
//! ```rust
//! use psp_compiler::{Compiler, CompilerConfig};
//!
//! let compiler = Compiler::new(CompilerConfig::default());
//! let page = compiler.compile_str("hello.psp", "Hello <%= name %>!").unwrap();
//!
//! assert_eq!(page.class_name, "hello_psp");
//! assert!(page.source.contains("res.write(_formatter(name))"));
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::CompilerConfig;
use crate::diagnostics::{CompileResult, Diagnostic};
use crate::handler::PageEventHandler;
use crate::parser::Parser;
use crate::reader::Reader;

/// A compiled template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledPage {
    /// Name of the generated class.
    pub class_name: String,
    /// The generated Python module.
    pub source: String,
    /// Warnings reported while compiling.
    pub diagnostics: Vec<Diagnostic>,
}

impl CompiledPage {
    /// File name the module is written to, `<class_name>.py`.
    pub fn module_file_name(&self) -> String {
        format!("{}.py", self.class_name)
    }
}

/// Compiles templates with one configuration.
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    config: CompilerConfig,
}

impl Compiler {
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compile the template at `path`.
    ///
    /// Relative include and insert paths resolve against the configured base
    /// directory, or the template's own directory when none is set.
    pub fn compile_file(&self, path: impl AsRef<Path>) -> CompileResult<CompiledPage> {
        let path = path.as_ref();
        log::debug!("Compiling {}", path.display());

        let mut reader = Reader::new(self.config.delimiters_cross_includes);
        reader.push_file(path, None)?;
        if let Some(base_dir) = &self.config.base_dir {
            reader.set_base_dir(base_dir.clone());
        }
        self.compile(reader, &self.class_name(path), &path.display().to_string())
    }

    /// Compile in-memory template text. `name` stands in for the file name
    /// in the class name, the module header and diagnostics.
    pub fn compile_str(&self, name: &str, source: &str) -> CompileResult<CompiledPage> {
        log::debug!("Compiling {}", name);

        let base_dir = self.config.base_dir.clone().unwrap_or_else(|| PathBuf::from("."));
        let mut reader = Reader::new(self.config.delimiters_cross_includes);
        reader.push_source(name, source, base_dir);
        self.compile(reader, &self.class_name(Path::new(name)), name)
    }

    fn class_name(&self, path: &Path) -> String {
        match &self.config.class_name {
            Some(name) => name.clone(),
            None => class_name_for_path(path),
        }
    }

    fn compile(&self, reader: Reader, class_name: &str, source_name: &str) -> CompileResult<CompiledPage> {
        let mut handler = PageEventHandler::new(&self.config, class_name, source_name);
        let mut parser = Parser::new(reader);
        parser.parse(&mut handler)?;
        let source = handler.generate()?;

        Ok(CompiledPage {
            class_name: class_name.to_string(),
            source,
            diagnostics: handler.take_diagnostics(),
        })
    }
}

/// Class name for a template file: `<stem>_<extension>`, with every
/// character that cannot appear in a Python identifier replaced by `_`.
pub fn class_name_for_path(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut name: String = file_name
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '_' })
        .collect();
    if name.is_empty() || name.starts_with(|ch: char| ch.is_ascii_digit()) {
        name.insert(0, '_');
    }
    name
}

/// Write `contents` to `path` through a temporary file in the same
/// directory, so readers never see a partially written module.
pub fn write_atomically(path: &Path, contents: &str) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp_file = tempfile::Builder::new()
        .prefix(".pspc")
        .suffix(".py.tmp")
        .tempfile_in(dir)?;
    temp_file.write_all(contents.as_bytes())?;
    temp_file.flush()?;
    temp_file.persist(path).map_err(|err| err.error)?;
    Ok(())
}
