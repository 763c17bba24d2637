//! Page event handler and module emission.
//!
//! [`PageEventHandler`] receives the parser's constructs. Page directives
//! update the [`PageDirectives`] of the page, include directives push the
//! named file onto the reader, and every other construct becomes a
//! [`Generator`]. Once parsing is done, [`PageEventHandler::generate`]
//! writes the Python module in a fixed sequence of passes:
//!
//! 1. header: imports and the template file name
//! 2. module-level code (`<psp:file>`)
//! 3. base class resolution, class header and the standard methods
//! 4. class-level code (`<psp:class>`)
//! 5. methods declared with `<psp:method>`
//! 6. the output method and its transaction-free variant
//! 7. merging of adjacent literal text
//! 8. dropping whitespace-only text between script tags, if enabled
//! 9. the page body
//! 10. footer

use crate::config::{CompilerConfig, IndentStyle};
use crate::diagnostics::{CompileError, CompileResult, Diagnostic, DiagnosticsContext, ErrorKind, Warning};
use crate::generators::{escape_string, Generator, InsertSource, Phase, RESPONSE_OBJECT};
use crate::parser::{Construct, ConstructKind, ParseEventHandler};
use crate::reader::{Attributes, Reader, SourceEncoding};
use crate::writer::{CodeWriter, SourceWriter};

/// Base class of generated pages unless the page says otherwise.
pub const DEFAULT_BASE_CLASS: &str = "WebKit.Page";
/// Method the page body is written into unless the page says otherwise.
pub const DEFAULT_MAIN_METHOD: &str = "writeHTML";
/// Output formatter for expressions unless the page says otherwise.
pub const DEFAULT_FORMATTER: &str = "str";

/// Options set by `<%@ page ... %>` directives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageDirectives {
    /// Import statements, in directive order.
    pub imports: Vec<String>,
    /// Names brought in with `module:name` imports.
    pub imported_symbols: Vec<String>,
    pub base_classes: Vec<String>,
    pub main_method: String,
    pub thread_safe: bool,
    pub instance_safe: bool,
    pub indent_style: IndentStyle,
    pub indent_spaces: usize,
    pub gobble_whitespace: bool,
    pub formatter: String,
}

impl PageDirectives {
    /// Page defaults under the given configuration.
    pub fn new(config: &CompilerConfig) -> Self {
        Self {
            imports: Vec::new(),
            imported_symbols: Vec::new(),
            base_classes: vec![DEFAULT_BASE_CLASS.to_string()],
            main_method: DEFAULT_MAIN_METHOD.to_string(),
            thread_safe: false,
            instance_safe: true,
            indent_style: config.default_indent_style,
            indent_spaces: config.default_indent_spaces,
            gobble_whitespace: config.gobble_whitespace,
            formatter: DEFAULT_FORMATTER.to_string(),
        }
    }

    /// Apply one page directive attribute.
    pub fn apply(&mut self, name: &str, value: &str) -> CompileResult<()> {
        let invalid = || {
            CompileError::new(ErrorKind::InvalidDirectiveValue {
                name: name.to_string(),
                value: value.to_string(),
            })
        };
        match name {
            "imports" | "import" => self.add_imports(value),
            "extends" | "BaseClass" => {
                self.base_classes = split_list(value).map(str::to_string).collect();
            }
            "method" => self.main_method = value.trim().to_string(),
            "isThreadSafe" => self.thread_safe = !value.trim().eq_ignore_ascii_case("no"),
            "isInstanceSafe" => self.instance_safe = !value.trim().eq_ignore_ascii_case("no"),
            "indentType" => self.indent_style = value.trim().parse().map_err(|_| invalid())?,
            "indentSpaces" => {
                self.indent_spaces = value
                    .trim()
                    .parse::<usize>()
                    .ok()
                    .filter(|&spaces| spaces > 0)
                    .ok_or_else(invalid)?;
            }
            "gobbleWhitespace" => {
                let value = value.trim();
                self.gobble_whitespace = !(value.eq_ignore_ascii_case("no") || value == "0");
            }
            "formatter" => self.formatter = value.trim().to_string(),
            _ => {
                return Err(CompileError::new(ErrorKind::UnknownDirective {
                    name: name.to_string(),
                }));
            }
        }
        Ok(())
    }

    fn add_imports(&mut self, value: &str) {
        for item in split_list(value) {
            match item.split_once(':') {
                Some((module, symbol)) => {
                    let module = module.trim();
                    let symbol = symbol.split(':').next().unwrap_or_default().trim();
                    self.imports.push(format!("from {} import {}", module, symbol));
                    self.imported_symbols.push(symbol.to_string());
                }
                None => self.imports.push(format!("import {}", item)),
            }
        }
    }
}

/// Non-empty, trimmed items of a comma-separated list.
fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|item| !item.is_empty())
}

/// Handler that compiles one page.
#[derive(Debug)]
pub struct PageEventHandler {
    class_name: String,
    source_name: String,
    directives: PageDirectives,
    generators: Vec<Generator>,
    defines_awake: bool,
    diagnostics: DiagnosticsContext,
}

impl PageEventHandler {
    /// Create a handler for the page `source_name`, compiled into class
    /// `class_name`.
    pub fn new(config: &CompilerConfig, class_name: impl Into<String>, source_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            source_name: source_name.into(),
            directives: PageDirectives::new(config),
            generators: Vec::new(),
            defines_awake: false,
            diagnostics: DiagnosticsContext::new(),
        }
    }

    pub fn directives(&self) -> &PageDirectives {
        &self.directives
    }

    pub fn generators(&self) -> &[Generator] {
        &self.generators
    }

    /// Take the warnings reported so far.
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        self.diagnostics.take_diagnostics()
    }

    fn handle_directive(&mut self, reader: &mut Reader, name: &str, attrs: &Attributes) -> CompileResult<()> {
        match name {
            "page" => {
                for (key, value) in attrs.iter() {
                    self.directives.apply(key, value)?;
                }
                Ok(())
            }
            "include" => {
                let file = required(attrs, "include", "file")?;
                reader.push_file(file, attrs.get("encoding"))
            }
            other => Err(CompileError::new(ErrorKind::UnknownDirective {
                name: other.to_string(),
            })),
        }
    }

    fn insert_generator(reader: &Reader, attrs: &Attributes) -> CompileResult<Generator> {
        let file = required(attrs, "psp:insert", "file")?;
        let path = reader.resolve(file);
        let is_static = attrs
            .get("static")
            .is_some_and(|value| matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "yes" | "1"));
        let resource_error = |message: String| {
            CompileError::new(ErrorKind::ResourceError {
                path: file.to_string(),
                message,
            })
        };

        let source = if is_static {
            let bytes = std::fs::read(&path).map_err(|err| resource_error(err.to_string()))?;
            InsertSource::Static {
                content: SourceEncoding::Utf8.decode(&bytes),
            }
        } else {
            if !path.is_file() {
                return Err(resource_error("file does not exist".to_string()));
            }
            InsertSource::Dynamic {
                path: path.display().to_string(),
            }
        };
        Ok(Generator::Insert { source })
    }

    /// Write the module for everything handled so far.
    pub fn generate(&mut self) -> CompileResult<String> {
        let mut writer = SourceWriter::new(self.directives.indent_style, self.directives.indent_spaces);

        log::trace!("Emitting header of {}", self.class_name);
        self.generate_header(&mut writer);
        self.generate_phase(&mut writer, Phase::File)?;
        self.generate_declarations(&mut writer);
        self.generate_phase(&mut writer, Phase::Class)?;
        self.generate_phase(&mut writer, Phase::Declarations)?;
        self.generate_main_method(&mut writer);

        self.merge_char_data();
        if self.directives.gobble_whitespace {
            self.gobble_whitespace();
        }
        self.generate_phase(&mut writer, Phase::Service)?;
        self.generate_footer(&mut writer);

        Ok(writer.into_output())
    }

    fn generate_header(&self, writer: &mut SourceWriter) {
        writer.println(&format!("# Generated automatically by {}", CompilerConfig::TOOL_NAME));
        writer.blank_line();
        writer.print_lines(self.directives.imports.as_slice());
        writer.println("import WebKit");
        writer.println("from WebKit import Page");
        for base in &self.directives.base_classes {
            if !base.contains('.') && !self.directives.imported_symbols.contains(base) {
                writer.println(&format!("import {}", base));
            }
        }
        writer.println(&format!("__orig_file__ = \"{}\"", escape_string(&self.source_name)));
    }

    fn generate_phase(&self, writer: &mut SourceWriter, phase: Phase) -> CompileResult<()> {
        log::trace!("Emitting {:?} phase", phase);
        for generator in self.generators.iter().filter(|g| g.phase() == phase) {
            generator.generate(writer)?;
        }
        Ok(())
    }

    fn generate_declarations(&self, writer: &mut SourceWriter) {
        log::trace!("Emitting class declaration");
        writer.blank_line();
        writer.println("import types");
        writer.println("_baseClasses = []");
        for base in &self.directives.base_classes {
            let class_name = base.rsplit('.').next().unwrap_or(base.as_str());
            writer.println(&format!("_base = {}", base));
            writer.println("if isinstance(_base, types.ModuleType):");
            writer.push_indent();
            writer.println(&format!("_base = getattr(_base, \"{}\")", escape_string(class_name)));
            writer.pop_indent();
            writer.println("_baseClasses.append(_base)");
        }
        writer.blank_line();

        let bases = (0..self.directives.base_classes.len())
            .map(|idx| format!("_baseClasses[{}]", idx))
            .collect::<Vec<_>>()
            .join(", ");
        writer.println(&format!("class {}({}):", self.class_name, bases));
        writer.push_indent();

        writer.println("def canBeThreaded(self):");
        writer.push_indent();
        writer.println(if self.directives.thread_safe { "return 1" } else { "return 0" });
        writer.pop_indent();
        writer.blank_line();

        writer.println("def canBeReused(self):");
        writer.push_indent();
        writer.println(if self.directives.instance_safe { "return 1" } else { "return 0" });
        writer.pop_indent();
        writer.blank_line();

        if !self.defines_awake {
            writer.println("def awake(self, trans):");
            writer.push_indent();
            writer.println("for baseclass in self.__class__.__bases__:");
            writer.push_indent();
            writer.println("if hasattr(baseclass, \"awake\"):");
            writer.push_indent();
            writer.println("baseclass.awake(self, trans)");
            writer.println("break");
            writer.pop_indent();
            writer.pop_indent();
            writer.println("self.initPSP()");
            writer.pop_indent();
            writer.blank_line();
        }

        writer.println("def __includeFile(self, filename):");
        writer.push_indent();
        writer.println("self.write(open(filename).read())");
        writer.pop_indent();
        writer.blank_line();

        writer.println("def initPSP(self):");
        writer.push_indent();
        writer.println("pass");
        writer.pop_indent();
        writer.blank_line();
    }

    fn generate_main_method(&self, writer: &mut SourceWriter) {
        log::trace!("Emitting {}", self.directives.main_method);
        let method = &self.directives.main_method;
        writer.blank_line();
        writer.println(&format!("def {}(self, transaction=None):", method));
        writer.push_indent();
        writer.println("\"\"\"I take a WebKit.Transaction object.\"\"\"");
        writer.println("trans = transaction if transaction is not None else self._transaction");
        writer.println(&format!("{} = trans.response()", RESPONSE_OBJECT));
        writer.println("req = trans.request()");
        writer.println(&format!("self._{}({}, req, trans)", method, RESPONSE_OBJECT));
        writer.pop_indent();
        writer.blank_line();
        writer.println(&format!("def _{}(self, {}, req=None, trans=None):", method, RESPONSE_OBJECT));
        writer.push_indent();
        writer.println("\"\"\"I take a file-like object. I am useful for unit testing.\"\"\"");
        writer.println(&format!("_formatter = {}", self.directives.formatter));
        writer.set_floor_here();
    }

    fn generate_footer(&self, writer: &mut SourceWriter) {
        writer.clear_floor();
        while writer.depth() > 0 {
            writer.pop_indent();
        }
        writer.set_user_indent("");
        writer.blank_line();
        writer.println("##footer");
    }

    /// Merge every run of adjacent literal text into one generator.
    fn merge_char_data(&mut self) {
        let before = self.generators.len();
        let mut merged: Vec<Generator> = Vec::with_capacity(before);
        for generator in self.generators.drain(..) {
            if let Some(last) = merged.last_mut() {
                if last.merge(&generator) {
                    continue;
                }
            }
            merged.push(generator);
        }
        self.generators = merged;
        log::trace!("Merged {} literal generators", before - self.generators.len());
    }

    /// Drop whitespace-only text that sits between two script or end-block
    /// generators.
    fn gobble_whitespace(&mut self) {
        let gens = &self.generators;
        let keep: Vec<bool> = (0..gens.len())
            .map(|idx| {
                let between_blocks = idx > 0
                    && idx + 1 < gens.len()
                    && gens[idx - 1].is_block_boundary()
                    && gens[idx + 1].is_block_boundary();
                !(between_blocks && gens[idx].is_whitespace_char_data())
            })
            .collect();
        let mut keep = keep.into_iter();
        self.generators.retain(|_| keep.next().unwrap_or(true));
    }
}

fn required<'a>(attrs: &'a Attributes, tag: &str, attribute: &str) -> CompileResult<&'a str> {
    attrs.get(attribute).ok_or_else(|| {
        CompileError::new(ErrorKind::MissingRequiredAttribute {
            tag: tag.to_string(),
            attribute: attribute.to_string(),
        })
    })
}

impl ParseEventHandler for PageEventHandler {
    fn handle(&mut self, reader: &mut Reader, construct: Construct) -> CompileResult<()> {
        let Construct {
            kind,
            start,
            text,
            attrs,
            ..
        } = construct;

        let generator = match kind {
            ConstructKind::Comment => return Ok(()),
            ConstructKind::Directive { name } => return self.handle_directive(reader, &name, &attrs),
            ConstructKind::CharData if text.is_empty() => return Ok(()),
            ConstructKind::CharData => Generator::CharData { chars: text },
            ConstructKind::Expression => Generator::Expression { expr: text },
            ConstructKind::EndBlock { trailing_marker } => {
                if trailing_marker {
                    self.diagnostics
                        .warn(Warning::TrailingEndBlockMarker, Some(reader.location(&start)));
                }
                Generator::EndBlock
            }
            ConstructKind::Script => Generator::Script {
                code: text,
                location: Some(reader.location(&start)),
            },
            ConstructKind::ScriptFile => Generator::ScriptFile { code: text },
            ConstructKind::ScriptClass => Generator::ScriptClass { code: text },
            ConstructKind::Method => {
                let name = required(&attrs, "psp:method", "name")?.trim().to_string();
                if name == "awake" {
                    self.defines_awake = true;
                }
                Generator::Method {
                    name,
                    params: attrs.get("params").map(str::to_string),
                }
            }
            ConstructKind::MethodEnd => Generator::MethodEnd { body: text },
            ConstructKind::Include => Generator::Include {
                path: required(&attrs, "psp:include", "path")?.to_string(),
            },
            ConstructKind::Insert => Self::insert_generator(reader, &attrs)?,
        };
        self.generators.push(generator);
        Ok(())
    }
}
