//! Code generators, one per recognized construct.
//!
//! The event handler turns every construct into a [`Generator`] and keeps
//! them in discovery order. At emission time each generator belongs to one
//! [`Phase`], the region of the generated module it writes into, and writes
//! itself through the shared [`SourceWriter`].

use crate::braces::BraceRewriter;
use crate::diagnostics::CompileResult;
use crate::indent::{normalize_indentation, split_lines};
use crate::location::Location;
use crate::writer::{CodeWriter, SourceWriter};

/// Name of the response object in the generated page body.
pub const RESPONSE_OBJECT: &str = "res";

/// Region of the generated module a generator writes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Module level, before the class.
    File,
    /// Class body.
    Class,
    /// Methods declared by the page.
    Declarations,
    /// Body of the page's output method.
    Service,
}

/// Where inserted file content comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertSource {
    /// Content read when the page was compiled.
    Static { content: String },
    /// File read each time the page is served.
    Dynamic { path: String },
}

/// One unit of generated code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generator {
    /// Literal template text.
    CharData { chars: String },
    /// `<%= expr %>`.
    Expression { expr: String },
    /// `<% code %>`, with the location of the code.
    Script { code: String, location: Option<Location> },
    /// `<% end %>`.
    EndBlock,
    /// `<psp:file>`.
    ScriptFile { code: String },
    /// `<psp:class>`.
    ScriptClass { code: String },
    /// Header of a `<psp:method>`.
    Method { name: String, params: Option<String> },
    /// Body of a `<psp:method>`.
    MethodEnd { body: String },
    /// `<psp:include>`, resolved when the page is served.
    Include { path: String },
    /// `<psp:insert>`.
    Insert { source: InsertSource },
}

impl Generator {
    pub fn phase(&self) -> Phase {
        match self {
            Generator::ScriptFile { .. } => Phase::File,
            Generator::ScriptClass { .. } => Phase::Class,
            Generator::Method { .. } | Generator::MethodEnd { .. } => Phase::Declarations,
            _ => Phase::Service,
        }
    }

    pub fn is_char_data(&self) -> bool {
        matches!(self, Generator::CharData { .. })
    }

    /// Script and end-block generators bound blocks in the page body.
    pub fn is_block_boundary(&self) -> bool {
        matches!(self, Generator::Script { .. } | Generator::EndBlock)
    }

    /// Literal text that consists of whitespace only.
    pub fn is_whitespace_char_data(&self) -> bool {
        match self {
            Generator::CharData { chars } => !chars.is_empty() && chars.chars().all(char::is_whitespace),
            _ => false,
        }
    }

    /// Append the text of another literal generator to this one.
    ///
    /// Returns false, leaving both untouched, unless both are literal text.
    pub fn merge(&mut self, other: &Generator) -> bool {
        match (self, other) {
            (Generator::CharData { chars }, Generator::CharData { chars: more }) => {
                chars.push_str(more);
                true
            }
            _ => false,
        }
    }

    /// Write this generator's code.
    pub fn generate(&self, writer: &mut SourceWriter) -> CompileResult<()> {
        match self {
            Generator::CharData { chars } => {
                write_literal(writer, &escape_literal(chars));
            }
            Generator::Expression { expr } => {
                writer.println(&format!(
                    "{}.write(_formatter({}))",
                    RESPONSE_OBJECT,
                    remove_quotes(expr).trim()
                ));
            }
            Generator::Script { code, location } => {
                generate_script(code, writer).map_err(|err| match location {
                    Some(location) => err.or_at(|| location.clone()),
                    None => err,
                })?
            }
            Generator::EndBlock => {
                writer.close_block();
                writer.set_user_indent("");
            }
            Generator::ScriptFile { code } => {
                writer.blank_line();
                writer.println("# File level user code");
                writer.print_lines(&script_lines(code));
            }
            Generator::ScriptClass { code } => {
                writer.println("# Class level user code");
                writer.blank_line();
                writer.print_lines(&script_lines(code));
            }
            Generator::Method { name, params } => {
                match params.as_deref().map(str::trim) {
                    Some(params) if !params.is_empty() => {
                        writer.println(&format!("def {}(self, {}):", name, params))
                    }
                    _ => writer.println(&format!("def {}(self):", name)),
                }
                if name == "awake" {
                    writer.push_indent();
                    writer.println("self.initPSP()");
                    writer.pop_indent();
                }
            }
            Generator::MethodEnd { body } => {
                let lines = script_lines(body);
                writer.push_indent();
                if lines.iter().all(|line| line.trim().is_empty()) {
                    writer.println("pass");
                } else {
                    writer.print_lines(&lines);
                }
                writer.pop_indent();
                writer.blank_line();
            }
            Generator::Include { path } => {
                writer.println(&format!("__pspincludepath = \"{}\"", escape_string(path)));
                writer.println("self.transaction().application().includeURL(self.transaction(), __pspincludepath)");
            }
            Generator::Insert { source } => match source {
                InsertSource::Static { content } => {
                    write_literal(writer, &escape_literal(content));
                }
                InsertSource::Dynamic { path } => {
                    writer.println(&format!("self.__includeFile(\"{}\")", escape_string(path)));
                }
            },
        }
        Ok(())
    }
}

fn write_literal(writer: &mut SourceWriter, escaped: &str) {
    writer.print_indent();
    writer.print_chars(&format!("{}.write(\"\"\"{}\"\"\")\n", RESPONSE_OBJECT, escaped));
}

/// Normalized lines of a module- or class-level script block.
fn script_lines(code: &str) -> Vec<String> {
    let normalized = normalize_indentation(code);
    split_lines(&remove_quotes(&normalized))
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn generate_script(code: &str, writer: &mut SourceWriter) -> CompileResult<()> {
    let mut code = normalize_indentation(code);

    if writer.uses_braces() {
        let code = remove_quotes(&code);
        let mut rewriter = BraceRewriter::new();
        for line in split_lines(&code) {
            rewriter.rewrite_line(line, writer);
        }
        return rewriter.finish();
    }

    // a single space after `<%` is not indentation
    if code.starts_with(' ') && !code.starts_with("  ") {
        code = code.trim_start().to_string();
    }
    let code = remove_quotes(&code);
    let mut lines = split_lines(&code);

    // a `$` ending the block hands its indentation to the text that follows
    let mut user_indent = "";
    if let Some(last) = lines.pop() {
        match last.strip_suffix('$') {
            Some(stripped) => {
                let source = match lines.last() {
                    Some(previous) if stripped.is_empty() => *previous,
                    _ => stripped,
                };
                user_indent = &source[..source.len() - source.trim_start().len()];
                lines.push(stripped);
            }
            None => lines.push(last),
        }
    }

    writer.set_user_indent("");
    writer.print_lines(&lines);

    if let Some(last) = lines.iter().rev().find(|line| !line.trim().is_empty()) {
        let statement = last.split('#').next().unwrap_or_default().trim_end();
        if statement.ends_with(':') {
            writer.open_block();
        }
    }
    if code.trim() == "pass" && writer.block_count() > 0 {
        writer.close_block();
    }

    writer.set_user_indent(user_indent);
    Ok(())
}

/// Undo the `%\>` escape that lets `%>` appear inside a script.
pub fn remove_quotes(text: &str) -> String {
    text.replace("%\\\\>", "%>")
}

/// Escape text for a `"""` literal.
pub fn escape_literal(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Escape text for a `"` string literal.
pub fn escape_string(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndentStyle;
    use crate::location::Position;

    fn generate(generator: &Generator, writer: &mut SourceWriter) -> String {
        generator.generate(writer).unwrap();
        writer.output().to_string()
    }

    #[test]
    fn test_phases() {
        assert_eq!(Generator::ScriptFile { code: String::new() }.phase(), Phase::File);
        assert_eq!(Generator::ScriptClass { code: String::new() }.phase(), Phase::Class);
        assert_eq!(Generator::MethodEnd { body: String::new() }.phase(), Phase::Declarations);
        assert_eq!(Generator::EndBlock.phase(), Phase::Service);
        assert_eq!(
            Generator::Include { path: "x".to_string() }.phase(),
            Phase::Service
        );
    }

    #[test]
    fn test_char_data_escapes() {
        let mut writer = SourceWriter::default();
        writer.push_indent();
        let generator = Generator::CharData {
            chars: "say \"\"\"hi\"\"\" \\n".to_string(),
        };
        assert_eq!(
            generate(&generator, &mut writer),
            "\tres.write(\"\"\"say \\\"\\\"\\\"hi\\\"\\\"\\\" \\\\n\"\"\")\n"
        );
    }

    #[test]
    fn test_merge() {
        let mut a = Generator::CharData { chars: "a".to_string() };
        assert!(a.merge(&Generator::CharData { chars: "b".to_string() }));
        assert_eq!(a, Generator::CharData { chars: "ab".to_string() });
        assert!(!a.merge(&Generator::EndBlock));
        let mut s = Generator::Script {
            code: "x".to_string(),
            location: None,
        };
        assert!(!s.merge(&Generator::CharData { chars: "b".to_string() }));
    }

    #[test]
    fn test_whitespace_char_data() {
        assert!(Generator::CharData { chars: " \n\t".to_string() }.is_whitespace_char_data());
        assert!(!Generator::CharData { chars: String::new() }.is_whitespace_char_data());
        assert!(!Generator::CharData { chars: " x ".to_string() }.is_whitespace_char_data());
    }

    #[test]
    fn test_expression() {
        let mut writer = SourceWriter::default();
        let generator = Generator::Expression {
            expr: " '%\\\\>' + x ".to_string(),
        };
        assert_eq!(generate(&generator, &mut writer), "res.write(_formatter('%>' + x))\n");
    }

    #[test]
    fn test_script_opens_block() {
        let mut writer = SourceWriter::default();
        let generator = Generator::Script {
            code: " if x: # check ".to_string(),
            location: None,
        };
        assert_eq!(generate(&generator, &mut writer), "if x: # check \n");
        assert_eq!(writer.depth(), 1);
        assert_eq!(writer.block_count(), 1);

        Generator::EndBlock.generate(&mut writer).unwrap();
        assert_eq!(writer.depth(), 0);
        assert_eq!(writer.block_count(), 0);
    }

    #[test]
    fn test_script_multiline() {
        let mut writer = SourceWriter::default();
        writer.push_indent();
        let generator = Generator::Script {
            code: "\n\t\tfor i in range(3):\n\t\t\tres.write(i)\n\t\t".to_string(),
            location: None,
        };
        assert_eq!(
            generate(&generator, &mut writer),
            "\n\tfor i in range(3):\n\t\tres.write(i)\n"
        );
        assert_eq!(writer.block_count(), 0);
    }

    #[test]
    fn test_script_pass_closes_block() {
        let mut writer = SourceWriter::default();
        Generator::Script {
            code: " if a:".to_string(),
            location: None,
        }
            .generate(&mut writer)
            .unwrap();
        Generator::Script {
            code: " pass".to_string(),
            location: None,
        }
            .generate(&mut writer)
            .unwrap();
        assert_eq!(writer.output(), "if a:\n\tpass\n");
        assert_eq!(writer.depth(), 0);

        // without an open block `pass` is just a statement
        Generator::Script {
            code: "pass".to_string(),
            location: None,
        }
            .generate(&mut writer)
            .unwrap();
        assert_eq!(writer.depth(), 0);
    }

    #[test]
    fn test_script_user_indent_marker() {
        let mut writer = SourceWriter::default();
        writer.push_indent();
        let generator = Generator::Script {
            code: "\n  if y:\n    z = 1\n    $".to_string(),
            location: None,
        };
        generator.generate(&mut writer).unwrap();
        Generator::CharData { chars: "t".to_string() }
            .generate(&mut writer)
            .unwrap();
        assert_eq!(
            writer.output(),
            "\n\tif y:\n\t  z = 1\n\t  \n\t  res.write(\"\"\"t\"\"\")\n"
        );
        assert_eq!(writer.block_count(), 0);
    }

    #[test]
    fn test_script_braces() {
        let mut writer = SourceWriter::new(IndentStyle::Braces, 2);
        let generator = Generator::Script {
            code: " for i in l: { ".to_string(),
            location: None,
        };
        assert_eq!(generate(&generator, &mut writer), "for i in l:\n");
        assert_eq!(writer.depth(), 1);

        let bad = Generator::Script {
            code: " x = 'open ".to_string(),
            location: None,
        };
        assert!(bad.generate(&mut writer).is_err());
    }

    #[test]
    fn test_script_error_carries_location() {
        let mut writer = SourceWriter::new(IndentStyle::Braces, 4);
        let location = Location::at(Position::new("page.psp", 3, 20, 22));
        let bad = Generator::Script {
            code: " x = 'open ".to_string(),
            location: Some(location.clone()),
        };
        let err = bad.generate(&mut writer).unwrap_err();
        assert_eq!(err.location, Some(location));
        assert_eq!(err.to_string(), "page.psp:3:3: script block ends inside a ' string");
    }

    #[test]
    fn test_method() {
        let mut writer = SourceWriter::default();
        writer.push_indent();
        let generator = Generator::Method {
            name: "add".to_string(),
            params: Some("a,b".to_string()),
        };
        let body = Generator::MethodEnd {
            body: "\n\t\treturn a+b\n\t\t".to_string(),
        };
        generator.generate(&mut writer).unwrap();
        body.generate(&mut writer).unwrap();
        assert_eq!(writer.output(), "\tdef add(self, a,b):\n\n\t\treturn a+b\n\n");
    }

    #[test]
    fn test_awake_method_calls_init() {
        let mut writer = SourceWriter::default();
        writer.push_indent();
        let generator = Generator::Method {
            name: "awake".to_string(),
            params: Some("trans".to_string()),
        };
        let body = Generator::MethodEnd { body: "  ".to_string() };
        generator.generate(&mut writer).unwrap();
        body.generate(&mut writer).unwrap();
        assert_eq!(
            writer.output(),
            "\tdef awake(self, trans):\n\t\tself.initPSP()\n\t\tpass\n\n"
        );
    }

    #[test]
    fn test_include_and_insert() {
        let mut writer = SourceWriter::default();
        Generator::Include {
            path: "/a \"b\".psp".to_string(),
        }
        .generate(&mut writer)
        .unwrap();
        Generator::Insert {
            source: InsertSource::Dynamic {
                path: "C:\\x.txt".to_string(),
            },
        }
        .generate(&mut writer)
        .unwrap();
        assert_eq!(
            writer.output(),
            "__pspincludepath = \"/a \\\"b\\\".psp\"\n\
             self.transaction().application().includeURL(self.transaction(), __pspincludepath)\n\
             self.__includeFile(\"C:\\\\x.txt\")\n"
        );
    }

    #[test]
    fn test_file_and_class_code() {
        let mut writer = SourceWriter::default();
        Generator::ScriptFile {
            code: "\n\t\t\tdef square(a):\n\t\t\t\treturn a*a\n\t\t".to_string(),
        }
        .generate(&mut writer)
        .unwrap();
        assert_eq!(
            writer.output(),
            "\n# File level user code\n\ndef square(a):\n\treturn a*a\n"
        );
    }
}
