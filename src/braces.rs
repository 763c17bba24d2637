//! Rewriting of brace-delimited script into indentation form.
//!
//! Pages that set `indentType="braces"` write blocks as `:{ ... }` instead
//! of relying on indentation:
//!
//! ```text
//! for x in range(10) :{
//!     if x % 2 :{ res.write(x) } else :{ res.write('-') }
//! }
//! ```
//!
//! The rewriter is fed one line at a time and keeps its quote and brace
//! state between lines, so a string or a mapping literal may span lines.
//! Braces that belong to mapping or set literals are copied through; only a
//! `{` directly after a `:` at nesting level zero opens a block.

use std::sync::LazyLock;

use regex::Regex;

use crate::diagnostics::{CompileError, CompileResult, ErrorKind};
use crate::writer::CodeWriter;

/// A `:` followed by `{`, and the rest of the line if there is any.
static COLON_BRACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^:\s*\{\s*(\S.*)?$").expect("colon-brace pattern is valid"));

const SPECIAL: [char; 6] = ['"', '\'', '{', '}', ':', '#'];

/// Line-at-a-time brace rewriter.
#[derive(Debug, Default)]
pub struct BraceRewriter {
    /// The marker that closes the open string literal, if any.
    quote: Option<&'static str>,
    /// The previous character inside the string was a backslash.
    escape: bool,
    /// Nesting of literal `{}` pairs.
    dict_level: usize,
}

impl BraceRewriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a string literal is still open.
    pub fn in_quote(&self) -> bool {
        self.quote.is_some()
    }

    /// Nesting depth of literal braces.
    pub fn dict_level(&self) -> usize {
        self.dict_level
    }

    /// Rewrite one line (without its terminator) into `writer`.
    pub fn rewrite_line<W: CodeWriter>(&mut self, line: &str, writer: &mut W) {
        // a backslash at the end of a line escapes the line break only
        self.escape = false;

        let mut rest = line;
        let mut started = false;
        if self.quote.is_some() && !rest.is_empty() {
            let after = self.skip_quote(rest, writer);
            started = after.len() != rest.len();
            rest = after;
        }
        if !started {
            rest = rest.trim_start();
        }

        while !rest.is_empty() {
            if self.quote.is_some() {
                rest = self.skip_quote(rest, writer);
                continue;
            }

            let special = rest.find(SPECIAL).unwrap_or(rest.len());
            if special > 0 {
                begin_line(writer, &mut started);
                writer.print_chars(&rest[..special]);
                rest = &rest[special..];
                continue;
            }

            match rest.as_bytes()[0] {
                quote @ (b'\'' | b'"') => {
                    let marker = match (quote, rest.starts_with("'''"), rest.starts_with("\"\"\"")) {
                        (b'\'', true, _) => "'''",
                        (b'\'', false, _) => "'",
                        (_, _, true) => "\"\"\"",
                        _ => "\"",
                    };
                    begin_line(writer, &mut started);
                    writer.print_chars(marker);
                    self.quote = Some(marker);
                    rest = &rest[marker.len()..];
                }
                b'{' => {
                    begin_line(writer, &mut started);
                    writer.print_chars("{");
                    self.dict_level += 1;
                    rest = &rest[1..];
                }
                b'}' => {
                    if self.dict_level > 0 {
                        begin_line(writer, &mut started);
                        writer.print_chars("}");
                        self.dict_level -= 1;
                        rest = &rest[1..];
                    } else {
                        writer.pop_indent();
                        rest = rest[1..].trim_start();
                        if !rest.is_empty() && started {
                            writer.print_chars("\n");
                            started = false;
                        }
                    }
                }
                b':' => {
                    begin_line(writer, &mut started);
                    writer.print_chars(":");
                    let opener = if self.dict_level == 0 {
                        COLON_BRACE.captures(rest)
                    } else {
                        None
                    };
                    match opener {
                        Some(caps) => {
                            writer.push_indent();
                            match caps.get(1) {
                                Some(tail) if tail.as_str().starts_with('#') => {
                                    writer.print_chars(" ");
                                    writer.print_chars(tail.as_str());
                                    rest = "";
                                }
                                Some(tail) => {
                                    writer.print_chars("\n");
                                    started = false;
                                    rest = tail.as_str();
                                }
                                None => rest = "",
                            }
                        }
                        None => rest = &rest[1..],
                    }
                }
                _ => {
                    // comment
                    begin_line(writer, &mut started);
                    writer.print_chars(rest);
                    rest = "";
                }
            }
        }
        writer.print_chars("\n");
    }

    /// Check that the block did not end inside a string literal.
    pub fn finish(&self) -> CompileResult<()> {
        match self.quote {
            Some(quote) => Err(CompileError::new(ErrorKind::UnterminatedQuote {
                quote: quote.to_string(),
            })),
            None => Ok(()),
        }
    }

    /// Copy string content up to and including the closing marker.
    fn skip_quote<'a, W: CodeWriter>(&mut self, text: &'a str, writer: &mut W) -> &'a str {
        let Some(marker) = self.quote else {
            return text;
        };
        for (idx, ch) in text.char_indices() {
            if self.escape {
                self.escape = false;
                continue;
            }
            if ch == '\\' {
                self.escape = true;
                continue;
            }
            if text[idx..].starts_with(marker) {
                let end = idx + marker.len();
                writer.print_chars(&text[..end]);
                self.quote = None;
                return &text[end..];
            }
        }
        writer.print_chars(text);
        ""
    }
}

fn begin_line<W: CodeWriter>(writer: &mut W, started: &mut bool) {
    if !*started {
        writer.print_indent();
        *started = true;
    }
}
