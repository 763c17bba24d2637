//! Template parser.
//!
//! The parser looks at the input one position at a time and tries a fixed
//! list of matchers against it. The first matcher that recognizes its
//! opening delimiter consumes the whole construct and reports it to the
//! [`ParseEventHandler`]. Text no matcher wants is collected and reported
//! as [`ConstructKind::CharData`] before the next construct, and whenever
//! the reader moves to another file.
//!
//! Matcher order matters: `<%--` and `<%=` must be tried before the plain
//! `<%` of a script, and the end-block form `<% end %>` before a generic
//! script.

use crate::diagnostics::{CompileError, CompileResult, ErrorKind};
use crate::reader::{Attributes, Mark, Reader};

const OPEN_COMMENT: &str = "<%--";
const CLOSE_COMMENT: &str = "--%>";
const OPEN_EXPRESSION: &str = "<%=";
const OPEN_DIRECTIVE: &str = "<%@";
const OPEN_SCRIPT: &str = "<%";
const CLOSE_SCRIPT: &str = "%>";
const CLOSE_END_BLOCK_MARKED: &str = "$%>";
const END_BLOCK_KEYWORD: &str = "end";
const OPEN_SCRIPT_FILE: &str = "<psp:file>";
const CLOSE_SCRIPT_FILE: &str = "</psp:file>";
const OPEN_SCRIPT_CLASS: &str = "<psp:class>";
const CLOSE_SCRIPT_CLASS: &str = "</psp:class>";
const OPEN_METHOD: &str = "<psp:method";
const CLOSE_METHOD: &str = "</psp:method>";
const OPEN_INCLUDE: &str = "<psp:include";
const OPEN_INSERT: &str = "<psp:insert";

/// Directives a `<%@ ... %>` tag may name.
pub const DIRECTIVES: [&str; 2] = ["page", "include"];

/// What a construct is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstructKind {
    Comment,
    Expression,
    Directive { name: String },
    /// `<% end %>`; `trailing_marker` is set for the tolerated `<% end $%>`.
    EndBlock { trailing_marker: bool },
    Script,
    ScriptFile,
    ScriptClass,
    Method,
    MethodEnd,
    Include,
    Insert,
    CharData,
}

/// A recognized construct.
#[derive(Debug, Clone)]
pub struct Construct {
    pub kind: ConstructKind,
    /// Start of the construct, or of its body for constructs with one.
    pub start: Mark,
    /// End of the construct, or of its body.
    pub stop: Mark,
    /// Body text: the script, expression, method body or literal text.
    pub text: String,
    pub attrs: Attributes,
}

/// Receiver of parse events.
pub trait ParseEventHandler {
    /// Handle one construct. The reader is positioned after it.
    fn handle(&mut self, reader: &mut Reader, construct: Construct) -> CompileResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Matcher {
    Comment,
    Expression,
    Directive,
    EndBlock,
    Script,
    ScriptFile,
    ScriptClass,
    Method,
    Include,
    Insert,
}

const MATCHERS: [Matcher; 10] = [
    Matcher::Comment,
    Matcher::Expression,
    Matcher::Directive,
    Matcher::EndBlock,
    Matcher::Script,
    Matcher::ScriptFile,
    Matcher::ScriptClass,
    Matcher::Method,
    Matcher::Include,
    Matcher::Insert,
];

/// Drives a [`Reader`] through a template.
#[derive(Debug)]
pub struct Parser {
    reader: Reader,
    pending: String,
    pending_start: Mark,
    pending_stop: Mark,
    current_file: Option<usize>,
}

impl Parser {
    pub fn new(reader: Reader) -> Self {
        let current_file = reader.current_file_id();
        let mark = reader.mark();
        Self {
            reader,
            pending: String::new(),
            pending_start: mark.clone(),
            pending_stop: mark,
            current_file,
        }
    }

    /// Parse all input, reporting constructs to `handler`.
    pub fn parse<H: ParseEventHandler>(&mut self, handler: &mut H) -> CompileResult<()> {
        while self.reader.has_more_input() {
            let file = self.reader.current_file_id();
            if file != self.current_file {
                self.flush_char_data(handler)?;
                self.current_file = file;
            }

            let mut accepted = false;
            for matcher in MATCHERS {
                if self.try_match(matcher, handler)? {
                    accepted = true;
                    break;
                }
            }
            if !accepted {
                if self.pending.is_empty() {
                    self.pending_start = self.reader.mark();
                }
                let text = self.reader.next_content();
                self.pending.push_str(&text);
                self.pending_stop = self.reader.mark();
            }
        }
        self.flush_char_data(handler)
    }

    fn flush_char_data<H: ParseEventHandler>(&mut self, handler: &mut H) -> CompileResult<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let construct = Construct {
            kind: ConstructKind::CharData,
            start: self.pending_start.clone(),
            stop: self.pending_stop.clone(),
            text: std::mem::take(&mut self.pending),
            attrs: Attributes::new(),
        };
        self.dispatch(handler, construct)
    }

    /// Flush pending text and report `construct`.
    fn emit<H: ParseEventHandler>(&mut self, handler: &mut H, construct: Construct) -> CompileResult<()> {
        self.flush_char_data(handler)?;
        self.dispatch(handler, construct)
    }

    fn dispatch<H: ParseEventHandler>(&mut self, handler: &mut H, construct: Construct) -> CompileResult<()> {
        let start = construct.start.clone();
        if log::log_enabled!(log::Level::Debug) {
            log::debug!("{:?} at {}", construct.kind, self.reader.location(&start));
        }
        handler
            .handle(&mut self.reader, construct)
            .map_err(|err| err.or_at(|| self.reader.location(&start)))
    }

    fn construct(&self, kind: ConstructKind, start: Mark, stop: Mark, attrs: Attributes) -> Construct {
        let text = self.reader.get_chars(&start, &stop);
        Construct {
            kind,
            start,
            stop,
            text,
            attrs,
        }
    }

    fn try_match<H: ParseEventHandler>(&mut self, matcher: Matcher, handler: &mut H) -> CompileResult<bool> {
        match matcher {
            Matcher::Comment => self.check_comment(handler),
            Matcher::Expression => self.check_expression(handler),
            Matcher::Directive => self.check_directive(handler),
            Matcher::EndBlock => self.check_end_block(handler),
            Matcher::Script => self.check_script(handler),
            Matcher::ScriptFile => self.check_body(
                handler,
                OPEN_SCRIPT_FILE,
                CLOSE_SCRIPT_FILE,
                ConstructKind::ScriptFile,
            ),
            Matcher::ScriptClass => self.check_body(
                handler,
                OPEN_SCRIPT_CLASS,
                CLOSE_SCRIPT_CLASS,
                ConstructKind::ScriptClass,
            ),
            Matcher::Method => self.check_method(handler),
            Matcher::Include => self.check_tag(handler, OPEN_INCLUDE, ConstructKind::Include),
            Matcher::Insert => self.check_tag(handler, OPEN_INSERT, ConstructKind::Insert),
        }
    }

    fn check_comment<H: ParseEventHandler>(&mut self, handler: &mut H) -> CompileResult<bool> {
        if !self.reader.matches(OPEN_COMMENT) {
            return Ok(false);
        }
        self.reader.advance(OPEN_COMMENT.len())?;
        let start = self.reader.mark();
        let stop = self.reader.skip_until(CLOSE_COMMENT)?;
        let construct = self.construct(ConstructKind::Comment, start, stop, Attributes::new());
        self.emit(handler, construct)?;
        Ok(true)
    }

    fn check_expression<H: ParseEventHandler>(&mut self, handler: &mut H) -> CompileResult<bool> {
        if !self.reader.matches(OPEN_EXPRESSION) {
            return Ok(false);
        }
        self.reader.advance(OPEN_EXPRESSION.len())?;
        self.reader.skip_spaces();
        let start = self.reader.mark();
        let stop = self.reader.skip_until(CLOSE_SCRIPT)?;
        let construct = self.construct(ConstructKind::Expression, start, stop, Attributes::new());
        self.emit(handler, construct)?;
        Ok(true)
    }

    fn check_directive<H: ParseEventHandler>(&mut self, handler: &mut H) -> CompileResult<bool> {
        if !self.reader.matches(OPEN_DIRECTIVE) {
            return Ok(false);
        }
        let start = self.reader.mark();
        self.reader.advance(OPEN_DIRECTIVE.len())?;
        self.reader.skip_spaces();

        let mut name = String::new();
        while let Some(ch) = self.reader.peek_char().filter(|ch| ch.is_ascii_alphanumeric()) {
            name.push(ch);
            self.reader.next_char();
        }
        if !DIRECTIVES.contains(&name.as_str()) {
            return Err(CompileError::at(
                ErrorKind::UnknownDirective { name },
                self.reader.location(&start),
            ));
        }

        let attrs = self.reader.parse_tag_attributes()?;
        self.reader.skip_spaces();
        self.expect(CLOSE_SCRIPT, &start)?;
        let stop = self.reader.mark();
        let construct = self.construct(ConstructKind::Directive { name }, start, stop, attrs);
        self.emit(handler, construct)?;
        Ok(true)
    }

    fn check_end_block<H: ParseEventHandler>(&mut self, handler: &mut H) -> CompileResult<bool> {
        if !self.reader.matches(OPEN_SCRIPT) {
            return Ok(false);
        }
        let start = self.reader.mark();
        self.reader.advance(OPEN_SCRIPT.len())?;
        self.reader.skip_spaces();
        if self.reader.matches(END_BLOCK_KEYWORD) {
            self.reader.advance(END_BLOCK_KEYWORD.len())?;
            self.reader.skip_spaces();
            let trailing_marker = if self.reader.matches(CLOSE_SCRIPT) {
                Some(false)
            } else if self.reader.matches(CLOSE_END_BLOCK_MARKED) {
                Some(true)
            } else {
                None
            };
            if let Some(trailing_marker) = trailing_marker {
                let close = if trailing_marker {
                    CLOSE_END_BLOCK_MARKED
                } else {
                    CLOSE_SCRIPT
                };
                self.reader.advance(close.len())?;
                let stop = self.reader.mark();
                let construct = Construct {
                    kind: ConstructKind::EndBlock { trailing_marker },
                    start,
                    stop,
                    text: String::new(),
                    attrs: Attributes::new(),
                };
                self.emit(handler, construct)?;
                return Ok(true);
            }
        }
        self.reader.reset(start);
        Ok(false)
    }

    fn check_script<H: ParseEventHandler>(&mut self, handler: &mut H) -> CompileResult<bool> {
        if !self.reader.matches(OPEN_SCRIPT) {
            return Ok(false);
        }
        self.reader.advance(OPEN_SCRIPT.len())?;
        // leading space is significant, the generator decides what to do with it
        let start = self.reader.mark();
        let stop = self.reader.skip_until(CLOSE_SCRIPT)?;
        let construct = self.construct(ConstructKind::Script, start, stop, Attributes::new());
        self.emit(handler, construct)?;
        Ok(true)
    }

    /// `<psp:file>` and `<psp:class>`: a body up to a closing tag.
    fn check_body<H: ParseEventHandler>(
        &mut self,
        handler: &mut H,
        open: &str,
        close: &str,
        kind: ConstructKind,
    ) -> CompileResult<bool> {
        if !self.reader.matches(open) {
            return Ok(false);
        }
        self.reader.advance(open.len())?;
        let start = self.reader.mark();
        let stop = self.reader.skip_until(close)?;
        let construct = self.construct(kind, start, stop, Attributes::new());
        self.emit(handler, construct)?;
        Ok(true)
    }

    fn check_method<H: ParseEventHandler>(&mut self, handler: &mut H) -> CompileResult<bool> {
        if !self.reader.matches(OPEN_METHOD) {
            return Ok(false);
        }
        let start = self.reader.mark();
        self.reader.advance(OPEN_METHOD.len())?;
        let attrs = self.reader.parse_tag_attributes()?;
        self.reader.skip_spaces();
        self.expect(">", &start)?;
        let header_end = self.reader.mark();
        let header = self.construct(ConstructKind::Method, start, header_end.clone(), attrs.clone());
        self.emit(handler, header)?;

        let stop = self.reader.skip_until(CLOSE_METHOD)?;
        let body = self.construct(ConstructKind::MethodEnd, header_end, stop, attrs);
        self.dispatch(handler, body)?;
        Ok(true)
    }

    /// `<psp:include>` and `<psp:insert>`: attributes only, closed by `>`
    /// or `/>`.
    fn check_tag<H: ParseEventHandler>(
        &mut self,
        handler: &mut H,
        open: &str,
        kind: ConstructKind,
    ) -> CompileResult<bool> {
        if !self.reader.matches(open) {
            return Ok(false);
        }
        let start = self.reader.mark();
        self.reader.advance(open.len())?;
        self.reader.skip_spaces();
        let attrs = self.reader.parse_tag_attributes()?;
        self.reader.skip_spaces();
        if self.reader.matches("/>") {
            self.reader.advance(2)?;
        } else {
            self.expect(">", &start)?;
        }
        let stop = self.reader.mark();
        let construct = Construct {
            kind,
            start,
            stop,
            text: String::new(),
            attrs,
        };
        self.emit(handler, construct)?;
        Ok(true)
    }

    /// Consume `literal` or fail with a malformed construct started at
    /// `start`.
    fn expect(&mut self, literal: &str, start: &Mark) -> CompileResult<()> {
        if !self.reader.matches(literal) {
            return Err(CompileError::at(
                ErrorKind::MalformedConstruct {
                    expected: literal.to_string(),
                },
                self.reader.location(start),
            ));
        }
        self.reader.advance(literal.len())
    }
}
