//! Output writer for the generated module.
//!
//! [`CodeWriter`] is the narrow interface generators and the brace rewriter
//! write through. [`SourceWriter`] implements it over an in-memory buffer and
//! adds the per-page emission state that script generators share: the
//! number of blocks opened by script tags, the indentation floor of the page
//! body, and the user indent handed over by a trailing `$` marker.

use crate::config::IndentStyle;

/// Writer abstraction consumed by generators.
pub trait CodeWriter {
    /// Write `text` verbatim.
    fn print_chars(&mut self, text: &str);
    /// Write the indentation of the current level.
    fn print_indent(&mut self);
    /// Write `line` at the current indentation, followed by a newline.
    fn println(&mut self, line: &str);
    /// Open one indentation level.
    fn push_indent(&mut self);
    /// Close one indentation level.
    fn pop_indent(&mut self);
    /// Change the indentation policy.
    fn set_indent_style(&mut self, style: IndentStyle);
    /// Change the number of spaces per level used by the space styles.
    fn set_indent_spaces(&mut self, spaces: usize);
}

/// In-memory [`CodeWriter`] with tab/space indentation.
#[derive(Debug)]
pub struct SourceWriter {
    output: String,
    depth: usize,
    floor: usize,
    style: IndentStyle,
    spaces: usize,
    unit: String,
    user_indent: String,
    block_count: usize,
}

impl Default for SourceWriter {
    fn default() -> Self {
        Self::new(IndentStyle::Tabs, 4)
    }
}

impl SourceWriter {
    /// Create a writer with the given indentation policy.
    pub fn new(style: IndentStyle, spaces: usize) -> Self {
        let mut writer = Self {
            output: String::new(),
            depth: 0,
            floor: 0,
            style,
            spaces,
            unit: String::new(),
            user_indent: String::new(),
            block_count: 0,
        };
        writer.refresh_unit();
        writer
    }

    fn refresh_unit(&mut self) {
        self.unit = match self.style {
            IndentStyle::Tabs => "\t".to_string(),
            IndentStyle::Spaces | IndentStyle::Braces => " ".repeat(self.spaces),
        };
    }

    /// Get the generated source.
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Consume the writer and return the generated source.
    pub fn into_output(self) -> String {
        self.output
    }

    /// Current indentation depth.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Whether script blocks are written in brace syntax.
    pub fn uses_braces(&self) -> bool {
        self.style == IndentStyle::Braces
    }

    /// Forbid `pop_indent` from going below the current depth.
    pub fn set_floor_here(&mut self) {
        self.floor = self.depth;
    }

    /// Allow `pop_indent` to reach depth zero again.
    pub fn clear_floor(&mut self) {
        self.floor = 0;
    }

    /// Set extra indentation appended to the indent of every indented line.
    pub fn set_user_indent(&mut self, indent: impl Into<String>) {
        self.user_indent = indent.into();
    }

    /// Number of blocks currently opened by script tags.
    pub fn block_count(&self) -> usize {
        self.block_count
    }

    /// Open a block started by a script tag.
    pub fn open_block(&mut self) {
        self.push_indent();
        self.block_count += 1;
    }

    /// Close a block started by a script tag.
    pub fn close_block(&mut self) {
        self.pop_indent();
        self.block_count = self.block_count.saturating_sub(1);
    }

    /// Write an empty line.
    pub fn blank_line(&mut self) {
        self.output.push('\n');
    }

    /// Write each line at the current indentation.
    pub fn print_lines<S: AsRef<str>>(&mut self, lines: &[S]) {
        for line in lines {
            self.println(line.as_ref());
        }
    }

    fn indentation(&self) -> String {
        if self.depth == 0 {
            String::new()
        } else {
            format!("{}{}", self.unit.repeat(self.depth), self.user_indent)
        }
    }
}

impl CodeWriter for SourceWriter {
    fn print_chars(&mut self, text: &str) {
        self.output.push_str(text);
    }

    fn print_indent(&mut self) {
        let indent = self.indentation();
        self.output.push_str(&indent);
    }

    fn println(&mut self, line: &str) {
        if !line.is_empty() {
            self.print_indent();
            self.output.push_str(line);
        }
        self.output.push('\n');
    }

    fn push_indent(&mut self) {
        self.depth += 1;
    }

    fn pop_indent(&mut self) {
        if self.depth > self.floor {
            self.depth -= 1;
        }
    }

    fn set_indent_style(&mut self, style: IndentStyle) {
        self.style = style;
        self.refresh_unit();
    }

    fn set_indent_spaces(&mut self, spaces: usize) {
        self.spaces = spaces;
        self.refresh_unit();
    }
}
