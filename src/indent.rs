//! Indentation normalization for embedded script blocks.
//!
//! Script written inside a template is usually indented to line up with the
//! surrounding markup. Before it can be re-emitted at an arbitrary level of
//! the generated module the block is moved left by its common indentation.
//!
//! The first line of a block trails the opening delimiter (`<% x = 1`) and
//! is never re-indented. When it carries code, the lines below it are taken
//! to sit one column further in than the code they continue, so one column
//! less is stripped from them.

/// Split `text` into lines on `\n`, `\r\n` or `\r`.
///
/// Line terminators are not included and a terminator at the very end does
/// not produce a trailing empty line.
pub fn split_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        match line_break(rest) {
            Some((at, len)) => {
                lines.push(&rest[..at]);
                rest = &rest[at + len..];
            }
            None => {
                lines.push(rest);
                break;
            }
        }
    }
    lines
}

/// Position and length of the first line break in `text`.
fn line_break(text: &str) -> Option<(usize, usize)> {
    let at = text.find(['\n', '\r'])?;
    let len = if text[at..].starts_with("\r\n") { 2 } else { 1 };
    Some((at, len))
}

/// Split `text` on line breaks, keeping an empty final segment when the
/// text ends with a break.
fn split_segments(text: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut rest = text;
    while let Some((at, len)) = line_break(rest) {
        segments.push(&rest[..at]);
        rest = &rest[at + len..];
    }
    segments.push(rest);
    segments
}

/// Number of leading whitespace characters of `line`.
fn leading_whitespace(line: &str) -> usize {
    line.chars().take_while(|c| c.is_whitespace()).count()
}

/// Remove up to `width` leading whitespace characters from `line`.
fn strip_columns(line: &str, width: usize) -> String {
    let split = line
        .char_indices()
        .nth(width)
        .map_or(line.len(), |(idx, _)| idx);
    let (head, tail) = line.split_at(split);
    format!("{}{}", head.trim_start(), tail)
}

fn is_comment(line: &str) -> bool {
    line.trim_start().starts_with('#')
}

/// Move a script block to the left by its common indentation.
///
/// The line ending found after the first line is used to join the result;
/// a block without any line break is returned unchanged. Lines after the
/// first are right-trimmed, so whitespace-only lines come back empty, but
/// the number of lines never changes.
pub fn normalize_indentation(source: &str) -> String {
    let Some((at, len)) = line_break(source) else {
        return source.to_string();
    };
    let first = &source[..at];
    let ending = &source[at..at + len];

    let lines: Vec<&str> = split_segments(&source[at + len..])
        .into_iter()
        .map(str::trim_end)
        .collect();

    let mut width = lines
        .iter()
        .filter(|line| !line.is_empty() && !is_comment(line))
        .map(|line| leading_whitespace(line))
        .min();

    let first_has_code = !first.trim().is_empty() && !is_comment(first);
    if first_has_code {
        width = width.map(|w| w.saturating_sub(1));
    }

    let mut out = String::with_capacity(source.len());
    out.push_str(first);
    for line in lines {
        out.push_str(ending);
        match width {
            Some(w) if w > 0 => out.push_str(&strip_columns(line, w)),
            _ => out.push_str(line),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_lines() {
        assert_eq!(split_lines("one\rtwo\rthree"), vec!["one", "two", "three"]);
        assert_eq!(split_lines("one\ntwo\nthree"), vec!["one", "two", "three"]);
        assert_eq!(split_lines("one\r\ntwo\r\n"), vec!["one", "two"]);
        assert_eq!(split_lines("\nx\n\n"), vec!["", "x", ""]);
        assert!(split_lines("").is_empty());
    }

    #[test]
    fn test_normalize_moves_block_left() {
        let before = "\n            def add(a,b):\n              return a+b";
        let expected = "\ndef add(a,b):\n  return a+b";
        assert_eq!(normalize_indentation(before), expected);
    }

    #[test]
    fn test_normalize_ignores_comments() {
        let before = "\n# Will comments throw off the indentation?\n            def add(a,b):\n              return a+b";
        let expected = "\n# Will comments throw off the indentation?\ndef add(a,b):\n  return a+b";
        assert_eq!(normalize_indentation(before), expected);
    }

    #[test]
    fn test_normalize_blank_lines() {
        let before = "\n# Will blank lines cause a problem?\n\n            def add(a,b):\n\n              return a+b";
        let expected = "\n# Will blank lines cause a problem?\n\ndef add(a,b):\n\n  return a+b";
        assert_eq!(normalize_indentation(before), expected);
    }

    #[test]
    fn test_normalize_keeps_line_endings() {
        let before = "#line endings\r  def add(a,b):\r  \r  return a+b";
        let expected = "#line endings\rdef add(a,b):\r\rreturn a+b";
        assert_eq!(normalize_indentation(before), expected);

        let crlf = "\r\n    x = 1\r\n    y = 2";
        assert_eq!(normalize_indentation(crlf), "\r\nx = 1\r\ny = 2");
    }

    #[test]
    fn test_normalize_code_on_first_line() {
        // `<% if x:` followed by a body indented past the opening delimiter
        let before = " if x:\n      y = 1\n      z = 2";
        assert_eq!(normalize_indentation(before), " if x:\n y = 1\n z = 2");
    }

    #[test]
    fn test_normalize_whitespace_first_line_is_not_code() {
        let before = "   \n    a = 1\n      b = 2";
        assert_eq!(normalize_indentation(before), "   \na = 1\n  b = 2");
    }

    #[test]
    fn test_normalize_single_line_unchanged() {
        assert_eq!(normalize_indentation(" res.write('x') "), " res.write('x') ");
        assert_eq!(normalize_indentation(""), "");
    }

    #[test]
    fn test_normalize_keeps_trailing_line() {
        let before = "\n\t\tfor i in range(3):\n\t\t\tres.write(i)\n\t\t";
        assert_eq!(
            normalize_indentation(before),
            "\nfor i in range(3):\n\tres.write(i)\n"
        );
        assert_eq!(normalize_indentation("x = 1\n"), "x = 1\n");
    }

    #[test]
    fn test_normalize_short_comment_lines() {
        // comments do not count towards the width but still lose what they can
        let before = "\n        a = 1\n  # note\n        b = 2";
        assert_eq!(normalize_indentation(before), "\na = 1\n# note\nb = 2");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let samples = [
            "\n            def add(a,b):\n              return a+b",
            " if x:\n      y = 1\n        z = 2\n",
            "#c\r    a\r      b\r",
            "\n\t\tfor i in range(3):\n\t\t\tres.write(i)\n\t\t",
            "   \n    a = 1\n      b = 2",
            "x = 1\n",
        ];
        for sample in samples {
            let once = normalize_indentation(sample);
            let twice = normalize_indentation(&once);
            assert_eq!(once, twice, "not idempotent for {:?}", sample);
        }
    }

    #[test]
    fn test_normalize_preserves_relative_nesting() {
        let before = "\n    if a:\n        if b:\n            c()\n    d()";
        assert_eq!(
            normalize_indentation(before),
            "\nif a:\n    if b:\n        c()\nd()"
        );
    }
}
