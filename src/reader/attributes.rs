//! Tag attribute lists.
//!
//! Attributes follow the tag name up to the end of the tag, which is one of
//! `>`, `/>`, `%>` or `--%>`. Values are usually quoted with `"` or `'`,
//! where a backslash escapes the next character; bare values run up to the
//! next space, `=`, quote, `/` or tag end.

use crate::diagnostics::{CompileResult, ErrorKind};

use super::Reader;

/// Attributes of a tag, in the order they first appear.
///
/// Setting an attribute that is already present replaces its value and
/// keeps its position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    entries: Vec<(String, String)>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an attribute.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterate over `(name, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attrs = Attributes::new();
        for (name, value) in iter {
            attrs.insert(name, value);
        }
        attrs
    }
}

impl Reader {
    /// Parse attributes up to, but not including, the end of the tag.
    pub fn parse_tag_attributes(&mut self) -> CompileResult<Attributes> {
        let mut attrs = Attributes::new();
        loop {
            self.skip_spaces();
            if self.at_tag_end() {
                return Ok(attrs);
            }
            if self.peek_char().is_none() {
                return Err(self.error(ErrorKind::UnterminatedAttribute));
            }
            self.parse_attribute(&mut attrs)?;
        }
    }

    fn at_tag_end(&self) -> bool {
        self.matches(">") || self.matches("/>") || self.matches("%>") || self.matches("--%>")
    }

    fn parse_attribute(&mut self, attrs: &mut Attributes) -> CompileResult<()> {
        let name = self.parse_token(false)?;
        self.skip_spaces();
        match self.peek_char() {
            Some('=') => {
                self.next_char();
            }
            Some(_) => return Err(self.error(ErrorKind::MissingAttributeValue { name })),
            None => return Err(self.error(ErrorKind::UnterminatedAttribute)),
        }
        self.skip_spaces();
        let value = self.parse_token(true)?;
        attrs.insert(name, value);
        Ok(())
    }

    fn parse_token(&mut self, quoted: bool) -> CompileResult<String> {
        self.skip_spaces();
        let mut token = String::new();

        if let (true, Some(quote @ ('"' | '\''))) = (quoted, self.peek_char()) {
            self.next_char();
            loop {
                match self.peek_char() {
                    None => return Err(self.error(ErrorKind::UnterminatedAttribute)),
                    Some(ch) if ch == quote => {
                        self.next_char();
                        return Ok(token);
                    }
                    Some('\\') => {
                        self.next_char();
                        match self.peek_char() {
                            Some(ch) => {
                                self.next_char();
                                token.push(ch);
                            }
                            None => return Err(self.error(ErrorKind::UnterminatedAttribute)),
                        }
                    }
                    Some(ch) => {
                        self.next_char();
                        token.push(ch);
                    }
                }
            }
        }

        while !self.at_token_delimiter() {
            let Some(ch) = self.next_char() else {
                break;
            };
            if ch == '\\' {
                if let Some(escaped @ ('"' | '\'' | '>' | '%')) = self.peek_char() {
                    self.next_char();
                    token.push(escaped);
                    continue;
                }
            }
            token.push(ch);
        }
        Ok(token)
    }

    fn at_token_delimiter(&self) -> bool {
        match self.peek_char() {
            None => true,
            Some(' ' | '\n' | '\t' | '\r' | '=' | '"' | '\'' | '/' | '>') => true,
            Some('-') => self.matches("->") || self.matches("-->"),
            Some('%') => self.matches("%>"),
            Some(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn parse(text: &str) -> (CompileResult<Attributes>, Reader) {
        let mut reader = Reader::new(false);
        reader.push_source("tag.psp", text, PathBuf::from("."));
        let result = reader.parse_tag_attributes();
        (result, reader)
    }

    #[test]
    fn test_quoted_attributes() {
        let (attrs, reader) = parse(r#" name="writeBody" params='a, b' >rest"#);
        let attrs = attrs.unwrap();
        assert_eq!(attrs.get("name"), Some("writeBody"));
        assert_eq!(attrs.get("params"), Some("a, b"));
        assert!(reader.matches(">rest"));
    }

    #[test]
    fn test_terminators() {
        for (text, end) in [
            (r#"a="1"%>"#, "%>"),
            (r#"a="1" />"#, "/>"),
            (r#"a="1"--%>"#, "--%>"),
            (r#"a="1">"#, ">"),
        ] {
            let (attrs, reader) = parse(text);
            assert_eq!(attrs.unwrap().get("a"), Some("1"), "{}", text);
            assert!(reader.matches(end), "{}", text);
        }
    }

    #[test]
    fn test_bare_values() {
        let (attrs, reader) = parse("file=x.txt static=true/>");
        let attrs = attrs.unwrap();
        assert_eq!(attrs.get("file"), Some("x.txt"));
        assert_eq!(attrs.get("static"), Some("true"));
        assert!(reader.matches("/>"));
    }

    #[test]
    fn test_escapes() {
        let (attrs, _) = parse(r#"v="say \"hi\" \\ done" w=a\>b >"#);
        let attrs = attrs.unwrap();
        assert_eq!(attrs.get("v"), Some(r#"say "hi" \ done"#));
        assert_eq!(attrs.get("w"), Some("a>b"));
    }

    #[test]
    fn test_duplicate_keeps_first_position() {
        let (attrs, _) = parse(r#"a="1" b="2" a="3">"#);
        let attrs = attrs.unwrap();
        let pairs: Vec<_> = attrs.iter().collect();
        assert_eq!(pairs, vec![("a", "3"), ("b", "2")]);
        assert_eq!(attrs.len(), 2);
    }

    #[test]
    fn test_unterminated() {
        let (attrs, _) = parse(r#"a="1" b="2"#);
        assert_eq!(attrs.unwrap_err().kind, ErrorKind::UnterminatedAttribute);

        let (attrs, _) = parse(r#"a="1" "#);
        assert_eq!(attrs.unwrap_err().kind, ErrorKind::UnterminatedAttribute);
    }

    #[test]
    fn test_missing_value() {
        let (attrs, _) = parse(r#"file "x">"#);
        assert_eq!(
            attrs.unwrap_err().kind,
            ErrorKind::MissingAttributeValue {
                name: "file".to_string()
            }
        );
    }

    #[test]
    fn test_empty_list() {
        let (attrs, reader) = parse("   >");
        assert!(attrs.unwrap().is_empty());
        assert!(reader.matches(">"));
    }

    #[test]
    fn test_from_iter() {
        let attrs: Attributes = [("name", "awake"), ("params", "")].into_iter().collect();
        assert!(attrs.contains("params"));
        assert_eq!(attrs.get("name"), Some("awake"));
    }
}
