use crate::error::{Parse, Result};

/// A single maximal rule split out of a stylesheet: either a block rule
/// (`prelude { body }`, nested blocks captured verbatim) or a statement
/// at-rule terminated by `;`.
///
/// Rules are read-only after parse; `text` is the verbatim source slice,
/// leading comments included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleRule {
    text: String,
    selector_start: usize,
    prelude_end: usize,
    at_keyword: Option<String>,
}

impl StyleRule {
    /// Verbatim source text of the whole rule.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The selector/prelude text, trimmed, without leading comments.
    pub fn prelude(&self) -> &str {
        self.text[self.selector_start..self.prelude_end].trim()
    }

    /// Everything from the opening brace on; `;` for statement at-rules.
    pub fn body(&self) -> &str {
        &self.text[self.prelude_end..]
    }

    /// The at-rule keyword (`font-face` for `@font-face { .. }`), if any.
    pub fn at_keyword(&self) -> Option<&str> {
        self.at_keyword.as_deref()
    }

    /// The comma-separated members of the selector list, trimmed. Commas
    /// inside strings, brackets, or parentheses do not separate members.
    pub fn selectors(&self) -> impl Iterator<Item = &str> {
        let prelude = self.prelude();
        let bytes = prelude.as_bytes();

        let mut members = vec![];
        let (mut depth, mut start, mut i) = (0i32, 0, 0);
        while i < bytes.len() {
            match bytes[i] {
                b'[' | b'(' => depth += 1,
                b']' | b')' => depth -= 1,
                quote @ (b'"' | b'\'') => {
                    i += 1;
                    while i < bytes.len() && bytes[i] != quote {
                        if bytes[i] == b'\\' { i += 1; }
                        i += 1;
                    }
                }
                b',' if depth == 0 => {
                    members.push(prelude[start..i].trim());
                    start = i + 1;
                }
                _ => { }
            }

            i += 1;
        }

        members.push(prelude[start.min(bytes.len())..].trim());
        members.into_iter()
    }
}

/// An ordered sequence of rules split from one stylesheet.
#[derive(Debug)]
pub struct Stylesheet {
    rules: Vec<StyleRule>,
}

impl Stylesheet {
    /// Splits `source` into maximal top level rules.
    ///
    /// Unbalanced braces, unterminated strings or comments, and trailing
    /// non-comment garbage all fail with a parse error carrying line and
    /// column context. No input is ever silently truncated.
    pub fn parse(source: &str) -> Result<Self> {
        let mut splitter = Splitter { src: source, bytes: source.as_bytes(), pos: 0 };
        let mut rules = vec![];
        while let Some(rule) = splitter.next_rule()? {
            rules.push(rule);
        }

        Ok(Stylesheet { rules })
    }

    pub fn rules(&self) -> &[StyleRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

struct Splitter<'s> {
    src: &'s str,
    bytes: &'s [u8],
    pos: usize,
}

impl Splitter<'_> {
    fn next_rule(&mut self) -> Result<Option<StyleRule>> {
        self.skip_whitespace();
        let start = self.pos;

        // Leading comments attach to the rule that follows them; trailing
        // comments with no rule behind them are dropped.
        while self.at_comment() {
            self.skip_comment()?;
            self.skip_whitespace();
        }

        if self.pos == self.bytes.len() {
            return Ok(None);
        }

        let selector_start = self.pos;
        loop {
            let Some(&b) = self.bytes.get(self.pos) else {
                return self.fail_at(selector_start, "unexpected end of stylesheet");
            };

            match b {
                b'{' => {
                    let prelude_end = self.pos - start;
                    self.skip_block()?;

                    let text = self.src[start..self.pos].to_string();
                    let selector_start = selector_start - start;
                    return Ok(Some(StyleRule {
                        at_keyword: at_keyword(&text[selector_start..prelude_end]),
                        selector_start,
                        prelude_end,
                        text,
                    }));
                }
                b'}' => return self.fail_at(self.pos, "unbalanced closing brace"),
                b';' => {
                    // Only statement at-rules end at the top level with `;`.
                    let prelude = self.src[selector_start..self.pos].trim_start();
                    if !prelude.starts_with('@') {
                        return self.fail_at(self.pos, "unexpected `;` outside an at-rule");
                    }

                    let prelude_end = self.pos - start;
                    self.pos += 1;

                    let text = self.src[start..self.pos].to_string();
                    let selector_start = selector_start - start;
                    return Ok(Some(StyleRule {
                        at_keyword: at_keyword(&text[selector_start..prelude_end]),
                        selector_start,
                        prelude_end,
                        text,
                    }));
                }
                b'"' | b'\'' => self.skip_string()?,
                b'/' if self.at_comment() => self.skip_comment()?,
                _ => self.pos += 1,
            }
        }
    }

    /// Consumes a balanced `{ .. }` block, nested blocks included.
    fn skip_block(&mut self) -> Result<()> {
        let open = self.pos;
        self.pos += 1;

        let mut depth = 1usize;
        while depth > 0 {
            match self.bytes.get(self.pos) {
                None => return self.fail_at(open, "unclosed block"),
                Some(b'{') => { depth += 1; self.pos += 1; }
                Some(b'}') => { depth -= 1; self.pos += 1; }
                Some(b'"') | Some(b'\'') => self.skip_string()?,
                Some(b'/') if self.at_comment() => self.skip_comment()?,
                Some(_) => self.pos += 1,
            }
        }

        Ok(())
    }

    fn skip_string(&mut self) -> Result<()> {
        let open = self.pos;
        let quote = self.bytes[self.pos];
        self.pos += 1;

        loop {
            match self.bytes.get(self.pos) {
                None | Some(b'\n') => return self.fail_at(open, "unterminated string"),
                Some(&b) if b == quote => {
                    self.pos += 1;
                    return Ok(());
                }
                Some(b'\\') => self.pos = (self.pos + 2).min(self.bytes.len()),
                Some(_) => self.pos += 1,
            }
        }
    }

    fn at_comment(&self) -> bool {
        self.bytes.get(self.pos) == Some(&b'/') && self.bytes.get(self.pos + 1) == Some(&b'*')
    }

    fn skip_comment(&mut self) -> Result<()> {
        let open = self.pos;
        self.pos += 2;
        match memchr::memmem::find(&self.bytes[self.pos..], b"*/") {
            Some(i) => {
                self.pos += i + 2;
                Ok(())
            }
            None => self.fail_at(open, "unterminated comment"),
        }
    }

    fn skip_whitespace(&mut self) {
        while self.bytes.get(self.pos).is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn fail_at<T>(&self, at: usize, message: &str) -> Result<T> {
        let (line, column) = line_column(self.bytes, at);
        Err(Parse { message: message.into(), line, column }.into())
    }
}

fn at_keyword(prelude: &str) -> Option<String> {
    let rest = prelude.trim_start().strip_prefix('@')?;
    let len = rest.bytes()
        .take_while(|b| b.is_ascii_alphanumeric() || *b == b'-')
        .count();

    (len > 0).then(|| rest[..len].to_ascii_lowercase())
}

fn line_column(bytes: &[u8], at: usize) -> (usize, usize) {
    let (mut line, mut column) = (1, 1);
    for &b in &bytes[..at] {
        if b == b'\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }

    (line, column)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Kind;

    fn texts(source: &str) -> Vec<String> {
        Stylesheet::parse(source).unwrap()
            .rules()
            .iter()
            .map(|rule| rule.text().to_string())
            .collect()
    }

    fn fails(source: &str, message: &str) {
        let error = Stylesheet::parse(source).unwrap_err();
        assert_eq!(error.kind(), Kind::Parse, "wrong kind for {source:?}");
        assert!(error.to_string().contains(message), "missing {message:?} for {source:?}");
    }

    #[test]
    fn splits_flat_rules_verbatim() {
        let rules = texts(".a{x:1}.b , .c{y:2}");
        assert_eq!(rules, [".a{x:1}", ".b , .c{y:2}"]);

        let sheet = Stylesheet::parse(".b , .c{y:2}").unwrap();
        let members: Vec<_> = sheet.rules()[0].selectors().collect();
        assert_eq!(members, [".b", ".c"]);
        assert_eq!(sheet.rules()[0].body(), "{y:2}");
    }

    #[test]
    fn keeps_nested_blocks_whole() {
        let sheet = Stylesheet::parse("@media screen{.a{x:1}.b{y:2}}").unwrap();
        assert_eq!(sheet.len(), 1);
        assert_eq!(sheet.rules()[0].at_keyword(), Some("media"));
        assert_eq!(sheet.rules()[0].text(), "@media screen{.a{x:1}.b{y:2}}");
    }

    #[test]
    fn braces_in_strings_and_comments_are_text() {
        let rules = texts(r#".a[data-x="{"]{content:"}"} /*{*/ .b{z:0}"#);
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0], r#".a[data-x="{"]{content:"}"}"#);
        assert_eq!(rules[1], "/*{*/ .b{z:0}");
    }

    #[test]
    fn selector_commas_inside_brackets_do_not_split() {
        let sheet = Stylesheet::parse(r#".a:is(.b, .c), .d{x:1}"#).unwrap();
        let members: Vec<_> = sheet.rules()[0].selectors().collect();
        assert_eq!(members, [".a:is(.b, .c)", ".d"]);
    }

    #[test]
    fn statement_at_rules_stand_alone() {
        let sheet = Stylesheet::parse("@import url(\"x.css\");\n.a{x:1}").unwrap();
        assert_eq!(sheet.len(), 2);
        assert_eq!(sheet.rules()[0].text(), "@import url(\"x.css\");");
        assert_eq!(sheet.rules()[0].at_keyword(), Some("import"));
        assert_eq!(sheet.rules()[0].prelude(), "@import url(\"x.css\")");
    }

    #[test]
    fn trailing_comments_and_whitespace_are_fine() {
        assert_eq!(texts(".a{x:1} /* done */ ").len(), 1);
        assert!(Stylesheet::parse("").unwrap().is_empty());
        assert!(Stylesheet::parse("  \n\t").unwrap().is_empty());
    }

    #[test]
    fn unbalanced_input_is_a_parse_error() {
        fails(".a{x:1", "unclosed block");
        fails("@media screen{.a{x:1}", "unclosed block");
        fails(".a{x:1}}", "unbalanced closing brace");
        fails("}", "unbalanced closing brace");
    }

    #[test]
    fn unterminated_tokens_are_parse_errors() {
        fails("/* banner", "unterminated comment");
        fails(".a{content:\"x}", "unterminated string");
        fails(".a{x:1}.b", "unexpected end of stylesheet");
        fails("a;b{x:1}", "unexpected `;`");
    }

    #[test]
    fn errors_carry_line_and_column() {
        let error = Stylesheet::parse(".a{x:1}\n.b{y:2").unwrap_err();
        let rendered = error.to_string();
        assert!(rendered.contains("line: 2"));
        assert!(rendered.contains("column: 3"));
    }
}
