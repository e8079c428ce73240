//! S-expression parser for the style DSL and the raw index format.
//!
//! Produces a [`Value`] tree from UTF-8 (or Latin-1 fallback) text. The
//! grammar is the small Lisp subset both inputs share:
//!
//! - lists `( … )`, strings `"…"` with `\"` and `\\` escapes (any other
//!   `\X` sequence keeps its backslash),
//! - `'value` expanding to `(quote value)`,
//! - atoms: a leading `:` makes a [`Value::Keyword`], otherwise integer,
//!   then float, then [`Value::Symbol`],
//! - `;` line comments and nestable `#| … |#` block comments.
//!
//! [`preprocess`] normalises legacy style-module quirks (notably adjacent
//! string literals emitted as `"abc""def"`) before the DSL is parsed; it is
//! idempotent and must not be applied to raw index files.

use std::{fmt, sync::LazyLock};

use regex::Regex;

use crate::error::SyntaxError;

/// One parsed S-expression value.
///
/// `Keyword` holds the name without its leading `:`. `Symbol` covers every
/// other bareword, including reader-conditional markers such as
/// `#+latin-alphabet`, which are resolved later by the style evaluator.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    Symbol(String),
    Keyword(String),
    List(Vec<Value>),
}

impl Value {
    /// Returns the contained string for `Str` values.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the textual name of a string-like value (`Str` or `Symbol`).
    ///
    /// The style DSL accepts both spellings in most name positions.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Str(s) | Self::Symbol(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the contained elements for `List` values.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the keyword name (without `:`) for `Keyword` values.
    #[must_use]
    pub fn as_keyword(&self) -> Option<&str> {
        match self {
            Self::Keyword(name) => Some(name),
            _ => None,
        }
    }

    /// Returns the integral value for `Int` (and integral `Float`) values.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            Self::Float(value) if value.fract() == 0.0 => Some(*value as i64),
            _ => None,
        }
    }

    /// True for `Keyword` values.
    #[must_use]
    pub fn is_keyword(&self) -> bool {
        matches!(self, Self::Keyword(_))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Symbol(name) => f.write_str(name),
            Self::Keyword(name) => write!(f, ":{name}"),
            Self::List(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Incremental scanner with line/column tracking.
struct Scanner {
    chars: Vec<char>,
    index: usize,
    line: u32,
    column: u32,
}

impl Scanner {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            index: 0,
            line: 1,
            column: 1,
        }
    }

    fn eof(&self) -> bool {
        self.index >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.index).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.index + 1).copied()
    }

    fn advance(&mut self) -> Result<char, SyntaxError> {
        let Some(&ch) = self.chars.get(self.index) else {
            return Err(self.error("unexpected end of input"));
        };
        self.index += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Ok(ch)
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::at(message, self.line, self.column)
    }

    fn skip_separators(&mut self) -> Result<(), SyntaxError> {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance()?;
            } else if ch == ';' {
                self.skip_line_comment()?;
            } else if ch == '#' && self.peek_next() == Some('|') {
                self.skip_block_comment()?;
            } else {
                break;
            }
        }
        Ok(())
    }

    fn skip_line_comment(&mut self) -> Result<(), SyntaxError> {
        while !self.eof() {
            if self.advance()? == '\n' {
                break;
            }
        }
        Ok(())
    }

    fn skip_block_comment(&mut self) -> Result<(), SyntaxError> {
        // consume "#|"
        self.advance()?;
        self.advance()?;
        let mut depth = 1u32;
        while depth > 0 {
            if self.eof() {
                return Err(self.error("end of input inside block comment"));
            }
            let ch = self.advance()?;
            if ch == '#' && self.peek() == Some('|') {
                self.advance()?;
                depth += 1;
            } else if ch == '|' && self.peek() == Some('#') {
                self.advance()?;
                depth -= 1;
            }
        }
        Ok(())
    }
}

/// Parses every S-expression in `source`.
pub fn parse_many(source: &str) -> Result<Vec<Value>, SyntaxError> {
    let mut scanner = Scanner::new(source);
    let mut expressions = Vec::new();
    loop {
        scanner.skip_separators()?;
        if scanner.eof() {
            break;
        }
        expressions.push(parse_expression(&mut scanner)?);
    }
    Ok(expressions)
}

/// Parses `source` expecting exactly one S-expression.
pub fn parse_one(source: &str) -> Result<Value, SyntaxError> {
    let mut exprs = parse_many(source)?;
    match exprs.len() {
        1 => Ok(exprs.remove(0)),
        0 => Err(SyntaxError::new("expected one S-expression, found none")),
        n => Err(SyntaxError::new(format!(
            "expected one S-expression, found {n}"
        ))),
    }
}

fn parse_expression(scanner: &mut Scanner) -> Result<Value, SyntaxError> {
    scanner.skip_separators()?;
    let Some(ch) = scanner.peek() else {
        return Err(scanner.error("unexpected end of input while reading expression"));
    };
    match ch {
        '(' => parse_list(scanner),
        ')' => Err(scanner.error("unexpected ')'")),
        '"' => parse_string(scanner),
        '\'' => {
            scanner.advance()?;
            let quoted = parse_expression(scanner)?;
            Ok(Value::List(vec![Value::Symbol("quote".to_owned()), quoted]))
        }
        _ => parse_atom(scanner),
    }
}

fn parse_list(scanner: &mut Scanner) -> Result<Value, SyntaxError> {
    let mut elements = Vec::new();
    scanner.advance()?; // consume "("
    loop {
        scanner.skip_separators()?;
        match scanner.peek() {
            None => return Err(scanner.error("end of input while reading list")),
            Some(')') => {
                scanner.advance()?;
                return Ok(Value::List(elements));
            }
            Some(_) => elements.push(parse_expression(scanner)?),
        }
    }
}

fn parse_string(scanner: &mut Scanner) -> Result<Value, SyntaxError> {
    scanner.advance()?; // opening quote
    let mut result = String::new();
    loop {
        if scanner.eof() {
            return Err(scanner.error("end of input while reading string literal"));
        }
        let ch = scanner.advance()?;
        if ch == '"' {
            break;
        }
        if ch == '\\' {
            if scanner.eof() {
                return Err(scanner.error("end of input after escape character"));
            }
            let escaped = scanner.advance()?;
            match escaped {
                '"' | '\\' => result.push(escaped),
                other => {
                    // unknown escapes keep their backslash, e.g. "\~" in
                    // style markup strings
                    result.push('\\');
                    result.push(other);
                }
            }
        } else {
            result.push(ch);
        }
    }
    Ok(Value::Str(result))
}

fn parse_atom(scanner: &mut Scanner) -> Result<Value, SyntaxError> {
    let mut token = String::new();
    while let Some(ch) = scanner.peek() {
        if ch.is_whitespace() || matches!(ch, '(' | ')' | ';' | '"') {
            break;
        }
        token.push(scanner.advance()?);
    }
    if token.is_empty() {
        return Err(scanner.error("expected atom"));
    }
    if let Some(name) = token.strip_prefix(':') {
        return Ok(Value::Keyword(name.to_owned()));
    }
    if let Ok(value) = token.parse::<i64>() {
        return Ok(Value::Int(value));
    }
    if let Ok(value) = token.parse::<f64>() {
        return Ok(Value::Float(value));
    }
    Ok(Value::Symbol(token))
}

/// One substitution of the legacy-quirk preprocessor: pattern plus
/// replacement template, applied once in order.
static QUIRK_REWRITES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        // "X""Y" where X is a (possibly escaped) single character
        (r#""(\\\\?.)""(.)""#, "\"${1}${2}\""),
        // "\~"a"  ->  "\~a"
        (r#""(\\~)"([A-Za-z])""#, "\"${1}${2}\""),
        // broken :string merge rule for a literal backslash-quote
        (
            r#"\(merge-rule\s+"\\"\s+""\s+:string\)"#,
            r#"(merge-rule "\\\"" "" :string)"#,
        ),
        // "\~"{}"  ->  "\~{}"
        (r#""(\\~)"\{\}""#, "\"${1}{}\""),
        // "\~"\X"  ->  "\~\X"
        (r#""(\\~)"\\([A-Za-z])""#, "\"${1}\\${2}\""),
    ]
    .into_iter()
    .map(|(pattern, replacement)| {
        (
            Regex::new(pattern).expect("quirk pattern is valid"),
            replacement,
        )
    })
    .collect()
});

/// Adjacent string literals, escape-aware.
static STRING_PAIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""((?:\\.|[^"\\])*)""((?:\\.|[^"\\])*)""#).expect("string pair pattern is valid")
});

/// Normalises legacy style-module quirks before DSL parsing.
///
/// Legacy modules emit what is syntactically a pair of adjacent string
/// literals (`"abc""def"`); these are collapsed into one literal, repeating
/// until a fixed point so longer runs collapse too. A handful of known
/// malformed `~`-escape spellings are repaired first. The whole pass is
/// idempotent.
#[must_use]
pub fn preprocess(content: &str) -> String {
    let mut content = content.to_owned();
    for (pattern, replacement) in QUIRK_REWRITES.iter() {
        content = pattern.replace_all(&content, *replacement).into_owned();
    }
    loop {
        let updated = STRING_PAIR.replace_all(&content, "\"${1}${2}\"");
        if updated == content {
            break;
        }
        content = updated.into_owned();
    }
    content
}

/// Decodes file bytes as UTF-8, falling back to Latin-1.
///
/// Latin-1 maps every byte to the Unicode scalar of the same value, so the
/// fallback cannot fail.
#[must_use]
pub fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_owned(),
        Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}

/// Forces Latin-1 decoding, for the `-C latin-1` codepage override.
#[must_use]
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn sym(name: &str) -> Value {
        Value::Symbol(name.to_owned())
    }

    fn kw(name: &str) -> Value {
        Value::Keyword(name.to_owned())
    }

    fn s(text: &str) -> Value {
        Value::Str(text.to_owned())
    }

    #[test]
    fn parses_nested_indexentry() {
        let expr = parse_one(r#"(indexentry :key ("a" "b") :locref "1")"#).unwrap();
        assert_eq!(
            expr,
            Value::List(vec![
                sym("indexentry"),
                kw("key"),
                Value::List(vec![s("a"), s("b")]),
                kw("locref"),
                s("1"),
            ])
        );
    }

    #[test]
    fn comments_and_whitespace_are_ignored() {
        let text = "
            ; leading comment
            (foo 1 2)  ; inline comment
            #|
              block #| nested |# comment
            |#
            (bar \"baz\")
        ";
        let exprs = parse_many(text).unwrap();
        assert_eq!(exprs.len(), 2);
        assert_eq!(exprs[0].as_list().unwrap()[0], sym("foo"));
        assert_eq!(exprs[1].as_list().unwrap()[0], sym("bar"));
    }

    #[test]
    fn quote_expands_to_quote_form() {
        let expr = parse_one("'(a b)").unwrap();
        assert_eq!(
            expr,
            Value::List(vec![
                sym("quote"),
                Value::List(vec![sym("a"), sym("b")]),
            ])
        );
    }

    #[test]
    fn unknown_escapes_keep_their_backslash() {
        let expr = parse_one(r#""a\~b\"c\\d""#).unwrap();
        assert_eq!(expr, s("a\\~b\"c\\d"));
    }

    #[test]
    fn atoms_fall_through_int_float_symbol() {
        let exprs = parse_many("12 3.5 hello :kw -4").unwrap();
        assert_eq!(
            exprs,
            vec![
                Value::Int(12),
                Value::Float(3.5),
                sym("hello"),
                kw("kw"),
                Value::Int(-4),
            ]
        );
    }

    #[test]
    fn unterminated_list_raises() {
        let err = parse_one("(foo (bar)").unwrap_err();
        assert!(err.message.contains("end of input"));
    }

    #[test]
    fn unexpected_close_paren_has_location() {
        let err = parse_many("\n  )").unwrap_err();
        assert_eq!(err.location, Some((2, 3)));
    }

    #[test]
    fn preprocess_collapses_adjacent_strings() {
        assert_eq!(preprocess(r#"("abc""def")"#), r#"("abcdef")"#);
        // runs longer than a pair collapse via the fixed point
        assert_eq!(preprocess(r#"("a""b""c")"#), r#"("abc")"#);
    }

    #[test]
    fn preprocess_is_idempotent() {
        let input = r#"(sort-rule "a""b" "x") "plain" "\~"A""#;
        let once = preprocess(input);
        assert_eq!(preprocess(&once), once);
    }

    #[test]
    fn preprocess_leaves_escaped_quotes_alone() {
        let input = r#"("a\"b")"#;
        assert_eq!(preprocess(input), input);
    }

    #[test]
    fn latin1_fallback_decodes_every_byte() {
        let bytes = [b'a', 0xE4, b'b'];
        assert_eq!(decode_text(&bytes), "a\u{e4}b");
        assert_eq!(decode_text("a\u{e4}b".as_bytes()), "a\u{e4}b");
    }
}
