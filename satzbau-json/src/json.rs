//! Parsing and writing of JSON documents.

use std::fmt;

use satzbau::{
    action,
    callback::Value,
    scanner::Scanner,
    CollectErrors, ErrorKind, Grammar, Reader, Span, Utf8,
};

use crate::{error::ParseError, token::Tokens};

/// A parsed JSON value.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonValue {
    /// `null`.
    Null,
    /// `true` or `false`.
    Bool(bool),
    /// Any JSON number.
    Number(f64),
    /// A string with all escapes resolved.
    String(String),
    /// An array.
    Array(Vec<JsonValue>),
    /// An object; member order is preserved and duplicates are kept.
    Object(Vec<(String, JsonValue)>),
}

/// Parses a JSON document.
pub fn parse_str(input: &str) -> Result<JsonValue, ParseError> {
    let tokens = Tokens::new();
    let grammar = Grammar::builder().build();
    let mut handler = CollectErrors::default();
    let mut scanner = action::scan(Reader::from_str(input), &grammar, &mut handler);

    let value = value(&tokens, &mut scanner).and_then(|value| {
        scanner.discard(&tokens.ws);
        scanner.discard(&tokens.eof).then_some(value)
    });
    scanner.finish();

    match value {
        Some(value) if handler.errors.is_empty() => Ok(value),
        _ => Err(handler.errors.into()),
    }
}

fn value(t: &Tokens, s: &mut Scanner<Utf8>) -> Option<JsonValue> {
    s.discard(&t.ws);

    let mut word = None;
    if s.branch_value(&mut word, &t.word) {
        return match word? {
            Value::Nil => Some(JsonValue::Null),
            Value::Bool(b) => Some(JsonValue::Bool(b)),
            _ => None,
        };
    }
    if s.branch(&t.lbrace) {
        return object(t, s).map(JsonValue::Object);
    }
    if s.branch(&t.lbracket) {
        return array(t, s).map(JsonValue::Array);
    }
    let quote_begin = s.position();
    if s.branch(&t.quote) {
        return string_body(t, s, quote_begin).map(JsonValue::String);
    }

    let span = s.capture(&t.number)?;
    let text = std::str::from_utf8(s.slice(span)).unwrap();
    match text.parse::<f64>() {
        Ok(number) => Some(JsonValue::Number(number)),
        Err(_) => {
            s.fatal_error(ErrorKind::IntegerOverflow, span);
            None
        }
    }
}

fn object(t: &Tokens, s: &mut Scanner<Utf8>) -> Option<Vec<(String, JsonValue)>> {
    let mut members = vec![];
    s.discard(&t.ws);
    if s.branch(&t.rbrace) {
        return Some(members);
    }
    loop {
        s.discard(&t.ws);
        let quote_begin = s.position();
        s.parse(&t.quote)?;
        let key = string_body(t, s, quote_begin)?;
        s.discard(&t.ws);
        s.parse(&t.colon)?;
        let member = value(t, s)?;
        members.push((key, member));

        s.discard(&t.ws);
        if s.branch(&t.comma) {
            continue;
        }
        s.parse(&t.rbrace)?;
        return Some(members);
    }
}

fn array(t: &Tokens, s: &mut Scanner<Utf8>) -> Option<Vec<JsonValue>> {
    let mut items = vec![];
    s.discard(&t.ws);
    if s.branch(&t.rbracket) {
        return Some(items);
    }
    loop {
        items.push(value(t, s)?);
        s.discard(&t.ws);
        if s.branch(&t.comma) {
            continue;
        }
        s.parse(&t.rbracket)?;
        return Some(items);
    }
}

/// Parses the inside of a string, the opening quote already consumed.
fn string_body(t: &Tokens, s: &mut Scanner<Utf8>, quote_begin: usize) -> Option<String> {
    let mut out = String::new();
    loop {
        if s.branch(&t.quote) {
            return Some(out);
        }
        if s.branch(&t.backslash) {
            let mut escaped = None;
            if s.branch_value(&mut escaped, &t.escape_char) {
                match escaped? {
                    Value::Char(c) => out.push(c),
                    _ => return None,
                }
            } else if s.branch(&t.unicode_marker) {
                unicode_escape(t, s, &mut out)?;
            } else {
                let pos = s.position();
                s.fatal_error(
                    ErrorKind::InvalidEscapeSequence,
                    Span::new(pos.saturating_sub(1), pos),
                );
                return None;
            }
            continue;
        }
        if s.is_at_eof() {
            s.fatal_error(
                ErrorKind::MissingDelimiter,
                Span::new(quote_begin, s.position()),
            );
            return None;
        }
        let span = s.capture(&t.chars)?;
        out.push_str(std::str::from_utf8(s.slice(span)).unwrap());
    }
}

fn hex4(t: &Tokens, s: &mut Scanner<Utf8>) -> Option<u32> {
    let span = s.capture(&t.hex4)?;
    let text = std::str::from_utf8(s.slice(span)).unwrap();
    Some(u32::from_str_radix(text, 16).unwrap())
}

/// Parses the digits of a `\u` escape, combining surrogate pairs.
fn unicode_escape(t: &Tokens, s: &mut Scanner<Utf8>, out: &mut String) -> Option<()> {
    let begin = s.position().saturating_sub(2);
    let high = hex4(t, s)?;

    let code = if (0xD800..=0xDBFF).contains(&high) {
        // A high surrogate must be followed by a `\u`-escaped low surrogate.
        s.parse(&t.backslash)?;
        s.parse(&t.unicode_marker)?;
        let low = hex4(t, s)?;
        if !(0xDC00..=0xDFFF).contains(&low) {
            s.fatal_error(
                ErrorKind::InvalidEscapeSequence,
                Span::new(begin, s.position()),
            );
            return None;
        }
        0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00)
    } else {
        high
    };

    match char::from_u32(code) {
        Some(c) => {
            out.push(c);
            Some(())
        }
        None => {
            s.fatal_error(
                ErrorKind::InvalidEscapeSequence,
                Span::new(begin, s.position()),
            );
            None
        }
    }
}

//=== writing ===//

fn write_string(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    f.write_str("\"")?;
    for c in text.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            '\u{8}' => f.write_str("\\b")?,
            '\u{c}' => f.write_str("\\f")?,
            c if (c as u32) < 0x20 => write!(f, "\\u{:04x}", c as u32)?,
            c => write!(f, "{c}")?,
        }
    }
    f.write_str("\"")
}

impl fmt::Display for JsonValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsonValue::Null => f.write_str("null"),
            JsonValue::Bool(true) => f.write_str("true"),
            JsonValue::Bool(false) => f.write_str("false"),
            JsonValue::Number(n) => write!(f, "{n}"),
            JsonValue::String(s) => write_string(f, s),
            JsonValue::Array(items) => {
                f.write_str("[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx != 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            JsonValue::Object(members) => {
                f.write_str("{")?;
                for (idx, (key, member)) in members.iter().enumerate() {
                    if idx != 0 {
                        f.write_str(",")?;
                    }
                    write_string(f, key)?;
                    write!(f, ":{member}")?;
                }
                f.write_str("}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    type Result<T> = std::result::Result<T, ParseError>;

    #[test]
    fn scalars() -> Result<()> {
        assert_eq!(parse_str("null")?, JsonValue::Null);
        assert_eq!(parse_str("true")?, JsonValue::Bool(true));
        assert_eq!(parse_str("false")?, JsonValue::Bool(false));
        assert_eq!(parse_str("0")?, JsonValue::Number(0.0));
        assert_eq!(parse_str("-12.5e3")?, JsonValue::Number(-12.5e3));
        assert_eq!(parse_str("42")?, JsonValue::Number(42.0));
        assert_eq!(parse_str("\"hi\"")?, JsonValue::String("hi".to_string()));
        Ok(())
    }

    #[test]
    fn surrounding_whitespace() -> Result<()> {
        assert_eq!(parse_str(" \t\r\n null \n")?, JsonValue::Null);
        Ok(())
    }

    #[test]
    fn arrays_and_objects() -> Result<()> {
        assert_eq!(parse_str("[]")?, JsonValue::Array(vec![]));
        assert_eq!(parse_str("{ }")?, JsonValue::Object(vec![]));
        assert_eq!(
            parse_str("[1, [2, 3], {\"a\": null}]")?,
            JsonValue::Array(vec![
                JsonValue::Number(1.0),
                JsonValue::Array(vec![JsonValue::Number(2.0), JsonValue::Number(3.0)]),
                JsonValue::Object(vec![("a".to_string(), JsonValue::Null)]),
            ])
        );
        assert_eq!(
            parse_str("{\"x\": 1, \"y\": [true]}")?,
            JsonValue::Object(vec![
                ("x".to_string(), JsonValue::Number(1.0)),
                ("y".to_string(), JsonValue::Array(vec![JsonValue::Bool(true)])),
            ])
        );
        Ok(())
    }

    #[test]
    fn string_escapes() -> Result<()> {
        assert_eq!(
            parse_str(r#""a\"b\\c\/d\n\t""#)?,
            JsonValue::String("a\"b\\c/d\n\t".to_string())
        );
        assert_eq!(
            parse_str(r#""\u0041""#)?,
            JsonValue::String("A".to_string())
        );
        // G clef, encoded as a surrogate pair.
        assert_eq!(
            parse_str(r#""\uD834\uDD1E""#)?,
            JsonValue::String("\u{1D11E}".to_string())
        );
        // Non-ASCII characters pass through unescaped.
        assert_eq!(parse_str("\"héllo\"")?, JsonValue::String("héllo".to_string()));
        Ok(())
    }

    #[test]
    fn err_unterminated_string() {
        let err = parse_str("\"abc").unwrap_err();
        assert_matches!(
            &err.diagnostics[..],
            [diag] if diag.error.kind == ErrorKind::MissingDelimiter
                && diag.error.span == Span::new(0, 4)
        );
    }

    #[test]
    fn err_invalid_escape() {
        let err = parse_str(r#""\q""#).unwrap_err();
        assert_matches!(
            &err.diagnostics[..],
            [diag] if diag.error.kind == ErrorKind::InvalidEscapeSequence
        );
    }

    #[test]
    fn err_lone_surrogate() {
        let err = parse_str(r#""\uD834x""#).unwrap_err();
        assert!(!err.diagnostics.is_empty());
    }

    #[test]
    fn err_leading_zero() {
        let err = parse_str("0123").unwrap_err();
        assert!(err
            .diagnostics
            .iter()
            .any(|diag| diag.error.kind == ErrorKind::ForbiddenLeadingZero));
    }

    #[test]
    fn err_trailing_garbage() {
        let err = parse_str("null x").unwrap_err();
        assert!(!err.diagnostics.is_empty());
    }

    #[test]
    fn err_missing_member_value() {
        assert_matches!(parse_str("{\"a\": }"), Err(..));
        assert_matches!(parse_str("{\"a\" 1}"), Err(..));
        assert_matches!(parse_str("[1, ]"), Err(..));
    }

    #[test]
    fn roundtrip() -> Result<()> {
        let input = r#"{"name":"GAclef 𝄞","ok":true,"items":[1,-2.5,null],"empty":{}}"#;
        let value = parse_str(input)?;
        let written = value.to_string();
        assert_eq!(parse_str(&written)?, value);
        Ok(())
    }
}
