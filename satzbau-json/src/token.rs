//! The token rules of the JSON grammar.

use std::sync::Arc;

use satzbau::{
    ascii, callback::Value, digits, eof, lit, opt, symbol, while_, while_one, CharClass, Rule,
    SymbolTable,
};

/// All rules the JSON parser drives through the scanner.
///
/// Rules are built once per parse; compiled tries are shared through the
/// rule values themselves.
pub(crate) struct Tokens {
    /// Insignificant whitespace between tokens.
    pub ws: Rule,
    pub eof: Rule,
    pub lbrace: Rule,
    pub rbrace: Rule,
    pub lbracket: Rule,
    pub rbracket: Rule,
    pub colon: Rule,
    pub comma: Rule,
    pub quote: Rule,
    pub backslash: Rule,
    /// `null`, `true` and `false`, mapped to their values.
    pub word: Rule,
    /// The single-character escapes, mapped to the escaped character.
    pub escape_char: Rule,
    /// The `u` introducing a Unicode escape.
    pub unicode_marker: Rule,
    /// Four hex digits of a Unicode escape.
    pub hex4: Rule,
    /// A run of unescaped string characters.
    pub chars: Rule,
    /// A complete number token.
    pub number: Rule,
}

fn json_ws() -> CharClass {
    CharClass::set(" \t\r\n").named("JSON.whitespace")
}

fn string_char() -> CharClass {
    (!(CharClass::set("\"\\") | ascii::control())).named("string character")
}

fn number_rule() -> Rule {
    let frac = lit(".") >> Rule::from(digits());
    let exp = (lit("e") | lit("E")) >> opt(lit("+") | lit("-")) + Rule::from(digits());
    opt(lit("-")) + Rule::from(digits().no_leading_zero()) + opt(frac) + opt(exp)
}

impl Tokens {
    pub(crate) fn new() -> Self {
        let words = Arc::new(
            SymbolTable::new()
                .map("null", Value::Nil)
                .map("true", Value::Bool(true))
                .map("false", Value::Bool(false)),
        );
        let escapes = Arc::new(
            SymbolTable::new()
                .map("\"", Value::Char('"'))
                .map("\\", Value::Char('\\'))
                .map("/", Value::Char('/'))
                .map("b", Value::Char('\u{8}'))
                .map("f", Value::Char('\u{c}'))
                .map("n", Value::Char('\n'))
                .map("r", Value::Char('\r'))
                .map("t", Value::Char('\t')),
        );

        Tokens {
            ws: while_(Rule::from(json_ws())),
            eof: eof(),
            lbrace: lit("{"),
            rbrace: lit("}"),
            lbracket: lit("["),
            rbracket: lit("]"),
            colon: lit(":"),
            comma: lit(","),
            quote: lit("\""),
            backslash: lit("\\"),
            word: symbol(&words),
            escape_char: symbol(&escapes),
            unicode_marker: lit("u"),
            hex4: satzbau::n_digits(4, 16),
            chars: while_one(Rule::from(string_char())),
            number: number_rule(),
        }
    }
}
