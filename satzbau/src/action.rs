//! Parse actions.
//!
//! An action binds a grammar, an input reader and an event handler, runs the
//! entry production and returns whatever the action is after: a value with
//! diagnostics ([`parse`]), a plain match test ([`matches`]), diagnostics
//! only ([`validate`]), a textual event transcript ([`trace`]) or an
//! imperative [`Scanner`] ([`scan`]).

use std::{any::Any, fmt};

use bstr::BStr;

use crate::{
    callback::Value,
    encoding::Encoding,
    error::Diagnostic,
    event::{CollectErrors, DiscardEvents, Event, Handler},
    grammar::{Grammar, ProdId},
    parse::{parse_production, BranchResult, Ctx},
    reader::{Reader, Span},
    scanner::Scanner,
};

/// Options shared by all actions.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct ParseOptions {
    /// Maximum production nesting before the parse is aborted with a
    /// `recursion_limit_exceeded` error. (Default: `1024`)
    pub max_recursion_depth: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            max_recursion_depth: 1024,
        }
    }
}

impl ParseOptions {
    /// Sets the [`max_recursion_depth`][Self#structfield.max_recursion_depth]
    /// field.
    pub fn max_recursion_depth(mut self, value: usize) -> Self {
        self.max_recursion_depth = value;
        self
    }
}

/// The result of a [`parse`] action.
#[derive(Debug)]
pub struct ParseResult {
    /// The entry production's value, if parsing completed.
    pub value: Option<Value>,
    /// All diagnostics reported during the parse, in input order.
    pub errors: Vec<Diagnostic>,
}

impl ParseResult {
    /// Whether parsing completed and produced a value.
    pub fn is_success(&self) -> bool {
        self.value.is_some() && !self.has_errors()
    }

    /// Whether any error was reported, even if parsing recovered.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

fn pack(mut args: Vec<Value>) -> Value {
    match args.len() {
        0 => Value::Nil,
        1 => args.pop().unwrap(),
        _ => Value::List(args),
    }
}

/// Runs `entry` with full control over handler, state and options.
///
/// Returns the produced value if the production succeeded.
pub fn parse_with<E: Encoding>(
    mut reader: Reader<E>,
    grammar: &Grammar,
    entry: ProdId,
    handler: &mut dyn Handler,
    state: Option<&mut dyn Any>,
    options: &ParseOptions,
) -> Option<Value> {
    let mut ctx = Ctx::new(grammar, handler, state, options.max_recursion_depth);
    let mut args = vec![];
    match parse_production(entry, &mut ctx, &mut reader, &mut args, false) {
        BranchResult::Committed(true) => Some(pack(args)),
        _ => None,
    }
}

/// Parses the input, producing the entry production's value and all
/// diagnostics.
pub fn parse<E: Encoding>(reader: Reader<E>, grammar: &Grammar, entry: ProdId) -> ParseResult {
    let mut handler = CollectErrors::default();
    let value = parse_with(
        reader,
        grammar,
        entry,
        &mut handler,
        None,
        &ParseOptions::default(),
    );
    ParseResult {
        value,
        errors: handler.errors,
    }
}

/// Like [`parse`], with a mutable parse state available to callbacks,
/// effects and sink factories.
pub fn parse_with_state<E: Encoding>(
    reader: Reader<E>,
    grammar: &Grammar,
    entry: ProdId,
    state: &mut dyn Any,
) -> ParseResult {
    let mut handler = CollectErrors::default();
    let value = parse_with(
        reader,
        grammar,
        entry,
        &mut handler,
        Some(state),
        &ParseOptions::default(),
    );
    ParseResult {
        value,
        errors: handler.errors,
    }
}

/// Whether the entry production matches the input; never allocates
/// diagnostics.
pub fn matches<E: Encoding>(reader: Reader<E>, grammar: &Grammar, entry: ProdId) -> bool {
    let mut handler = DiscardEvents;
    parse_with(
        reader,
        grammar,
        entry,
        &mut handler,
        None,
        &ParseOptions::default(),
    )
    .is_some()
}

/// Parses for diagnostics only, discarding values.
pub fn validate<E: Encoding>(
    reader: Reader<E>,
    grammar: &Grammar,
    entry: ProdId,
) -> Vec<Diagnostic> {
    parse(reader, grammar, entry).errors
}

/// Creates a scanner over the input.
pub fn scan<'p, 'i, E: Encoding>(
    reader: Reader<'i, E>,
    grammar: &'p Grammar,
    handler: &'p mut dyn Handler,
) -> Scanner<'p, 'i, E> {
    Scanner::new(
        grammar,
        handler,
        None,
        reader,
        None,
        ParseOptions::default().max_recursion_depth,
    )
}

/// Creates a scanner whose whitespace rule and name come from a control
/// production.
pub fn scan_with_control<'p, 'i, E: Encoding>(
    reader: Reader<'i, E>,
    grammar: &'p Grammar,
    handler: &'p mut dyn Handler,
    control: ProdId,
) -> Scanner<'p, 'i, E> {
    Scanner::new(
        grammar,
        handler,
        None,
        reader,
        Some(control),
        ParseOptions::default().max_recursion_depth,
    )
}

//=== trace ===//

struct TraceWriter<'w, 'i, E: Encoding> {
    out: &'w mut dyn fmt::Write,
    reader: Reader<'i, E>,
    depth: usize,
    error: Option<fmt::Error>,
}

impl<'w, 'i, E: Encoding> TraceWriter<'w, 'i, E> {
    fn render_span(&self, span: Span) -> String {
        let units = self.reader.slice(span);
        let mut bytes = Vec::with_capacity(units.len());
        for &unit in units {
            let widened = E::to_u32(unit);
            if widened <= 0xFF {
                bytes.push(widened as u8);
            } else {
                return units
                    .iter()
                    .map(|&u| format!("U+{:04X}", E::to_u32(u)))
                    .collect::<Vec<_>>()
                    .join(" ");
            }
        }
        format!("{:?}", BStr::new(&bytes))
    }

    fn line(&mut self, args: fmt::Arguments<'_>) {
        if self.error.is_some() {
            return;
        }
        let indent = self.depth * 2;
        if let Err(err) = writeln!(self.out, "{:indent$}{args}", "") {
            self.error = Some(err);
        }
    }
}

impl<'w, 'i, E: Encoding> Handler for TraceWriter<'w, 'i, E> {
    fn on_event(&mut self, event: Event) {
        match event {
            Event::ProductionStart { production, pos } => {
                self.line(format_args!("{production}: @{pos}"));
                self.depth += 1;
            }
            Event::ProductionFinish { pos, .. } => {
                self.depth = self.depth.saturating_sub(1);
                self.line(format_args!("= finish @{pos}"));
            }
            Event::ProductionCancel { pos, .. } => {
                self.depth = self.depth.saturating_sub(1);
                self.line(format_args!("= cancel @{pos}"));
            }
            Event::Token { kind, span } => {
                let text = self.render_span(span);
                self.line(format_args!(
                    "{}: {} @{}..{}",
                    kind.name(),
                    text,
                    span.begin,
                    span.end
                ));
            }
            Event::Backtracked { span } => {
                self.line(format_args!("backtracked @{}..{}", span.begin, span.end));
            }
            Event::RecoveryStart { pos } => {
                self.line(format_args!("error recovery: @{pos}"));
                self.depth += 1;
            }
            Event::RecoveryFinish { pos } => {
                self.depth = self.depth.saturating_sub(1);
                self.line(format_args!("= recovered @{pos}"));
            }
            Event::RecoveryCancel { pos } => {
                self.depth = self.depth.saturating_sub(1);
                self.line(format_args!("= recovery canceled @{pos}"));
            }
            Event::Debug { message, pos } => {
                self.line(format_args!("debug: {message:?} @{pos}"));
            }
            Event::Error(diagnostic) => {
                self.line(format_args!("error: {}", diagnostic.error));
            }
        }
    }
}

/// Parses the input and writes an indented transcript of every parse event.
pub fn trace<E: Encoding>(
    reader: Reader<E>,
    grammar: &Grammar,
    entry: ProdId,
    out: &mut dyn fmt::Write,
) -> fmt::Result {
    let mut writer = TraceWriter {
        out,
        reader,
        depth: 0,
        error: None,
    };
    let _ = parse_with(
        reader,
        grammar,
        entry,
        &mut writer,
        None,
        &ParseOptions::default(),
    );
    match writer.error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert_matches::assert_matches;

    use super::*;
    use crate::{
        callback::{as_list, Callback, Value},
        char_class::ascii,
        encoding::{Utf16, Utf8},
        error::ErrorKind,
        event::TokenKind,
        grammar::Production,
        rule::*,
        scanner::ScannerState,
    };

    fn single(rule: Rule) -> (Grammar, ProdId) {
        let mut builder = Grammar::builder();
        let id = builder.add(Production::new("test", rule));
        (builder.build(), id)
    }

    fn parse_str(rule: Rule, input: &str) -> ParseResult {
        let (grammar, id) = single(rule);
        parse(Reader::from_str(input), &grammar, id)
    }

    fn lexeme_strs(input: &str, value: &Value) -> Vec<String> {
        let reader = Reader::<Utf8>::from_str(input);
        value
            .as_list()
            .unwrap()
            .iter()
            .map(|item| reader.slice_str(item.as_lexeme().unwrap()).to_string())
            .collect()
    }

    #[derive(Default)]
    struct CollectEvents {
        events: Vec<Event>,
    }

    impl Handler for CollectEvents {
        fn on_event(&mut self, event: Event) {
            self.events.push(event);
        }
    }

    fn entity_table() -> Arc<SymbolTable> {
        Arc::new(
            SymbolTable::new()
                .map("quot", Value::Char('"'))
                .map("amp", Value::Char('&'))
                .map("apos", Value::Char('\''))
                .map("lt", Value::Char('<'))
                .map("gt", Value::Char('>')),
        )
    }

    #[test]
    fn xml_entity_by_symbol_table() {
        let rule = lit("&")
            >> symbol_matching(&entity_table(), identifier(ascii::alpha(), ascii::alpha()))
                + lit(";");

        let result = parse_str(rule.clone(), "&amp;");
        assert!(result.is_success());
        assert_eq!(result.value, Some(Value::Char('&')));

        let result = parse_str(rule, "&foo;");
        assert_eq!(result.value, None);
        assert_matches!(
            &result.errors[..],
            [diag] if diag.error.kind == ErrorKind::ExpectedLiteralSet
                && diag.error.position() == 1
        );
    }

    #[test]
    fn choice_commits_and_keeps_order() {
        let rule = (lit("a") >> lit("bc")) | (lit("a") >> lit("b")) | lit("bc") | lit("b");

        assert!(parse_str(rule.clone(), "abc").is_success());
        assert!(parse_str(rule.clone(), "b").is_success());
        assert!(parse_str(rule.clone(), "bc").is_success());

        // The first alternative commits after `a`; the failure of `bc` does
        // not fall through to the second alternative.
        let result = parse_str(rule, "ab");
        assert_eq!(result.value, None);
        assert_matches!(
            &result.errors[..],
            [diag] if matches!(
                &diag.error.kind,
                ErrorKind::ExpectedLiteral { literal, matched: 1, .. } if &**literal == "bc"
            )
        );
    }

    #[test]
    fn choice_error_rule_spans_the_bad_input() {
        let rule = lit("Hello")
            | lit("Hi")
            | error_matching("unknown greeting", while_(ascii::alpha().into()));

        let result = parse_str(rule.clone(), "Hallo");
        assert_eq!(result.value, None);
        assert_matches!(
            &result.errors[..],
            [diag] if matches!(
                &diag.error.kind,
                ErrorKind::Unexpected { label } if &**label == "unknown greeting"
            ) && diag.error.span == Span::new(0, 5)
        );

        assert!(parse_str(rule, "Hello").is_success());
    }

    #[test]
    fn exhausted_choice_reports_at_the_choice_start() {
        let rule = lit("xy") + (lit("a") | lit("b"));
        let result = parse_str(rule, "xyq");
        assert_matches!(
            &result.errors[..],
            [diag] if diag.error.kind == ErrorKind::ExhaustedChoice
                && diag.error.position() == 2
        );
    }

    #[test]
    fn delimited_with_escape() {
        let rule = delimited(lit("("), lit(")")).of_with_escapes(
            Rule::from(ascii::character()),
            vec![escape(lit("$")).capture(ascii::print())],
        );

        let input = "(a$bc$))";
        let result = parse_str(rule.clone(), input);
        assert!(result.is_success());
        assert_eq!(
            lexeme_strs(input, result.value.as_ref().unwrap()),
            ["a", "b", "c", ")"]
        );

        let result = parse_str(rule, "(abc");
        assert_eq!(result.value, None);
        assert_matches!(
            &result.errors[..],
            [diag] if diag.error.kind == ErrorKind::MissingDelimiter
                && diag.error.span == Span::new(1, 4)
        );
    }

    #[test]
    fn terminator_list_recovers_between_separators() {
        let item = lit("abc") | lit("123");
        let rule = terminator(lit(".")).list_sep(item, sep(lit(","))) + eof();

        let input = "abc,12,abc123,123.";
        let result = parse_str(rule, input);
        // Recovery produced errors, but the list and the final position are
        // intact.
        assert!(result.value.is_some());
        assert!(result.has_errors());
        assert_eq!(
            lexeme_strs(input, result.value.as_ref().unwrap()),
            ["abc", "12", "abc123", "123"]
        );
    }

    #[test]
    fn scanner_with_recovery() {
        let grammar = Grammar::builder().build();
        let mut handler = CollectErrors::default();
        let mut scanner = scan(Reader::from_str("\"123abc\""), &grammar, &mut handler);

        assert!(scanner.parse(&lit("\"")).is_some());
        assert_eq!(scanner.parse(&integer(digits())), Some(Value::Int(123)));

        // The closing quote is not there yet.
        assert_eq!(scanner.parse(&lit("\"")), None);
        assert_eq!(scanner.state(), ScannerState::Failed);
        assert_eq!(scanner.position(), 4);

        let mut recovery = scanner.error_recovery();
        assert!(recovery.discard(&find(vec![lit("\"")]).into()));
        recovery.finish();

        assert!(scanner.parse(&lit("\"")).is_some());
        assert!(scanner.is_at_eof());
        assert_eq!(scanner.error_count(), 1);
        assert!(scanner.finish());

        assert_matches!(
            &handler.errors[..],
            [diag] if matches!(
                &diag.error.kind,
                ErrorKind::ExpectedLiteral { literal, .. } if &**literal == "\""
            ) && diag.error.position() == 4
        );
    }

    #[test]
    fn branch_condition_failure_consumes_nothing() {
        let grammar = Grammar::builder().build();
        let mut handler = CollectErrors::default();
        let mut scanner = scan(Reader::from_str("abx"), &grammar, &mut handler);

        assert!(!scanner.branch(&lit("abc")));
        assert_eq!(scanner.position(), 0);
        assert_eq!(scanner.error_count(), 0);
        assert!(scanner.branch(&lit("ab")));
        assert_eq!(scanner.position(), 2);
    }

    #[test]
    fn failed_scanner_is_idempotent() {
        let grammar = Grammar::builder().build();
        let mut handler = CollectErrors::default();
        let mut scanner = scan(Reader::from_str("xyz"), &grammar, &mut handler);

        assert_eq!(scanner.parse(&lit("a")), None);
        let pos = scanner.position();
        let errors = scanner.error_count();
        assert_eq!(scanner.parse(&lit("x")), None);
        assert!(!scanner.branch(&lit("x")));
        assert_eq!(scanner.position(), pos);
        assert_eq!(scanner.error_count(), errors);
    }

    #[test]
    fn parsing_is_deterministic() {
        let rule = || {
            terminator(lit(".")).list_sep(lit("abc") | lit("123"), sep(lit(",")))
        };
        let first = parse_str(rule() + eof(), "abc,12,abc123,123.");
        let second = parse_str(rule() + eof(), "abc,12,abc123,123.");
        assert_eq!(first.value, second.value);
        assert_eq!(first.errors, second.errors);
    }

    #[test]
    fn earlier_alternative_shadows_later() {
        let rule = capture(lit("ab")) | capture(lit("a"));
        let result = parse_str(rule, "ab");
        assert_eq!(result.value, Some(Value::Lexeme(Span::new(0, 2))));
    }

    #[test]
    fn literal_set_longest_match() {
        let rule = capture(literal_set(&["in", "int", "integer"]));
        let result = parse_str(rule.clone(), "integers");
        assert_eq!(result.value, Some(Value::Lexeme(Span::new(0, 7))));
        let result = parse_str(rule, "inline");
        assert_eq!(result.value, Some(Value::Lexeme(Span::new(0, 2))));
    }

    #[test]
    fn keyword_refuses_identifier_continuation() {
        let ident = identifier(ascii::alpha(), ascii::word());
        let rule = keyword("int", &ident);

        assert!(parse_str(rule.clone() + eof(), "int").is_success());

        let result = parse_str(rule, "integer");
        assert_matches!(
            &result.errors[..],
            [diag] if matches!(&diag.error.kind, ErrorKind::ExpectedKeyword { keyword } if &**keyword == "int")
                && diag.error.span == Span::new(0, 3)
        );
    }

    #[test]
    fn direct_symbols_use_longest_match() {
        let table = Arc::new(
            SymbolTable::new()
                .map("+", Value::Int(1))
                .map("++", Value::Int(2)),
        );
        let result = parse_str(symbol(&table), "++");
        assert_eq!(result.value, Some(Value::Int(2)));
    }

    #[test]
    fn whitespace_between_tokens() {
        let mut builder = Grammar::builder();
        let id = builder.add(
            Production::new("pair", lit("a") + lit("b") + eof())
                .whitespace(while_(ascii::blank().into())),
        );
        let grammar = builder.build();

        assert!(matches(Reader::from_str("a \t b "), &grammar, id));
        assert!(matches(Reader::from_str("ab"), &grammar, id));
        assert!(matches(Reader::from_str("  ab"), &grammar, id));
    }

    #[test]
    fn token_productions_suspend_whitespace() {
        let mut builder = Grammar::builder();
        let word = builder.declare("word");
        let outer = builder.add(
            Production::new("outer", p(word) + p(word) + eof())
                .whitespace(while_(ascii::blank().into())),
        );
        builder.define(word, Production::new("word", lit("a") + lit("b")).token());
        let grammar = builder.build();

        assert!(matches(Reader::from_str("ab ab"), &grammar, outer));
        // A space inside the token production is not skipped.
        assert!(!matches(Reader::from_str("a b ab"), &grammar, outer));
    }

    #[test]
    fn no_whitespace_scopes_suspension() {
        let mut builder = Grammar::builder();
        let id = builder.add(
            Production::new("rule", lit("x") + no_whitespace(lit("a") + lit("b")) + eof())
                .whitespace(while_(ascii::blank().into())),
        );
        let grammar = builder.build();

        assert!(matches(Reader::from_str("x ab"), &grammar, id));
        assert!(!matches(Reader::from_str("x a b"), &grammar, id));
    }

    #[test]
    fn no_whitespace_token_events_inside_token_productions() {
        let rule = lit("a") + lit("b");
        let mut builder = Grammar::builder();
        let id = builder.add(
            Production::new("inner", rule)
                .token()
                .whitespace(while_(ascii::blank().into())),
        );
        let grammar = builder.build();
        let mut handler = CollectEvents::default();
        let value = parse_with(
            Reader::from_str("ab"),
            &grammar,
            id,
            &mut handler,
            None,
            &ParseOptions::default(),
        );
        assert!(value.is_some());
        assert!(!handler
            .events
            .iter()
            .any(|event| matches!(event, Event::Token { kind: TokenKind::Whitespace, .. })));
    }

    #[test]
    fn inlined_productions_use_the_outer_whitespace() {
        let mut builder = Grammar::builder();
        let inner = builder.add(
            Production::new("inner", lit("a") + lit("b"))
                .whitespace(while_(lit("."))),
        );
        let by_inline = builder.add(
            Production::new("by_inline", lit("x") + inline(inner) + eof())
                .whitespace(while_(ascii::blank().into())),
        );
        let by_recursion = builder.add(
            Production::new("by_recursion", lit("x") + p(inner) + eof())
                .whitespace(while_(ascii::blank().into())),
        );
        let grammar = builder.build();

        // Inlining ignores the inner whitespace rule.
        assert!(matches(Reader::from_str("x a b"), &grammar, by_inline));
        assert!(!matches(Reader::from_str("x a.b"), &grammar, by_inline));

        // A production frame installs it.
        assert!(matches(Reader::from_str("x a.b"), &grammar, by_recursion));
    }

    #[test]
    fn capture_covers_the_consumed_range() {
        let rule = capture(lit("ab") + Rule::from(digits()));
        let result = parse_str(rule, "ab123x");
        assert_eq!(result.value, Some(Value::Lexeme(Span::new(0, 5))));
    }

    #[test]
    fn opt_produces_the_nil_sentinel() {
        let rule = opt(capture(lit("a"))) + lit("b");
        let result = parse_str(rule.clone(), "ab");
        assert_eq!(result.value, Some(Value::Lexeme(Span::new(0, 1))));
        let result = parse_str(rule, "b");
        assert_eq!(result.value, Some(Value::Nil));
    }

    #[test]
    fn lists_with_separators() {
        let item = capture(lit("x"));
        let rule = list_sep(item.clone(), sep(lit(","))) + eof();
        let input = "x,x,x";
        let result = parse_str(rule, input);
        assert!(result.is_success());
        assert_eq!(lexeme_strs(input, result.value.as_ref().unwrap()), ["x", "x", "x"]);

        let rule = list_sep(item, trailing_sep(lit(","))) + lit(";") + eof();
        let input = "x,x,;";
        let result = parse_str(rule, input);
        assert!(result.is_success());
        assert_eq!(lexeme_strs(input, result.value.as_ref().unwrap()), ["x", "x"]);
    }

    #[test]
    fn trailing_separator_before_terminator_is_reported() {
        let rule = terminator(lit(".")).list_sep(capture(lit("x")), sep(lit(","))) + eof();
        let result = parse_str(rule, "x,x,.");
        assert!(result.value.is_some());
        assert_matches!(
            &result.errors[..],
            [diag] if diag.error.kind == ErrorKind::UnexpectedTrailingSeparator
        );
    }

    #[test]
    fn brackets_compose_with_lists() {
        let rule = parenthesized().opt_list_sep(capture(lit("v")), sep(lit(","))) + eof();
        let input = "(v,v)";
        let result = parse_str(rule.clone(), input);
        assert!(result.is_success());
        assert_eq!(lexeme_strs(input, result.value.as_ref().unwrap()), ["v", "v"]);

        let result = parse_str(rule, "()");
        assert!(result.is_success());
    }

    #[test]
    fn recovery_respects_limits() {
        let recovery = recover(vec![lit(";")]).limit(vec![lit("}")]);
        let rule = try_recover(lit("x"), recovery) + lit("y") + eof();

        // The failure recovers to the `;`, which the recovery rule consumes.
        let result = parse_str(rule.clone(), "ab;y");
        assert!(result.value.is_some());
        assert_eq!(result.errors.len(), 1);

        // The limit aborts recovery and the failure propagates.
        let result = parse_str(rule, "ab}y");
        assert_eq!(result.value, None);
    }

    #[test]
    fn try_without_recovery_continues() {
        let rule = try_(lit("a")) + lit("b") + eof();
        let result = parse_str(rule, "b");
        assert!(result.value.is_some());
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn peeks_do_not_consume() {
        let rule = peek(lit("ab")) + capture(code_point());
        let result = parse_str(rule, "ab");
        assert_eq!(result.value, Some(Value::Lexeme(Span::new(0, 1))));

        let rule = (peek_not(lit("a")) >> lit("b")) | lit("a");
        assert!(parse_str(rule.clone(), "a").is_success());
        assert!(parse_str(rule, "b").is_success());
    }

    #[test]
    fn context_counter_tracks_repetitions() {
        let counter = context_counter("as");
        let rule = counter.create(0)
            + while_(lit("a") >> counter.inc())
            + counter.require(3, "expected exactly three")
            + counter.value()
            + eof();

        let result = parse_str(rule.clone(), "aaa");
        assert_eq!(result.value, Some(Value::Int(3)));

        let result = parse_str(rule, "aa");
        assert_matches!(
            &result.errors[..],
            [diag] if matches!(
                &diag.error.kind,
                ErrorKind::Unexpected { label } if &**label == "expected exactly three"
            )
        );
    }

    #[test]
    fn integer_rules_check_overflow_and_leading_zeros() {
        let result = parse_str(integer(digits()), "123");
        assert_eq!(result.value, Some(Value::Int(123)));

        let result = parse_str(integer(digits()), "99999999999999999999");
        assert_matches!(
            &result.errors[..],
            [diag] if diag.error.kind == ErrorKind::IntegerOverflow
        );

        let result = parse_str(integer(digits().no_leading_zero()), "0123");
        assert_matches!(
            &result.errors[..],
            [diag] if diag.error.kind == ErrorKind::ForbiddenLeadingZero
                && diag.error.span == Span::new(0, 1)
        );

        let result = parse_str(integer(digits().no_leading_zero()) + eof(), "0");
        assert!(result.is_success());

        let result = parse_str(integer(digits().sep(lit("'"))) + eof(), "1'000'000");
        assert_eq!(result.value, Some(Value::Int(1_000_000)));
    }

    #[test]
    fn signs_produce_signums() {
        let rule = sign() + integer(digits());
        let result = parse_str(rule.clone(), "-42");
        assert_eq!(
            result.value,
            Some(Value::List(vec![Value::Int(-1), Value::Int(42)]))
        );
        let result = parse_str(rule, "42");
        assert_eq!(
            result.value,
            Some(Value::List(vec![Value::Int(1), Value::Int(42)]))
        );
    }

    #[test]
    fn until_scans_past_the_token() {
        let rule = capture(Rule::from(until(newline())));
        let result = parse_str(rule, "abc\ndef");
        assert_eq!(result.value, Some(Value::Lexeme(Span::new(0, 4))));

        let rule = capture(Rule::from(until(lit("*/")).or_eof()));
        let result = parse_str(rule, "comment");
        assert_eq!(result.value, Some(Value::Lexeme(Span::new(0, 7))));
    }

    #[test]
    fn production_callback_receives_the_pack() {
        let sum = Callback::pure(|args| {
            Value::Int(args.iter().filter_map(Value::as_int).sum())
        });
        let mut builder = Grammar::builder();
        let id = builder.add(
            Production::new(
                "sum",
                integer(digits()) + lit("+") + integer(digits()) + eof(),
            )
            .value(sum),
        );
        let grammar = builder.build();

        let result = parse(Reader::from_str("1+2"), &grammar, id);
        assert_eq!(result.value, Some(Value::Int(3)));
    }

    #[test]
    fn production_sink_feeds_the_list_rule() {
        let count = Callback::pure(|args| {
            Value::Int(args[0].as_list().map_or(0, |items| items.len()) as i64)
        });
        let mut builder = Grammar::builder();
        let id = builder.add(
            Production::new("count", list(capture(lit("a"))) + eof())
                .value(as_list() >> count),
        );
        let grammar = builder.build();

        let result = parse(Reader::from_str("aaa"), &grammar, id);
        assert_eq!(result.value, Some(Value::Int(3)));
    }

    #[test]
    fn transparent_productions_emit_no_events() {
        let mut builder = Grammar::builder();
        let inner = builder.add(Production::new("inner", lit("a")).transparent());
        let outer = builder.add(Production::new("outer", p(inner) + eof()));
        let grammar = builder.build();

        let mut handler = CollectEvents::default();
        let value = parse_with(
            Reader::from_str("a"),
            &grammar,
            outer,
            &mut handler,
            None,
            &ParseOptions::default(),
        );
        assert!(value.is_some());
        assert!(!handler.events.iter().any(|event| matches!(
            event,
            Event::ProductionStart { production: "inner", .. }
        )));
    }

    #[test]
    fn subgrammars_parse_with_their_own_productions() {
        let mut builder = Grammar::builder();
        let word = builder.add(Production::new("word", lit("ok")));
        let inner_grammar = Arc::new(builder.build());

        let rule = lit("<") + subgrammar(&inner_grammar, word) + lit(">") + eof();
        assert!(parse_str(rule, "<ok>").is_success());
    }

    #[test]
    fn return_finishes_the_production_early() {
        let rule = lit("a") + (lit("!") >> return_() | lit("-")) + lit("b") + eof();
        assert!(parse_str(rule.clone(), "a-b").is_success());
        // The `!` path returns before `b` is required.
        assert!(parse_str(rule, "a!").is_success());
    }

    #[test]
    fn effects_mutate_the_parse_state() {
        let bump = effect(|state| {
            if let Some(state) = state {
                if let Some(count) = state.downcast_mut::<i32>() {
                    *count += 1;
                }
            }
        });
        let (grammar, id) = single(while_(lit("a") >> bump) + eof());
        let mut count = 0i32;
        let result = parse_with_state(Reader::from_str("aaaa"), &grammar, id, &mut count);
        assert!(result.is_success());
        assert_eq!(count, 4);
    }

    #[test]
    fn recursion_limit_is_reported() {
        let mut builder = Grammar::builder();
        let loopy = builder.declare("loopy");
        builder.define(loopy, Production::new("loopy", lit("(") >> p(loopy) | lit("x")));
        let grammar = builder.build();

        let deep = "(".repeat(64);
        let mut handler = CollectErrors::default();
        let value = parse_with(
            Reader::from_str(&deep),
            &grammar,
            loopy,
            &mut handler,
            None,
            &ParseOptions::default().max_recursion_depth(16),
        );
        assert_eq!(value, None);
        assert!(handler
            .errors
            .iter()
            .any(|diag| diag.error.kind == ErrorKind::RecursionLimitExceeded));
    }

    #[test]
    fn utf16_inputs_share_the_grammar() {
        let rule = lit("héllo") + eof();
        let (grammar, id) = single(rule);

        let units: Vec<u16> = "héllo".encode_utf16().collect();
        assert!(matches(Reader::<Utf16>::from_units(&units), &grammar, id));

        let units: Vec<u16> = "hello".encode_utf16().collect();
        assert!(!matches(Reader::<Utf16>::from_units(&units), &grammar, id));
    }

    #[test]
    fn case_folded_literals() {
        let rule = ascii_case_folding(lit("select")) + eof();
        assert!(parse_str(rule.clone(), "SELECT").is_success());
        assert!(parse_str(rule.clone(), "Select").is_success());
        assert!(!parse_str(rule, "selekt").is_success());
    }

    #[test]
    fn trace_renders_the_event_stream() {
        let mut builder = Grammar::builder();
        let id = builder.add(
            Production::new("greeting", lit("hi") + eof())
                .whitespace(while_(ascii::blank().into())),
        );
        let grammar = builder.build();

        let mut out = String::new();
        trace(Reader::from_str("hi "), &grammar, id, &mut out).unwrap();
        assert!(out.contains("greeting: @0"));
        assert!(out.contains("literal: \"hi\" @0..2"));
        assert!(out.contains("= finish"));
    }
}
