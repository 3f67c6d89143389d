//! The rule interpreter.
//!
//! Rules execute against a [`Ctx`] (control block) and a [`Reader`]. Token
//! rules follow the try-match protocol: they either succeed and advance the
//! reader or fail and leave it untouched. Composite rules are flattened
//! continuation chains; a branch decides commitment in [`try_branch`] and,
//! once committed, failures no longer fall through to other alternatives.

use std::any::Any;

use crate::{
    callback::{self, Sink, SinkSpec, Value, ValueSpec},
    encoding::Encoding,
    error::{Diagnostic, ErrorKind, ParseError},
    event::{Event, Handler, TokenKind},
    grammar::{Grammar, ProdId},
    reader::{Reader, Span},
    rule::{EscapeAction, Node, Rule, Sep},
    text,
    trie::TrieMatch,
};

/// Outcome of attempting a rule as a branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BranchResult {
    /// The branch was not taken; the reader is unchanged.
    Backtracked,
    /// The branch committed; the payload is whether its body succeeded.
    Committed(bool),
}

use BranchResult::{Backtracked, Committed};

pub(crate) struct Frame {
    pub(crate) production: &'static str,
    transparent: bool,
    ws: Option<Rule>,
    ws_suspended: bool,
    sink: Option<SinkSpec>,
    vars_base: usize,
}

/// The per-action control block.
pub(crate) struct Ctx<'p> {
    pub(crate) grammar: &'p Grammar,
    pub(crate) handler: &'p mut dyn Handler,
    pub(crate) state: Option<&'p mut dyn Any>,
    pub(crate) frames: Vec<Frame>,
    vars: Vec<(&'static str, Value)>,
    in_ws: bool,
    no_ws_depth: usize,
    quiet: u32,
    returning: bool,
    pub(crate) depth_limit: usize,
    pub(crate) error_count: usize,
}

impl<'p> Ctx<'p> {
    pub(crate) fn new(
        grammar: &'p Grammar,
        handler: &'p mut dyn Handler,
        state: Option<&'p mut dyn Any>,
        depth_limit: usize,
    ) -> Self {
        Ctx {
            grammar,
            handler,
            state,
            frames: vec![],
            vars: vec![],
            in_ws: false,
            no_ws_depth: 0,
            quiet: 0,
            returning: false,
            depth_limit,
            error_count: 0,
        }
    }

    pub(crate) fn emit(&mut self, event: Event) {
        if self.quiet == 0 {
            self.handler.on_event(event);
        }
    }

    fn emit_token(&mut self, kind: TokenKind, span: Span) {
        if !self.in_ws {
            self.emit(Event::Token { kind, span });
        }
    }

    pub(crate) fn report(&mut self, error: ParseError) {
        if self.quiet > 0 {
            return;
        }
        self.error_count += 1;
        let production = self
            .frames
            .iter()
            .rev()
            .find(|frame| !frame.transparent)
            .map_or("<root>", |frame| frame.production);
        self.handler.on_event(Event::Error(Diagnostic { production, error }));
    }

    fn var_mut(&mut self, id: &'static str) -> &mut Value {
        self.vars
            .iter_mut()
            .rev()
            .find(|(name, _)| *name == id)
            .map(|(_, value)| value)
            .unwrap_or_else(|| panic!("context variable {id:?} was not created"))
    }

    fn push_frame(&mut self, production: &crate::grammar::Production) {
        let parent = self.frames.last();
        let ws = production
            .whitespace
            .clone()
            .or_else(|| parent.and_then(|frame| frame.ws.clone()));
        let ws_suspended =
            parent.is_some_and(|frame| frame.ws_suspended) || production.token_production;
        self.frames.push(Frame {
            production: production.name,
            transparent: production.transparent,
            ws,
            ws_suspended,
            sink: production.value.as_ref().and_then(|v| v.sink().cloned()),
            vars_base: self.vars.len(),
        });
    }

    fn pop_frame(&mut self) {
        let frame = self.frames.pop().expect("unbalanced production frames");
        self.vars.truncate(frame.vars_base);
    }

    /// Installs a synthetic root frame; used by the scanner.
    pub(crate) fn push_scan_frame(&mut self, name: &'static str, ws: Option<Rule>) {
        self.frames.push(Frame {
            production: name,
            transparent: false,
            ws,
            ws_suspended: false,
            sink: None,
            vars_base: self.vars.len(),
        });
    }

    fn build_sink(&mut self) -> Box<dyn Sink> {
        let spec = self.frames.last().and_then(|frame| frame.sink.clone());
        match spec {
            Some(spec) => spec.build(self.state.as_deref_mut()),
            None => callback::as_list().build(None),
        }
    }
}

//=== whitespace ===//

/// Runs the active whitespace rule to exhaustion.
///
/// Consumes input but emits no events; the caller turns the consumed span
/// into a whitespace token event once the following token is known to be
/// taken. Returns `false` if the whitespace rule itself failed irrecoverably.
fn skip_ws<E: Encoding>(ctx: &mut Ctx, reader: &mut Reader<E>) -> bool {
    if ctx.in_ws || ctx.no_ws_depth > 0 {
        return true;
    }
    let ws = match ctx.frames.last() {
        Some(frame) if !frame.ws_suspended => match &frame.ws {
            Some(ws) => ws.clone(),
            None => return true,
        },
        _ => return true,
    };

    ctx.in_ws = true;
    let ok = run_ws_rule(&ws, ctx, reader);
    ctx.in_ws = false;
    ok
}

fn run_ws_rule<E: Encoding>(ws: &Rule, ctx: &mut Ctx, reader: &mut Reader<E>) -> bool {
    let mut scratch = vec![];
    loop {
        let mark = reader.current();
        match try_branch(ws, ctx, reader, &mut scratch) {
            Backtracked => break true,
            Committed(false) => break false,
            Committed(true) => {
                scratch.clear();
                if reader.position() == mark.position() {
                    break true;
                }
            }
        }
    }
}

//=== token matching ===//

struct TokenMatch {
    span: Span,
    kind: TokenKind,
    values: Vec<Value>,
}

impl TokenMatch {
    fn plain(span: Span, kind: TokenKind) -> Self {
        TokenMatch {
            span,
            kind,
            values: vec![],
        }
    }
}

fn is_token_node(node: &Node) -> bool {
    match node {
        Node::Lit { .. }
        | Node::Keyword { .. }
        | Node::LitSet { .. }
        | Node::Class(_)
        | Node::CodePoint
        | Node::Eof
        | Node::Eol
        | Node::Newline
        | Node::Position
        | Node::Identifier { .. }
        | Node::Digits { .. }
        | Node::NDigits { .. }
        | Node::Integer { .. }
        | Node::Sign
        | Node::PlusSign
        | Node::MinusSign
        | Node::Until { .. }
        | Node::Symbol { .. } => true,
        Node::WithKind { inner, .. } => is_token_node(inner.node()),
        _ => false,
    }
}

fn unwrap_kind(rule: &Rule) -> (&Node, Option<TokenKind>) {
    let mut node = rule.node();
    let mut kind = None;
    while let Node::WithKind { kind: k, inner } = node {
        kind.get_or_insert(*k);
        node = inner.node();
    }
    (node, kind)
}

fn digit_class_name(radix: u32) -> Box<str> {
    match radix {
        2 => "digit.binary".into(),
        8 => "digit.octal".into(),
        10 => "digit.decimal".into(),
        16 => "digit.hex".into(),
        _ => format!("digit.base{radix}").into(),
    }
}

fn expected_class(pos: usize, name: &str) -> ParseError {
    ParseError::at(
        pos,
        ErrorKind::ExpectedCharClass { class: name.into() },
    )
}

/// Matches a token rule at the reader position.
///
/// On success the reader is advanced past the token; on failure it is reset
/// to where it started and the returned error describes the mismatch. The
/// error is only reported by the caller when the token was required.
fn match_token_raw<E: Encoding>(node: &Node, reader: &mut Reader<E>) -> Result<TokenMatch, ParseError> {
    let begin = reader.current();
    let pos = begin.position();

    match node {
        Node::Lit { text, fold, units } => {
            let units = units.get::<E>(text);
            match_units(reader, units, *fold).map_err(|matched| {
                reader.reset(begin);
                ParseError::new(
                    Span::new(pos, pos + matched),
                    ErrorKind::ExpectedLiteral {
                        literal: text.clone(),
                        matched,
                        length: units.len(),
                    },
                )
            })?;
            Ok(TokenMatch::plain(
                Span::new(pos, reader.position()),
                TokenKind::Literal,
            ))
        }

        Node::Keyword {
            text,
            trailing,
            fold,
            units,
        } => {
            let units = units.get::<E>(text);
            match_units(reader, units, *fold).map_err(|matched| {
                reader.reset(begin);
                ParseError::new(
                    Span::new(pos, pos + matched),
                    ErrorKind::ExpectedLiteral {
                        literal: text.clone(),
                        matched,
                        length: units.len(),
                    },
                )
            })?;
            let end = reader.position();
            if let Ok((c, _)) = reader.decode() {
                if trailing.matches(c) {
                    reader.reset(begin);
                    return Err(ParseError::new(
                        Span::new(pos, end),
                        ErrorKind::ExpectedKeyword {
                            keyword: text.clone(),
                        },
                    ));
                }
            }
            Ok(TokenMatch::plain(Span::new(pos, end), TokenKind::Literal))
        }

        Node::LitSet {
            entries,
            fold,
            tries,
        } => {
            let trie = tries.get::<E>(|| {
                let mut trie = crate::trie::Trie::new(*fold);
                for (idx, entry) in entries.iter().enumerate() {
                    trie.insert(&crate::trie::encode_str::<E>(entry), idx, None);
                }
                trie
            });
            match trie.walk(reader) {
                TrieMatch::Match { .. } => Ok(TokenMatch::plain(
                    Span::new(pos, reader.position()),
                    TokenKind::Literal,
                )),
                TrieMatch::NoMatch { prefix_len } => Err(ParseError::new(
                    Span::new(pos, pos + prefix_len),
                    ErrorKind::ExpectedLiteralSet,
                )),
            }
        }

        Node::Class(class) => match reader.decode() {
            Ok((c, len)) if class.matches(c) => {
                reader.bump_by(len);
                Ok(TokenMatch::plain(
                    Span::new(pos, reader.position()),
                    TokenKind::Unknown,
                ))
            }
            _ => Err(expected_class(pos, class.name())),
        },

        Node::CodePoint => match reader.decode() {
            Ok((_, len)) => {
                reader.bump_by(len);
                Ok(TokenMatch::plain(
                    Span::new(pos, reader.position()),
                    TokenKind::Unknown,
                ))
            }
            Err((error, skip)) => Err(ParseError::new(
                Span::new(pos, pos + skip),
                ErrorKind::InvalidCodePoint(error),
            )),
        },

        Node::Eof => {
            if reader.is_at_eof() {
                Ok(TokenMatch::plain(Span::empty(pos), TokenKind::Eof))
            } else {
                Err(expected_class(pos, "EOF"))
            }
        }

        Node::Newline => match_newline(reader)
            .map(|end| TokenMatch::plain(Span::new(pos, end), TokenKind::Eol))
            .ok_or_else(|| expected_class(pos, "newline")),

        Node::Eol => {
            if reader.is_at_eof() {
                Ok(TokenMatch::plain(Span::empty(pos), TokenKind::Eol))
            } else {
                match_newline(reader)
                    .map(|end| TokenMatch::plain(Span::new(pos, end), TokenKind::Eol))
                    .ok_or_else(|| expected_class(pos, "EOL"))
            }
        }

        Node::Position => Ok(TokenMatch {
            span: Span::empty(pos),
            kind: TokenKind::Position,
            values: vec![Value::Pos(pos)],
        }),

        Node::Identifier { head, tail } => {
            match reader.decode() {
                Ok((c, len)) if head.matches(c) => reader.bump_by(len),
                _ => return Err(expected_class(pos, head.name())),
            }
            while let Ok((c, len)) = reader.decode() {
                if !tail.matches(c) {
                    break;
                }
                reader.bump_by(len);
            }
            let span = Span::new(pos, reader.position());
            Ok(TokenMatch {
                span,
                kind: TokenKind::Identifier,
                values: vec![Value::Lexeme(span)],
            })
        }

        Node::Digits {
            radix,
            sep,
            no_leading_zero,
        } => {
            match_digits(reader, *radix, sep.as_ref(), *no_leading_zero, None).map(|_| {
                TokenMatch::plain(Span::new(pos, reader.position()), TokenKind::Digits)
            })
        }

        Node::NDigits { n, radix } => {
            for _ in 0..*n {
                match reader.peek().and_then(|u| text::digit_value(u, *radix)) {
                    Some(_) => reader.bump(),
                    None => {
                        let err = expected_class(reader.position(), &digit_class_name(*radix));
                        reader.reset(begin);
                        return Err(err);
                    }
                }
            }
            Ok(TokenMatch::plain(
                Span::new(pos, reader.position()),
                TokenKind::Digits,
            ))
        }

        Node::Integer {
            radix,
            sep,
            no_leading_zero,
        } => {
            // Plain decimal runs go through the word-at-a-time scanner.
            if *radix == 10 && sep.is_none() {
                let (value, offset) = text::ascii_digits::<i64, E>(reader, 0);
                if offset == 0 {
                    return Err(expected_class(pos, "digit.decimal"));
                }
                if *no_leading_zero && offset > 1 && reader.peek() == Some(0x30) {
                    return Err(ParseError::new(
                        Span::new(pos, pos + 1),
                        ErrorKind::ForbiddenLeadingZero,
                    ));
                }
                reader.bump_by(offset);
                let span = Span::new(pos, reader.position());
                return match value {
                    Some(value) => Ok(TokenMatch {
                        span,
                        kind: TokenKind::Digits,
                        values: vec![Value::Int(value)],
                    }),
                    None => {
                        reader.reset(begin);
                        Err(ParseError::new(span, ErrorKind::IntegerOverflow))
                    }
                };
            }

            let mut digits = vec![];
            match_digits(reader, *radix, sep.as_ref(), *no_leading_zero, Some(&mut digits))?;
            let span = Span::new(pos, reader.position());
            match text::accumulate::<i64>(digits, *radix) {
                Some(value) => Ok(TokenMatch {
                    span,
                    kind: TokenKind::Digits,
                    values: vec![Value::Int(value)],
                }),
                None => {
                    reader.reset(begin);
                    Err(ParseError::new(span, ErrorKind::IntegerOverflow))
                }
            }
        }

        Node::Sign => {
            let value = match reader.peek() {
                Some(0x2B) => {
                    reader.bump();
                    1
                }
                Some(0x2D) => {
                    reader.bump();
                    -1
                }
                _ => 1,
            };
            Ok(TokenMatch {
                span: Span::new(pos, reader.position()),
                kind: TokenKind::Unknown,
                values: vec![Value::Int(value)],
            })
        }

        Node::PlusSign => match reader.peek() {
            Some(0x2B) => {
                reader.bump();
                Ok(TokenMatch {
                    span: Span::new(pos, reader.position()),
                    kind: TokenKind::Unknown,
                    values: vec![Value::Int(1)],
                })
            }
            _ => Err(expected_class(pos, "sign.plus")),
        },

        Node::MinusSign => match reader.peek() {
            Some(0x2D) => {
                reader.bump();
                Ok(TokenMatch {
                    span: Span::new(pos, reader.position()),
                    kind: TokenKind::Unknown,
                    values: vec![Value::Int(-1)],
                })
            }
            _ => Err(expected_class(pos, "sign.minus")),
        },

        Node::Until { token, or_eof } => {
            let (inner, _) = unwrap_kind(token);
            loop {
                match match_token_raw(inner, reader) {
                    Ok(hit) => {
                        break Ok(TokenMatch::plain(
                            Span::new(pos, hit.span.end),
                            TokenKind::Unknown,
                        ))
                    }
                    Err(err) => {
                        if reader.is_at_eof() {
                            if *or_eof {
                                break Ok(TokenMatch::plain(
                                    Span::new(pos, reader.position()),
                                    TokenKind::Unknown,
                                ));
                            }
                            reader.reset(begin);
                            break Err(err);
                        }
                        reader.bump();
                    }
                }
            }
        }

        Node::Symbol { table, pattern } => match pattern {
            None => match table.trie_for::<E>().walk(reader) {
                TrieMatch::Match { value } => {
                    let span = Span::new(pos, reader.position());
                    Ok(TokenMatch {
                        span,
                        kind: TokenKind::Literal,
                        values: vec![table.value(value).clone()],
                    })
                }
                TrieMatch::NoMatch { prefix_len } => Err(ParseError::new(
                    Span::new(pos, pos + prefix_len),
                    ErrorKind::ExpectedLiteralSet,
                )),
            },
            Some(pattern) => {
                let (pattern_node, _) = unwrap_kind(pattern);
                let hit = match_token_raw(pattern_node, reader)?;
                let mut lexeme = Reader::<E>::new(reader.slice(hit.span));
                match table.trie_for::<E>().walk(&mut lexeme) {
                    TrieMatch::Match { value } if lexeme.is_at_eof() => Ok(TokenMatch {
                        span: hit.span,
                        kind: TokenKind::Literal,
                        values: vec![table.value(value).clone()],
                    }),
                    _ => {
                        reader.reset(begin);
                        Err(ParseError::new(hit.span, ErrorKind::ExpectedLiteralSet))
                    }
                }
            }
        },

        Node::WithKind { .. } => unreachable!("kind wrappers are unwrapped by the caller"),

        // Until, digit separators, symbol patterns and delimited content are
        // restricted to token rules; reaching this is a grammar bug.
        _ => panic!("expected a token rule"),
    }
}

/// Matches a literal's code units, returning the matched prefix length on
/// failure. The reader is left after the matched prefix; the caller resets.
fn match_units<E: Encoding>(
    reader: &mut Reader<E>,
    units: &[u32],
    fold: bool,
) -> Result<(), usize> {
    for (idx, &unit) in units.iter().enumerate() {
        let expected = fold_unit(unit, fold);
        match reader.peek() {
            Some(have) if fold_unit(have, fold) == expected => reader.bump(),
            _ => return Err(idx),
        }
    }
    Ok(())
}

#[inline]
fn fold_unit(unit: u32, fold: bool) -> u32 {
    if fold && (0x41..=0x5A).contains(&unit) {
        unit + 0x20
    } else {
        unit
    }
}

fn match_newline<E: Encoding>(reader: &mut Reader<E>) -> Option<usize> {
    match reader.peek() {
        Some(0x0A) => {
            reader.bump();
            Some(reader.position())
        }
        Some(0x0D) if reader.peek_at(1) == Some(0x0A) => {
            reader.bump_by(2);
            Some(reader.position())
        }
        _ => None,
    }
}

fn match_digits<E: Encoding>(
    reader: &mut Reader<E>,
    radix: u32,
    sep: Option<&Rule>,
    no_leading_zero: bool,
    mut collect: Option<&mut Vec<u32>>,
) -> Result<(), ParseError> {
    let begin = reader.current();
    let pos = begin.position();

    let first = match reader.peek().and_then(|u| text::digit_value(u, radix)) {
        Some(digit) => digit,
        None => return Err(expected_class(pos, &digit_class_name(radix))),
    };
    reader.bump();
    if let Some(collect) = collect.as_deref_mut() {
        collect.push(first);
    }

    if no_leading_zero
        && first == 0
        && reader
            .peek()
            .and_then(|u| text::digit_value(u, radix))
            .is_some()
    {
        reader.reset(begin);
        return Err(ParseError::new(
            Span::new(pos, pos + 1),
            ErrorKind::ForbiddenLeadingZero,
        ));
    }

    loop {
        if let Some(digit) = reader.peek().and_then(|u| text::digit_value(u, radix)) {
            reader.bump();
            if let Some(collect) = collect.as_deref_mut() {
                collect.push(digit);
            }
            continue;
        }
        if let Some(sep) = sep {
            let before_sep = reader.current();
            let (sep_node, _) = unwrap_kind(sep);
            if match_token_raw(sep_node, reader).is_ok() {
                match reader.peek().and_then(|u| text::digit_value(u, radix)) {
                    Some(digit) => {
                        reader.bump();
                        if let Some(collect) = collect.as_deref_mut() {
                            collect.push(digit);
                        }
                        continue;
                    }
                    None => {
                        // A separator not followed by a digit is not part of
                        // the token.
                        reader.reset(before_sep);
                        break;
                    }
                }
            }
        }
        break;
    }
    Ok(())
}

/// Parses a token rule with whitespace handling and event emission.
fn parse_token<E: Encoding>(
    rule: &Rule,
    ctx: &mut Ctx,
    reader: &mut Reader<E>,
    args: &mut Vec<Value>,
    required: bool,
) -> bool {
    let (node, kind_override) = unwrap_kind(rule);
    let pre = reader.current();
    if !skip_ws(ctx, reader) {
        reader.reset(pre);
        return false;
    }
    let ws_span = Span::new(pre.position(), reader.position());

    match match_token_raw(node, reader) {
        Ok(hit) => {
            if !ws_span.is_empty() {
                ctx.emit_token(TokenKind::Whitespace, ws_span);
            }
            ctx.emit_token(kind_override.unwrap_or(hit.kind), hit.span);
            args.extend(hit.values);
            true
        }
        Err(error) => {
            if required {
                if !ws_span.is_empty() {
                    ctx.emit_token(TokenKind::Whitespace, ws_span);
                }
                ctx.report(error);
                false
            } else {
                reader.reset(pre);
                false
            }
        }
    }
}

//=== probes ===//

/// Speculatively runs a rule as a branch on a copy of the reader.
///
/// Returns the end position of the match. No events are emitted and no
/// errors are reported.
fn probe<E: Encoding>(rule: &Rule, ctx: &mut Ctx, reader: &Reader<E>) -> Option<usize> {
    let mut copy = *reader;
    let mut scratch = vec![];
    ctx.quiet += 1;
    let result = try_branch(rule, ctx, &mut copy, &mut scratch);
    ctx.quiet -= 1;
    match result {
        Committed(true) => Some(copy.position()),
        _ => None,
    }
}

/// Speculative match for the scanner's `peek`.
pub(crate) fn probe_rule<E: Encoding>(
    rule: &Rule,
    ctx: &mut Ctx,
    reader: &Reader<E>,
) -> Option<usize> {
    probe(rule, ctx, reader)
}

/// Whether a synchronization token matches at the current position, without
/// consuming it or emitting anything.
fn sync_matches_at<E: Encoding>(rule: &Rule, ctx: &mut Ctx, reader: &Reader<E>) -> bool {
    let (node, _) = unwrap_kind(rule);
    if is_token_node(node) {
        let mut copy = *reader;
        match_token_raw(node, &mut copy).is_ok()
    } else {
        probe(rule, ctx, reader).is_some()
    }
}

/// Discards input until one of `sync` matches, leaving the reader in front
/// of it. Emits recovery events and an error-token event for the skipped
/// span. Fails at EOF or when a limit token appears first.
fn synchronize<E: Encoding>(
    ctx: &mut Ctx,
    reader: &mut Reader<E>,
    sync: &[&Rule],
    limits: &[Rule],
) -> bool {
    let begin = reader.position();
    ctx.emit(Event::RecoveryStart { pos: begin });
    loop {
        if sync.iter().any(|rule| sync_matches_at(rule, ctx, reader)) {
            let end = reader.position();
            if end != begin {
                ctx.emit_token(TokenKind::Error, Span::new(begin, end));
            }
            ctx.emit(Event::RecoveryFinish { pos: end });
            return true;
        }
        if reader.is_at_eof()
            || limits
                .iter()
                .any(|rule| sync_matches_at(rule, ctx, reader))
        {
            let end = reader.position();
            if end != begin {
                ctx.emit_token(TokenKind::Error, Span::new(begin, end));
            }
            ctx.emit(Event::RecoveryCancel { pos: end });
            return false;
        }
        reader.bump();
    }
}

//=== the interpreter ===//

/// Runs a rule that must either succeed or fail with a reported error.
pub(crate) fn parse_rule<E: Encoding>(
    rule: &Rule,
    ctx: &mut Ctx,
    reader: &mut Reader<E>,
    args: &mut Vec<Value>,
) -> bool {
    if is_token_node(rule.node()) {
        return parse_token(rule, ctx, reader, args, true);
    }

    match rule.node() {
        Node::Seq(items) => {
            for item in items {
                if !parse_rule(item, ctx, reader, args) {
                    return false;
                }
                if ctx.returning {
                    break;
                }
            }
            true
        }

        Node::Choice(alts) => {
            let start = reader.position();
            for alt in alts {
                if alt.is_unconditional_branch() {
                    return parse_rule(alt, ctx, reader, args);
                }
                match try_branch(alt, ctx, reader, args) {
                    Committed(result) => return result,
                    Backtracked => {}
                }
            }
            ctx.report(ParseError::at(start, ErrorKind::ExhaustedChoice));
            false
        }

        Node::Branch { condition, body } => {
            if !parse_rule(condition, ctx, reader, args) {
                return false;
            }
            if ctx.returning {
                return true;
            }
            parse_rule(body, ctx, reader, args)
        }

        Node::Opt(inner) => match try_branch(inner, ctx, reader, args) {
            Committed(result) => result,
            Backtracked => {
                args.push(Value::Nil);
                true
            }
        },

        Node::While { body } => {
            loop {
                let mark = reader.current();
                let base = args.len();
                match try_branch(body, ctx, reader, args) {
                    Backtracked => break,
                    Committed(false) => return false,
                    Committed(true) => {
                        args.truncate(base);
                        if reader.position() == mark.position() || ctx.returning {
                            break;
                        }
                    }
                }
            }
            true
        }

        Node::List { item, sep } => {
            matches!(parse_list(item, sep.as_ref(), ctx, reader, args, false), Committed(true))
        }

        Node::TermList {
            item,
            sep,
            term,
            opt,
        } => matches!(
            parse_term_list(item, sep.as_ref(), term, *opt, ctx, reader, args, false),
            Committed(true)
        ),

        Node::Try { rule, recovery } => {
            let base = args.len();
            if parse_rule(rule, ctx, reader, args) {
                return true;
            }
            args.truncate(base);
            match recovery {
                None => true,
                Some(recovery) => {
                    let ok = parse_rule(recovery, ctx, reader, args);
                    args.truncate(base);
                    ok
                }
            }
        }

        Node::Find { tokens, limits } => {
            let sync: Vec<&Rule> = tokens.iter().collect();
            synchronize(ctx, reader, &sync, limits)
        }

        Node::Recover { branches, limits } => {
            let begin = reader.position();
            ctx.emit(Event::RecoveryStart { pos: begin });
            loop {
                if let Some(branch) = branches
                    .iter()
                    .find(|branch| probe(branch, ctx, reader).is_some())
                {
                    let end = reader.position();
                    if end != begin {
                        ctx.emit_token(TokenKind::Error, Span::new(begin, end));
                    }
                    ctx.emit(Event::RecoveryFinish { pos: end });
                    return match try_branch(branch, ctx, reader, args) {
                        Committed(result) => result,
                        Backtracked => false,
                    };
                }
                if reader.is_at_eof()
                    || limits.iter().any(|rule| sync_matches_at(rule, ctx, reader))
                {
                    let end = reader.position();
                    if end != begin {
                        ctx.emit_token(TokenKind::Error, Span::new(begin, end));
                    }
                    ctx.emit(Event::RecoveryCancel { pos: end });
                    return false;
                }
                reader.bump();
            }
        }

        Node::Peek(inner) => {
            if probe(inner, ctx, reader).is_none() {
                ctx.report(ParseError::at(
                    reader.position(),
                    ErrorKind::Unexpected {
                        label: "peek failure".into(),
                    },
                ));
            }
            true
        }

        Node::PeekNot(inner) => {
            if let Some(end) = probe(inner, ctx, reader) {
                ctx.report(ParseError::new(
                    Span::new(reader.position(), end),
                    ErrorKind::Unexpected {
                        label: "unexpected".into(),
                    },
                ));
            }
            true
        }

        Node::Capture(inner) => {
            let begin = reader.position();
            let base = args.len();
            if !parse_rule(inner, ctx, reader, args) {
                return false;
            }
            args.insert(base, Value::Lexeme(Span::new(begin, reader.position())));
            true
        }

        Node::ErrorRule { label, rule } => {
            let begin = reader.position();
            let end = match rule {
                None => begin,
                Some(rule) => {
                    let mut copy = *reader;
                    let mut scratch = vec![];
                    ctx.quiet += 1;
                    let _ = parse_rule(rule, ctx, &mut copy, &mut scratch);
                    ctx.quiet -= 1;
                    copy.position()
                }
            };
            ctx.report(ParseError::new(
                Span::new(begin, end),
                ErrorKind::Unexpected {
                    label: (*label).into(),
                },
            ));
            false
        }

        Node::Delimited {
            open,
            close,
            content,
            escapes,
        } => {
            if !parse_rule(open, ctx, reader, args) {
                return false;
            }
            delimited_body(close, content, escapes, ctx, reader, args)
        }

        Node::Recurse(id) => {
            matches!(parse_production(*id, ctx, reader, args, false), Committed(true))
        }

        Node::Inline(id) => {
            let grammar = ctx.grammar;
            parse_rule(&grammar.production(*id).rule, ctx, reader, args)
        }

        Node::Subgrammar { grammar, entry } => {
            let mut sub = Ctx::new(
                grammar.as_ref(),
                &mut *ctx.handler,
                ctx.state.as_deref_mut(),
                ctx.depth_limit.saturating_sub(ctx.frames.len()),
            );
            sub.quiet = ctx.quiet;
            let ok = matches!(
                parse_production(*entry, &mut sub, reader, args, false),
                Committed(true)
            );
            let sub_errors = sub.error_count;
            ctx.error_count += sub_errors;
            ok
        }

        Node::WithKind { inner, .. } => parse_rule(inner, ctx, reader, args),

        Node::Return => {
            ctx.returning = true;
            true
        }

        Node::Effect(f) => {
            f(ctx.state.as_deref_mut());
            true
        }

        Node::DebugRule(message) => {
            ctx.emit(Event::Debug {
                message,
                pos: reader.position(),
            });
            true
        }

        Node::WhitespaceNow(ws) => {
            let was_in_ws = ctx.in_ws;
            ctx.in_ws = true;
            let ok = run_ws_rule(ws, ctx, reader);
            ctx.in_ws = was_in_ws;
            ok
        }

        Node::NoWhitespace(inner) => {
            ctx.no_ws_depth += 1;
            let ok = parse_rule(inner, ctx, reader, args);
            ctx.no_ws_depth -= 1;
            ok
        }

        Node::CtxCreate { id, init } => {
            ctx.vars.push((id, init.clone()));
            true
        }

        Node::CtxSet { id, value } => {
            *ctx.var_mut(id) = value.clone();
            true
        }

        Node::CtxToggle { id } => {
            let var = ctx.var_mut(id);
            match var {
                Value::Bool(b) => *b = !*b,
                other => panic!("toggled context variable holds {other:?}"),
            }
            true
        }

        Node::CtxAdd { id, delta } => {
            let delta = *delta;
            let var = ctx.var_mut(id);
            match var {
                Value::Int(v) => *v += delta,
                other => panic!("counted context variable holds {other:?}"),
            }
            true
        }

        Node::CtxRequire {
            id,
            expected,
            label,
        } => {
            if ctx.var_mut(id) == expected {
                true
            } else {
                ctx.report(ParseError::at(
                    reader.position(),
                    ErrorKind::Unexpected {
                        label: (*label).into(),
                    },
                ));
                false
            }
        }

        Node::CtxValue { id } => {
            let value = ctx.var_mut(id).clone();
            args.push(value);
            true
        }

        _ => unreachable!("token rules are handled above"),
    }
}

/// Attempts a rule as a branch: decides commitment, and once committed runs
/// the body to completion.
pub(crate) fn try_branch<E: Encoding>(
    rule: &Rule,
    ctx: &mut Ctx,
    reader: &mut Reader<E>,
    args: &mut Vec<Value>,
) -> BranchResult {
    if is_token_node(rule.node()) {
        return if parse_token(rule, ctx, reader, args, false) {
            Committed(true)
        } else {
            Backtracked
        };
    }

    match rule.node() {
        Node::Seq(items) => {
            let Some((first, rest)) = items.split_first() else {
                return Committed(true);
            };
            match try_branch(first, ctx, reader, args) {
                Backtracked => Backtracked,
                Committed(false) => Committed(false),
                Committed(true) => {
                    for item in rest {
                        if ctx.returning {
                            break;
                        }
                        if !parse_rule(item, ctx, reader, args) {
                            return Committed(false);
                        }
                    }
                    Committed(true)
                }
            }
        }

        Node::Branch { condition, body } => match try_branch(condition, ctx, reader, args) {
            Backtracked => Backtracked,
            Committed(false) => Committed(false),
            Committed(true) => {
                if ctx.returning {
                    Committed(true)
                } else {
                    Committed(parse_rule(body, ctx, reader, args))
                }
            }
        },

        Node::Choice(alts) => {
            for alt in alts {
                if alt.is_unconditional_branch() {
                    return Committed(parse_rule(alt, ctx, reader, args));
                }
                match try_branch(alt, ctx, reader, args) {
                    Committed(result) => return Committed(result),
                    Backtracked => {}
                }
            }
            Backtracked
        }

        Node::Opt(inner) => match try_branch(inner, ctx, reader, args) {
            Committed(result) => Committed(result),
            Backtracked => {
                args.push(Value::Nil);
                Committed(true)
            }
        },

        Node::While { .. } => Committed(parse_rule(rule, ctx, reader, args)),

        Node::List { item, sep } => parse_list(item, sep.as_ref(), ctx, reader, args, true),

        Node::TermList {
            item,
            sep,
            term,
            opt,
        } => parse_term_list(item, sep.as_ref(), term, *opt, ctx, reader, args, true),

        Node::Try { rule: inner, recovery } => {
            let base = args.len();
            match try_branch(inner, ctx, reader, args) {
                Backtracked => Backtracked,
                Committed(true) => Committed(true),
                Committed(false) => {
                    args.truncate(base);
                    match recovery {
                        None => Committed(true),
                        Some(recovery) => {
                            let ok = parse_rule(recovery, ctx, reader, args);
                            args.truncate(base);
                            Committed(ok)
                        }
                    }
                }
            }
        }

        Node::Peek(inner) => match probe(inner, ctx, reader) {
            Some(end) => {
                let pos = reader.position();
                if end != pos {
                    ctx.emit(Event::Backtracked {
                        span: Span::new(pos, end),
                    });
                }
                Committed(true)
            }
            None => Backtracked,
        },

        Node::PeekNot(inner) => match probe(inner, ctx, reader) {
            Some(_) => Backtracked,
            None => Committed(true),
        },

        Node::Capture(inner) => {
            let begin = reader.position();
            let base = args.len();
            match try_branch(inner, ctx, reader, args) {
                Backtracked => Backtracked,
                Committed(false) => Committed(false),
                Committed(true) => {
                    args.insert(base, Value::Lexeme(Span::new(begin, reader.position())));
                    Committed(true)
                }
            }
        }

        Node::Delimited {
            open,
            close,
            content,
            escapes,
        } => match try_branch(open, ctx, reader, args) {
            Backtracked => Backtracked,
            Committed(false) => Committed(false),
            Committed(true) => Committed(delimited_body(close, content, escapes, ctx, reader, args)),
        },

        Node::Recurse(id) => parse_production(*id, ctx, reader, args, true),

        Node::Inline(id) => {
            let grammar = ctx.grammar;
            try_branch(&grammar.production(*id).rule, ctx, reader, args)
        }

        Node::Subgrammar { grammar, entry } => {
            let mut sub = Ctx::new(
                grammar.as_ref(),
                &mut *ctx.handler,
                ctx.state.as_deref_mut(),
                ctx.depth_limit.saturating_sub(ctx.frames.len()),
            );
            sub.quiet = ctx.quiet;
            let result = parse_production(*entry, &mut sub, reader, args, true);
            let sub_errors = sub.error_count;
            ctx.error_count += sub_errors;
            result
        }

        Node::WithKind { inner, .. } => try_branch(inner, ctx, reader, args),

        Node::NoWhitespace(inner) => {
            ctx.no_ws_depth += 1;
            let result = try_branch(inner, ctx, reader, args);
            ctx.no_ws_depth -= 1;
            result
        }

        // Unconditional and plain rules commit immediately.
        _ => Committed(parse_rule(rule, ctx, reader, args)),
    }
}

//=== lists ===//

fn add_slot(
    sink: &mut Box<dyn Sink>,
    item_args: Vec<Value>,
    recovered: bool,
    begin: usize,
    end: usize,
) {
    if !recovered && !item_args.is_empty() {
        sink.add(item_args);
    } else {
        sink.add(vec![Value::Lexeme(Span::new(begin, end))]);
    }
}

fn parse_list<E: Encoding>(
    item: &Rule,
    sep: Option<&Sep>,
    ctx: &mut Ctx,
    reader: &mut Reader<E>,
    args: &mut Vec<Value>,
    as_branch: bool,
) -> BranchResult {
    let mut sink = ctx.build_sink();
    let mut item_args = vec![];

    // The first item decides whether the list is taken at all.
    let begin = reader.position();
    if as_branch {
        match try_branch(item, ctx, reader, &mut item_args) {
            Backtracked => return Backtracked,
            Committed(false) => return Committed(false),
            Committed(true) => {}
        }
    } else if !parse_rule(item, ctx, reader, &mut item_args) {
        return Committed(false);
    }
    add_slot(&mut sink, std::mem::take(&mut item_args), false, begin, reader.position());

    loop {
        if ctx.returning {
            break;
        }
        match sep {
            Some(sep) => {
                match try_branch(&sep.rule, ctx, reader, &mut item_args) {
                    Backtracked => break,
                    Committed(false) => return Committed(false),
                    Committed(true) => {}
                }
                item_args.clear();
                if sep.trailing {
                    let begin = reader.position();
                    match try_branch(item, ctx, reader, &mut item_args) {
                        Backtracked => break,
                        Committed(false) => return Committed(false),
                        Committed(true) => add_slot(
                            &mut sink,
                            std::mem::take(&mut item_args),
                            false,
                            begin,
                            reader.position(),
                        ),
                    }
                } else {
                    // With a plain separator the next item is mandatory.
                    let begin = reader.position();
                    if !parse_rule(item, ctx, reader, &mut item_args) {
                        return Committed(false);
                    }
                    add_slot(
                        &mut sink,
                        std::mem::take(&mut item_args),
                        false,
                        begin,
                        reader.position(),
                    );
                }
            }
            None => {
                let begin = reader.position();
                match try_branch(item, ctx, reader, &mut item_args) {
                    Backtracked => break,
                    Committed(false) => return Committed(false),
                    Committed(true) => {
                        if reader.position() == begin {
                            break;
                        }
                        add_slot(
                            &mut sink,
                            std::mem::take(&mut item_args),
                            false,
                            begin,
                            reader.position(),
                        );
                    }
                }
            }
        }
    }

    args.push(sink.finish());
    Committed(true)
}

#[allow(clippy::too_many_arguments)]
fn parse_term_list<E: Encoding>(
    item: &Rule,
    sep: Option<&Sep>,
    term: &Rule,
    opt: bool,
    ctx: &mut Ctx,
    reader: &mut Reader<E>,
    args: &mut Vec<Value>,
    as_branch: bool,
) -> BranchResult {
    let mut sink = ctx.build_sink();
    let mut scratch = vec![];

    // An opt list is unconditional; the item branch no longer decides
    // whether the list is taken.
    let as_branch = as_branch && !opt;

    if opt {
        if let Committed(result) = try_branch(term, ctx, reader, &mut scratch) {
            if result {
                args.push(sink.finish());
            }
            return Committed(result);
        }
    }

    let sync_rules: Vec<&Rule> = sep
        .iter()
        .map(|sep| &sep.rule)
        .chain(std::iter::once(term))
        .collect();

    let mut first = true;
    let mut last_pos = usize::MAX;
    'slots: loop {
        // A stuck slot means the item can match without consuming; force the
        // terminator to make progress.
        if reader.position() == last_pos {
            let ok = parse_rule(term, ctx, reader, &mut scratch);
            args.push(sink.finish());
            return Committed(ok);
        }
        last_pos = reader.position();

        let slot_begin = reader.position();
        let mut item_args = vec![];
        let mut recovered = false;

        if first && as_branch {
            match try_branch(item, ctx, reader, &mut item_args) {
                Backtracked => return Backtracked,
                Committed(false) => {
                    recovered = true;
                    if !synchronize(ctx, reader, &sync_rules, &[]) {
                        return Committed(false);
                    }
                }
                Committed(true) => {}
            }
        } else if !parse_rule(item, ctx, reader, &mut item_args) {
            recovered = true;
            if !synchronize(ctx, reader, &sync_rules, &[]) {
                return Committed(false);
            }
        }
        first = false;

        loop {
            let end_candidate = reader.position();

            match try_branch(term, ctx, reader, &mut scratch) {
                Committed(false) => return Committed(false),
                Committed(true) => {
                    add_slot(&mut sink, item_args, recovered, slot_begin, end_candidate);
                    args.push(sink.finish());
                    return Committed(true);
                }
                Backtracked => {}
            }

            match sep {
                Some(sep) => {
                    match try_branch(&sep.rule, ctx, reader, &mut scratch) {
                        Committed(false) => return Committed(false),
                        Committed(true) => {
                            // A terminator directly after the separator makes
                            // it a trailing separator.
                            match try_branch(term, ctx, reader, &mut scratch) {
                                Committed(false) => return Committed(false),
                                Committed(true) => {
                                    if !sep.trailing {
                                        ctx.report(ParseError::at(
                                            end_candidate,
                                            ErrorKind::UnexpectedTrailingSeparator,
                                        ));
                                    }
                                    add_slot(
                                        &mut sink,
                                        item_args,
                                        recovered,
                                        slot_begin,
                                        end_candidate,
                                    );
                                    args.push(sink.finish());
                                    return Committed(true);
                                }
                                Backtracked => {
                                    add_slot(
                                        &mut sink,
                                        item_args,
                                        recovered,
                                        slot_begin,
                                        end_candidate,
                                    );
                                    continue 'slots;
                                }
                            }
                        }
                        Backtracked => {
                            // Neither terminator nor separator follows the
                            // item; report against the separator and resync.
                            if parse_rule(&sep.rule, ctx, reader, &mut scratch) {
                                add_slot(&mut sink, item_args, recovered, slot_begin, end_candidate);
                                continue 'slots;
                            }
                            recovered = true;
                            if !synchronize(ctx, reader, &sync_rules, &[]) {
                                return Committed(false);
                            }
                        }
                    }
                }
                None => {
                    add_slot(&mut sink, item_args, recovered, slot_begin, end_candidate);
                    continue 'slots;
                }
            }
        }
    }
}

//=== delimited ===//

fn delimited_body<E: Encoding>(
    close: &Rule,
    content: &Rule,
    escapes: &[crate::rule::Escape],
    ctx: &mut Ctx,
    reader: &mut Reader<E>,
    args: &mut Vec<Value>,
) -> bool {
    ctx.no_ws_depth += 1;
    let result = delimited_loop(close, content, escapes, ctx, reader, args);
    ctx.no_ws_depth -= 1;
    result
}

fn delimited_loop<E: Encoding>(
    close: &Rule,
    content: &Rule,
    escapes: &[crate::rule::Escape],
    ctx: &mut Ctx,
    reader: &mut Reader<E>,
    args: &mut Vec<Value>,
) -> bool {
    let del_begin = reader.position();
    let mut sink = ctx.build_sink();
    let mut batch_begin = reader.position();
    let mut scratch = vec![];

    'chars: loop {
        let here = reader.position();

        match try_branch(close, ctx, reader, &mut scratch) {
            Committed(false) => return false,
            Committed(true) => {
                flush_chars(&mut sink, ctx, batch_begin, here);
                args.push(sink.finish());
                return true;
            }
            Backtracked => {}
        }

        if reader.is_at_eof() {
            flush_chars(&mut sink, ctx, batch_begin, here);
            ctx.report(ParseError::new(
                Span::new(del_begin, here),
                ErrorKind::MissingDelimiter,
            ));
            return false;
        }

        for esc in escapes {
            let esc_begin = reader.position();
            match try_branch(&esc.token, ctx, reader, &mut scratch) {
                Backtracked => continue,
                Committed(false) => return false,
                Committed(true) => {
                    flush_chars(&mut sink, ctx, batch_begin, esc_begin);
                    let mut handled = false;
                    for action in &esc.actions {
                        match action {
                            EscapeAction::Capture(class) => {
                                if let Ok((c, len)) = reader.decode() {
                                    if class.matches(c) {
                                        let begin = reader.position();
                                        reader.bump_by(len);
                                        let span = Span::new(begin, reader.position());
                                        ctx.emit_token(TokenKind::Unknown, span);
                                        sink.add(vec![Value::Lexeme(span)]);
                                        handled = true;
                                        break;
                                    }
                                }
                            }
                            EscapeAction::Rule(rule) => {
                                let mut esc_args = vec![];
                                match try_branch(rule, ctx, reader, &mut esc_args) {
                                    Backtracked => {}
                                    Committed(false) => return false,
                                    Committed(true) => {
                                        if !esc_args.is_empty() {
                                            sink.add(esc_args);
                                        }
                                        handled = true;
                                        break;
                                    }
                                }
                            }
                            EscapeAction::Symbol(table) => {
                                if let TrieMatch::Match { value } =
                                    table.trie_for::<E>().walk(reader)
                                {
                                    sink.add(vec![table.value(value).clone()]);
                                    handled = true;
                                    break;
                                }
                            }
                        }
                    }
                    if !handled {
                        ctx.report(ParseError::new(
                            Span::new(esc_begin, reader.position()),
                            ErrorKind::InvalidEscapeSequence,
                        ));
                    }
                    batch_begin = reader.position();
                    continue 'chars;
                }
            }
        }

        let (content_node, _) = unwrap_kind(content);
        match match_token_raw(content_node, reader) {
            Ok(_) => {}
            Err(error) => {
                flush_chars(&mut sink, ctx, batch_begin, here);
                ctx.report(error);
                ctx.emit(Event::RecoveryStart { pos: here });
                // Discard at least one code unit so recovery makes progress.
                if reader.position() == here {
                    reader.bump();
                }
                let end = reader.position();
                ctx.emit_token(TokenKind::Error, Span::new(here, end));
                ctx.emit(Event::RecoveryFinish { pos: end });
                batch_begin = end;
            }
        }
    }
}

fn flush_chars(sink: &mut Box<dyn Sink>, ctx: &mut Ctx, begin: usize, end: usize) {
    if begin != end {
        let span = Span::new(begin, end);
        ctx.emit_token(TokenKind::Unknown, span);
        sink.add(vec![Value::Lexeme(span)]);
    }
}

//=== productions ===//

/// Parses a production: pushes its frame, runs its rule, applies its value
/// specification and emits the production events.
pub(crate) fn parse_production<E: Encoding>(
    id: ProdId,
    ctx: &mut Ctx,
    reader: &mut Reader<E>,
    args: &mut Vec<Value>,
    as_branch: bool,
) -> BranchResult {
    if ctx.frames.len() >= ctx.depth_limit {
        ctx.report(ParseError::at(
            reader.position(),
            ErrorKind::RecursionLimitExceeded,
        ));
        return Committed(false);
    }

    let grammar = ctx.grammar;
    let production = grammar.production(id);

    // Whitespace in front of a production belongs to the caller and is
    // skipped with the caller's rule; it is undone if the production
    // backtracks.
    let pre = reader.current();
    if !skip_ws(ctx, reader) {
        reader.reset(pre);
        return Committed(false);
    }
    let ws_span = Span::new(pre.position(), reader.position());
    if !ws_span.is_empty() {
        ctx.emit_token(TokenKind::Whitespace, ws_span);
    }

    ctx.push_frame(production);
    if !production.transparent {
        ctx.emit(Event::ProductionStart {
            production: production.name,
            pos: reader.position(),
        });
    }

    let mut inner_args = vec![];
    let result = if as_branch {
        try_branch(&production.rule, ctx, reader, &mut inner_args)
    } else {
        Committed(parse_rule(&production.rule, ctx, reader, &mut inner_args))
    };
    ctx.returning = false;

    match result {
        Backtracked => {
            if !production.transparent {
                ctx.emit(Event::ProductionCancel {
                    production: production.name,
                    pos: reader.position(),
                });
            }
            ctx.pop_frame();
            reader.reset(pre);
            Backtracked
        }
        Committed(ok) => {
            if ok {
                finish_value(production, ctx, inner_args, args);
                if !production.transparent {
                    ctx.emit(Event::ProductionFinish {
                        production: production.name,
                        pos: reader.position(),
                    });
                }
            } else if !production.transparent {
                ctx.emit(Event::ProductionCancel {
                    production: production.name,
                    pos: reader.position(),
                });
            }
            ctx.pop_frame();
            Committed(ok)
        }
    }
}

fn finish_value(
    production: &crate::grammar::Production,
    ctx: &mut Ctx,
    inner_args: Vec<Value>,
    args: &mut Vec<Value>,
) {
    match &production.value {
        None => args.extend(inner_args),
        Some(ValueSpec::Callback(cb)) | Some(ValueSpec::SinkThen(_, cb)) => {
            args.push(cb.invoke(ctx.state.as_deref_mut(), &inner_args));
        }
        Some(ValueSpec::Sink(_)) => {
            // The sink result was pushed by the list rule that fed it.
            match inner_args.len() {
                1 => args.extend(inner_args),
                _ => args.push(Value::List(inner_args)),
            }
        }
    }
}
