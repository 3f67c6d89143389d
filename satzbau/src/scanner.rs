//! The imperative scanner.
//!
//! A [`Scanner`] drives the same rule machinery as the declarative actions,
//! but hands control to hand-written code between rules: parse, branch,
//! peek, capture, discard, raise errors and recover from them. This is the
//! escape hatch for productions that are easier to write as plain loops than
//! as rule trees.

use std::ops;

use crate::{
    callback::Value,
    encoding::Encoding,
    error::{ErrorKind, ParseError},
    event::Event,
    grammar::{Grammar, ProdId},
    parse::{parse_rule, try_branch, BranchResult, Ctx},
    reader::{Reader, Span},
    rule::Rule,
};

/// The scanner's control state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScannerState {
    /// Parsing proceeds normally.
    Ok,
    /// A rule failed; `parse` and `branch` are no-ops until recovery.
    Failed,
    /// Inside an error-recovery session; failures do not propagate.
    Recovering,
}

/// An imperative view of a parse context and reader.
pub struct Scanner<'p, 'i, E: Encoding> {
    pub(crate) ctx: Ctx<'p>,
    reader: Reader<'i, E>,
    state: ScannerState,
}

impl<'p, 'i, E: Encoding> Scanner<'p, 'i, E> {
    pub(crate) fn new(
        grammar: &'p Grammar,
        handler: &'p mut dyn crate::event::Handler,
        state: Option<&'p mut dyn std::any::Any>,
        reader: Reader<'i, E>,
        control: Option<ProdId>,
        depth_limit: usize,
    ) -> Self {
        let mut ctx = Ctx::new(grammar, handler, state, depth_limit);
        let (name, ws) = match control {
            Some(id) => {
                let production = grammar.production(id);
                (production.name(), production.whitespace.clone())
            }
            None => ("scanner", None),
        };
        ctx.push_scan_frame(name, ws);
        ctx.emit(Event::ProductionStart {
            production: name,
            pos: reader.position(),
        });
        Scanner {
            ctx,
            reader,
            state: ScannerState::Ok,
        }
    }

    /// The scanner's control state.
    pub fn state(&self) -> ScannerState {
        self.state
    }

    /// Whether the scanner is in the `ok` state.
    pub fn is_ok(&self) -> bool {
        self.state == ScannerState::Ok
    }

    /// The current input position.
    pub fn position(&self) -> usize {
        self.reader.position()
    }

    /// Whether the cursor is at the end of the input.
    pub fn is_at_eof(&self) -> bool {
        self.reader.is_at_eof()
    }

    /// The code units in front of the cursor.
    pub fn remaining_input(&self) -> &'i [E::Unit] {
        let span = Span::new(self.reader.position(), self.reader.input().len());
        self.reader.slice(span)
    }

    /// The code units of a previously captured span.
    pub fn slice(&self, span: Span) -> &'i [E::Unit] {
        self.reader.slice(span)
    }

    /// Number of errors reported so far.
    pub fn error_count(&self) -> usize {
        self.ctx.error_count
    }

    fn pack(args: Vec<Value>) -> Value {
        let mut args = args;
        match args.len() {
            0 => Value::Nil,
            1 => args.pop().unwrap(),
            _ => Value::List(args),
        }
    }

    /// Runs a rule and returns its produced value.
    ///
    /// In the `failed` state this is a no-op returning `None`. On failure
    /// the cursor is restored to where the rule started.
    pub fn parse(&mut self, rule: &Rule) -> Option<Value> {
        if self.state == ScannerState::Failed {
            return None;
        }
        let start = self.reader.current();
        let mut args = vec![];
        if parse_rule(rule, &mut self.ctx, &mut self.reader, &mut args) {
            Some(Self::pack(args))
        } else {
            self.reader.reset(start);
            if self.state == ScannerState::Ok {
                self.state = ScannerState::Failed;
            }
            None
        }
    }

    /// Runs a production and returns its produced value.
    pub fn parse_production(&mut self, id: ProdId) -> Option<Value> {
        self.parse(&crate::rule::p(id))
    }

    /// Tries a branch; the cursor advances only if it commits.
    ///
    /// Returns the commit outcome: a committed branch whose body failed
    /// still counts as taken, but the scanner transitions to `failed`.
    pub fn branch(&mut self, rule: &Rule) -> bool {
        let mut out = None;
        self.branch_value(&mut out, rule)
    }

    /// Like [`branch`][Self::branch], storing the branch's value in `out`.
    pub fn branch_value(&mut self, out: &mut Option<Value>, rule: &Rule) -> bool {
        if self.state == ScannerState::Failed {
            return false;
        }
        let start = self.reader.current();
        let mut args = vec![];
        match try_branch(rule, &mut self.ctx, &mut self.reader, &mut args) {
            BranchResult::Backtracked => false,
            BranchResult::Committed(true) => {
                *out = Some(Self::pack(args));
                true
            }
            BranchResult::Committed(false) => {
                self.reader.reset(start);
                if self.state == ScannerState::Ok {
                    self.state = ScannerState::Failed;
                }
                true
            }
        }
    }

    /// Whether `rule` would match here; never consumes input.
    pub fn peek(&mut self, rule: &Rule) -> bool {
        if self.state == ScannerState::Failed {
            return false;
        }
        crate::parse::probe_rule(rule, &mut self.ctx, &self.reader).is_some()
    }

    /// Runs a rule and returns the lexeme it consumed.
    pub fn capture(&mut self, rule: &Rule) -> Option<Span> {
        if self.state == ScannerState::Failed {
            return None;
        }
        let begin = self.reader.position();
        self.parse(rule)?;
        Some(Span::new(begin, self.reader.position()))
    }

    /// Runs a rule and discards any produced value.
    pub fn discard(&mut self, rule: &Rule) -> bool {
        self.parse(rule).is_some()
    }

    /// Reports a structured error without changing the scanner state.
    pub fn error(&mut self, kind: ErrorKind, span: Span) {
        self.ctx.report(ParseError::new(span, kind));
    }

    /// Reports a structured error and transitions the scanner to `failed`.
    pub fn fatal_error(&mut self, kind: ErrorKind, span: Span) {
        self.ctx.report(ParseError::new(span, kind));
        if self.state == ScannerState::Ok {
            self.state = ScannerState::Failed;
        }
    }

    /// Starts a recovery session.
    ///
    /// While the session is alive the scanner is in the `recovering` state:
    /// `parse` and `branch` run normally and their failures do not
    /// propagate. [`finish`][ErrorRecovery::finish] returns the scanner to
    /// `ok`; [`cancel`][ErrorRecovery::cancel] (or dropping the session) to
    /// `failed`.
    pub fn error_recovery(&mut self) -> ErrorRecovery<'_, 'p, 'i, E> {
        self.state = ScannerState::Recovering;
        ErrorRecovery {
            scanner: self,
            settled: false,
        }
    }

    /// Ends the scan, emitting the closing production event.
    ///
    /// Returns whether the scanner ended in the `ok` state.
    pub fn finish(mut self) -> bool {
        let name = self
            .ctx
            .frames
            .last()
            .map_or("scanner", |frame| frame.production);
        let pos = self.reader.position();
        let event = if self.is_ok() {
            Event::ProductionFinish {
                production: name,
                pos,
            }
        } else {
            Event::ProductionCancel {
                production: name,
                pos,
            }
        };
        self.ctx.emit(event);
        self.is_ok()
    }
}

/// A scoped recovery session; see [`Scanner::error_recovery`].
pub struct ErrorRecovery<'a, 'p, 'i, E: Encoding> {
    scanner: &'a mut Scanner<'p, 'i, E>,
    settled: bool,
}

impl<'a, 'p, 'i, E: Encoding> ErrorRecovery<'a, 'p, 'i, E> {
    /// Ends recovery; the scanner returns to `ok`.
    pub fn finish(mut self) {
        self.scanner.state = ScannerState::Ok;
        self.settled = true;
    }

    /// Abandons recovery; the scanner returns to `failed`.
    pub fn cancel(mut self) {
        self.scanner.state = ScannerState::Failed;
        self.settled = true;
    }
}

impl<'a, 'p, 'i, E: Encoding> Drop for ErrorRecovery<'a, 'p, 'i, E> {
    fn drop(&mut self) {
        if !self.settled {
            self.scanner.state = ScannerState::Failed;
        }
    }
}

impl<'a, 'p, 'i, E: Encoding> ops::Deref for ErrorRecovery<'a, 'p, 'i, E> {
    type Target = Scanner<'p, 'i, E>;

    fn deref(&self) -> &Self::Target {
        self.scanner
    }
}

impl<'a, 'p, 'i, E: Encoding> ops::DerefMut for ErrorRecovery<'a, 'p, 'i, E> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.scanner
    }
}
