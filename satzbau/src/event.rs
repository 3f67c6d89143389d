//! The parse event stream.
//!
//! Every parse action drives a [`Handler`] with a flat stream of [`Event`]s:
//! production boundaries, consumed tokens, backtracking, error recovery and
//! structured errors. The stock actions install their own handlers; custom
//! handlers get the full stream, which is also what the `trace` action
//! renders.

use crate::{error::Diagnostic, reader::Span};

/// Classification of a consumed token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum TokenKind {
    /// No specific classification.
    Unknown,
    /// Input discarded during error recovery.
    Error,
    /// Consumed by the active whitespace rule.
    Whitespace,
    /// A zero-width position marker.
    Position,
    /// The end of the input.
    Eof,
    /// A newline or the end of the input.
    Eol,
    /// An identifier.
    Identifier,
    /// A literal or keyword.
    Literal,
    /// A digit sequence.
    Digits,
    /// A user-assigned kind.
    Custom(&'static str),
}

impl TokenKind {
    /// Name used by the trace action.
    pub fn name(self) -> &'static str {
        match self {
            TokenKind::Unknown => "token",
            TokenKind::Error => "error token",
            TokenKind::Whitespace => "whitespace",
            TokenKind::Position => "position",
            TokenKind::Eof => "EOF",
            TokenKind::Eol => "EOL",
            TokenKind::Identifier => "identifier",
            TokenKind::Literal => "literal",
            TokenKind::Digits => "digits",
            TokenKind::Custom(name) => name,
        }
    }
}

/// One entry of the parse event stream.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Event {
    /// A production started at `pos`.
    ProductionStart {
        /// Production name.
        production: &'static str,
        /// Start position.
        pos: usize,
    },
    /// The current production finished successfully.
    ProductionFinish {
        /// Production name.
        production: &'static str,
        /// Position after the production.
        pos: usize,
    },
    /// The current production failed or was backtracked away.
    ProductionCancel {
        /// Production name.
        production: &'static str,
        /// Position at cancellation.
        pos: usize,
    },
    /// A token was consumed.
    Token {
        /// Classification of the token.
        kind: TokenKind,
        /// Consumed span.
        span: Span,
    },
    /// The reader backtracked over a non-empty span.
    Backtracked {
        /// The span that had been consumed speculatively.
        span: Span,
    },
    /// Error recovery started discarding input.
    RecoveryStart {
        /// Position where recovery began.
        pos: usize,
    },
    /// Error recovery reached a synchronization point.
    RecoveryFinish {
        /// Position where normal parsing resumes.
        pos: usize,
    },
    /// Error recovery hit a limit and gave up.
    RecoveryCancel {
        /// Position where recovery stopped.
        pos: usize,
    },
    /// A `debug` rule was crossed.
    Debug {
        /// The rule's message.
        message: &'static str,
        /// Current position.
        pos: usize,
    },
    /// A structured error was raised.
    Error(Diagnostic),
}

/// Receives the parse event stream of one action.
pub trait Handler {
    /// Called for every event, in parse order.
    fn on_event(&mut self, event: Event);
}

/// Ignores all events; used by the `matches` action.
#[derive(Debug, Default)]
pub struct DiscardEvents;

impl Handler for DiscardEvents {
    fn on_event(&mut self, _event: Event) {}
}

/// Collects error events, dropping everything else.
#[derive(Debug, Default)]
pub struct CollectErrors {
    /// The collected diagnostics, in parse order.
    pub errors: Vec<Diagnostic>,
}

impl Handler for CollectErrors {
    fn on_event(&mut self, event: Event) {
        if let Event::Error(diagnostic) = event {
            self.errors.push(diagnostic);
        }
    }
}
