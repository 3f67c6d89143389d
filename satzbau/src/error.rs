//! Structured parse errors.
//!
//! Every failure the engine reports is a [`ParseError`]: an [`ErrorKind`]
//! tagged with the span it covers. Point errors use an empty span. The
//! production that was active when the error was raised is recorded in the
//! surrounding [`Diagnostic`].

use thiserror::Error;

use crate::{encoding::CodePointError, reader::Span};

/// The kinds of structured errors the engine raises.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A literal did not match; `matched` code units of `length` did.
    #[error("expected {literal:?}")]
    ExpectedLiteral {
        /// The literal that was expected.
        literal: Box<str>,
        /// Length of the prefix that did match, in code units.
        matched: usize,
        /// Total length of the literal, in code units.
        length: usize,
    },

    /// A keyword's text matched but was continued by an identifier character.
    #[error("expected keyword {keyword:?}")]
    ExpectedKeyword {
        /// The keyword that was expected.
        keyword: Box<str>,
    },

    /// A character-class match failed.
    #[error("expected {class}")]
    ExpectedCharClass {
        /// Name of the class.
        class: Box<str>,
    },

    /// None of the literals of a literal set matched.
    #[error("expected one of the known literals")]
    ExpectedLiteralSet,

    /// No alternative of a choice accepted the input.
    #[error("exhausted choice")]
    ExhaustedChoice,

    /// `peek_not` matched, or an explicit `error` rule was reached.
    #[error("{label}")]
    Unexpected {
        /// The label given to the error rule, or a generic description.
        label: Box<str>,
    },

    /// A delimited region reached the end of input without its closer.
    #[error("missing delimiter")]
    MissingDelimiter,

    /// An escape token was not followed by a valid escape.
    #[error("invalid escape sequence")]
    InvalidEscapeSequence,

    /// A separated list ended with a separator.
    #[error("unexpected trailing separator")]
    UnexpectedTrailingSeparator,

    /// An integer literal starts with a forbidden leading zero.
    #[error("forbidden leading zero")]
    ForbiddenLeadingZero,

    /// An integer literal does not fit the target type.
    #[error("integer overflow")]
    IntegerOverflow,

    /// Decoding a code point from the input failed.
    #[error("{}", .0.name())]
    InvalidCodePoint(CodePointError),

    /// Productions recursed deeper than the configured limit.
    #[error("maximum recursion depth exceeded")]
    RecursionLimitExceeded,
}

/// An error kind together with the input span it covers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} at {}..{}", .span.begin, .span.end)]
pub struct ParseError {
    /// The covered span; empty for point errors.
    pub span: Span,
    /// What went wrong.
    pub kind: ErrorKind,
}

impl ParseError {
    /// Creates an error covering `span`.
    pub fn new(span: Span, kind: ErrorKind) -> Self {
        ParseError { span, kind }
    }

    /// Creates a point error at `pos`.
    pub fn at(pos: usize, kind: ErrorKind) -> Self {
        ParseError {
            span: Span::empty(pos),
            kind,
        }
    }

    /// The position the error is anchored at.
    pub fn position(&self) -> usize {
        self.span.begin
    }
}

/// A [`ParseError`] attributed to the production it occurred in.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("while parsing {production}: {error}")]
pub struct Diagnostic {
    /// Name of the innermost non-transparent production.
    pub production: &'static str,
    /// The error itself.
    pub error: ParseError,
}
