//! Satzbau is a declarative parser-combinator engine.
//!
//! Grammars are assembled from small [`Rule`] values — literals, character
//! classes, sequences, choices, repetitions, delimited regions, keywords and
//! identifiers — grouped into named [`Production`]s, and then run over an
//! input to produce typed values, validation results or traces. The target
//! use-case are deterministic, error-reporting, committed-choice parsers for
//! text and binary formats:
//!
//! * _Committed choice_: alternatives decide whether they apply by peeking
//!   at a branch condition. Once a branch has committed, a failure inside it
//!   is a parse error rather than an invitation to try the next alternative.
//!   This keeps grammars predictable and avoids the accidental exponential
//!   behavior of unrestricted backtracking, while `peek`, `opt` and friends
//!   provide bounded lookahead where a format genuinely needs it.
//!
//! * _Efficient_: the input is a plain slice of code units with a mutable
//!   cursor; literal alternatives dispatch through a compiled longest-match
//!   trie and decimal digit runs are scanned a machine word at a time. The
//!   engine stays out of the way of hand-written fast paths, which can hook
//!   in through the [`scanner`] module.
//!
//! * _Error reporting_: every failure is a structured [`ErrorKind`] with an
//!   input span, delivered through an event [`Handler`] together with token
//!   and production events. `try_`, `find` and `recover` turn failures into
//!   local recoveries so a single parse can report many errors.
//!
//! * _Single-threaded and pure_: a parse action is a pure function of the
//!   grammar and the input; there is no global state.
//!
//! ## Using satzbau
//!
//! ```rust
//! use satzbau::{
//!     action, ascii, callback::Callback, lit, list_sep, sep, Grammar, Production, Reader,
//! };
//!
//! // A comma-separated list of `ab` words, with optional blanks between
//! // tokens.
//! let mut builder = Grammar::builder();
//! let words = builder.add(
//!     Production::new("words", list_sep(lit("ab"), sep(lit(","))))
//!         .whitespace(satzbau::while_(ascii::blank().into()))
//!         .value(Callback::forward()),
//! );
//! let grammar = builder.build();
//!
//! let result = action::parse(Reader::from_str("ab, ab"), &grammar, words);
//! assert!(result.is_success());
//! ```
//!
//! The [`action`] module contains the entry points: [`action::parse`],
//! [`action::matches`], [`action::validate`], [`action::trace`] and
//! [`action::scan`].

#![warn(missing_docs)]

pub mod action;
pub mod callback;
mod char_class;
mod encoding;
mod error;
mod event;
mod grammar;
mod parse;
mod reader;
mod rule;
pub mod scanner;
pub mod text;
mod trie;

pub use char_class::{ascii, CharClass};
pub use encoding::{Ascii, Bytes, CodePointError, Decoded, Encoding, Utf16, Utf32, Utf8};
pub use error::{Diagnostic, ErrorKind, ParseError};
pub use event::{CollectErrors, DiscardEvents, Event, Handler, TokenKind};
pub use grammar::{Grammar, GrammarBuilder, ProdId, Production};
pub use reader::{Marker, Reader, Span};
pub use rule::*;
