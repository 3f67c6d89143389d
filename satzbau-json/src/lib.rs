//! This crate contains a JSON parser built on the `satzbau` grammar engine.
//!
//! It doubles as the engine's end-to-end exercise: literals and symbol
//! tables dispatch the keywords and escapes, digit rules carry the number
//! grammar, and the imperative scanner drives strings and the recursive
//! value structure the way a hand-written parser would.
//!
//! See [`parse_str`] for the entry point.

#![warn(missing_docs)]
mod error;
mod json;
mod token;

pub use error::ParseError;
pub use json::{parse_str, JsonValue};
