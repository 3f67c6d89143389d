use satzbau::Diagnostic;
use thiserror::Error;

/// The JSON document could not be parsed.
///
/// Carries every diagnostic the engine reported, in input order; the first
/// one is used for the display message.
#[derive(Debug, Error)]
pub struct ParseError {
    /// All reported diagnostics.
    pub diagnostics: Vec<Diagnostic>,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.diagnostics.first() {
            Some(first) => write!(f, "{first}"),
            None => write!(f, "invalid JSON"),
        }
    }
}

impl From<Vec<Diagnostic>> for ParseError {
    fn from(diagnostics: Vec<Diagnostic>) -> Self {
        ParseError { diagnostics }
    }
}
