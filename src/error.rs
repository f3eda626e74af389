//! Build-time and match-time errors.

use thiserror::Error;

/// A grammar that cannot be linked.
///
/// Returned from [`GrammarBuilder::link`](crate::GrammarBuilder::link), and from
/// the name-based accessors on [`State`](crate::State) when a flag or capture
/// name does not resolve.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarError {
    #[error("rule `{0}` is defined more than once")]
    DuplicateRule(String),
    #[error("import alias `{0}` is used more than once")]
    DuplicateImport(String),
    #[error("cannot import an anonymous grammar without an alias")]
    AnonymousImport,
    #[error("undefined rule `{name}` referenced by {by}")]
    UndefinedRule { name: String, by: &'static str },
    #[error("undefined scope `{0}`")]
    UndefinedScope(String),
    #[error("undefined keyword `{0}`")]
    UndefinedKeyword(String),
    #[error("undefined flag `{0}`")]
    UndefinedFlag(String),
    #[error("undefined capture `{0}`")]
    UndefinedCapture(String),
    #[error("invoke target `{0}` is not an imported grammar")]
    UndefinedInvoke(String),
    #[error("no entry rule was declared")]
    MissingEntry,
    #[error("lookbehind in rule `{0}` has no fixed match length")]
    VariableLookbehind(String),
    #[error("node #{0} is used in more than one place")]
    NodeReused(usize),
    #[error("node #{0} belongs to a different grammar builder")]
    ForeignNode(usize),
}

/// A failed match.
///
/// Only the first [`expect`](crate::GrammarBuilder::expect) failure of a match
/// is reported; later ones never overwrite it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyntaxError {
    #[error("{message} (at offset {offset})")]
    Expected { message: String, offset: usize },
    #[error("no match at offset {offset}")]
    NoMatch { offset: usize },
}

impl SyntaxError {
    /// Offset of the hint, or the offset where matching started.
    pub fn offset(&self) -> usize {
        match self {
            SyntaxError::Expected { offset, .. } | SyntaxError::NoMatch { offset } => *offset,
        }
    }

    pub fn hint(&self) -> Option<&str> {
        match self {
            SyntaxError::Expected { message, .. } => Some(message),
            SyntaxError::NoMatch { .. } => None,
        }
    }
}
