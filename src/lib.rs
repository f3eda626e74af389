//! An interpreted PEG grammar engine.
//!
//! A grammar is a tree of match operators ("nodes") assembled with a
//! [`GrammarBuilder`], linked once into an immutable [`Grammar`], and then
//! evaluated directly against byte buffers. While matching, the engine builds a
//! concrete syntax tree of [`Token`]s optimistically and rolls it back whenever
//! an alternative fails, so a successful match always hands back a clean tree.
//!
//! ```text
//! GrammarBuilder ──link()──▶ Grammar (Send + Sync, shareable)
//!                                │
//!            match_at / find ────┼── State (flags, captures, hint)
//!                                └── TokenTree (arena, pooled slots)
//!                                        │
//!                                        ▼
//!                                   SyntaxTree
//! ```
//!
//! # Example
//! ```
//! use syntagma::GrammarBuilder;
//!
//! let b = GrammarBuilder::new("pair");
//! b.define("Word", b.repeat(1.., b.range(b'a', b'z')));
//! b.define("Pair", b.glue([b.reference("Word"), b.ch(b'='), b.reference("Word")]));
//! b.entry("Pair");
//! let grammar = b.link().unwrap();
//!
//! let tree = grammar.match_at("key=value", 0).unwrap();
//! assert_eq!(tree.end(), 9);
//! assert_eq!(tree.root().children().count(), 2);
//! ```

use std::sync::atomic::{AtomicU32, Ordering};

mod api;
mod builder;
mod engine;
mod error;
mod explain;
mod grammar;
pub mod grammars;
mod keyword;
mod node;
mod state;
mod token;

pub use api::MatchRun;
pub use builder::GrammarBuilder;
pub use engine::MatchMetrics;
pub use error::{GrammarError, SyntaxError};
pub use grammar::{Grammar, Rule};
pub use node::{MatchOptions, RuleFlags};
pub use state::{Hint, State};
pub use token::{Children, Descendants, Leaves, SyntaxTree, Token, TokenId, TokenTree};

// --- Identifiers -------------------------------------------------------------

/// Process-unique identity of a grammar.
///
/// Tokens carry the id of the grammar whose rule produced them, and match
/// state keys its per-scope storage by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GrammarId(u32);

impl GrammarId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU32 = AtomicU32::new(1);
        GrammarId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Index of a rule within its grammar, in definition order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RuleId(pub(crate) u32);

impl RuleId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Grammar-wide keyword number assigned by [`GrammarBuilder::keyword`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeywordId(pub(crate) u32);

impl KeywordId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Opaque handle to a node in a grammar under construction.
///
/// Handles are only valid for the builder that returned them, and each handle
/// may be placed into the grammar exactly once (as a rule body or as the child
/// of another node).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    pub(crate) grammar: GrammarId,
    pub(crate) index: u32,
}

impl NodeId {
    pub(crate) fn index(self) -> usize {
        self.index as usize
    }
}
