//! Match operators.
//!
//! Nodes live in a per-grammar arena and are addressed by [`NodeId`]. The
//! builder appends them as the DSL is evaluated; symbolic parts (rule names,
//! keyword names, qualified flag names, invoke aliases) are written with an
//! unresolved placeholder and patched in place by `link()`. After linking the
//! arena is never mutated again.

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use bitflags::bitflags;

use crate::keyword::KeywordTrie;
use crate::{Grammar, GrammarId, KeywordId, NodeId, RuleId, State};

bitflags! {
    /// Per-node matching options.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MatchOptions: u8 {
        /// Succeed exactly where the plain node would fail (terminals and lookarounds).
        const INVERT = 1 << 0;
        /// ASCII case-insensitive comparison (`STRING` and `KEYWORD`).
        const CASELESS = 1 << 1;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RuleFlags: u8 {
        /// Splice the rule's children into the parent token instead of producing a token.
        const VOID = 1 << 0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RepeatMode {
    Plain,
    Lazy,
    Greedy,
}

/// Client callback for `CALL`: `(text, offset, state) -> end`.
#[derive(Clone)]
pub(crate) struct Callback(pub(crate) Arc<dyn Fn(&[u8], usize, &mut State<'_>) -> Option<usize> + Send + Sync>);

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<function>")
    }
}

/// A rule reference; `scope == None` means the grammar owning the node.
#[derive(Debug, Clone)]
pub(crate) struct RuleTarget {
    pub(crate) name: String,
    pub(crate) scope: Option<Arc<Grammar>>,
    pub(crate) rule: RuleId,
}

impl RuleTarget {
    pub(crate) fn unresolved(name: &str) -> Self {
        Self { name: name.to_owned(), scope: None, rule: RuleId(u32::MAX) }
    }

    /// The grammar the rule lives in.
    pub(crate) fn grammar<'a>(&'a self, owner: &'a Grammar) -> &'a Grammar {
        self.scope.as_deref().unwrap_or(owner)
    }
}

/// A flag or capture slot in some grammar's scope.
#[derive(Debug, Clone)]
pub(crate) struct StateSlot {
    pub(crate) name: String,
    pub(crate) scope: GrammarId,
    pub(crate) id: usize,
}

#[derive(Debug, Clone)]
pub(crate) enum Node {
    // Terminals.
    Char { ch: u8, options: MatchOptions },
    /// `> ch`, or `>= ch` with `or_equal`; `INVERT` gives the `BELOW` family.
    Greater { ch: u8, or_equal: bool, options: MatchOptions },
    Any,
    Range { min: u8, max: u8, options: MatchOptions },
    OneOf { bytes: Vec<u8>, options: MatchOptions },
    /// `bytes` are lowercased when `CASELESS` is set.
    Literal { bytes: Vec<u8>, options: MatchOptions },
    Keyword { trie: KeywordTrie },

    // Quantifiers.
    Repeat { mode: RepeatMode, min: usize, max: usize, body: NodeId },
    Length { min: usize, max: usize, body: NodeId },

    // Anchors and lookaround.
    Boi,
    Eoi,
    Pass,
    Fail,
    Find { body: NodeId },
    Ahead { body: NodeId, options: MatchOptions },
    /// `width` is the body's static match length, filled in by `link()`.
    Behind { body: NodeId, options: MatchOptions, width: usize },

    // Composition.
    Choice { alternatives: Vec<NodeId> },
    LongestChoice { alternatives: Vec<NodeId> },
    Glue { elements: Vec<NodeId> },

    Expect { message: String, body: NodeId },
    Call { callback: Callback },

    // Match state.
    Set { flag: StateSlot, value: bool },
    If { flag: StateSlot, then: NodeId, otherwise: NodeId },
    Capture { capture: StateSlot, body: NodeId },
    Replay { capture: StateSlot },

    // Linkage.
    Ref { target: RuleTarget },
    Inline { target: RuleTarget },
    Previous { target: RuleTarget, keyword: Option<(String, KeywordId)> },
    Context { target: RuleTarget, inside: NodeId, outside: NodeId },
    Invoke { alias: String, grammar: Option<Arc<Grammar>>, coverage: Option<NodeId> },
}

impl Node {
    /// Direct children in evaluation order.
    pub(crate) fn children(&self) -> Vec<NodeId> {
        match self {
            Node::Repeat { body, .. }
            | Node::Length { body, .. }
            | Node::Find { body }
            | Node::Ahead { body, .. }
            | Node::Behind { body, .. }
            | Node::Expect { body, .. }
            | Node::Capture { body, .. } => vec![*body],
            Node::Choice { alternatives } | Node::LongestChoice { alternatives } => alternatives.clone(),
            Node::Glue { elements } => elements.clone(),
            Node::If { then, otherwise, .. } => vec![*then, *otherwise],
            Node::Context { inside, outside, .. } => vec![*inside, *outside],
            Node::Invoke { coverage, .. } => coverage.iter().copied().collect(),
            _ => Vec::new(),
        }
    }

    /// Whether the children of this node continue with this node's own successor.
    pub(crate) fn passes_successor(&self) -> bool {
        matches!(
            self,
            Node::Choice { .. }
                | Node::LongestChoice { .. }
                | Node::Expect { .. }
                | Node::Capture { .. }
                | Node::Length { .. }
                | Node::If { .. }
                | Node::Context { .. }
        )
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Node::Char { options, .. } if options.contains(MatchOptions::INVERT) => "OTHER",
            Node::Char { .. } => "CHAR",
            Node::Greater { or_equal: false, options, .. } if options.contains(MatchOptions::INVERT) => {
                "BELOW_OR_EQUAL"
            }
            Node::Greater { or_equal: true, options, .. } if options.contains(MatchOptions::INVERT) => "BELOW",
            Node::Greater { or_equal: false, .. } => "GREATER",
            Node::Greater { or_equal: true, .. } => "GREATER_OR_EQUAL",
            Node::Any => "ANY",
            Node::Range { options, .. } | Node::OneOf { options, .. }
                if options.contains(MatchOptions::INVERT) =>
            {
                "EXCEPT"
            }
            Node::Range { .. } | Node::OneOf { .. } => "RANGE",
            Node::Literal { .. } => "STRING",
            Node::Keyword { .. } => "KEYWORD",
            Node::Repeat { mode: RepeatMode::Plain, .. } => "REPEAT",
            Node::Repeat { mode: RepeatMode::Lazy, .. } => "LAZY_REPEAT",
            Node::Repeat { mode: RepeatMode::Greedy, .. } => "GREEDY_REPEAT",
            Node::Length { .. } => "LENGTH",
            Node::Boi => "BOI",
            Node::Eoi => "EOI",
            Node::Pass => "PASS",
            Node::Fail => "FAIL",
            Node::Find { .. } => "FIND",
            Node::Ahead { options, .. } if options.contains(MatchOptions::INVERT) => "NOT",
            Node::Ahead { .. } => "AHEAD",
            Node::Behind { options, .. } if options.contains(MatchOptions::INVERT) => "NOT_BEHIND",
            Node::Behind { .. } => "BEHIND",
            Node::Choice { .. } => "CHOICE",
            Node::LongestChoice { .. } => "LONGEST_CHOICE",
            Node::Glue { .. } => "GLUE",
            Node::Expect { .. } => "EXPECT",
            Node::Call { .. } => "CALL",
            Node::Set { .. } => "SET",
            Node::If { .. } => "IF",
            Node::Capture { .. } => "CAPTURE",
            Node::Replay { .. } => "REPLAY",
            Node::Ref { .. } => "REF",
            Node::Inline { .. } => "INLINE",
            Node::Previous { .. } => "PREVIOUS",
            Node::Context { .. } => "CONTEXT",
            Node::Invoke { .. } => "INVOKE",
        }
    }
}

/// Matches `b` against a single-byte terminal. `None` for non-terminals.
pub(crate) fn match_byte(node: &Node, b: u8) -> Option<bool> {
    let (hit, options) = match node {
        Node::Char { ch, options } => (b == *ch, *options),
        Node::Greater { ch, or_equal: false, options } => (b > *ch, *options),
        Node::Greater { ch, or_equal: true, options } => (b >= *ch, *options),
        Node::Range { min, max, options } => ((*min..=*max).contains(&b), *options),
        Node::OneOf { bytes, options } => (bytes.contains(&b), *options),
        Node::Any => (true, MatchOptions::empty()),
        _ => return None,
    };
    Some(hit != options.contains(MatchOptions::INVERT))
}

/// Compares a literal against `text` at `pos`, returning the end offset.
pub(crate) fn match_literal(bytes: &[u8], options: MatchOptions, text: &[u8], pos: usize) -> Option<usize> {
    let end = pos.checked_add(bytes.len())?;
    let window = text.get(pos..end)?;
    let hit = if options.contains(MatchOptions::CASELESS) {
        window.eq_ignore_ascii_case(bytes)
    } else {
        window == bytes
    };
    hit.then_some(end)
}

/// Length of a capture range, for `REPLAY`.
pub(crate) fn replay(text: &[u8], captured: Range<usize>, pos: usize) -> Option<usize> {
    let needle = text.get(captured)?;
    match_literal(needle, MatchOptions::empty(), text, pos)
}
