//! Grammar construction DSL.
//!
//! Every method appends one node to the builder's arena and returns its handle,
//! so grammars read as nested calls:
//!
//! ```
//! use syntagma::GrammarBuilder;
//!
//! let b = GrammarBuilder::new("float");
//! b.define("Sign", b.range_of(b"+-"));
//! b.define("Digits", b.repeat(1.., b.range(b'0', b'9')));
//! b.define("Literal", b.glue([b.optional(b.reference("Sign")), b.reference("Digits")]));
//! b.entry("Literal");
//! assert!(b.link().is_ok());
//! ```
//!
//! Names (rules, keywords, qualified flags and captures, invoke aliases) are
//! recorded symbolically and resolved by [`link`](GrammarBuilder::link); a name
//! may therefore be referenced before it is defined.

use std::cell::RefCell;
use std::collections::HashMap;
use std::ops::{Bound, RangeBounds};
use std::sync::Arc;

use crate::engine::link;
use crate::keyword::KeywordTrie;
use crate::node::{Callback, MatchOptions, Node, RepeatMode, RuleFlags, RuleTarget, StateSlot};
use crate::{Grammar, GrammarError, GrammarId, KeywordId, NodeId, State};

/// A symbolic reference waiting for `link()`.
#[derive(Debug, Clone)]
pub(crate) enum Pending {
    /// `REF`, `INLINE`, `PREVIOUS`, `CONTEXT` targets.
    Rule(NodeId),
    /// Qualified `alias::name` flag of `SET` / `IF`.
    Flag(NodeId),
    /// Qualified `alias::name` capture of `CAPTURE` / `REPLAY`.
    Capture(NodeId),
    Invoke(NodeId),
}

#[derive(Debug, Clone)]
pub(crate) struct RuleDraft {
    pub(crate) name: String,
    pub(crate) entry: NodeId,
    pub(crate) flags: RuleFlags,
}

/// Everything the builder collected; consumed by `link()`.
#[derive(Debug)]
pub(crate) struct Draft {
    pub(crate) id: GrammarId,
    pub(crate) name: Option<String>,
    pub(crate) caseless: bool,
    pub(crate) nodes: Vec<Node>,
    pub(crate) rules: Vec<RuleDraft>,
    pub(crate) keywords: Vec<String>,
    pub(crate) keyword_by_name: HashMap<String, KeywordId>,
    pub(crate) flags: Vec<String>,
    pub(crate) captures: Vec<String>,
    pub(crate) imports: Vec<(String, Arc<Grammar>)>,
    pub(crate) entry: Option<String>,
    pub(crate) pending: Vec<Pending>,
    /// First error is reported by `link()`.
    pub(crate) errors: Vec<GrammarError>,
}

pub struct GrammarBuilder {
    draft: RefCell<Draft>,
}

impl GrammarBuilder {
    /// Starts a named grammar. The name is the default import alias.
    pub fn new(name: &str) -> Self {
        Self::with_name(Some(name.to_owned()))
    }

    /// Starts a grammar that can only be imported under an explicit alias.
    pub fn anonymous() -> Self {
        Self::with_name(None)
    }

    fn with_name(name: Option<String>) -> Self {
        Self {
            draft: RefCell::new(Draft {
                id: GrammarId::next(),
                name,
                caseless: false,
                nodes: Vec::new(),
                rules: Vec::new(),
                keywords: Vec::new(),
                keyword_by_name: HashMap::new(),
                flags: Vec::new(),
                captures: Vec::new(),
                imports: Vec::new(),
                entry: None,
                pending: Vec::new(),
                errors: Vec::new(),
            }),
        }
    }

    fn push(&self, node: Node) -> NodeId {
        let mut d = self.draft.borrow_mut();
        let id = NodeId { grammar: d.id, index: d.nodes.len() as u32 };
        d.nodes.push(node);
        id
    }

    fn push_pending(&self, node: Node, pending: impl FnOnce(NodeId) -> Pending) -> NodeId {
        let id = self.push(node);
        self.draft.borrow_mut().pending.push(pending(id));
        id
    }

    /// Options for subsequent `string` and `keyword` nodes (default: case-sensitive).
    pub fn case_sensitive(&self, yes: bool) {
        self.draft.borrow_mut().caseless = !yes;
    }

    fn case_options(&self) -> MatchOptions {
        if self.draft.borrow().caseless { MatchOptions::CASELESS } else { MatchOptions::empty() }
    }

    // --- Terminals ---------------------------------------------------------------

    pub fn ch(&self, ch: u8) -> NodeId {
        self.push(Node::Char { ch, options: MatchOptions::empty() })
    }

    /// Any byte except `ch`.
    pub fn other(&self, ch: u8) -> NodeId {
        self.push(Node::Char { ch, options: MatchOptions::INVERT })
    }

    pub fn greater(&self, ch: u8) -> NodeId {
        self.push(Node::Greater { ch, or_equal: false, options: MatchOptions::empty() })
    }

    pub fn greater_or_equal(&self, ch: u8) -> NodeId {
        self.push(Node::Greater { ch, or_equal: true, options: MatchOptions::empty() })
    }

    /// A byte strictly below `ch`.
    pub fn below(&self, ch: u8) -> NodeId {
        self.push(Node::Greater { ch, or_equal: true, options: MatchOptions::INVERT })
    }

    pub fn below_or_equal(&self, ch: u8) -> NodeId {
        self.push(Node::Greater { ch, or_equal: false, options: MatchOptions::INVERT })
    }

    pub fn any(&self) -> NodeId {
        self.push(Node::Any)
    }

    /// A byte in `min..=max`.
    pub fn range(&self, min: u8, max: u8) -> NodeId {
        self.push(Node::Range { min, max, options: MatchOptions::empty() })
    }

    /// A byte contained in `bytes`.
    pub fn range_of(&self, bytes: &[u8]) -> NodeId {
        self.push(Node::OneOf { bytes: bytes.to_vec(), options: MatchOptions::empty() })
    }

    /// A byte outside `min..=max`.
    pub fn except(&self, min: u8, max: u8) -> NodeId {
        self.push(Node::Range { min, max, options: MatchOptions::INVERT })
    }

    pub fn except_of(&self, bytes: &[u8]) -> NodeId {
        self.push(Node::OneOf { bytes: bytes.to_vec(), options: MatchOptions::INVERT })
    }

    pub fn string(&self, s: impl AsRef<[u8]>) -> NodeId {
        let options = self.case_options();
        let bytes = if options.contains(MatchOptions::CASELESS) {
            s.as_ref().to_ascii_lowercase()
        } else {
            s.as_ref().to_vec()
        };
        self.push(Node::Literal { bytes, options })
    }

    /// Longest match among the whitespace-separated `words`.
    ///
    /// Keyword ids are grammar-wide: the same word used in two `keyword` nodes
    /// gets the same id. A match tags the enclosing rule token with the id.
    pub fn keyword(&self, words: &str) -> NodeId {
        let caseless = self.draft.borrow().caseless;
        let mut trie = KeywordTrie::new(caseless);
        {
            let mut d = self.draft.borrow_mut();
            for word in words.split_whitespace() {
                let id = match d.keyword_by_name.get(word) {
                    Some(id) => *id,
                    None => {
                        let id = KeywordId(d.keywords.len() as u32);
                        d.keywords.push(word.to_owned());
                        d.keyword_by_name.insert(word.to_owned(), id);
                        id
                    }
                };
                trie.insert(word.as_bytes(), id);
            }
        }
        self.push(Node::Keyword { trie })
    }

    // --- Quantifiers -------------------------------------------------------------

    /// Matches `body` between the bounds of `count` times, as often as possible.
    ///
    /// # Panics
    /// Matching panics if `body` succeeds without consuming input.
    pub fn repeat(&self, count: impl RangeBounds<usize>, body: NodeId) -> NodeId {
        let (min, max) = bounds(count);
        self.push(Node::Repeat { mode: RepeatMode::Plain, min, max, body })
    }

    /// Like [`repeat`](Self::repeat), but stops as soon as what follows the repeat matches.
    pub fn lazy_repeat(&self, count: impl RangeBounds<usize>, body: NodeId) -> NodeId {
        let (min, max) = bounds(count);
        self.push(Node::Repeat { mode: RepeatMode::Lazy, min, max, body })
    }

    /// Like [`repeat`](Self::repeat), but gives repetitions back until what follows matches.
    pub fn greedy_repeat(&self, count: impl RangeBounds<usize>, body: NodeId) -> NodeId {
        let (min, max) = bounds(count);
        self.push(Node::Repeat { mode: RepeatMode::Greedy, min, max, body })
    }

    pub fn optional(&self, body: NodeId) -> NodeId {
        self.repeat(0..=1, body)
    }

    /// Succeeds if `body` matches between `min` and `max` bytes.
    pub fn length(&self, count: impl RangeBounds<usize>, body: NodeId) -> NodeId {
        let (min, max) = bounds(count);
        self.push(Node::Length { min, max, body })
    }

    // --- Anchors -------------------------------------------------------------------

    pub fn boi(&self) -> NodeId {
        self.push(Node::Boi)
    }

    pub fn eoi(&self) -> NodeId {
        self.push(Node::Eoi)
    }

    pub fn pass(&self) -> NodeId {
        self.push(Node::Pass)
    }

    pub fn fail(&self) -> NodeId {
        self.push(Node::Fail)
    }

    /// Scans forward from the current offset for the first match of `body`.
    pub fn find(&self, body: NodeId) -> NodeId {
        self.push(Node::Find { body })
    }

    pub fn ahead(&self, body: NodeId) -> NodeId {
        self.push(Node::Ahead { body, options: MatchOptions::empty() })
    }

    pub fn not(&self, body: NodeId) -> NodeId {
        self.push(Node::Ahead { body, options: MatchOptions::INVERT })
    }

    /// Lookbehind; `body` must have a fixed match length.
    pub fn behind(&self, body: NodeId) -> NodeId {
        self.push(Node::Behind { body, options: MatchOptions::empty(), width: 0 })
    }

    pub fn not_behind(&self, body: NodeId) -> NodeId {
        self.push(Node::Behind { body, options: MatchOptions::INVERT, width: 0 })
    }

    // --- Composition ---------------------------------------------------------------

    /// Ordered choice: the first alternative that matches wins.
    pub fn choice(&self, alternatives: impl IntoIterator<Item = NodeId>) -> NodeId {
        self.push(Node::Choice { alternatives: alternatives.into_iter().collect() })
    }

    /// Tries every alternative and keeps the one reaching furthest (earliest on ties).
    pub fn longest_choice(&self, alternatives: impl IntoIterator<Item = NodeId>) -> NodeId {
        self.push(Node::LongestChoice { alternatives: alternatives.into_iter().collect() })
    }

    /// Sequence.
    pub fn glue(&self, elements: impl IntoIterator<Item = NodeId>) -> NodeId {
        self.push(Node::Glue { elements: elements.into_iter().collect() })
    }

    /// On failure of `body`, records `message` as the match hint and stops further alternatives.
    pub fn expect(&self, message: &str, body: NodeId) -> NodeId {
        self.push(Node::Expect { message: message.to_owned(), body })
    }

    pub fn call<F>(&self, f: F) -> NodeId
    where
        F: Fn(&[u8], usize, &mut State<'_>) -> Option<usize> + Send + Sync + 'static,
    {
        self.push(Node::Call { callback: Callback(Arc::new(f)) })
    }

    // --- Match state -------------------------------------------------------------------

    pub fn set(&self, flag: &str, value: bool) -> NodeId {
        let (slot, qualified) = self.flag_slot(flag);
        let node = Node::Set { flag: slot, value };
        if qualified { self.push_pending(node, Pending::Flag) } else { self.push(node) }
    }

    pub fn if_flag(&self, flag: &str, then: NodeId, otherwise: NodeId) -> NodeId {
        let (slot, qualified) = self.flag_slot(flag);
        let node = Node::If { flag: slot, then, otherwise };
        if qualified { self.push_pending(node, Pending::Flag) } else { self.push(node) }
    }

    /// Stores the byte range matched by `body` under `name`.
    pub fn capture(&self, name: &str, body: NodeId) -> NodeId {
        let (slot, qualified) = self.capture_slot(name);
        let node = Node::Capture { capture: slot, body };
        if qualified { self.push_pending(node, Pending::Capture) } else { self.push(node) }
    }

    /// Matches the bytes last captured under `name` again.
    pub fn replay(&self, name: &str) -> NodeId {
        let (slot, qualified) = self.capture_slot(name);
        let node = Node::Replay { capture: slot };
        if qualified { self.push_pending(node, Pending::Capture) } else { self.push(node) }
    }

    /// Local names get their id on first use; qualified names wait for `link()`.
    fn flag_slot(&self, name: &str) -> (StateSlot, bool) {
        let mut d = self.draft.borrow_mut();
        let scope = d.id;
        let (id, qualified) = local_slot(&mut d.flags, name);
        (StateSlot { name: name.to_owned(), scope, id }, qualified)
    }

    fn capture_slot(&self, name: &str) -> (StateSlot, bool) {
        let mut d = self.draft.borrow_mut();
        let scope = d.id;
        let (id, qualified) = local_slot(&mut d.captures, name);
        (StateSlot { name: name.to_owned(), scope, id }, qualified)
    }

    // --- Linkage -------------------------------------------------------------------------

    /// Matches rule `name`, producing its token as a child of the current one.
    pub fn reference(&self, name: &str) -> NodeId {
        self.push_pending(Node::Ref { target: RuleTarget::unresolved(name) }, Pending::Rule)
    }

    /// Matches the body of rule `name` without producing a token for it.
    pub fn inline(&self, name: &str) -> NodeId {
        self.push_pending(Node::Inline { target: RuleTarget::unresolved(name) }, Pending::Rule)
    }

    /// Succeeds without consuming input if the token before the current one came
    /// from rule `name` (and, if given, carries `keyword`).
    pub fn previous(&self, name: &str, keyword: Option<&str>) -> NodeId {
        let keyword = keyword.map(|word| (word.to_owned(), KeywordId(u32::MAX)));
        self.push_pending(Node::Previous { target: RuleTarget::unresolved(name), keyword }, Pending::Rule)
    }

    /// Matches `inside` when the enclosing rule's parent token comes from rule
    /// `name`, `outside` otherwise. Fails at the top level.
    pub fn context(&self, name: &str, inside: NodeId, outside: NodeId) -> NodeId {
        self.push_pending(Node::Context { target: RuleTarget::unresolved(name), inside, outside }, Pending::Rule)
    }

    /// Hands matching over to another grammar's entry rule.
    ///
    /// With `coverage`, the invoked grammar only sees input up to where
    /// `coverage` would end.
    pub fn invoke(&self, grammar: Arc<Grammar>, coverage: Option<NodeId>) -> NodeId {
        let alias = grammar.name().unwrap_or("<anonymous>").to_owned();
        self.push(Node::Invoke { alias, grammar: Some(grammar), coverage })
    }

    /// Like [`invoke`](Self::invoke), naming a grammar imported under `alias`.
    pub fn invoke_alias(&self, alias: &str, coverage: Option<NodeId>) -> NodeId {
        self.push_pending(Node::Invoke { alias: alias.to_owned(), grammar: None, coverage }, Pending::Invoke)
    }

    // --- Rules and scopes ------------------------------------------------------------------

    pub fn define(&self, name: &str, body: NodeId) {
        self.define_with(name, body, RuleFlags::empty());
    }

    /// Defines a rule whose children are spliced into the parent token.
    pub fn define_void(&self, name: &str, body: NodeId) {
        self.define_with(name, body, RuleFlags::VOID);
    }

    fn define_with(&self, name: &str, body: NodeId, flags: RuleFlags) {
        let mut d = self.draft.borrow_mut();
        if d.rules.iter().any(|r| r.name == name) {
            d.errors.push(GrammarError::DuplicateRule(name.to_owned()));
            return;
        }
        d.rules.push(RuleDraft { name: name.to_owned(), entry: body, flags });
    }

    pub fn entry(&self, name: &str) {
        self.draft.borrow_mut().entry = Some(name.to_owned());
    }

    /// Makes `grammar`'s rules, flags and captures reachable as `name::...`.
    pub fn import(&self, grammar: Arc<Grammar>) {
        match grammar.name().map(str::to_owned) {
            Some(alias) => self.import_as(grammar, &alias),
            None => self.draft.borrow_mut().errors.push(GrammarError::AnonymousImport),
        }
    }

    pub fn import_as(&self, grammar: Arc<Grammar>, alias: &str) {
        let mut d = self.draft.borrow_mut();
        if d.imports.iter().any(|(a, _)| a == alias) {
            d.errors.push(GrammarError::DuplicateImport(alias.to_owned()));
            return;
        }
        d.imports.push((alias.to_owned(), grammar));
    }

    /// Resolves every name and freezes the grammar.
    pub fn link(self) -> Result<Grammar, GrammarError> {
        link::link(self.draft.into_inner())
    }
}

fn local_slot(names: &mut Vec<String>, name: &str) -> (usize, bool) {
    if name.contains("::") {
        return (usize::MAX, true);
    }
    match names.iter().position(|n| n == name) {
        Some(id) => (id, false),
        None => {
            names.push(name.to_owned());
            (names.len() - 1, false)
        }
    }
}

/// `(min, max)`; an unbounded end is `usize::MAX`.
fn bounds(count: impl RangeBounds<usize>) -> (usize, usize) {
    let min = match count.start_bound() {
        Bound::Included(n) => *n,
        Bound::Excluded(n) => n.saturating_add(1),
        Bound::Unbounded => 0,
    };
    let max = match count.end_bound() {
        Bound::Included(n) => *n,
        Bound::Excluded(n) => n.saturating_sub(1),
        Bound::Unbounded => usize::MAX,
    };
    (min, max)
}
