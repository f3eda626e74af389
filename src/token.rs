//! Concrete syntax tree.
//!
//! Tokens live in an index arena owned by one match. The matcher builds the
//! tree optimistically: a rule appends its token to the parent before its body
//! is tried, and unlinks it again on failure. Unlinked slots go to a free list
//! and are recycled by the next token produced in the same match.
//!
//! ```text
//!   parent
//!     │ first_child                    last_child
//!     ▼                                    ▼
//!   child ──next──▶ child ──next──▶ ... child
//!         ◀──prev──       ◀──prev──
//! ```

use std::fmt;
use std::ops::Range;

use crate::{GrammarId, KeywordId, RuleId};

/// Arena index of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenId(u32);

impl TokenId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
struct Slot {
    grammar: GrammarId,
    rule: RuleId,
    keyword: Option<KeywordId>,
    range: Range<usize>,
    parent: Option<TokenId>,
    first_child: Option<TokenId>,
    last_child: Option<TokenId>,
    prev: Option<TokenId>,
    next: Option<TokenId>,
}

impl Slot {
    fn new(grammar: GrammarId, rule: RuleId) -> Self {
        Self {
            grammar,
            rule,
            keyword: None,
            range: 0..0,
            parent: None,
            first_child: None,
            last_child: None,
            prev: None,
            next: None,
        }
    }
}

/// Token arena with an allocation pool.
#[derive(Debug, Clone, Default)]
pub struct TokenTree {
    slots: Vec<Slot>,
    free: Vec<TokenId>,
    produced: usize,
    recycled: usize,
}

impl TokenTree {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Number of tokens created, counting recycled slots.
    pub fn produced(&self) -> usize {
        self.produced
    }

    /// Number of tokens served from the free list.
    pub fn recycled(&self) -> usize {
        self.recycled
    }

    pub fn get(&self, id: TokenId) -> Token<'_> {
        Token { tree: self, id }
    }

    // --- Mutation --------------------------------------------------------------

    pub(crate) fn produce(&mut self, grammar: GrammarId, rule: RuleId) -> TokenId {
        self.produced += 1;
        match self.free.pop() {
            Some(id) => {
                self.recycled += 1;
                self.slots[id.index()] = Slot::new(grammar, rule);
                id
            }
            None => {
                let id = TokenId(self.slots.len() as u32);
                self.slots.push(Slot::new(grammar, rule));
                id
            }
        }
    }

    pub(crate) fn append_child(&mut self, parent: TokenId, child: TokenId) {
        let last = self.slots[parent.index()].last_child;
        {
            let c = &mut self.slots[child.index()];
            c.parent = Some(parent);
            c.prev = last;
            c.next = None;
        }
        match last {
            Some(last) => self.slots[last.index()].next = Some(child),
            None => self.slots[parent.index()].first_child = Some(child),
        }
        self.slots[parent.index()].last_child = Some(child);
    }

    /// Detaches `token` from its parent and siblings and returns its subtree to the pool.
    pub(crate) fn unlink(&mut self, token: TokenId) {
        self.detach(token);
        let mut stack = vec![token];
        while let Some(id) = stack.pop() {
            let mut child = self.slots[id.index()].first_child;
            while let Some(c) = child {
                stack.push(c);
                child = self.slots[c.index()].next;
            }
            self.free.push(id);
        }
    }

    fn detach(&mut self, token: TokenId) {
        let Slot { parent, prev, next, .. } = self.slots[token.index()].clone();
        match prev {
            Some(p) => self.slots[p.index()].next = next,
            None => {
                if let Some(parent) = parent {
                    self.slots[parent.index()].first_child = next;
                }
            }
        }
        match next {
            Some(n) => self.slots[n.index()].prev = prev,
            None => {
                if let Some(parent) = parent {
                    self.slots[parent.index()].last_child = prev;
                }
            }
        }
        let slot = &mut self.slots[token.index()];
        slot.parent = None;
        slot.prev = None;
        slot.next = None;
    }

    /// Moves every child of `donor` to the end of `parent`'s child list.
    pub(crate) fn append_all_children_of(&mut self, parent: TokenId, donor: TokenId) {
        while let Some(child) = self.slots[donor.index()].first_child {
            self.detach(child);
            self.append_child(parent, child);
        }
    }

    /// Unlinks children of `parent` appended after `checkpoint`.
    ///
    /// Returns the number of subtrees removed.
    pub(crate) fn rollback(&mut self, parent: TokenId, checkpoint: Option<TokenId>) -> usize {
        let mut removed = 0;
        loop {
            let last = self.slots[parent.index()].last_child;
            match last {
                Some(last) if Some(last) != checkpoint => {
                    self.unlink(last);
                    removed += 1;
                }
                _ => return removed,
            }
        }
    }

    pub(crate) fn last_child(&self, parent: TokenId) -> Option<TokenId> {
        self.slots[parent.index()].last_child
    }

    pub(crate) fn set_range(&mut self, token: TokenId, range: Range<usize>) {
        self.slots[token.index()].range = range;
    }

    pub(crate) fn set_keyword(&mut self, token: TokenId, keyword: KeywordId) {
        self.slots[token.index()].keyword = Some(keyword);
    }

    pub(crate) fn keyword_of(&self, token: TokenId) -> Option<KeywordId> {
        self.slots[token.index()].keyword
    }

    pub(crate) fn restore_keyword(&mut self, token: TokenId, keyword: Option<KeywordId>) {
        self.slots[token.index()].keyword = keyword;
    }
}

// --- Read-only views ----------------------------------------------------------

/// Borrowed view of one token.
#[derive(Clone, Copy)]
pub struct Token<'t> {
    tree: &'t TokenTree,
    id: TokenId,
}

impl<'t> Token<'t> {
    fn slot(&self) -> &'t Slot {
        &self.tree.slots[self.id.index()]
    }

    fn view(&self, id: Option<TokenId>) -> Option<Token<'t>> {
        id.map(|id| Token { tree: self.tree, id })
    }

    pub fn id(&self) -> TokenId {
        self.id
    }

    /// Grammar whose rule produced this token.
    pub fn grammar(&self) -> GrammarId {
        self.slot().grammar
    }

    pub fn rule(&self) -> RuleId {
        self.slot().rule
    }

    pub fn keyword(&self) -> Option<KeywordId> {
        self.slot().keyword
    }

    /// Half-open byte range `[start, end)`.
    pub fn range(&self) -> Range<usize> {
        self.slot().range.clone()
    }

    pub fn start(&self) -> usize {
        self.slot().range.start
    }

    pub fn end(&self) -> usize {
        self.slot().range.end
    }

    pub fn len(&self) -> usize {
        self.slot().range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slot().range.is_empty()
    }

    /// The matched bytes. Empty if `text` is not the matched input.
    pub fn text<'s>(&self, text: &'s [u8]) -> &'s [u8] {
        text.get(self.range()).unwrap_or_default()
    }

    pub fn parent(&self) -> Option<Token<'t>> {
        self.view(self.slot().parent)
    }

    pub fn first_child(&self) -> Option<Token<'t>> {
        self.view(self.slot().first_child)
    }

    pub fn last_child(&self) -> Option<Token<'t>> {
        self.view(self.slot().last_child)
    }

    pub fn next_sibling(&self) -> Option<Token<'t>> {
        self.view(self.slot().next)
    }

    pub fn previous_sibling(&self) -> Option<Token<'t>> {
        self.view(self.slot().prev)
    }

    pub fn children(&self) -> Children<'t> {
        Children { next: self.first_child() }
    }

    /// Pre-order walk of the subtree below this token (excluding itself).
    pub fn descendants(&self) -> Descendants<'t> {
        let mut stack: Vec<_> = self.children().collect();
        stack.reverse();
        Descendants { stack }
    }

    /// Depth-first walk over the childless tokens of this subtree.
    ///
    /// A token without children is its own only leaf.
    pub fn leaves(&self) -> Leaves<'t> {
        Leaves { stack: vec![*self] }
    }
}

impl fmt::Debug for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("id", &self.id)
            .field("rule", &self.rule())
            .field("range", &self.range())
            .field("keyword", &self.keyword())
            .finish()
    }
}

pub struct Children<'t> {
    next: Option<Token<'t>>,
}

impl<'t> Iterator for Children<'t> {
    type Item = Token<'t>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.next_sibling();
        Some(current)
    }
}

pub struct Descendants<'t> {
    stack: Vec<Token<'t>>,
}

impl<'t> Iterator for Descendants<'t> {
    type Item = Token<'t>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.stack.pop()?;
        let start = self.stack.len();
        self.stack.extend(current.children());
        self.stack[start..].reverse();
        Some(current)
    }
}

pub struct Leaves<'t> {
    stack: Vec<Token<'t>>,
}

impl<'t> Iterator for Leaves<'t> {
    type Item = Token<'t>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(current) = self.stack.pop() {
            if current.first_child().is_none() {
                return Some(current);
            }
            let start = self.stack.len();
            self.stack.extend(current.children());
            self.stack[start..].reverse();
        }
        None
    }
}

// --- Match result -------------------------------------------------------------

/// The token tree produced by a successful match.
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    tree: TokenTree,
    root: TokenId,
}

impl SyntaxTree {
    pub(crate) fn new(tree: TokenTree, root: TokenId) -> Self {
        Self { tree, root }
    }

    pub fn root(&self) -> Token<'_> {
        self.tree.get(self.root)
    }

    /// Offset one past the last matched byte.
    pub fn end(&self) -> usize {
        self.root().end()
    }

    pub fn tree(&self) -> &TokenTree {
        &self.tree
    }

    /// Every token reachable from the root, root first.
    pub fn tokens(&self) -> impl Iterator<Item = Token<'_>> {
        std::iter::once(self.root()).chain(self.root().descendants())
    }
}
