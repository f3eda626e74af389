use log::{Level, debug, log_enabled, trace};

use crate::engine::MatchMetrics;
use crate::grammar::Rule;
use crate::node::{self, MatchOptions, Node, RepeatMode};
use crate::{Grammar, KeywordId, NodeId, State, TokenId, TokenTree};

/// Last child of the parent token before an attempt; everything after it is
/// removed when the attempt fails.
type Checkpoint = Option<TokenId>;

/// Drives one match: owns the token arena and borrows the caller's state.
pub(crate) struct Matcher<'m, 'g> {
    text: &'m [u8],
    tree: TokenTree,
    state: &'m mut State<'g>,
    metrics: MatchMetrics,
}

impl<'m, 'g> Matcher<'m, 'g> {
    pub(crate) fn new(text: &'m [u8], state: &'m mut State<'g>) -> Self {
        Self { text, tree: TokenTree::new(), state, metrics: MatchMetrics::default() }
    }

    pub(crate) fn finish(self) -> (TokenTree, MatchMetrics) {
        let mut metrics = self.metrics;
        metrics.tokens_produced = self.tree.produced();
        metrics.tokens_recycled = self.tree.recycled();
        (self.tree, metrics)
    }

    /// Matches the entry rule of `g` at `pos` as a root token.
    pub(crate) fn match_entry(&mut self, g: &Grammar, pos: usize) -> Option<(TokenId, usize)> {
        self.enter_rule(g, g.entry(), pos, None)
    }

    // --- Rules ---------------------------------------------------------------------

    fn enter_rule(
        &mut self,
        g: &Grammar,
        rule: &Rule,
        pos: usize,
        parent: Option<TokenId>,
    ) -> Option<(TokenId, usize)> {
        self.metrics.rule_attempts += 1;
        let token = self.tree.produce(g.id(), rule.id());
        if let Some(parent) = parent {
            self.tree.append_child(parent, token);
        }
        if log_enabled!(Level::Trace) {
            trace!("[rule:enter] rule={} pos={}", rule.name(), pos);
        }
        match self.match_node(g, rule.entry, pos, Some(token)) {
            Some(end) => {
                self.tree.set_range(token, pos..end);
                if log_enabled!(Level::Trace) {
                    trace!("[rule:match] rule={} range={}..{}", rule.name(), pos, end);
                }
                Some((token, end))
            }
            None => {
                if log_enabled!(Level::Trace) {
                    trace!("[rule:fail] rule={} pos={}", rule.name(), pos);
                }
                self.tree.unlink(token);
                None
            }
        }
    }

    fn match_rule(&mut self, g: &Grammar, rule: &Rule, pos: usize, parent: Option<TokenId>) -> Option<usize> {
        let (token, end) = self.enter_rule(g, rule, pos, parent)?;
        if let (true, Some(parent)) = (rule.is_void(), parent) {
            self.tree.append_all_children_of(parent, token);
            self.tree.unlink(token);
        }
        Some(end)
    }

    // --- Dispatch --------------------------------------------------------------------

    /// Matches node `id` of `g` at `pos`, appending tokens to `parent`.
    ///
    /// Returns the end offset, or `None` after restoring `parent`'s children.
    pub(crate) fn match_node(&mut self, g: &Grammar, id: NodeId, pos: usize, parent: Option<TokenId>) -> Option<usize> {
        self.metrics.node_visits += 1;
        let text = self.text;
        let node = g.node(id);
        match node {
            Node::Char { .. } | Node::Greater { .. } | Node::Any | Node::Range { .. } | Node::OneOf { .. } => {
                let b = *text.get(pos)?;
                node::match_byte(node, b)?.then_some(pos + 1)
            }
            Node::Literal { bytes, options } => node::match_literal(bytes, *options, text, pos),
            Node::Keyword { trie } => {
                let (end, keyword) = trie.longest_match(text, pos)?;
                if let Some(parent) = parent {
                    self.tree.set_keyword(parent, keyword);
                }
                Some(end)
            }

            Node::Repeat { mode: RepeatMode::Plain, min, max, body } => self.repeat(g, *body, *min, *max, pos, parent),
            Node::Repeat { mode: RepeatMode::Greedy, min, max, body } => {
                self.greedy_repeat(g, id, *body, *min, *max, pos, parent)
            }
            Node::Repeat { mode: RepeatMode::Lazy, min, max, body } => {
                self.lazy_repeat(g, id, *body, *min, *max, pos, parent)
            }
            Node::Length { min, max, body } => self.transaction(parent, |m| {
                let end = m.match_node(g, *body, pos, parent)?;
                (*min..=*max).contains(&(end - pos)).then_some(end)
            }),

            Node::Boi => (pos == 0).then_some(pos),
            Node::Eoi => (pos == text.len()).then_some(pos),
            Node::Pass => Some(pos),
            Node::Fail => None,
            Node::Find { body } => self.find_forward(g, *body, pos, parent),
            Node::Ahead { body, options } => {
                let hit = self.speculate(parent, |m| m.match_node(g, *body, pos, parent)).is_some();
                (hit != options.contains(MatchOptions::INVERT)).then_some(pos)
            }
            Node::Behind { body, options, width } => {
                let hit = match pos.checked_sub(*width) {
                    Some(start) => self.speculate(parent, |m| m.match_node(g, *body, start, parent)).is_some(),
                    None => false,
                };
                (hit != options.contains(MatchOptions::INVERT)).then_some(pos)
            }

            Node::Choice { alternatives } => self.choice(g, alternatives, pos, parent),
            Node::LongestChoice { alternatives } => self.longest_choice(g, alternatives, pos, parent),
            Node::Glue { elements } => self.transaction(parent, |m| {
                let mut at = pos;
                for element in elements {
                    if m.state.finalized() {
                        return None;
                    }
                    at = m.match_node(g, *element, at, parent)?;
                }
                Some(at)
            }),

            Node::Expect { message, body } => {
                let end = self.match_node(g, *body, pos, parent);
                if end.is_none() && self.state.set_hint(message, pos) {
                    debug!("[expect] message={:?} offset={}", message, pos);
                }
                end
            }
            Node::Call { callback } => (callback.0)(text, pos, &mut *self.state),

            Node::Set { flag, value } => {
                self.state.set_flag_at(flag, *value);
                Some(pos)
            }
            Node::If { flag, then, otherwise } => {
                let branch = if self.state.flag_at(flag) { *then } else { *otherwise };
                self.match_node(g, branch, pos, parent)
            }
            Node::Capture { capture, body } => {
                let end = self.match_node(g, *body, pos, parent)?;
                self.state.set_capture_at(capture, pos..end);
                Some(end)
            }
            Node::Replay { capture } => {
                let captured = self.state.capture_at(capture)?;
                node::replay(text, captured, pos)
            }

            Node::Ref { target } => {
                let scope = target.grammar(g);
                let rule = scope.rule(target.rule)?;
                self.match_rule(scope, rule, pos, parent)
            }
            Node::Inline { target } => {
                let scope = target.grammar(g);
                let rule = scope.rule(target.rule)?;
                self.match_node(scope, rule.entry, pos, parent)
            }
            Node::Previous { target, keyword } => {
                let current = self.tree.get(parent?);
                let previous = current.previous_sibling()?;
                let hit = previous.grammar() == target.grammar(g).id()
                    && previous.rule() == target.rule
                    && keyword.as_ref().is_none_or(|(_, k)| previous.keyword() == Some(*k));
                hit.then_some(pos)
            }
            Node::Context { target, inside, outside } => {
                let in_context = {
                    let enclosing = self.tree.get(parent?).parent()?;
                    enclosing.grammar() == target.grammar(g).id() && enclosing.rule() == target.rule
                };
                let branch = if in_context { *inside } else { *outside };
                self.transaction(parent, |m| m.match_node(g, branch, pos, parent))
            }
            Node::Invoke { grammar, coverage, .. } => {
                let invoked = grammar.as_deref()?;
                let limit = match coverage {
                    Some(coverage) => self.speculate(parent, |m| m.match_node(g, *coverage, pos, parent))?,
                    None => text.len(),
                };
                self.text = text.get(..limit)?;
                let end = self.match_rule(invoked, invoked.entry(), pos, parent);
                self.text = text;
                end
            }
        }
    }

    // --- Composition -------------------------------------------------------------------

    fn choice(&mut self, g: &Grammar, alternatives: &[NodeId], pos: usize, parent: Option<TokenId>) -> Option<usize> {
        for alternative in alternatives {
            if self.state.finalized() {
                return None;
            }
            if let Some(end) = self.transaction(parent, |m| m.match_node(g, *alternative, pos, parent)) {
                return Some(end);
            }
        }
        None
    }

    fn longest_choice(
        &mut self,
        g: &Grammar,
        alternatives: &[NodeId],
        pos: usize,
        parent: Option<TokenId>,
    ) -> Option<usize> {
        let mut best: Option<(NodeId, usize)> = None;
        for alternative in alternatives {
            if self.state.finalized() {
                return None;
            }
            if let Some(end) = self.speculate(parent, |m| m.match_node(g, *alternative, pos, parent)) {
                if best.is_none_or(|(_, furthest)| end > furthest) {
                    best = Some((*alternative, end));
                }
            }
        }
        let (winner, _) = best?;
        self.transaction(parent, |m| m.match_node(g, winner, pos, parent))
    }

    fn find_forward(&mut self, g: &Grammar, body: NodeId, pos: usize, parent: Option<TokenId>) -> Option<usize> {
        let mut at = pos;
        while at <= self.text.len() {
            self.metrics.find_attempts += 1;
            if let Some(end) = self.transaction(parent, |m| m.match_node(g, body, at, parent)) {
                return Some(end);
            }
            at += 1;
        }
        None
    }

    // --- Repeats ---------------------------------------------------------------------------

    fn repeat(
        &mut self,
        g: &Grammar,
        body: NodeId,
        min: usize,
        max: usize,
        pos: usize,
        parent: Option<TokenId>,
    ) -> Option<usize> {
        self.transaction(parent, |m| {
            let mut at = pos;
            let mut count = 0;
            while count < max {
                let Some(end) = m.match_node(g, body, at, parent) else { break };
                ensure_progress(g, body, at, end);
                at = end;
                count += 1;
            }
            (count >= min && !m.state.finalized()).then_some(at)
        })
    }

    /// Commits to the highest repetition count after which the successor chain
    /// matches, or to `min` if none does.
    #[allow(clippy::too_many_arguments)]
    fn greedy_repeat(
        &mut self,
        g: &Grammar,
        id: NodeId,
        body: NodeId,
        min: usize,
        max: usize,
        pos: usize,
        parent: Option<TokenId>,
    ) -> Option<usize> {
        let Some(next) = successor(g, id) else {
            return self.repeat(g, body, min, max, pos, parent);
        };
        self.transaction(parent, |m| {
            let mut marks = vec![(pos, m.checkpoint(parent))];
            let mut best = (min == 0 && m.probe(g, next, pos, parent)).then_some(0);
            let mut at = pos;
            while marks.len() - 1 < max {
                let Some(end) = m.match_node(g, body, at, parent) else { break };
                ensure_progress(g, body, at, end);
                at = end;
                marks.push((at, m.checkpoint(parent)));
                let count = marks.len() - 1;
                if count >= min && m.probe(g, next, at, parent) {
                    best = Some(count);
                }
            }
            if marks.len() - 1 < min || m.state.finalized() {
                return None;
            }
            let (end, checkpoint) = marks[best.unwrap_or(min)];
            m.rollback(parent, checkpoint);
            Some(end)
        })
    }

    /// Consumes another repetition only while the successor chain does not match.
    ///
    /// Fails unless the successor chain matches after some count in `min..=max`.
    #[allow(clippy::too_many_arguments)]
    fn lazy_repeat(
        &mut self,
        g: &Grammar,
        id: NodeId,
        body: NodeId,
        min: usize,
        max: usize,
        pos: usize,
        parent: Option<TokenId>,
    ) -> Option<usize> {
        let Some(next) = successor(g, id) else {
            return self.repeat(g, body, min, min, pos, parent);
        };
        self.transaction(parent, |m| {
            let mut at = pos;
            let mut count = 0;
            loop {
                if count >= min && m.probe(g, next, at, parent) {
                    return Some(at);
                }
                if count >= max {
                    return None;
                }
                let end = m.match_node(g, body, at, parent)?;
                ensure_progress(g, body, at, end);
                at = end;
                count += 1;
            }
        })
    }

    /// Matches the successor chain starting at `next` and undoes every effect
    /// on the token tree, the hint and the finalize latch.
    fn probe(&mut self, g: &Grammar, next: NodeId, pos: usize, parent: Option<TokenId>) -> bool {
        self.metrics.successor_probes += 1;
        let checkpoint = self.checkpoint(parent);
        let diagnostics = self.state.save_diagnostics();
        let keyword = parent.and_then(|p| self.tree.keyword_of(p));

        let mut node = Some(next);
        let mut at = pos;
        let mut hit = true;
        while let Some(current) = node {
            match self.match_node(g, current, at, parent) {
                Some(end) => at = end,
                None => {
                    hit = false;
                    break;
                }
            }
            node = successor(g, current);
        }

        self.restore(parent, checkpoint, keyword);
        self.state.restore_diagnostics(diagnostics);
        hit
    }

    // --- Token bookkeeping --------------------------------------------------------------

    fn checkpoint(&self, parent: Option<TokenId>) -> Checkpoint {
        parent.and_then(|p| self.tree.last_child(p))
    }

    fn rollback(&mut self, parent: Option<TokenId>, checkpoint: Checkpoint) {
        if let Some(parent) = parent {
            if self.tree.rollback(parent, checkpoint) > 0 {
                self.metrics.rollbacks += 1;
            }
        }
    }

    /// Runs `attempt`; if it fails, the parent's children and keyword tag are
    /// restored.
    fn transaction<F>(&mut self, parent: Option<TokenId>, attempt: F) -> Option<usize>
    where
        F: FnOnce(&mut Self) -> Option<usize>,
    {
        let checkpoint = self.checkpoint(parent);
        let keyword = parent.and_then(|p| self.tree.keyword_of(p));
        let end = attempt(self);
        if end.is_none() {
            self.restore(parent, checkpoint, keyword);
        }
        end
    }

    /// Runs `attempt` and always restores the parent's children and keyword tag.
    fn speculate<F>(&mut self, parent: Option<TokenId>, attempt: F) -> Option<usize>
    where
        F: FnOnce(&mut Self) -> Option<usize>,
    {
        let checkpoint = self.checkpoint(parent);
        let keyword = parent.and_then(|p| self.tree.keyword_of(p));
        let end = attempt(self);
        self.restore(parent, checkpoint, keyword);
        end
    }

    fn restore(&mut self, parent: Option<TokenId>, checkpoint: Checkpoint, keyword: Option<KeywordId>) {
        self.rollback(parent, checkpoint);
        if let Some(parent) = parent {
            self.tree.restore_keyword(parent, keyword);
        }
    }
}

/// The node matched after `id` succeeds, within the same rule.
pub(crate) fn successor(g: &Grammar, id: NodeId) -> Option<NodeId> {
    let parent = g.parent(id)?;
    match g.node(parent) {
        Node::Glue { elements } => {
            let at = elements.iter().position(|e| *e == id)?;
            match elements.get(at + 1) {
                Some(next) => Some(*next),
                None => successor(g, parent),
            }
        }
        node if node.passes_successor() => successor(g, parent),
        _ => None,
    }
}

fn ensure_progress(g: &Grammar, body: NodeId, from: usize, to: usize) {
    if to == from {
        panic!("repeated {} matched zero bytes at offset {from}", g.node(body).kind());
    }
}
