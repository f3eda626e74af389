//! Link phase: turns a builder draft into an immutable [`Grammar`].
//!
//! Steps, in order:
//!
//! 1. report the first error recorded while building;
//! 2. number the rules and resolve the entry rule;
//! 3. check that every node handle belongs to this builder and is placed once,
//!    and record each node's parent (needed for successor chains);
//! 4. patch every pending symbolic reference with its resolved target;
//! 5. compute static rule lengths and the width of every lookbehind.

use std::collections::HashMap;
use std::sync::Arc;

use crate::builder::{Draft, Pending, RuleDraft};
use crate::grammar::{Grammar, Rule};
use crate::node::{Node, RuleTarget};
use crate::{GrammarError, GrammarId, KeywordId, NodeId, RuleId};

pub(crate) fn link(draft: Draft) -> Result<Grammar, GrammarError> {
    let Draft {
        id,
        name,
        mut nodes,
        rules,
        keywords,
        keyword_by_name,
        flags,
        captures,
        imports,
        entry,
        pending,
        errors,
        ..
    } = draft;

    if let Some(err) = errors.into_iter().next() {
        return Err(err);
    }

    let rule_by_name: HashMap<String, RuleId> =
        rules.iter().enumerate().map(|(k, r)| (r.name.clone(), RuleId(k as u32))).collect();
    let entry_name = entry.ok_or(GrammarError::MissingEntry)?;
    let entry = rule_by_name
        .get(&entry_name)
        .copied()
        .ok_or(GrammarError::UndefinedRule { name: entry_name, by: "ENTRY" })?;

    let parents = place_nodes(id, &nodes, &rules)?;

    let scopes = Scopes { rules: &rule_by_name, imports: &imports };
    for p in pending {
        resolve(&scopes, &keyword_by_name, &mut nodes, p)?;
    }

    let mut lengths =
        Lengths { nodes: &nodes, rules: &rules, memo: vec![None; rules.len()], visiting: vec![false; rules.len()] };
    let rule_lengths: Vec<Option<usize>> = (0..rules.len()).map(|r| lengths.rule(r)).collect();

    let mut widths = Vec::new();
    for (index, node) in nodes.iter().enumerate() {
        if let Node::Behind { body, .. } = node {
            match lengths.node(*body) {
                Some(width) => widths.push((index, width)),
                None => {
                    let owner = owner_rule(NodeId { grammar: id, index: index as u32 }, &parents, &rules);
                    return Err(GrammarError::VariableLookbehind(owner));
                }
            }
        }
    }
    for (index, w) in widths {
        if let Node::Behind { width, .. } = &mut nodes[index] {
            *width = w;
        }
    }

    let rules: Vec<Rule> = rules
        .into_iter()
        .zip(rule_lengths)
        .enumerate()
        .map(|(k, (r, length))| Rule { id: RuleId(k as u32), name: r.name, entry: r.entry, flags: r.flags, length })
        .collect();

    log::debug!(
        "[link] grammar={} rules={} nodes={} keywords={} imports={}",
        name.as_deref().unwrap_or("<anonymous>"),
        rules.len(),
        nodes.len(),
        keywords.len(),
        imports.len()
    );

    Ok(Grammar {
        id,
        name,
        nodes,
        parents,
        rules,
        rule_by_name,
        keywords,
        keyword_by_name,
        flags,
        captures,
        imports,
        entry,
    })
}

// --- Placement ----------------------------------------------------------------

fn place_nodes(id: GrammarId, nodes: &[Node], rules: &[RuleDraft]) -> Result<Vec<Option<NodeId>>, GrammarError> {
    let mut placed = vec![false; nodes.len()];
    let mut parents = vec![None; nodes.len()];
    for rule in rules {
        place(id, &mut placed, rule.entry)?;
    }
    for (index, node) in nodes.iter().enumerate() {
        for child in node.children() {
            place(id, &mut placed, child)?;
            parents[child.index()] = Some(NodeId { grammar: id, index: index as u32 });
        }
    }
    Ok(parents)
}

fn place(id: GrammarId, placed: &mut [bool], node: NodeId) -> Result<(), GrammarError> {
    if node.grammar != id || node.index() >= placed.len() {
        return Err(GrammarError::ForeignNode(node.index()));
    }
    if std::mem::replace(&mut placed[node.index()], true) {
        return Err(GrammarError::NodeReused(node.index()));
    }
    Ok(())
}

fn owner_rule(mut node: NodeId, parents: &[Option<NodeId>], rules: &[RuleDraft]) -> String {
    while let Some(parent) = parents[node.index()] {
        node = parent;
    }
    rules.iter().find(|r| r.entry == node).map(|r| r.name.clone()).unwrap_or_else(|| "<unused>".to_owned())
}

// --- Name resolution ------------------------------------------------------------

struct Scopes<'a> {
    rules: &'a HashMap<String, RuleId>,
    imports: &'a [(String, Arc<Grammar>)],
}

impl Scopes<'_> {
    /// Follows `a::b::...` through imports; `path` names grammars only.
    fn grammar(&self, path: &str) -> Result<Arc<Grammar>, GrammarError> {
        let mut segments = path.split("::");
        let first = segments.next().unwrap_or_default();
        let mut scope = self
            .imports
            .iter()
            .find(|(alias, _)| alias == first)
            .map(|(_, g)| g.clone())
            .ok_or_else(|| GrammarError::UndefinedScope(first.to_owned()))?;
        for alias in segments {
            let next = scope.import(alias).cloned().ok_or_else(|| GrammarError::UndefinedScope(alias.to_owned()))?;
            scope = next;
        }
        Ok(scope)
    }

    /// Splits a qualified name into its scope and local part; `None` scope is this grammar.
    fn split<'n>(&self, name: &'n str) -> Result<(Option<Arc<Grammar>>, &'n str), GrammarError> {
        match name.rsplit_once("::") {
            Some((path, local)) => Ok((Some(self.grammar(path)?), local)),
            None => Ok((None, name)),
        }
    }

    fn rule(&self, target: &mut RuleTarget, by: &'static str) -> Result<(), GrammarError> {
        let (scope, local) = self.split(&target.name)?;
        let rule = match &scope {
            Some(g) => g.rule_by_name.get(local).copied(),
            None => self.rules.get(local).copied(),
        };
        let Some(rule) = rule else {
            return Err(GrammarError::UndefinedRule { name: target.name.clone(), by });
        };
        target.rule = rule;
        target.scope = scope;
        Ok(())
    }
}

fn resolve(
    scopes: &Scopes<'_>,
    keywords: &HashMap<String, KeywordId>,
    nodes: &mut [Node],
    pending: Pending,
) -> Result<(), GrammarError> {
    match pending {
        Pending::Rule(id) => match &mut nodes[id.index()] {
            Node::Ref { target } => scopes.rule(target, "REF"),
            Node::Inline { target } => scopes.rule(target, "INLINE"),
            Node::Context { target, .. } => scopes.rule(target, "CONTEXT"),
            Node::Previous { target, keyword } => {
                scopes.rule(target, "PREVIOUS")?;
                if let Some((word, id)) = keyword {
                    *id = keywords
                        .get(word.as_str())
                        .copied()
                        .ok_or_else(|| GrammarError::UndefinedKeyword(word.clone()))?;
                }
                Ok(())
            }
            _ => Ok(()),
        },
        Pending::Flag(id) => {
            let slot = match &mut nodes[id.index()] {
                Node::Set { flag, .. } | Node::If { flag, .. } => flag,
                _ => return Ok(()),
            };
            let (scope, local) = scopes.split(&slot.name)?;
            let scope = scope.ok_or_else(|| GrammarError::UndefinedFlag(slot.name.clone()))?;
            slot.id = scope.flag_id(local).ok_or_else(|| GrammarError::UndefinedFlag(slot.name.clone()))?;
            slot.scope = scope.id();
            Ok(())
        }
        Pending::Capture(id) => {
            let slot = match &mut nodes[id.index()] {
                Node::Capture { capture, .. } | Node::Replay { capture } => capture,
                _ => return Ok(()),
            };
            let (scope, local) = scopes.split(&slot.name)?;
            let scope = scope.ok_or_else(|| GrammarError::UndefinedCapture(slot.name.clone()))?;
            slot.id = scope.capture_id(local).ok_or_else(|| GrammarError::UndefinedCapture(slot.name.clone()))?;
            slot.scope = scope.id();
            Ok(())
        }
        Pending::Invoke(id) => {
            if let Node::Invoke { alias, grammar, .. } = &mut nodes[id.index()] {
                *grammar = Some(scopes.grammar(alias).map_err(|_| GrammarError::UndefinedInvoke(alias.clone()))?);
            }
            Ok(())
        }
    }
}

// --- Static lengths --------------------------------------------------------------

struct Lengths<'a> {
    nodes: &'a [Node],
    rules: &'a [RuleDraft],
    memo: Vec<Option<Option<usize>>>,
    visiting: Vec<bool>,
}

impl Lengths<'_> {
    fn rule(&mut self, rule: usize) -> Option<usize> {
        if let Some(known) = self.memo[rule] {
            return known;
        }
        if self.visiting[rule] {
            return None;
        }
        self.visiting[rule] = true;
        let length = self.node(self.rules[rule].entry);
        self.visiting[rule] = false;
        self.memo[rule] = Some(length);
        length
    }

    fn node(&mut self, id: NodeId) -> Option<usize> {
        let nodes = self.nodes;
        match &nodes[id.index()] {
            Node::Char { .. } | Node::Greater { .. } | Node::Any | Node::Range { .. } | Node::OneOf { .. } => Some(1),
            Node::Literal { bytes, .. } => Some(bytes.len()),
            Node::Boi
            | Node::Eoi
            | Node::Pass
            | Node::Fail
            | Node::Ahead { .. }
            | Node::Behind { .. }
            | Node::Set { .. }
            | Node::Previous { .. } => Some(0),
            Node::Glue { elements } => elements.iter().try_fold(0usize, |sum, e| sum.checked_add(self.node(*e)?)),
            Node::Choice { alternatives } | Node::LongestChoice { alternatives } => self.common(alternatives),
            Node::If { then, otherwise, .. } => self.common(&[*then, *otherwise]),
            Node::Repeat { min, max, body, .. } if min == max => self.node(*body)?.checked_mul(*min),
            Node::Length { min, max, .. } if min == max => Some(*min),
            Node::Capture { body, .. } | Node::Expect { body, .. } => self.node(*body),
            Node::Ref { target } | Node::Inline { target } => match &target.scope {
                Some(g) => g.rule(target.rule).and_then(Rule::match_length),
                None => self.rule(target.rule.index()),
            },
            _ => None,
        }
    }

    /// Length shared by all branches.
    fn common(&mut self, branches: &[NodeId]) -> Option<usize> {
        let (first, rest) = branches.split_first()?;
        let length = self.node(*first)?;
        for branch in rest {
            if self.node(*branch)? != length {
                return None;
            }
        }
        Some(length)
    }
}
