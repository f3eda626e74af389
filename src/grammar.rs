//! Linked grammars.

use std::collections::HashMap;
use std::sync::Arc;

use crate::node::{Node, RuleFlags};
use crate::{GrammarError, GrammarId, KeywordId, NodeId, RuleId};

/// A named production.
#[derive(Debug, Clone)]
pub struct Rule {
    pub(crate) id: RuleId,
    pub(crate) name: String,
    pub(crate) entry: NodeId,
    pub(crate) flags: RuleFlags,
    pub(crate) length: Option<usize>,
}

impl Rule {
    pub fn id(&self) -> RuleId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn flags(&self) -> RuleFlags {
        self.flags
    }

    pub fn is_void(&self) -> bool {
        self.flags.contains(RuleFlags::VOID)
    }

    /// Number of bytes every match of this rule consumes, if fixed.
    pub fn match_length(&self) -> Option<usize> {
        self.length
    }
}

/// An immutable, linked grammar.
///
/// Cheap to share: wrap it in an [`Arc`] and match from any number of threads.
#[derive(Debug)]
pub struct Grammar {
    pub(crate) id: GrammarId,
    pub(crate) name: Option<String>,
    pub(crate) nodes: Vec<Node>,
    /// Parent of each node; `None` for rule bodies and unused nodes.
    pub(crate) parents: Vec<Option<NodeId>>,
    pub(crate) rules: Vec<Rule>,
    pub(crate) rule_by_name: HashMap<String, RuleId>,
    pub(crate) keywords: Vec<String>,
    pub(crate) keyword_by_name: HashMap<String, KeywordId>,
    pub(crate) flags: Vec<String>,
    pub(crate) captures: Vec<String>,
    pub(crate) imports: Vec<(String, Arc<Grammar>)>,
    pub(crate) entry: RuleId,
}

impl Grammar {
    pub fn id(&self) -> GrammarId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn entry(&self) -> &Rule {
        &self.rules[self.entry.index()]
    }

    pub fn rule(&self, id: RuleId) -> Option<&Rule> {
        self.rules.get(id.index())
    }

    /// Looks up a rule by name; `alias::name` walks imports.
    pub fn rule_by_name(&self, name: &str) -> Option<&Rule> {
        let (scope, local) = self.resolve_scope(name).ok()?;
        scope.rule_by_name.get(local).map(|id| &scope.rules[id.index()])
    }

    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    pub fn keyword_id(&self, word: &str) -> Option<KeywordId> {
        self.keyword_by_name.get(word).copied()
    }

    pub fn keyword(&self, id: KeywordId) -> Option<&str> {
        self.keywords.get(id.index()).map(String::as_str)
    }

    pub fn import(&self, alias: &str) -> Option<&Arc<Grammar>> {
        self.imports.iter().find(|(a, _)| a == alias).map(|(_, g)| g)
    }

    pub fn imports(&self) -> impl Iterator<Item = (&str, &Arc<Grammar>)> {
        self.imports.iter().map(|(a, g)| (a.as_str(), g))
    }

    pub(crate) fn flag_id(&self, name: &str) -> Option<usize> {
        self.flags.iter().position(|f| f == name)
    }

    pub(crate) fn capture_id(&self, name: &str) -> Option<usize> {
        self.captures.iter().position(|c| c == name)
    }

    /// Splits `a::b::name` into the grammar reached through aliases `a`, `b` and `name`.
    pub fn resolve_scope<'n>(&self, name: &'n str) -> Result<(&Grammar, &'n str), GrammarError> {
        let mut scope = self;
        let mut rest = name;
        while let Some((alias, tail)) = rest.split_once("::") {
            scope = scope.import(alias).ok_or_else(|| GrammarError::UndefinedScope(alias.to_owned()))?;
            rest = tail;
        }
        Ok((scope, rest))
    }

    /// This grammar or any grammar reachable through its imports with the given id.
    pub fn scope_of(&self, id: GrammarId) -> Option<&Grammar> {
        if self.id == id {
            return Some(self);
        }
        self.imports.iter().find_map(|(_, g)| g.scope_of(id)).or_else(|| self.invoked().find_map(|g| g.scope_of(id)))
    }

    /// Name of a token's rule, searching imported and invoked grammars.
    pub fn rule_name(&self, grammar: GrammarId, rule: RuleId) -> Option<&str> {
        self.scope_of(grammar)?.rule(rule).map(Rule::name)
    }

    pub(crate) fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub(crate) fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.parents[id.index()]
    }

    fn invoked(&self) -> impl Iterator<Item = &Grammar> {
        self.nodes.iter().filter_map(|n| match n {
            Node::Invoke { grammar: Some(g), .. } => Some(g.as_ref()),
            _ => None,
        })
    }
}
