//! Per-match mutable state.
//!
//! Flags and captures are stored per scope: every grammar reached through an
//! import gets its own lazily created storage keyed by [`GrammarId`], so a flag
//! named `x` in an imported grammar is independent of `x` in the importer unless
//! the importer names it as `alias::x`.

use std::collections::HashMap;
use std::ops::Range;

use crate::node::StateSlot;
use crate::{Grammar, GrammarError, GrammarId};

/// First `expect` failure of a match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hint {
    pub message: String,
    pub offset: usize,
}

#[derive(Debug, Default, Clone)]
struct ScopeState {
    flags: Vec<bool>,
    captures: Vec<Option<Range<usize>>>,
}

/// Hint and latch, saved around speculative matching.
#[derive(Debug, Clone)]
pub(crate) struct Diagnostics {
    hint: Option<Hint>,
    finalized: bool,
}

#[derive(Debug)]
pub struct State<'g> {
    grammar: &'g Grammar,
    scopes: HashMap<GrammarId, ScopeState>,
    hint: Option<Hint>,
    finalized: bool,
}

impl<'g> State<'g> {
    /// A fresh state whose names resolve relative to `grammar`.
    pub fn new(grammar: &'g Grammar) -> Self {
        Self { grammar, scopes: HashMap::new(), hint: None, finalized: false }
    }

    pub fn grammar(&self) -> &'g Grammar {
        self.grammar
    }

    // --- Name-based access -----------------------------------------------------

    /// Reads a flag; unset flags are `false`.
    pub fn flag(&self, name: &str) -> Result<bool, GrammarError> {
        let slot = self.flag_slot(name)?;
        Ok(self.flag_at(&slot))
    }

    pub fn set_flag(&mut self, name: &str, value: bool) -> Result<(), GrammarError> {
        let slot = self.flag_slot(name)?;
        self.set_flag_at(&slot, value);
        Ok(())
    }

    pub fn capture(&self, name: &str) -> Result<Option<Range<usize>>, GrammarError> {
        let slot = self.capture_slot(name)?;
        Ok(self.capture_at(&slot))
    }

    pub fn set_capture(&mut self, name: &str, range: Range<usize>) -> Result<(), GrammarError> {
        let slot = self.capture_slot(name)?;
        self.set_capture_at(&slot, range);
        Ok(())
    }

    fn flag_slot(&self, name: &str) -> Result<StateSlot, GrammarError> {
        let (scope, local) = self.grammar.resolve_scope(name)?;
        let id = scope.flag_id(local).ok_or_else(|| GrammarError::UndefinedFlag(name.to_owned()))?;
        Ok(StateSlot { name: name.to_owned(), scope: scope.id(), id })
    }

    fn capture_slot(&self, name: &str) -> Result<StateSlot, GrammarError> {
        let (scope, local) = self.grammar.resolve_scope(name)?;
        let id = scope.capture_id(local).ok_or_else(|| GrammarError::UndefinedCapture(name.to_owned()))?;
        Ok(StateSlot { name: name.to_owned(), scope: scope.id(), id })
    }

    // --- Diagnostics -----------------------------------------------------------

    pub fn hint(&self) -> Option<&Hint> {
        self.hint.as_ref()
    }

    /// Records a hint unless one is already set, and latches [`finalized`](Self::finalized).
    ///
    /// Returns whether this call stored the hint.
    pub fn set_hint(&mut self, message: &str, offset: usize) -> bool {
        self.finalized = true;
        if self.hint.is_some() {
            return false;
        }
        self.hint = Some(Hint { message: message.to_owned(), offset });
        true
    }

    /// Set once a hint was recorded; `CHOICE`, `GLUE` and repeats stop trying further branches.
    pub fn finalized(&self) -> bool {
        self.finalized
    }

    /// Clears the hint and the finalize latch, keeping flags and captures.
    pub(crate) fn reset_diagnostics(&mut self) {
        self.hint = None;
        self.finalized = false;
    }

    pub(crate) fn save_diagnostics(&self) -> Diagnostics {
        Diagnostics { hint: self.hint.clone(), finalized: self.finalized }
    }

    pub(crate) fn restore_diagnostics(&mut self, saved: Diagnostics) {
        self.hint = saved.hint;
        self.finalized = saved.finalized;
    }

    // --- Slot access -------------------------------------------------------------

    pub(crate) fn flag_at(&self, slot: &StateSlot) -> bool {
        self.scopes.get(&slot.scope).and_then(|s| s.flags.get(slot.id)).copied().unwrap_or(false)
    }

    pub(crate) fn set_flag_at(&mut self, slot: &StateSlot, value: bool) {
        let flags = &mut self.scopes.entry(slot.scope).or_default().flags;
        if flags.len() <= slot.id {
            flags.resize(slot.id + 1, false);
        }
        flags[slot.id] = value;
    }

    pub(crate) fn capture_at(&self, slot: &StateSlot) -> Option<Range<usize>> {
        self.scopes.get(&slot.scope).and_then(|s| s.captures.get(slot.id)).cloned().flatten()
    }

    pub(crate) fn set_capture_at(&mut self, slot: &StateSlot, range: Range<usize>) {
        let captures = &mut self.scopes.entry(slot.scope).or_default().captures;
        if captures.len() <= slot.id {
            captures.resize(slot.id + 1, None);
        }
        captures[slot.id] = Some(range);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GrammarBuilder;
    use std::sync::Arc;

    fn grammars() -> Grammar {
        let inner = GrammarBuilder::new("inner");
        inner.define("Mark", inner.set("x", true));
        inner.capture("word", inner.pass());
        inner.entry("Mark");
        let inner = Arc::new(inner.link().unwrap());

        let outer = GrammarBuilder::new("outer");
        outer.import(inner);
        outer.define("Top", outer.glue([outer.set("x", false), outer.reference("inner::Mark")]));
        outer.entry("Top");
        outer.link().unwrap()
    }

    #[test]
    fn scopes_are_independent_unless_qualified() {
        let g = grammars();
        let mut state = State::new(&g);
        state.set_flag("inner::x", true).unwrap();
        assert!(!state.flag("x").unwrap());
        assert!(state.flag("inner::x").unwrap());
        state.set_flag("x", true).unwrap();
        state.set_flag("inner::x", false).unwrap();
        assert!(state.flag("x").unwrap());
        assert!(!state.flag("inner::x").unwrap());
    }

    #[test]
    fn unknown_names_are_errors() {
        let g = grammars();
        let mut state = State::new(&g);
        assert_eq!(state.flag("nope"), Err(GrammarError::UndefinedFlag("nope".into())));
        assert_eq!(state.set_flag("missing::x", true), Err(GrammarError::UndefinedScope("missing".into())));
        assert_eq!(state.capture("inner::word"), Ok(None));
        state.set_capture("inner::word", 2..5).unwrap();
        assert_eq!(state.capture("inner::word"), Ok(Some(2..5)));
    }

    #[test]
    fn first_hint_wins_and_latches() {
        let g = grammars();
        let mut state = State::new(&g);
        assert!(!state.finalized());
        assert!(state.set_hint("first", 3));
        assert!(!state.set_hint("second", 1));
        assert!(state.finalized());
        assert_eq!(state.hint(), Some(&Hint { message: "first".into(), offset: 3 }));

        let saved = State::new(&g).save_diagnostics();
        state.restore_diagnostics(saved);
        assert!(state.hint().is_none() && !state.finalized());
    }

    #[test]
    fn reset_keeps_flags_and_captures() {
        let g = grammars();
        let mut state = State::new(&g);
        state.set_flag("x", true).unwrap();
        state.set_capture("inner::word", 1..4).unwrap();
        state.set_hint("stale", 2);

        state.reset_diagnostics();
        assert!(state.hint().is_none() && !state.finalized());
        assert!(state.flag("x").unwrap());
        assert_eq!(state.capture("inner::word"), Ok(Some(1..4)));
    }
}
