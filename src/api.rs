use std::time::Instant;

use log::debug;

use crate::engine::{MatchMetrics, Matcher};
use crate::{Grammar, State, SyntaxError, SyntaxTree};

/// Result from [`Grammar::match_verbose`] and [`Grammar::find_verbose`].
#[derive(Debug, Clone)]
pub struct MatchRun {
    pub result: Result<SyntaxTree, SyntaxError>,
    pub metrics: MatchMetrics,
}

impl Grammar {
    /// A fresh state for [`match_with`](Self::match_with).
    pub fn new_state(&self) -> State<'_> {
        State::new(self)
    }

    /// Matches the entry rule anchored at `offset`.
    ///
    /// # Example
    /// ```
    /// use syntagma::GrammarBuilder;
    ///
    /// let b = GrammarBuilder::new("digits");
    /// b.define("Digits", b.repeat(1.., b.range(b'0', b'9')));
    /// b.entry("Digits");
    /// let g = b.link().unwrap();
    ///
    /// assert_eq!(g.match_at("x42;", 1).unwrap().root().range(), 1..3);
    /// assert!(g.match_at("x42;", 0).is_err());
    /// ```
    pub fn match_at<T: AsRef<[u8]> + ?Sized>(&self, text: &T, offset: usize) -> Result<SyntaxTree, SyntaxError> {
        let mut state = State::new(self);
        self.run(text.as_ref(), offset, &mut state).0
    }

    /// Matches from the start and requires the whole input to be consumed.
    pub fn match_all<T: AsRef<[u8]> + ?Sized>(&self, text: &T) -> Result<SyntaxTree, SyntaxError> {
        let text = text.as_ref();
        let tree = self.match_at(text, 0)?;
        if tree.end() == text.len() { Ok(tree) } else { Err(SyntaxError::NoMatch { offset: tree.end() }) }
    }

    /// Like [`match_at`](Self::match_at), with a caller-supplied state.
    ///
    /// Flags and captures set by the match stay in `state`, and flags set
    /// beforehand are visible to the grammar. The hint and finalize latch of
    /// an earlier match are cleared first.
    pub fn match_with<T: AsRef<[u8]> + ?Sized>(
        &self,
        text: &T,
        offset: usize,
        state: &mut State<'_>,
    ) -> Result<SyntaxTree, SyntaxError> {
        self.run(text.as_ref(), offset, state).0
    }

    /// [`match_at`](Self::match_at) plus metrics.
    pub fn match_verbose<T: AsRef<[u8]> + ?Sized>(&self, text: &T, offset: usize) -> MatchRun {
        let started = Instant::now();
        let mut state = State::new(self);
        let (result, mut metrics) = self.run(text.as_ref(), offset, &mut state);
        metrics.total = started.elapsed();
        MatchRun { result, metrics }
    }

    /// Tries [`match_at`](Self::match_at) at `offset`, `offset + 1`, ... until a
    /// match succeeds or the input is exhausted.
    ///
    /// Each attempt starts from a fresh state. On failure the first hint seen
    /// by any attempt is reported.
    pub fn find<T: AsRef<[u8]> + ?Sized>(&self, text: &T, offset: usize) -> Result<SyntaxTree, SyntaxError> {
        self.find_verbose(text, offset).result
    }

    pub fn find_verbose<T: AsRef<[u8]> + ?Sized>(&self, text: &T, offset: usize) -> MatchRun {
        let text = text.as_ref();
        let started = Instant::now();
        let mut metrics = MatchMetrics::default();
        let mut first_hint = None;

        debug!("[find] grammar={} from={} len={}", self.name().unwrap_or("<anonymous>"), offset, text.len());
        for at in offset..text.len() {
            metrics.find_attempts += 1;
            let mut state = State::new(self);
            let (result, attempt) = self.run(text, at, &mut state);
            metrics.absorb(&attempt);
            match result {
                Ok(tree) => {
                    debug!("[find] hit={}..{} attempts={}", at, tree.end(), metrics.find_attempts);
                    metrics.total = started.elapsed();
                    return MatchRun { result: Ok(tree), metrics };
                }
                Err(err @ SyntaxError::Expected { .. }) if first_hint.is_none() => first_hint = Some(err),
                Err(_) => {}
            }
        }

        metrics.total = started.elapsed();
        MatchRun { result: Err(first_hint.unwrap_or(SyntaxError::NoMatch { offset })), metrics }
    }

    fn run(
        &self,
        text: &[u8],
        offset: usize,
        state: &mut State<'_>,
    ) -> (Result<SyntaxTree, SyntaxError>, MatchMetrics) {
        state.reset_diagnostics();
        let mut matcher = Matcher::new(text, state);
        let matched = matcher.match_entry(self, offset);
        let (tree, metrics) = matcher.finish();

        let result = match (matched, state.hint()) {
            (Some((root, _)), None) if !state.finalized() => Ok(SyntaxTree::new(tree, root)),
            (_, Some(hint)) => Err(SyntaxError::Expected { message: hint.message.clone(), offset: hint.offset }),
            _ => Err(SyntaxError::NoMatch { offset }),
        };
        (result, metrics)
    }
}
