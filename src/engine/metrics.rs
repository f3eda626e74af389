//! Match metrics.
//!
//! Counters are bumped unconditionally by the matcher; they are plain integer
//! increments. Only [`Grammar::match_verbose`](crate::Grammar::match_verbose)
//! and [`Grammar::find_verbose`](crate::Grammar::find_verbose) hand them back
//! together with the elapsed time.

use std::time::Duration;

// --- Metrics -----------------------------------------------------------------

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MatchMetrics {
    /// Total elapsed time of the call.
    pub total: Duration,
    /// Number of `match_node` dispatches.
    pub node_visits: usize,
    /// Number of rule tokens produced before their body was tried.
    pub rule_attempts: usize,
    /// Number of rollbacks that removed at least one token.
    pub rollbacks: usize,
    /// Tokens produced, counting recycled slots.
    pub tokens_produced: usize,
    /// Tokens served from the free list.
    pub tokens_recycled: usize,
    /// Successor probes run by lazy and greedy repeats.
    pub successor_probes: usize,
    /// Start offsets tried by `FIND` nodes and by [`Grammar::find`](crate::Grammar::find).
    pub find_attempts: usize,
}

impl MatchMetrics {
    /// Adds the counters of `other`; durations are left alone.
    pub(crate) fn absorb(&mut self, other: &MatchMetrics) {
        self.node_visits += other.node_visits;
        self.rule_attempts += other.rule_attempts;
        self.rollbacks += other.rollbacks;
        self.tokens_produced += other.tokens_produced;
        self.tokens_recycled += other.tokens_recycled;
        self.successor_probes += other.successor_probes;
        self.find_attempts += other.find_attempts;
    }
}
