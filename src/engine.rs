//! Link and match engine.
//!
//! The engine is split into focused submodules under `src/engine/`:
//!
//! ```text
//! GrammarBuilder (builder.rs)
//!        │ Draft: node arena, rule drafts, pending names
//!        v
//! link::link (link.rs)
//!   - report build errors
//!   - check node placement, record parents
//!   - patch pending references
//!   - static lengths, lookbehind widths
//!        │
//!        v
//! Grammar ──▶ Matcher::match_entry (matcher.rs)
//!               - one dispatch over the node enum
//!               - transaction / speculate around every attempt
//!               - successor probes for lazy and greedy repeats
//!                      │
//!                      v
//!              TokenTree + MatchMetrics (metrics.rs)
//! ```
//!
//! ## Successor chains
//!
//! Lazy and greedy repeats need to know what comes after them. The successor
//! of a node is computed from the parent table recorded at link time: inside a
//! `GLUE` it is the next element (or the glue's own successor after the last
//! element); children of `CHOICE`, `LONGEST_CHOICE`, `EXPECT`, `CAPTURE`,
//! `LENGTH`, `IF` and `CONTEXT` continue with their parent's successor. The
//! chain ends at the rule boundary.
//!
//! ## Debugging
//!
//! Enable `trace` logging for `syntagma` to see `[rule:enter]`, `[rule:match]`
//! and `[rule:fail]` lines; `debug` shows `[link]`, `[expect]` and `[find]`.

#[path = "engine/link.rs"]
pub(crate) mod link;
#[path = "engine/matcher.rs"]
mod matcher;
#[path = "engine/metrics.rs"]
mod metrics;

#[cfg(test)]
#[path = "engine/tests.rs"]
mod tests;

pub(crate) use matcher::Matcher;
pub use metrics::MatchMetrics;
