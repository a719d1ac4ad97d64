//! Lexical rewriting of `check` and `handle` markers.
//!
//! The rewriter turns marked source into text the host grammar accepts and
//! records where every marker ended up, so the collector can find the
//! corresponding syntax nodes after parsing.

pub mod lexical;
pub mod markers;

pub use lexical::{rewrite, Rewritten};
pub use markers::{Edit, MarkerMap, OffsetMap};
