//! Memory consolidation: bounded per-user storage through pruning and decay.
//!
//! Runs after every insert. Users under the entry ceiling are untouched; above
//! it, weak idle entries are deleted and the rest lose a little relevance.

pub mod config;
pub mod engine;

pub use config::ConsolidationConfig;
pub use engine::{ConsolidationReport, Consolidator};
