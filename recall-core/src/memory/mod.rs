//! Long-term memory: per-user entries ranked by lexical relevance
//!
//! - [`MemoryStore`] is the entry point: retrieve, add, consolidate, stats
//! - [`MemoryCollection`] is the storage seam, with an in-process
//!   implementation and one backed by SurrealDB
//! - [`keywords`] holds the text normalization shared by both

pub mod backend;
pub mod entry;
pub mod inmemory;
pub mod keywords;
pub mod store;
pub mod surreal;

pub use backend::{
    IndexKind, IndexSpec, MemoryCollection, MemoryFilter, MemoryUpdate, PruneRule, RANKING,
    SortField, SortKey, TextMatch, memory_indexes,
};
pub use entry::{INITIAL_RELEVANCE, MemoryEntry, MemoryState, MemoryStats};
pub use inmemory::InMemoryCollection;
pub use store::MemoryStore;
pub use surreal::SurrealCollection;
