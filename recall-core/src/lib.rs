//! # Recall - context budgeting and long-term memory for chat turns
//!
//! Recall sits between a chat front end and a language model:
//! - Token-budget trimming of conversation history per model profile
//! - Per-user lexical memory with relevance reinforcement
//! - Bounded storage through consolidation (pruning plus decay)
//! - A turn pipeline that recalls, fits, generates, and remembers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use recall_core::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let store = MemoryStore::new(
//!         Arc::new(InMemoryCollection::new()),
//!         MemoryConfig::default(),
//!     );
//!     store.add("user-1", "I love hiking in Colorado", None).await?;
//!
//!     let memories = store.retrieve("user-1", "hiking", 5).await;
//!
//!     let manager = ContextBudgetManager::new(&ContextConfig::default());
//!     let history = vec![Message::user("Any trail tips?")];
//!     let prompt = manager.fit(&history, "llama-3.1-8b-instant", &memories);
//!     assert_eq!(prompt.len(), 1);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Storage
//!
//! Memories live behind the [`memory::MemoryCollection`] trait. Use
//! [`memory::InMemoryCollection`] in tests and [`memory::SurrealCollection`]
//! (`mem://` in-process, or `ws://` against a server) elsewhere.

pub mod config;
pub mod consolidation;
pub mod context;
pub mod conversation;
pub mod error;
pub mod llm;
pub mod memory;

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{MemoryConfig, RecallConfig, StorageConfig, TurnConfig};
    pub use crate::consolidation::{ConsolidationConfig, ConsolidationReport, Consolidator};
    pub use crate::context::{
        ContextBudgetManager, ContextConfig, ContextUsage, FitOutcome, ModelCatalog, ModelProfile,
    };
    pub use crate::conversation::{ChatTurn, Message, MessageRole, TurnOutcome, TurnPipeline};
    pub use crate::error::{RecallError, Result};
    pub use crate::llm::{
        LLMProvider, LLMRequest, LLMResponse, ScriptedLLMProvider, StubLLMProvider,
    };
    pub use crate::memory::{
        InMemoryCollection, MemoryCollection, MemoryEntry, MemoryState, MemoryStats, MemoryStore,
        SurrealCollection,
    };
}
