//! Context Budget - token-budget-aware history trimming
//!
//! Decides which prior messages survive into the next model request under a hard
//! token ceiling, and reports how full a model's context window is.
//!
//! # Features
//!
//! - Per-model profiles (window, reply reservation, per-message overhead)
//! - Silent fallback to a default profile for unknown models
//! - Greedy newest-first retention with a pinned first user message
//! - Synthetic trim notice when history is dropped
//! - Character-based token estimation
//!
//! # Example
//!
//! ```rust,ignore
//! use recall_core::context::{ContextBudgetManager, ContextConfig};
//!
//! let manager = ContextBudgetManager::new(&ContextConfig::default());
//! let fitted = manager.fit(&messages, "llama-3.1-8b-instant", &memories);
//!
//! let usage = manager.usage(&fitted, "llama-3.1-8b-instant");
//! if usage.is_near_limit {
//!     println!("{:.1}% of the window used", usage.percentage);
//! }
//! ```

mod config;
mod manager;
mod profile;
mod tokens;

pub use config::ContextConfig;
pub use manager::{ContextBudgetManager, ContextUsage, FitOutcome};
pub use profile::{DEFAULT_MODEL, ModelCatalog, ModelProfile};
pub use tokens::{CHARS_PER_TOKEN, TokenEstimator};
