//! Conversation Turns
//!
//! Chat messages and the pipeline that turns a history into a model reply.
//!
//! # Features
//!
//! - Role-tagged messages with ids and timestamps
//! - Memory recall bounded by a timeout
//! - Budget-aware history trimming before the model call
//! - Each exchange remembered for later turns
//!
//! # Example
//!
//! ```rust,ignore
//! use recall_core::conversation::{ChatTurn, Message, TurnPipeline};
//!
//! let outcome = pipeline
//!     .run(ChatTurn::new("user-1", "gemma-7b-it", vec![Message::user("Hello!")]))
//!     .await?;
//! ```

mod message;
mod turn;

pub use message::{Message, MessageRole};
pub use turn::{ChatTurn, TurnOutcome, TurnPipeline, exchange_memory, memory_context_message};
