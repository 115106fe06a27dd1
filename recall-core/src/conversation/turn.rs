//! One chat turn: recall, fit, generate, remember

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::message::Message;
use crate::config::TurnConfig;
use crate::context::{ContextBudgetManager, ContextUsage};
use crate::error::{RecallError, Result};
use crate::llm::{LLMProvider, LLMRequest};
use crate::memory::{MemoryEntry, MemoryStore};

/// Incoming turn: the full history, newest message last
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurn {
    pub user_id: String,
    pub model: String,
    pub messages: Vec<Message>,
}

impl ChatTurn {
    pub fn new(user_id: impl Into<String>, model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            user_id: user_id.into(),
            model: model.into(),
            messages,
        }
    }
}

/// Everything a turn produced
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Model reply text
    pub reply: String,

    /// Messages actually sent to the model
    pub prompt: Vec<Message>,

    /// Memories injected into the prompt
    pub memories_used: Vec<MemoryEntry>,

    /// History messages dropped to fit the window
    pub trimmed_count: usize,

    /// Window usage of `prompt`
    pub usage: ContextUsage,

    /// Id of the memory recorded for this exchange, if storing it succeeded
    pub memory_id: Option<String>,
}

/// System message carrying recalled memories
pub fn memory_context_message(memories: &[MemoryEntry]) -> Message {
    let context = memories
        .iter()
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    Message::system(format!(
        "Previous conversation context:\n{}\n\nPlease use this context to provide more personalized and relevant responses.",
        context
    ))
}

/// Text remembered for an exchange
pub fn exchange_memory(user_message: &str, reply: &str) -> String {
    format!("User: {}\nAssistant: {}", user_message, reply)
}

/// Orchestrates a chat turn around a model provider.
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = TurnPipeline::new(store, manager, llm, TurnConfig::default());
/// let outcome = pipeline
///     .run(ChatTurn::new("user-1", "llama-3.1-8b-instant", history))
///     .await?;
/// println!("{}", outcome.reply);
/// ```
pub struct TurnPipeline {
    store: Arc<MemoryStore>,
    manager: ContextBudgetManager,
    llm: Arc<dyn LLMProvider>,
    config: TurnConfig,
}

impl TurnPipeline {
    pub fn new(
        store: Arc<MemoryStore>,
        manager: ContextBudgetManager,
        llm: Arc<dyn LLMProvider>,
        config: TurnConfig,
    ) -> Self {
        Self {
            store,
            manager,
            llm,
            config,
        }
    }

    pub fn manager(&self) -> &ContextBudgetManager {
        &self.manager
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    async fn recall(&self, user_id: &str, query: &str) -> Vec<MemoryEntry> {
        let retrieval = self.store.retrieve_default(user_id, query);
        match tokio::time::timeout(self.config.retrieve_timeout, retrieval).await {
            Ok(memories) => memories,
            Err(_) => {
                tracing::warn!(
                    user_id,
                    timeout = ?self.config.retrieve_timeout,
                    "Memory retrieval timed out, continuing without memories"
                );
                Vec::new()
            }
        }
    }

    /// Run one turn.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for an empty history; provider failures propagate.
    /// Memory failures never fail the turn.
    pub async fn run(&self, turn: ChatTurn) -> Result<TurnOutcome> {
        let Some(last) = turn.messages.last() else {
            return Err(RecallError::InvalidInput(
                "a turn needs at least one message".to_string(),
            ));
        };
        let last_content = last.content.clone();

        let memories = self.recall(&turn.user_id, &last_content).await;

        let fitted = self
            .manager
            .fit_with_outcome(&turn.messages, &turn.model, &memories);
        let trimmed_count = fitted.trimmed_count;

        let mut prompt = Vec::with_capacity(fitted.messages.len() + 1);
        if !memories.is_empty() {
            prompt.push(memory_context_message(&memories));
        }
        prompt.extend(fitted.messages);

        let usage = self.manager.usage(&prompt, &turn.model);
        tracing::debug!(
            user_id = %turn.user_id,
            model = %turn.model,
            memories = memories.len(),
            trimmed = trimmed_count,
            tokens = usage.tokens_used,
            "Prepared prompt"
        );

        let request = LLMRequest::new(turn.model.clone(), prompt.clone())
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.manager.max_reply_tokens(&turn.model));
        let reply = self.llm.generate(&request).await?.content;

        let memory_id = match self
            .store
            .add(
                &turn.user_id,
                &exchange_memory(&last_content, &reply),
                None,
            )
            .await
        {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(user_id = %turn.user_id, error = %e, "Failed to remember exchange");
                None
            }
        };

        Ok(TurnOutcome {
            reply,
            prompt,
            memories_used: memories,
            trimmed_count,
            usage,
            memory_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfig;
    use crate::context::ContextConfig;
    use crate::conversation::MessageRole;
    use crate::llm::{ScriptedLLMProvider, StubLLMProvider};
    use crate::memory::{InMemoryCollection, MemoryCollection};

    fn pipeline(
        collection: Arc<InMemoryCollection>,
        llm: Arc<dyn LLMProvider>,
    ) -> TurnPipeline {
        let store = Arc::new(MemoryStore::new(collection, MemoryConfig::default()));
        TurnPipeline::new(
            store,
            ContextBudgetManager::new(&ContextConfig::default()),
            llm,
            TurnConfig::default(),
        )
    }

    #[test]
    fn test_memory_context_message() {
        let memories = vec![
            MemoryEntry::new("u1", "likes tea"),
            MemoryEntry::new("u1", "lives in Oslo"),
        ];
        let message = memory_context_message(&memories);

        assert_eq!(message.role, MessageRole::System);
        assert_eq!(
            message.content,
            "Previous conversation context:\nlikes tea\nlives in Oslo\n\nPlease use this context to provide more personalized and relevant responses."
        );
    }

    #[tokio::test]
    async fn test_empty_turn_rejected() {
        let pipeline = pipeline(Arc::new(InMemoryCollection::new()), Arc::new(StubLLMProvider));
        let err = pipeline
            .run(ChatTurn::new("u1", "gemma-7b-it", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, RecallError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_turn_injects_memories_and_remembers() {
        let collection = Arc::new(InMemoryCollection::new());
        let llm = Arc::new(ScriptedLLMProvider::new(["Try the Maroon Bells trail."]));
        let pipeline = pipeline(collection.clone(), llm.clone());

        pipeline
            .store()
            .add("u1", "I love hiking in Colorado", None)
            .await
            .unwrap();

        let outcome = pipeline
            .run(ChatTurn::new(
                "u1",
                "llama-3.1-8b-instant",
                vec![Message::user("Any hiking tips?")],
            ))
            .await
            .unwrap();

        assert_eq!(outcome.reply, "Try the Maroon Bells trail.");
        assert_eq!(outcome.memories_used.len(), 1);
        assert_eq!(outcome.prompt.len(), 2);
        assert_eq!(outcome.prompt[0].role, MessageRole::System);
        assert_eq!(outcome.trimmed_count, 0);

        let requests = llm.requests().await;
        assert_eq!(requests[0].temperature, Some(0.7));
        assert_eq!(requests[0].max_tokens, Some(8_192));

        let id = outcome.memory_id.unwrap();
        let stored = collection.get(&id).await.unwrap().unwrap();
        assert_eq!(
            stored.content,
            "User: Any hiking tips?\nAssistant: Try the Maroon Bells trail."
        );
    }

    #[tokio::test]
    async fn test_storage_outage_does_not_fail_turn() {
        let collection = Arc::new(InMemoryCollection::new());
        collection.set_unavailable(true);
        let pipeline = pipeline(collection, Arc::new(ScriptedLLMProvider::new(["ok"])));

        let outcome = pipeline
            .run(ChatTurn::new("u1", "unknown-model", vec![Message::user("hello")]))
            .await
            .unwrap();

        assert_eq!(outcome.reply, "ok");
        assert!(outcome.memories_used.is_empty());
        assert!(outcome.memory_id.is_none());
        assert_eq!(outcome.prompt.len(), 1);
    }

    #[tokio::test]
    async fn test_provider_error_propagates() {
        let pipeline = pipeline(Arc::new(InMemoryCollection::new()), Arc::new(StubLLMProvider));
        let err = pipeline
            .run(ChatTurn::new("u1", "gemma-7b-it", vec![Message::user("hello")]))
            .await
            .unwrap_err();
        assert!(matches!(err, RecallError::Llm(_)));
    }
}
