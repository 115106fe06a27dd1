//! Full chat turns: recall, fit, generate, remember

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use recall_core::prelude::*;
use recall_core::memory::{IndexSpec, MemoryFilter, MemoryUpdate, PruneRule, SortKey};

fn pipeline_with(
    collection: Arc<dyn MemoryCollection>,
    llm: Arc<dyn LLMProvider>,
    turn: TurnConfig,
) -> TurnPipeline {
    TurnPipeline::new(
        Arc::new(MemoryStore::new(collection, MemoryConfig::default())),
        ContextBudgetManager::new(&ContextConfig::default()),
        llm,
        turn,
    )
}

#[tokio::test]
async fn test_second_turn_recalls_first_exchange() {
    let collection = Arc::new(InMemoryCollection::new());
    let llm = Arc::new(ScriptedLLMProvider::new([
        "Noted, you enjoy hiking.",
        "Try Rocky Mountain National Park.",
    ]));
    let pipeline = pipeline_with(collection.clone(), llm.clone(), TurnConfig::default());

    let first = pipeline
        .run(ChatTurn::new(
            "u1",
            "gemma-7b-it",
            vec![Message::user("I really like hiking")],
        ))
        .await
        .unwrap();
    assert!(first.memories_used.is_empty());
    assert!(first.memory_id.is_some());

    let history = vec![
        Message::user("I really like hiking"),
        Message::assistant(first.reply.clone()),
        Message::user("Where should I go hiking next?"),
    ];
    let second = pipeline
        .run(ChatTurn::new("u1", "gemma-7b-it", history))
        .await
        .unwrap();

    assert_eq!(second.reply, "Try Rocky Mountain National Park.");
    assert_eq!(second.memories_used.len(), 1);
    assert!(
        second.prompt[0]
            .content
            .contains("User: I really like hiking\nAssistant: Noted, you enjoy hiking.")
    );

    let requests = llm.requests().await;
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].max_tokens, Some(2_048));
    assert_eq!(requests[1].messages.len(), 4);
}

#[tokio::test]
async fn test_long_history_is_trimmed_before_the_model_call() {
    let llm = Arc::new(ScriptedLLMProvider::new(["done"]));
    let pipeline = pipeline_with(
        Arc::new(InMemoryCollection::new()),
        llm.clone(),
        TurnConfig::default(),
    );

    let history: Vec<Message> = (0..50)
        .map(|i| {
            if i % 2 == 0 {
                Message::user("u".repeat(4_000))
            } else {
                Message::assistant("a".repeat(4_000))
            }
        })
        .collect();

    let outcome = pipeline
        .run(ChatTurn::new("u1", "llama-3.1-8b-instant", history))
        .await
        .unwrap();

    assert!(outcome.trimmed_count > 0);
    assert!(outcome.prompt[0].id.starts_with("context-trim-"));
    assert!(outcome.usage.tokens_used < 32_768 - 8_192);

    let sent = &llm.requests().await[0];
    assert_eq!(sent.messages, outcome.prompt);
}

/// Collection whose reads never finish
struct StalledCollection {
    inner: InMemoryCollection,
}

#[async_trait]
impl MemoryCollection for StalledCollection {
    async fn ensure_indexes(&self, _indexes: &[IndexSpec]) -> Result<()> {
        std::future::pending::<()>().await;
        Ok(())
    }

    async fn find(
        &self,
        filter: &MemoryFilter,
        sort: &[SortKey],
        limit: usize,
    ) -> Result<Vec<MemoryEntry>> {
        self.inner.find(filter, sort, limit).await
    }

    async fn get(&self, id: &str) -> Result<Option<MemoryEntry>> {
        self.inner.get(id).await
    }

    async fn insert_one(&self, entry: MemoryEntry) -> Result<()> {
        self.inner.insert_one(entry).await
    }

    async fn update_one(&self, id: &str, update: MemoryUpdate) -> Result<bool> {
        self.inner.update_one(id, update).await
    }

    async fn update_many(&self, filter: &MemoryFilter, update: MemoryUpdate) -> Result<u64> {
        self.inner.update_many(filter, update).await
    }

    async fn delete_many(&self, user_id: &str, rule: &PruneRule) -> Result<u64> {
        self.inner.delete_many(user_id, rule).await
    }

    async fn count(&self, user_id: &str) -> Result<u64> {
        self.inner.count(user_id).await
    }

    async fn aggregate_stats(&self, user_id: &str) -> Result<MemoryStats> {
        self.inner.aggregate_stats(user_id).await
    }
}

#[tokio::test(start_paused = true)]
async fn test_slow_retrieval_times_out_to_no_memories() {
    let collection = Arc::new(StalledCollection {
        inner: InMemoryCollection::new(),
    });
    let pipeline = pipeline_with(
        collection.clone(),
        Arc::new(ScriptedLLMProvider::new(["still here"])),
        TurnConfig::default().with_retrieve_timeout(Duration::from_millis(50)),
    );

    let outcome = pipeline
        .run(ChatTurn::new("u1", "gemma-7b-it", vec![Message::user("hello")]))
        .await
        .unwrap();

    assert_eq!(outcome.reply, "still here");
    assert!(outcome.memories_used.is_empty());
    assert_eq!(collection.inner.count("u1").await.unwrap(), 1);
}
