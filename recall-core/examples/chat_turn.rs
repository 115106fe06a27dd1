use std::sync::Arc;

use recall_core::prelude::*;

#[tokio::main]
async fn main() -> recall_core::error::Result<()> {
    println!("=== Chat Turn Example ===\n");

    let collection = SurrealCollection::connect(&StorageConfig::default()).await?;
    let store = Arc::new(MemoryStore::new(
        Arc::new(collection),
        MemoryConfig::default(),
    ));

    let llm = Arc::new(ScriptedLLMProvider::new([
        "Nice! Colorado has great trails.",
        "Since you like hiking in Colorado, try the Maroon Bells loop.",
    ]));

    let pipeline = TurnPipeline::new(
        store.clone(),
        ContextBudgetManager::new(&ContextConfig::default()),
        llm,
        TurnConfig::default(),
    );

    let model = "llama-3.1-8b-instant";
    let mut history = vec![Message::user("I love hiking in Colorado")];

    for follow_up in ["Any trail suggestions for hiking this weekend?"] {
        let outcome = pipeline
            .run(ChatTurn::new("demo-user", model, history.clone()))
            .await?;
        println!("assistant: {}", outcome.reply);
        println!(
            "  memories used: {}, trimmed: {}, usage: {:.2}%\n",
            outcome.memories_used.len(),
            outcome.trimmed_count,
            outcome.usage.percentage
        );

        history.push(Message::assistant(outcome.reply));
        history.push(Message::user(follow_up));
    }

    let outcome = pipeline
        .run(ChatTurn::new("demo-user", model, history))
        .await?;
    println!("assistant: {}", outcome.reply);
    for memory in &outcome.memories_used {
        println!(
            "  recalled (score {:.2}, seen {}x): {}",
            memory.relevance_score, memory.access_count, memory.content
        );
    }

    let stats = store.stats("demo-user").await;
    println!(
        "\n{} memories stored, average relevance {:.2}",
        stats.total_memories, stats.average_relevance
    );

    Ok(())
}
