//! Recall CLI - inspect context budgets and manage stored memories

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use recall_core::config::RecallConfig;
use recall_core::context::ContextBudgetManager;
use recall_core::conversation::{ChatTurn, Message, TurnPipeline};
use recall_core::llm::ScriptedLLMProvider;
use recall_core::memory::{MemoryStore, SurrealCollection};

#[derive(Parser)]
#[command(name = "recall")]
#[command(about = "Context budgeting and long-term memory for chat turns", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to recall.toml plus RECALL_* variables)
    #[arg(long, global = true, env = "RECALL_CONFIG_PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List known model profiles
    Models,
    /// Report how full a model's window a conversation is
    Usage {
        /// Target model id
        #[arg(short, long)]
        model: String,
        /// JSON array of messages
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Trim a conversation to a model's budget and print the result
    Fit {
        /// Target model id
        #[arg(short, long)]
        model: String,
        /// JSON array of messages
        #[arg(short, long)]
        file: PathBuf,
        /// Number of memories to reserve room for
        #[arg(long, default_value_t = 0)]
        memories: usize,
    },
    /// Run one turn offline with a fixed reply
    Chat {
        #[arg(short, long)]
        user: String,
        #[arg(short, long)]
        model: String,
        /// JSON array of messages, newest last
        #[arg(short, long)]
        file: PathBuf,
        /// Reply the model stand-in returns
        #[arg(short, long)]
        reply: String,
    },
    /// Memory store commands
    Memory {
        #[command(subcommand)]
        command: MemoryCommands,
    },
    /// Version information
    Version,
}

#[derive(Subcommand)]
enum MemoryCommands {
    /// Store a memory
    Add {
        #[arg(short, long)]
        user: String,
        #[arg(short, long)]
        content: String,
    },
    /// Retrieve memories relevant to a query
    Search {
        #[arg(short, long)]
        user: String,
        #[arg(short, long)]
        query: String,
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Show memory statistics
    Stats {
        #[arg(short, long)]
        user: String,
        /// Also count memories relevant to this query
        #[arg(short, long)]
        query: Option<String>,
    },
    /// Run a consolidation pass
    Consolidate {
        #[arg(short, long)]
        user: String,
    },
}

fn load_config(path: Option<&Path>) -> Result<RecallConfig> {
    let config = match path {
        Some(path) => RecallConfig::from_file(path)?,
        None => RecallConfig::load()?,
    };
    Ok(config)
}

fn read_messages(path: &Path) -> Result<Vec<Message>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("{} is not a message array", path.display()))
}

async fn open_store(config: &RecallConfig) -> Result<Arc<MemoryStore>> {
    let collection = SurrealCollection::connect(&config.storage)
        .await
        .with_context(|| format!("failed to open memory store at {}", config.storage.url))?;
    Ok(Arc::new(MemoryStore::new(
        Arc::new(collection),
        config.memory.clone(),
    )))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,surrealdb=warn")),
        )
        .init();

    let cli = Cli::parse();

    if let Commands::Version = cli.command {
        println!("recall {}", env!("CARGO_PKG_VERSION"));
        println!("recall-core {}", recall_core::VERSION);
        return Ok(());
    }

    let config = load_config(cli.config.as_deref())?;
    tracing::debug!(storage = %config.storage.url, "configuration loaded");
    let manager = ContextBudgetManager::new(&config.context);

    match cli.command {
        Commands::Version => {}
        Commands::Models => {
            let catalog = manager.catalog();
            for (id, profile) in catalog.iter() {
                let marker = if id == catalog.default_model() { "*" } else { " " };
                println!(
                    "{} {:<45} window {:>7}  reply {:>5}  overhead {}",
                    marker,
                    id,
                    profile.context_window_tokens,
                    profile.max_reply_tokens,
                    profile.per_message_overhead_tokens
                );
            }
        }
        Commands::Usage { model, file } => {
            let messages = read_messages(&file)?;
            let usage = manager.usage(&messages, &model);
            println!("{}", serde_json::to_string_pretty(&usage)?);
        }
        Commands::Fit {
            model,
            file,
            memories,
        } => {
            let messages = read_messages(&file)?;
            let outcome = manager.fit_with_outcome(&messages, &model, vec![(); memories].as_slice());
            println!("{}", serde_json::to_string_pretty(&outcome.messages)?);
            eprintln!(
                "kept {} of {} messages, {} of {} tokens",
                messages.len() - outcome.trimmed_count,
                messages.len(),
                outcome.tokens_used,
                outcome.available_tokens
            );
        }
        Commands::Chat {
            user,
            model,
            file,
            reply,
        } => {
            let messages = read_messages(&file)?;
            let store = open_store(&config).await?;
            let pipeline = TurnPipeline::new(
                store,
                manager,
                Arc::new(ScriptedLLMProvider::new([reply])),
                config.turn.clone(),
            );
            let outcome = pipeline.run(ChatTurn::new(user, model, messages)).await?;
            if outcome.memory_id.is_none() {
                tracing::warn!("exchange was not stored");
            }

            println!("{}", serde_json::to_string_pretty(&outcome.prompt)?);
            eprintln!(
                "{} memories used, {} messages trimmed, {:.1}% of window",
                outcome.memories_used.len(),
                outcome.trimmed_count,
                outcome.usage.percentage
            );
        }
        Commands::Memory { command } => {
            let store = open_store(&config).await?;
            match command {
                MemoryCommands::Add { user, content } => {
                    let id = store.add(&user, &content, None).await?;
                    println!("{}", id);
                }
                MemoryCommands::Search { user, query, limit } => {
                    let limit = limit.unwrap_or(config.memory.default_limit);
                    let hits = store.retrieve(&user, &query, limit).await;
                    println!("{}", serde_json::to_string_pretty(&hits)?);
                }
                MemoryCommands::Stats { user, query } => {
                    let state = store.memory_state(&user, query.as_deref()).await;
                    println!("{}", serde_json::to_string_pretty(&state)?);
                }
                MemoryCommands::Consolidate { user } => {
                    let report = store.consolidate(&user).await?;
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
            }
        }
    }

    Ok(())
}
