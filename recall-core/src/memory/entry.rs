//! Persisted memory entries and aggregate views over them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::keywords::extract_keywords;

/// Score every new entry starts with
pub const INITIAL_RELEVANCE: f64 = 1.0;

/// A remembered snippet of conversation, owned by one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryEntry {
    pub id: String,

    pub user_id: String,

    /// Free text as it was remembered
    pub content: String,

    /// Top frequent non-stopword terms of `content`
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Ranking and eviction weight; grows on retrieval, decays on consolidation
    pub relevance_score: f64,

    pub created_at: DateTime<Utc>,

    pub last_accessed_at: DateTime<Utc>,

    /// Number of result sets this entry has appeared in
    pub access_count: u32,

    /// Conversation context supplied when the entry was added
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

impl MemoryEntry {
    /// Build a fresh entry with derived keywords and initial bookkeeping
    pub fn new(user_id: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        let now = Utc::now();

        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            keywords: extract_keywords(&content),
            content,
            relevance_score: INITIAL_RELEVANCE,
            created_at: now,
            last_accessed_at: now,
            access_count: 0,
            context: None,
        }
    }

    pub fn with_context(mut self, context: Option<serde_json::Value>) -> Self {
        self.context = context;
        self
    }

    /// Apply the bookkeeping of one retrieval hit
    pub fn record_access(&mut self, at: DateTime<Utc>, boost: f64) {
        self.last_accessed_at = at;
        self.access_count = self.access_count.saturating_add(1);
        self.relevance_score += boost;
    }
}

/// Aggregate statistics over one user's memories
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStats {
    pub total_memories: u64,

    /// Mean relevance score, 0.0 when there are no entries
    pub average_relevance: f64,

    pub oldest_memory: Option<DateTime<Utc>>,

    pub newest_memory: Option<DateTime<Utc>>,
}

impl MemoryStats {
    /// Fold stats out of a set of entries
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a MemoryEntry>) -> Self {
        let mut stats = MemoryStats::default();
        let mut relevance_sum = 0.0;

        for entry in entries {
            stats.total_memories += 1;
            relevance_sum += entry.relevance_score;
            stats.oldest_memory = Some(match stats.oldest_memory {
                Some(oldest) => oldest.min(entry.created_at),
                None => entry.created_at,
            });
            stats.newest_memory = Some(match stats.newest_memory {
                Some(newest) => newest.max(entry.created_at),
                None => entry.created_at,
            });
        }

        if stats.total_memories > 0 {
            stats.average_relevance = relevance_sum / stats.total_memories as f64;
        }

        stats
    }
}

/// Memory overview for a user, optionally with the hit count for a query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryState {
    #[serde(flatten)]
    pub stats: MemoryStats,

    /// Entries a query surfaced; 0 when no query was given
    pub relevant_memories: usize,
}
