//! Per-user relevance-ranked memory over a document collection

use std::sync::Arc;

use chrono::Utc;

use super::backend::{
    MemoryCollection, MemoryFilter, MemoryUpdate, RANKING, TextMatch, memory_indexes,
};
use super::entry::{MemoryEntry, MemoryState, MemoryStats};
use super::keywords::query_terms;
use crate::config::MemoryConfig;
use crate::consolidation::{ConsolidationReport, Consolidator};
use crate::error::{RecallError, Result};

/// Long-term memory for chat users.
///
/// Retrieval is lexical and layered: exact phrase, then all terms, then raw
/// substring, then any term among recent entries. Every entry returned is
/// reinforced, and every insert is followed by a consolidation pass.
///
/// Reads fail open: storage trouble during `retrieve`, `stats`, or
/// `memory_state` is logged and produces an empty result.
///
/// # Example
///
/// ```rust,ignore
/// use recall_core::memory::{InMemoryCollection, MemoryStore};
/// use recall_core::config::MemoryConfig;
///
/// let store = MemoryStore::new(Arc::new(InMemoryCollection::new()), MemoryConfig::default());
/// store.add("user-1", "I love hiking in Colorado", None).await?;
///
/// let hits = store.retrieve("user-1", "hiking", 5).await;
/// assert_eq!(hits[0].access_count, 1);
/// ```
pub struct MemoryStore {
    collection: Arc<dyn MemoryCollection>,
    consolidator: Consolidator,
    config: MemoryConfig,
}

impl MemoryStore {
    pub fn new(collection: Arc<dyn MemoryCollection>, config: MemoryConfig) -> Self {
        let consolidator = Consolidator::new(collection.clone(), config.consolidation.clone());
        Self {
            collection,
            consolidator,
            config,
        }
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Underlying collection handle
    pub fn collection(&self) -> &Arc<dyn MemoryCollection> {
        &self.collection
    }

    /// Up to `limit` of the user's entries most relevant to `query`.
    ///
    /// Never fails; storage errors yield an empty vec.
    pub async fn retrieve(&self, user_id: &str, query: &str, limit: usize) -> Vec<MemoryEntry> {
        match self.try_retrieve(user_id, query, limit).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(
                    user_id,
                    error = %e,
                    "Memory retrieval failed, continuing without memories"
                );
                Vec::new()
            }
        }
    }

    /// [`retrieve`](Self::retrieve) with the configured default limit
    pub async fn retrieve_default(&self, user_id: &str, query: &str) -> Vec<MemoryEntry> {
        self.retrieve(user_id, query, self.config.default_limit).await
    }

    fn strategies(&self, query: &str) -> Vec<MemoryFilter> {
        let terms = query_terms(query);
        let recent_since = chrono::Duration::from_std(self.config.recency_window)
            .ok()
            .and_then(|window| Utc::now().checked_sub_signed(window));

        let mut texts = vec![TextMatch::Phrase(query.to_string())];
        if !terms.is_empty() {
            texts.push(TextMatch::AllTerms(terms.clone()));
        }
        texts.push(TextMatch::Substring(query.to_string()));

        let mut filters: Vec<MemoryFilter> = texts
            .into_iter()
            .map(|text| MemoryFilter::default().with_text(text))
            .collect();

        if !terms.is_empty() {
            let mut recent = MemoryFilter::default().with_text(TextMatch::AnyTerm(terms));
            if let Some(since) = recent_since {
                recent = recent.created_after(since);
            }
            filters.push(recent);
        }

        filters
    }

    async fn try_retrieve(
        &self,
        user_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<MemoryEntry>> {
        let query = query.trim();
        if query.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        self.collection.ensure_indexes(&memory_indexes()).await?;

        let mut found: Vec<MemoryEntry> = Vec::with_capacity(limit);
        for strategy in self.strategies(query) {
            if found.len() >= limit {
                break;
            }

            let filter = MemoryFilter {
                user_id: user_id.to_string(),
                ..strategy
            }
            .min_relevance(self.config.min_relevance)
            .excluding(found.iter().map(|e| e.id.clone()));

            let batch = self
                .collection
                .find(&filter, &RANKING, limit - found.len())
                .await?;
            found.extend(batch);
        }

        let now = Utc::now();
        let boost = self.config.access_boost;
        for entry in &mut found {
            match self
                .collection
                .update_one(&entry.id, MemoryUpdate::RecordAccess { at: now, boost })
                .await
            {
                Ok(_) => entry.record_access(now, boost),
                Err(e) => {
                    tracing::warn!(
                        user_id,
                        memory_id = %entry.id,
                        error = %e,
                        "Failed to reinforce memory"
                    );
                }
            }
        }

        tracing::debug!(user_id, hits = found.len(), "Retrieved memories");
        Ok(found)
    }

    /// Store a new memory and run consolidation for its owner.
    ///
    /// Returns the new entry's id. Insert failures propagate; consolidation
    /// failures are logged and swallowed.
    pub async fn add(
        &self,
        user_id: &str,
        content: &str,
        context: Option<serde_json::Value>,
    ) -> Result<String> {
        if user_id.trim().is_empty() {
            return Err(RecallError::InvalidInput("user id must not be empty".to_string()));
        }

        let entry = MemoryEntry::new(user_id, content).with_context(context);
        let id = entry.id.clone();
        self.collection.insert_one(entry).await?;

        if let Err(e) = self.consolidator.consolidate(user_id).await {
            tracing::warn!(user_id, error = %e, "Consolidation after insert failed");
        }

        Ok(id)
    }

    /// Run a consolidation pass for one user
    pub async fn consolidate(&self, user_id: &str) -> Result<ConsolidationReport> {
        self.consolidator.consolidate(user_id).await
    }

    /// Aggregate view of the user's memories; zeroed on storage failure
    pub async fn stats(&self, user_id: &str) -> MemoryStats {
        match self.collection.aggregate_stats(user_id).await {
            Ok(stats) => stats,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Failed to read memory stats");
                MemoryStats::default()
            }
        }
    }

    /// Stats plus, for a non-empty query, how many memories it surfaces.
    ///
    /// Counting goes through [`retrieve`](Self::retrieve), so the surfaced
    /// entries are reinforced.
    pub async fn memory_state(&self, user_id: &str, query: Option<&str>) -> MemoryState {
        let stats = self.stats(user_id).await;
        let relevant_memories = match query.map(str::trim).filter(|q| !q.is_empty()) {
            Some(query) => self
                .retrieve(user_id, query, self.config.relevant_state_limit)
                .await
                .len(),
            None => 0,
        };

        MemoryState {
            stats,
            relevant_memories,
        }
    }
}
