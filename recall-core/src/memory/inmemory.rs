//! In-memory collection for testing and lightweight deployments
//!
//! Entries live in a HashMap and filters are evaluated in process. It's useful
//! for:
//!
//! - Unit testing the store without a database
//! - Simulating storage outages (`set_unavailable`)
//! - Single-process deployments without persistence needs

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::backend::{
    IndexSpec, MemoryCollection, MemoryFilter, MemoryUpdate, PruneRule, SortField, SortKey,
};
use super::entry::{MemoryEntry, MemoryStats};
use crate::error::{RecallError, Result};

/// In-memory memory collection
#[derive(Default)]
pub struct InMemoryCollection {
    entries: RwLock<HashMap<String, MemoryEntry>>,
    indexes: RwLock<BTreeSet<&'static str>>,
    unavailable: AtomicBool,
}

impl InMemoryCollection {
    /// Create an empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail with a storage error until reset
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, AtomicOrdering::SeqCst);
    }

    /// Names of indexes ensured so far
    pub async fn index_names(&self) -> Vec<&'static str> {
        self.indexes.read().await.iter().copied().collect()
    }

    /// Number of entries across all users
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(AtomicOrdering::SeqCst) {
            return Err(RecallError::Storage(
                "in-memory collection marked unavailable".to_string(),
            ));
        }
        Ok(())
    }

    fn compare(a: &MemoryEntry, b: &MemoryEntry, sort: &[SortKey]) -> Ordering {
        for key in sort {
            let ordering = match key.field {
                SortField::RelevanceScore => a
                    .relevance_score
                    .partial_cmp(&b.relevance_score)
                    .unwrap_or(Ordering::Equal),
                SortField::LastAccessedAt => a.last_accessed_at.cmp(&b.last_accessed_at),
                SortField::AccessCount => a.access_count.cmp(&b.access_count),
                SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            };
            let ordering = if key.descending {
                ordering.reverse()
            } else {
                ordering
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

#[async_trait]
impl MemoryCollection for InMemoryCollection {
    async fn ensure_indexes(&self, indexes: &[IndexSpec]) -> Result<()> {
        self.check_available()?;
        let mut known = self.indexes.write().await;
        for index in indexes {
            known.insert(index.name);
        }
        Ok(())
    }

    async fn find(
        &self,
        filter: &MemoryFilter,
        sort: &[SortKey],
        limit: usize,
    ) -> Result<Vec<MemoryEntry>> {
        self.check_available()?;
        let entries = self.entries.read().await;

        let mut matched: Vec<MemoryEntry> = entries
            .values()
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect();

        matched.sort_by(|a, b| Self::compare(a, b, sort));
        matched.truncate(limit);

        Ok(matched)
    }

    async fn get(&self, id: &str) -> Result<Option<MemoryEntry>> {
        self.check_available()?;
        Ok(self.entries.read().await.get(id).cloned())
    }

    async fn insert_one(&self, entry: MemoryEntry) -> Result<()> {
        self.check_available()?;
        let mut entries = self.entries.write().await;
        if entries.contains_key(&entry.id) {
            return Err(RecallError::Storage(format!(
                "duplicate memory id {}",
                entry.id
            )));
        }
        entries.insert(entry.id.clone(), entry);
        Ok(())
    }

    async fn update_one(&self, id: &str, update: MemoryUpdate) -> Result<bool> {
        self.check_available()?;
        let mut entries = self.entries.write().await;
        match entries.get_mut(id) {
            Some(entry) => {
                update.apply(entry);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_many(&self, filter: &MemoryFilter, update: MemoryUpdate) -> Result<u64> {
        self.check_available()?;
        let mut entries = self.entries.write().await;
        let mut touched = 0;
        for entry in entries.values_mut().filter(|entry| filter.matches(entry)) {
            update.apply(entry);
            touched += 1;
        }
        Ok(touched)
    }

    async fn delete_many(&self, user_id: &str, rule: &PruneRule) -> Result<u64> {
        self.check_available()?;
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !(entry.user_id == user_id && rule.matches(entry)));
        Ok((before - entries.len()) as u64)
    }

    async fn count(&self, user_id: &str) -> Result<u64> {
        self.check_available()?;
        let entries = self.entries.read().await;
        Ok(entries.values().filter(|e| e.user_id == user_id).count() as u64)
    }

    async fn aggregate_stats(&self, user_id: &str) -> Result<MemoryStats> {
        self.check_available()?;
        let entries = self.entries.read().await;
        Ok(MemoryStats::from_entries(
            entries.values().filter(|e| e.user_id == user_id),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::backend::{RANKING, TextMatch, memory_indexes};
    use chrono::{Duration, Utc};

    fn entry(user: &str, content: &str, score: f64) -> MemoryEntry {
        let mut entry = MemoryEntry::new(user, content);
        entry.relevance_score = score;
        entry
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let collection = InMemoryCollection::new();
        let stored = MemoryEntry::new("u1", "Hello world");
        collection.insert_one(stored.clone()).await.unwrap();

        let fetched = collection.get(&stored.id).await.unwrap();
        assert_eq!(fetched, Some(stored));
        assert_eq!(collection.len().await, 1);
    }

    #[tokio::test]
    async fn test_duplicate_insert_rejected() {
        let collection = InMemoryCollection::new();
        let stored = MemoryEntry::new("u1", "once");
        collection.insert_one(stored.clone()).await.unwrap();

        let err = collection.insert_one(stored).await.unwrap_err();
        assert!(err.is_storage());
    }

    #[tokio::test]
    async fn test_find_sorts_and_limits() {
        let collection = InMemoryCollection::new();
        let now = Utc::now();

        let low = entry("u1", "sky is blue", 0.5);
        let high = entry("u1", "sky is grey", 2.0);
        let mut tie_old = entry("u1", "sky at night", 1.0);
        tie_old.last_accessed_at = now - Duration::hours(2);
        let mut tie_new = entry("u1", "sky at dawn", 1.0);
        tie_new.last_accessed_at = now;
        let other_user = entry("u2", "sky is mine", 9.0);

        for e in [&low, &high, &tie_old, &tie_new, &other_user] {
            collection.insert_one(e.clone()).await.unwrap();
        }

        let filter = MemoryFilter::for_user("u1").with_text(TextMatch::Substring("sky".into()));
        let found = collection.find(&filter, &RANKING, 3).await.unwrap();
        let ids: Vec<_> = found.iter().map(|e| e.id.clone()).collect();

        assert_eq!(ids, vec![high.id, tie_new.id, tie_old.id]);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let collection = InMemoryCollection::new();
        let now = Utc::now();

        let keep = entry("u1", "keep me", 1.0);
        let mut prune = entry("u1", "prune me", 0.05);
        prune.last_accessed_at = now - Duration::days(45);
        let mut other = entry("u2", "other user", 0.05);
        other.last_accessed_at = now - Duration::days(45);

        for e in [&keep, &prune, &other] {
            collection.insert_one(e.clone()).await.unwrap();
        }

        let rule = PruneRule {
            relevance_below: 0.2,
            accessed_before: now - Duration::days(30),
            access_count_below: 2,
        };
        assert_eq!(collection.delete_many("u1", &rule).await.unwrap(), 1);
        assert!(collection.get(&prune.id).await.unwrap().is_none());
        assert!(collection.get(&other.id).await.unwrap().is_some());

        let scaled = collection
            .update_many(&MemoryFilter::for_user("u1"), MemoryUpdate::ScaleRelevance(0.5))
            .await
            .unwrap();
        assert_eq!(scaled, 1);
        let kept = collection.get(&keep.id).await.unwrap().unwrap();
        assert!((kept.relevance_score - 0.5).abs() < 1e-9);

        assert!(
            !collection
                .update_one("missing", MemoryUpdate::ScaleRelevance(0.5))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_count_and_stats() {
        let collection = InMemoryCollection::new();
        collection.insert_one(entry("u1", "a", 1.0)).await.unwrap();
        collection.insert_one(entry("u1", "b", 0.5)).await.unwrap();
        collection.insert_one(entry("u2", "c", 0.1)).await.unwrap();

        assert_eq!(collection.count("u1").await.unwrap(), 2);
        let stats = collection.aggregate_stats("u1").await.unwrap();
        assert_eq!(stats.total_memories, 2);
        assert!((stats.average_relevance - 0.75).abs() < 1e-9);

        let empty = collection.aggregate_stats("nobody").await.unwrap();
        assert_eq!(empty, MemoryStats::default());
    }

    #[tokio::test]
    async fn test_ensure_indexes_idempotent() {
        let collection = InMemoryCollection::new();
        collection.ensure_indexes(&memory_indexes()).await.unwrap();
        collection.ensure_indexes(&memory_indexes()).await.unwrap();

        assert_eq!(collection.index_names().await.len(), 5);
    }

    #[tokio::test]
    async fn test_unavailable() {
        let collection = InMemoryCollection::new();
        collection.set_unavailable(true);
        assert!(collection.count("u1").await.unwrap_err().is_storage());

        collection.set_unavailable(false);
        assert_eq!(collection.count("u1").await.unwrap(), 0);
    }
}
