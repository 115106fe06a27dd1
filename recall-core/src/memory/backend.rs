//! Document collection trait for pluggable memory storage
//!
//! The memory store never talks to a database directly. It drives a
//! `MemoryCollection`, a collection-scoped document API in the spirit of a
//! document database driver: filtered find with sort and limit, single inserts,
//! single and bulk updates, bulk deletes, counts, aggregates, and idempotent
//! index creation.
//!
//! Implementations:
//!
//! - [`InMemoryCollection`](super::InMemoryCollection) for tests and lightweight use
//! - [`SurrealCollection`](super::SurrealCollection) backed by SurrealDB

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entry::{MemoryEntry, MemoryStats};
use super::keywords::{normalize, search_text};
use crate::error::Result;

/// Lexical match against an entry's content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TextMatch {
    /// Normalized phrase appears as a contiguous word sequence
    Phrase(String),

    /// Every term appears as a whole word
    AllTerms(Vec<String>),

    /// Case-insensitive raw substring
    Substring(String),

    /// At least one term appears as a case-insensitive substring
    AnyTerm(Vec<String>),
}

impl TextMatch {
    /// Evaluate against raw content
    pub fn matches(&self, content: &str) -> bool {
        match self {
            TextMatch::Phrase(phrase) => {
                let phrase = normalize(phrase);
                !phrase.is_empty() && search_text(content).contains(&format!(" {} ", phrase))
            }
            TextMatch::AllTerms(terms) => {
                let haystack = search_text(content);
                !terms.is_empty()
                    && terms
                        .iter()
                        .all(|term| haystack.contains(&format!(" {} ", term.to_lowercase())))
            }
            TextMatch::Substring(needle) => {
                !needle.is_empty() && content.to_lowercase().contains(&needle.to_lowercase())
            }
            TextMatch::AnyTerm(terms) => {
                let haystack = content.to_lowercase();
                terms
                    .iter()
                    .any(|term| !term.is_empty() && haystack.contains(&term.to_lowercase()))
            }
        }
    }
}

/// Filter over one user's entries. All present clauses must hold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryFilter {
    pub user_id: String,

    pub text: Option<TextMatch>,

    /// Only entries created strictly after this instant
    pub created_after: Option<DateTime<Utc>>,

    /// Only entries scoring strictly above this
    pub min_relevance: Option<f64>,

    /// Entries already collected elsewhere
    pub exclude_ids: Vec<String>,
}

impl MemoryFilter {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Default::default()
        }
    }

    pub fn with_text(mut self, text: TextMatch) -> Self {
        self.text = Some(text);
        self
    }

    pub fn created_after(mut self, at: DateTime<Utc>) -> Self {
        self.created_after = Some(at);
        self
    }

    pub fn min_relevance(mut self, score: f64) -> Self {
        self.min_relevance = Some(score);
        self
    }

    pub fn excluding(mut self, ids: impl IntoIterator<Item = String>) -> Self {
        self.exclude_ids.extend(ids);
        self
    }

    /// Evaluate the filter in process
    pub fn matches(&self, entry: &MemoryEntry) -> bool {
        entry.user_id == self.user_id
            && self
                .created_after
                .is_none_or(|after| entry.created_at > after)
            && self
                .min_relevance
                .is_none_or(|min| entry.relevance_score > min)
            && !self.exclude_ids.iter().any(|id| *id == entry.id)
            && self
                .text
                .as_ref()
                .is_none_or(|text| text.matches(&entry.content))
    }
}

/// Sortable fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    RelevanceScore,
    LastAccessedAt,
    AccessCount,
    CreatedAt,
}

/// One sort clause
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub field: SortField,
    pub descending: bool,
}

impl SortKey {
    pub const fn desc(field: SortField) -> Self {
        Self {
            field,
            descending: true,
        }
    }
}

/// Retrieval ranking: score, then recency of use, then popularity
pub const RANKING: [SortKey; 3] = [
    SortKey::desc(SortField::RelevanceScore),
    SortKey::desc(SortField::LastAccessedAt),
    SortKey::desc(SortField::AccessCount),
];

/// Mutation applied to matched entries
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MemoryUpdate {
    /// Retrieval bookkeeping: touch, count, and reinforce
    RecordAccess { at: DateTime<Utc>, boost: f64 },

    /// Multiply the relevance score
    ScaleRelevance(f64),
}

impl MemoryUpdate {
    pub fn apply(&self, entry: &mut MemoryEntry) {
        match *self {
            MemoryUpdate::RecordAccess { at, boost } => entry.record_access(at, boost),
            MemoryUpdate::ScaleRelevance(factor) => entry.relevance_score *= factor,
        }
    }
}

/// Deletion criteria. An entry is pruned only when every clause holds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PruneRule {
    pub relevance_below: f64,
    pub accessed_before: DateTime<Utc>,
    pub access_count_below: u32,
}

impl PruneRule {
    pub fn matches(&self, entry: &MemoryEntry) -> bool {
        entry.relevance_score < self.relevance_below
            && entry.last_accessed_at < self.accessed_before
            && entry.access_count < self.access_count_below
    }
}

/// Kind of index to ensure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexKind {
    /// Ordinary (possibly compound) index over fields
    Fields(Vec<&'static str>),

    /// Full-text index over one field
    FullText(&'static str),
}

/// Named index definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: &'static str,
    pub kind: IndexKind,
}

impl IndexSpec {
    pub fn fields(name: &'static str, fields: &[&'static str]) -> Self {
        Self {
            name,
            kind: IndexKind::Fields(fields.to_vec()),
        }
    }

    pub fn full_text(name: &'static str, field: &'static str) -> Self {
        Self {
            name,
            kind: IndexKind::FullText(field),
        }
    }
}

/// Indexes the memory store asks for before every retrieval.
///
/// They only speed up lookups; `find` returns the same entries with or
/// without them.
pub fn memory_indexes() -> Vec<IndexSpec> {
    vec![
        IndexSpec::fields("memory_user_created", &["user_id", "created_at"]),
        IndexSpec::fields("memory_user_relevance", &["user_id", "relevance_score"]),
        IndexSpec::fields("memory_user_accessed", &["user_id", "last_accessed_at"]),
        IndexSpec::full_text("memory_content_text", "content"),
        IndexSpec::fields("memory_keywords", &["keywords"]),
    ]
}

/// Collection-scoped document operations over memory entries
#[async_trait]
pub trait MemoryCollection: Send + Sync {
    /// Create indexes that do not exist yet; calling again is a no-op
    async fn ensure_indexes(&self, indexes: &[IndexSpec]) -> Result<()>;

    /// Matching entries ordered by `sort`, at most `limit`
    async fn find(
        &self,
        filter: &MemoryFilter,
        sort: &[SortKey],
        limit: usize,
    ) -> Result<Vec<MemoryEntry>>;

    /// Fetch one entry by id
    async fn get(&self, id: &str) -> Result<Option<MemoryEntry>>;

    /// Insert a new entry
    async fn insert_one(&self, entry: MemoryEntry) -> Result<()>;

    /// Update one entry by id, returns true if it existed
    async fn update_one(&self, id: &str, update: MemoryUpdate) -> Result<bool>;

    /// Update every matching entry, returns the number touched
    async fn update_many(&self, filter: &MemoryFilter, update: MemoryUpdate) -> Result<u64>;

    /// Delete a user's entries matching `rule`, returns the number removed
    async fn delete_many(&self, user_id: &str, rule: &PruneRule) -> Result<u64>;

    /// Number of entries owned by a user
    async fn count(&self, user_id: &str) -> Result<u64>;

    /// Count, mean score, and creation-time bounds for a user
    async fn aggregate_stats(&self, user_id: &str) -> Result<MemoryStats>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_phrase_match_is_word_aligned() {
        let phrase = TextMatch::Phrase("hiking in Colorado".to_string());
        assert!(phrase.matches("I love hiking in Colorado!"));
        assert!(!phrase.matches("I love hiking in Coloradoan hills"));
        assert!(!phrase.matches("Colorado hiking"));
    }

    #[test]
    fn test_all_terms_match() {
        let terms = TextMatch::AllTerms(vec!["colorado".into(), "hiking".into()]);
        assert!(terms.matches("Colorado has great hiking"));
        assert!(!terms.matches("Colorado has great hikes"));
        assert!(!TextMatch::AllTerms(vec![]).matches("anything"));
    }

    #[test]
    fn test_substring_and_any_term() {
        assert!(TextMatch::Substring("HIK".into()).matches("went hiking"));
        assert!(!TextMatch::Substring(String::new()).matches("went hiking"));

        let any = TextMatch::AnyTerm(vec!["ski".into(), "hik".into()]);
        assert!(any.matches("Went hiking"));
        assert!(!any.matches("Went swimming"));
    }

    #[test]
    fn test_filter_clauses() {
        let mut entry = MemoryEntry::new("u1", "Dinner at the ramen place");
        entry.relevance_score = 0.5;

        let base = MemoryFilter::for_user("u1");
        assert!(base.matches(&entry));
        assert!(!MemoryFilter::for_user("u2").matches(&entry));
        assert!(!base.clone().min_relevance(0.5).matches(&entry));
        assert!(base.clone().min_relevance(0.1).matches(&entry));
        assert!(!base.clone().excluding([entry.id.clone()]).matches(&entry));
        assert!(
            !base
                .clone()
                .created_after(entry.created_at + Duration::seconds(1))
                .matches(&entry)
        );
        assert!(
            base.with_text(TextMatch::Substring("RAMEN".into()))
                .matches(&entry)
        );
    }

    #[test]
    fn test_prune_rule_requires_every_clause() {
        let now = Utc::now();
        let rule = PruneRule {
            relevance_below: 0.2,
            accessed_before: now - Duration::days(30),
            access_count_below: 2,
        };

        let mut stale = MemoryEntry::new("u1", "stale");
        stale.relevance_score = 0.05;
        stale.last_accessed_at = now - Duration::days(40);
        assert!(rule.matches(&stale));

        let mut popular = stale.clone();
        popular.access_count = 5;
        assert!(!rule.matches(&popular));

        let mut recent = stale.clone();
        recent.last_accessed_at = now;
        assert!(!rule.matches(&recent));

        let mut strong = stale;
        strong.relevance_score = 0.9;
        assert!(!rule.matches(&strong));
    }

    #[test]
    fn test_updates() {
        let mut entry = MemoryEntry::new("u1", "x");
        MemoryUpdate::ScaleRelevance(0.95).apply(&mut entry);
        assert!((entry.relevance_score - 0.95).abs() < 1e-9);

        let at = Utc::now();
        MemoryUpdate::RecordAccess { at, boost: 0.1 }.apply(&mut entry);
        assert_eq!(entry.access_count, 1);
        assert!((entry.relevance_score - 1.05).abs() < 1e-9);
    }
}
