//! SurrealDB-backed memory collection
//!
//! Works against any engine `surrealdb::engine::any` understands: `mem://` for
//! an in-process store, `ws://` or `http://` for a server. Timestamps are stored
//! as epoch milliseconds and every entry carries a derived `search_text` field
//! (normalized, space-padded content) so word-level matching is a plain
//! substring test on the server.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use surrealdb::Surreal;
use surrealdb::engine::any::{self, Any};
use surrealdb::opt::auth::Root;

use super::backend::{
    IndexKind, IndexSpec, MemoryCollection, MemoryFilter, MemoryUpdate, PruneRule, SortField,
    SortKey, TextMatch,
};
use super::entry::{MemoryEntry, MemoryStats};
use super::keywords::{normalize, search_text};
use crate::config::StorageConfig;
use crate::error::{RecallError, Result};

const PROJECTION: &str = "meta::id(id) AS id, user_id, content, keywords, relevance_score, \
                          created_at, last_accessed_at, access_count, context";

/// Memory collection stored in a SurrealDB table
#[derive(Debug, Clone)]
pub struct SurrealCollection {
    db: Surreal<Any>,
    table: String,
}

/// Row layout in the table
#[derive(Debug, Serialize, Deserialize)]
struct StoredMemory {
    #[serde(skip_serializing)]
    id: String,
    user_id: String,
    content: String,
    #[serde(default, skip_deserializing)]
    search_text: String,
    #[serde(default)]
    keywords: Vec<String>,
    relevance_score: f64,
    created_at: i64,
    last_accessed_at: i64,
    access_count: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    context: Option<String>,
}

impl StoredMemory {
    fn from_entry(entry: &MemoryEntry) -> Result<Self> {
        Ok(Self {
            id: entry.id.clone(),
            user_id: entry.user_id.clone(),
            content: entry.content.clone(),
            search_text: search_text(&entry.content),
            keywords: entry.keywords.clone(),
            relevance_score: entry.relevance_score,
            created_at: entry.created_at.timestamp_millis(),
            last_accessed_at: entry.last_accessed_at.timestamp_millis(),
            access_count: i64::from(entry.access_count),
            context: entry
                .context
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
        })
    }

    fn into_entry(self) -> Result<MemoryEntry> {
        Ok(MemoryEntry {
            id: self.id,
            user_id: self.user_id,
            content: self.content,
            keywords: self.keywords,
            relevance_score: self.relevance_score,
            created_at: from_millis(self.created_at)?,
            last_accessed_at: from_millis(self.last_accessed_at)?,
            access_count: u32::try_from(self.access_count.max(0)).unwrap_or(u32::MAX),
            context: self
                .context
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct IdRow {
    #[allow(dead_code)]
    id: String,
}

#[derive(Debug, Deserialize)]
struct CountRow {
    total: i64,
}

#[derive(Debug, Deserialize)]
struct StatsRow {
    total: i64,
    average: Option<f64>,
    oldest: Option<i64>,
    newest: Option<i64>,
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| RecallError::Storage(format!("timestamp out of range: {}", ms)))
}

/// Named query parameters collected while rendering a statement
#[derive(Debug, Default)]
struct Bindings(BTreeMap<String, Value>);

impl Bindings {
    fn bind(&mut self, name: impl Into<String>, value: impl Into<Value>) -> String {
        let name = name.into();
        let placeholder = format!("${}", name);
        self.0.insert(name, value.into());
        placeholder
    }
}

fn field_name(field: SortField) -> &'static str {
    match field {
        SortField::RelevanceScore => "relevance_score",
        SortField::LastAccessedAt => "last_accessed_at",
        SortField::AccessCount => "access_count",
        SortField::CreatedAt => "created_at",
    }
}

fn order_clause(sort: &[SortKey]) -> String {
    if sort.is_empty() {
        return String::new();
    }
    let keys: Vec<String> = sort
        .iter()
        .map(|key| {
            format!(
                "{} {}",
                field_name(key.field),
                if key.descending { "DESC" } else { "ASC" }
            )
        })
        .collect();
    format!(" ORDER BY {}", keys.join(", "))
}

fn text_clause(text: &TextMatch, binds: &mut Bindings) -> String {
    match text {
        TextMatch::Phrase(phrase) => {
            let phrase = normalize(phrase);
            if phrase.is_empty() {
                return "false".to_string();
            }
            let p = binds.bind("phrase", format!(" {} ", phrase));
            format!("string::contains(search_text, {})", p)
        }
        TextMatch::AllTerms(terms) => {
            if terms.is_empty() {
                return "false".to_string();
            }
            let clauses: Vec<String> = terms
                .iter()
                .enumerate()
                .map(|(i, term)| {
                    let p = binds.bind(format!("all_{}", i), format!(" {} ", term.to_lowercase()));
                    format!("string::contains(search_text, {})", p)
                })
                .collect();
            format!("({})", clauses.join(" AND "))
        }
        TextMatch::Substring(needle) => {
            if needle.is_empty() {
                return "false".to_string();
            }
            let p = binds.bind("needle", needle.to_lowercase());
            format!("string::contains(string::lowercase(content), {})", p)
        }
        TextMatch::AnyTerm(terms) => {
            let clauses: Vec<String> = terms
                .iter()
                .filter(|term| !term.is_empty())
                .enumerate()
                .map(|(i, term)| {
                    let p = binds.bind(format!("any_{}", i), term.to_lowercase());
                    format!("string::contains(string::lowercase(content), {})", p)
                })
                .collect();
            if clauses.is_empty() {
                return "false".to_string();
            }
            format!("({})", clauses.join(" OR "))
        }
    }
}

fn where_clause(filter: &MemoryFilter, binds: &mut Bindings) -> String {
    let mut clauses = vec![format!(
        "user_id = {}",
        binds.bind("user_id", filter.user_id.clone())
    )];

    if let Some(after) = filter.created_after {
        let p = binds.bind("created_after", after.timestamp_millis());
        clauses.push(format!("created_at > {}", p));
    }
    if let Some(min) = filter.min_relevance {
        let p = binds.bind("min_relevance", min);
        clauses.push(format!("relevance_score > {}", p));
    }
    if !filter.exclude_ids.is_empty() {
        let p = binds.bind("exclude_ids", filter.exclude_ids.clone());
        clauses.push(format!("meta::id(id) NOTINSIDE {}", p));
    }
    if let Some(text) = &filter.text {
        clauses.push(text_clause(text, binds));
    }

    clauses.join(" AND ")
}

fn set_clause(update: MemoryUpdate, binds: &mut Bindings) -> String {
    match update {
        MemoryUpdate::RecordAccess { at, boost } => {
            let at = binds.bind("accessed_at", at.timestamp_millis());
            let boost = binds.bind("boost", boost);
            format!(
                "last_accessed_at = {}, access_count = access_count + 1, \
                 relevance_score = relevance_score + {}",
                at, boost
            )
        }
        MemoryUpdate::ScaleRelevance(factor) => {
            let factor = binds.bind("factor", factor);
            format!("relevance_score = relevance_score * {}", factor)
        }
    }
}

fn prune_clause(user_id: &str, rule: &PruneRule, binds: &mut Bindings) -> String {
    let user = binds.bind("user_id", user_id.to_string());
    let relevance = binds.bind("relevance_below", rule.relevance_below);
    let before = binds.bind("accessed_before", rule.accessed_before.timestamp_millis());
    let count = binds.bind("access_count_below", i64::from(rule.access_count_below));
    format!(
        "user_id = {} AND relevance_score < {} AND last_accessed_at < {} AND access_count < {}",
        user, relevance, before, count
    )
}

impl SurrealCollection {
    /// Connect, select namespace and database, and make sure the table exists
    pub async fn connect(config: &StorageConfig) -> Result<Self> {
        config.validate()?;

        let db = any::connect(config.url.as_str()).await.map_err(|e| {
            RecallError::Storage(format!("Failed to connect to {}: {}", config.url, e))
        })?;

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            db.signin(Root {
                username: username.as_str(),
                password: password.as_str(),
            })
            .await
            .map_err(|e| RecallError::Storage(format!("Failed to sign in: {}", e)))?;
        }

        db.use_ns(config.namespace.as_str())
            .use_db(config.database.as_str())
            .await
            .map_err(|e| {
                RecallError::Storage(format!("Failed to set namespace/database: {}", e))
            })?;

        db.query(format!("DEFINE TABLE IF NOT EXISTS {} SCHEMALESS", config.table))
            .await?
            .check()?;

        tracing::debug!(
            url = %config.url,
            namespace = %config.namespace,
            database = %config.database,
            table = %config.table,
            "Connected memory collection"
        );

        Ok(Self {
            db,
            table: config.table.clone(),
        })
    }

    /// Table the collection reads and writes
    pub fn table(&self) -> &str {
        &self.table
    }

    async fn fetch(&self, sql: String, binds: Bindings) -> Result<Vec<MemoryEntry>> {
        let rows: Vec<StoredMemory> = self.db.query(sql).bind(binds.0).await?.take(0)?;
        rows.into_iter().map(StoredMemory::into_entry).collect()
    }
}

#[async_trait]
impl MemoryCollection for SurrealCollection {
    /// Defines the requested indexes for the planner. Matching in `find`
    /// stays on `string::contains` over `search_text`, so the BM25 index is
    /// not queried through `@@`.
    async fn ensure_indexes(&self, indexes: &[IndexSpec]) -> Result<()> {
        for index in indexes {
            let statement = match &index.kind {
                IndexKind::Fields(fields) => format!(
                    "DEFINE INDEX IF NOT EXISTS {} ON TABLE {} FIELDS {}",
                    index.name,
                    self.table,
                    fields.join(", ")
                ),
                IndexKind::FullText(field) => format!(
                    "DEFINE ANALYZER IF NOT EXISTS memory_text TOKENIZERS blank, class \
                     FILTERS lowercase, ascii; \
                     DEFINE INDEX IF NOT EXISTS {} ON TABLE {} FIELDS {} \
                     SEARCH ANALYZER memory_text BM25",
                    index.name, self.table, field
                ),
            };
            self.db.query(statement).await?.check()?;
        }
        Ok(())
    }

    async fn find(
        &self,
        filter: &MemoryFilter,
        sort: &[SortKey],
        limit: usize,
    ) -> Result<Vec<MemoryEntry>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut binds = Bindings::default();
        let condition = where_clause(filter, &mut binds);
        let sql = format!(
            "SELECT {} FROM {} WHERE {}{} LIMIT {}",
            PROJECTION,
            self.table,
            condition,
            order_clause(sort),
            limit
        );
        self.fetch(sql, binds).await
    }

    async fn get(&self, id: &str) -> Result<Option<MemoryEntry>> {
        let mut binds = Bindings::default();
        let tb = binds.bind("tb", self.table.clone());
        let rid = binds.bind("rid", id.to_string());
        let sql = format!("SELECT {} FROM type::thing({}, {})", PROJECTION, tb, rid);
        Ok(self.fetch(sql, binds).await?.into_iter().next())
    }

    async fn insert_one(&self, entry: MemoryEntry) -> Result<()> {
        let row = StoredMemory::from_entry(&entry)?;
        self.db
            .query("CREATE type::thing($tb, $rid) CONTENT $doc RETURN NONE")
            .bind(("tb", self.table.clone()))
            .bind(("rid", entry.id))
            .bind(("doc", row))
            .await?
            .check()?;
        Ok(())
    }

    async fn update_one(&self, id: &str, update: MemoryUpdate) -> Result<bool> {
        let mut binds = Bindings::default();
        let tb = binds.bind("tb", self.table.clone());
        let rid = binds.bind("rid", id.to_string());
        let set = set_clause(update, &mut binds);
        let sql = format!(
            "UPDATE type::thing({}, {}) SET {} RETURN meta::id(id) AS id",
            tb, rid, set
        );
        let touched: Vec<IdRow> = self.db.query(sql).bind(binds.0).await?.take(0)?;
        Ok(!touched.is_empty())
    }

    async fn update_many(&self, filter: &MemoryFilter, update: MemoryUpdate) -> Result<u64> {
        let mut binds = Bindings::default();
        let condition = where_clause(filter, &mut binds);
        let set = set_clause(update, &mut binds);
        let sql = format!(
            "UPDATE {} SET {} WHERE {} RETURN meta::id(id) AS id",
            self.table, set, condition
        );
        let touched: Vec<IdRow> = self.db.query(sql).bind(binds.0).await?.take(0)?;
        Ok(touched.len() as u64)
    }

    async fn delete_many(&self, user_id: &str, rule: &PruneRule) -> Result<u64> {
        let mut binds = Bindings::default();
        let condition = prune_clause(user_id, rule, &mut binds);
        let sql = format!(
            "SELECT meta::id(id) AS id FROM {table} WHERE {cond}; \
             DELETE {table} WHERE {cond} RETURN NONE;",
            table = self.table,
            cond = condition
        );
        let mut response = self.db.query(sql).bind(binds.0).await?;
        let doomed: Vec<IdRow> = response.take(0)?;
        response.check()?;
        Ok(doomed.len() as u64)
    }

    async fn count(&self, user_id: &str) -> Result<u64> {
        let sql = format!(
            "SELECT count() AS total FROM {} WHERE user_id = $user_id GROUP ALL",
            self.table
        );
        let rows: Vec<CountRow> = self
            .db
            .query(sql)
            .bind(("user_id", user_id.to_string()))
            .await?
            .take(0)?;
        Ok(rows.first().map(|r| r.total.max(0) as u64).unwrap_or(0))
    }

    async fn aggregate_stats(&self, user_id: &str) -> Result<MemoryStats> {
        let sql = format!(
            "SELECT count() AS total, math::mean(relevance_score) AS average, \
             math::min(created_at) AS oldest, math::max(created_at) AS newest \
             FROM {} WHERE user_id = $user_id GROUP ALL",
            self.table
        );
        let rows: Vec<StatsRow> = self
            .db
            .query(sql)
            .bind(("user_id", user_id.to_string()))
            .await?
            .take(0)?;

        let Some(row) = rows.into_iter().next().filter(|r| r.total > 0) else {
            return Ok(MemoryStats::default());
        };

        Ok(MemoryStats {
            total_memories: row.total as u64,
            average_relevance: row.average.unwrap_or(0.0),
            oldest_memory: row.oldest.map(from_millis).transpose()?,
            newest_memory: row.newest.map(from_millis).transpose()?,
        })
    }
}
