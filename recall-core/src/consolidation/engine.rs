use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RecallError, Result};
use crate::memory::{MemoryCollection, MemoryFilter, MemoryUpdate, PruneRule};

use super::config::ConsolidationConfig;

/// What one consolidation pass did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidationReport {
    /// Entries the user owned before the pass
    pub total_before: u64,

    /// Entries removed by the prune rule
    pub deleted: u64,

    /// Entries whose score was decayed
    pub decayed: u64,

    /// True when the user was under the ceiling and nothing changed
    pub skipped: bool,
}

/// Bounded-size maintenance for one user's memories.
///
/// Once a user holds more than `max_entries_per_user` entries, entries that are
/// weak, idle, and rarely used are deleted, then every surviving score decays
/// by `decay_factor`.
///
/// # Example
///
/// ```rust,ignore
/// use recall_core::consolidation::{Consolidator, ConsolidationConfig};
///
/// let consolidator = Consolidator::new(collection, ConsolidationConfig::default());
/// let report = consolidator.consolidate("user-1").await?;
/// println!("pruned {} entries", report.deleted);
/// ```
pub struct Consolidator {
    collection: Arc<dyn MemoryCollection>,
    config: ConsolidationConfig,
}

impl Consolidator {
    /// Create a new consolidator.
    pub fn new(collection: Arc<dyn MemoryCollection>, config: ConsolidationConfig) -> Self {
        Self { collection, config }
    }

    /// Get the configuration
    pub fn config(&self) -> &ConsolidationConfig {
        &self.config
    }

    /// Prune rule in effect at `now`
    pub fn prune_rule(&self, now: DateTime<Utc>) -> Result<PruneRule> {
        let idle = chrono::Duration::from_std(self.config.prune_idle_for)
            .map_err(|e| RecallError::Consolidation(format!("idle window out of range: {}", e)))?;

        Ok(PruneRule {
            relevance_below: self.config.prune_relevance_below,
            accessed_before: now - idle,
            access_count_below: self.config.prune_access_count_below,
        })
    }

    /// Run the pass for one user.
    pub async fn consolidate(&self, user_id: &str) -> Result<ConsolidationReport> {
        let total_before = self.collection.count(user_id).await?;

        if total_before <= self.config.max_entries_per_user {
            tracing::debug!(
                user_id,
                total = total_before,
                max = self.config.max_entries_per_user,
                "Skipping consolidation, user under entry ceiling"
            );
            return Ok(ConsolidationReport {
                total_before,
                skipped: true,
                ..Default::default()
            });
        }

        let rule = self.prune_rule(Utc::now())?;
        let deleted = self
            .collection
            .delete_many(user_id, &rule)
            .await
            .map_err(|e| RecallError::Consolidation(format!("prune failed: {}", e)))?;

        let decayed = self
            .collection
            .update_many(
                &MemoryFilter::for_user(user_id),
                MemoryUpdate::ScaleRelevance(self.config.decay_factor),
            )
            .await
            .map_err(|e| RecallError::Consolidation(format!("decay failed: {}", e)))?;

        tracing::info!(
            user_id,
            total_before,
            deleted,
            decayed,
            "Consolidated memories"
        );

        Ok(ConsolidationReport {
            total_before,
            deleted,
            decayed,
            skipped: false,
        })
    }
}
