use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the per-user consolidation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsolidationConfig {
    /// Users at or below this many entries are left alone (default: 1000)
    pub max_entries_per_user: u64,

    /// Prune candidates score strictly below this (default: 0.2)
    pub prune_relevance_below: f64,

    /// Prune candidates were last accessed longer ago than this (default: 30 days)
    #[serde(with = "humantime_serde")]
    pub prune_idle_for: Duration,

    /// Prune candidates were retrieved fewer times than this (default: 2)
    pub prune_access_count_below: u32,

    /// Multiplier applied to every surviving score (default: 0.95)
    pub decay_factor: f64,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            max_entries_per_user: 1000,
            prune_relevance_below: 0.2,
            prune_idle_for: Duration::from_secs(30 * 24 * 60 * 60),
            prune_access_count_below: 2,
            decay_factor: 0.95,
        }
    }
}

impl ConsolidationConfig {
    /// Create a new consolidation configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-user entry ceiling.
    pub fn with_max_entries_per_user(mut self, max: u64) -> Self {
        self.max_entries_per_user = max;
        self
    }

    /// Set the score below which idle entries may be pruned.
    pub fn with_prune_relevance_below(mut self, score: f64) -> Self {
        self.prune_relevance_below = score;
        self
    }

    /// Set how long an entry must be idle before it may be pruned.
    pub fn with_prune_idle_for(mut self, idle: Duration) -> Self {
        self.prune_idle_for = idle;
        self
    }

    /// Set the access count below which idle entries may be pruned.
    pub fn with_prune_access_count_below(mut self, count: u32) -> Self {
        self.prune_access_count_below = count;
        self
    }

    /// Set the decay multiplier.
    pub fn with_decay_factor(mut self, factor: f64) -> Self {
        self.decay_factor = factor;
        self
    }

    /// Check the values make sense.
    pub fn validate(&self) -> crate::error::Result<()> {
        if !(self.decay_factor > 0.0 && self.decay_factor <= 1.0) {
            return Err(crate::error::RecallError::Configuration(format!(
                "decay_factor must be in (0, 1], got {}",
                self.decay_factor
            )));
        }
        if self.prune_relevance_below < 0.0 {
            return Err(crate::error::RecallError::Configuration(
                "prune_relevance_below must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}
