//! Context Budget Configuration

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::profile::{DEFAULT_MODEL, ModelCatalog, ModelProfile};
use super::tokens::CHARS_PER_TOKEN;
use crate::error::{RecallError, Result};

/// Configuration for context budgeting behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Model whose profile is used for unknown model ids
    pub default_model: String,

    /// Characters per estimated token
    pub chars_per_token: f64,

    /// Flat token cost charged per injected memory
    pub memory_token_cost: usize,

    /// Margin absorbing estimation error
    pub safety_buffer: usize,

    /// Usage percentage above which a conversation is near its limit
    pub near_limit_percent: f64,

    /// Extra profiles, or overrides of the built-in ones
    pub models: BTreeMap<String, ModelProfile>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            default_model: DEFAULT_MODEL.to_string(),
            chars_per_token: CHARS_PER_TOKEN,
            memory_token_cost: 100,
            safety_buffer: 1000,
            near_limit_percent: 75.0,
            models: BTreeMap::new(),
        }
    }
}

impl ContextConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the fallback model
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Set the per-memory token charge
    pub fn with_memory_token_cost(mut self, cost: usize) -> Self {
        self.memory_token_cost = cost;
        self
    }

    /// Set the safety buffer
    pub fn with_safety_buffer(mut self, tokens: usize) -> Self {
        self.safety_buffer = tokens;
        self
    }

    /// Set the near-limit threshold, clamped to 0-100
    pub fn with_near_limit_percent(mut self, percent: f64) -> Self {
        self.near_limit_percent = percent.clamp(0.0, 100.0);
        self
    }

    /// Register or override a model profile
    pub fn with_model(mut self, model: impl Into<String>, profile: ModelProfile) -> Self {
        self.models.insert(model.into(), profile);
        self
    }

    /// Built-in catalogue merged with configured profiles
    pub fn catalog(&self) -> ModelCatalog {
        self.models.iter().fold(
            ModelCatalog::builtin().with_default_model(&self.default_model),
            |catalog, (id, profile)| catalog.with_profile(id, *profile),
        )
    }

    /// Reject ratios and profiles the estimator cannot work with
    pub fn validate(&self) -> Result<()> {
        if !(self.chars_per_token.is_finite() && self.chars_per_token > 0.0) {
            return Err(RecallError::Configuration(format!(
                "context.chars_per_token must be positive, got {}",
                self.chars_per_token
            )));
        }
        if let Some((id, profile)) = self.models.iter().find(|(_, p)| !p.is_valid()) {
            return Err(RecallError::Configuration(format!(
                "model {} reserves {} reply tokens out of a {} token window",
                id, profile.max_reply_tokens, profile.context_window_tokens
            )));
        }
        Ok(())
    }
}
