//! Model profiles and the catalogue used to resolve them

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Model used whenever a caller names a model the catalogue does not know
pub const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";

/// Token capacities of a target model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelProfile {
    /// Total token capacity (prompt + reply)
    pub context_window_tokens: usize,

    /// Tokens reserved for the model's own response
    pub max_reply_tokens: usize,

    /// Fixed per-message framing cost (role and metadata)
    pub per_message_overhead_tokens: usize,
}

impl ModelProfile {
    pub const fn new(
        context_window_tokens: usize,
        max_reply_tokens: usize,
        per_message_overhead_tokens: usize,
    ) -> Self {
        Self {
            context_window_tokens,
            max_reply_tokens,
            per_message_overhead_tokens,
        }
    }

    /// `context_window_tokens > max_reply_tokens`
    pub fn is_valid(&self) -> bool {
        self.context_window_tokens > self.max_reply_tokens
    }
}

const FALLBACK_PROFILE: ModelProfile = ModelProfile::new(32_768, 8_192, 4);

const BUILTIN_PROFILES: &[(&str, ModelProfile)] = &[
    (
        "meta-llama/llama-4-scout-17b-16e-instruct",
        ModelProfile::new(32_768, 8_192, 4),
    ),
    (DEFAULT_MODEL, FALLBACK_PROFILE),
    (
        "llama-3.2-90b-text-preview",
        ModelProfile::new(131_072, 8_192, 4),
    ),
    (
        "llama-3.2-11b-text-preview",
        ModelProfile::new(131_072, 8_192, 4),
    ),
    ("mixtral-8x7b-32768", ModelProfile::new(32_768, 8_192, 4)),
    ("gemma-7b-it", ModelProfile::new(8_192, 2_048, 4)),
];

/// Lookup table from model id to profile, with a default for unknown ids
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    profiles: BTreeMap<String, ModelProfile>,
    default_model: String,
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ModelCatalog {
    /// Catalogue of the built-in hosted models
    pub fn builtin() -> Self {
        let profiles = BUILTIN_PROFILES
            .iter()
            .map(|(id, profile)| (id.to_string(), *profile))
            .collect();

        Self {
            profiles,
            default_model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Add or replace a profile
    pub fn with_profile(mut self, model_id: impl Into<String>, profile: ModelProfile) -> Self {
        self.profiles.insert(model_id.into(), profile);
        self
    }

    /// Set the model used for unknown ids
    pub fn with_default_model(mut self, model_id: impl Into<String>) -> Self {
        self.default_model = model_id.into();
        self
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub fn contains(&self, model_id: &str) -> bool {
        self.profiles.contains_key(model_id)
    }

    /// Resolve a profile. Unknown ids get the default model's profile; this never
    /// fails.
    pub fn resolve(&self, model_id: &str) -> &ModelProfile {
        if let Some(profile) = self.profiles.get(model_id) {
            return profile;
        }

        tracing::debug!(
            model = model_id,
            fallback = %self.default_model,
            "Unknown model, using default profile"
        );

        self.profiles
            .get(&self.default_model)
            .unwrap_or(&FALLBACK_PROFILE)
    }

    /// All known profiles ordered by model id
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ModelProfile)> {
        self.profiles.iter().map(|(id, p)| (id.as_str(), p))
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
