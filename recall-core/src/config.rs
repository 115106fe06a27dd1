//! Configuration types for recall

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::consolidation::ConsolidationConfig;
use crate::context::ContextConfig;
use crate::error::{RecallError, Result};

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RecallConfig {
    /// Context budgeting and model profiles
    pub context: ContextConfig,

    /// Memory retrieval and consolidation
    pub memory: MemoryConfig,

    /// Document store connection
    pub storage: StorageConfig,

    /// Chat turn orchestration
    pub turn: TurnConfig,
}

/// Memory store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Results returned by `retrieve_default`
    pub default_limit: usize,

    /// Entries must score strictly above this to be retrieved
    pub min_relevance: f64,

    /// Score added each time an entry is retrieved
    pub access_boost: f64,

    /// How far back the any-term fallback strategy looks
    #[serde(with = "humantime_serde")]
    pub recency_window: Duration,

    /// Retrieval limit used when counting relevant memories for a state report
    pub relevant_state_limit: usize,

    /// Post-insert consolidation
    pub consolidation: ConsolidationConfig,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            default_limit: 5,
            min_relevance: 0.1,
            access_boost: 0.1,
            recency_window: Duration::from_secs(7 * 24 * 60 * 60),
            relevant_state_limit: 10,
            consolidation: ConsolidationConfig::default(),
        }
    }
}

impl MemoryConfig {
    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.default_limit = limit;
        self
    }

    pub fn with_min_relevance(mut self, score: f64) -> Self {
        self.min_relevance = score;
        self
    }

    pub fn with_access_boost(mut self, boost: f64) -> Self {
        self.access_boost = boost;
        self
    }

    pub fn with_recency_window(mut self, window: Duration) -> Self {
        self.recency_window = window;
        self
    }

    pub fn with_consolidation(mut self, config: ConsolidationConfig) -> Self {
        self.consolidation = config;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.default_limit == 0 {
            return Err(RecallError::Configuration(
                "memory.default_limit must be at least 1".to_string(),
            ));
        }
        if self.min_relevance < 0.0 {
            return Err(RecallError::Configuration(
                "memory.min_relevance must not be negative".to_string(),
            ));
        }
        self.consolidation.validate()
    }
}

/// Document store connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Engine URL: `mem://` for in-process, `ws://host:port` for a server
    pub url: String,

    pub namespace: String,

    pub database: String,

    /// Table holding memory entries
    pub table: String,

    /// Root credentials for remote engines
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            url: "mem://".to_string(),
            namespace: "recall".to_string(),
            database: "chat".to_string(),
            table: "memories".to_string(),
            username: None,
            password: None,
        }
    }
}

impl StorageConfig {
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Checks the table name and url before anything is sent to the store
    pub fn validate(&self) -> Result<()> {
        if !is_identifier(&self.table) {
            return Err(RecallError::Configuration(format!(
                "storage.table must be an identifier, got {:?}",
                self.table
            )));
        }
        if self.url.trim().is_empty() {
            return Err(RecallError::Configuration(
                "storage.url must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Table names are spliced into queries, so only plain identifiers pass
pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Chat turn orchestration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnConfig {
    /// Upper bound on memory retrieval before the turn proceeds without it
    #[serde(with = "humantime_serde")]
    pub retrieve_timeout: Duration,

    /// Sampling temperature sent to the model
    pub temperature: f32,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            retrieve_timeout: Duration::from_secs(2),
            temperature: 0.7,
        }
    }
}

impl TurnConfig {
    pub fn with_retrieve_timeout(mut self, timeout: Duration) -> Self {
        self.retrieve_timeout = timeout;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

impl RecallConfig {
    /// Load configuration from file and environment variables.
    ///
    /// Loads in this order:
    /// 1. Default configuration
    /// 2. Configuration file (recall.toml)
    /// 3. Environment variable overrides (`RECALL_` prefix, `__` between sections)
    /// 4. The file named by RECALL_CONFIG_PATH, if set
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is invalid or fails validation.
    pub fn load() -> Result<Self> {
        use figment::{
            Figment,
            providers::{Env, Format, Serialized, Toml},
        };

        let mut figment = Figment::from(Serialized::defaults(RecallConfig::default()))
            .merge(Toml::file("recall.toml"))
            .merge(
                Env::prefixed("RECALL_")
                    .ignore(&["CONFIG_PATH"])
                    .split("__"),
            );

        if let Ok(path) = std::env::var("RECALL_CONFIG_PATH") {
            figment = figment.merge(Toml::file(path));
        }

        let config: RecallConfig = figment.extract().map_err(|e| {
            RecallError::Configuration(format!("Failed to load configuration: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        use figment::{
            Figment,
            providers::{Format, Serialized, Toml},
        };

        let path = path.as_ref();
        if !path.exists() {
            return Err(RecallError::Configuration(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let config: RecallConfig = Figment::from(Serialized::defaults(RecallConfig::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| {
                RecallError::Configuration(format!("Failed to load configuration file: {}", e))
            })?;

        config.validate()?;
        Ok(config)
    }

    pub fn with_context(mut self, context: ContextConfig) -> Self {
        self.context = context;
        self
    }

    pub fn with_memory(mut self, memory: MemoryConfig) -> Self {
        self.memory = memory;
        self
    }

    pub fn with_storage(mut self, storage: StorageConfig) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_turn(mut self, turn: TurnConfig) -> Self {
        self.turn = turn;
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        self.context.validate()?;
        self.memory.validate()?;
        self.storage.validate()
    }
}
