//! Error types for recall operations

/// Result type for recall operations
pub type Result<T> = std::result::Result<T, RecallError>;

/// Error types for the context and memory engine
#[derive(Debug, thiserror::Error)]
pub enum RecallError {
    /// Backing store unreachable or a query failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Post-insert consolidation pass failed
    #[error("Consolidation error: {0}")]
    Consolidation(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Caller supplied something the operation cannot work with
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Model provider failed to produce a reply
    #[error("LLM error: {0}")]
    Llm(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl RecallError {
    /// True for failures of the backing document store
    pub fn is_storage(&self) -> bool {
        matches!(self, RecallError::Storage(_))
    }
}

impl From<surrealdb::Error> for RecallError {
    fn from(err: surrealdb::Error) -> Self {
        RecallError::Storage(err.to_string())
    }
}

impl From<String> for RecallError {
    fn from(s: String) -> Self {
        RecallError::Other(s)
    }
}

impl From<&str> for RecallError {
    fn from(s: &str) -> Self {
        RecallError::Other(s.to_string())
    }
}

impl From<anyhow::Error> for RecallError {
    fn from(err: anyhow::Error) -> Self {
        RecallError::Other(err.to_string())
    }
}
