//! Error types for Mentora

use thiserror::Error;

/// Main error type for Mentora operations
#[derive(Error, Debug)]
pub enum MentoraError {
    /// Database operation error (from sqlx)
    #[error("Database error: {0}")]
    DatabaseSqlx(#[from] sqlx::Error),

    /// Database operation error (custom message)
    #[error("Database error: {0}")]
    Database(String),

    /// Graph query execution error
    #[error("Graph error: {0}")]
    Graph(String),

    /// Embedding provider error (missing configuration, non-2xx response, bad payload)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Cache backend error
    #[error("Cache error: {0}")]
    Cache(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Network/HTTP error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found error (generic)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Timeout error
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// Convenient Result type using MentoraError
pub type Result<T> = std::result::Result<T, MentoraError>;

impl MentoraError {
    /// Create a database error
    pub fn database(msg: impl Into<String>) -> Self {
        MentoraError::Database(msg.into())
    }

    /// Create a graph error
    pub fn graph(msg: impl Into<String>) -> Self {
        MentoraError::Graph(msg.into())
    }

    /// Create a provider error
    pub fn provider(msg: impl Into<String>) -> Self {
        MentoraError::Provider(msg.into())
    }

    /// Create a cache error
    pub fn cache(msg: impl Into<String>) -> Self {
        MentoraError::Cache(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        MentoraError::Config(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        MentoraError::Validation(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        MentoraError::NotFound(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        MentoraError::Timeout(msg.into())
    }

    /// Create a generic error
    pub fn other(msg: impl Into<String>) -> Self {
        MentoraError::Other(msg.into())
    }

    /// Whether this error came from the embedding provider side
    ///
    /// The retrieval facade uses this to decide between propagating an error
    /// and switching to the keyword fallback channel.
    pub fn is_provider_error(&self) -> bool {
        matches!(self, MentoraError::Provider(_) | MentoraError::Network(_))
    }
}
