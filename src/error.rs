//! Error types for the comment store.

use crate::types::{CommentId, PostId};
use thiserror::Error;

/// Main error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Post not found: {0}")]
    PostNotFound(PostId),

    #[error("Comment not found: {0}")]
    CommentNotFound(CommentId),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Relay error: {0}")]
    Relay(#[from] redis::RedisError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse classification of a [`StoreError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// The requested post or comment does not exist.
    NotFound,
    /// Comment creation on a missing post or one with comments disabled.
    InvalidOperation,
    /// Relay, database, or encoding failure.
    TransientInfra,
    /// The store could not be built from its configuration.
    Config,
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::PostNotFound(_) | StoreError::CommentNotFound(_) => ErrorKind::NotFound,
            StoreError::InvalidOperation(_) => ErrorKind::InvalidOperation,
            StoreError::Relay(_)
            | StoreError::Database(_)
            | StoreError::Migration(_)
            | StoreError::Serialization(_)
            | StoreError::Deserialization(_) => ErrorKind::TransientInfra,
            StoreError::Config(_) => ErrorKind::Config,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        if e.is_data() || e.is_syntax() || e.is_eof() {
            StoreError::Deserialization(e.to_string())
        } else {
            StoreError::Serialization(e.to_string())
        }
    }
}

impl From<envy::Error> for StoreError {
    fn from(e: envy::Error) -> Self {
        StoreError::Config(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
