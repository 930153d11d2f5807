//! Error taxonomy for the memory engine

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by memory store operations.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// The backing store could not be opened or its schema created.
    /// Fatal at startup; never retried.
    #[error("Failed to initialize memory store at {}: {source}", path.display())]
    Schema {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A read or write against an initialized store failed, including
    /// lock contention reported by SQLite.
    #[error("Memory storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Metadata or an embedding could not be encoded for storage. Stored
    /// values that fail to decode on read surface as `Storage`.
    #[error("Memory metadata serialization error: {0}")]
    Serialization(String),
}

impl MemoryError {
    pub(crate) fn schema(
        path: impl Into<PathBuf>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Schema {
            path: path.into(),
            source: source.into(),
        }
    }
}

impl From<serde_json::Error> for MemoryError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MemoryError>;
