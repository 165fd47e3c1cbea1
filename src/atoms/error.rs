// ── Engram RAG Atoms: Error Types ──────────────────────────────────────────
// Single canonical error enum for the engine, built with `thiserror`.
//
// Design rules:
//   • Variants are coarse-grained by domain (I/O, DB, Network, Config…).
//   • The `#[from]` attribute wires std/external error conversions automatically.
//   • Unique-constraint violations are surfaced as `Conflict` so callers that
//     own a natural key (entities, relationships) can recover with a re-read.

use thiserror::Error;

// ── Primary error enum ─────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum EngineError {
    /// Filesystem or OS-level I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization / deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP / network failure (reqwest layer).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// SQLite / rusqlite database failure.
    #[error("Database error: {0}")]
    Database(rusqlite::Error),

    /// A UNIQUE constraint rejected an insert; another writer owns the key.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Engine configuration is invalid, or the on-disk collection does not
    /// match it (e.g. a different embedding dimension).
    #[error("Configuration error: {0}")]
    Config(String),

    /// An embedder returned a vector of the wrong length.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Embedding backend failure (model unavailable, malformed response…).
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Entity extraction backend failure.
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// The memory row was persisted but its embed-and-index step failed.
    /// Retry with `MemoryLifecycle::reindex`.
    #[error("Memory {memory_id} stored but not indexed: {reason}")]
    NotIndexed { memory_id: String, reason: String },

    /// Caller supplied an argument outside its valid domain.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A blocking worker panicked or was cancelled.
    #[error("Worker error: {0}")]
    Worker(String),

    /// Catch-all for errors that do not yet have a dedicated variant.
    #[error("{0}")]
    Other(String),
}

// ── Conversions ────────────────────────────────────────────────────────────

impl From<rusqlite::Error> for EngineError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(err, msg)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                EngineError::Conflict(msg.clone().unwrap_or_else(|| err.to_string()))
            }
            _ => EngineError::Database(e),
        }
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(e: toml::de::Error) -> Self {
        EngineError::Config(e.to_string())
    }
}

impl From<tokio::task::JoinError> for EngineError {
    fn from(e: tokio::task::JoinError) -> Self {
        EngineError::Worker(e.to_string())
    }
}

impl From<String> for EngineError {
    fn from(s: String) -> Self {
        EngineError::Other(s)
    }
}

impl From<&str> for EngineError {
    fn from(s: &str) -> Self {
        EngineError::Other(s.to_string())
    }
}

impl EngineError {
    /// True when the error is a unique-constraint conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, EngineError::Conflict(_))
    }
}

// ── Convenience alias ──────────────────────────────────────────────────────

/// All engine operations return this type.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraint_violation_maps_to_conflict() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (k TEXT UNIQUE); INSERT INTO t VALUES ('a');")
            .unwrap();
        let err: EngineError = conn
            .execute("INSERT INTO t VALUES ('a')", [])
            .unwrap_err()
            .into();
        assert!(err.is_conflict(), "expected conflict, got {err:?}");
    }

    #[test]
    fn other_sqlite_errors_stay_database() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let err: EngineError = conn.execute("SELECT * FROM missing", []).unwrap_err().into();
        assert!(matches!(err, EngineError::Database(_)));
    }

    #[test]
    fn dimension_mismatch_message() {
        let err = EngineError::DimensionMismatch { expected: 768, actual: 384 };
        assert_eq!(err.to_string(), "Embedding dimension mismatch: expected 768, got 384");
    }
}
