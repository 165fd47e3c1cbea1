// Engram RAG — Relational Store
// Durable storage for memories, entities and relationships in SQLite via rusqlite.
// One connection behind a parking_lot Mutex; every method locks, runs its
// statements, and releases. The store is opened once by `MemoryEngine` and
// handed to components as an `Arc<Store>`.
//
// Module layout:
//   schema        — idempotent migrations + UNIQUE constraints
//   memories      — memory rows + tag cross-reference table
//   entities      — entity rows + embedding similarity scan
//   relationships — weighted edges, traversal, decay, pruning
//   embedding     — f32 BLOB codec + cosine math

use crate::atoms::constants::TIMESTAMP_FORMAT;
use crate::atoms::error::EngineResult;
use log::info;
use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;

pub(crate) mod embedding;
mod entities;
mod memories;
mod relationships;
mod schema;

pub use embedding::{bytes_to_f32_vec, cosine_distance, cosine_similarity, f32_vec_to_bytes};

/// Thread-safe database wrapper.
pub struct Store {
    /// The SQLite connection, protected by a Mutex.
    /// `pub` so backends sharing the database (the SQLite vector index)
    /// can run their own statements.
    pub conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) the database at `path` and initialize tables.
    pub fn open(path: &Path) -> EngineResult<Self> {
        info!("[store] Opening store at {:?}", path);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;").ok();
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        schema::run_migrations(&conn)?;

        Ok(Store { conn: Mutex::new(conn) })
    }

    /// Open a private in-memory database. Used by tests.
    pub fn open_in_memory() -> EngineResult<Self> {
        let conn = Connection::open_in_memory()?;
        schema::run_migrations(&conn)?;
        Ok(Store { conn: Mutex::new(conn) })
    }

    /// Flush the WAL into the main database file. Called on shutdown.
    pub fn checkpoint(&self) -> EngineResult<()> {
        let conn = self.conn.lock();
        // The pragma answers with a (busy, log, checkpointed) row.
        conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
        Ok(())
    }
}

/// Current UTC time in the stored timestamp format.
pub fn now_timestamp() -> String {
    chrono::Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Timestamp `days` days before now, in the stored format.
pub fn timestamp_days_ago(days: u32) -> String {
    (chrono::Utc::now() - chrono::Duration::days(days as i64))
        .format(TIMESTAMP_FORMAT)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_sort_chronologically() {
        let old = timestamp_days_ago(10);
        let now = now_timestamp();
        assert!(old < now, "{old} should sort before {now}");
        assert_eq!(now.len(), "2024-01-01T00:00:00Z".len());
    }

    #[test]
    fn open_on_disk_creates_parent_dirs() {
        let dir = std::env::temp_dir().join(format!("engram-rag-{}", uuid::Uuid::new_v4()));
        let path = dir.join("nested").join("engram.db");
        let store = Store::open(&path).unwrap();
        store.checkpoint().unwrap();
        assert!(path.exists());
        drop(store);
        std::fs::remove_dir_all(&dir).ok();
    }
}
