// ── Vector Index: SQLite Backend ───────────────────────────────────────────
//
// Stores vectors as little-endian f32 BLOBs in the same database as the
// relational store. The collection's dimension is recorded on first open;
// every later open must agree or the index refuses to start.

use super::{check_dimension, matches_filter, rank_hits, VectorIndex};
use crate::atoms::error::{EngineError, EngineResult};
use crate::atoms::types::{Metadata, MetadataFilter, VectorHit};
use crate::engine::store::{bytes_to_f32_vec, cosine_distance, f32_vec_to_bytes, now_timestamp, Store};
use log::info;
use rusqlite::{params, OptionalExtension};
use std::sync::Arc;

pub struct SqliteVectorIndex {
    store: Arc<Store>,
    collection: String,
    dimension: usize,
}

impl SqliteVectorIndex {
    /// Open (or create) `collection` with the given dimension.
    /// Fails with `Config` if the collection already exists with another dimension.
    pub fn open(store: Arc<Store>, collection: &str, dimension: usize) -> EngineResult<Self> {
        if dimension == 0 {
            return Err(EngineError::Config("vector dimension must be > 0".into()));
        }
        {
            let conn = store.conn.lock();
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS vector_collections (
                    name TEXT PRIMARY KEY,
                    dimension INTEGER NOT NULL,
                    created_at TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS vector_entries (
                    collection TEXT NOT NULL,
                    id TEXT NOT NULL,
                    document TEXT NOT NULL,
                    metadata TEXT NOT NULL DEFAULT '{}',
                    embedding BLOB NOT NULL,
                    PRIMARY KEY (collection, id)
                );",
            )?;

            let stored: Option<i64> = conn
                .query_row(
                    "SELECT dimension FROM vector_collections WHERE name = ?1",
                    params![collection],
                    |row| row.get(0),
                )
                .optional()?;

            match stored {
                Some(d) if d as usize != dimension => {
                    return Err(EngineError::Config(format!(
                        "collection '{collection}' has dimension {d}, configured {dimension}; \
                         reset the collection or fix the embedding model"
                    )));
                }
                Some(_) => {}
                None => {
                    conn.execute(
                        "INSERT INTO vector_collections (name, dimension, created_at) VALUES (?1, ?2, ?3)",
                        params![collection, dimension as i64, now_timestamp()],
                    )?;
                    info!("[vector] Created collection '{}' ({} dims)", collection, dimension);
                }
            }
        }

        Ok(Self {
            store,
            collection: collection.to_string(),
            dimension,
        })
    }
}

impl VectorIndex for SqliteVectorIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn add(&self, id: &str, vector: &[f32], document: &str, metadata: &Metadata) -> EngineResult<()> {
        check_dimension(self.dimension, vector)?;
        let metadata_json = serde_json::to_string(metadata)?;
        let conn = self.store.conn.lock();
        conn.execute(
            "INSERT INTO vector_entries (collection, id, document, metadata, embedding)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![self.collection, id, document, metadata_json, f32_vec_to_bytes(vector)],
        )?;
        Ok(())
    }

    fn query(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> EngineResult<Vec<VectorHit>> {
        check_dimension(self.dimension, vector)?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let rows: Vec<(String, String, String, Vec<u8>)> = {
            let conn = self.store.conn.lock();
            let mut stmt = conn.prepare(
                "SELECT id, document, metadata, embedding FROM vector_entries
                 WHERE collection = ?1 ORDER BY rowid",
            )?;
            let rows = stmt
                .query_map(params![self.collection], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        let mut hits = Vec::new();
        for (id, document, metadata_json, blob) in rows {
            let metadata: Metadata = serde_json::from_str(&metadata_json)?;
            if !matches_filter(&metadata, filter) {
                continue;
            }
            let embedding = bytes_to_f32_vec(&blob);
            hits.push(VectorHit {
                distance: cosine_distance(vector, &embedding),
                id,
                text: document,
                metadata,
            });
        }
        Ok(rank_hits(hits, k))
    }

    fn delete(&self, id: &str) -> EngineResult<bool> {
        let conn = self.store.conn.lock();
        let n = conn.execute(
            "DELETE FROM vector_entries WHERE collection = ?1 AND id = ?2",
            params![self.collection, id],
        )?;
        Ok(n > 0)
    }

    fn contains(&self, id: &str) -> EngineResult<bool> {
        let conn = self.store.conn.lock();
        let found = conn
            .query_row(
                "SELECT 1 FROM vector_entries WHERE collection = ?1 AND id = ?2",
                params![self.collection, id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn len(&self) -> EngineResult<usize> {
        let conn = self.store.conn.lock();
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM vector_entries WHERE collection = ?1",
            params![self.collection],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(kind: &str) -> Metadata {
        let mut m = Metadata::new();
        m.insert("kind".into(), kind.into());
        m
    }

    #[test]
    fn reopen_with_other_dimension_fails() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        SqliteVectorIndex::open(store.clone(), "memories", 3).unwrap();
        SqliteVectorIndex::open(store.clone(), "memories", 3).unwrap();
        let err = SqliteVectorIndex::open(store.clone(), "memories", 4).err().unwrap();
        assert!(matches!(err, EngineError::Config(_)), "{err:?}");
        // Other collections are independent.
        SqliteVectorIndex::open(store, "scratch", 4).unwrap();
    }

    #[test]
    fn add_query_filter_delete() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let index = SqliteVectorIndex::open(store, "memories", 2).unwrap();
        index.add("a", &[1.0, 0.0], "alpha", &meta("note")).unwrap();
        index.add("b", &[0.0, 1.0], "beta", &meta("user_input")).unwrap();
        index.add("c", &[0.8, 0.2], "gamma", &meta("user_input")).unwrap();

        let hits = index.query(&[1.0, 0.0], 2, None).unwrap();
        assert_eq!(hits.iter().map(|h| h.id.as_str()).collect::<Vec<_>>(), vec!["a", "c"]);
        assert!(hits[0].distance < 1e-6);

        let filter = meta("user_input");
        let hits = index.query(&[1.0, 0.0], 5, Some(&filter)).unwrap();
        assert_eq!(hits.iter().map(|h| h.id.as_str()).collect::<Vec<_>>(), vec!["c", "b"]);
        assert_eq!(hits[0].text, "gamma");

        assert!(index.delete("c").unwrap());
        assert!(!index.contains("c").unwrap());
        assert_eq!(index.len().unwrap(), 2);
    }

    #[test]
    fn wrong_dimension_rejected_at_add_and_query() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let index = SqliteVectorIndex::open(store, "memories", 2).unwrap();
        assert!(matches!(
            index.add("a", &[1.0, 0.0, 0.0], "alpha", &Metadata::new()),
            Err(EngineError::DimensionMismatch { expected: 2, actual: 3 })
        ));
        assert!(index.query(&[1.0], 3, None).is_err());
        assert!(index.is_empty().unwrap());
    }

    #[test]
    fn duplicate_id_is_conflict() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let index = SqliteVectorIndex::open(store, "memories", 2).unwrap();
        index.add("a", &[1.0, 0.0], "alpha", &Metadata::new()).unwrap();
        assert!(index.add("a", &[0.0, 1.0], "alpha", &Metadata::new()).unwrap_err().is_conflict());
    }
}
