// ── Vector Index: In-Process Backend ───────────────────────────────────────
// Insertion-ordered Vec behind a parking_lot RwLock. Nothing is persisted.

use super::{check_dimension, matches_filter, rank_hits, VectorIndex};
use crate::atoms::error::{EngineError, EngineResult};
use crate::atoms::types::{Metadata, MetadataFilter, VectorHit};
use crate::engine::store::cosine_distance;
use parking_lot::RwLock;

struct Entry {
    id: String,
    vector: Vec<f32>,
    document: String,
    metadata: Metadata,
}

pub struct InMemoryVectorIndex {
    dimension: usize,
    entries: RwLock<Vec<Entry>>,
}

impl InMemoryVectorIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            entries: RwLock::new(Vec::new()),
        }
    }
}

impl VectorIndex for InMemoryVectorIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn add(&self, id: &str, vector: &[f32], document: &str, metadata: &Metadata) -> EngineResult<()> {
        check_dimension(self.dimension, vector)?;
        let mut entries = self.entries.write();
        if entries.iter().any(|e| e.id == id) {
            return Err(EngineError::Conflict(format!("vector id '{id}' already indexed")));
        }
        entries.push(Entry {
            id: id.to_string(),
            vector: vector.to_vec(),
            document: document.to_string(),
            metadata: metadata.clone(),
        });
        Ok(())
    }

    fn query(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> EngineResult<Vec<VectorHit>> {
        check_dimension(self.dimension, vector)?;
        let entries = self.entries.read();
        let hits = entries
            .iter()
            .filter(|e| matches_filter(&e.metadata, filter))
            .map(|e| VectorHit {
                id: e.id.clone(),
                text: e.document.clone(),
                metadata: e.metadata.clone(),
                distance: cosine_distance(vector, &e.vector),
            })
            .collect();
        Ok(rank_hits(hits, k))
    }

    fn delete(&self, id: &str) -> EngineResult<bool> {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| e.id != id);
        Ok(entries.len() != before)
    }

    fn contains(&self, id: &str) -> EngineResult<bool> {
        Ok(self.entries.read().iter().any(|e| e.id == id))
    }

    fn len(&self) -> EngineResult<usize> {
        Ok(self.entries.read().len())
    }
}
