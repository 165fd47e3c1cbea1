// Engram RAG — Vector Index
//
// Append-only similarity index keyed by memory id. Backends are pluggable
// behind the `VectorIndex` trait; both bundled backends do an exact
// brute-force cosine scan, which is fine at single-user scale.
//
// Module layout:
//   sqlite.rs — persistent backend sharing the relational store's database
//   memory.rs — in-process backend for tests and ephemeral runs

use crate::atoms::error::{EngineError, EngineResult};
use crate::atoms::types::{Metadata, MetadataFilter, VectorHit};

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryVectorIndex;
pub use sqlite::SqliteVectorIndex;

/// Nearest-neighbor index over fixed-dimension vectors.
///
/// Implementations must reject any vector whose length differs from
/// `dimension()`, both on `add` and on `query`.
pub trait VectorIndex: Send + Sync {
    /// Configured vector dimension of the collection.
    fn dimension(&self) -> usize;

    /// Add a vector with its source document and metadata.
    /// Adding an id that is already present fails with `Conflict`.
    fn add(&self, id: &str, vector: &[f32], document: &str, metadata: &Metadata)
        -> EngineResult<()>;

    /// The `k` nearest entries (ascending cosine distance) whose metadata
    /// matches every field of `filter`.
    fn query(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> EngineResult<Vec<VectorHit>>;

    /// Remove an entry. Returns whether it existed.
    fn delete(&self, id: &str) -> EngineResult<bool>;

    fn contains(&self, id: &str) -> EngineResult<bool>;

    fn len(&self) -> EngineResult<usize>;

    fn is_empty(&self) -> EngineResult<bool> {
        Ok(self.len()? == 0)
    }
}

/// Fail fast when a vector does not match the collection dimension.
pub(crate) fn check_dimension(expected: usize, vector: &[f32]) -> EngineResult<()> {
    if vector.len() != expected {
        return Err(EngineError::DimensionMismatch { expected, actual: vector.len() });
    }
    Ok(())
}

/// AND of exact field equality; a missing field never matches.
pub(crate) fn matches_filter(metadata: &Metadata, filter: Option<&MetadataFilter>) -> bool {
    match filter {
        None => true,
        Some(f) => f.iter().all(|(k, v)| metadata.get(k) == Some(v)),
    }
}

/// Sort hits nearest-first (stable for equal distances) and keep `k`.
pub(crate) fn rank_hits(mut hits: Vec<VectorHit>, k: usize) -> Vec<VectorHit> {
    hits.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    hits.truncate(k);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(pairs: &[(&str, &str)]) -> Metadata {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn filter_is_conjunctive() {
        let m = meta(&[("kind", "user_input"), ("memory_type", "episodic")]);
        assert!(matches_filter(&m, None));
        assert!(matches_filter(&m, Some(&meta(&[("kind", "user_input")]))));
        assert!(matches_filter(
            &m,
            Some(&meta(&[("kind", "user_input"), ("memory_type", "episodic")]))
        ));
        assert!(!matches_filter(
            &m,
            Some(&meta(&[("kind", "user_input"), ("memory_type", "semantic")]))
        ));
        assert!(!matches_filter(&m, Some(&meta(&[("owner", "x")]))));
    }

    #[test]
    fn dimension_check() {
        assert!(check_dimension(3, &[0.0, 0.0, 0.0]).is_ok());
        assert!(matches!(
            check_dimension(3, &[0.0]),
            Err(EngineError::DimensionMismatch { expected: 3, actual: 1 })
        ));
    }
}
