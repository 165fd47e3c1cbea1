// ── Store: Relationship Rows ────────────────────────────────────────────────
//
// Weighted directed edges between entities. Increments are a single UPDATE
// (`weight = weight + ?`) so concurrent reinforcements never lose a write;
// inserts rely on UNIQUE(from, to, relation_type) to reject a racing twin.

use super::Store;
use crate::atoms::error::EngineResult;
use crate::atoms::types::Relationship;
use rusqlite::{params, OptionalExtension};

impl Store {
    /// Insert a new edge. A duplicate (from, to, relation_type) fails with `Conflict`.
    pub fn insert_relationship(&self, rel: &Relationship) -> EngineResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO relationships (from_entity_id, to_entity_id, relation_type, weight, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                rel.from_entity_id,
                rel.to_entity_id,
                rel.relation_type,
                rel.weight,
                rel.created_at
            ],
        )?;
        Ok(())
    }

    /// Add `delta` to an existing edge's weight.
    /// Returns false when no such edge exists.
    pub fn increment_relationship(
        &self,
        from_id: &str,
        to_id: &str,
        relation_type: &str,
        delta: f64,
    ) -> EngineResult<bool> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE relationships SET weight = weight + ?4
             WHERE from_entity_id = ?1 AND to_entity_id = ?2 AND relation_type = ?3",
            params![from_id, to_id, relation_type, delta],
        )?;
        Ok(changed > 0)
    }

    /// Fetch one edge by its natural key.
    pub fn get_relationship(
        &self,
        from_id: &str,
        to_id: &str,
        relation_type: &str,
    ) -> EngineResult<Option<Relationship>> {
        let conn = self.conn.lock();
        let rel = conn
            .query_row(
                "SELECT from_entity_id, to_entity_id, relation_type, weight, created_at
                 FROM relationships
                 WHERE from_entity_id = ?1 AND to_entity_id = ?2 AND relation_type = ?3",
                params![from_id, to_id, relation_type],
                relationship_from_row,
            )
            .optional()?;
        Ok(rel)
    }

    /// Every edge touching `entity_id`, in either direction.
    pub fn relationships_of(&self, entity_id: &str) -> EngineResult<Vec<Relationship>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT from_entity_id, to_entity_id, relation_type, weight, created_at
             FROM relationships
             WHERE from_entity_id = ?1 OR to_entity_id = ?1
             ORDER BY created_at, rowid",
        )?;
        let rels = stmt
            .query_map(params![entity_id], relationship_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rels)
    }

    /// Ids one hop away from `entity_id` (either direction), optionally
    /// restricted to one relation type. May contain duplicates.
    pub fn neighbor_ids(
        &self,
        entity_id: &str,
        relation_type: Option<&str>,
    ) -> EngineResult<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT CASE WHEN from_entity_id = ?1 THEN to_entity_id ELSE from_entity_id END
             FROM relationships
             WHERE (from_entity_id = ?1 OR to_entity_id = ?1)
               AND (?2 IS NULL OR relation_type = ?2)
             ORDER BY created_at, rowid",
        )?;
        let ids = stmt
            .query_map(params![entity_id, relation_type], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    /// Multiply every edge weight by `factor`. Returns the number of edges touched.
    pub fn scale_relationship_weights(&self, factor: f64) -> EngineResult<usize> {
        let conn = self.conn.lock();
        let n = conn.execute("UPDATE relationships SET weight = weight * ?1", params![factor])?;
        Ok(n)
    }

    /// Delete every edge with weight strictly below `min_weight`.
    pub fn delete_relationships_below(&self, min_weight: f64) -> EngineResult<usize> {
        let conn = self.conn.lock();
        let n = conn.execute("DELETE FROM relationships WHERE weight < ?1", params![min_weight])?;
        Ok(n)
    }

    pub fn count_relationships(&self) -> EngineResult<usize> {
        let conn = self.conn.lock();
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM relationships", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

fn relationship_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Relationship> {
    Ok(Relationship {
        from_entity_id: row.get(0)?,
        to_entity_id: row.get(1)?,
        relation_type: row.get(2)?,
        weight: row.get(3)?,
        created_at: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::store::now_timestamp;

    fn edge(from: &str, to: &str, ty: &str, weight: f64) -> Relationship {
        Relationship {
            from_entity_id: from.into(),
            to_entity_id: to.into(),
            relation_type: ty.into(),
            weight,
            created_at: now_timestamp(),
        }
    }

    #[test]
    fn increment_only_touches_existing_edges() {
        let store = Store::open_in_memory().unwrap();
        assert!(!store.increment_relationship("a", "b", "knows", 1.0).unwrap());
        store.insert_relationship(&edge("a", "b", "knows", 1.0)).unwrap();
        assert!(store.increment_relationship("a", "b", "knows", 0.5).unwrap());
        let rel = store.get_relationship("a", "b", "knows").unwrap().unwrap();
        assert!((rel.weight - 1.5).abs() < 1e-9);
        // Direction matters.
        assert!(store.get_relationship("b", "a", "knows").unwrap().is_none());
    }

    #[test]
    fn duplicate_edge_is_conflict() {
        let store = Store::open_in_memory().unwrap();
        store.insert_relationship(&edge("a", "b", "knows", 1.0)).unwrap();
        assert!(store.insert_relationship(&edge("a", "b", "knows", 1.0)).unwrap_err().is_conflict());
        store.insert_relationship(&edge("a", "b", "visited", 1.0)).unwrap();
    }

    #[test]
    fn neighbors_both_directions_with_filter() {
        let store = Store::open_in_memory().unwrap();
        store.insert_relationship(&edge("a", "b", "knows", 1.0)).unwrap();
        store.insert_relationship(&edge("c", "a", "visited", 1.0)).unwrap();
        store.insert_relationship(&edge("b", "c", "knows", 1.0)).unwrap();

        let mut all = store.neighbor_ids("a", None).unwrap();
        all.sort();
        assert_eq!(all, vec!["b", "c"]);
        assert_eq!(store.neighbor_ids("a", Some("visited")).unwrap(), vec!["c"]);
        assert!(store.neighbor_ids("a", Some("owns")).unwrap().is_empty());
        assert_eq!(store.relationships_of("a").unwrap().len(), 2);
    }

    #[test]
    fn scale_and_prune() {
        let store = Store::open_in_memory().unwrap();
        store.insert_relationship(&edge("a", "b", "knows", 2.0)).unwrap();
        store.insert_relationship(&edge("b", "a", "knows", 1.0)).unwrap();

        assert_eq!(store.scale_relationship_weights(0.5).unwrap(), 2);
        let ab = store.get_relationship("a", "b", "knows").unwrap().unwrap();
        assert!((ab.weight - 1.0).abs() < 1e-9);

        // 1.0 is not below 1.0; 0.5 is.
        assert_eq!(store.delete_relationships_below(1.0).unwrap(), 1);
        assert_eq!(store.count_relationships().unwrap(), 1);
    }
}
