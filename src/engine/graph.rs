// ── Engram RAG: Entity Graph ────────────────────────────────────────────────
//
// Business logic over the entity and relationship tables.
// Delegates row I/O to `Store`; embeds entities through the shared pool.
//
// Responsibilities:
//   - Entity dedup on (name, type), race-safe via the UNIQUE constraint
//   - Weight accumulation on repeated edges
//   - Bounded breadth-first neighborhood traversal
//   - Co-occurrence inference from extracted entities

use crate::atoms::constants::{CO_OCCURRENCE, DEFAULT_RELATIONSHIP_WEIGHT, DESCRIPTION_SOURCE_CHARS};
use crate::atoms::error::{EngineError, EngineResult};
use crate::atoms::types::{Entity, EntityType, ExtractedEntity, Relationship, ScoredEntity};
use crate::engine::embedding::EmbeddingPool;
use crate::engine::store::{now_timestamp, Store};
use log::{debug, info};
use std::collections::HashSet;
use std::sync::Arc;

pub struct EntityGraph {
    store: Arc<Store>,
    embedder: Arc<EmbeddingPool>,
}

impl EntityGraph {
    pub fn new(store: Arc<Store>, embedder: Arc<EmbeddingPool>) -> Self {
        Self { store, embedder }
    }

    // ═════════════════════════════════════════════════════════════════════════
    // Entities
    // ═════════════════════════════════════════════════════════════════════════

    /// Return the id of the (name, type) entity, creating it if needed.
    /// An existing entity keeps its original description.
    pub async fn add_entity(
        &self,
        name: &str,
        entity_type: EntityType,
        description: &str,
    ) -> EngineResult<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EngineError::InvalidInput("entity name must not be empty".into()));
        }
        if let Some(existing) = self.store.find_entity(name, entity_type)? {
            return Ok(existing.id);
        }

        let embedding = self
            .embedder
            .embed(&format!("{entity_type}: {name} - {description}"))
            .await?;

        let entity = Entity {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            entity_type,
            description: description.to_string(),
            embedding,
            created_at: now_timestamp(),
        };

        match self.store.insert_entity(&entity) {
            Ok(()) => {
                info!("[graph] New entity: {} ({})", entity.name, entity_type);
                Ok(entity.id)
            }
            // Another writer inserted the same key while we were embedding.
            Err(e) if e.is_conflict() => {
                debug!("[graph] Lost insert race for {} ({}), re-reading", name, entity_type);
                self.store
                    .find_entity(name, entity_type)?
                    .map(|winner| winner.id)
                    .ok_or(e)
            }
            Err(e) => Err(e),
        }
    }

    pub fn get_entity(&self, id: &str) -> EngineResult<Option<Entity>> {
        self.store.get_entity(id)
    }

    pub fn find_entity(&self, name: &str, entity_type: EntityType) -> EngineResult<Option<Entity>> {
        self.store.find_entity(name, entity_type)
    }

    /// `(id, name)` for each known id, in entity creation order.
    pub fn entity_names(&self, ids: &[String]) -> EngineResult<Vec<(String, String)>> {
        self.store.entity_names(ids)
    }

    /// Entities nearest to `query_embedding`, closest first.
    pub fn find_similar_entities(
        &self,
        query_embedding: &[f32],
        limit: usize,
    ) -> EngineResult<Vec<ScoredEntity>> {
        self.store.search_entities_by_embedding(query_embedding, limit)
    }

    // ═════════════════════════════════════════════════════════════════════════
    // Relationships
    // ═════════════════════════════════════════════════════════════════════════

    /// Add `weight` to the (from, to, relation_type) edge, creating it if absent.
    pub fn add_relationship(
        &self,
        from_id: &str,
        to_id: &str,
        relation_type: &str,
        weight: f64,
    ) -> EngineResult<()> {
        if !weight.is_finite() || weight < 0.0 {
            return Err(EngineError::InvalidInput(format!(
                "relationship weight must be finite and >= 0, got {weight}"
            )));
        }
        if self.store.increment_relationship(from_id, to_id, relation_type, weight)? {
            return Ok(());
        }

        let rel = Relationship {
            from_entity_id: from_id.to_string(),
            to_entity_id: to_id.to_string(),
            relation_type: relation_type.to_string(),
            weight,
            created_at: now_timestamp(),
        };
        match self.store.insert_relationship(&rel) {
            Ok(()) => Ok(()),
            // A concurrent insert won; fold our weight into its row.
            Err(e) if e.is_conflict() => {
                if self.store.increment_relationship(from_id, to_id, relation_type, weight)? {
                    Ok(())
                } else {
                    Err(e)
                }
            }
            Err(e) => Err(e),
        }
    }

    pub fn relationships_of(&self, entity_id: &str) -> EngineResult<Vec<Relationship>> {
        self.store.relationships_of(entity_id)
    }

    /// Ids reachable from `entity_id` within `depth` hops, following edges in
    /// either direction. The start id is never included.
    pub fn get_related_entities(
        &self,
        entity_id: &str,
        relation_type: Option<&str>,
        depth: usize,
    ) -> EngineResult<HashSet<String>> {
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(entity_id.to_string());
        let mut related: HashSet<String> = HashSet::new();
        let mut frontier = vec![entity_id.to_string()];

        for _ in 0..depth {
            let mut next = Vec::new();
            for id in &frontier {
                for neighbor in self.store.neighbor_ids(id, relation_type)? {
                    if visited.insert(neighbor.clone()) {
                        related.insert(neighbor.clone());
                        next.push(neighbor);
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }
        Ok(related)
    }

    /// Resolve every extracted entity and link each distinct pair with
    /// `co_occurrence` edges in both directions. Returns the resolved ids.
    pub async fn infer_relationships(
        &self,
        entities: &[ExtractedEntity],
        source_text: &str,
    ) -> EngineResult<Vec<String>> {
        let snippet: String = source_text.chars().take(DESCRIPTION_SOURCE_CHARS).collect();
        let description = format!("From text: {snippet}");

        let mut ids: Vec<String> = Vec::with_capacity(entities.len());
        for e in entities {
            let id = self.add_entity(&e.name, e.entity_type, &description).await?;
            if !ids.contains(&id) {
                ids.push(id);
            }
        }

        for (i, a) in ids.iter().enumerate() {
            for b in &ids[i + 1..] {
                self.add_relationship(a, b, CO_OCCURRENCE, DEFAULT_RELATIONSHIP_WEIGHT)?;
                self.add_relationship(b, a, CO_OCCURRENCE, DEFAULT_RELATIONSHIP_WEIGHT)?;
            }
        }

        if ids.len() > 1 {
            debug!(
                "[graph] Linked {} entities ({} co-occurrence pairs)",
                ids.len(),
                ids.len() * (ids.len() - 1) / 2
            );
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::embedding::{Blocking, Embedder, HashingEmbedder};

    fn graph() -> EntityGraph {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let inner: Arc<dyn Embedder> = Arc::new(Blocking::new(HashingEmbedder::new(32)));
        EntityGraph::new(store, Arc::new(EmbeddingPool::new(inner, 32, 2, 16)))
    }

    #[tokio::test]
    async fn same_key_returns_same_id() {
        let g = graph();
        let a = g.add_entity("Alice", EntityType::Person, "a friend").await.unwrap();
        let b = g.add_entity("Alice", EntityType::Person, "someone else").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(g.get_entity(&a).unwrap().unwrap().description, "a friend");

        // Type is part of the key.
        let c = g.add_entity("Alice", EntityType::Concept, "").await.unwrap();
        assert_ne!(a, c);
        assert!(g.add_entity("  ", EntityType::Person, "").await.is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_add_entity_yields_one_row() {
        let g = Arc::new(graph());
        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let g = g.clone();
                tokio::spawn(async move {
                    g.add_entity("Paris", EntityType::Place, &format!("call {i}")).await
                })
            })
            .collect();
        let mut ids = HashSet::new();
        for t in tasks {
            ids.insert(t.await.unwrap().unwrap());
        }
        assert_eq!(ids.len(), 1);
        assert_eq!(g.store.count_entities().unwrap(), 1);
    }

    #[tokio::test]
    async fn repeated_edges_accumulate() {
        let g = graph();
        let a = g.add_entity("A", EntityType::Concept, "").await.unwrap();
        let b = g.add_entity("B", EntityType::Concept, "").await.unwrap();
        for _ in 0..3 {
            g.add_relationship(&a, &b, "knows", 1.0).unwrap();
        }
        let rels = g.relationships_of(&a).unwrap();
        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].weight, 3.0);
    }

    #[tokio::test]
    async fn bad_weights_rejected() {
        let g = graph();
        assert!(matches!(
            g.add_relationship("a", "b", "knows", -1.0),
            Err(EngineError::InvalidInput(_))
        ));
        assert!(g.add_relationship("a", "b", "knows", f64::NAN).is_err());
        assert_eq!(g.store.count_relationships().unwrap(), 0);
    }

    #[tokio::test]
    async fn co_occurrence_is_symmetric() {
        let g = graph();
        let ids = g
            .infer_relationships(
                &[
                    ExtractedEntity::new("Alice", EntityType::Person),
                    ExtractedEntity::new("Paris", EntityType::Place),
                ],
                "I met Alice in Paris",
            )
            .await
            .unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(g.store.count_relationships().unwrap(), 2);
        for (from, to) in [(&ids[0], &ids[1]), (&ids[1], &ids[0])] {
            let rel = g.store.get_relationship(from, to, CO_OCCURRENCE).unwrap().unwrap();
            assert_eq!(rel.weight, 1.0);
        }
        let alice = g.get_entity(&ids[0]).unwrap().unwrap();
        assert_eq!(alice.description, "From text: I met Alice in Paris");
    }

    #[tokio::test]
    async fn description_snippet_is_capped() {
        let g = graph();
        let text = "x".repeat(250);
        let ids = g
            .infer_relationships(&[ExtractedEntity::new("X", EntityType::Concept)], &text)
            .await
            .unwrap();
        let e = g.get_entity(&ids[0]).unwrap().unwrap();
        assert_eq!(e.description.len(), "From text: ".len() + 100);
        assert_eq!(g.store.count_relationships().unwrap(), 0);
    }

    #[tokio::test]
    async fn traversal_depths() {
        let g = graph();
        let mut ids = Vec::new();
        for name in ["A", "B", "C", "D"] {
            ids.push(g.add_entity(name, EntityType::Concept, "").await.unwrap());
        }
        // A → B, C → B (incoming), C → D via "works_at".
        g.add_relationship(&ids[0], &ids[1], "knows", 1.0).unwrap();
        g.add_relationship(&ids[2], &ids[1], "knows", 1.0).unwrap();
        g.add_relationship(&ids[2], &ids[3], "works_at", 1.0).unwrap();

        assert!(g.get_related_entities(&ids[0], None, 0).unwrap().is_empty());
        assert_eq!(g.get_related_entities(&ids[1], None, 1).unwrap().len(), 2);

        let two = g.get_related_entities(&ids[0], None, 2).unwrap();
        assert_eq!(two, HashSet::from([ids[1].clone(), ids[2].clone()]));

        let three = g.get_related_entities(&ids[0], None, 3).unwrap();
        assert!(three.contains(&ids[3]));
        assert!(!three.contains(&ids[0]));

        let filtered = g.get_related_entities(&ids[2], Some("works_at"), 1).unwrap();
        assert_eq!(filtered, HashSet::from([ids[3].clone()]));
    }
}
