// ── Engram RAG: Memory Lifecycle ────────────────────────────────────────────
//
// Creation, indexing and grooming of memories.
//
// Creation path:
//   row persisted → embedded (bounded pool) → indexed → entities extracted
//   for `user_input` and folded into the graph.
// The row is visible before it is indexed. An embed/index failure surfaces as
// `NotIndexed` so the caller can `reindex` later; extraction never fails a call.
//
// Grooming path:
//   prune light edges, forget stale unreferenced episodic memories, decay.

use crate::atoms::constants::{SUMMARY_KIND, USER_INPUT_KIND};
use crate::atoms::error::{EngineError, EngineResult};
use crate::atoms::types::{
    dedup_tags, EngineStats, GroomStats, MaintenanceReport, Memory, MemoryType, Metadata,
};
use crate::engine::config::GroomingConfig;
use crate::engine::embedding::EmbeddingPool;
use crate::engine::extraction::EntityExtractor;
use crate::engine::graph::EntityGraph;
use crate::engine::store::{now_timestamp, timestamp_days_ago, Store};
use crate::engine::vector::VectorIndex;
use log::{debug, info, warn};
use std::sync::Arc;

pub struct MemoryLifecycle {
    store: Arc<Store>,
    index: Arc<dyn VectorIndex>,
    embedder: Arc<EmbeddingPool>,
    graph: Arc<EntityGraph>,
    extractor: Option<Arc<dyn EntityExtractor>>,
    grooming: GroomingConfig,
}

impl MemoryLifecycle {
    pub fn new(
        store: Arc<Store>,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<EmbeddingPool>,
        graph: Arc<EntityGraph>,
        extractor: Option<Arc<dyn EntityExtractor>>,
        grooming: GroomingConfig,
    ) -> Self {
        Self { store, index, embedder, graph, extractor, grooming }
    }

    // ═════════════════════════════════════════════════════════════════════════
    // Creation
    // ═════════════════════════════════════════════════════════════════════════

    /// Store, embed and index a memory. `user_input` memories also feed the
    /// entity graph.
    pub async fn create<I, S>(&self, kind: &str, text: &str, tags: I) -> EngineResult<Memory>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if kind.trim().is_empty() {
            return Err(EngineError::InvalidInput("memory kind must not be empty".into()));
        }

        let mut memory = Memory {
            id: uuid::Uuid::new_v4().to_string(),
            kind: kind.to_string(),
            text: text.to_string(),
            tags: dedup_tags(tags),
            created_at: now_timestamp(),
            memory_type: MemoryType::from_kind(kind),
            embedding: None,
        };
        self.store.insert_memory(&memory)?;

        match self.index_memory(&memory).await {
            Ok(vector) => memory.embedding = Some(vector),
            Err(e) => {
                warn!("[memory] {} stored but not indexed: {}", memory.id, e);
                return Err(EngineError::NotIndexed {
                    memory_id: memory.id,
                    reason: e.to_string(),
                });
            }
        }
        debug!("[memory] Created {} ({}, {})", memory.id, memory.kind, memory.memory_type);

        if kind == USER_INPUT_KIND {
            self.extract_into_graph(&memory).await;
        }
        Ok(memory)
    }

    /// Retry the embed-and-index step. Returns false if already indexed.
    pub async fn reindex(&self, memory_id: &str) -> EngineResult<bool> {
        let memory = self
            .store
            .get_memory(memory_id)?
            .ok_or_else(|| EngineError::InvalidInput(format!("unknown memory id: {memory_id}")))?;
        if self.index.contains(memory_id)? {
            return Ok(false);
        }
        self.index_memory(&memory).await?;
        info!("[memory] Reindexed {}", memory_id);
        Ok(true)
    }

    /// Reindex every stored memory missing from the vector index.
    pub async fn reindex_missing(&self) -> EngineResult<usize> {
        let mut count = 0;
        for id in self.store.list_memory_ids()? {
            if !self.index.contains(&id)? && self.reindex(&id).await? {
                count += 1;
            }
        }
        if count > 0 {
            info!("[memory] Reindexed {} memories", count);
        }
        Ok(count)
    }

    /// Store a conversation summary tagged with its context id.
    pub async fn add_summary(&self, context_id: &str, summary: &str) -> EngineResult<Memory> {
        self.create(SUMMARY_KIND, summary, [SUMMARY_KIND, context_id]).await
    }

    /// Newest-first memories tagged with `context_id`.
    pub fn recent(&self, context_id: &str, limit: usize) -> EngineResult<Vec<Memory>> {
        self.store.recent_by_tag(context_id, limit)
    }

    pub fn get(&self, memory_id: &str) -> EngineResult<Option<Memory>> {
        self.store.get_memory(memory_id)
    }

    async fn index_memory(&self, memory: &Memory) -> EngineResult<Vec<f32>> {
        let vector = self.embedder.embed(&memory.text).await?;
        let mut metadata = Metadata::new();
        metadata.insert("kind".into(), memory.kind.clone());
        metadata.insert("tags".into(), serde_json::to_string(&memory.tags)?);
        metadata.insert("memory_type".into(), memory.memory_type.as_str().into());

        match self.index.add(&memory.id, &vector, &memory.text, &metadata) {
            Ok(()) => Ok(vector),
            // A concurrent reindex got there first.
            Err(e) if e.is_conflict() => Ok(vector),
            Err(e) => Err(e),
        }
    }

    async fn extract_into_graph(&self, memory: &Memory) {
        let Some(extractor) = &self.extractor else {
            return;
        };
        let entities = match extractor.extract(&memory.text).await {
            Ok(entities) => entities,
            Err(e) => {
                warn!("[memory] Entity extraction failed for {}: {}", memory.id, e);
                return;
            }
        };
        if entities.is_empty() {
            return;
        }
        if let Err(e) = self.graph.infer_relationships(&entities, &memory.text).await {
            warn!("[memory] Graph update failed for {}: {}", memory.id, e);
        }
    }

    // ═════════════════════════════════════════════════════════════════════════
    // Grooming
    // ═════════════════════════════════════════════════════════════════════════

    /// Multiply every relationship weight by `factor` (0 ≤ factor < 1).
    /// Returns the number of edges touched. Never deletes.
    pub fn decay_relationships(&self, factor: f64) -> EngineResult<usize> {
        if !(factor.is_finite() && (0.0..1.0).contains(&factor)) {
            return Err(EngineError::InvalidInput(format!(
                "decay factor must be in [0, 1), got {factor}"
            )));
        }
        let n = self.store.scale_relationship_weights(factor)?;
        debug!("[groom] Decayed {} relationships by {}", n, factor);
        Ok(n)
    }

    /// Drop edges lighter than `min_weight` and forget episodic memories
    /// older than `max_age_days` that no surviving memory references by tag.
    /// A second call with no writes in between removes nothing. Entities are
    /// kept even when left without edges.
    pub fn groom_memory_graph(&self, min_weight: f64, max_age_days: u32) -> EngineResult<GroomStats> {
        if !min_weight.is_finite() {
            return Err(EngineError::InvalidInput(format!(
                "min_weight must be finite, got {min_weight}"
            )));
        }
        let relationships_removed = self.store.delete_relationships_below(min_weight)?;

        // Deleting a memory drops its tags, which can free the memories it
        // referenced. Repeat until a pass forgets nothing.
        let cutoff = timestamp_days_ago(max_age_days);
        let mut memories_removed = 0;
        loop {
            let forgettable = self.store.list_forgettable_episodic(&cutoff)?;
            if forgettable.is_empty() {
                break;
            }
            let mut removed_this_pass = 0;
            for id in forgettable {
                if !self.store.delete_memory(&id)? {
                    continue;
                }
                removed_this_pass += 1;
                if let Err(e) = self.index.delete(&id) {
                    warn!("[groom] Memory {} deleted but its vector remains: {}", id, e);
                    return Err(e);
                }
            }
            memories_removed += removed_this_pass;
            if removed_this_pass == 0 {
                break;
            }
        }

        let stats = GroomStats { relationships_removed, memories_removed };
        if stats.total() > 0 {
            info!(
                "[groom] Removed {} relationships, {} memories (cutoff {})",
                relationships_removed, memories_removed, cutoff
            );
        }
        Ok(stats)
    }

    /// The scheduled job: groom with the configured thresholds, then decay.
    pub fn run_maintenance(&self) -> EngineResult<MaintenanceReport> {
        let g = &self.grooming;
        let groom = self.groom_memory_graph(g.min_weight, g.max_age_days)?;
        let relationships_decayed = self.decay_relationships(g.decay_factor)?;
        if groom.total() > 0 {
            info!(
                "[groom] Maintenance: {} relationships and {} memories pruned, {} decayed",
                groom.relationships_removed, groom.memories_removed, relationships_decayed
            );
        }
        Ok(MaintenanceReport { groom, relationships_decayed })
    }

    pub fn stats(&self) -> EngineResult<EngineStats> {
        let (memories, semantic, episodic) = self.store.count_memories()?;
        Ok(EngineStats {
            memories,
            semantic,
            episodic,
            entities: self.store.count_entities()?,
            relationships: self.store.count_relationships()?,
            indexed: self.index.len()?,
        })
    }
}
