// Engram RAG — Graph RAG Search
//
// Three stages:
//   1. Vector search for `k * candidate_multiplier` candidates.
//   2. Entity expansion: seed entities nearest to the query, their one-hop
//      neighbors, then a small vector search per entity name. Best effort:
//      any failure (or the optional timeout) leaves stage 2 empty.
//   3. Merge: graph hits first with boosted distance, then vector hits,
//      deduplicated by text prefix, stable-sorted, truncated to `k`.

use crate::atoms::error::EngineResult;
use crate::atoms::types::{MetadataFilter, SearchHit};
use crate::engine::config::RetrievalConfig;
use crate::engine::embedding::EmbeddingPool;
use crate::engine::graph::EntityGraph;
use crate::engine::vector::VectorIndex;
use futures::future::join_all;
use log::{debug, warn};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

pub struct GraphRagSearch {
    index: Arc<dyn VectorIndex>,
    graph: Arc<EntityGraph>,
    embedder: Arc<EmbeddingPool>,
    config: RetrievalConfig,
}

impl GraphRagSearch {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        graph: Arc<EntityGraph>,
        embedder: Arc<EmbeddingPool>,
        config: RetrievalConfig,
    ) -> Self {
        Self { index, graph, embedder, config }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// The `k` most relevant memories for `query`.
    pub async fn search(&self, query: &str, k: usize) -> EngineResult<Vec<SearchHit>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        // ── Stage 1 ──
        let query_vec = self.embedder.embed(query).await?;
        let vector_hits = self.vector_search(
            &query_vec,
            k.saturating_mul(self.config.candidate_multiplier),
            None,
        )?;

        // ── Stage 2 ──
        let expansion = self.graph_expand(&query_vec);
        let graph_hits = match self.config.graph_timeout_ms {
            Some(ms) => match tokio::time::timeout(Duration::from_millis(ms), expansion).await {
                Ok(result) => result,
                Err(_) => {
                    warn!("[search] Graph expansion exceeded {}ms, using vector results", ms);
                    Ok(Vec::new())
                }
            },
            None => expansion.await,
        };
        let graph_hits = graph_hits.unwrap_or_else(|e| {
            warn!("[search] Graph expansion failed, using vector results: {}", e);
            Vec::new()
        });

        // ── Stage 3 ──
        let merged = merge_results(
            graph_hits,
            vector_hits,
            k,
            self.config.graph_boost,
            self.config.dedup_prefix_chars,
        );
        debug!("[search] '{}' → {} results", prefix_key(query, 40), merged.len());
        Ok(merged)
    }

    /// Plain vector search with an optional exact-match metadata filter.
    pub async fn search_embeddings(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> EngineResult<Vec<SearchHit>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let query_vec = self.embedder.embed(query).await?;
        self.vector_search(&query_vec, k, filter)
    }

    fn vector_search(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> EngineResult<Vec<SearchHit>> {
        Ok(self
            .index
            .query(vector, k, filter)?
            .into_iter()
            .map(SearchHit::from_vector)
            .collect())
    }

    /// Stage 2. Returns graph-sourced hits with unmodified distances.
    async fn graph_expand(&self, query_vec: &[f32]) -> EngineResult<Vec<SearchHit>> {
        let seeds = self
            .graph
            .find_similar_entities(query_vec, self.config.seed_entities)?;
        if seeds.is_empty() {
            return Ok(Vec::new());
        }

        // Names: seeds in similarity order, then newly reached neighbors.
        let mut known: HashSet<String> = seeds.iter().map(|s| s.entity.id.clone()).collect();
        let mut names: Vec<String> = seeds.iter().map(|s| s.entity.name.clone()).collect();
        let mut reached: Vec<String> = Vec::new();
        for seed in &seeds {
            for id in self.graph.get_related_entities(&seed.entity.id, None, 1)? {
                if known.insert(id.clone()) {
                    reached.push(id);
                }
            }
        }
        names.extend(
            self.graph
                .entity_names(&reached)?
                .into_iter()
                .map(|(_, name)| name),
        );
        let names = query_names(names, self.config.max_entity_names);

        let name_vecs = join_all(names.iter().map(|n| self.embedder.embed(n))).await;

        let mut seen: HashSet<String> = HashSet::new();
        let mut hits = Vec::new();
        for (name, vec) in names.iter().zip(name_vecs) {
            let vec = vec?;
            for hit in self.index.query(&vec, self.config.hits_per_entity, None)? {
                if seen.insert(prefix_key(&hit.text, self.config.dedup_prefix_chars)) {
                    hits.push(SearchHit::from_graph(hit, name));
                }
            }
        }
        debug!(
            "[search] Graph expansion: {} seeds, {} names, {} hits",
            seeds.len(),
            names.len(),
            hits.len()
        );
        Ok(hits)
    }
}

/// Stage 3 merge. Graph hits claim their prefix first and get their distance
/// multiplied by `boost`; vector hits fill in the rest.
pub fn merge_results(
    graph_hits: Vec<SearchHit>,
    vector_hits: Vec<SearchHit>,
    k: usize,
    boost: f32,
    prefix_chars: usize,
) -> Vec<SearchHit> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged: Vec<SearchHit> = Vec::with_capacity(graph_hits.len() + vector_hits.len());

    for mut hit in graph_hits {
        if seen.insert(prefix_key(&hit.text, prefix_chars)) {
            hit.distance *= boost;
            merged.push(hit);
        }
    }
    for hit in vector_hits {
        if seen.insert(prefix_key(&hit.text, prefix_chars)) {
            merged.push(hit);
        }
    }

    merged.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    merged.truncate(k);
    merged
}

/// First `max` distinct names. The same name under two entity types would
/// otherwise repeat the same per-name query.
fn query_names(mut names: Vec<String>, max: usize) -> Vec<String> {
    let mut unique: HashSet<String> = HashSet::new();
    names.retain(|n| unique.insert(n.clone()));
    names.truncate(max);
    names
}

fn prefix_key(text: &str, chars: usize) -> String {
    text.chars().take(chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::types::{Entity, EntityType, HitSource, Metadata, VectorHit};
    use crate::engine::embedding::{Blocking, Embedder, HashingEmbedder};
    use crate::engine::store::Store;
    use crate::engine::vector::InMemoryVectorIndex;

    const DIM: usize = 64;

    fn hit(text: &str, distance: f32, source: HitSource) -> SearchHit {
        let raw = VectorHit {
            id: text.to_string(),
            text: text.to_string(),
            metadata: Metadata::new(),
            distance,
        };
        match source {
            HitSource::Vector => SearchHit::from_vector(raw),
            HitSource::Graph => SearchHit::from_graph(raw, "E"),
        }
    }

    struct Fixture {
        store: Arc<Store>,
        index: Arc<InMemoryVectorIndex>,
        hasher: HashingEmbedder,
        search: GraphRagSearch,
    }

    fn fixture(config: RetrievalConfig) -> Fixture {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let index = Arc::new(InMemoryVectorIndex::new(DIM));
        let inner: Arc<dyn Embedder> = Arc::new(Blocking::new(HashingEmbedder::new(DIM)));
        let pool = Arc::new(EmbeddingPool::new(inner, DIM, 2, 64));
        let graph = Arc::new(EntityGraph::new(store.clone(), pool.clone()));
        let search = GraphRagSearch::new(index.clone(), graph, pool, config);
        Fixture { store, index, hasher: HashingEmbedder::new(DIM), search }
    }

    impl Fixture {
        fn remember(&self, id: &str, text: &str) {
            self.index
                .add(id, &self.hasher.embed_text(text), text, &Metadata::new())
                .unwrap();
        }
    }

    #[test]
    fn graph_boost_reorders_only_close_calls() {
        let merged = merge_results(
            vec![hit("graph", 0.5, HitSource::Graph)],
            vec![hit("near", 0.3, HitSource::Vector), hit("mid", 0.45, HitSource::Vector)],
            3,
            0.8,
            100,
        );
        let order: Vec<&str> = merged.iter().map(|h| h.text.as_str()).collect();
        assert_eq!(order, vec!["near", "graph", "mid"]);
        assert!((merged[1].distance - 0.4).abs() < 1e-6);
        assert_eq!(merged[1].source, HitSource::Graph);
    }

    #[test]
    fn merge_dedups_by_prefix_graph_first() {
        let long_a = format!("{}{}", "p".repeat(100), "tail one");
        let long_b = format!("{}{}", "p".repeat(100), "tail two");
        let merged = merge_results(
            vec![hit(&long_a, 0.9, HitSource::Graph)],
            vec![hit(&long_b, 0.1, HitSource::Vector), hit("other", 0.2, HitSource::Vector)],
            10,
            0.8,
            100,
        );
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].text, "other");
        assert_eq!(merged[1].text, long_a);
        assert_eq!(merged[1].source, HitSource::Graph);
    }

    #[test]
    fn merge_is_stable_and_truncates() {
        let merged = merge_results(
            vec![],
            vec![
                hit("a", 0.2, HitSource::Vector),
                hit("b", 0.2, HitSource::Vector),
                hit("c", 0.1, HitSource::Vector),
            ],
            2,
            0.8,
            100,
        );
        let order: Vec<&str> = merged.iter().map(|h| h.text.as_str()).collect();
        assert_eq!(order, vec!["c", "a"]);
    }

    #[tokio::test]
    async fn no_entities_equals_vector_search() {
        let f = fixture(RetrievalConfig::default());
        f.remember("1", "I met Alice in Paris");
        f.remember("2", "Paris is lovely in spring");
        f.remember("3", "quarterly budget review");
        f.remember("4", "Alice likes tea");

        let hits = f.search.search("Alice Paris", 2).await.unwrap();
        let baseline = f.search.search_embeddings("Alice Paris", 2, None).await.unwrap();
        assert_eq!(hits, baseline);
        assert!(hits.iter().all(|h| h.source == HitSource::Vector));
    }

    #[tokio::test]
    async fn empty_corpus_and_zero_k() {
        let f = fixture(RetrievalConfig::default());
        assert!(f.search.search("anything", 5).await.unwrap().is_empty());
        f.remember("1", "something");
        assert!(f.search.search("something", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn entity_names_pull_in_graph_hits() {
        let f = fixture(RetrievalConfig::default());
        f.remember("1", "I met Alice in Paris");
        f.remember("2", "quarterly budget review");
        let graph = &f.search.graph;
        let alice = graph.add_entity("Alice", EntityType::Person, "").await.unwrap();
        let paris = graph.add_entity("Paris", EntityType::Place, "").await.unwrap();
        graph.add_relationship(&alice, &paris, "co_occurrence", 1.0).unwrap();

        let hits = f.search.search("Paris", 2).await.unwrap();
        assert_eq!(hits[0].text, "I met Alice in Paris");
        assert_eq!(hits[0].source, HitSource::Graph);
        assert!(hits[0].matched_entity.is_some());
    }

    #[tokio::test]
    async fn broken_entity_table_falls_back_to_vector() {
        let f = fixture(RetrievalConfig::default());
        f.remember("1", "I met Alice in Paris");
        // An entity with a foreign dimension makes the similarity scan fail.
        f.store
            .insert_entity(&Entity {
                id: "bad".into(),
                name: "Bad".into(),
                entity_type: EntityType::Concept,
                description: String::new(),
                embedding: vec![1.0; DIM + 1],
                created_at: "2024-01-01T00:00:00Z".into(),
            })
            .unwrap();

        let hits = f.search.search("Paris", 3).await.unwrap();
        let baseline = f.search.search_embeddings("Paris", 3, None).await.unwrap();
        assert_eq!(hits, baseline);
    }

    #[tokio::test]
    async fn filtered_search_matches_metadata() {
        let f = fixture(RetrievalConfig::default());
        let mut m = Metadata::new();
        m.insert("memory_type".into(), "semantic".into());
        f.index
            .add("s", &f.hasher.embed_text("Paris summary"), "Paris summary", &m)
            .unwrap();
        f.remember("e", "Paris trip");

        let filter: MetadataFilter = m.clone();
        let hits = f.search.search_embeddings("Paris", 5, Some(&filter)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "s");
    }

    #[test]
    fn repeated_names_take_one_slot() {
        let names = ["Alice", "Alice", "Paris", "Bob"].map(String::from).to_vec();
        assert_eq!(query_names(names, 2), vec!["Alice", "Paris"]);
    }

    #[tokio::test]
    async fn same_name_two_types_still_expands() {
        let f = fixture(RetrievalConfig {
            max_entity_names: 2,
            hits_per_entity: 1,
            ..RetrievalConfig::default()
        });
        f.remember("1", "Alice likes tea");
        f.remember("2", "Bob prefers window seats");
        let graph = &f.search.graph;
        let alice = graph.add_entity("Alice", EntityType::Person, "").await.unwrap();
        graph.add_entity("Alice", EntityType::Concept, "").await.unwrap();
        let bob = graph.add_entity("Bob", EntityType::Person, "").await.unwrap();
        graph.add_relationship(&alice, &bob, "co_occurrence", 1.0).unwrap();

        let hits = f.search.search("Alice", 2).await.unwrap();
        let bob_hit = hits.iter().find(|h| h.id == "2").unwrap();
        assert_eq!(bob_hit.source, HitSource::Graph);
        assert_eq!(bob_hit.matched_entity.as_deref(), Some("Bob"));
    }

    #[test]
    fn prefix_counts_chars() {
        assert_eq!(prefix_key("héllo", 2), "hé");
        assert_eq!(prefix_key("hi", 100), "hi");
    }
}
