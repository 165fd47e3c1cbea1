// engine/state.rs — The assembled engine.
// Opens the store once, builds the index, embedding pool, graph, search and
// lifecycle on top of it, and hands each component the `Arc`s it needs.

use crate::atoms::error::EngineResult;
use crate::engine::config::EngineConfig;
use crate::engine::embedding::{Blocking, Embedder, EmbeddingPool, HashingEmbedder, OllamaEmbedder};
use crate::engine::extraction::{EntityExtractor, OllamaEntityExtractor};
use crate::engine::graph::EntityGraph;
use crate::engine::lifecycle::MemoryLifecycle;
use crate::engine::search::GraphRagSearch;
use crate::engine::store::Store;
use crate::engine::vector::{SqliteVectorIndex, VectorIndex};
use log::info;
use std::sync::Arc;

pub struct MemoryEngine {
    pub config: EngineConfig,
    pub store: Arc<Store>,
    pub index: Arc<dyn VectorIndex>,
    pub embedder: Arc<EmbeddingPool>,
    pub graph: Arc<EntityGraph>,
    pub search: GraphRagSearch,
    pub lifecycle: MemoryLifecycle,
}

impl MemoryEngine {
    /// Open the database named by `config` with the configured backends:
    /// Ollama for embeddings and extraction, or the hashing embedder and no
    /// extraction when `embedding.offline` is set.
    pub fn open(config: EngineConfig) -> EngineResult<Self> {
        let embedder = default_embedder(&config);
        let extractor = default_extractor(&config);
        Self::open_with(config, embedder, extractor)
    }

    /// Open the on-disk database with caller-supplied backends.
    pub fn open_with(
        config: EngineConfig,
        embedder: Arc<dyn Embedder>,
        extractor: Option<Arc<dyn EntityExtractor>>,
    ) -> EngineResult<Self> {
        config.validate()?;
        let store = Arc::new(Store::open(&config.db_path())?);
        Self::assemble(config, store, embedder, extractor)
    }

    /// Private in-memory database. Nothing survives the engine.
    pub fn open_in_memory(
        config: EngineConfig,
        embedder: Arc<dyn Embedder>,
        extractor: Option<Arc<dyn EntityExtractor>>,
    ) -> EngineResult<Self> {
        config.validate()?;
        let store = Arc::new(Store::open_in_memory()?);
        Self::assemble(config, store, embedder, extractor)
    }

    fn assemble(
        config: EngineConfig,
        store: Arc<Store>,
        embedder: Arc<dyn Embedder>,
        extractor: Option<Arc<dyn EntityExtractor>>,
    ) -> EngineResult<Self> {
        let e = &config.embedding;
        let index: Arc<dyn VectorIndex> = Arc::new(SqliteVectorIndex::open(
            store.clone(),
            &config.collection,
            e.dimension,
        )?);
        let pool = Arc::new(EmbeddingPool::new(embedder, e.dimension, e.workers, e.cache_size));
        let graph = Arc::new(EntityGraph::new(store.clone(), pool.clone()));
        let search = GraphRagSearch::new(
            index.clone(),
            graph.clone(),
            pool.clone(),
            config.retrieval.clone(),
        );
        let lifecycle = MemoryLifecycle::new(
            store.clone(),
            index.clone(),
            pool.clone(),
            graph.clone(),
            extractor,
            config.grooming.clone(),
        );

        info!(
            "[engine] Ready: collection '{}', {} dims via {}, {} workers",
            config.collection,
            e.dimension,
            pool.model_name(),
            e.workers
        );

        Ok(MemoryEngine {
            config,
            store,
            index,
            embedder: pool,
            graph,
            search,
            lifecycle,
        })
    }

    /// Flush the write-ahead log. Call before exit.
    pub fn close(&self) -> EngineResult<()> {
        self.store.checkpoint()?;
        info!("[engine] Closed");
        Ok(())
    }
}

fn default_embedder(config: &EngineConfig) -> Arc<dyn Embedder> {
    if config.embedding.offline {
        Arc::new(Blocking::new(HashingEmbedder::new(config.embedding.dimension)))
    } else {
        Arc::new(OllamaEmbedder::from_config(&config.embedding))
    }
}

fn default_extractor(config: &EngineConfig) -> Option<Arc<dyn EntityExtractor>> {
    if config.extraction.enabled && !config.embedding.offline {
        Some(Arc::new(OllamaEntityExtractor::from_config(&config.extraction)))
    } else {
        None
    }
}
