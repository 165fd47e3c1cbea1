// Engram RAG — Embeddings
//
// The embedding model is an external capability. Everything in the engine
// talks to it through `EmbeddingPool`, which
//   • bounds concurrent embedding calls with a semaphore (the worker pool),
//   • runs CPU-bound local models on tokio's blocking threads,
//   • rejects vectors whose length differs from the configured dimension,
//   • caches recent vectors by exact text.
//
// Module layout:
//   ollama.rs  — OllamaEmbedder (Ollama + OpenAI-compatible HTTP APIs)
//   hashing.rs — HashingEmbedder (offline, deterministic feature hashing)

use crate::atoms::error::{EngineError, EngineResult};
use async_trait::async_trait;
use log::debug;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Semaphore;

pub mod hashing;
pub mod ollama;

pub use hashing::HashingEmbedder;
pub use ollama::OllamaEmbedder;

/// An embedding backend reached asynchronously (HTTP, IPC…).
#[async_trait]
pub trait Embedder: Send + Sync {
    fn model_name(&self) -> &str;
    async fn embed(&self, text: &str) -> EngineResult<Vec<f32>>;
}

/// A CPU-bound embedding model that runs in-process.
/// Wrap it with `Blocking` to use it as an `Embedder`.
pub trait LocalEmbedder: Send + Sync + 'static {
    fn model_name(&self) -> &str;
    fn embed_blocking(&self, text: &str) -> EngineResult<Vec<f32>>;
}

/// Adapter that moves a `LocalEmbedder` off the async executor.
pub struct Blocking<E: LocalEmbedder>(pub Arc<E>);

impl<E: LocalEmbedder> Blocking<E> {
    pub fn new(inner: E) -> Self {
        Blocking(Arc::new(inner))
    }
}

#[async_trait]
impl<E: LocalEmbedder> Embedder for Blocking<E> {
    fn model_name(&self) -> &str {
        self.0.model_name()
    }

    async fn embed(&self, text: &str) -> EngineResult<Vec<f32>> {
        let inner = self.0.clone();
        let text = text.to_string();
        tokio::task::spawn_blocking(move || inner.embed_blocking(&text)).await?
    }
}

// ═════════════════════════════════════════════════════════════════════════════
// Pool
// ═════════════════════════════════════════════════════════════════════════════

/// Bounded, dimension-checked, caching front for an `Embedder`.
pub struct EmbeddingPool {
    inner: Arc<dyn Embedder>,
    dimension: usize,
    permits: Arc<Semaphore>,
    cache: Option<Mutex<EmbeddingCache>>,
}

impl EmbeddingPool {
    pub fn new(inner: Arc<dyn Embedder>, dimension: usize, workers: usize, cache_size: usize) -> Self {
        Self {
            inner,
            dimension,
            permits: Arc::new(Semaphore::new(workers.max(1))),
            cache: (cache_size > 0).then(|| Mutex::new(EmbeddingCache::new(cache_size))),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    /// Embed `text`, waiting for a free worker if all are busy.
    pub async fn embed(&self, text: &str) -> EngineResult<Vec<f32>> {
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.lock().get(text) {
                return Ok(hit);
            }
        }

        let vector = {
            let _permit = self
                .permits
                .acquire()
                .await
                .map_err(|e| EngineError::Worker(e.to_string()))?;
            self.inner.embed(text).await?
        };

        if vector.len() != self.dimension {
            return Err(EngineError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(EngineError::Embedding(format!(
                "model '{}' returned a non-finite component",
                self.inner.model_name()
            )));
        }

        debug!("[embed] {} dims via {}", vector.len(), self.inner.model_name());
        if let Some(cache) = &self.cache {
            cache.lock().put(text, vector.clone());
        }
        Ok(vector)
    }
}

/// Exact-text cache with FIFO eviction.
struct EmbeddingCache {
    capacity: usize,
    map: HashMap<String, Vec<f32>>,
    order: VecDeque<String>,
}

impl EmbeddingCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            map: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn get(&self, text: &str) -> Option<Vec<f32>> {
        self.map.get(text).cloned()
    }

    fn put(&mut self, text: &str, vector: Vec<f32>) {
        if self.map.contains_key(text) {
            return;
        }
        while self.map.len() >= self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.map.remove(&oldest);
                }
                None => break,
            }
        }
        self.order.push_back(text.to_string());
        self.map.insert(text.to_string(), vector);
    }
}
