// Engram RAG — Engine Configuration
//
// One TOML file, every field optional. Sections:
//   [embedding]   model endpoint, dimension, worker pool, cache
//   [extraction]  LLM entity extraction endpoint
//   [retrieval]   Graph RAG policy constants
//   [grooming]    decay / prune thresholds for the maintenance job
//
// Default location: ~/.engram-rag/config.toml. A missing file means defaults.

use crate::atoms::constants::*;
use crate::atoms::error::{EngineError, EngineResult};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root data directory (~/.engram-rag).
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".engram-rag")
}

pub fn default_config_path() -> PathBuf {
    data_dir().join("config.toml")
}

pub fn default_db_path() -> PathBuf {
    data_dir().join("engram.db")
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// SQLite database file. `None` → ~/.engram-rag/engram.db.
    pub db_path: Option<PathBuf>,
    /// Vector collection name inside the database.
    pub collection: String,
    pub embedding: EmbeddingConfig,
    pub extraction: ExtractionConfig,
    pub retrieval: RetrievalConfig,
    pub grooming: GroomingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            db_path: None,
            collection: DEFAULT_COLLECTION.into(),
            embedding: EmbeddingConfig::default(),
            extraction: ExtractionConfig::default(),
            retrieval: RetrievalConfig::default(),
            grooming: GroomingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Base URL for the embedding API (Ollama: http://localhost:11434).
    pub base_url: String,
    /// Embedding model name (e.g. "nomic-embed-text").
    pub model: String,
    /// Collection dimension. Every vector must have exactly this length.
    pub dimension: usize,
    /// Concurrent embedding calls allowed.
    pub workers: usize,
    /// Cached vectors keyed by exact text. 0 disables the cache.
    pub cache_size: usize,
    /// Use the offline hashing embedder instead of the HTTP model.
    pub offline: bool,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        EmbeddingConfig {
            base_url: DEFAULT_EMBEDDING_BASE_URL.into(),
            model: DEFAULT_EMBEDDING_MODEL.into(),
            dimension: DEFAULT_EMBEDDING_DIMENSION,
            workers: DEFAULT_EMBEDDING_WORKERS,
            cache_size: DEFAULT_EMBEDDING_CACHE,
            offline: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Run entity extraction on `user_input` memories.
    pub enabled: bool,
    /// Chat endpoint for LLM-based NER.
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        ExtractionConfig {
            enabled: true,
            base_url: DEFAULT_EMBEDDING_BASE_URL.into(),
            model: DEFAULT_EXTRACTION_MODEL.into(),
            timeout_secs: DEFAULT_EXTRACTION_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Multiplier applied to graph-sourced distances (0 < boost ≤ 1).
    pub graph_boost: f32,
    /// Query-similar entities seeding stage 2.
    pub seed_entities: usize,
    /// Entity names searched in stage 2.
    pub max_entity_names: usize,
    /// Secondary search size per entity name.
    pub hits_per_entity: usize,
    /// Stage 1 requests `k * candidate_multiplier` hits.
    pub candidate_multiplier: usize,
    /// Leading characters that identify duplicate texts.
    pub dedup_prefix_chars: usize,
    /// Abandon stage 2 after this long and return vector-only results.
    pub graph_timeout_ms: Option<u64>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        RetrievalConfig {
            graph_boost: DEFAULT_GRAPH_BOOST,
            seed_entities: DEFAULT_SEED_ENTITIES,
            max_entity_names: DEFAULT_MAX_ENTITY_NAMES,
            hits_per_entity: DEFAULT_HITS_PER_ENTITY,
            candidate_multiplier: DEFAULT_CANDIDATE_MULTIPLIER,
            dedup_prefix_chars: DEFAULT_DEDUP_PREFIX_CHARS,
            graph_timeout_ms: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GroomingConfig {
    /// Relationships lighter than this are pruned.
    pub min_weight: f64,
    /// Unreferenced episodic memories older than this are forgotten.
    pub max_age_days: u32,
    /// Weight multiplier applied after each grooming pass.
    pub decay_factor: f64,
}

impl Default for GroomingConfig {
    fn default() -> Self {
        GroomingConfig {
            min_weight: DEFAULT_MIN_WEIGHT,
            max_age_days: DEFAULT_MAX_AGE_DAYS,
            decay_factor: DEFAULT_DECAY_FACTOR,
        }
    }
}

impl EngineConfig {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> EngineResult<Self> {
        if !path.exists() {
            info!("[config] No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&text)?;
        info!("[config] Loaded {:?}", path);
        Ok(config)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(text: &str) -> EngineResult<Self> {
        let config: EngineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> EngineResult<String> {
        toml::to_string_pretty(self).map_err(|e| EngineError::Config(e.to_string()))
    }

    pub fn db_path(&self) -> PathBuf {
        self.db_path.clone().unwrap_or_else(default_db_path)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.collection.trim().is_empty() {
            return Err(EngineError::Config("collection name must not be empty".into()));
        }
        if self.embedding.dimension == 0 {
            return Err(EngineError::Config("embedding.dimension must be > 0".into()));
        }
        if self.embedding.workers == 0 {
            return Err(EngineError::Config("embedding.workers must be > 0".into()));
        }
        let r = &self.retrieval;
        if !(r.graph_boost > 0.0 && r.graph_boost <= 1.0) {
            return Err(EngineError::Config(format!(
                "retrieval.graph_boost must be in (0, 1], got {}",
                r.graph_boost
            )));
        }
        if r.candidate_multiplier == 0 || r.dedup_prefix_chars == 0 {
            return Err(EngineError::Config(
                "retrieval.candidate_multiplier and dedup_prefix_chars must be > 0".into(),
            ));
        }
        let g = &self.grooming;
        if !(g.decay_factor >= 0.0 && g.decay_factor < 1.0) {
            return Err(EngineError::Config(format!(
                "grooming.decay_factor must be in [0, 1), got {}",
                g.decay_factor
            )));
        }
        if !g.min_weight.is_finite() || g.min_weight < 0.0 {
            return Err(EngineError::Config("grooming.min_weight must be finite and >= 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_policy_constants() {
        let c = EngineConfig::default();
        assert_eq!(c.retrieval.graph_boost, 0.8);
        assert_eq!(c.retrieval.seed_entities, 5);
        assert_eq!(c.retrieval.max_entity_names, 8);
        assert_eq!(c.retrieval.hits_per_entity, 3);
        assert_eq!(c.retrieval.dedup_prefix_chars, 100);
        assert_eq!(c.grooming.max_age_days, 90);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let c = EngineConfig::from_toml(
            r#"
            collection = "notes"

            [embedding]
            dimension = 384
            offline = true

            [retrieval]
            graph_timeout_ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(c.collection, "notes");
        assert_eq!(c.embedding.dimension, 384);
        assert!(c.embedding.offline);
        assert_eq!(c.embedding.workers, 2);
        assert_eq!(c.retrieval.graph_timeout_ms, Some(250));
        assert_eq!(c.grooming.decay_factor, 0.95);
    }

    #[test]
    fn invalid_values_rejected() {
        assert!(EngineConfig::from_toml("[embedding]\ndimension = 0").is_err());
        assert!(EngineConfig::from_toml("[retrieval]\ngraph_boost = 1.5").is_err());
        assert!(EngineConfig::from_toml("[grooming]\ndecay_factor = 1.0").is_err());
        assert!(matches!(
            EngineConfig::from_toml("collection = 5"),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn toml_round_trip() {
        let mut c = EngineConfig::default();
        c.db_path = Some(PathBuf::from("/tmp/x.db"));
        let parsed = EngineConfig::from_toml(&c.to_toml().unwrap()).unwrap();
        assert_eq!(parsed, c);
    }

    #[test]
    fn missing_file_is_default() {
        let path = std::env::temp_dir().join(format!("missing-{}.toml", uuid::Uuid::new_v4()));
        assert_eq!(EngineConfig::load(&path).unwrap(), EngineConfig::default());
    }
}
