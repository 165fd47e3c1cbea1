// ── Engram RAG Atoms: Constants ────────────────────────────────────────────
// Named defaults for the retrieval and grooming policies. Every tunable one
// is mirrored by a field in `engine::config`; these are only the defaults.

// ── Memory classification ─────────────────────────────────────────────────
// Kinds that describe durable facts rather than events.
pub const SEMANTIC_KINDS: &[&str] = &["entity", "summary", "goal", "habit", "decision"];

/// The kind that triggers entity extraction on create.
pub const USER_INPUT_KIND: &str = "user_input";

/// Kind used by `MemoryLifecycle::add_summary`.
pub const SUMMARY_KIND: &str = "summary";

// ── Entity graph ──────────────────────────────────────────────────────────
pub const CO_OCCURRENCE: &str = "co_occurrence";

/// Characters of the source text carried in an inferred entity's description.
pub const DESCRIPTION_SOURCE_CHARS: usize = 100;

pub const DEFAULT_RELATIONSHIP_WEIGHT: f64 = 1.0;

// ── Graph RAG search ──────────────────────────────────────────────────────
/// Stage 3 multiplies graph-sourced distances by this factor (20% boost).
pub const DEFAULT_GRAPH_BOOST: f32 = 0.8;

/// Stage 2 seeds from this many query-similar entities.
pub const DEFAULT_SEED_ENTITIES: usize = 5;

/// Stage 2 searches for at most this many entity names.
pub const DEFAULT_MAX_ENTITY_NAMES: usize = 8;

/// Stage 2 secondary search size per entity name.
pub const DEFAULT_HITS_PER_ENTITY: usize = 3;

/// Stage 1 requests `k * multiplier` candidates.
pub const DEFAULT_CANDIDATE_MULTIPLIER: usize = 2;

/// Results whose text shares this many leading characters are duplicates.
pub const DEFAULT_DEDUP_PREFIX_CHARS: usize = 100;

// ── Grooming ──────────────────────────────────────────────────────────────
pub const DEFAULT_MIN_WEIGHT: f64 = 1.0;
pub const DEFAULT_MAX_AGE_DAYS: u32 = 90;
pub const DEFAULT_DECAY_FACTOR: f64 = 0.95;

// ── Embedding ─────────────────────────────────────────────────────────────
pub const DEFAULT_EMBEDDING_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 768;
pub const DEFAULT_EMBEDDING_WORKERS: usize = 2;
pub const DEFAULT_EMBEDDING_CACHE: usize = 256;

// ── Extraction ────────────────────────────────────────────────────────────
pub const DEFAULT_EXTRACTION_MODEL: &str = "llama3.1";
pub const DEFAULT_EXTRACTION_TIMEOUT_SECS: u64 = 60;

// ── Storage ───────────────────────────────────────────────────────────────
pub const DEFAULT_COLLECTION: &str = "memories";

/// Timestamp format for every stored `created_at` column. Lexicographic
/// order equals chronological order, which the grooming cutoff relies on.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
