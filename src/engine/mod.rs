// Engram RAG Engine — graph-augmented memory retrieval.
//
// store/      SQLite rows: memories, entities, relationships
// vector/     VectorIndex trait + SQLite and in-memory backends
// embedding/  Embedder trait, bounded pool, Ollama and hashing models
// extraction/ EntityExtractor trait, Ollama and gazetteer extractors
// graph       EntityGraph: dedup, weighted edges, traversal, inference
// search      GraphRagSearch: vector + entity expansion + boosted merge
// lifecycle   MemoryLifecycle: create, reindex, groom, decay
// config      EngineConfig (TOML)
// state       MemoryEngine: wires the components together

pub mod config;
pub mod embedding;
pub mod extraction;
pub mod graph;
pub mod lifecycle;
pub mod search;
pub mod state;
pub mod store;
pub mod vector;
