// engram-rag — graph-augmented memory retrieval over SQLite.
//
// Layering:
//   atoms/   pure constants, data types, errors (no I/O)
//   engine/  storage, models, graph, search, lifecycle

pub mod atoms;
pub mod engine;

pub use atoms::error::{EngineError, EngineResult};
pub use atoms::types::{
    Entity, EntityType, ExtractedEntity, GroomStats, HitSource, MaintenanceReport, Memory,
    MemoryType, Relationship, SearchHit,
};
pub use engine::config::EngineConfig;
pub use engine::state::MemoryEngine;
