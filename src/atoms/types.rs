// ── Engram RAG Atoms: Data Types ───────────────────────────────────────────
//
// Records for the memory store, the entity graph, and search results.
// These are pure data types (no DB access, no I/O).
//
// Follows the project pattern: structs in atoms/, impls in engine/.

use crate::atoms::constants::SEMANTIC_KINDS;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ═══════════════════════════════════════════════════════════════════════════
// SECTION 1: Memories
// ═══════════════════════════════════════════════════════════════════════════

/// Semantic memories are durable facts; episodic ones are events that may be
/// forgotten by grooming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryType {
    Semantic,
    Episodic,
}

impl MemoryType {
    /// Classify a memory kind: {entity, summary, goal, habit, decision} are
    /// semantic, everything else is episodic.
    pub fn from_kind(kind: &str) -> Self {
        if SEMANTIC_KINDS.contains(&kind) {
            MemoryType::Semantic
        } else {
            MemoryType::Episodic
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryType::Semantic => "semantic",
            MemoryType::Episodic => "episodic",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "semantic" => Some(MemoryType::Semantic),
            "episodic" => Some(MemoryType::Episodic),
            _ => None,
        }
    }
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A timestamped fact or utterance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Memory {
    pub id: String,
    /// Free-form tag: "user_input", "summary", "entity", …
    pub kind: String,
    pub text: String,
    /// Ordered set: no duplicates, insertion order preserved.
    pub tags: Vec<String>,
    pub created_at: String,
    pub memory_type: MemoryType,
    /// Present once indexed. Rows loaded back from the store carry `None`;
    /// the vector lives in the index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// Remove duplicate tags, keeping the first occurrence of each.
pub fn dedup_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.into();
        if !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

// ═══════════════════════════════════════════════════════════════════════════
// SECTION 2: Entity Graph
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Person,
    Place,
    Organization,
    Concept,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Person => "person",
            EntityType::Place => "place",
            EntityType::Organization => "organization",
            EntityType::Concept => "concept",
        }
    }

    /// Lenient parse for extractor output. Unknown labels fall back to
    /// `Concept` so a creative NER model never drops an entity.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "person" | "people" | "per" => EntityType::Person,
            "place" | "location" | "loc" | "gpe" => EntityType::Place,
            "organization" | "organisation" | "org" | "company" => EntityType::Organization,
            _ => EntityType::Concept,
        }
    }

    /// Strict parse for values read back from the store.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "person" => Some(EntityType::Person),
            "place" => Some(EntityType::Place),
            "organization" => Some(EntityType::Organization),
            "concept" => Some(EntityType::Concept),
            _ => None,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A deduplicated named thing. (name, entity_type) is unique.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entity {
    pub id: String,
    pub name: String,
    pub entity_type: EntityType,
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embedding: Vec<f32>,
    pub created_at: String,
}

/// A directed, weighted edge. (from, to, relation_type) is unique.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Relationship {
    pub from_entity_id: String,
    pub to_entity_id: String,
    pub relation_type: String,
    pub weight: f64,
    pub created_at: String,
}

/// One `{name, type}` pair reported by an entity extractor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ExtractedEntity {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
}

impl ExtractedEntity {
    pub fn new(name: impl Into<String>, entity_type: EntityType) -> Self {
        Self { name: name.into(), entity_type }
    }
}

/// An entity paired with its cosine distance to a query embedding.
#[derive(Debug, Clone)]
pub struct ScoredEntity {
    pub entity: Entity,
    pub distance: f32,
}

// ═══════════════════════════════════════════════════════════════════════════
// SECTION 3: Vector Index & Search Results
// ═══════════════════════════════════════════════════════════════════════════

/// String-valued metadata attached to every indexed vector.
pub type Metadata = BTreeMap<String, String>;

/// Exact-equality filter; all fields must match (AND).
pub type MetadataFilter = BTreeMap<String, String>;

/// A raw nearest-neighbor hit from a `VectorIndex`.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
    /// Cosine distance: non-negative, lower = closer.
    pub distance: f32,
}

/// Where a search result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HitSource {
    Vector,
    Graph,
}

impl fmt::Display for HitSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HitSource::Vector => f.write_str("vector"),
            HitSource::Graph => f.write_str("graph"),
        }
    }
}

/// A ranked search result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
    /// Possibly boosted distance (graph hits are multiplied by the boost).
    pub distance: f32,
    pub source: HitSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_entity: Option<String>,
}

impl SearchHit {
    pub fn from_vector(hit: VectorHit) -> Self {
        Self {
            id: hit.id,
            text: hit.text,
            metadata: hit.metadata,
            distance: hit.distance,
            source: HitSource::Vector,
            matched_entity: None,
        }
    }

    pub fn from_graph(hit: VectorHit, entity_name: &str) -> Self {
        Self {
            id: hit.id,
            text: hit.text,
            metadata: hit.metadata,
            distance: hit.distance,
            source: HitSource::Graph,
            matched_entity: Some(entity_name.to_string()),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// SECTION 4: Maintenance & Stats
// ═══════════════════════════════════════════════════════════════════════════

/// Counts returned by a grooming pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroomStats {
    pub relationships_removed: usize,
    pub memories_removed: usize,
}

impl GroomStats {
    pub fn total(&self) -> usize {
        self.relationships_removed + self.memories_removed
    }
}

/// Outcome of one scheduled maintenance run (groom, then decay).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceReport {
    pub groom: GroomStats,
    pub relationships_decayed: usize,
}

/// Summary statistics for the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineStats {
    pub memories: usize,
    pub semantic: usize,
    pub episodic: usize,
    pub entities: usize,
    pub relationships: usize,
    pub indexed: usize,
}
