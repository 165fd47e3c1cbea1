// Engram RAG — Entity Extraction
//
// Named-entity recognition is an external capability behind the
// `EntityExtractor` trait. The lifecycle only calls it for `user_input`
// memories and treats any failure as "no entities".
//
// Module layout:
//   ollama.rs    — LLM extraction through Ollama's chat API (JSON mode)
//   gazetteer.rs — offline dictionary matcher

use crate::atoms::error::EngineResult;
use crate::atoms::types::ExtractedEntity;
use async_trait::async_trait;

pub mod gazetteer;
pub mod ollama;

pub use gazetteer::GazetteerExtractor;
pub use ollama::OllamaEntityExtractor;

#[async_trait]
pub trait EntityExtractor: Send + Sync {
    /// Named entities found in `text`. An empty list is a valid answer.
    async fn extract(&self, text: &str) -> EngineResult<Vec<ExtractedEntity>>;
}

/// Drop blank names and repeated (name, type) pairs, keeping first-seen order.
pub(crate) fn clean_entities(raw: Vec<ExtractedEntity>) -> Vec<ExtractedEntity> {
    let mut out: Vec<ExtractedEntity> = Vec::with_capacity(raw.len());
    for mut e in raw {
        e.name = e.name.trim().to_string();
        if e.name.is_empty() || out.contains(&e) {
            continue;
        }
        out.push(e);
    }
    out
}
