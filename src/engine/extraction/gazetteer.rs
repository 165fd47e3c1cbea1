// ── Extraction: Gazetteer ───────────────────────────────────────────────────
//
// Offline extractor: a fixed name → type dictionary matched case-insensitively
// on word boundaries. Results come back in order of first appearance in the
// text and carry the dictionary's spelling of the name.

use super::{clean_entities, EntityExtractor};
use crate::atoms::error::EngineResult;
use crate::atoms::types::{EntityType, ExtractedEntity};
use async_trait::async_trait;

#[derive(Default)]
pub struct GazetteerExtractor {
    entries: Vec<(String, EntityType)>,
}

impl GazetteerExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, entity_type: EntityType) -> Self {
        self.insert(name, entity_type);
        self
    }

    pub fn insert(&mut self, name: &str, entity_type: EntityType) {
        let name = name.trim();
        if !name.is_empty() {
            self.entries.push((name.to_string(), entity_type));
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Synchronous matcher behind `extract`.
    pub fn find(&self, text: &str) -> Vec<ExtractedEntity> {
        let lower = text.to_lowercase();
        let mut hits: Vec<(usize, usize, ExtractedEntity)> = self
            .entries
            .iter()
            .enumerate()
            .filter_map(|(i, (name, ty))| {
                find_word_boundary(&lower, &name.to_lowercase())
                    .map(|pos| (pos, i, ExtractedEntity::new(name.clone(), *ty)))
            })
            .collect();
        hits.sort_by_key(|(pos, i, _)| (*pos, *i));
        clean_entities(hits.into_iter().map(|(_, _, e)| e).collect())
    }
}

#[async_trait]
impl EntityExtractor for GazetteerExtractor {
    async fn extract(&self, text: &str) -> EngineResult<Vec<ExtractedEntity>> {
        Ok(self.find(text))
    }
}

/// Byte offset of the first occurrence of `needle` not glued to other
/// alphanumerics.
fn find_word_boundary(haystack: &str, needle: &str) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    let mut start = 0;
    while let Some(pos) = haystack[start..].find(needle) {
        let abs = start + pos;
        let end = abs + needle.len();
        let before_ok = haystack[..abs]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let after_ok = haystack[end..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric());
        if before_ok && after_ok {
            return Some(abs);
        }
        // Advance one whole char so slicing stays on a boundary.
        start = abs + haystack[abs..].chars().next().map_or(1, char::len_utf8);
    }
    None
}
