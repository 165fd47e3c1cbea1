// ── Store: Entity Rows ──────────────────────────────────────────────────────
//
// Plain CRUD over `entities`. Dedup policy lives in engine/graph.rs; this layer
// only reports a UNIQUE(name, entity_type) violation as `EngineError::Conflict`.

use super::embedding::{bytes_to_f32_vec, cosine_distance, f32_vec_to_bytes};
use super::Store;
use crate::atoms::error::{EngineError, EngineResult};
use crate::atoms::types::{Entity, EntityType, ScoredEntity};
use rusqlite::{params, OptionalExtension, Row};

const ENTITY_COLUMNS: &str = "id, name, entity_type, description, embedding, created_at";

impl Store {
    /// Insert a new entity. A duplicate (name, type) fails with `Conflict`.
    pub fn insert_entity(&self, entity: &Entity) -> EngineResult<()> {
        let conn = self.conn.lock();
        let embedding = if entity.embedding.is_empty() {
            None
        } else {
            Some(f32_vec_to_bytes(&entity.embedding))
        };
        conn.execute(
            "INSERT INTO entities (id, name, entity_type, description, embedding, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entity.id,
                entity.name,
                entity.entity_type.as_str(),
                entity.description,
                embedding,
                entity.created_at
            ],
        )?;
        Ok(())
    }

    /// Look up an entity by its natural key.
    pub fn find_entity(&self, name: &str, entity_type: EntityType) -> EngineResult<Option<Entity>> {
        let conn = self.conn.lock();
        let raw = conn
            .query_row(
                &format!("SELECT {ENTITY_COLUMNS} FROM entities WHERE name = ?1 AND entity_type = ?2"),
                params![name, entity_type.as_str()],
                raw_entity_from_row,
            )
            .optional()?;
        raw.map(RawEntity::into_entity).transpose()
    }

    /// Get an entity by ID.
    pub fn get_entity(&self, id: &str) -> EngineResult<Option<Entity>> {
        let conn = self.conn.lock();
        let raw = conn
            .query_row(
                &format!("SELECT {ENTITY_COLUMNS} FROM entities WHERE id = ?1"),
                params![id],
                raw_entity_from_row,
            )
            .optional()?;
        raw.map(RawEntity::into_entity).transpose()
    }

    /// Names for a set of entity ids, in creation order. Unknown ids are skipped.
    pub fn entity_names(&self, ids: &[String]) -> EngineResult<Vec<(String, String)>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn.lock();
        let placeholders = (1..=ids.len()).map(|i| format!("?{i}")).collect::<Vec<_>>().join(", ");
        let mut stmt = conn.prepare(&format!(
            "SELECT id, name FROM entities WHERE id IN ({placeholders})
             ORDER BY created_at, rowid"
        ))?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(ids.iter()), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Brute-force cosine scan over entity embeddings.
    /// Returns the `limit` closest entities, nearest first.
    pub fn search_entities_by_embedding(
        &self,
        query: &[f32],
        limit: usize,
    ) -> EngineResult<Vec<ScoredEntity>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let raw: Vec<RawEntity> = {
            let conn = self.conn.lock();
            let mut stmt = conn.prepare(&format!(
                "SELECT {ENTITY_COLUMNS} FROM entities
                 WHERE embedding IS NOT NULL ORDER BY created_at, rowid"
            ))?;
            let rows = stmt
                .query_map([], raw_entity_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        let mut scored = Vec::with_capacity(raw.len());
        for r in raw {
            let entity = r.into_entity()?;
            if entity.embedding.len() != query.len() {
                return Err(EngineError::DimensionMismatch {
                    expected: entity.embedding.len(),
                    actual: query.len(),
                });
            }
            let distance = cosine_distance(query, &entity.embedding);
            scored.push(ScoredEntity { entity, distance });
        }
        scored.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(limit);
        Ok(scored)
    }

    pub fn count_entities(&self) -> EngineResult<usize> {
        let conn = self.conn.lock();
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM entities", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

// ── Row mapping ─────────────────────────────────────────────────────────────

struct RawEntity {
    id: String,
    name: String,
    entity_type: String,
    description: String,
    embedding: Option<Vec<u8>>,
    created_at: String,
}

fn raw_entity_from_row(row: &Row<'_>) -> rusqlite::Result<RawEntity> {
    Ok(RawEntity {
        id: row.get(0)?,
        name: row.get(1)?,
        entity_type: row.get(2)?,
        description: row.get(3)?,
        embedding: row.get(4)?,
        created_at: row.get(5)?,
    })
}

impl RawEntity {
    fn into_entity(self) -> EngineResult<Entity> {
        let entity_type = EntityType::parse(&self.entity_type).ok_or_else(|| {
            EngineError::Other(format!(
                "entity {} has unknown type '{}'",
                self.id, self.entity_type
            ))
        })?;
        Ok(Entity {
            id: self.id,
            name: self.name,
            entity_type,
            description: self.description,
            embedding: self.embedding.as_deref().map(bytes_to_f32_vec).unwrap_or_default(),
            created_at: self.created_at,
        })
    }
}
