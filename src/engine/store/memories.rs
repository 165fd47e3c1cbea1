// ── Store: Memory Rows ──────────────────────────────────────────────────────
//
// Memory rows plus the `memory_tags` table, which indexes every tag so that
// `recent(context_id)` and the grooming cross-reference check are lookups
// rather than JSON scans. The `tags` JSON column keeps the ordered set.

use super::Store;
use crate::atoms::error::{EngineError, EngineResult};
use crate::atoms::types::{Memory, MemoryType};
use rusqlite::{params, OptionalExtension, Row};

impl Store {
    /// Insert a new memory row and its tag index entries atomically.
    pub fn insert_memory(&self, mem: &Memory) -> EngineResult<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let tags_json = serde_json::to_string(&mem.tags)?;
        tx.execute(
            "INSERT INTO memories (id, kind, text, tags, memory_type, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                mem.id,
                mem.kind,
                mem.text,
                tags_json,
                mem.memory_type.as_str(),
                mem.created_at
            ],
        )?;
        for (position, tag) in mem.tags.iter().enumerate() {
            tx.execute(
                "INSERT INTO memory_tags (memory_id, position, tag) VALUES (?1, ?2, ?3)",
                params![mem.id, position as i64, tag],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Get a memory by ID.
    pub fn get_memory(&self, id: &str) -> EngineResult<Option<Memory>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT id, kind, text, tags, memory_type, created_at
                 FROM memories WHERE id = ?1",
                params![id],
                raw_memory_from_row,
            )
            .optional()?;
        row.map(RawMemory::into_memory).transpose()
    }

    /// Delete a memory and its tag rows. Returns whether a row was removed.
    pub fn delete_memory(&self, id: &str) -> EngineResult<bool> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM memory_tags WHERE memory_id = ?1", params![id])?;
        let removed = tx.execute("DELETE FROM memories WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok(removed > 0)
    }

    /// Newest-first memories carrying `tag`.
    pub fn recent_by_tag(&self, tag: &str, limit: usize) -> EngineResult<Vec<Memory>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT m.id, m.kind, m.text, m.tags, m.memory_type, m.created_at
             FROM memories m
             WHERE EXISTS (SELECT 1 FROM memory_tags t WHERE t.memory_id = m.id AND t.tag = ?1)
             ORDER BY m.created_at DESC, m.rowid DESC
             LIMIT ?2",
        )?;
        let raw: Vec<RawMemory> = stmt
            .query_map(params![tag, limit as i64], raw_memory_from_row)?
            .collect::<Result<_, _>>()?;
        raw.into_iter().map(RawMemory::into_memory).collect()
    }

    /// Episodic memories created before `cutoff` that no other memory
    /// references by carrying their id as a tag.
    pub fn list_forgettable_episodic(&self, cutoff: &str) -> EngineResult<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT m.id FROM memories m
             WHERE m.memory_type = 'episodic'
               AND m.created_at < ?1
               AND NOT EXISTS (
                   SELECT 1 FROM memory_tags t
                   WHERE t.tag = m.id AND t.memory_id != m.id
               )
             ORDER BY m.created_at",
        )?;
        let ids = stmt
            .query_map(params![cutoff], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    /// All memory ids, oldest first.
    pub fn list_memory_ids(&self) -> EngineResult<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT id FROM memories ORDER BY created_at, rowid")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    /// Count memories as (total, semantic, episodic).
    pub fn count_memories(&self) -> EngineResult<(usize, usize, usize)> {
        let conn = self.conn.lock();
        let (semantic, episodic): (i64, i64) = conn.query_row(
            "SELECT
                COALESCE(SUM(CASE WHEN memory_type = 'semantic' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN memory_type = 'episodic' THEN 1 ELSE 0 END), 0)
             FROM memories",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(((semantic + episodic) as usize, semantic as usize, episodic as usize))
    }
}

// ── Row mapping ─────────────────────────────────────────────────────────────

struct RawMemory {
    id: String,
    kind: String,
    text: String,
    tags: String,
    memory_type: String,
    created_at: String,
}

fn raw_memory_from_row(row: &Row<'_>) -> rusqlite::Result<RawMemory> {
    Ok(RawMemory {
        id: row.get(0)?,
        kind: row.get(1)?,
        text: row.get(2)?,
        tags: row.get(3)?,
        memory_type: row.get(4)?,
        created_at: row.get(5)?,
    })
}

impl RawMemory {
    fn into_memory(self) -> EngineResult<Memory> {
        let memory_type = MemoryType::parse(&self.memory_type).ok_or_else(|| {
            EngineError::Other(format!(
                "memory {} has unknown memory_type '{}'",
                self.id, self.memory_type
            ))
        })?;
        Ok(Memory {
            tags: serde_json::from_str(&self.tags)?,
            id: self.id,
            kind: self.kind,
            text: self.text,
            created_at: self.created_at,
            memory_type,
            embedding: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::store::{now_timestamp, timestamp_days_ago};

    fn memory(id: &str, kind: &str, tags: &[&str], created_at: String) -> Memory {
        Memory {
            id: id.into(),
            kind: kind.into(),
            text: format!("text of {id}"),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            created_at,
            memory_type: MemoryType::from_kind(kind),
            embedding: None,
        }
    }

    #[test]
    fn insert_get_delete() {
        let store = Store::open_in_memory().unwrap();
        let m = memory("m1", "user_input", &["chat", "default"], now_timestamp());
        store.insert_memory(&m).unwrap();

        let loaded = store.get_memory("m1").unwrap().unwrap();
        assert_eq!(loaded, m);

        assert!(store.delete_memory("m1").unwrap());
        assert!(store.get_memory("m1").unwrap().is_none());
        assert!(!store.delete_memory("m1").unwrap());
    }

    #[test]
    fn duplicate_id_is_conflict() {
        let store = Store::open_in_memory().unwrap();
        let m = memory("m1", "note", &[], now_timestamp());
        store.insert_memory(&m).unwrap();
        assert!(store.insert_memory(&m).unwrap_err().is_conflict());
    }

    #[test]
    fn recent_by_tag_newest_first() {
        let store = Store::open_in_memory().unwrap();
        store.insert_memory(&memory("old", "note", &["ctx"], timestamp_days_ago(2))).unwrap();
        store.insert_memory(&memory("new", "note", &["ctx"], now_timestamp())).unwrap();
        store.insert_memory(&memory("other", "note", &["elsewhere"], now_timestamp())).unwrap();

        let recent = store.recent_by_tag("ctx", 10).unwrap();
        let ids: Vec<&str> = recent.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old"]);
        assert_eq!(store.recent_by_tag("ctx", 1).unwrap().len(), 1);
    }

    #[test]
    fn forgettable_skips_semantic_recent_and_referenced() {
        let store = Store::open_in_memory().unwrap();
        let old = timestamp_days_ago(120);
        store.insert_memory(&memory("stale", "user_input", &[], old.clone())).unwrap();
        store.insert_memory(&memory("fact", "summary", &[], old.clone())).unwrap();
        store.insert_memory(&memory("pinned", "user_input", &[], old.clone())).unwrap();
        store.insert_memory(&memory("fresh", "user_input", &[], now_timestamp())).unwrap();
        // A later summary points at "pinned" by id.
        store.insert_memory(&memory("s2", "summary", &["summary", "pinned"], now_timestamp())).unwrap();

        let cutoff = timestamp_days_ago(90);
        let ids = store.list_forgettable_episodic(&cutoff).unwrap();
        assert_eq!(ids, vec!["stale".to_string()]);
    }

    #[test]
    fn counts_by_type() {
        let store = Store::open_in_memory().unwrap();
        store.insert_memory(&memory("a", "summary", &[], now_timestamp())).unwrap();
        store.insert_memory(&memory("b", "user_input", &[], now_timestamp())).unwrap();
        store.insert_memory(&memory("c", "brief", &[], now_timestamp())).unwrap();
        assert_eq!(store.count_memories().unwrap(), (3, 1, 2));
    }
}
