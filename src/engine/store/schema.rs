// Database schema and migrations for the relational store.
// Called once by Store::open() after WAL is enabled.
// Adding a new table or column: append an idempotent CREATE TABLE IF NOT EXISTS
// or ALTER TABLE … ADD COLUMN (errors are silently swallowed) at the end of
// run_migrations(). Never modify existing SQL to keep upgrade paths clean.
//
// The UNIQUE constraints on entities(name, entity_type) and
// relationships(from_entity_id, to_entity_id, relation_type) are load-bearing:
// concurrent check-then-insert callers rely on the losing insert failing.

use crate::atoms::error::EngineResult;
use log::info;
use rusqlite::Connection;

pub(crate) fn run_migrations(conn: &Connection) -> EngineResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS memories (
            id TEXT PRIMARY KEY,
            kind TEXT NOT NULL,
            text TEXT NOT NULL,
            tags TEXT NOT NULL DEFAULT '[]',
            memory_type TEXT NOT NULL DEFAULT 'episodic',
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_memories_type_created
            ON memories(memory_type, created_at);

        CREATE TABLE IF NOT EXISTS memory_tags (
            memory_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            tag TEXT NOT NULL,
            PRIMARY KEY (memory_id, position)
        );

        CREATE INDEX IF NOT EXISTS idx_memory_tags_tag ON memory_tags(tag);

        CREATE TABLE IF NOT EXISTS entities (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            embedding BLOB,
            created_at TEXT NOT NULL,
            UNIQUE (name, entity_type)
        );

        CREATE TABLE IF NOT EXISTS relationships (
            from_entity_id TEXT NOT NULL,
            to_entity_id TEXT NOT NULL,
            relation_type TEXT NOT NULL,
            weight REAL NOT NULL DEFAULT 1.0,
            created_at TEXT NOT NULL,
            UNIQUE (from_entity_id, to_entity_id, relation_type)
        );

        CREATE INDEX IF NOT EXISTS idx_relationships_to
            ON relationships(to_entity_id);
        ",
    )?;

    info!("[store] Schema migrations complete");
    Ok(())
}
