//! SQLite-backed `LocalCache`.

use super::{ensure_key_matches, CacheKey, CacheResult, LocalCache};
use crate::db::{open_db, open_db_in_memory};
use crate::model::goal_map::GoalMap;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// Durable snapshot cache stored in the `goal_map_cache` table.
pub struct SqliteLocalCache {
    conn: Connection,
}

impl SqliteLocalCache {
    /// Wraps an already migrated connection.
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Opens (and migrates) the cache database at `path`.
    pub fn open(path: impl AsRef<Path>) -> CacheResult<Self> {
        Ok(Self::new(open_db(path)?))
    }

    /// Opens a throwaway in-memory cache database.
    pub fn open_in_memory() -> CacheResult<Self> {
        Ok(Self::new(open_db_in_memory()?))
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl LocalCache for SqliteLocalCache {
    fn get(&self, key: &CacheKey) -> CacheResult<Option<GoalMap>> {
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT payload FROM goal_map_cache WHERE cache_key = ?1;",
                [key.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        let Some(payload) = payload else {
            return Ok(None);
        };
        let map: GoalMap = serde_json::from_str(&payload)?;
        ensure_key_matches(key, &map)?;
        Ok(Some(map))
    }

    fn set(&mut self, key: &CacheKey, map: &GoalMap) -> CacheResult<()> {
        ensure_key_matches(key, map)?;
        let payload = serde_json::to_string(map)?;
        let revision = i64::try_from(map.revision).unwrap_or(i64::MAX);

        self.conn.execute(
            "INSERT INTO goal_map_cache (cache_key, tool, project_id, payload, revision)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(cache_key) DO UPDATE SET
                payload = excluded.payload,
                revision = excluded.revision,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![
                key.to_string(),
                key.tool().as_str(),
                key.project_id(),
                payload,
                revision,
            ],
        )?;
        Ok(())
    }

    fn remove(&mut self, key: &CacheKey) -> CacheResult<bool> {
        let changed = self.conn.execute(
            "DELETE FROM goal_map_cache WHERE cache_key = ?1;",
            [key.to_string()],
        )?;
        Ok(changed > 0)
    }
}
