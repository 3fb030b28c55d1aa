//! In-memory `LocalCache` used by tests and degraded sessions.

use super::{ensure_key_matches, CacheError, CacheKey, CacheResult, LocalCache};
use crate::model::goal_map::GoalMap;
use std::collections::BTreeMap;

/// Process-local snapshot cache.
///
/// Stores serialized payloads, like the durable backend, so that reads never
/// hand out aliases of session state.
#[derive(Debug, Default)]
pub struct InMemoryLocalCache {
    entries: BTreeMap<CacheKey, String>,
    fail_writes: bool,
    write_count: usize,
}

impl InMemoryLocalCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `set` fail with `CacheError::Unavailable`.
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// Number of successful writes since creation.
    pub fn write_count(&self) -> usize {
        self.write_count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stores `map` verbatim, bypassing key checks. Test seeding only.
    pub fn insert_raw(&mut self, key: CacheKey, map: &GoalMap) -> CacheResult<()> {
        self.entries.insert(key, serde_json::to_string(map)?);
        Ok(())
    }
}

impl LocalCache for InMemoryLocalCache {
    fn get(&self, key: &CacheKey) -> CacheResult<Option<GoalMap>> {
        let Some(payload) = self.entries.get(key) else {
            return Ok(None);
        };
        let map: GoalMap = serde_json::from_str(payload)?;
        ensure_key_matches(key, &map)?;
        Ok(Some(map))
    }

    fn set(&mut self, key: &CacheKey, map: &GoalMap) -> CacheResult<()> {
        if self.fail_writes {
            return Err(CacheError::Unavailable("writes disabled".to_string()));
        }
        ensure_key_matches(key, map)?;
        self.entries.insert(key.clone(), serde_json::to_string(map)?);
        self.write_count += 1;
        Ok(())
    }

    fn remove(&mut self, key: &CacheKey) -> CacheResult<bool> {
        Ok(self.entries.remove(key).is_some())
    }
}
