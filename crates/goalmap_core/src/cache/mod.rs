//! Durable, key-scoped local snapshot storage.
//!
//! # Responsibility
//! - Define the `LocalCache` contract used by the sync reconciler.
//! - Scope every snapshot by tool and project so projects never bleed into
//!   each other.
//!
//! # Invariants
//! - A key always renders as `<tool>:<project_id>`.
//! - A snapshot read for project A is never returned for project B.
//! - Writes store whole snapshots; there are no partial updates.

mod memory;
mod sqlite;

pub use memory::InMemoryLocalCache;
pub use sqlite::SqliteLocalCache;

use crate::db::DbError;
use crate::model::goal_map::GoalMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type CacheResult<T> = Result<T, CacheError>;

/// Planning tool that owns a cached snapshot.
///
/// Rendered into the key and stored in the `tool` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ToolKind {
    GoalMapping,
}

impl ToolKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GoalMapping => "goal_mapping",
        }
    }
}

/// Stable per-tool, per-project cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    tool: ToolKind,
    project_id: String,
}

impl CacheKey {
    pub fn new(tool: ToolKind, project_id: impl Into<String>) -> Self {
        Self {
            tool,
            project_id: project_id.into(),
        }
    }

    /// Key for the goal-mapping snapshot of `project_id`.
    pub fn goal_map(project_id: impl Into<String>) -> Self {
        Self::new(ToolKind::GoalMapping, project_id)
    }

    pub fn tool(&self) -> ToolKind {
        self.tool
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.tool.as_str(), self.project_id)
    }
}

/// Local persistence failure.
#[derive(Debug)]
pub enum CacheError {
    Db(DbError),
    Serialization(serde_json::Error),
    /// Stored payload does not match the key it was read under.
    InvalidData(String),
    /// Backend refused the operation (used by fakes and degraded backends).
    Unavailable(String),
}

impl Display for CacheError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Serialization(err) => write!(f, "cache payload serialization failed: {err}"),
            Self::InvalidData(message) => write!(f, "invalid cached goal map: {message}"),
            Self::Unavailable(message) => write!(f, "local cache unavailable: {message}"),
        }
    }
}

impl Error for CacheError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Serialization(err) => Some(err),
            Self::InvalidData(_) | Self::Unavailable(_) => None,
        }
    }
}

impl From<DbError> for CacheError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for CacheError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

/// Key-scoped snapshot storage for goal maps.
///
/// Reads and writes are synchronous and expected to be fast.
pub trait LocalCache {
    fn get(&self, key: &CacheKey) -> CacheResult<Option<GoalMap>>;
    fn set(&mut self, key: &CacheKey, map: &GoalMap) -> CacheResult<()>;
    fn remove(&mut self, key: &CacheKey) -> CacheResult<bool>;
}

impl<C: LocalCache + ?Sized> LocalCache for Box<C> {
    fn get(&self, key: &CacheKey) -> CacheResult<Option<GoalMap>> {
        (**self).get(key)
    }

    fn set(&mut self, key: &CacheKey, map: &GoalMap) -> CacheResult<()> {
        (**self).set(key, map)
    }

    fn remove(&mut self, key: &CacheKey) -> CacheResult<bool> {
        (**self).remove(key)
    }
}

/// Rejects snapshots whose `project_id` disagrees with the key.
pub(crate) fn ensure_key_matches(key: &CacheKey, map: &GoalMap) -> CacheResult<()> {
    if map.project_id != key.project_id() {
        return Err(CacheError::InvalidData(format!(
            "snapshot for project `{}` stored under key `{key}`",
            map.project_id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{CacheKey, ToolKind};

    #[test]
    fn keys_render_tool_and_project() {
        assert_eq!(CacheKey::goal_map("p-7").to_string(), "goal_mapping:p-7");
        assert_eq!(
            CacheKey::new(ToolKind::GoalMapping, "p-7"),
            CacheKey::goal_map("p-7")
        );
        assert_ne!(CacheKey::goal_map("a"), CacheKey::goal_map("b"));
    }
}
