//! Builds a production reconciler from `CoreConfig`.

use crate::cache::{CacheError, InMemoryLocalCache, LocalCache, SqliteLocalCache};
use crate::config::CoreConfig;
use crate::remote::{HttpRemoteStore, RemoteError, RemoteStore};
use crate::sync::SyncReconciler;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Type-erased cache usable behind a process-wide lock.
pub type DynLocalCache = Box<dyn LocalCache + Send>;
/// Type-erased remote store usable behind a process-wide lock.
pub type DynRemoteStore = Box<dyn RemoteStore + Send + Sync>;
/// Reconciler wired with erased collaborators.
pub type DynReconciler = SyncReconciler<DynLocalCache, DynRemoteStore>;

#[derive(Debug)]
pub enum BootstrapError {
    Cache(CacheError),
    Remote(RemoteError),
}

impl Display for BootstrapError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cache(err) => write!(f, "cannot open local cache: {err}"),
            Self::Remote(err) => write!(f, "cannot build remote client: {err}"),
        }
    }
}

impl Error for BootstrapError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Cache(err) => Some(err),
            Self::Remote(err) => Some(err),
        }
    }
}

impl From<CacheError> for BootstrapError {
    fn from(value: CacheError) -> Self {
        Self::Cache(value)
    }
}

impl From<RemoteError> for BootstrapError {
    fn from(value: RemoteError) -> Self {
        Self::Remote(value)
    }
}

/// Opens the configured cache (SQLite file, or memory when unset).
pub fn open_cache(config: &CoreConfig) -> Result<DynLocalCache, CacheError> {
    match &config.cache_db_path {
        Some(path) => Ok(Box::new(SqliteLocalCache::open(path)?)),
        None => Ok(Box::new(InMemoryLocalCache::new())),
    }
}

/// Wires cache, HTTP client and map defaults into a reconciler.
pub fn reconciler_from_config(config: &CoreConfig) -> Result<DynReconciler, BootstrapError> {
    let cache = open_cache(config)?;
    let remote: DynRemoteStore = Box::new(HttpRemoteStore::new(&config.remote)?);
    info!(
        "event=reconciler_init module=core status=ok cache={}",
        if config.cache_db_path.is_some() {
            "sqlite"
        } else {
            "memory"
        }
    );
    Ok(SyncReconciler::new(cache, remote).with_default_map_name(config.default_map_name.clone()))
}
