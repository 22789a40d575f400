//! Key/value storage backends.
//!
//! Every medium the cache writes to implements [`StorageBackend`]:
//!
//! - [`SqliteStorage`] for durable media, partitioned into a cross-session
//!   `local` area and per-tab `session:<id>` areas
//! - [`MemoryStorage`] for process-lifetime data
//! - [`CookieStorage`] for the small set of flow keys mirrored into cookies
//!
//! Reads are synchronous and never fail; a missing key is `None`.

pub mod cookies;
pub mod memory;
pub mod migrations;
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Error;
use crate::config::CacheConfig;

pub use cookies::{COOKIE_SIZE_LIMIT, CookieStorage};
pub use memory::MemoryStorage;
pub use sqlite::{Partition, SqliteStorage};

/// Physical medium backing a logical cache scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheLocation {
    /// Durable, shared by every session on the same store.
    LocalStorage,
    /// Durable, private to one session id.
    SessionStorage,
    /// Lost when the process exits.
    MemoryStorage,
}

/// Uniform key/value contract over one storage medium.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Prepare the medium for use. Idempotent.
    async fn initialize(&self) -> Result<(), Error> {
        Ok(())
    }

    fn get_item(&self, key: &str) -> Option<String>;

    fn set_item(&self, key: &str, value: &str) -> Result<(), Error>;

    /// Write path for accounts and tokens. Completes only once the value is
    /// durable on media that distinguish the two.
    async fn set_user_data(&self, key: &str, value: &str) -> Result<(), Error> {
        self.set_item(key, value)
    }

    /// Remove a key. Removing an absent key is a no-op.
    fn remove_item(&self, key: &str);

    fn keys(&self) -> Vec<String>;

    fn contains_key(&self, key: &str) -> bool {
        self.get_item(key).is_some()
    }

    fn clear(&self);

    /// Wait until every queued write has reached the medium.
    async fn flush(&self) -> Result<(), Error> {
        Ok(())
    }
}

/// The backends a cache manager works against, fixed at construction.
#[derive(Clone)]
pub struct CacheBackends {
    pub persistent: Arc<dyn StorageBackend>,
    pub temporary: Arc<dyn StorageBackend>,
    /// Process-lifetime scope for data that must not survive a reload.
    pub memory: Arc<MemoryStorage>,
    pub cookies: Arc<CookieStorage>,
}

impl CacheBackends {
    /// Open and initialize the backends selected by `config`.
    ///
    /// When the persistent and temporary scopes name the same medium they
    /// share one backend instance.
    pub async fn open(config: &CacheConfig) -> Result<Self, Error> {
        let persistent = open_backend(config.cache_location, config).await?;
        let temporary = if config.temporary_cache_location == config.cache_location {
            Arc::clone(&persistent)
        } else {
            open_backend(config.temporary_cache_location, config).await?
        };

        persistent.initialize().await?;
        temporary.initialize().await?;

        Ok(Self {
            persistent,
            temporary,
            memory: Arc::new(MemoryStorage::new()),
            cookies: Arc::new(CookieStorage::new(config.secure_cookies, config.cookie_life_days)),
        })
    }

    /// Memory-only backends, used for tests and private sessions.
    pub fn in_memory() -> Self {
        Self {
            persistent: Arc::new(MemoryStorage::new()),
            temporary: Arc::new(MemoryStorage::new()),
            memory: Arc::new(MemoryStorage::new()),
            cookies: Arc::new(CookieStorage::new(true, None)),
        }
    }
}

async fn open_backend(location: CacheLocation, config: &CacheConfig) -> Result<Arc<dyn StorageBackend>, Error> {
    let backend: Arc<dyn StorageBackend> = match location {
        CacheLocation::LocalStorage => Arc::new(SqliteStorage::open(&config.db_path, Partition::Local).await?),
        CacheLocation::SessionStorage => Arc::new(
            SqliteStorage::open(&config.db_path, Partition::Session(config.session_id.clone())).await?,
        ),
        CacheLocation::MemoryStorage => Arc::new(MemoryStorage::new()),
    };
    tracing::debug!(?location, "opened storage backend");
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_shares_backend_for_same_location() {
        let dir = tempfile::tempdir().unwrap();
        let config = CacheConfig {
            client_id: "client-a".into(),
            cache_location: CacheLocation::LocalStorage,
            temporary_cache_location: CacheLocation::LocalStorage,
            db_path: dir.path().join("cache.sqlite"),
            ..Default::default()
        };
        let backends = CacheBackends::open(&config).await.unwrap();
        backends.persistent.set_item("k", "v").unwrap();
        assert_eq!(backends.temporary.get_item("k").as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_open_separates_session_from_local() {
        let dir = tempfile::tempdir().unwrap();
        let config = CacheConfig {
            client_id: "client-a".into(),
            cache_location: CacheLocation::LocalStorage,
            temporary_cache_location: CacheLocation::SessionStorage,
            db_path: dir.path().join("cache.sqlite"),
            ..Default::default()
        };
        let backends = CacheBackends::open(&config).await.unwrap();
        backends.temporary.set_item("k", "v").unwrap();
        assert!(backends.persistent.get_item("k").is_none());
    }

    #[test]
    fn test_cache_location_serde() {
        let json = serde_json::to_string(&CacheLocation::SessionStorage).unwrap();
        assert_eq!(json, "\"session_storage\"");
    }
}
