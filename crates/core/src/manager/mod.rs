//! The cache manager.
//!
//! [`CacheManager`] owns the storage backends chosen for one client id and
//! exposes everything a sign-in flow needs from the cache:
//!
//! - account and credential CRUD with self-healing reads (`entities`)
//! - the active-account pointer (`active`)
//! - per-flow temporary records and the interaction lock (`request`)
//! - hydration from an externally obtained result (`hydrate`)
//! - bulk clear (`clear`)

mod active;
mod clear;
mod entities;
mod hydrate;
mod request;

use std::sync::Arc;

use crate::config::CacheConfig;
use crate::crypto::{CryptoProvider, DefaultCryptoProvider};
use crate::events::{CacheEvent, EventBus};
use crate::keys;
use crate::request_state::temporary_keys;
use crate::storage::{CacheBackends, StorageBackend};
use crate::store::{IndexedStore, WriteFailureDiagnostics};
use crate::Error;

pub use entities::AccessTokenQuery;
pub use hydrate::{AuthenticationResult, HydrationRequest};

/// Temporary-scope records mirrored into cookies when enabled.
const COOKIE_MIRRORED: [&str; 4] = [
    temporary_keys::REQUEST_STATE,
    temporary_keys::NONCE_ID_TOKEN,
    temporary_keys::AUTHORITY,
    temporary_keys::ORIGIN_URI,
];

/// Credential cache for one client id.
pub struct CacheManager {
    client_id: String,
    config: CacheConfig,
    backends: CacheBackends,
    persistent: IndexedStore,
    crypto: Arc<dyn CryptoProvider>,
    events: EventBus,
}

impl CacheManager {
    /// Build a manager over already-initialized backends.
    pub fn new(config: CacheConfig, backends: CacheBackends, crypto: Arc<dyn CryptoProvider>) -> Self {
        let persistent = IndexedStore::new(Arc::clone(&backends.persistent), &config.client_id);
        Self {
            client_id: config.client_id.clone(),
            config,
            backends,
            persistent,
            crypto,
            events: EventBus::new(),
        }
    }

    /// Open the backends named by `config` and build a manager with the
    /// default crypto provider.
    ///
    /// Access tokens cached with requested claims are dropped when
    /// claims-based caching is disabled.
    pub async fn open(config: CacheConfig) -> Result<Self, Error> {
        let backends = CacheBackends::open(&config).await?;
        let manager = Self::new(config, backends, Arc::new(DefaultCryptoProvider));
        if !manager.config.claims_based_caching_enabled {
            manager.clear_tokens_and_keys_with_claims()?;
        }
        tracing::debug!(
            client_id = %manager.client_id,
            cache_location = ?manager.config.cache_location,
            temporary_cache_location = ?manager.config.temporary_cache_location,
            "cache manager ready"
        );
        Ok(manager)
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn backends(&self) -> &CacheBackends {
        &self.backends
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    /// Index sizes captured at the most recent failed entity write.
    pub fn last_write_failure(&self) -> Option<WriteFailureDiagnostics> {
        self.persistent.last_write_failure()
    }

    /// Namespace `name` under this client id. Keys already carrying the
    /// cache prefix are returned unchanged.
    pub fn generate_cache_key(&self, name: &str) -> String {
        if name.starts_with(keys::CACHE_PREFIX) {
            name.to_string()
        } else {
            format!("{}.{}.{name}", keys::CACHE_PREFIX, self.client_id)
        }
    }

    /// Write a temporary-scope record, mirroring correlation keys into
    /// cookies when configured.
    pub fn set_temporary_cache(&self, key: &str, value: &str, generate_key: bool) -> Result<(), Error> {
        let key = if generate_key { self.generate_cache_key(key) } else { key.to_string() };
        self.backends.temporary.set_item(&key, value)?;

        if self.config.store_auth_state_in_cookie
            && self.is_cookie_mirrored(&key)
            && let Err(err) = self.backends.cookies.set_item(&key, value)
        {
            tracing::warn!(key = %key, error = %err, "could not mirror flow record into cookie");
        }
        Ok(())
    }

    /// Read a temporary-scope record: cookie mirror first, then the temporary
    /// backend, then the shared persistent backend older releases wrote to.
    pub fn get_temporary_cache(&self, key: &str, generate_key: bool) -> Option<String> {
        let key = if generate_key { self.generate_cache_key(key) } else { key.to_string() };

        if self.config.store_auth_state_in_cookie
            && let Some(value) = self.backends.cookies.get_item(&key)
        {
            return Some(value);
        }

        if let Some(value) = self.backends.temporary.get_item(&key) {
            return Some(value);
        }

        if self.has_legacy_location() {
            let legacy = self.backends.persistent.get_item(&key);
            if legacy.is_some() {
                tracing::warn!(key = %key, "flow record found in persistent scope, using legacy location");
            }
            return legacy;
        }
        None
    }

    /// Remove a temporary-scope record, its cookie mirror and any copy in
    /// the legacy persistent location. `key` is used as given.
    pub fn remove_temporary_item(&self, key: &str) {
        self.backends.temporary.remove_item(key);
        if self.config.store_auth_state_in_cookie {
            self.backends.cookies.remove_item(key);
        }
        if self.has_legacy_location() {
            self.backends.persistent.remove_item(key);
        }
    }

    /// Whether flow records may also sit in the persistent backend, where
    /// older releases wrote them.
    fn has_legacy_location(&self) -> bool {
        self.config.persistent_is_shared() && !Arc::ptr_eq(&self.backends.persistent, &self.backends.temporary)
    }

    fn is_cookie_mirrored(&self, key: &str) -> bool {
        let namespace = format!("{}.{}.", keys::CACHE_PREFIX, self.client_id);
        key.strip_prefix(&namespace)
            .is_some_and(|name| COOKIE_MIRRORED.iter().any(|mirrored| name.starts_with(mirrored)))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::storage::{CacheLocation, MemoryStorage};

    pub(crate) fn manager() -> CacheManager {
        CacheManager::new(
            CacheConfig::for_client("client-a"),
            CacheBackends::in_memory(),
            Arc::new(DefaultCryptoProvider),
        )
    }

    pub(crate) fn manager_with(config: CacheConfig, backends: CacheBackends) -> CacheManager {
        CacheManager::new(config, backends, Arc::new(DefaultCryptoProvider))
    }

    #[test]
    fn test_generate_cache_key() {
        let manager = manager();
        assert_eq!(manager.generate_cache_key("request.params"), "tokenstash.client-a.request.params");
        assert_eq!(manager.generate_cache_key("tokenstash.interaction.status"), "tokenstash.interaction.status");
    }

    #[test]
    fn test_temporary_cache_mirrors_correlation_keys() {
        let config = CacheConfig { store_auth_state_in_cookie: true, ..CacheConfig::for_client("client-a") };
        let manager = manager_with(config, CacheBackends::in_memory());

        manager.set_temporary_cache("request.state.abc", "blob", true).unwrap();
        manager.set_temporary_cache("request.params", "params", true).unwrap();

        let cookies = &manager.backends().cookies;
        assert_eq!(cookies.get_item("tokenstash.client-a.request.state.abc").as_deref(), Some("blob"));
        assert!(cookies.get_item("tokenstash.client-a.request.params").is_none());

        manager.backends().temporary.remove_item("tokenstash.client-a.request.state.abc");
        assert_eq!(manager.get_temporary_cache("request.state.abc", true).as_deref(), Some("blob"));

        manager.remove_temporary_item("tokenstash.client-a.request.state.abc");
        assert!(manager.get_temporary_cache("request.state.abc", true).is_none());
    }

    #[test]
    fn test_temporary_cache_legacy_fallback() {
        let persistent = Arc::new(MemoryStorage::new());
        let backends = CacheBackends {
            persistent: persistent.clone(),
            temporary: Arc::new(MemoryStorage::new()),
            ..CacheBackends::in_memory()
        };
        let config = CacheConfig { cache_location: CacheLocation::LocalStorage, ..CacheConfig::for_client("client-a") };
        let manager = manager_with(config, backends);

        persistent.set_item("tokenstash.client-a.request.origin", "https://app/").unwrap();
        assert_eq!(manager.get_temporary_cache("request.origin", true).as_deref(), Some("https://app/"));
    }

    #[test]
    fn test_remove_reaches_legacy_location() {
        let persistent = Arc::new(MemoryStorage::new());
        let backends = CacheBackends {
            persistent: persistent.clone(),
            temporary: Arc::new(MemoryStorage::new()),
            ..CacheBackends::in_memory()
        };
        let config = CacheConfig { cache_location: CacheLocation::LocalStorage, ..CacheConfig::for_client("client-a") };
        let manager = manager_with(config, backends);

        persistent.set_item("tokenstash.client-a.request.origin", "https://app/").unwrap();
        manager.remove_temporary_item("tokenstash.client-a.request.origin");

        assert!(persistent.is_empty());
        assert!(manager.get_temporary_cache("request.origin", true).is_none());
    }

    #[test]
    fn test_no_legacy_fallback_for_session_persistence() {
        let persistent = Arc::new(MemoryStorage::new());
        let backends = CacheBackends {
            persistent: persistent.clone(),
            temporary: Arc::new(MemoryStorage::new()),
            ..CacheBackends::in_memory()
        };
        let manager = manager_with(CacheConfig::for_client("client-a"), backends);

        persistent.set_item("tokenstash.client-a.request.origin", "https://app/").unwrap();
        assert!(manager.get_temporary_cache("request.origin", true).is_none());
    }
}
