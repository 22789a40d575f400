//! Typed entity persistence.
//!
//! [`EntityStore`] reads and writes any [`CacheEntity`] through one backend.
//! [`IndexedStore`] wraps it for [`IndexedEntity`] types, keeping the key
//! index in step with every write and removal and purging index entries
//! whose backing value is gone or corrupt.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::entities::{CacheEntity, CredentialType, Decoded, IndexedEntity, decode};
use crate::index::{IndexSlot, KeyIndexMaps};
use crate::storage::StorageBackend;
use crate::Error;

/// Index sizes captured when a backing write fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteFailureDiagnostics {
    pub key: String,
    pub error_code: &'static str,
    pub account_keys: usize,
    pub id_token_keys: usize,
    pub access_token_keys: usize,
    pub refresh_token_keys: usize,
}

/// JSON entity reads and writes against a single backend.
#[derive(Clone)]
pub struct EntityStore {
    backend: Arc<dyn StorageBackend>,
}

impl EntityStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// `None` when the key is absent.
    pub fn read<T: CacheEntity>(&self, key: &str) -> Option<Decoded<T>> {
        self.backend.get_item(key).map(|raw| decode::<T>(&raw))
    }

    /// Read and keep only a valid entity.
    pub fn read_valid<T: CacheEntity>(&self, key: &str) -> Option<T> {
        self.read::<T>(key).and_then(Decoded::valid)
    }

    /// Durable write, through the backend's user-data path.
    pub async fn write<T: CacheEntity>(&self, key: &str, entity: &T) -> Result<(), Error> {
        let value = serde_json::to_string(entity)?;
        self.backend.set_user_data(key, &value).await
    }

    /// Immediate write for small bookkeeping entities.
    pub fn put<T: CacheEntity>(&self, key: &str, entity: &T) -> Result<(), Error> {
        let value = serde_json::to_string(entity)?;
        self.backend.set_item(key, &value)
    }

    pub fn remove(&self, key: &str) {
        self.backend.remove_item(key);
    }
}

/// An [`EntityStore`] that maintains the key index around it.
pub struct IndexedStore {
    store: EntityStore,
    index: KeyIndexMaps,
    last_write_failure: Mutex<Option<WriteFailureDiagnostics>>,
}

impl IndexedStore {
    pub fn new(backend: Arc<dyn StorageBackend>, client_id: &str) -> Self {
        Self {
            index: KeyIndexMaps::new(Arc::clone(&backend), client_id),
            store: EntityStore::new(backend),
            last_write_failure: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn index(&self) -> &KeyIndexMaps {
        &self.index
    }

    /// Read an indexed entity, purging its index entry when the stored value
    /// is missing or does not decode as `T`.
    pub fn get<T: IndexedEntity>(&self, key: &str) -> Option<T> {
        match self.store.read::<T>(key) {
            Some(Decoded::Valid(entity)) => Some(entity),
            Some(Decoded::Invalid(reason)) => {
                self.purge(T::SLOT, key, reason);
                None
            }
            None => {
                self.purge(T::SLOT, key, "missing");
                None
            }
        }
    }

    /// Write `entity` under its canonical key, then index the key.
    ///
    /// Returns the key and whether it was newly indexed. When indexing fails
    /// the value is removed again so no unindexed entry is left behind.
    pub async fn set<T: IndexedEntity>(&self, entity: &T) -> Result<(String, bool), Error> {
        let key = entity.cache_key();
        if let Err(err) = self.store.write(&key, entity).await {
            self.record_write_failure(&key, &err);
            return Err(err);
        }
        match self.index.add(T::SLOT, &key) {
            Ok(added) => Ok((key, added)),
            Err(err) => {
                self.record_write_failure(&key, &err);
                self.store.remove(&key);
                Err(err)
            }
        }
    }

    /// Remove the value, then its index entry.
    pub fn remove(&self, slot: IndexSlot, key: &str) -> Result<(), Error> {
        self.store.remove(key);
        self.index.remove(slot, key)
    }

    pub fn last_write_failure(&self) -> Option<WriteFailureDiagnostics> {
        self.last_write_failure.lock().clone()
    }

    fn purge(&self, slot: IndexSlot, key: &str, reason: &str) {
        tracing::debug!(key, reason, ?slot, "purging stale index entry");
        if let Err(err) = self.index.remove(slot, key) {
            tracing::warn!(key, error = %err, "failed to purge stale index entry");
        }
    }

    fn record_write_failure(&self, key: &str, err: &Error) {
        let tokens = self.index.token_keys();
        let diagnostics = WriteFailureDiagnostics {
            key: key.to_string(),
            error_code: err.code(),
            account_keys: self.index.account_keys().len(),
            id_token_keys: tokens.id_token.len(),
            access_token_keys: tokens.access_token.len(),
            refresh_token_keys: tokens.refresh_token.len(),
        };
        tracing::error!(
            key,
            error = %err,
            account_keys = diagnostics.account_keys,
            id_token_keys = diagnostics.id_token_keys,
            access_token_keys = diagnostics.access_token_keys,
            refresh_token_keys = diagnostics.refresh_token_keys,
            "cache write failed"
        );
        *self.last_write_failure.lock() = Some(diagnostics);
    }
}

/// Index slot for a credential category. Scheme-bound access tokens share
/// the access token list.
pub(crate) fn token_slot(credential_type: CredentialType) -> IndexSlot {
    match credential_type {
        CredentialType::AccessTokenWithAuthScheme => IndexSlot::Tokens(CredentialType::AccessToken),
        other => IndexSlot::Tokens(other),
    }
}
