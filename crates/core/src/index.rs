//! Key index maps.
//!
//! Secondary lists of the entity keys currently held in the persistent
//! backend, stored as JSON arrays inside that same backend. Accounts share
//! one slot across client ids; tokens have a per-client slot holding one
//! list per credential category.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::entities::CredentialType;
use crate::storage::StorageBackend;
use crate::{Error, keys};

/// Which key list an entity is tracked in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexSlot {
    Accounts,
    Tokens(CredentialType),
}

/// Token key lists for one client id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenKeys {
    pub id_token: Vec<String>,
    pub access_token: Vec<String>,
    pub refresh_token: Vec<String>,
}

impl TokenKeys {
    pub fn bucket(&self, credential_type: CredentialType) -> Result<&Vec<String>, Error> {
        match credential_type {
            CredentialType::IdToken => Ok(&self.id_token),
            CredentialType::AccessToken => Ok(&self.access_token),
            CredentialType::RefreshToken => Ok(&self.refresh_token),
            other => Err(Error::UnexpectedCredentialType(other)),
        }
    }

    fn bucket_mut(&mut self, credential_type: CredentialType) -> Result<&mut Vec<String>, Error> {
        match credential_type {
            CredentialType::IdToken => Ok(&mut self.id_token),
            CredentialType::AccessToken => Ok(&mut self.access_token),
            CredentialType::RefreshToken => Ok(&mut self.refresh_token),
            other => Err(Error::UnexpectedCredentialType(other)),
        }
    }

    pub fn len(&self) -> usize {
        self.id_token.len() + self.access_token.len() + self.refresh_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Reads and maintains the key index slots of one client id.
pub struct KeyIndexMaps {
    storage: Arc<dyn StorageBackend>,
    token_slot: String,
}

impl KeyIndexMaps {
    pub fn new(storage: Arc<dyn StorageBackend>, client_id: &str) -> Self {
        Self { storage, token_slot: format!("{}.{}.{client_id}", keys::CACHE_PREFIX, keys::TOKEN_KEYS) }
    }

    pub fn account_keys(&self) -> Vec<String> {
        let Some(raw) = self.storage.get_item(keys::ACCOUNT_KEYS) else {
            return Vec::new();
        };
        serde_json::from_str(&raw).unwrap_or_else(|err| {
            tracing::error!(slot = keys::ACCOUNT_KEYS, error = %err, "malformed account key index, treating as empty");
            Vec::new()
        })
    }

    pub fn token_keys(&self) -> TokenKeys {
        let Some(raw) = self.storage.get_item(&self.token_slot) else {
            return TokenKeys::default();
        };
        serde_json::from_str(&raw).unwrap_or_else(|err| {
            tracing::error!(slot = %self.token_slot, error = %err, "malformed token key index, treating as empty");
            TokenKeys::default()
        })
    }

    /// Keys tracked in `slot`.
    pub fn keys(&self, slot: IndexSlot) -> Result<Vec<String>, Error> {
        match slot {
            IndexSlot::Accounts => Ok(self.account_keys()),
            IndexSlot::Tokens(credential_type) => Ok(self.token_keys().bucket(credential_type)?.clone()),
        }
    }

    /// Append `key` to `slot` if absent. Returns whether it was added.
    pub fn add(&self, slot: IndexSlot, key: &str) -> Result<bool, Error> {
        match slot {
            IndexSlot::Accounts => self.add_account_key(key),
            IndexSlot::Tokens(credential_type) => self.add_token_key(key, credential_type),
        }
    }

    /// Remove the first occurrence of `key` from `slot`.
    pub fn remove(&self, slot: IndexSlot, key: &str) -> Result<(), Error> {
        match slot {
            IndexSlot::Accounts => self.remove_account_key(key),
            IndexSlot::Tokens(credential_type) => self.remove_token_key(key, credential_type),
        }
    }

    pub fn add_account_key(&self, key: &str) -> Result<bool, Error> {
        let mut account_keys = self.account_keys();
        if account_keys.iter().any(|k| k == key) {
            return Ok(false);
        }
        account_keys.push(key.to_string());
        self.storage.set_item(keys::ACCOUNT_KEYS, &serde_json::to_string(&account_keys)?)?;
        tracing::debug!(key, "account key indexed");
        Ok(true)
    }

    pub fn remove_account_key(&self, key: &str) -> Result<(), Error> {
        let mut account_keys = self.account_keys();
        if let Some(pos) = account_keys.iter().position(|k| k == key) {
            account_keys.remove(pos);
        }
        self.storage.set_item(keys::ACCOUNT_KEYS, &serde_json::to_string(&account_keys)?)
    }

    pub fn add_token_key(&self, key: &str, credential_type: CredentialType) -> Result<bool, Error> {
        let mut token_keys = self.token_keys();
        let bucket = token_keys.bucket_mut(credential_type)?;
        if bucket.iter().any(|k| k == key) {
            return Ok(false);
        }
        bucket.push(key.to_string());
        self.storage.set_item(&self.token_slot, &serde_json::to_string(&token_keys)?)?;
        tracing::debug!(key, %credential_type, "token key indexed");
        Ok(true)
    }

    pub fn remove_token_key(&self, key: &str, credential_type: CredentialType) -> Result<(), Error> {
        let mut token_keys = self.token_keys();
        let bucket = token_keys.bucket_mut(credential_type)?;
        if let Some(pos) = bucket.iter().position(|k| k == key) {
            bucket.remove(pos);
        }
        self.storage.set_item(&self.token_slot, &serde_json::to_string(&token_keys)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn index() -> (Arc<MemoryStorage>, KeyIndexMaps) {
        let storage = Arc::new(MemoryStorage::new());
        let index = KeyIndexMaps::new(storage.clone(), "client-a");
        (storage, index)
    }

    #[test]
    fn test_add_is_idempotent() {
        let (_, index) = index();
        assert!(index.add_account_key("a").unwrap());
        assert!(!index.add_account_key("a").unwrap());
        assert_eq!(index.account_keys(), vec!["a".to_string()]);
    }

    #[test]
    fn test_token_slot_format() {
        let (storage, index) = index();
        index.add_token_key("at-1", CredentialType::AccessToken).unwrap();
        let raw = storage.get_item("tokenstash.token.keys.client-a").unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value, serde_json::json!({"idToken": [], "accessToken": ["at-1"], "refreshToken": []}));
    }

    #[test]
    fn test_remove_token_key() {
        let (_, index) = index();
        index.add_token_key("rt-1", CredentialType::RefreshToken).unwrap();
        index.add_token_key("rt-2", CredentialType::RefreshToken).unwrap();
        index.remove_token_key("rt-1", CredentialType::RefreshToken).unwrap();
        index.remove_token_key("rt-1", CredentialType::RefreshToken).unwrap();
        assert_eq!(index.token_keys().refresh_token, vec!["rt-2".to_string()]);
    }

    #[test]
    fn test_remove_persists_even_without_match() {
        let (storage, index) = index();
        index.remove_account_key("missing").unwrap();
        assert_eq!(storage.get_item(keys::ACCOUNT_KEYS).as_deref(), Some("[]"));
    }

    #[test]
    fn test_unexpected_credential_type() {
        let (_, index) = index();
        let err = index
            .add_token_key("k", CredentialType::AccessTokenWithAuthScheme)
            .unwrap_err();
        assert!(matches!(err, Error::UnexpectedCredentialType(CredentialType::AccessTokenWithAuthScheme)));
    }

    #[test]
    fn test_malformed_records_read_as_empty() {
        let (storage, index) = index();
        storage.set_item(keys::ACCOUNT_KEYS, "not json").unwrap();
        storage
            .set_item("tokenstash.token.keys.client-a", r#"{"idToken":["x"],"accessToken":[]}"#)
            .unwrap();
        assert!(index.account_keys().is_empty());
        assert!(index.token_keys().is_empty());

        assert!(index.add_token_key("y", CredentialType::IdToken).unwrap());
        assert_eq!(index.token_keys().id_token, vec!["y".to_string()]);
    }

    #[test]
    fn test_generic_slot_dispatch() {
        let (_, index) = index();
        index.add(IndexSlot::Tokens(CredentialType::IdToken), "id-1").unwrap();
        index.add(IndexSlot::Accounts, "acct-1").unwrap();
        assert_eq!(index.keys(IndexSlot::Tokens(CredentialType::IdToken)).unwrap(), vec!["id-1".to_string()]);
        index.remove(IndexSlot::Accounts, "acct-1").unwrap();
        assert!(index.keys(IndexSlot::Accounts).unwrap().is_empty());
    }
}
