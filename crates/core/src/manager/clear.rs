//! Bulk removal.

use std::sync::Arc;

use super::CacheManager;
use crate::keys;
use crate::storage::StorageBackend;
use crate::Error;

impl CacheManager {
    /// Remove every account with its credentials.
    pub fn remove_all_accounts(&self) -> Result<(), Error> {
        for key in self.get_account_keys() {
            self.remove_account(&key)?;
        }
        Ok(())
    }

    /// Remove everything this client put in the cache.
    ///
    /// Entries in the persistent and temporary backends and the cookie jar
    /// are removed when their key contains the cache prefix or this client
    /// id; anything else sharing those media is left alone. The memory
    /// backend is emptied.
    pub async fn clear(&self) -> Result<(), Error> {
        self.remove_all_accounts()?;
        self.remove_app_metadata();

        let mut removed = 0;
        for key in self.backends.temporary.keys() {
            if self.owns_key(&key) {
                self.remove_temporary_item(&key);
                removed += 1;
            }
        }
        if !Arc::ptr_eq(&self.backends.persistent, &self.backends.temporary) {
            for key in self.backends.persistent.keys() {
                if self.owns_key(&key) {
                    self.backends.persistent.remove_item(&key);
                    removed += 1;
                }
            }
        }
        for key in self.backends.cookies.keys() {
            if self.owns_key(&key) {
                self.backends.cookies.remove_item(&key);
                removed += 1;
            }
        }
        self.backends.memory.clear();

        self.backends.persistent.flush().await?;
        self.backends.temporary.flush().await?;
        tracing::info!(client_id = %self.client_id, removed, "cache cleared");
        Ok(())
    }

    fn owns_key(&self, key: &str) -> bool {
        key.contains(keys::CACHE_PREFIX) || key.contains(self.client_id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use crate::entities::account::tests::sample_account;
    use crate::entities::credential::tests::sample_access_token;
    use crate::manager::tests::manager;
    use crate::storage::StorageBackend;

    #[tokio::test]
    async fn test_clear_is_scoped() {
        let manager = manager();
        let account = sample_account("uid.utid");
        manager.set_account(&account).await.unwrap();
        manager.set_access_token(&sample_access_token("uid.utid", "user.read")).await.unwrap();
        manager.set_active_account(Some(&account.account_info())).unwrap();
        manager.set_temporary_cache("request.origin", "https://app/", true).unwrap();
        manager.set_interaction_in_progress(true).unwrap();
        manager.backends().memory.set_item("anything", "x").unwrap();

        let persistent = &manager.backends().persistent;
        let temporary = &manager.backends().temporary;
        persistent.set_item("someone-else", "keep").unwrap();
        temporary.set_item("other-app.state", "keep").unwrap();

        manager.clear().await.unwrap();

        assert_eq!(persistent.keys(), vec!["someone-else".to_string()]);
        assert_eq!(temporary.keys(), vec!["other-app.state".to_string()]);
        assert!(manager.backends().memory.is_empty());
        assert!(manager.get_all_accounts().is_empty());
        assert!(manager.get_active_account().is_none());
    }
}
