//! Active-account pointer.

use super::CacheManager;
use crate::entities::{AccountFilter, AccountInfo, ActiveAccountFilters};
use crate::events::CacheEvent;
use crate::keys;
use crate::Error;

impl CacheManager {
    /// The active account, if the stored pointer still resolves to a cached
    /// account.
    ///
    /// A pointer in the older local-account-id-only format is resolved by
    /// local account id and rewritten in the current format.
    pub fn get_active_account(&self) -> Option<AccountInfo> {
        let filters_key = self.generate_cache_key(keys::ACTIVE_ACCOUNT_FILTERS);
        let Some(filters) = self.persistent.store().read::<ActiveAccountFilters>(&filters_key) else {
            return self.migrate_legacy_active_account();
        };

        match filters.valid() {
            Some(filters) => self.get_account_info_filtered_by(&AccountFilter::from(filters)),
            None => {
                tracing::warn!(key = %filters_key, "malformed active account pointer");
                None
            }
        }
    }

    /// Point at `account`, or clear the pointer with `None`.
    pub fn set_active_account(&self, account: Option<&AccountInfo>) -> Result<(), Error> {
        let filters_key = self.generate_cache_key(keys::ACTIVE_ACCOUNT_FILTERS);
        let legacy_key = self.generate_cache_key(keys::ACTIVE_ACCOUNT);

        match account {
            Some(account) => {
                let filters = ActiveAccountFilters {
                    home_account_id: account.home_account_id.clone(),
                    local_account_id: account.local_account_id.clone(),
                    tenant_id: account.tenant_id.clone(),
                };
                self.persistent.store().put(&filters_key, &filters)?;
                self.backends.persistent.set_item(&legacy_key, &account.local_account_id)?;
            }
            None => {
                self.backends.persistent.remove_item(&filters_key);
                self.backends.persistent.remove_item(&legacy_key);
            }
        }

        self.events.emit(CacheEvent::ActiveAccountChanged(account.cloned()));
        Ok(())
    }

    fn migrate_legacy_active_account(&self) -> Option<AccountInfo> {
        let legacy_key = self.generate_cache_key(keys::ACTIVE_ACCOUNT);
        let local_account_id = self.backends.persistent.get_item(&legacy_key)?;

        let filter = AccountFilter { local_account_id: Some(local_account_id), ..Default::default() };
        let account = self.get_account_info_filtered_by(&filter)?;
        if let Err(err) = self.set_active_account(Some(&account)) {
            tracing::warn!(error = %err, "could not migrate legacy active account pointer");
        } else {
            tracing::debug!(home_account_id = %account.home_account_id, "migrated legacy active account pointer");
        }
        Some(account)
    }
}
