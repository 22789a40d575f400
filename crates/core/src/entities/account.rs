//! Account entity and account filters.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{CacheEntity, IndexedEntity};
use crate::index::IndexSlot;
use crate::keys;

/// Protocol family of the authority that issued the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthorityType {
    #[serde(rename = "MSSTS")]
    Default,
    #[serde(rename = "ADFS")]
    Adfs,
    #[serde(rename = "MSA")]
    Msa,
    #[serde(rename = "Generic")]
    Generic,
}

/// A signed-in identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountEntity {
    pub home_account_id: String,
    /// Issuer host.
    pub environment: String,
    /// Tenant id.
    pub realm: String,
    pub local_account_id: String,
    pub username: String,
    pub authority_type: AuthorityType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_info: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modification_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_account_id: Option<String>,
}

impl AccountEntity {
    /// Prefix of every credential key belonging to this account.
    pub fn account_id_prefix(&self) -> String {
        keys::account_id_prefix(&self.home_account_id, &self.environment)
    }

    pub fn account_info(&self) -> AccountInfo {
        AccountInfo {
            home_account_id: self.home_account_id.clone(),
            environment: self.environment.clone(),
            tenant_id: self.realm.clone(),
            username: self.username.clone(),
            local_account_id: self.local_account_id.clone(),
            name: self.name.clone(),
        }
    }
}

impl CacheEntity for AccountEntity {
    const REQUIRED_FIELDS: &'static [&'static str] =
        &["homeAccountId", "environment", "realm", "localAccountId", "username", "authorityType"];
}

impl IndexedEntity for AccountEntity {
    const SLOT: IndexSlot = IndexSlot::Accounts;

    fn cache_key(&self) -> String {
        keys::account_key(&self.home_account_id, &self.environment, &self.realm)
    }
}

/// Caller-facing view of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub home_account_id: String,
    pub environment: String,
    pub tenant_id: String,
    pub username: String,
    pub local_account_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Persisted active-account pointer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveAccountFilters {
    pub home_account_id: String,
    pub local_account_id: String,
    pub tenant_id: String,
}

impl CacheEntity for ActiveAccountFilters {
    const REQUIRED_FIELDS: &'static [&'static str] = &["homeAccountId", "localAccountId", "tenantId"];

    fn discriminate(object: &Map<String, Value>) -> bool {
        Self::REQUIRED_FIELDS.iter().all(|field| object[*field].is_string())
    }
}

impl From<&AccountEntity> for ActiveAccountFilters {
    fn from(account: &AccountEntity) -> Self {
        Self {
            home_account_id: account.home_account_id.clone(),
            local_account_id: account.local_account_id.clone(),
            tenant_id: account.realm.clone(),
        }
    }
}

/// Account lookup filter. `None` fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountFilter {
    pub home_account_id: Option<String>,
    pub local_account_id: Option<String>,
    pub tenant_id: Option<String>,
    pub username: Option<String>,
}

impl AccountFilter {
    pub fn matches(&self, account: &AccountEntity) -> bool {
        let eq = |wanted: &Option<String>, actual: &str| wanted.as_deref().is_none_or(|w| w == actual);
        eq(&self.home_account_id, &account.home_account_id)
            && eq(&self.local_account_id, &account.local_account_id)
            && eq(&self.tenant_id, &account.realm)
            && self
                .username
                .as_deref()
                .is_none_or(|u| u.eq_ignore_ascii_case(&account.username))
    }
}

impl From<ActiveAccountFilters> for AccountFilter {
    fn from(filters: ActiveAccountFilters) -> Self {
        Self {
            home_account_id: Some(filters.home_account_id),
            local_account_id: Some(filters.local_account_id),
            tenant_id: Some(filters.tenant_id),
            username: None,
        }
    }
}
