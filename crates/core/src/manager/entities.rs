//! Entity CRUD and credential lookups.

use super::CacheManager;
use crate::entities::{
    AccessTokenEntity, AccountEntity, AccountFilter, AccountInfo, AppMetadataEntity, AuthorityMetadataEntity,
    CacheRecord, Credential, CredentialType, IdTokenEntity, IndexedEntity, RefreshTokenEntity,
    ServerTelemetryEntity, ThrottlingEntity, TokenType, FAMILY_ID,
};
use crate::index::{IndexSlot, TokenKeys};
use crate::keys;
use crate::storage::StorageBackend;
use crate::store::{EntityStore, token_slot};
use crate::Error;

/// Scopes a token service adds on its own; ignored when searching for an
/// access token unless nothing else was requested.
const OIDC_SCOPES: [&str; 3] = ["openid", "profile", "offline_access"];

/// Parameters of an access-token lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessTokenQuery {
    pub scopes: Vec<String>,
    pub token_type: TokenType,
    /// Required for SSH certificates.
    pub key_id: Option<String>,
    pub requested_claims_hash: Option<String>,
    /// Tenant to look in; the account's home tenant when unset.
    pub realm: Option<String>,
}

impl AccessTokenQuery {
    pub fn for_scopes<I, S>(scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { scopes: scopes.into_iter().map(Into::into).collect(), ..Default::default() }
    }

    fn search_scopes(&self) -> Vec<String> {
        let scopes: Vec<String> = self.scopes.iter().map(|s| s.to_lowercase()).collect();
        let resource_scopes: Vec<String> =
            scopes.iter().filter(|s| !OIDC_SCOPES.contains(&s.as_str())).cloned().collect();
        if resource_scopes.is_empty() { scopes } else { resource_scopes }
    }
}

impl CacheManager {
    pub fn get_account(&self, key: &str) -> Option<AccountEntity> {
        self.persistent.get(key)
    }

    /// Persist an account as given and index it. Emits `AccountAdded` the
    /// first time the key is indexed.
    pub async fn set_account(&self, account: &AccountEntity) -> Result<String, Error> {
        let (key, added) = self.persistent.set(account).await?;
        if added {
            self.events.account_added(account);
        }
        Ok(key)
    }

    /// Remove an account together with every credential under its account
    /// id prefix. A value that no longer decodes as an account is still
    /// removed, without touching credentials.
    pub fn remove_account(&self, key: &str) -> Result<(), Error> {
        let Some(account) = self.get_account(key) else {
            return self.persistent.remove(IndexSlot::Accounts, key);
        };
        self.remove_account_context(&account)?;
        self.persistent.remove(IndexSlot::Accounts, key)?;
        tracing::debug!(key, "account removed");
        self.events.account_removed(&account);
        Ok(())
    }

    /// Remove every credential belonging to `account`.
    pub fn remove_account_context(&self, account: &AccountEntity) -> Result<(), Error> {
        let prefix = account.account_id_prefix();
        let tokens = self.persistent.index().token_keys();
        for key in tokens.id_token.iter().filter(|k| k.starts_with(&prefix)) {
            self.remove_id_token(key)?;
        }
        for key in tokens.access_token.iter().filter(|k| k.starts_with(&prefix)) {
            self.remove_access_token(key)?;
        }
        for key in tokens.refresh_token.iter().filter(|k| k.starts_with(&prefix)) {
            self.remove_refresh_token(key)?;
        }
        Ok(())
    }

    pub fn get_account_keys(&self) -> Vec<String> {
        self.persistent.index().account_keys()
    }

    pub fn get_token_keys(&self) -> TokenKeys {
        self.persistent.index().token_keys()
    }

    /// Every cached account, resolving (and healing) the account index.
    pub fn get_all_accounts(&self) -> Vec<AccountInfo> {
        self.accounts_matching(&AccountFilter::default())
            .iter()
            .map(AccountEntity::account_info)
            .collect()
    }

    /// First cached account matching `filter`.
    pub fn get_account_info_filtered_by(&self, filter: &AccountFilter) -> Option<AccountInfo> {
        self.accounts_matching(filter).first().map(AccountEntity::account_info)
    }

    pub(crate) fn accounts_matching(&self, filter: &AccountFilter) -> Vec<AccountEntity> {
        self.get_account_keys()
            .iter()
            .filter_map(|key| self.get_account(key))
            .filter(|account| filter.matches(account))
            .collect()
    }

    pub fn get_id_token(&self, key: &str) -> Option<IdTokenEntity> {
        self.persistent.get(key)
    }

    pub async fn set_id_token(&self, id_token: &IdTokenEntity) -> Result<String, Error> {
        Ok(self.persistent.set(id_token).await?.0)
    }

    pub fn remove_id_token(&self, key: &str) -> Result<(), Error> {
        self.persistent.remove(IdTokenEntity::SLOT, key)
    }

    pub fn get_access_token(&self, key: &str) -> Option<AccessTokenEntity> {
        self.persistent.get(key)
    }

    pub async fn set_access_token(&self, access_token: &AccessTokenEntity) -> Result<String, Error> {
        Ok(self.persistent.set(access_token).await?.0)
    }

    pub fn remove_access_token(&self, key: &str) -> Result<(), Error> {
        self.persistent.remove(AccessTokenEntity::SLOT, key)
    }

    pub fn get_refresh_token(&self, key: &str) -> Option<RefreshTokenEntity> {
        self.persistent.get(key)
    }

    pub async fn set_refresh_token(&self, refresh_token: &RefreshTokenEntity) -> Result<String, Error> {
        Ok(self.persistent.set(refresh_token).await?.0)
    }

    pub fn remove_refresh_token(&self, key: &str) -> Result<(), Error> {
        self.persistent.remove(RefreshTokenEntity::SLOT, key)
    }

    /// Remove a credential by category.
    pub fn remove_credential(&self, credential_type: CredentialType, key: &str) -> Result<(), Error> {
        self.persistent.remove(token_slot(credential_type), key)
    }

    /// The id token of `account` for this client. When several match they
    /// are all removed and `None` is returned.
    pub fn get_id_token_for(&self, account: &AccountInfo, realm: Option<&str>) -> Option<IdTokenEntity> {
        let realm = realm.unwrap_or(&account.tenant_id);
        let prefix = keys::account_id_prefix(&account.home_account_id, &account.environment);
        let matches: Vec<(String, IdTokenEntity)> = self
            .get_token_keys()
            .id_token
            .into_iter()
            .filter(|key| key.starts_with(&prefix))
            .filter_map(|key| self.get_id_token(&key).map(|token| (key, token)))
            .filter(|(_, token)| {
                self.is_own_credential(token, account) && token.realm.eq_ignore_ascii_case(realm)
            })
            .collect();

        self.single_or_purge(matches, CredentialType::IdToken)
    }

    /// The access token of `account` covering `query`. When several match
    /// they are all removed and `None` is returned.
    pub fn get_access_token_for(&self, account: &AccountInfo, query: &AccessTokenQuery) -> Option<AccessTokenEntity> {
        let realm = query.realm.as_deref().unwrap_or(&account.tenant_id);
        let scopes = query.search_scopes();
        let credential_type = query.token_type.credential_type();
        let prefix = keys::account_id_prefix(&account.home_account_id, &account.environment);

        let matches: Vec<(String, AccessTokenEntity)> = self
            .get_token_keys()
            .access_token
            .into_iter()
            .filter(|key| key.starts_with(&prefix))
            .filter_map(|key| self.get_access_token(&key).map(|token| (key, token)))
            .filter(|(_, token)| {
                self.is_own_credential(token, account)
                    && token.credential_type == credential_type
                    && token.token_type == query.token_type
                    && token.realm.eq_ignore_ascii_case(realm)
                    && token.covers_scopes(&scopes)
                    && token.requested_claims_hash == query.requested_claims_hash
                    && (query.token_type != TokenType::Ssh || token.key_id == query.key_id)
            })
            .collect();

        self.single_or_purge(matches, CredentialType::AccessToken)
    }

    /// The refresh token of `account`: the family token when `family` is
    /// set, otherwise this client's own.
    pub fn get_refresh_token_for(&self, account: &AccountInfo, family: bool) -> Option<RefreshTokenEntity> {
        let prefix = keys::account_id_prefix(&account.home_account_id, &account.environment);
        self.get_token_keys()
            .refresh_token
            .into_iter()
            .filter(|key| key.starts_with(&prefix))
            .filter_map(|key| self.get_refresh_token(&key))
            .find(|token| {
                let owned = if family {
                    token.family_id.as_deref() == Some(FAMILY_ID)
                } else {
                    token.client_id.eq_ignore_ascii_case(&self.client_id)
                };
                owned
                    && token.home_account_id.eq_ignore_ascii_case(&account.home_account_id)
                    && token.environment.eq_ignore_ascii_case(&account.environment)
            })
    }

    /// Persist everything produced by one token response.
    ///
    /// Existing access tokens for the same account, tenant, client, scheme
    /// and claims whose scopes intersect the new token's are removed first.
    pub async fn save_cache_record(&self, record: &CacheRecord) -> Result<(), Error> {
        if let Some(account) = &record.account {
            self.set_account(account).await?;
        }
        if let Some(id_token) = &record.id_token {
            self.set_id_token(id_token).await?;
        }
        if let Some(access_token) = &record.access_token {
            self.save_access_token(access_token).await?;
        }
        if let Some(refresh_token) = &record.refresh_token {
            self.set_refresh_token(refresh_token).await?;
        }
        if let Some(app_metadata) = &record.app_metadata {
            self.set_app_metadata(app_metadata)?;
        }
        Ok(())
    }

    async fn save_access_token(&self, access_token: &AccessTokenEntity) -> Result<(), Error> {
        let prefix = keys::account_id_prefix(&access_token.home_account_id, &access_token.environment);
        let replaced: Vec<String> = self
            .get_token_keys()
            .access_token
            .into_iter()
            .filter(|key| key.starts_with(&prefix))
            .filter(|key| {
                self.get_access_token(key).is_some_and(|existing| {
                    existing.client_id.eq_ignore_ascii_case(&access_token.client_id)
                        && existing.realm.eq_ignore_ascii_case(&access_token.realm)
                        && existing.credential_type == access_token.credential_type
                        && existing.token_type == access_token.token_type
                        && existing.requested_claims_hash == access_token.requested_claims_hash
                        && existing.intersects_target(&access_token.target)
                })
            })
            .collect();

        for key in &replaced {
            self.remove_access_token(key)?;
        }
        if !replaced.is_empty() {
            tracing::debug!(replaced = replaced.len(), "replaced access tokens with intersecting scopes");
        }
        self.set_access_token(access_token).await.map(|_| ())
    }

    /// Remove access tokens that were acquired with requested claims.
    pub fn clear_tokens_and_keys_with_claims(&self) -> Result<usize, Error> {
        let mut removed = 0;
        for key in self.get_token_keys().access_token {
            let has_claims = self
                .get_access_token(&key)
                .is_some_and(|token| token.requested_claims_hash.as_deref().is_some_and(|h| !h.is_empty()));
            if has_claims {
                self.remove_access_token(&key)?;
                removed += 1;
            }
        }
        if removed > 0 {
            tracing::warn!(removed, "removed access tokens cached with requested claims");
        }
        Ok(removed)
    }

    pub fn set_app_metadata(&self, app_metadata: &AppMetadataEntity) -> Result<(), Error> {
        self.persistent.store().put(&app_metadata.cache_key(), app_metadata)
    }

    pub fn get_app_metadata(&self, key: &str) -> Option<AppMetadataEntity> {
        if !keys::is_app_metadata_key(key) {
            return None;
        }
        self.persistent.store().read_valid(key)
    }

    pub fn get_app_metadata_keys(&self) -> Vec<String> {
        self.backends
            .persistent
            .keys()
            .into_iter()
            .filter(|key| keys::is_app_metadata_key(key))
            .collect()
    }

    pub fn remove_app_metadata(&self) {
        for key in self.get_app_metadata_keys() {
            self.backends.persistent.remove_item(&key);
        }
    }

    pub fn set_server_telemetry(&self, key: &str, telemetry: &ServerTelemetryEntity) -> Result<(), Error> {
        self.persistent.store().put(key, telemetry)
    }

    pub fn get_server_telemetry(&self, key: &str) -> Option<ServerTelemetryEntity> {
        if !keys::is_server_telemetry_key(key) {
            return None;
        }
        self.persistent.store().read_valid(key)
    }

    /// Key of this client's telemetry record.
    pub fn server_telemetry_key(&self) -> String {
        keys::server_telemetry_key(&self.client_id)
    }

    pub fn set_throttling(&self, key: &str, throttling: &ThrottlingEntity) -> Result<(), Error> {
        EntityStore::new(self.backends.temporary.clone()).put(key, throttling)
    }

    pub fn get_throttling(&self, key: &str) -> Option<ThrottlingEntity> {
        if !keys::is_throttling_key(key) {
            return None;
        }
        EntityStore::new(self.backends.temporary.clone()).read_valid(key)
    }

    pub fn generate_authority_metadata_cache_key(&self, authority: &str) -> String {
        keys::authority_metadata_key(&self.client_id, authority)
    }

    pub fn set_authority_metadata(&self, key: &str, metadata: &AuthorityMetadataEntity) -> Result<(), Error> {
        EntityStore::new(self.backends.memory.clone()).put(key, metadata)
    }

    pub fn get_authority_metadata(&self, key: &str) -> Option<AuthorityMetadataEntity> {
        if !key.starts_with(&keys::authority_metadata_prefix(&self.client_id)) {
            return None;
        }
        EntityStore::new(self.backends.memory.clone()).read_valid(key)
    }

    pub fn get_authority_metadata_keys(&self) -> Vec<String> {
        let prefix = keys::authority_metadata_prefix(&self.client_id);
        self.backends
            .memory
            .keys()
            .into_iter()
            .filter(|key| key.starts_with(&prefix))
            .collect()
    }

    fn is_own_credential<C: Credential>(&self, credential: &C, account: &AccountInfo) -> bool {
        credential.client_id().eq_ignore_ascii_case(&self.client_id) && credential.belongs_to(account)
    }

    fn single_or_purge<T>(&self, mut matches: Vec<(String, T)>, credential_type: CredentialType) -> Option<T> {
        if matches.len() > 1 {
            tracing::warn!(count = matches.len(), %credential_type, "multiple matching credentials, removing all");
            for (key, _) in &matches {
                if let Err(err) = self.remove_credential(credential_type, key) {
                    tracing::warn!(key = %key, error = %err, "failed to remove ambiguous credential");
                }
            }
            return None;
        }
        matches.pop().map(|(_, credential)| credential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::account::tests::sample_account;
    use crate::entities::credential::tests::{sample_access_token, sample_refresh_token};
    use crate::entities::metadata::tests::sample_authority_metadata;
    use crate::manager::tests::manager;

    fn id_token_for(account: &AccountEntity) -> IdTokenEntity {
        IdTokenEntity::new(&account.home_account_id, &account.environment, "header.payload.sig", "client-a", &account.realm)
    }

    #[tokio::test]
    async fn test_account_round_trip_and_removal() {
        let manager = manager();
        let account = sample_account("uid.utid");
        let key = manager.set_account(&account).await.unwrap();

        assert_eq!(manager.get_account(&key), Some(account.clone()));
        assert_eq!(manager.get_account_keys(), vec![key.clone()]);

        manager.remove_account(&key).unwrap();
        manager.remove_account(&key).unwrap();
        assert!(manager.get_account(&key).is_none());
        assert!(manager.get_account_keys().is_empty());
    }

    #[tokio::test]
    async fn test_round_trip_every_indexed_category() {
        let manager = manager();
        let account = sample_account("uid.utid");
        let id_token = id_token_for(&account);
        let access_token = sample_access_token("uid.utid", "user.read");
        let refresh_token = sample_refresh_token("uid.utid", None);

        let account_key = manager.set_account(&account).await.unwrap();
        let id_key = manager.set_id_token(&id_token).await.unwrap();
        let access_key = manager.set_access_token(&access_token).await.unwrap();
        let refresh_key = manager.set_refresh_token(&refresh_token).await.unwrap();

        assert_eq!(manager.get_account(&account_key), Some(account));
        assert_eq!(manager.get_id_token(&id_key), Some(id_token));
        assert_eq!(manager.get_access_token(&access_key), Some(access_token));
        assert_eq!(manager.get_refresh_token(&refresh_key), Some(refresh_token));
    }

    #[tokio::test]
    async fn test_remove_corrupt_account_drops_value() {
        let manager = manager();
        let key = manager.set_account(&sample_account("uid.utid")).await.unwrap();
        manager.backends().persistent.set_item(&key, r#"{"homeAccountId":"uid.utid"}"#).unwrap();

        manager.remove_account(&key).unwrap();

        assert!(!manager.backends().persistent.contains_key(&key));
        assert!(manager.get_account_keys().is_empty());
    }

    #[tokio::test]
    async fn test_remove_account_removes_its_credentials_only() {
        let manager = manager();
        let account = sample_account("uid.utid");
        let other = sample_account("other.utid");
        let key = manager.set_account(&account).await.unwrap();
        manager.set_account(&other).await.unwrap();

        manager.set_id_token(&id_token_for(&account)).await.unwrap();
        manager.set_access_token(&sample_access_token("uid.utid", "user.read")).await.unwrap();
        manager.set_refresh_token(&sample_refresh_token("uid.utid", None)).await.unwrap();
        let other_rt = manager.set_refresh_token(&sample_refresh_token("other.utid", None)).await.unwrap();

        manager.remove_account(&key).unwrap();

        let tokens = manager.get_token_keys();
        assert!(tokens.id_token.is_empty());
        assert!(tokens.access_token.is_empty());
        assert_eq!(tokens.refresh_token, vec![other_rt.clone()]);
        assert!(manager.get_refresh_token(&other_rt).is_some());
        assert_eq!(manager.get_account_keys().len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_token_heals_index() {
        let manager = manager();
        let key = manager.set_access_token(&sample_access_token("uid.utid", "user.read")).await.unwrap();
        manager.backends().persistent.set_item(&key, "{not json").unwrap();

        assert!(manager.get_access_token(&key).is_none());
        assert!(manager.get_token_keys().access_token.is_empty());
    }

    #[tokio::test]
    async fn test_token_with_wrong_discriminator_is_invalid() {
        let manager = manager();
        let key = manager.set_refresh_token(&sample_refresh_token("uid.utid", None)).await.unwrap();
        assert!(manager.get_id_token(&key).is_none());
        assert!(manager.get_token_keys().id_token.is_empty());
        assert!(manager.get_refresh_token(&key).is_some());
    }

    #[tokio::test]
    async fn test_get_all_accounts_and_filter() {
        let manager = manager();
        manager.set_account(&sample_account("a.tenant")).await.unwrap();
        manager.set_account(&sample_account("b.tenant")).await.unwrap();
        manager.persistent.index().add_account_key("stale").unwrap();

        assert_eq!(manager.get_all_accounts().len(), 2);
        assert_eq!(manager.get_account_keys().len(), 2);

        let filter = AccountFilter { username: Some("B.TENANT@example.com".into()), ..Default::default() };
        let found = manager.get_account_info_filtered_by(&filter).unwrap();
        assert_eq!(found.home_account_id, "b.tenant");
    }

    #[tokio::test]
    async fn test_id_token_lookup() {
        let manager = manager();
        let account = sample_account("uid.utid");
        manager.set_id_token(&id_token_for(&account)).await.unwrap();

        let found = manager.get_id_token_for(&account.account_info(), None).unwrap();
        assert_eq!(found.secret, "header.payload.sig");
        assert!(manager.get_id_token_for(&account.account_info(), Some("other-tenant")).is_none());
    }

    #[tokio::test]
    async fn test_access_token_lookup_by_scopes() {
        let manager = manager();
        let account = sample_account("uid.utid");
        manager.set_access_token(&sample_access_token("uid.utid", "User.Read Mail.Read")).await.unwrap();

        let info = account.account_info();
        assert!(manager.get_access_token_for(&info, &AccessTokenQuery::for_scopes(["user.read", "openid"])).is_some());
        assert!(manager.get_access_token_for(&info, &AccessTokenQuery::for_scopes(["files.read"])).is_none());

        let pop = AccessTokenQuery { token_type: TokenType::Pop, ..AccessTokenQuery::for_scopes(["user.read"]) };
        assert!(manager.get_access_token_for(&info, &pop).is_none());
    }

    #[tokio::test]
    async fn test_ambiguous_access_tokens_are_purged() {
        let manager = manager();
        let account = sample_account("uid.utid");
        manager.set_access_token(&sample_access_token("uid.utid", "user.read mail.read")).await.unwrap();
        manager.set_access_token(&sample_access_token("uid.utid", "user.read files.read")).await.unwrap();

        let query = AccessTokenQuery::for_scopes(["user.read"]);
        assert!(manager.get_access_token_for(&account.account_info(), &query).is_none());
        assert!(manager.get_token_keys().access_token.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_token_lookup() {
        let manager = manager();
        let account = sample_account("uid.utid").account_info();
        manager.set_refresh_token(&sample_refresh_token("uid.utid", Some(FAMILY_ID))).await.unwrap();

        assert!(manager.get_refresh_token_for(&account, true).is_some());
        assert!(manager.get_refresh_token_for(&account, false).is_some());

        let mut foreign = sample_refresh_token("uid.utid", None);
        foreign.client_id = "client-b".into();
        foreign.family_id = Some("2".into());
        manager.set_refresh_token(&foreign).await.unwrap();
        assert_eq!(manager.get_token_keys().refresh_token.len(), 2);
        assert_eq!(manager.get_refresh_token_for(&account, true).unwrap().client_id, "client-a");
    }

    #[tokio::test]
    async fn test_save_cache_record_replaces_intersecting_tokens() {
        let manager = manager();
        let account = sample_account("uid.utid");
        let old = manager.set_access_token(&sample_access_token("uid.utid", "user.read mail.read")).await.unwrap();
        let unrelated = manager.set_access_token(&sample_access_token("uid.utid", "files.read")).await.unwrap();

        let record = CacheRecord {
            account: Some(account.clone()),
            id_token: Some(id_token_for(&account)),
            access_token: Some(sample_access_token("uid.utid", "user.read calendars.read")),
            refresh_token: Some(sample_refresh_token("uid.utid", None)),
            app_metadata: Some(AppMetadataEntity {
                client_id: "client-a".into(),
                environment: "login.example.com".into(),
                family_id: Some(FAMILY_ID.into()),
            }),
        };
        manager.save_cache_record(&record).await.unwrap();

        let access_keys = manager.get_token_keys().access_token;
        assert_eq!(access_keys.len(), 2);
        assert!(!access_keys.contains(&old));
        assert!(access_keys.contains(&unrelated));
        assert_eq!(manager.get_account_keys().len(), 1);
        assert_eq!(manager.get_app_metadata_keys().len(), 1);
        let metadata = manager.get_app_metadata(&manager.get_app_metadata_keys()[0]).unwrap();
        assert_eq!(metadata.family_id.as_deref(), Some(FAMILY_ID));
    }

    #[tokio::test]
    async fn test_clear_tokens_with_claims() {
        let manager = manager();
        let mut with_claims = sample_access_token("uid.utid", "user.read");
        with_claims.requested_claims = Some(r#"{"access_token":{"acrs":{"essential":true}}}"#.into());
        with_claims.requested_claims_hash = Some("claimshash".into());
        manager.set_access_token(&with_claims).await.unwrap();
        let plain = manager.set_access_token(&sample_access_token("uid.utid", "user.read")).await.unwrap();

        assert_eq!(manager.clear_tokens_and_keys_with_claims().unwrap(), 1);
        assert_eq!(manager.get_token_keys().access_token, vec![plain]);
    }

    #[test]
    fn test_non_indexed_entities() {
        let manager = manager();

        let throttle_key = keys::throttling_key("fingerprint");
        manager
            .set_throttling(&throttle_key, &ThrottlingEntity {
                throttle_time: 1_700_000_000_000,
                error: None,
                error_codes: None,
                error_message: None,
                sub_error: None,
            })
            .unwrap();
        assert!(manager.get_throttling(&throttle_key).is_some());
        assert!(manager.get_throttling("fingerprint").is_none());

        let telemetry_key = manager.server_telemetry_key();
        manager.set_server_telemetry(&telemetry_key, &ServerTelemetryEntity::default()).unwrap();
        assert!(manager.get_server_telemetry(&telemetry_key).is_some());

        let authority_key = manager.generate_authority_metadata_cache_key("https://login.example.com/common/");
        manager.set_authority_metadata(&authority_key, &sample_authority_metadata()).unwrap();
        assert!(manager.get_authority_metadata(&authority_key).is_some());
        assert!(!manager.backends().persistent.contains_key(&authority_key));
        assert_eq!(manager.get_authority_metadata_keys(), vec![authority_key]);
    }
}
