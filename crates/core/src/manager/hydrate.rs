//! Seeding the cache from a result obtained elsewhere.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use super::CacheManager;
use crate::crypto::CryptoProvider;
use crate::entities::{AccessTokenEntity, AccountInfo, CacheRecord, IdTokenEntity, TokenType};
use crate::Error;

/// Tokens returned to the caller of a completed sign-in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationResult {
    pub authority: String,
    pub tenant_id: String,
    pub scopes: Vec<String>,
    #[serde(default)]
    pub account: Option<AccountInfo>,
    pub id_token: String,
    pub access_token: String,
    #[serde(default)]
    pub expires_on: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ext_expires_on: Option<DateTime<Utc>>,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub correlation_id: String,
}

/// The request that produced an [`AuthenticationResult`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HydrationRequest {
    #[serde(default)]
    pub authority: Option<String>,
    #[serde(default)]
    pub claims: Option<String>,
    #[serde(default)]
    pub ssh_kid: Option<String>,
}

impl CacheManager {
    /// Store the id token and access token of `result` as if this cache had
    /// acquired them.
    pub async fn hydrate_cache(&self, result: &AuthenticationResult, request: &HydrationRequest) -> Result<(), Error> {
        let home_account_id = result.account.as_ref().map(|a| a.home_account_id.clone()).unwrap_or_default();
        let environment = match &result.account {
            Some(account) if !account.environment.is_empty() => account.environment.clone(),
            _ => {
                let authority = request.authority.as_deref().unwrap_or(&result.authority);
                authority_host(authority).unwrap_or_else(|| {
                    tracing::warn!(authority, "no environment for hydrated tokens");
                    String::new()
                })
            }
        };

        let id_token =
            IdTokenEntity::new(&home_account_id, &environment, &result.id_token, &self.client_id, &result.tenant_id);

        let claims = request.claims.clone().filter(|c| !c.is_empty());
        let requested_claims_hash = match &claims {
            Some(claims) => Some(self.crypto.hash_string(claims).await),
            None => None,
        };

        let token_type = TokenType::from_scheme(&result.token_type);
        let key_id = match token_type {
            TokenType::Bearer => None,
            TokenType::Pop => pop_key_id(self.crypto.as_ref(), &result.access_token),
            TokenType::Ssh => request.ssh_kid.clone(),
        };

        let access_token = AccessTokenEntity {
            home_account_id,
            environment,
            credential_type: token_type.credential_type(),
            client_id: self.client_id.clone(),
            secret: result.access_token.clone(),
            realm: result.tenant_id.clone(),
            target: result.scopes.join(" "),
            cached_at: Utc::now().timestamp(),
            expires_on: result.expires_on.map_or(0, |t| t.timestamp()),
            extended_expires_on: result.ext_expires_on.map_or(0, |t| t.timestamp()),
            refresh_on: None,
            token_type,
            key_id,
            requested_claims: claims,
            requested_claims_hash,
        };

        tracing::debug!(correlation_id = %result.correlation_id, "hydrating cache from result");
        let record = CacheRecord { id_token: Some(id_token), access_token: Some(access_token), ..Default::default() };
        self.save_cache_record(&record).await
    }
}

fn authority_host(authority: &str) -> Option<String> {
    Url::parse(authority).ok()?.host_str().map(str::to_lowercase)
}

/// `cnf.kid` of a proof-of-possession token's payload.
fn pop_key_id(crypto: &dyn CryptoProvider, token: &str) -> Option<String> {
    let payload = token.split('.').nth(1)?;
    let claims: serde_json::Value = serde_json::from_str(&crypto.base64_decode(payload)?).ok()?;
    claims.get("cnf")?.get("kid")?.as_str().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::crypto::DefaultCryptoProvider;
    use crate::entities::CredentialType;
    use crate::entities::account::tests::sample_account;
    use crate::manager::AccessTokenQuery;
    use crate::manager::tests::manager;

    fn result(token_type: &str) -> AuthenticationResult {
        AuthenticationResult {
            authority: "https://login.example.com/utid/".into(),
            tenant_id: "utid".into(),
            scopes: vec!["User.Read".into()],
            account: Some(sample_account("uid.utid").account_info()),
            id_token: "id.token.sig".into(),
            access_token: "access.token.sig".into(),
            expires_on: Some(Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()),
            ext_expires_on: None,
            token_type: token_type.into(),
            correlation_id: "corr-1".into(),
        }
    }

    #[tokio::test]
    async fn test_hydrate_bearer() {
        let manager = manager();
        manager.hydrate_cache(&result("Bearer"), &HydrationRequest::default()).await.unwrap();

        let account = sample_account("uid.utid").account_info();
        assert!(manager.get_id_token_for(&account, None).is_some());
        let token = manager
            .get_access_token_for(&account, &AccessTokenQuery::for_scopes(["user.read"]))
            .unwrap();
        assert_eq!(token.expires_on, 1_893_456_000);
        assert_eq!(token.extended_expires_on, 0);
        assert!(token.refresh_on.is_none());
        assert!(token.requested_claims_hash.is_none());
    }

    #[tokio::test]
    async fn test_hydrate_with_claims_and_ssh() {
        let manager = manager();
        let request = HydrationRequest {
            claims: Some(r#"{"access_token":{"nbf":{"essential":true}}}"#.into()),
            ssh_kid: Some("ssh-key-1".into()),
            ..Default::default()
        };
        manager.hydrate_cache(&result("ssh-cert"), &request).await.unwrap();

        let key = &manager.get_token_keys().access_token[0];
        let token = manager.get_access_token(key).unwrap();
        assert_eq!(token.credential_type, CredentialType::AccessTokenWithAuthScheme);
        assert_eq!(token.key_id.as_deref(), Some("ssh-key-1"));
        let expected_hash = DefaultCryptoProvider.hash_string(request.claims.as_deref().unwrap()).await;
        assert_eq!(token.requested_claims_hash, Some(expected_hash));
    }

    #[tokio::test]
    async fn test_hydrate_environment_from_authority() {
        let manager = manager();
        let mut without_account = result("Bearer");
        without_account.account = None;
        manager.hydrate_cache(&without_account, &HydrationRequest::default()).await.unwrap();

        let key = &manager.get_token_keys().id_token[0];
        assert_eq!(manager.get_id_token(key).unwrap().environment, "login.example.com");
    }

    #[test]
    fn test_pop_key_id() {
        let crypto = DefaultCryptoProvider;
        let payload = crypto.base64_encode(r#"{"cnf":{"kid":"pop-kid"}}"#);
        assert_eq!(pop_key_id(&crypto, &format!("header.{payload}.sig")).as_deref(), Some("pop-kid"));
        assert!(pop_key_id(&crypto, "opaque").is_none());
    }
}
