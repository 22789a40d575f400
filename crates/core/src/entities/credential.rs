//! Credential entities: id tokens, access tokens and refresh tokens.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{
    AccountEntity, AccountInfo, AppMetadataEntity, CacheEntity, CredentialType, IndexedEntity, credential_type_in,
};
use crate::index::IndexSlot;
use crate::keys::{self, CredentialKeyParts};

/// Family id shared by first-party clients that can redeem each other's
/// refresh tokens.
pub const FAMILY_ID: &str = "1";

/// Authentication scheme an access token is bound to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenType {
    #[default]
    #[serde(rename = "Bearer")]
    Bearer,
    #[serde(rename = "pop")]
    Pop,
    #[serde(rename = "ssh-cert")]
    Ssh,
}

impl TokenType {
    /// Parse a token type as returned by a token endpoint. Unknown schemes
    /// fall back to bearer.
    pub fn from_scheme(scheme: &str) -> Self {
        match scheme.to_ascii_lowercase().as_str() {
            "pop" => TokenType::Pop,
            "ssh-cert" => TokenType::Ssh,
            "bearer" | "" => TokenType::Bearer,
            other => {
                tracing::warn!(scheme = other, "unknown token type, treating as bearer");
                TokenType::Bearer
            }
        }
    }

    /// Scheme component of a credential key; empty for bearer tokens.
    pub fn key_scheme(&self) -> &'static str {
        match self {
            TokenType::Bearer => "",
            TokenType::Pop => "pop",
            TokenType::Ssh => "ssh-cert",
        }
    }

    pub fn credential_type(&self) -> CredentialType {
        match self {
            TokenType::Bearer => CredentialType::AccessToken,
            TokenType::Pop | TokenType::Ssh => CredentialType::AccessTokenWithAuthScheme,
        }
    }
}

/// Fields shared by every credential variant.
pub trait Credential {
    fn home_account_id(&self) -> &str;
    fn environment(&self) -> &str;
    fn credential_type(&self) -> CredentialType;
    fn client_id(&self) -> &str;
    fn secret(&self) -> &str;

    /// True when the credential belongs to `account` (realm is not compared).
    fn belongs_to(&self, account: &AccountInfo) -> bool {
        self.home_account_id().eq_ignore_ascii_case(&account.home_account_id)
            && self.environment().eq_ignore_ascii_case(&account.environment)
    }
}

const CREDENTIAL_FIELDS: [&str; 5] = ["homeAccountId", "environment", "credentialType", "clientId", "secret"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdTokenEntity {
    pub home_account_id: String,
    pub environment: String,
    pub credential_type: CredentialType,
    pub client_id: String,
    pub secret: String,
    pub realm: String,
}

impl IdTokenEntity {
    pub fn new(home_account_id: &str, environment: &str, id_token: &str, client_id: &str, tenant_id: &str) -> Self {
        Self {
            home_account_id: home_account_id.to_string(),
            environment: environment.to_string(),
            credential_type: CredentialType::IdToken,
            client_id: client_id.to_string(),
            secret: id_token.to_string(),
            realm: tenant_id.to_string(),
        }
    }
}

impl CacheEntity for IdTokenEntity {
    const REQUIRED_FIELDS: &'static [&'static str] =
        &["homeAccountId", "environment", "credentialType", "clientId", "secret", "realm"];

    fn discriminate(object: &Map<String, Value>) -> bool {
        credential_type_in(object, &[CredentialType::IdToken])
    }
}

impl IndexedEntity for IdTokenEntity {
    const SLOT: IndexSlot = IndexSlot::Tokens(CredentialType::IdToken);

    fn cache_key(&self) -> String {
        keys::credential_key(CredentialKeyParts {
            home_account_id: &self.home_account_id,
            environment: &self.environment,
            credential_type: self.credential_type.as_str(),
            client_or_family_id: &self.client_id,
            realm: &self.realm,
            target: "",
            requested_claims_hash: "",
            scheme: "",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokenEntity {
    pub home_account_id: String,
    pub environment: String,
    pub credential_type: CredentialType,
    pub client_id: String,
    pub secret: String,
    pub realm: String,
    /// Space-separated scope set.
    pub target: String,
    /// Epoch seconds.
    pub cached_at: i64,
    /// Epoch seconds.
    pub expires_on: i64,
    /// Epoch seconds.
    pub extended_expires_on: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_on: Option<i64>,
    #[serde(default)]
    pub token_type: TokenType,
    /// Key binding for pop/ssh tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_claims: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_claims_hash: Option<String>,
}

impl AccessTokenEntity {
    pub fn scopes(&self) -> impl Iterator<Item = String> + '_ {
        self.target.split_whitespace().map(str::to_lowercase)
    }

    /// True when this token's scopes include every scope in `requested`.
    pub fn covers_scopes(&self, requested: &[String]) -> bool {
        let held: Vec<String> = self.scopes().collect();
        requested.iter().all(|scope| held.contains(&scope.to_lowercase()))
    }

    /// True when this token shares at least one scope with `other_target`.
    pub fn intersects_target(&self, other_target: &str) -> bool {
        let held: Vec<String> = self.scopes().collect();
        other_target
            .split_whitespace()
            .any(|scope| held.contains(&scope.to_lowercase()))
    }
}

impl CacheEntity for AccessTokenEntity {
    const REQUIRED_FIELDS: &'static [&'static str] = &[
        "homeAccountId",
        "environment",
        "credentialType",
        "clientId",
        "secret",
        "realm",
        "target",
    ];

    fn discriminate(object: &Map<String, Value>) -> bool {
        credential_type_in(object, &[CredentialType::AccessToken, CredentialType::AccessTokenWithAuthScheme])
    }
}

impl IndexedEntity for AccessTokenEntity {
    const SLOT: IndexSlot = IndexSlot::Tokens(CredentialType::AccessToken);

    fn cache_key(&self) -> String {
        keys::credential_key(CredentialKeyParts {
            home_account_id: &self.home_account_id,
            environment: &self.environment,
            credential_type: self.credential_type.as_str(),
            client_or_family_id: &self.client_id,
            realm: &self.realm,
            target: &self.target,
            requested_claims_hash: self.requested_claims_hash.as_deref().unwrap_or_default(),
            scheme: self.token_type.key_scheme(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenEntity {
    pub home_account_id: String,
    pub environment: String,
    pub credential_type: CredentialType,
    pub client_id: String,
    pub secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_on: Option<i64>,
}

impl CacheEntity for RefreshTokenEntity {
    const REQUIRED_FIELDS: &'static [&'static str] = &CREDENTIAL_FIELDS;

    fn discriminate(object: &Map<String, Value>) -> bool {
        credential_type_in(object, &[CredentialType::RefreshToken])
    }
}

impl IndexedEntity for RefreshTokenEntity {
    const SLOT: IndexSlot = IndexSlot::Tokens(CredentialType::RefreshToken);

    fn cache_key(&self) -> String {
        keys::credential_key(CredentialKeyParts {
            home_account_id: &self.home_account_id,
            environment: &self.environment,
            credential_type: self.credential_type.as_str(),
            client_or_family_id: self.family_id.as_deref().unwrap_or(&self.client_id),
            realm: "",
            target: "",
            requested_claims_hash: "",
            scheme: "",
        })
    }
}

macro_rules! impl_credential {
    ($($entity:ty),+) => {
        $(impl Credential for $entity {
            fn home_account_id(&self) -> &str {
                &self.home_account_id
            }

            fn environment(&self) -> &str {
                &self.environment
            }

            fn credential_type(&self) -> CredentialType {
                self.credential_type
            }

            fn client_id(&self) -> &str {
                &self.client_id
            }

            fn secret(&self) -> &str {
                &self.secret
            }
        })+
    };
}

impl_credential!(IdTokenEntity, AccessTokenEntity, RefreshTokenEntity);

/// Everything produced by one token response, written together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheRecord {
    pub account: Option<AccountEntity>,
    pub id_token: Option<IdTokenEntity>,
    pub access_token: Option<AccessTokenEntity>,
    pub refresh_token: Option<RefreshTokenEntity>,
    pub app_metadata: Option<AppMetadataEntity>,
}
