//! Cached entity types and their tagged decoders.
//!
//! Every entity read from storage passes through [`decode`], which checks the
//! discriminator fields of the raw JSON object before handing it to serde.
//! A value that is not JSON, not an object, lacks a required field, or carries
//! the wrong discriminator decodes to [`Decoded::Invalid`]; getters treat that
//! exactly like a miss.

pub mod account;
pub mod credential;
pub mod metadata;

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::index::IndexSlot;

pub use account::{AccountEntity, AccountFilter, AccountInfo, ActiveAccountFilters, AuthorityType};
pub use credential::{
    AccessTokenEntity, CacheRecord, Credential, IdTokenEntity, RefreshTokenEntity, TokenType, FAMILY_ID,
};
pub use metadata::{AppMetadataEntity, AuthorityMetadataEntity, ServerTelemetryEntity, ThrottlingEntity};

/// Credential category tag stored in every credential entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CredentialType {
    #[serde(rename = "IdToken")]
    IdToken,
    #[serde(rename = "AccessToken")]
    AccessToken,
    #[serde(rename = "AccessToken_With_AuthScheme")]
    AccessTokenWithAuthScheme,
    #[serde(rename = "RefreshToken")]
    RefreshToken,
}

impl CredentialType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialType::IdToken => "IdToken",
            CredentialType::AccessToken => "AccessToken",
            CredentialType::AccessTokenWithAuthScheme => "AccessToken_With_AuthScheme",
            CredentialType::RefreshToken => "RefreshToken",
        }
    }
}

impl fmt::Display for CredentialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of decoding a raw stored value as a specific entity.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded<T> {
    Valid(T),
    /// The stored value is not a `T`; carries a short reason for logging.
    Invalid(&'static str),
}

impl<T> Decoded<T> {
    pub fn valid(self) -> Option<T> {
        match self {
            Decoded::Valid(entity) => Some(entity),
            Decoded::Invalid(_) => None,
        }
    }
}

/// An entity that can be stored as JSON and recognized on the way back.
pub trait CacheEntity: Serialize + DeserializeOwned {
    /// Fields that must be present and non-null in the stored object.
    const REQUIRED_FIELDS: &'static [&'static str];

    /// Extra discriminator check on the raw object, run after the required
    /// fields are known to be present.
    fn discriminate(_object: &Map<String, Value>) -> bool {
        true
    }
}

/// An entity whose keys are tracked in a key index.
pub trait IndexedEntity: CacheEntity {
    const SLOT: IndexSlot;

    /// Canonical storage key.
    fn cache_key(&self) -> String;
}

/// Decode a raw stored string as entity `T`.
pub fn decode<T: CacheEntity>(raw: &str) -> Decoded<T> {
    let Ok(value) = serde_json::from_str::<Value>(raw) else {
        return Decoded::Invalid("not valid JSON");
    };

    {
        let Some(object) = value.as_object() else {
            return Decoded::Invalid("not a JSON object");
        };
        let has_required = T::REQUIRED_FIELDS
            .iter()
            .all(|field| object.get(*field).is_some_and(|v| !v.is_null()));
        if !has_required {
            return Decoded::Invalid("missing required fields");
        }
        if !T::discriminate(object) {
            return Decoded::Invalid("discriminator mismatch");
        }
    }

    match serde_json::from_value(value) {
        Ok(entity) => Decoded::Valid(entity),
        Err(_) => Decoded::Invalid("field type mismatch"),
    }
}

/// True when `object["credentialType"]` is one of `allowed`.
pub(crate) fn credential_type_in(object: &Map<String, Value>, allowed: &[CredentialType]) -> bool {
    object
        .get("credentialType")
        .and_then(Value::as_str)
        .is_some_and(|tag| allowed.iter().any(|ct| ct.as_str() == tag))
}
