//! Non-credential entities: app metadata, telemetry, throttling and
//! authority metadata.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::CacheEntity;
use crate::keys;

/// Per-client record used for refresh-token family grouping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppMetadataEntity {
    pub client_id: String,
    pub environment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_id: Option<String>,
}

impl AppMetadataEntity {
    pub fn cache_key(&self) -> String {
        keys::app_metadata_key(&self.environment, &self.client_id)
    }
}

impl CacheEntity for AppMetadataEntity {
    const REQUIRED_FIELDS: &'static [&'static str] = &["clientId", "environment"];
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerTelemetryEntity {
    /// Alternating api id / correlation id pairs of failed requests.
    pub failed_requests: Vec<Value>,
    pub errors: Vec<String>,
    pub cache_hits: u32,
}

impl CacheEntity for ServerTelemetryEntity {
    const REQUIRED_FIELDS: &'static [&'static str] = &["failedRequests", "errors", "cacheHits"];
}

/// Server-requested back-off for a request fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThrottlingEntity {
    /// Epoch milliseconds until which the request must not be retried.
    pub throttle_time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_codes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_error: Option<String>,
}

impl CacheEntity for ThrottlingEntity {
    const REQUIRED_FIELDS: &'static [&'static str] = &["throttleTime"];
}

/// Discovery metadata for an authority. Kept in memory only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorityMetadataEntity {
    pub aliases: Vec<String>,
    pub preferred_cache: String,
    pub preferred_network: String,
    pub canonical_authority: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_session_endpoint: Option<String>,
    pub issuer: String,
    pub jwks_uri: String,
    #[serde(rename = "aliasesFromNetwork")]
    pub aliases_from_network: bool,
    #[serde(rename = "endpointsFromNetwork")]
    pub endpoints_from_network: bool,
    /// Epoch seconds.
    #[serde(rename = "expiresAt")]
    pub expires_at: i64,
}

impl CacheEntity for AuthorityMetadataEntity {
    const REQUIRED_FIELDS: &'static [&'static str] = &[
        "aliases",
        "preferred_cache",
        "preferred_network",
        "canonical_authority",
        "authorization_endpoint",
        "token_endpoint",
        "issuer",
        "jwks_uri",
        "aliasesFromNetwork",
        "endpointsFromNetwork",
        "expiresAt",
    ];
}
