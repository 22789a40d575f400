//! Cache configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (TOKENSTASH_*)
//! 2. TOML config file (if TOKENSTASH_CONFIG_FILE set)
//! 3. Built-in defaults
//!
//! A loaded configuration is fixed for the lifetime of the cache manager
//! built from it.

use std::path::PathBuf;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::storage::CacheLocation;

mod validation;

pub use validation::ConfigError;

/// Cache configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (TOKENSTASH_*)
/// 2. TOML config file (if TOKENSTASH_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Application (client) id every namespaced key is scoped to.
    ///
    /// Set via TOKENSTASH_CLIENT_ID environment variable. Required.
    #[serde(default)]
    pub client_id: String,

    /// Medium for accounts, tokens and other persistent entities.
    ///
    /// Set via TOKENSTASH_CACHE_LOCATION.
    #[serde(default = "default_cache_location")]
    pub cache_location: CacheLocation,

    /// Medium for per-flow records and the interaction lock.
    ///
    /// Set via TOKENSTASH_TEMPORARY_CACHE_LOCATION.
    #[serde(default = "default_temporary_cache_location")]
    pub temporary_cache_location: CacheLocation,

    /// Mirror flow correlation keys into cookies.
    #[serde(default)]
    pub store_auth_state_in_cookie: bool,

    /// Mark mirrored cookies `Secure`.
    #[serde(default = "default_true")]
    pub secure_cookies: bool,

    /// Lifetime of mirrored cookies; session cookies when unset.
    #[serde(default)]
    pub cookie_life_days: Option<u32>,

    /// When disabled, access tokens acquired with requested claims are
    /// purged instead of reused.
    #[serde(default)]
    pub claims_based_caching_enabled: bool,

    /// Path to the SQLite database backing durable locations.
    ///
    /// Set via TOKENSTASH_DB_PATH.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Id of the session partition used by `session_storage`.
    #[serde(default = "default_session_id")]
    pub session_id: String,
}

fn default_cache_location() -> CacheLocation {
    CacheLocation::SessionStorage
}

fn default_temporary_cache_location() -> CacheLocation {
    CacheLocation::SessionStorage
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./tokenstash-cache.sqlite")
}

fn default_session_id() -> String {
    "default".into()
}

fn default_true() -> bool {
    true
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            cache_location: default_cache_location(),
            temporary_cache_location: default_temporary_cache_location(),
            store_auth_state_in_cookie: false,
            secure_cookies: true,
            cookie_life_days: None,
            claims_based_caching_enabled: false,
            db_path: default_db_path(),
            session_id: default_session_id(),
        }
    }
}

impl CacheConfig {
    /// Defaults for `client_id`, with memory storage for both scopes.
    pub fn for_client(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            cache_location: CacheLocation::MemoryStorage,
            temporary_cache_location: CacheLocation::MemoryStorage,
            ..Default::default()
        }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `TOKENSTASH_`
    /// 2. TOML file from `TOKENSTASH_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        Self::extract().and_then(|config| {
            config.validate()?;
            Ok(config)
        })
    }

    /// Load from all sources without validating, for callers that apply
    /// their own overrides first.
    pub fn extract() -> Result<Self, ConfigError> {
        Self::figment().extract::<Self>().map_err(|e| ConfigError::LoadFailed(e.to_string()))
    }

    fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("TOKENSTASH_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment.merge(
            Env::prefixed("TOKENSTASH_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        )
    }

    /// True when persistent entities live in the cross-session store, which
    /// older releases also used for flow records.
    pub fn persistent_is_shared(&self) -> bool {
        self.cache_location == CacheLocation::LocalStorage
    }
}
