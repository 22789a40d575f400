//! Configuration validation rules.
//!
//! This module provides validation logic for `CacheConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::CacheConfig;
use crate::storage::CacheLocation;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl CacheConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if `client_id` is empty, and
    /// `ConfigError::Invalid` if:
    /// - `client_id` contains the composite key separator `|`
    /// - `session_id` is empty
    /// - `cookie_life_days` is 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client_id.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: "client_id".into(),
                hint: "Set TOKENSTASH_CLIENT_ID environment variable".into(),
            });
        }
        if self.client_id.contains('|') {
            return Err(ConfigError::Invalid { field: "client_id".into(), reason: "must not contain '|'".into() });
        }

        if self.session_id.is_empty() {
            return Err(ConfigError::Invalid { field: "session_id".into(), reason: "must not be empty".into() });
        }

        if self.cookie_life_days == Some(0) {
            return Err(ConfigError::Invalid {
                field: "cookie_life_days".into(),
                reason: "must be at least 1 day; unset it for session cookies".into(),
            });
        }

        if self.temporary_cache_location == CacheLocation::LocalStorage {
            tracing::warn!(
                client_id = %self.client_id,
                "temporary_cache_location is local_storage; flow records will be visible to every session"
            );
        }

        if !self.store_auth_state_in_cookie && self.cookie_life_days.is_some() {
            tracing::warn!("cookie_life_days is set but store_auth_state_in_cookie is disabled");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> CacheConfig {
        CacheConfig { client_id: "client-a".into(), ..Default::default() }
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_validate_missing_client_id() {
        let config = CacheConfig::default();
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Missing { field, .. }) if field == "client_id"));
    }

    #[test]
    fn test_validate_client_id_with_separator() {
        let config = CacheConfig { client_id: "a|b".into(), ..valid() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "client_id"));
    }

    #[test]
    fn test_validate_empty_session_id() {
        let config = CacheConfig { session_id: String::new(), ..valid() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "session_id"));
    }

    #[test]
    fn test_validate_zero_cookie_life() {
        let config = CacheConfig { cookie_life_days: Some(0), ..valid() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "cookie_life_days"));
    }

    #[test]
    fn test_validate_edge_case_values() {
        let config = CacheConfig { cookie_life_days: Some(1), store_auth_state_in_cookie: true, ..valid() };
        assert!(config.validate().is_ok());
    }
}
