//! Hashing and encoding seam.
//!
//! The cache never signs anything itself; it only needs a stable hash for
//! requested-claims strings, base64 for state blobs and cached requests, and
//! fresh request ids.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

#[async_trait]
pub trait CryptoProvider: Send + Sync {
    /// Stable, URL-safe digest of `plain`.
    async fn hash_string(&self, plain: &str) -> String;

    fn base64_encode(&self, plain: &str) -> String;

    /// Decode base64 in either alphabet, with or without padding. `None` when
    /// the input is not base64 or not UTF-8.
    fn base64_decode(&self, encoded: &str) -> Option<String>;

    fn create_new_guid(&self) -> String;
}

/// SHA-256 and base64url implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCryptoProvider;

#[async_trait]
impl CryptoProvider for DefaultCryptoProvider {
    async fn hash_string(&self, plain: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(plain.as_bytes());
        URL_SAFE_NO_PAD.encode(hasher.finalize())
    }

    fn base64_encode(&self, plain: &str) -> String {
        URL_SAFE_NO_PAD.encode(plain.as_bytes())
    }

    fn base64_decode(&self, encoded: &str) -> Option<String> {
        let normalized: String = encoded
            .trim_end_matches('=')
            .chars()
            .map(|c| match c {
                '+' => '-',
                '/' => '_',
                other => other,
            })
            .collect();
        let bytes = URL_SAFE_NO_PAD.decode(normalized).ok()?;
        String::from_utf8(bytes).ok()
    }

    fn create_new_guid(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

#[cfg(test)]
mod tests {
    use base64::engine::general_purpose::STANDARD;

    use super::*;

    #[tokio::test]
    async fn test_hash_stability() {
        let crypto = DefaultCryptoProvider;
        let first = crypto.hash_string(r#"{"access_token":{"xms_cc":null}}"#).await;
        let second = crypto.hash_string(r#"{"access_token":{"xms_cc":null}}"#).await;
        assert_eq!(first, second);
        assert_eq!(first.len(), 43);
        assert!(!first.contains(['+', '/', '=']));
    }

    #[tokio::test]
    async fn test_hash_differs_by_input() {
        let crypto = DefaultCryptoProvider;
        assert_ne!(crypto.hash_string("a").await, crypto.hash_string("b").await);
    }

    #[test]
    fn test_decode_accepts_both_alphabets() {
        let crypto = DefaultCryptoProvider;
        let plain = "subjects?>>";
        assert_eq!(crypto.base64_decode(&crypto.base64_encode(plain)).as_deref(), Some(plain));
        assert_eq!(crypto.base64_decode(&STANDARD.encode(plain)).as_deref(), Some(plain));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(DefaultCryptoProvider.base64_decode("not base64 at all!").is_none());
    }

    #[test]
    fn test_guid_shape() {
        let id = DefaultCryptoProvider.create_new_guid();
        assert_eq!(id.len(), 36);
        assert_ne!(id, DefaultCryptoProvider.create_new_guid());
    }
}
