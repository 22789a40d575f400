//! Cookie-jar storage for flow keys that must survive a full-page redirect
//! on hosts where the temporary scope does not.

use async_trait::async_trait;
use cookie::{Cookie, CookieJar, SameSite};
use parking_lot::Mutex;
use time::{Duration, OffsetDateTime};

use super::StorageBackend;
use crate::Error;

/// Maximum encoded size of one cookie (`name=value`).
pub const COOKIE_SIZE_LIMIT: usize = 4096;

/// Cookie-backed key/value store.
///
/// Values are held in a [`CookieJar`]; the pending `Set-Cookie` lines for the
/// host are available through [`CookieStorage::set_cookie_headers`].
pub struct CookieStorage {
    jar: Mutex<CookieJar>,
    secure: bool,
    life_days: Option<u32>,
}

impl CookieStorage {
    pub fn new(secure: bool, life_days: Option<u32>) -> Self {
        Self { jar: Mutex::new(CookieJar::new()), secure, life_days }
    }

    /// Rendered `Set-Cookie` values for every change made through this store.
    pub fn set_cookie_headers(&self) -> Vec<String> {
        self.jar
            .lock()
            .delta()
            .map(|cookie| cookie.encoded().to_string())
            .collect()
    }

    fn is_expired(cookie: &Cookie<'_>) -> bool {
        cookie
            .expires_datetime()
            .is_some_and(|expires| expires <= OffsetDateTime::now_utc())
    }
}

#[async_trait]
impl StorageBackend for CookieStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        let jar = self.jar.lock();
        let cookie = jar.get(key)?;
        if Self::is_expired(cookie) {
            return None;
        }
        Some(cookie.value().to_string())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), Error> {
        let size = Cookie::new(key, value).encoded().to_string().len();
        if size > COOKIE_SIZE_LIMIT {
            tracing::warn!(key, size, "cookie exceeds size limit, not stored");
            return Err(Error::CookieTooLarge { key: key.to_string(), size, limit: COOKIE_SIZE_LIMIT });
        }

        let mut builder = Cookie::build((key.to_string(), value.to_string()))
            .path("/")
            .same_site(SameSite::Lax)
            .secure(self.secure);
        if let Some(days) = self.life_days {
            builder = builder.expires(OffsetDateTime::now_utc() + Duration::days(i64::from(days)));
        }
        self.jar.lock().add(builder.build());
        Ok(())
    }

    fn remove_item(&self, key: &str) {
        self.jar.lock().remove(Cookie::build((key.to_string(), "")).path("/"));
    }

    fn keys(&self) -> Vec<String> {
        self.jar
            .lock()
            .iter()
            .filter(|cookie| !Self::is_expired(cookie))
            .map(|cookie| cookie.name().to_string())
            .collect()
    }

    fn clear(&self) {
        let mut jar = self.jar.lock();
        let names: Vec<String> = jar.iter().map(|cookie| cookie.name().to_string()).collect();
        for name in names {
            jar.remove(Cookie::build((name, "")).path("/"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let storage = CookieStorage::new(true, None);
        storage.set_item("tokenstash.client.request.origin", "https://app.example.com/").unwrap();
        assert_eq!(
            storage.get_item("tokenstash.client.request.origin").as_deref(),
            Some("https://app.example.com/")
        );
        assert_eq!(storage.keys(), vec!["tokenstash.client.request.origin".to_string()]);
    }

    #[test]
    fn test_size_ceiling() {
        let storage = CookieStorage::new(true, None);
        let big = "x".repeat(COOKIE_SIZE_LIMIT);
        let err = storage.set_item("key", &big).unwrap_err();
        assert!(matches!(err, Error::CookieTooLarge { limit: COOKIE_SIZE_LIMIT, .. }));
        assert!(storage.get_item("key").is_none());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let storage = CookieStorage::new(false, None);
        storage.set_item("k", "v").unwrap();
        storage.remove_item("k");
        storage.remove_item("k");
        assert!(storage.get_item("k").is_none());
        assert!(storage.keys().is_empty());
    }

    #[test]
    fn test_set_cookie_headers_carry_flags() {
        let storage = CookieStorage::new(true, Some(1));
        storage.set_item("k", "a value").unwrap();
        let headers = storage.set_cookie_headers();
        assert_eq!(headers.len(), 1);
        assert!(headers[0].starts_with("k=a%20value"));
        assert!(headers[0].contains("Secure"));
        assert!(headers[0].contains("SameSite=Lax"));
        assert!(headers[0].contains("Expires="));
    }

    #[test]
    fn test_clear() {
        let storage = CookieStorage::new(true, None);
        storage.set_item("a", "1").unwrap();
        storage.set_item("b", "2").unwrap();
        storage.clear();
        assert!(storage.keys().is_empty());
    }
}
