//! Unified error types for tokenstash.
//!
//! Display strings carry a stable upper-case code prefix so callers and logs
//! can classify failures without matching on variants.

use tokio_rusqlite::rusqlite;

use crate::entities::CredentialType;

/// Unified error type for the credential cache.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Another interactive flow holds the interaction lock.
    #[error("INTERACTION_IN_PROGRESS: interaction is currently in progress, held by client {0}")]
    InteractionInProgress(String),

    /// No token request was cached for the flow being completed.
    #[error("NO_TOKEN_REQUEST_CACHE: no cached token request found")]
    NoTokenRequestCache,

    /// The cached token request could not be decoded.
    #[error("UNABLE_TO_PARSE_TOKEN_REQUEST_CACHE: {0}")]
    UnableToParseTokenRequestCache(String),

    /// The authority for the flow was not found in the temporary cache.
    #[error("NO_CACHED_AUTHORITY: no cached authority found for request state")]
    NoCachedAuthority,

    /// Key-index maintenance was asked to track a category it has no slot for.
    #[error("UNEXPECTED_CREDENTIAL_TYPE: {0}")]
    UnexpectedCredentialType(CredentialType),

    /// The request state blob could not be parsed.
    #[error("INVALID_STATE: {0}")]
    InvalidState(String),

    /// A backend rejected a write because its capacity is exhausted.
    #[error("CACHE_QUOTA_EXCEEDED: {0}")]
    QuotaExceeded(String),

    /// A cookie would exceed the per-cookie size ceiling.
    #[error("COOKIE_TOO_LARGE: cookie for {key} is {size} bytes, limit is {limit}")]
    CookieTooLarge { key: String, size: usize, limit: usize },

    /// An entity could not be encoded for storage.
    #[error("CACHE_ERROR: failed to encode entity: {0}")]
    Encode(#[from] serde_json::Error),

    /// Backend used before `initialize` completed.
    #[error("CACHE_ERROR: storage backend not initialized")]
    NotInitialized,

    /// The background writer for a durable backend is gone.
    #[error("CACHE_ERROR: storage writer stopped")]
    WriterClosed,

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),
}

impl Error {
    /// Stable error code, matching the display prefix.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InteractionInProgress(_) => "INTERACTION_IN_PROGRESS",
            Error::NoTokenRequestCache => "NO_TOKEN_REQUEST_CACHE",
            Error::UnableToParseTokenRequestCache(_) => "UNABLE_TO_PARSE_TOKEN_REQUEST_CACHE",
            Error::NoCachedAuthority => "NO_CACHED_AUTHORITY",
            Error::UnexpectedCredentialType(_) => "UNEXPECTED_CREDENTIAL_TYPE",
            Error::InvalidState(_) => "INVALID_STATE",
            Error::QuotaExceeded(_) => "CACHE_QUOTA_EXCEEDED",
            Error::CookieTooLarge { .. } => "COOKIE_TOO_LARGE",
            Error::Encode(_)
            | Error::NotInitialized
            | Error::WriterClosed
            | Error::Database(_)
            | Error::MigrationFailed(_) => "CACHE_ERROR",
        }
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}
