//! Core types and shared functionality for tokenstash.
//!
//! This crate provides:
//! - Storage backends (SQLite, memory, cookie jar) behind one contract
//! - Key index maps and self-healing entity storage
//! - The cache manager used by sign-in flows
//! - Unified error types
//! - Configuration structures

pub mod config;
pub mod crypto;
pub mod entities;
pub mod error;
pub mod events;
pub mod index;
pub mod keys;
pub mod manager;
pub mod request_state;
pub mod storage;
pub mod store;

pub use config::{CacheConfig, ConfigError};
pub use crypto::{CryptoProvider, DefaultCryptoProvider};
pub use error::Error;
pub use events::CacheEvent;
pub use manager::{AccessTokenQuery, AuthenticationResult, CacheManager, HydrationRequest};
pub use request_state::{InteractionType, RequestState};
pub use storage::{CacheBackends, CacheLocation, StorageBackend};
