//! Key-value store bindings.
//!
//! A binding is anything that can `get` a string by key and `put` a string
//! with a time-to-live. The home cache never owns one; it resolves a binding
//! through [`KvLocator`] for every request or refresh tick.
//!
//! - [`MemoryStore`]: in-process store with per-key expiry
//! - [`RedisStore`]: Redis-backed store using `GET` / `SET EX`

mod locator;
mod memory;
mod redis_store;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use locator::{BINDING_CANDIDATES, Bindings, KvLocator};
pub use memory::MemoryStore;
pub use redis_store::RedisStore;

/// Options accepted by [`KvStore::put`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PutOptions {
    /// Time after which the store drops the entry.
    pub ttl: Duration,
}

impl PutOptions {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self { ttl }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend `{backend}` failed: {message}")]
    Backend {
        backend: &'static str,
        message: String,
    },
    #[error("store connection failed: {0}")]
    Connection(String),
}

impl StoreError {
    pub fn backend(backend: &'static str, message: impl Into<String>) -> Self {
        Self::Backend {
            backend,
            message: message.into(),
        }
    }
}

/// A managed key-value store with per-key expiration.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn put(&self, key: &str, value: String, options: PutOptions) -> Result<(), StoreError>;
}
