//! Redis-backed key-value binding.

use std::fmt;

use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};
use tracing::{debug, info};

use super::{KvStore, PutOptions, StoreError};

const BACKEND: &str = "redis";

/// Binding that stores entries in Redis with `SET EX`.
///
/// Uses a `ConnectionManager`, which reconnects on its own; clones share the
/// same underlying connection.
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
    url: String,
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client =
            redis::Client::open(url).map_err(|err| StoreError::Connection(err.to_string()))?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(|err| StoreError::Connection(err.to_string()))?;
        info!(target = "moontv_home::store", url = %url, "redis binding connected");

        Ok(Self {
            connection,
            url: url.to_string(),
        })
    }
}

/// Redis rejects `SET EX 0`; sub-second TTLs round up to one second.
fn ttl_seconds(options: PutOptions) -> u64 {
    options.ttl.as_secs().max(1)
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut connection = self.connection.clone();
        let value: Option<String> = connection
            .get(key)
            .await
            .map_err(|err| StoreError::backend(BACKEND, err.to_string()))?;
        debug!(key, hit = value.is_some(), "redis GET");
        Ok(value)
    }

    async fn put(&self, key: &str, value: String, options: PutOptions) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        let seconds = ttl_seconds(options);
        connection
            .set_ex::<_, _, ()>(key, value, seconds)
            .await
            .map_err(|err| StoreError::backend(BACKEND, err.to_string()))?;
        debug!(key, ttl_seconds = seconds, "redis SET EX");
        Ok(())
    }
}
