//! In-process key-value store with per-key expiry.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{KvStore, PutOptions, StoreError};

const SOURCE: &str = "store::memory";
const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// Key-value store kept in process memory.
///
/// Expired entries are invisible to `get` and are purged lazily when a write
/// finds the store at capacity. If every entry is still live, the one closest
/// to expiry is evicted.
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Entry>>,
    capacity: NonZeroUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_capacity(NonZeroUsize::new(DEFAULT_CAPACITY).unwrap_or(NonZeroUsize::MIN))
    }

    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    /// Number of entries held, expired or not.
    pub fn len(&self) -> usize {
        self.read("len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self, op: &'static str) -> RwLockReadGuard<'_, HashMap<String, Entry>> {
        self.entries.read().unwrap_or_else(|poisoned| {
            warn!(
                op,
                target_module = SOURCE,
                lock_kind = "rwlock.read",
                "Recovered from poisoned store lock"
            );
            poisoned.into_inner()
        })
    }

    fn write(&self, op: &'static str) -> RwLockWriteGuard<'_, HashMap<String, Entry>> {
        self.entries.write().unwrap_or_else(|poisoned| {
            warn!(
                op,
                target_module = SOURCE,
                lock_kind = "rwlock.write",
                "Recovered from poisoned store lock"
            );
            poisoned.into_inner()
        })
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn make_room(entries: &mut HashMap<String, Entry>, capacity: usize, now: Instant) {
    entries.retain(|_, entry| entry.is_live(now));
    if entries.len() < capacity {
        return;
    }

    let oldest = entries
        .iter()
        .min_by_key(|(_, entry)| entry.expires_at)
        .map(|(key, _)| key.clone());
    if let Some(key) = oldest {
        debug!(target = SOURCE, key = %key, "evicting entry closest to expiry");
        entries.remove(&key);
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        Ok(self
            .read("get")
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone()))
    }

    async fn put(&self, key: &str, value: String, options: PutOptions) -> Result<(), StoreError> {
        let now = Instant::now();
        let mut entries = self.write("put");
        if !entries.contains_key(key) && entries.len() >= self.capacity.get() {
            make_room(&mut entries, self.capacity.get(), now);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: now + options.ttl,
            },
        );
        Ok(())
    }
}
