//! Read-through cache for the home payload.
//!
//! [`HomeCache`] answers every request with some payload: the cached entry
//! when key-value mode is on, otherwise a fresh projection of the admin
//! configuration, and on any failure whatever the store still holds or the
//! fixed empty payload.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use metrics::counter;
use moontv_home_types::HomePayload;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::application::source::{ConfigProvider, SourceError, fetch_home_from_source};
use crate::config::{HomeSettings, StorageMode};
use crate::store::{Bindings, KvLocator, KvStore, PutOptions, StoreError};

const SOURCE: &str = "application::home::HomeCache";

pub const DEFAULT_CACHE_KEY: &str = "home:index";
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(180);

#[derive(Debug, Error)]
pub enum HomeError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("cached home payload could not be (de)serialized: {0}")]
    Codec(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct HomeCacheConfig {
    pub mode: StorageMode,
    pub cache_key: String,
    pub ttl: Duration,
    pub refresh_interval: Duration,
}

impl Default for HomeCacheConfig {
    fn default() -> Self {
        Self {
            mode: StorageMode::Kv,
            cache_key: DEFAULT_CACHE_KEY.to_string(),
            ttl: DEFAULT_CACHE_TTL,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
        }
    }
}

impl HomeCacheConfig {
    pub fn from_settings(mode: StorageMode, home: &HomeSettings) -> Self {
        Self {
            mode,
            cache_key: home.cache_key.clone(),
            ttl: home.ttl,
            refresh_interval: home.refresh_interval,
        }
    }
}

pub struct HomeCache {
    config: HomeCacheConfig,
    provider: Arc<dyn ConfigProvider>,
    locator: KvLocator,
    refresh: Mutex<Option<JoinHandle<()>>>,
}

impl HomeCache {
    pub fn new(
        config: HomeCacheConfig,
        provider: Arc<dyn ConfigProvider>,
        locator: KvLocator,
    ) -> Self {
        Self {
            config,
            provider,
            locator,
            refresh: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &HomeCacheConfig {
        &self.config
    }

    /// Resolve the home payload for a request. Never fails.
    pub async fn get_home(&self, env: Option<&Bindings>) -> HomePayload {
        match self.read_through(env).await {
            Ok(payload) => payload,
            Err(err) => {
                error!(target = SOURCE, error = %err, "home payload lookup failed");
                counter!("moontv_home_fallback_total").increment(1);
                self.degraded(env).await
            }
        }
    }

    async fn read_through(&self, env: Option<&Bindings>) -> Result<HomePayload, HomeError> {
        if self.config.mode.is_kv() {
            if let Some(store) = self.locator.locate(env) {
                if let Some(payload) = self.read_entry(store.as_ref()).await? {
                    counter!("moontv_home_cache_hit_total").increment(1);
                    return Ok(payload);
                }
            }
        }

        counter!("moontv_home_cache_miss_total").increment(1);
        let payload = fetch_home_from_source(self.provider.as_ref()).await?;

        // Written back in every storage mode.
        if let Some(store) = self.locator.locate(env) {
            self.write_entry(store.as_ref(), &payload).await?;
        }

        Ok(payload)
    }

    async fn degraded(&self, env: Option<&Bindings>) -> HomePayload {
        let Some(store) = self.locator.locate(env) else {
            return HomePayload::empty();
        };

        match self.read_entry(store.as_ref()).await {
            Ok(Some(payload)) => {
                warn!(
                    target = SOURCE,
                    key = %self.config.cache_key,
                    "serving stale home payload from store"
                );
                payload
            }
            Ok(None) => HomePayload::empty(),
            Err(err) => {
                error!(target = SOURCE, error = %err, "fallback store read failed");
                HomePayload::empty()
            }
        }
    }

    async fn read_entry(&self, store: &dyn KvStore) -> Result<Option<HomePayload>, HomeError> {
        match store.get(&self.config.cache_key).await? {
            Some(raw) if !raw.is_empty() => Ok(Some(serde_json::from_str(&raw)?)),
            _ => Ok(None),
        }
    }

    async fn write_entry(&self, store: &dyn KvStore, payload: &HomePayload) -> Result<(), HomeError> {
        let raw = serde_json::to_string(payload)?;
        store
            .put(
                &self.config.cache_key,
                raw,
                PutOptions::with_ttl(self.config.ttl),
            )
            .await?;
        Ok(())
    }

    /// Fetch fresh data and write it to the store when a binding exists.
    pub async fn refresh(&self, env: Option<&Bindings>) -> Result<(), HomeError> {
        let payload = fetch_home_from_source(self.provider.as_ref()).await?;
        if let Some(store) = self.locator.locate(env) {
            self.write_entry(store.as_ref(), &payload).await?;
        }
        Ok(())
    }

    /// Start the background refresh loop.
    ///
    /// The first refresh runs immediately, then once per refresh interval.
    /// Returns `false` without doing anything when the loop is already
    /// running for this cache.
    pub fn start_auto_refresh(self: &Arc<Self>, env: Bindings) -> bool {
        let mut slot = self.refresh_slot("start_auto_refresh");
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            debug!(target = SOURCE, "auto refresh already running");
            return false;
        }

        let period = self.config.refresh_interval;
        let cache = Arc::downgrade(self);
        *slot = Some(tokio::spawn(refresh_loop(cache, env, period)));
        info!(
            target = SOURCE,
            interval_secs = period.as_secs(),
            "auto refresh started"
        );
        true
    }

    /// Abort the background refresh loop. Returns `false` if none was running.
    pub fn stop_auto_refresh(&self) -> bool {
        match self.refresh_slot("stop_auto_refresh").take() {
            Some(handle) => {
                handle.abort();
                info!(target = SOURCE, "auto refresh stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.refresh_slot("is_refreshing")
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    fn refresh_slot(&self, op: &'static str) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.refresh.lock().unwrap_or_else(|poisoned| {
            warn!(
                op,
                target_module = SOURCE,
                lock_kind = "mutex.lock",
                "Recovered from poisoned refresh lock"
            );
            poisoned.into_inner()
        })
    }
}

impl Drop for HomeCache {
    fn drop(&mut self) {
        if let Some(handle) = self.refresh.get_mut().ok().and_then(Option::take) {
            handle.abort();
        }
    }
}

async fn refresh_loop(cache: Weak<HomeCache>, env: Bindings, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        let Some(cache) = cache.upgrade() else {
            return;
        };

        counter!("moontv_home_refresh_total").increment(1);
        match cache.refresh(Some(&env)).await {
            Ok(()) => info!(target = SOURCE, "home cache refreshed"),
            Err(err) => {
                counter!("moontv_home_refresh_failed_total").increment(1);
                error!(target = SOURCE, error = %err, "home cache refresh failed");
            }
        }
    }
}
