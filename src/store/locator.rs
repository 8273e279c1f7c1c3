//! Binding discovery by name.
//!
//! Deployments name their key-value binding inconsistently, so the locator
//! accepts a handful of conventional names before settling for whatever
//! binding it can find.

use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::config::StorageMode;

use super::KvStore;

/// Binding names probed, in order, before falling back to any binding.
pub const BINDING_CANDIDATES: [&str; 4] = ["kv_cache", "KV_CACHE", "kv", "KV"];

/// Insertion-ordered set of named bindings.
#[derive(Clone, Default)]
pub struct Bindings {
    entries: Vec<(String, Arc<dyn KvStore>)>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a binding; a repeated name replaces the earlier binding in place.
    pub fn insert(&mut self, name: impl Into<String>, store: Arc<dyn KvStore>) {
        let name = name.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = store,
            None => self.entries.push((name, store)),
        }
    }

    pub fn with(mut self, name: impl Into<String>, store: Arc<dyn KvStore>) -> Self {
        self.insert(name, store);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn KvStore>> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, store)| store)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn KvStore>)> {
        self.entries.iter().map(|(name, store)| (name.as_str(), store))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Bindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Resolves a key-value binding from request-scoped and global bindings.
#[derive(Clone, Debug)]
pub struct KvLocator {
    globals: Bindings,
    mode: StorageMode,
}

impl KvLocator {
    pub fn new(globals: Bindings, mode: StorageMode) -> Self {
        Self { globals, mode }
    }

    pub fn globals(&self) -> &Bindings {
        &self.globals
    }

    pub fn mode(&self) -> StorageMode {
        self.mode
    }

    /// Find a binding.
    ///
    /// Probes [`BINDING_CANDIDATES`] in `env`, then in the global bindings,
    /// then takes the first binding of the two combined (environment names
    /// first, a global binding shadowing an environment binding of the same
    /// name). Returns `None` when neither holds any binding.
    pub fn locate(&self, env: Option<&Bindings>) -> Option<Arc<dyn KvStore>> {
        let empty = Bindings::new();
        let env = env.unwrap_or(&empty);

        let by_name = |bindings: &Bindings| {
            BINDING_CANDIDATES
                .iter()
                .find_map(|name| bindings.get(name).cloned())
        };

        if let Some(store) = by_name(env) {
            return Some(store);
        }
        if let Some(store) = by_name(&self.globals) {
            return Some(store);
        }

        let merged = env
            .iter()
            .map(|(name, store)| self.globals.get(name).unwrap_or(store))
            .chain(
                self.globals
                    .iter()
                    .filter(|(name, _)| !env.contains(name))
                    .map(|(_, store)| store),
            )
            .next()
            .cloned();
        if merged.is_some() {
            return merged;
        }

        if self.mode.is_kv() {
            let (env_keys, global_keys) = diagnostic_keys(env, &self.globals);
            warn!(
                target = "moontv_home::store::locator",
                env_keys = %env_keys,
                global_keys = %global_keys,
                "no key-value binding found"
            );
        }

        None
    }
}

/// Binding names listed by the not-found diagnostic; globals starting with
/// `_` are internal and left out.
fn diagnostic_keys(env: &Bindings, globals: &Bindings) -> (String, String) {
    let env_keys = env.names().collect::<Vec<_>>().join(", ");
    let global_keys = globals
        .names()
        .filter(|name| !name.starts_with('_'))
        .collect::<Vec<_>>()
        .join(", ");
    (env_keys, global_keys)
}
