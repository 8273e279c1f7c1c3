//! Builds the named key-value bindings declared in configuration.

use std::sync::Arc;

use tracing::info;

use crate::{
    config::{BindingBackend, BindingScope, BindingSettings},
    store::{Bindings, KvStore, MemoryStore, RedisStore},
};

use super::error::InfraError;

/// Bindings split by visibility: `env` is handed to every request and refresh
/// tick, `globals` backs the locator's process-level lookup.
#[derive(Debug, Clone, Default)]
pub struct ResolvedBindings {
    pub env: Bindings,
    pub globals: Bindings,
}

/// Connect every configured binding. Redis bindings connect eagerly so a bad
/// URL fails startup instead of the first request.
pub async fn build_bindings(settings: &[BindingSettings]) -> Result<ResolvedBindings, InfraError> {
    let mut resolved = ResolvedBindings::default();

    for binding in settings {
        let store: Arc<dyn KvStore> = match &binding.backend {
            BindingBackend::Memory { capacity } => Arc::new(MemoryStore::with_capacity(*capacity)),
            BindingBackend::Redis { url } => Arc::new(RedisStore::connect(url).await?),
        };

        info!(
            target = "moontv_home::infra::bindings",
            name = %binding.name,
            scope = ?binding.scope,
            backend = backend_label(&binding.backend),
            "key-value binding ready"
        );

        match binding.scope {
            BindingScope::Env => resolved.env.insert(binding.name.clone(), store),
            BindingScope::Global => resolved.globals.insert(binding.name.clone(), store),
        }
    }

    Ok(resolved)
}

fn backend_label(backend: &BindingBackend) -> &'static str {
    match backend {
        BindingBackend::Memory { .. } => "memory",
        BindingBackend::Redis { .. } => "redis",
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use super::*;

    fn memory(name: &str, scope: BindingScope) -> BindingSettings {
        BindingSettings {
            name: name.to_string(),
            scope,
            backend: BindingBackend::Memory {
                capacity: NonZeroUsize::new(8).expect("non-zero"),
            },
        }
    }

    #[tokio::test]
    async fn bindings_are_split_by_scope_in_order() {
        let resolved = build_bindings(&[
            memory("KV_CACHE", BindingScope::Env),
            memory("SESSIONS", BindingScope::Env),
            memory("_internal", BindingScope::Global),
        ])
        .await
        .expect("bindings");

        assert_eq!(
            resolved.env.names().collect::<Vec<_>>(),
            vec!["KV_CACHE", "SESSIONS"]
        );
        assert_eq!(resolved.globals.names().collect::<Vec<_>>(), vec!["_internal"]);
    }

    #[tokio::test]
    async fn invalid_redis_url_fails_startup() {
        let err = build_bindings(&[BindingSettings {
            name: "KV".to_string(),
            scope: BindingScope::Global,
            backend: BindingBackend::Redis {
                url: "not a redis url".to_string(),
            },
        }])
        .await
        .expect_err("invalid url");

        assert!(matches!(err, InfraError::Store(_)));
    }
}
