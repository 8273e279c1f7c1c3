use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use moontv_home::application::home::{HomeCache, HomeCacheConfig};
use moontv_home::application::source::{AdminConfig, SiteConfig, StaticConfigProvider};
use moontv_home::config::StorageMode;
use moontv_home::infra::http::{HttpState, build_router};
use moontv_home::infra::provider::FileConfigProvider;
use moontv_home::store::{Bindings, KvLocator, KvStore, MemoryStore, PutOptions};
use moontv_home_types::{Category, CategoryKind, HomePayload, Origin, Source};
use serde_json::{Value, json};
use tower::ServiceExt;

fn source(key: &str, disabled: bool) -> Source {
    Source {
        key: key.to_string(),
        name: key.to_uppercase(),
        api: format!("https://{key}.example/api.php/provide/vod"),
        detail: None,
        from: Origin::Config,
        disabled,
        extra: Default::default(),
    }
}

fn admin_config() -> AdminConfig {
    AdminConfig {
        site_config: SiteConfig {
            site_name: "Moon Cinema".to_string(),
            announcement: "Welcome".to_string(),
        },
        source_config: vec![source("alpha", false), source("beta", true), source("gamma", false)],
        custom_categories: vec![Category {
            name: Some("Dramas".to_string()),
            kind: CategoryKind::Tv,
            query: "美剧".to_string(),
            from: Origin::Custom,
            disabled: true,
            extra: Default::default(),
        }],
    }
}

fn router_with(home: HomeCache, env: Bindings) -> Router {
    build_router(HttpState {
        home: Arc::new(home),
        env,
    })
}

async fn get_home(app: &Router) -> (StatusCode, Option<String>, Value) {
    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/home")
        .body(Body::empty())
        .expect("request should build");
    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("router should respond");

    let status = response.status();
    let cache_control = response
        .headers()
        .get(header::CACHE_CONTROL)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should collect")
        .to_bytes();
    let body = serde_json::from_slice(&bytes).expect("body should be json");
    (status, cache_control, body)
}

#[tokio::test]
async fn home_endpoint_serves_fresh_payload_and_writes_cache() {
    let store = Arc::new(MemoryStore::new());
    let env = Bindings::new().with("KV_CACHE", store.clone());
    let home = HomeCache::new(
        HomeCacheConfig::default(),
        Arc::new(StaticConfigProvider::new(admin_config())),
        KvLocator::new(Bindings::new(), StorageMode::Kv),
    );
    let app = router_with(home, env);

    let (status, cache_control, body) = get_home(&app).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(cache_control.as_deref(), Some("no-store"));
    assert_eq!(body["siteName"], "Moon Cinema");
    assert_eq!(body["announcement"], "Welcome");
    let keys: Vec<_> = body["sources"]
        .as_array()
        .expect("sources array")
        .iter()
        .map(|source| source["key"].as_str().expect("key"))
        .collect();
    assert_eq!(keys, vec!["alpha", "gamma"]);
    assert_eq!(body["categories"][0]["type"], "tv");
    assert_eq!(body["categories"][0]["disabled"], true);

    let cached = store
        .get("home:index")
        .await
        .expect("store read")
        .expect("entry written");
    let cached: Value = serde_json::from_str(&cached).expect("cached json");
    assert_eq!(cached, body);
}

#[tokio::test]
async fn home_endpoint_serves_stale_entry_when_source_fails() {
    let dir = tempfile::tempdir().expect("temp dir");
    let store = Arc::new(MemoryStore::new());
    let stale = HomePayload {
        site_name: "Yesterday".to_string(),
        ..HomePayload::empty()
    };
    store
        .put(
            "home:index",
            serde_json::to_string(&stale).expect("encode"),
            PutOptions::with_ttl(Duration::from_secs(300)),
        )
        .await
        .expect("seed");

    let home = HomeCache::new(
        HomeCacheConfig {
            mode: StorageMode::LocalStorage,
            ..HomeCacheConfig::default()
        },
        Arc::new(FileConfigProvider::new(dir.path().join("missing.json"))),
        KvLocator::new(Bindings::new().with("kv", store.clone()), StorageMode::LocalStorage),
    );
    let app = router_with(home, Bindings::new());

    let (status, cache_control, body) = get_home(&app).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(cache_control.as_deref(), Some("no-store"));
    assert_eq!(body["siteName"], "Yesterday");
}

#[tokio::test]
async fn home_endpoint_serves_empty_payload_when_everything_fails() {
    let dir = tempfile::tempdir().expect("temp dir");
    let home = HomeCache::new(
        HomeCacheConfig::default(),
        Arc::new(FileConfigProvider::new(dir.path().join("missing.json"))),
        KvLocator::new(Bindings::new(), StorageMode::Kv),
    );
    let app = router_with(home, Bindings::new());

    let (status, cache_control, body) = get_home(&app).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(cache_control.as_deref(), Some("no-store"));
    assert_eq!(
        body,
        json!({
            "siteName": "MoonTV",
            "announcement": "",
            "categories": [],
            "sources": []
        })
    );
}
