//! Authoritative home data: the admin configuration and its projection into
//! the home payload.

use async_trait::async_trait;
use moontv_home_types::{Category, DEFAULT_SITE_NAME, HomePayload, Source};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read configuration `{path}`: {message}")]
    Read { path: String, message: String },
    #[error("configuration `{path}` is malformed: {message}")]
    Malformed { path: String, message: String },
    #[error("configuration provider unavailable: {0}")]
    Unavailable(String),
}

impl SourceError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }
}

/// Site-wide settings block of the admin configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SiteConfig {
    pub site_name: String,
    pub announcement: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            site_name: DEFAULT_SITE_NAME.to_string(),
            announcement: String::new(),
        }
    }
}

/// Admin configuration document. Sections the home payload does not use are
/// ignored on read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AdminConfig {
    pub site_config: SiteConfig,
    pub source_config: Vec<Source>,
    pub custom_categories: Vec<Category>,
}

/// Supplies the current admin configuration.
#[async_trait]
pub trait ConfigProvider: Send + Sync {
    async fn load(&self) -> Result<AdminConfig, SourceError>;
}

/// Provider returning a fixed configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticConfigProvider {
    config: AdminConfig,
}

impl StaticConfigProvider {
    pub fn new(config: AdminConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ConfigProvider for StaticConfigProvider {
    async fn load(&self) -> Result<AdminConfig, SourceError> {
        Ok(self.config.clone())
    }
}

/// Build a fresh home payload from the provider.
///
/// Categories are copied as-is; disabled sources are dropped and the rest
/// keep their configured order.
pub async fn fetch_home_from_source(
    provider: &dyn ConfigProvider,
) -> Result<HomePayload, SourceError> {
    let config = provider.load().await?;
    Ok(project(config))
}

fn project(config: AdminConfig) -> HomePayload {
    let AdminConfig {
        site_config,
        source_config,
        custom_categories,
    } = config;

    HomePayload {
        site_name: site_config.site_name,
        announcement: site_config.announcement,
        categories: custom_categories,
        sources: source_config
            .into_iter()
            .filter(|source| !source.disabled)
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use moontv_home_types::{CategoryKind, Origin};

    use super::*;

    fn source(key: &str, disabled: bool) -> Source {
        Source {
            key: key.to_string(),
            name: format!("{key} source"),
            api: format!("https://{key}.example/api.php/provide/vod"),
            detail: None,
            from: Origin::Config,
            disabled,
            extra: Default::default(),
        }
    }

    fn category(query: &str, disabled: bool) -> Category {
        Category {
            name: Some(query.to_string()),
            kind: CategoryKind::Tv,
            query: query.to_string(),
            from: Origin::Custom,
            disabled,
            extra: Default::default(),
        }
    }

    #[tokio::test]
    async fn disabled_sources_are_dropped_in_order() {
        let provider = StaticConfigProvider::new(AdminConfig {
            site_config: SiteConfig {
                site_name: "Moon".to_string(),
                announcement: "hello".to_string(),
            },
            source_config: vec![
                source("a", false),
                source("b", true),
                source("c", false),
                source("d", true),
                source("e", false),
            ],
            custom_categories: Vec::new(),
        });

        let payload = fetch_home_from_source(&provider).await.expect("payload");

        let keys: Vec<_> = payload.sources.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "c", "e"]);
        assert_eq!(payload.site_name, "Moon");
        assert_eq!(payload.announcement, "hello");
    }

    #[tokio::test]
    async fn categories_are_copied_verbatim() {
        let categories = vec![category("美剧", true), category("日剧", false)];
        let provider = StaticConfigProvider::new(AdminConfig {
            custom_categories: categories.clone(),
            ..Default::default()
        });

        let payload = fetch_home_from_source(&provider).await.expect("payload");
        assert_eq!(payload.categories, categories);
    }

    #[test]
    fn admin_config_reads_pascal_case_document() {
        let config: AdminConfig = serde_json::from_value(serde_json::json!({
            "SiteConfig": {
                "SiteName": "Moon",
                "Announcement": "notice",
                "SearchDownstreamMaxPage": 5
            },
            "SourceConfig": [
                { "key": "a", "name": "A", "api": "https://a.example", "from": "config" }
            ],
            "UserConfig": { "Users": [] }
        }))
        .expect("deserialize");

        assert_eq!(config.site_config.site_name, "Moon");
        assert_eq!(config.source_config.len(), 1);
        assert!(config.custom_categories.is_empty());
    }

    #[test]
    fn missing_site_config_uses_defaults() {
        let config: AdminConfig = serde_json::from_str("{}").expect("deserialize");
        assert_eq!(config.site_config.site_name, DEFAULT_SITE_NAME);
        assert_eq!(config.site_config.announcement, "");
    }
}
