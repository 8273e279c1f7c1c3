//! Shared response types for the MoonTV home endpoint.
//!
//! These shapes are the wire contract of `GET /api/home` and the exact JSON
//! stored under the home cache key, so field names follow the camelCase the
//! web client reads.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Default site name used when no configuration is reachable.
pub const DEFAULT_SITE_NAME: &str = "MoonTV";

/// Home page payload served to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomePayload {
    pub site_name: String,
    pub announcement: String,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub sources: Vec<Source>,
}

impl HomePayload {
    /// The degraded payload returned when neither the source nor the store can answer.
    pub fn empty() -> Self {
        Self {
            site_name: DEFAULT_SITE_NAME.to_string(),
            announcement: String::new(),
            categories: Vec::new(),
            sources: Vec::new(),
        }
    }
}

impl Default for HomePayload {
    fn default() -> Self {
        Self::empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryKind {
    Movie,
    Tv,
}

/// Where an entry was declared: the bundled config file or the admin panel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    #[default]
    Config,
    Custom,
}

/// Custom browse category (a named Douban query). Fields this crate does not
/// model are kept in `extra` and written back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: CategoryKind,
    pub query: String,
    #[serde(default)]
    pub from: Origin,
    #[serde(default)]
    pub disabled: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Video search source. Unmodelled fields survive in `extra`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub key: String,
    pub name: String,
    pub api: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default)]
    pub from: Origin,
    #[serde(default)]
    pub disabled: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
