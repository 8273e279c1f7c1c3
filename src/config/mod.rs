//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{
    fmt,
    net::SocketAddr,
    num::NonZeroUsize,
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

pub use cli::{CliArgs, Command, HomeOverrides, ServeArgs, ServeOverrides, ShowArgs};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "moontv-home";
const ENV_PREFIX: &str = "MOONTV_HOME";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_STORAGE_MODE: StorageMode = StorageMode::LocalStorage;
const DEFAULT_CACHE_KEY: &str = "home:index";
const DEFAULT_CACHE_TTL_SECS: u64 = 300;
const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 180;
const DEFAULT_ADMIN_CONFIG_PATH: &str = "config.json";
const DEFAULT_BINDING_NAME: &str = "KV_CACHE";
const DEFAULT_MEMORY_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub storage: StorageSettings,
    pub home: HomeSettings,
    pub bindings: Vec<BindingSettings>,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

/// Storage backend the deployment is configured for. Only [`StorageMode::Kv`]
/// serves the home payload from the key-value store before asking the source;
/// unrecognised values land in [`StorageMode::Other`] and behave as non-kv.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageMode {
    Kv,
    LocalStorage,
    Redis,
    Upstash,
    D1,
    Other,
}

impl StorageMode {
    pub fn is_kv(self) -> bool {
        matches!(self, StorageMode::Kv)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StorageMode::Kv => "kv",
            StorageMode::LocalStorage => "localstorage",
            StorageMode::Redis => "redis",
            StorageMode::Upstash => "upstash",
            StorageMode::D1 => "d1",
            StorageMode::Other => "other",
        }
    }
}

impl fmt::Display for StorageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for StorageMode {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "kv" => StorageMode::Kv,
            "localstorage" => StorageMode::LocalStorage,
            "redis" => StorageMode::Redis,
            "upstash" => StorageMode::Upstash,
            "d1" => StorageMode::D1,
            _ => StorageMode::Other,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub mode: StorageMode,
    /// Mode string as configured, kept for diagnostics when it maps to [`StorageMode::Other`].
    pub declared: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HomeSettings {
    pub cache_key: String,
    pub ttl: Duration,
    pub refresh_interval: Duration,
    pub auto_refresh: bool,
    pub config_path: PathBuf,
}

/// Where a binding is visible to the locator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingScope {
    Env,
    Global,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingBackend {
    Memory { capacity: NonZeroUsize },
    Redis { url: String },
}

#[derive(Debug, Clone)]
pub struct BindingSettings {
    pub name: String,
    pub scope: BindingScope,
    pub backend: BindingBackend,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Show(args)) => raw.apply_home_overrides(&args.home),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }
    if let Some(mode) = cli.storage_mode.as_ref() {
        raw.storage.mode = Some(mode.clone());
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    storage: RawStorageSettings,
    home: RawHomeSettings,
    bindings: Option<Vec<RawBindingSettings>>,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(seconds) = overrides.refresh_interval_seconds {
            self.home.refresh_interval_seconds = Some(seconds);
        }
        if let Some(enabled) = overrides.auto_refresh {
            self.home.auto_refresh = Some(enabled);
        }

        self.apply_home_overrides(&overrides.home);
    }

    fn apply_home_overrides(&mut self, overrides: &HomeOverrides) {
        if let Some(path) = overrides.config_path.as_ref() {
            self.home.config_path = Some(path.clone());
        }
        if let Some(seconds) = overrides.ttl_seconds {
            self.home.ttl_seconds = Some(seconds);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            storage,
            home,
            bindings,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let storage = build_storage_settings(storage);
        let home = build_home_settings(home)?;
        let bindings = build_binding_settings(bindings)?;

        Ok(Self {
            server,
            logging,
            storage,
            home,
            bindings,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_storage_settings(storage: RawStorageSettings) -> StorageSettings {
    let declared = storage
        .mode
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());
    let mode = declared
        .as_deref()
        .map_or(DEFAULT_STORAGE_MODE, StorageMode::from);

    StorageSettings { mode, declared }
}

fn build_home_settings(home: RawHomeSettings) -> Result<HomeSettings, LoadError> {
    let cache_key = home
        .cache_key
        .map(|key| key.trim().to_string())
        .unwrap_or_else(|| DEFAULT_CACHE_KEY.to_string());
    if cache_key.is_empty() {
        return Err(LoadError::invalid("home.cache_key", "must not be empty"));
    }

    let ttl = positive_seconds(
        home.ttl_seconds.unwrap_or(DEFAULT_CACHE_TTL_SECS),
        "home.ttl_seconds",
    )?;
    let refresh_interval = positive_seconds(
        home.refresh_interval_seconds
            .unwrap_or(DEFAULT_REFRESH_INTERVAL_SECS),
        "home.refresh_interval_seconds",
    )?;
    if refresh_interval >= ttl {
        return Err(LoadError::invalid(
            "home.refresh_interval_seconds",
            format!(
                "must be shorter than the cache ttl ({}s)",
                ttl.as_secs()
            ),
        ));
    }

    let config_path = home
        .config_path
        .unwrap_or_else(|| PathBuf::from(DEFAULT_ADMIN_CONFIG_PATH));
    if config_path.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "home.config_path",
            "path must not be empty",
        ));
    }

    Ok(HomeSettings {
        cache_key,
        ttl,
        refresh_interval,
        auto_refresh: home.auto_refresh.unwrap_or(true),
        config_path,
    })
}

fn build_binding_settings(
    bindings: Option<Vec<RawBindingSettings>>,
) -> Result<Vec<BindingSettings>, LoadError> {
    let Some(bindings) = bindings else {
        return Ok(vec![BindingSettings {
            name: DEFAULT_BINDING_NAME.to_string(),
            scope: BindingScope::Env,
            backend: BindingBackend::Memory {
                capacity: default_memory_capacity(),
            },
        }]);
    };

    let mut built: Vec<BindingSettings> = Vec::with_capacity(bindings.len());
    for raw in bindings {
        let name = raw.name.trim().to_string();
        if name.is_empty() {
            return Err(LoadError::invalid("bindings.name", "must not be empty"));
        }

        let scope = raw.scope.unwrap_or(BindingScope::Env);
        if built
            .iter()
            .any(|existing| existing.scope == scope && existing.name == name)
        {
            return Err(LoadError::invalid(
                "bindings.name",
                format!("binding `{name}` is declared twice in the same scope"),
            ));
        }

        let backend = match raw.backend.as_deref().unwrap_or("memory") {
            "memory" => {
                let capacity = match raw.capacity {
                    Some(value) => NonZeroUsize::new(value).ok_or_else(|| {
                        LoadError::invalid("bindings.capacity", "must be greater than zero")
                    })?,
                    None => default_memory_capacity(),
                };
                BindingBackend::Memory { capacity }
            }
            "redis" => {
                let url = raw
                    .url
                    .map(|value| value.trim().to_string())
                    .filter(|value| !value.is_empty())
                    .ok_or_else(|| {
                        LoadError::invalid("bindings.url", "redis bindings require a url")
                    })?;
                BindingBackend::Redis { url }
            }
            other => {
                return Err(LoadError::invalid(
                    "bindings.backend",
                    format!("unknown backend `{other}` (expected memory|redis)"),
                ));
            }
        };

        built.push(BindingSettings {
            name,
            scope,
            backend,
        });
    }

    Ok(built)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStorageSettings {
    mode: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawHomeSettings {
    cache_key: Option<String>,
    ttl_seconds: Option<u64>,
    refresh_interval_seconds: Option<u64>,
    auto_refresh: Option<bool>,
    config_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawBindingSettings {
    name: String,
    #[serde(default)]
    scope: Option<BindingScope>,
    #[serde(default)]
    backend: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    capacity: Option<usize>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("failed to parse `{candidate}`: {err}"))
}

fn positive_seconds(value: u64, key: &'static str) -> Result<Duration, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_secs(value))
}

fn default_memory_capacity() -> NonZeroUsize {
    NonZeroUsize::new(DEFAULT_MEMORY_CAPACITY).unwrap_or(NonZeroUsize::MIN)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
