use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the moontv-home binary.
#[derive(Debug, Parser)]
#[command(name = "moontv-home", version, about = "MoonTV home payload service")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "MOONTV_HOME_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    /// Override the storage mode (kv|localstorage|redis|upstash|d1).
    #[arg(
        long = "storage-mode",
        env = "NEXT_PUBLIC_STORAGE_TYPE",
        value_name = "MODE",
        global = true
    )]
    pub storage_mode: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP service.
    Serve(Box<ServeArgs>),
    /// Resolve the home payload once and print it as JSON.
    Show(ShowArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct HomeOverrides {
    /// Override the admin configuration document path.
    #[arg(long = "home-config-path", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub config_path: Option<PathBuf>,

    /// Override the cache entry time-to-live.
    #[arg(long = "home-ttl-seconds", value_name = "SECONDS")]
    pub ttl_seconds: Option<u64>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub home: HomeOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the background refresh interval.
    #[arg(long = "home-refresh-interval-seconds", value_name = "SECONDS")]
    pub refresh_interval_seconds: Option<u64>,

    /// Toggle the background refresh loop.
    #[arg(
        long = "home-auto-refresh",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub auto_refresh: Option<bool>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ShowArgs {
    #[command(flatten)]
    pub home: HomeOverrides,

    /// Pretty-print the payload.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub pretty: bool,
}
