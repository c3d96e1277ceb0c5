use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the SPA API binary.
#[derive(Debug, Parser)]
#[command(name = "spa-api", version, about = "Headless SPA content API")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "SPA_API_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP service.
    Serve(Box<ServeArgs>),
    /// Run the pipeline once against the content fixture and print the body.
    Render(RenderArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ContentOverride {
    /// Override the JSON content fixture.
    #[arg(long = "content-fixture", value_name = "PATH")]
    pub fixture: Option<PathBuf>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub content: ContentOverride,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

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

    /// Override the hosting environment (development|production).
    #[arg(long = "spa-environment", value_name = "ENV")]
    pub spa_environment: Option<String>,

    /// Fold 404 and redirect statuses into 200 on the wire.
    #[arg(
        long = "spa-overwrite-status-codes",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub spa_overwrite_status_codes: Option<bool>,

    /// Enable the micro-cache.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_enabled: Option<bool>,

    /// Override the micro-cache TTL.
    #[arg(long = "cache-ttl-seconds", value_name = "SECONDS")]
    pub cache_ttl_seconds: Option<u64>,

    /// Override the micro-cache capacity.
    #[arg(long = "cache-capacity", value_name = "COUNT")]
    pub cache_capacity: Option<usize>,
}

#[derive(Debug, Args, Clone)]
pub struct RenderArgs {
    #[command(flatten)]
    pub content: ContentOverride,

    /// Logical URL to render, e.g. `/en/about/`.
    #[arg(long, value_name = "URL")]
    pub url: String,

    /// Host the request is made for.
    #[arg(long, default_value = "localhost", value_name = "HOST")]
    pub host: String,

    /// Protocol the request is made with.
    #[arg(long, default_value = "http", value_name = "PROTOCOL")]
    pub protocol: String,

    /// Render a page by id instead of by URL.
    #[arg(long = "page-id", value_name = "ID")]
    pub page_id: Option<i64>,

    /// Culture hint, e.g. `da-DK`.
    #[arg(long, value_name = "CULTURE")]
    pub culture: Option<String>,

    /// Comma separated parts (content,navigation,site).
    #[arg(long, value_name = "PARTS")]
    pub parts: Option<String>,
}
