use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the storefront binary.
#[derive(Debug, Parser)]
#[command(name = "storefront", version, about = "Storefront e-commerce server")]
pub struct CliArgs {
    /// Named configuration profile (default, development, testing, production).
    #[arg(
        long = "profile",
        env = "STOREFRONT_PROFILE",
        value_name = "NAME",
        default_value = "default"
    )]
    pub profile: String,

    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "STOREFRONT_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP server.
    Serve(Box<ServeArgs>),
    /// Apply pending schema migrations and exit.
    #[command(name = "migrate")]
    Migrate(MigrateArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct DatabaseOverride {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub database: DatabaseOverride,

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

    /// Toggle JSON console logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the directory receiving the rotating log file.
    #[arg(long = "log-directory", value_name = "PATH")]
    pub log_directory: Option<PathBuf>,

    /// Force debug mode on or off.
    #[arg(
        long = "debug",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub debug: Option<bool>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Toggle CSRF protection.
    #[arg(
        long = "csrf-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub csrf_enabled: Option<bool>,

    /// Override the SMTP server host.
    #[arg(long = "mail-server", value_name = "HOST")]
    pub mail_server: Option<String>,

    /// Override the SMTP server port.
    #[arg(long = "mail-port", value_name = "PORT")]
    pub mail_port: Option<u16>,

    /// Suppress outgoing mail (log it instead).
    #[arg(
        long = "mail-suppress-send",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub mail_suppress_send: Option<bool>,
}
