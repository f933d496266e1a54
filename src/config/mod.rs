//! Configuration layer: named profiles plus layered sources (file → env → CLI).

mod cli;

pub use cli::{CliArgs, Command, DatabaseOverride, MigrateArgs, ServeArgs, ServeOverrides};

use std::{
    fmt,
    net::SocketAddr,
    num::{NonZeroU32, NonZeroU64},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "storefront";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_LOG_DIRECTORY: &str = "logs";
const DEFAULT_LOG_FILE_NAME: &str = "ecommerce.log";
const DEFAULT_LOG_MAX_BYTES: u64 = 10_240;
const DEFAULT_LOG_BACKUPS: usize = 10;
const DEFAULT_SESSION_COOKIE: &str = "storefront_session";
const DEFAULT_SESSION_IDLE_SECS: u64 = 60 * 60 * 24 * 7;
const DEFAULT_SESSION_SWEEP_SECS: u64 = 300;
const DEFAULT_MAIL_SERVER: &str = "localhost";
const DEFAULT_MAIL_PORT: u16 = 25;
const DEFAULT_MAIL_SENDER: &str = "Storefront <noreply@localhost>";

/// Named configuration profile selecting the baseline defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Development,
    Testing,
    Production,
}

impl Profile {
    /// Resolve a profile name. `default` is an alias of `development`.
    pub fn from_name(name: &str) -> Result<Self, LoadError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "default" | "development" | "dev" => Ok(Profile::Development),
            "testing" | "test" => Ok(Profile::Testing),
            "production" | "prod" => Ok(Profile::Production),
            other => Err(LoadError::UnknownProfile {
                name: other.to_string(),
            }),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Profile::Development => "development",
            Profile::Testing => "testing",
            Profile::Production => "production",
        }
    }

    fn defaults(self) -> ProfileDefaults {
        match self {
            Profile::Development => ProfileDefaults {
                debug: true,
                testing: false,
                log_level: LevelFilter::DEBUG,
                csrf_enabled: true,
                mail_suppress_send: true,
                session_secure: false,
            },
            Profile::Testing => ProfileDefaults {
                debug: false,
                testing: true,
                log_level: LevelFilter::INFO,
                csrf_enabled: false,
                mail_suppress_send: true,
                session_secure: false,
            },
            Profile::Production => ProfileDefaults {
                debug: false,
                testing: false,
                log_level: LevelFilter::INFO,
                csrf_enabled: true,
                mail_suppress_send: false,
                session_secure: true,
            },
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Profile {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

struct ProfileDefaults {
    debug: bool,
    testing: bool,
    log_level: LevelFilter,
    csrf_enabled: bool,
    mail_suppress_send: bool,
    session_secure: bool,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub profile: Profile,
    pub mode: AppMode,
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub session: SessionSettings,
    pub csrf: CsrfSettings,
    pub mail: MailSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppMode {
    pub debug: bool,
    pub testing: bool,
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
    pub file: FileLogSettings,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct FileLogSettings {
    pub directory: PathBuf,
    pub file_name: String,
    pub max_bytes: NonZeroU64,
    pub backups: usize,
}

impl FileLogSettings {
    pub fn path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub cookie_name: String,
    pub secure: bool,
    pub idle_timeout: Duration,
    /// Period between sweeps of expired server-side sessions.
    pub sweep_interval: Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct CsrfSettings {
    pub enabled: bool,
}

#[derive(Debug, Clone)]
pub struct MailSettings {
    pub server: String,
    pub port: u16,
    pub use_tls: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    pub default_sender: String,
    pub suppress_send: bool,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("unknown configuration profile `{name}`")]
    UnknownProfile { name: String },
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

/// Load settings using the configured precedence (profile → files → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let profile = Profile::from_name(&cli.profile)?;

    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(&format!("config/{}", profile.as_str())).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("STOREFRONT").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Migrate(args)) => raw.apply_database_override(&args.database),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw, profile)
}

/// Resolve the settings of a profile from built-in defaults only.
///
/// Used where no files or environment should leak in, such as tests.
pub fn for_profile(name: &str) -> Result<Settings, LoadError> {
    let profile = Profile::from_name(name)?;
    Settings::from_raw(RawSettings::default(), profile)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    app: RawAppSettings,
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    session: RawSessionSettings,
    csrf: RawCsrfSettings,
    mail: RawMailSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        self.apply_database_override(&overrides.database);
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
        if let Some(directory) = overrides.log_directory.as_ref() {
            self.logging.directory = Some(directory.clone());
        }
        if let Some(debug) = overrides.debug {
            self.app.debug = Some(debug);
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(enabled) = overrides.csrf_enabled {
            self.csrf.enabled = Some(enabled);
        }
        if let Some(server) = overrides.mail_server.as_ref() {
            self.mail.server = Some(server.clone());
        }
        if let Some(port) = overrides.mail_port {
            self.mail.port = Some(port);
        }
        if let Some(suppress) = overrides.mail_suppress_send {
            self.mail.suppress_send = Some(suppress);
        }
    }

    fn apply_database_override(&mut self, overrides: &DatabaseOverride) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings, profile: Profile) -> Result<Self, LoadError> {
        let RawSettings {
            app,
            server,
            logging,
            database,
            session,
            csrf,
            mail,
        } = raw;
        let defaults = profile.defaults();

        let mode = AppMode {
            debug: app.debug.unwrap_or(defaults.debug),
            testing: app.testing.unwrap_or(defaults.testing),
        };
        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging, &defaults)?;
        let database = build_database_settings(database)?;
        let session = build_session_settings(session, &defaults)?;
        let csrf = CsrfSettings {
            enabled: csrf.enabled.unwrap_or(defaults.csrf_enabled),
        };
        let mail = build_mail_settings(mail, &defaults)?;

        Ok(Self {
            profile,
            mode,
            server,
            logging,
            database,
            session,
            csrf,
            mail,
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

fn build_logging_settings(
    logging: RawLoggingSettings,
    defaults: &ProfileDefaults,
) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => defaults.log_level,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    let directory = logging
        .directory
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIRECTORY));
    if directory.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "logging.directory",
            "path must not be empty",
        ));
    }

    let file_name = logging
        .file_name
        .unwrap_or_else(|| DEFAULT_LOG_FILE_NAME.to_string());
    if file_name.trim().is_empty() || file_name.contains(['/', '\\']) {
        return Err(LoadError::invalid(
            "logging.file_name",
            "must be a plain file name",
        ));
    }

    let max_bytes = NonZeroU64::new(logging.max_bytes.unwrap_or(DEFAULT_LOG_MAX_BYTES))
        .ok_or_else(|| LoadError::invalid("logging.max_bytes", "must be greater than zero"))?;
    let backups = logging.backups.unwrap_or(DEFAULT_LOG_BACKUPS);

    Ok(LoggingSettings {
        level,
        format,
        file: FileLogSettings {
            directory,
            file_name,
            max_bytes,
            backups,
        },
    })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = database.url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let max_connections = non_zero_u32(
        database
            .max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
            .into(),
        "database.max_connections",
    )?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_session_settings(
    session: RawSessionSettings,
    defaults: &ProfileDefaults,
) -> Result<SessionSettings, LoadError> {
    let cookie_name = session
        .cookie_name
        .unwrap_or_else(|| DEFAULT_SESSION_COOKIE.to_string());
    if cookie_name.is_empty()
        || !cookie_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(LoadError::invalid(
            "session.cookie_name",
            "must be a non-empty token of letters, digits, `_` or `-`",
        ));
    }

    let idle_secs = session
        .idle_timeout_seconds
        .unwrap_or(DEFAULT_SESSION_IDLE_SECS);
    if idle_secs == 0 {
        return Err(LoadError::invalid(
            "session.idle_timeout_seconds",
            "must be greater than zero",
        ));
    }

    let sweep_secs = session
        .sweep_interval_seconds
        .unwrap_or(DEFAULT_SESSION_SWEEP_SECS);
    if sweep_secs == 0 {
        return Err(LoadError::invalid(
            "session.sweep_interval_seconds",
            "must be greater than zero",
        ));
    }

    Ok(SessionSettings {
        cookie_name,
        secure: session.secure.unwrap_or(defaults.session_secure),
        idle_timeout: Duration::from_secs(idle_secs),
        sweep_interval: Duration::from_secs(sweep_secs),
    })
}

fn build_mail_settings(
    mail: RawMailSettings,
    defaults: &ProfileDefaults,
) -> Result<MailSettings, LoadError> {
    let server = mail
        .server
        .unwrap_or_else(|| DEFAULT_MAIL_SERVER.to_string());
    if server.trim().is_empty() {
        return Err(LoadError::invalid("mail.server", "host must not be empty"));
    }

    let port = mail.port.unwrap_or(DEFAULT_MAIL_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "mail.port",
            "port must be greater than zero",
        ));
    }

    let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

    Ok(MailSettings {
        server,
        port,
        use_tls: mail.use_tls.unwrap_or(false),
        username: non_empty(mail.username),
        password: non_empty(mail.password),
        default_sender: mail
            .default_sender
            .unwrap_or_else(|| DEFAULT_MAIL_SENDER.to_string()),
        suppress_send: mail.suppress_send.unwrap_or(defaults.mail_suppress_send),
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAppSettings {
    debug: Option<bool>,
    testing: Option<bool>,
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
    directory: Option<PathBuf>,
    file_name: Option<String>,
    max_bytes: Option<u64>,
    backups: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSessionSettings {
    cookie_name: Option<String>,
    secure: Option<bool>,
    idle_timeout_seconds: Option<u64>,
    sweep_interval_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCsrfSettings {
    enabled: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawMailSettings {
    server: Option<String>,
    port: Option<u16>,
    use_tls: Option<bool>,
    username: Option<String>,
    password: Option<String>,
    default_sender: Option<String>,
    suppress_send: Option<bool>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[cfg(test)]
mod tests;
