use std::{
    fs,
    path::PathBuf,
    sync::{Mutex, Once},
};

use file_rotate::{ContentLimit, FileRotate, compression::Compression, suffix::AppendCount};
use metrics::{Unit, describe_counter};
use tracing::info;
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    filter::LevelFilter,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{AppMode, FileLogSettings, LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Size-rotating log file writer.
pub type RotatingLogFile = FileRotate<AppendCount>;

/// What [`init`] installed.
#[derive(Debug, Clone, Default)]
pub struct TelemetryOutcome {
    /// Path of the rotating log file, when the file handler is attached.
    pub log_file: Option<PathBuf>,
}

/// The rotating file handler is attached only outside debug and testing modes.
pub fn file_logging_enabled(mode: AppMode) -> bool {
    !mode.debug && !mode.testing
}

/// Ensure the log directory exists and open the size-rotating log file.
pub fn open_log_file(settings: &FileLogSettings) -> Result<RotatingLogFile, InfraError> {
    fs::create_dir_all(&settings.directory)?;

    let max_bytes = usize::try_from(settings.max_bytes.get()).map_err(|_| {
        InfraError::configuration("logging.max_bytes exceeds supported range for usize")
    })?;

    Ok(FileRotate::new(
        settings.path(),
        AppendCount::new(settings.backups),
        ContentLimit::Bytes(max_bytes),
        Compression::None,
        #[cfg(unix)]
        None,
    ))
}

/// Install a global tracing subscriber using the provided logging settings.
///
/// Console output follows `logging.level` (overridable through `RUST_LOG`);
/// the file handler, when attached, always records at INFO.
pub fn init(logging: &LoggingSettings, mode: AppMode) -> Result<TelemetryOutcome, InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let console_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    }
    .with_filter(env_filter);

    let (file_layer, log_file) = if file_logging_enabled(mode) {
        let writer = open_log_file(&logging.file)?;
        let layer = fmt::layer()
            .with_writer(Mutex::new(writer))
            .with_ansi(false)
            .with_target(false)
            .with_file(true)
            .with_line_number(true)
            .with_filter(LevelFilter::INFO);
        (Some(layer), Some(logging.file.path()))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .with(ErrorLayer::default())
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })?;

    if let Some(path) = log_file.as_ref() {
        info!(
            target = "storefront::startup",
            log_file = %path.display(),
            "E-commerce startup"
        );
    }

    Ok(TelemetryOutcome { log_file })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "storefront_login_success_total",
            Unit::Count,
            "Total number of successful logins."
        );
        describe_counter!(
            "storefront_login_failure_total",
            Unit::Count,
            "Total number of rejected login attempts."
        );
        describe_counter!(
            "storefront_csrf_rejected_total",
            Unit::Count,
            "Total number of requests rejected by the CSRF guard."
        );
    });
}
