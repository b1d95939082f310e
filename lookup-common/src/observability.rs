//! Logging for the `lookup` binary and integration tests.
//!
//! [`init_logging`] installs the process-wide subscriber from the `logging:`
//! config section: a daily-rolling file sink plus an optional stderr mirror,
//! both in the configured encoding.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::Context;
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, layer::SubscriberExt};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();
static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Consulted when `logging.dir` is unset.
pub const LOG_DIR_ENV: &str = "LOOKUP_LOG_DIR";
const FALLBACK_LOG_DIR: &str = "logs";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// The `logging:` config section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Directory for the rolling file. Falls back to `$LOOKUP_LOG_DIR`, then `./logs`.
    pub dir: Option<PathBuf>,
    pub format: LogFormat,
    /// Mirror events to stderr.
    pub stderr: bool,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            dir: None,
            format: LogFormat::Text,
            stderr: false,
            filter: "info".to_string(),
        }
    }
}

impl LoggingSettings {
    pub fn log_dir(&self) -> PathBuf {
        self.dir
            .clone()
            .or_else(|| std::env::var_os(LOG_DIR_ENV).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(FALLBACK_LOG_DIR))
    }
}

/// File the daily appender writes to on `date`.
pub fn log_file_path(dir: &Path, app_name: &str, date: NaiveDate) -> PathBuf {
    dir.join(format!("{app_name}.log.{}", date.format("%Y-%m-%d")))
}

fn format_layer<W>(format: LogFormat, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    match format {
        LogFormat::Text => fmt::layer().with_writer(writer).with_ansi(ansi).boxed(),
        LogFormat::Json => fmt::layer().json().with_writer(writer).boxed(),
    }
}

/// Install the global subscriber and return today's log file.
///
/// Only the first call installs anything; later calls return the first path.
pub fn init_logging(app_name: &str, settings: &LoggingSettings) -> anyhow::Result<PathBuf> {
    if let Some(path) = LOG_PATH.get() {
        return Ok(path.clone());
    }

    let dir = settings.log_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create log directory: {}", dir.display()))?;

    let (file_writer, guard) =
        tracing_appender::non_blocking(rolling::daily(&dir, format!("{app_name}.log")));
    let _ = LOG_GUARD.set(guard);

    let mut layers = vec![format_layer(settings.format, file_writer, false)];
    if settings.stderr {
        layers.push(format_layer(settings.format, std::io::stderr, true));
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.filter.as_str()));

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("tracing setup failed: {e}"))?;

    let path = log_file_path(&dir, app_name, Local::now().date_naive());
    Ok(LOG_PATH.get_or_init(|| path).clone())
}
