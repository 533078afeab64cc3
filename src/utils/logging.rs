use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Mutex, Once};

use tracing::Level;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::fmt::format::FmtSpan;

use crate::config::LogLevel;
use crate::error::{BenchError, Result};

static INIT: Once = Once::new();

/// Logging configuration options
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level, overridable through `RUST_LOG`
    pub level: Level,
    /// Whether to include source code locations
    pub source_location: bool,
    /// Whether to log span open/close events
    pub log_spans: bool,
    /// Output file path (None for stderr)
    pub file_path: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            source_location: false,
            log_spans: false,
            file_path: None,
        }
    }
}

impl From<LogLevel> for LogConfig {
    fn from(level: LogLevel) -> Self {
        Self {
            level: level.into(),
            ..Default::default()
        }
    }
}

/// Install the global tracing subscriber. Later calls are no-ops.
pub fn setup_logging(config: LogConfig) -> Result<()> {
    let mut result = Ok(());

    INIT.call_once(|| {
        result = setup_logging_internal(config);
    });

    result
}

fn setup_logging_internal(config: LogConfig) -> Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(config.level).into())
        .from_env_lossy();

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(config.source_location)
        .with_line_number(config.source_location)
        .with_span_events(if config.log_spans {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        });

    let installed = match config.file_path {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| {
                    BenchError::io(format!("failed to open log file {}", path.display()), e)
                })?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };

    installed.map_err(|e| BenchError::ConfigurationError {
        message: format!("failed to set global subscriber: {}", e),
        parameter: "logging".to_string(),
    })
}
