use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BenchError, Result};

/// Prompt sent during the latency phase when none is configured
pub const DEFAULT_PROMPT: &str = "Test prompt";

/// Version tag reported when the build under test does not provide one
pub const UNKNOWN_VERSION: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Identifier of the build/variant under test
    pub version: Option<String>,

    /// Canonical prompt used for the latency phase
    pub prompt: String,

    /// Pause before sampling memory, letting background allocation finish
    #[serde(with = "duration_ms")]
    pub settle_delay: Duration,

    /// Upper bound for a single ask call. `None` waits indefinitely.
    #[serde(with = "option_duration_ms")]
    pub ask_timeout: Option<Duration>,

    /// Substring identifying the benchmarked script among resource entries
    pub script_pattern: String,

    /// Initiator type the benchmarked script entry must have
    pub script_initiator: String,

    /// Substrings identifying the model runtime resource for streamed samples
    pub sample_resource_patterns: Vec<String>,

    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Log level
    pub log_level: LogLevel,

    /// Emit the tabular summary after a successful run
    pub log_results: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            version: None,
            prompt: DEFAULT_PROMPT.to_string(),
            settle_delay: Duration::from_millis(1000),
            ask_timeout: None,
            script_pattern: "asklet".to_string(),
            script_initiator: "script".to_string(),
            sample_resource_patterns: vec!["webllm".to_string(), "llm".to_string()],
            monitoring: MonitoringConfig::default(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_results: true,
        }
    }
}

impl BenchConfig {
    /// Load a configuration from a JSON file. Missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| BenchError::io(format!("failed to read config {}", path.display()), e))?;
        let config: BenchConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Version tag to stamp on new records
    pub fn version_tag(&self) -> &str {
        self.version
            .as_deref()
            .filter(|v| !v.is_empty())
            .unwrap_or(UNKNOWN_VERSION)
    }

    pub fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(BenchError::ConfigurationError {
                message: "Prompt cannot be empty".to_string(),
                parameter: "prompt".to_string(),
            });
        }

        if self.script_pattern.is_empty() {
            return Err(BenchError::ConfigurationError {
                message: "Script pattern cannot be empty".to_string(),
                parameter: "script_pattern".to_string(),
            });
        }

        if let Some(timeout) = self.ask_timeout {
            if timeout.is_zero() {
                return Err(BenchError::ConfigurationError {
                    message: "Ask timeout must be greater than zero when set".to_string(),
                    parameter: "ask_timeout".to_string(),
                });
            }
        }

        Ok(())
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

mod option_duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(deserializer)
            .map(|ms| ms.map(Duration::from_millis))
    }
}
