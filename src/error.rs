use std::error::Error as StdError;
use std::time::Duration;

use thiserror::Error;

use crate::metrics::{MetricsRecord, RunState};

/// Boxed error returned by external collaborators such as the ask capability
pub type BoxError = Box<dyn StdError + Send + Sync>;

pub type Result<T> = std::result::Result<T, BenchError>;

#[derive(Debug, Error)]
pub enum BenchError {
    #[error("{capability} capability is not registered")]
    MissingCapability { capability: &'static str },

    #[error("ask capability failed: {message}")]
    AskFailed {
        message: String,
        #[source]
        source: BoxError,
    },

    #[error("operation '{operation}' timed out after {duration:?}")]
    Timeout {
        duration: Duration,
        operation: String,
    },

    #[error("operation '{operation}' was cancelled")]
    Cancelled { operation: String },

    #[error("phase '{phase}' cannot run while collector is {state:?}")]
    OutOfOrder {
        phase: &'static str,
        state: RunState,
    },

    #[error("configuration error for {parameter}: {message}")]
    ConfigurationError { message: String, parameter: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse classification of failures, used by callers deciding on fallback behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MissingCapability,
    PhaseFailure,
    Timeout,
    Cancelled,
    Usage,
}

impl BenchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BenchError::MissingCapability { .. } => ErrorKind::MissingCapability,
            BenchError::Timeout { .. } => ErrorKind::Timeout,
            BenchError::Cancelled { .. } => ErrorKind::Cancelled,
            BenchError::AskFailed { .. } | BenchError::Io { .. } => ErrorKind::PhaseFailure,
            BenchError::OutOfOrder { .. }
            | BenchError::ConfigurationError { .. }
            | BenchError::Serialization(_) => ErrorKind::Usage,
        }
    }

    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        BenchError::Io {
            context: context.into(),
            source,
        }
    }
}

/// Failed benchmark run. Carries whatever the record held when the run aborted,
/// with its `error` field set to the failure message.
#[derive(Debug, Error)]
#[error("benchmark run failed: {error}")]
pub struct RunFailure {
    #[source]
    pub error: BenchError,
    pub record: MetricsRecord,
}

impl RunFailure {
    pub fn into_record(self) -> MetricsRecord {
        self.record
    }
}
