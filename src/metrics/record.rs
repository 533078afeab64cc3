use serde::{Deserialize, Serialize};

/// Accumulator for one benchmark run.
///
/// Durations are milliseconds on the host's monotonic clock, heap sizes are
/// megabytes and the script transfer size is kilobytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsRecord {
    /// Build/variant under test
    pub version: String,

    /// Timestamp at record creation
    pub start: f64,

    /// One request/response round trip
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ask_duration: Option<f64>,

    #[serde(
        default,
        rename = "jsHeapUsed",
        skip_serializing_if = "Option::is_none"
    )]
    pub heap_used: Option<f64>,

    #[serde(
        default,
        rename = "jsHeapTotal",
        skip_serializing_if = "Option::is_none"
    )]
    pub heap_total: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_transfer_size: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_duration: Option<f64>,

    /// Elapsed time between `start` and the end of the final phase
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,

    /// Failure message; once set the run is over
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MetricsRecord {
    pub fn new(version: impl Into<String>, start: f64) -> Self {
        Self {
            version: version.into(),
            start,
            ask_duration: None,
            heap_used: None,
            heap_total: None,
            script_transfer_size: None,
            script_duration: None,
            total: None,
            error: None,
        }
    }

    /// Record carrying only identity and a failure, for callers that lost the run entirely
    pub fn failed(version: impl Into<String>, start: f64, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(version, start)
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    pub fn is_complete(&self) -> bool {
        self.total.is_some() && self.error.is_none()
    }
}
