//! Human-readable projections of collected metrics

use serde::Serialize;

use super::MetricsRecord;

const NOT_AVAILABLE: &str = "N/A";

fn present(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v != 0.0 && !v.is_nan())
}

/// Fixed-point rendering that rounds exact halves away from zero.
///
/// `{:.N}` rounds exact halves to even. A half can only be exact when the
/// value has at most `digits + 1` binary fraction bits, so those values are
/// rescaled exactly and rounded by hand. Everything else has no tie and is
/// left to the formatter.
fn to_fixed(value: f64, digits: usize) -> String {
    let exponent = digits as i32;
    let dyadic = value * 2f64.powi(exponent + 1);
    if dyadic.fract() == 0.0 && dyadic.abs() < 2f64.powi(45) {
        let scaled = dyadic * 5f64.powi(exponent) / 2.0;
        return format!("{:.*}", digits, scaled.round() / 10f64.powi(exponent));
    }
    format!("{:.*}", digits, value)
}

/// Render a millisecond duration.
///
/// Unset, zero and NaN render as `N/A`. Below one second the value is shown
/// alone; below one minute it is followed by approximate seconds; above that
/// by whole minutes and remainder seconds.
pub fn format_time(ms: Option<f64>) -> String {
    let Some(ms) = present(ms) else {
        return NOT_AVAILABLE.to_string();
    };

    let fixed_ms = to_fixed(ms, 2);
    if ms < 1000.0 {
        format!("{}ms", fixed_ms)
    } else if ms < 60_000.0 {
        format!("{}ms (~{}s)", fixed_ms, to_fixed(ms / 1000.0, 1))
    } else {
        let minutes = (ms / 60_000.0).floor();
        let seconds = (ms % 60_000.0) / 1000.0;
        format!("{}ms (~{}m {}s)", fixed_ms, minutes, to_fixed(seconds, 1))
    }
}

pub fn format_megabytes(mb: Option<f64>) -> String {
    match present(mb) {
        Some(mb) => format!("{} MB", to_fixed(mb, 2)),
        None => NOT_AVAILABLE.to_string(),
    }
}

pub fn format_kilobytes(kb: Option<f64>) -> String {
    match present(kb) {
        Some(kb) => format!("{} KB", to_fixed(kb, 1)),
        None => NOT_AVAILABLE.to_string(),
    }
}

/// Display form of a [`MetricsRecord`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattedMetrics {
    pub version: String,
    pub start: String,
    pub ask_duration: String,
    pub js_heap_used: String,
    pub js_heap_total: String,
    pub script_transfer_size: String,
    pub script_duration: String,
    pub total: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FormattedMetrics {
    pub fn from_record(record: &MetricsRecord) -> Self {
        Self {
            version: record.version.clone(),
            start: format_time(Some(record.start)),
            ask_duration: format_time(record.ask_duration),
            js_heap_used: format_megabytes(record.heap_used),
            js_heap_total: format_megabytes(record.heap_total),
            script_transfer_size: format_kilobytes(record.script_transfer_size),
            script_duration: format_time(record.script_duration),
            total: format_time(record.total),
            error: record.error.clone(),
        }
    }

    /// Labelled rows in display order
    pub fn rows(&self) -> Vec<(&'static str, &str)> {
        let mut rows = vec![
            ("Version", self.version.as_str()),
            ("Start Time", self.start.as_str()),
            ("Response Time", self.ask_duration.as_str()),
            ("Memory Used", self.js_heap_used.as_str()),
            ("Memory Total", self.js_heap_total.as_str()),
            ("Script Size", self.script_transfer_size.as_str()),
            ("Script Load Time", self.script_duration.as_str()),
            ("Total Time", self.total.as_str()),
        ];
        if let Some(error) = &self.error {
            rows.push(("Error", error.as_str()));
        }
        rows
    }

    /// Two-column text table of [`FormattedMetrics::rows`]
    pub fn to_table(&self) -> String {
        let rows = self.rows();
        let width = rows.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
        rows.iter()
            .map(|(label, value)| format!("{:<width$} | {}", label, value, width = width))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
