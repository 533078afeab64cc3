//! Benchmark metrics collection and reporting

mod builder;
mod collector;
mod format;
mod record;
mod sample;

pub use builder::CollectorBuilder;
pub use collector::{MetricsCollector, RunState};
pub use format::{format_kilobytes, format_megabytes, format_time, FormattedMetrics};
pub use record::MetricsRecord;
pub use sample::{BenchmarkSample, StreamTracker, TokenTiming};
