//! asklet-bench - latency, memory and streaming-throughput benchmarks for
//! prompt/response assistants
//!
//! The [`MetricsCollector`] runs a fixed sequence of measurements against an
//! injected [`AskCapability`] and [`HostEnvironment`]: one request/response
//! round trip, a heap sample after a settling delay, a resource-timing lookup
//! for the benchmarked script, and the total elapsed time. A separate
//! [`MetricsCollector::sample_exchange`] derives time-to-first-token,
//! time-per-output-token and throughput from a single streamed exchange.

use std::fmt;

pub mod ask;
pub mod config;
pub mod error;
pub mod host;
pub mod metrics;
pub mod types;
pub mod utils;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use ask::{AskCapability, CommandAsk, IgnoreTokens, PromptMode, TokenObserver};
pub use config::BenchConfig;
pub use error::{BenchError, BoxError, ErrorKind, Result, RunFailure};
pub use host::{Capability, HostEnvironment, SystemHost};
pub use metrics::{
    format_time, BenchmarkSample, CollectorBuilder, FormattedMetrics, MetricsCollector,
    MetricsRecord, RunState,
};
pub use types::{HeapUsage, ResourceTimingEntry};

/// Optional host facilities detected on the current process
pub struct Features {
    /// Whether heap introspection is available
    pub heap_introspection: bool,
}

impl Features {
    /// Detect available features at runtime
    pub fn detect() -> Self {
        Self {
            heap_introspection: SystemHost::new().heap_usage().is_available(),
        }
    }
}

impl fmt::Display for Features {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Heap introspection: {}",
            if self.heap_introspection { "yes" } else { "no" }
        )
    }
}
