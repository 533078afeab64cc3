//! Host environment facilities the collector measures against

mod system;

pub use system::SystemHost;

use crate::types::{HeapUsage, ResourceTimingEntry};

/// Optional host facility. `Unavailable` is a normal outcome, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Capability<T> {
    Available(T),
    Unavailable,
}

impl<T> Capability<T> {
    pub fn is_available(&self) -> bool {
        matches!(self, Capability::Available(_))
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Capability::Available(value) => Some(value),
            Capability::Unavailable => None,
        }
    }
}

impl<T> From<Option<T>> for Capability<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Capability::Available(value),
            None => Capability::Unavailable,
        }
    }
}

/// Clock and introspection facilities of the environment hosting the assistant
pub trait HostEnvironment: Send + Sync {
    /// Monotonic timestamp in milliseconds, non-decreasing within a process
    fn now_ms(&self) -> f64;

    /// Current heap usage, if the host exposes it
    fn heap_usage(&self) -> Capability<HeapUsage>;

    /// Resource-timing entries in fetch order, if the host records them
    fn resource_entries(&self) -> Capability<Vec<ResourceTimingEntry>>;
}
