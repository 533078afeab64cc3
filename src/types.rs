//! Common type definitions shared by the host and the collector

use serde::{Deserialize, Serialize};

pub(crate) const BYTES_PER_KB: f64 = 1024.0;
pub(crate) const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Heap introspection reading, in bytes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeapUsage {
    pub used_bytes: u64,
    pub total_bytes: u64,
}

impl HeapUsage {
    pub fn used_mb(&self) -> f64 {
        self.used_bytes as f64 / BYTES_PER_MB
    }

    pub fn total_mb(&self) -> f64 {
        self.total_bytes as f64 / BYTES_PER_MB
    }
}

/// Host-reported record describing a fetched resource's size and timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTimingEntry {
    /// Identifying name, usually the resource URL or path
    pub name: String,
    /// What caused the fetch (`"script"`, `"link"`, `"fetch"`, ...)
    pub initiator_type: String,
    /// Bytes transferred over the wire
    pub transfer_size: u64,
    /// Load duration in milliseconds
    pub duration: f64,
}

impl ResourceTimingEntry {
    pub fn new(
        name: impl Into<String>,
        initiator_type: impl Into<String>,
        transfer_size: u64,
        duration: f64,
    ) -> Self {
        Self {
            name: name.into(),
            initiator_type: initiator_type.into(),
            transfer_size,
            duration,
        }
    }

    pub fn transfer_size_kb(&self) -> f64 {
        self.transfer_size as f64 / BYTES_PER_KB
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heap_usage_conversion() {
        let usage = HeapUsage {
            used_bytes: 52_428_800,
            total_bytes: 104_857_600,
        };
        assert_eq!(usage.used_mb(), 50.0);
        assert_eq!(usage.total_mb(), 100.0);
    }

    #[test]
    fn test_resource_entry_size() {
        let entry = ResourceTimingEntry::new("/asklet.js", "script", 2048, 12.5);
        assert_eq!(entry.transfer_size_kb(), 2.0);
    }
}
