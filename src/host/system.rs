use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;

use super::{Capability, HostEnvironment};
use crate::types::{HeapUsage, ResourceTimingEntry};

/// Host backed by the current process.
///
/// The clock is anchored at construction. Heap usage comes from the process
/// memory counters where the platform exposes them. Resource entries are
/// whatever callers register through [`SystemHost::record_resource`].
#[derive(Clone)]
pub struct SystemHost {
    origin: Instant,
    heap_introspection: bool,
    resources: Arc<RwLock<Option<Vec<ResourceTimingEntry>>>>,
}

impl SystemHost {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            heap_introspection: true,
            resources: Arc::new(RwLock::new(None)),
        }
    }

    /// Report heap introspection as unavailable regardless of platform
    pub fn without_heap_introspection(mut self) -> Self {
        self.heap_introspection = false;
        self
    }

    /// Append a resource-timing entry. The first call makes resource timing available.
    pub fn record_resource(&self, entry: ResourceTimingEntry) {
        tracing::debug!(
            name = %entry.name,
            initiator = %entry.initiator_type,
            transfer_size = entry.transfer_size,
            "Recorded resource timing entry"
        );
        self.resources
            .write()
            .get_or_insert_with(Vec::new)
            .push(entry);
    }

    /// Drop all registered entries
    pub fn clear_resources(&self) {
        *self.resources.write() = None;
    }
}

impl Default for SystemHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostEnvironment for SystemHost {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }

    fn heap_usage(&self) -> Capability<HeapUsage> {
        if !self.heap_introspection {
            return Capability::Unavailable;
        }
        read_process_memory().into()
    }

    fn resource_entries(&self) -> Capability<Vec<ResourceTimingEntry>> {
        self.resources.read().clone().into()
    }
}

#[cfg(target_os = "linux")]
fn read_process_memory() -> Option<HeapUsage> {
    let status = std::fs::read_to_string("/proc/self/status")
        .map_err(|e| tracing::debug!("Failed to read /proc/self/status: {}", e))
        .ok()?;
    parse_proc_status(&status)
}

#[cfg(not(target_os = "linux"))]
fn read_process_memory() -> Option<HeapUsage> {
    None
}

/// Extract resident (`VmRSS`) and virtual (`VmSize`) sizes from a proc status file
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_proc_status(status: &str) -> Option<HeapUsage> {
    let mut used = None;
    let mut total = None;

    for line in status.lines() {
        if let Some(rest) = line.strip_prefix("VmRSS:") {
            used = parse_kb_field(rest);
        } else if let Some(rest) = line.strip_prefix("VmSize:") {
            total = parse_kb_field(rest);
        }
    }

    Some(HeapUsage {
        used_bytes: used?,
        total_bytes: total?,
    })
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_kb_field(field: &str) -> Option<u64> {
    let mut parts = field.split_whitespace();
    let value: u64 = parts.next()?.parse().ok()?;
    match parts.next() {
        Some("kB") | None => Some(value * 1024),
        Some(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_is_monotonic() {
        let host = SystemHost::new();
        let t0 = host.now_ms();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let t1 = host.now_ms();
        assert!(t1 >= t0 + 5.0);
    }

    #[test]
    fn test_resource_registration() {
        let host = SystemHost::new();
        assert_eq!(host.resource_entries(), Capability::Unavailable);

        host.record_resource(ResourceTimingEntry::new("/asklet.js", "script", 1024, 3.0));
        match host.resource_entries() {
            Capability::Available(entries) => assert_eq!(entries.len(), 1),
            Capability::Unavailable => panic!("Expected registered entries"),
        }

        host.clear_resources();
        assert!(!host.resource_entries().is_available());
    }

    #[test]
    fn test_heap_introspection_disabled() {
        let host = SystemHost::new().without_heap_introspection();
        assert_eq!(host.heap_usage(), Capability::Unavailable);
    }

    #[test]
    fn test_parse_proc_status() {
        let status = "Name:\tasklet\nVmSize:\t  204800 kB\nVmRSS:\t   51200 kB\n";
        let usage = parse_proc_status(status).unwrap();
        assert_eq!(usage.used_bytes, 51200 * 1024);
        assert_eq!(usage.total_bytes, 204800 * 1024);
        assert_eq!(usage.used_mb(), 50.0);

        assert!(parse_proc_status("Name:\tasklet\n").is_none());
    }
}
