//! Metrics collection using metrics-rs.

use metrics::{Counter, Gauge, Unit, counter, gauge};
use std::sync::atomic::{AtomicBool, Ordering};

/// Whether metrics have been initialized.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

// Metric names as constants for consistency
const ALLOCATIONS: &str = "filemem_allocations";
const ALLOCATION_FAILURES: &str = "filemem_allocation_failures";
const BYTES_COMMITTED: &str = "filemem_bytes_committed";
const BYTES_RELEASED: &str = "filemem_bytes_released";
const RELEASE_FAILURES: &str = "filemem_release_failures";
const MAPPINGS: &str = "filemem_mappings";
const MAP_FAILURES: &str = "filemem_map_failures";
const BYTES_AVAILABLE: &str = "filemem_bytes_available";

/// Initialize metrics descriptions.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init_metrics() {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }

    metrics::describe_counter!(ALLOCATIONS, Unit::Count, "Blocks allocated");
    metrics::describe_counter!(
        ALLOCATION_FAILURES,
        Unit::Count,
        "Allocations refused for lack of space or reservation failure"
    );
    metrics::describe_counter!(
        BYTES_COMMITTED,
        Unit::Bytes,
        "Page-aligned bytes committed to blocks"
    );
    metrics::describe_counter!(
        BYTES_RELEASED,
        Unit::Bytes,
        "Bytes returned to the filesystem by hole punching"
    );
    metrics::describe_counter!(
        RELEASE_FAILURES,
        Unit::Count,
        "Freed blocks whose disk space could not be released"
    );
    metrics::describe_counter!(MAPPINGS, Unit::Count, "Successful block mappings");
    metrics::describe_counter!(MAP_FAILURES, Unit::Count, "Failed mmap/munmap calls");
    metrics::describe_gauge!(
        BYTES_AVAILABLE,
        Unit::Bytes,
        "Bytes left between the allocation cursor and the end of the file"
    );
}

/// Metrics handles for one allocator, labelled with its name.
#[derive(Clone)]
pub struct AllocatorMetrics {
    name: String,
    allocations: Counter,
    allocation_failures: Counter,
    bytes_committed: Counter,
    bytes_released: Counter,
    release_failures: Counter,
    mappings: Counter,
    map_failures: Counter,
    bytes_available: Gauge,
}

impl AllocatorMetrics {
    /// Create handles for the allocator called `name`.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            allocations: counter!(ALLOCATIONS, "allocator" => name.to_string()),
            allocation_failures: counter!(ALLOCATION_FAILURES, "allocator" => name.to_string()),
            bytes_committed: counter!(BYTES_COMMITTED, "allocator" => name.to_string()),
            bytes_released: counter!(BYTES_RELEASED, "allocator" => name.to_string()),
            release_failures: counter!(RELEASE_FAILURES, "allocator" => name.to_string()),
            mappings: counter!(MAPPINGS, "allocator" => name.to_string()),
            map_failures: counter!(MAP_FAILURES, "allocator" => name.to_string()),
            bytes_available: gauge!(BYTES_AVAILABLE, "allocator" => name.to_string()),
        }
    }

    /// Record a successful allocation.
    #[inline]
    pub fn record_alloc(&self, maxsize: u64, available: u64) {
        self.allocations.increment(1);
        self.bytes_committed.increment(maxsize);
        self.bytes_available.set(available as f64);
    }

    /// Record a refused allocation.
    #[inline]
    pub fn record_alloc_failure(&self) {
        self.allocation_failures.increment(1);
    }

    /// Record disk space handed back on free.
    #[inline]
    pub fn record_release(&self, bytes: u64) {
        self.bytes_released.increment(bytes);
    }

    /// Record a failed hole punch.
    #[inline]
    pub fn record_release_failure(&self) {
        self.release_failures.increment(1);
    }

    /// Record a successful mapping.
    #[inline]
    pub fn record_map(&self) {
        self.mappings.increment(1);
    }

    /// Record a failed mmap or munmap.
    #[inline]
    pub fn record_map_failure(&self) {
        self.map_failures.increment(1);
    }

    /// Get the allocator name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for AllocatorMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AllocatorMetrics")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
