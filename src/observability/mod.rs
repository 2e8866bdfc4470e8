//! Observability features: metrics and tracing.
//!
//! - **Metrics**: Counters and gauges via `metrics-rs`
//! - **Tracing**: Structured logging and spans via `tracing`
//!
//! ## Metrics
//!
//! | Metric | Type | Description |
//! |--------|------|-------------|
//! | `filemem_allocations` | Counter | Blocks allocated |
//! | `filemem_allocation_failures` | Counter | Allocations refused |
//! | `filemem_bytes_committed` | Counter | Page-aligned bytes committed |
//! | `filemem_bytes_released` | Counter | Bytes hole-punched on free |
//! | `filemem_release_failures` | Counter | Failed hole punches |
//! | `filemem_mappings` | Counter | Successful mappings |
//! | `filemem_map_failures` | Counter | Failed mmap/munmap |
//! | `filemem_bytes_available` | Gauge | Space left in the backing file |
//!
//! Every metric carries an `allocator` label with the allocator's name.

mod metrics;
mod tracing_support;

pub use metrics::{AllocatorMetrics, init_metrics};
pub use tracing_support::{instrument_allocator, span_allocator, trace_alloc, trace_alloc_failure};
