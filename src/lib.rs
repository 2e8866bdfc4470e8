//! # filemem
//!
//! A memory allocator whose blocks are backed by a temporary file.
//!
//! Blocks are carved out of one unlinked file and mapped with
//! `mmap(MAP_SHARED)` on demand, so large or long-lived buffers can live in
//! the page cache instead of anonymous memory. Read-only sub-range views
//! ("shares") reference the same file range without copying.
//!
//! ## Features
//!
//! - **Page-aligned blocks**: prefix, padding and alignment per allocation
//! - **Zero-copy shares**: read-only views that keep their root block alive
//! - **Span detection**: tell whether two views are adjacent in storage
//! - **Disk-space control**: best-effort `fallocate` reservation and hole
//!   punching on Linux
//! - **Observability**: `tracing` events and `metrics` counters per allocator
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use filemem::prelude::*;
//!
//! let allocator = FileMemAllocator::new(FileMemConfig::new("/tmp/ring-XXXXXX").capacity(64 << 20))?;
//! let block = allocator.alloc(4096, &AllocationParams::default())?;
//!
//! let mut view = block.map_writable()?;
//! view.as_mut_slice().fill(0xAB);
//! view.unmap()?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod error;
pub mod memory;
pub mod observability;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::memory::{
        AllocationParams, AllocatorRegistry, FileMemAllocator, FileMemConfig, FileMemory, MapMode,
    };
}

pub use error::{Error, Result};
