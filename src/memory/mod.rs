//! File-backed memory blocks.
//!
//! This module provides an allocator whose blocks live in a single temporary
//! file instead of anonymous memory. The file is created from a mkstemp-style
//! template and unlinked immediately, so only the allocator's descriptor keeps
//! it alive.
//!
//! # Architecture
//!
//! - [`BackingStore`]: the unlinked file and its probed capabilities
//! - [`OffsetAllocator`]: forward-only cursor handing out page-aligned ranges
//! - [`FileMemAllocator`]: allocates [`FileMemory`] blocks from the store
//! - [`FileMemory`]: a block, mappable with `mmap(MAP_SHARED)` and shareable
//!   as read-only sub-ranges
//! - [`AllocatorRegistry`]: name-indexed allocator table
//!
//! # Example
//!
//! ```rust,ignore
//! use filemem::memory::{AllocationParams, FileMemAllocator, FileMemConfig};
//!
//! let allocator = FileMemAllocator::new(FileMemConfig::new("/var/tmp/ring-XXXXXX"))?;
//! let block = allocator.alloc(4, &AllocationParams::default())?;
//! block.map_writable()?.as_mut_slice().copy_from_slice(&[0, 1, 2, 3]);
//!
//! let tail = block.share(1, None)?;
//! assert_eq!(tail.map_readable()?.as_slice(), &[1, 2, 3]);
//! ```

mod allocator;
mod backing;
mod block;
mod config;
pub mod defaults;
mod mapper;
mod offset;
mod params;
mod registry;

pub use allocator::{AllocatorStats, FileMemAllocator};
pub use backing::{BackingStore, Capabilities};
pub use block::{FileMemory, MappedRead, MappedWrite};
pub use config::FileMemConfig;
pub use mapper::{MapMode, Mapping};
pub use offset::OffsetAllocator;
pub use params::{AllocationParams, align_size};
pub use registry::AllocatorRegistry;
