//! File-backed block allocator.
//!
//! [`FileMemAllocator`] owns one [`BackingStore`] and hands out
//! [`FileMemory`] blocks carved from it with a bump cursor. Blocks are plain
//! file ranges until mapped; mapping goes through `mmap(MAP_SHARED)` so every
//! view of the same range sees the same bytes.
//!
//! # Example
//!
//! ```rust,ignore
//! use filemem::memory::{AllocationParams, FileMemAllocator, FileMemConfig};
//!
//! let allocator = FileMemAllocator::new(FileMemConfig::new("/tmp/ring-XXXXXX"))?;
//! let block = allocator.alloc(1024, &AllocationParams::default())?;
//!
//! let mut view = block.map_writable()?;
//! view.as_mut_slice()[..5].copy_from_slice(b"hello");
//! view.unmap()?;
//! ```

use super::backing::{BackingStore, Capabilities};
use super::block::FileMemory;
use super::config::FileMemConfig;
use super::mapper::{MapMode, Mapping};
use super::offset::OffsetAllocator;
use super::params::AllocationParams;
use super::registry::AllocatorRegistry;
use crate::error::{Error, Result};
use crate::observability::{
    AllocatorMetrics, init_metrics, instrument_allocator, trace_alloc, trace_alloc_failure,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Allocator of blocks backed by a single unlinked file.
pub struct FileMemAllocator {
    /// Registration name.
    name: String,
    /// The file all blocks live in.
    store: BackingStore,
    /// Bump cursor over the file.
    offsets: OffsetAllocator,
    /// Reserve disk space before committing a block.
    reserve_space: bool,
    /// Punch out a root block's range when it is freed.
    release_on_free: bool,
    counters: Counters,
    metrics: AllocatorMetrics,
}

#[derive(Debug, Default)]
struct Counters {
    allocations: AtomicU64,
    failed_allocations: AtomicU64,
    live_blocks: AtomicU64,
    live_shares: AtomicU64,
    bytes_released: AtomicU64,
    release_failures: AtomicU64,
}

/// Point-in-time statistics for an allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocatorStats {
    /// Backing-file size.
    pub capacity: u64,
    /// Bytes handed out so far (cursor position).
    pub used: u64,
    /// Bytes left after the cursor.
    pub remaining: u64,
    /// Successful allocations since creation.
    pub allocations: u64,
    /// Allocations refused for space or reservation reasons.
    pub failed_allocations: u64,
    /// Root blocks still alive.
    pub live_blocks: u64,
    /// Shared sub-blocks still alive.
    pub live_shares: u64,
    /// Bytes handed back to the filesystem by hole punching.
    pub bytes_released: u64,
    /// Frees whose hole punch failed.
    pub release_failures: u64,
}

impl AllocatorStats {
    /// Share of the file consumed by the cursor (0.0 - 100.0).
    pub fn utilization_percent(&self) -> f64 {
        if self.capacity == 0 {
            return 0.0;
        }
        (self.used as f64 / self.capacity as f64) * 100.0
    }
}

impl FileMemAllocator {
    /// Create an allocator and its backing file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Construction`] if the backing file cannot be set up.
    pub fn new(config: FileMemConfig) -> Result<Arc<Self>> {
        if config.temp_path_template.as_os_str().is_empty() {
            return Err(Error::Construction(
                "a backing file template is required".into(),
            ));
        }

        init_metrics();
        let _span = instrument_allocator(&config.name);

        let store = BackingStore::create(config.capacity, &config.temp_path_template)?;
        let caps = store.capabilities();

        if config.reserve_space && !caps.reserve {
            debug!(name = %config.name, "disk space reservation not supported, skipping");
        }
        if config.release_on_free && !caps.release {
            debug!(name = %config.name, "hole punching not supported, freed space stays allocated");
        }

        let allocator = Self {
            offsets: OffsetAllocator::new(store.capacity()),
            reserve_space: config.reserve_space && caps.reserve,
            release_on_free: config.release_on_free && caps.release,
            counters: Counters::default(),
            metrics: AllocatorMetrics::new(&config.name),
            name: config.name,
            store,
        };
        debug!(name = %allocator.name, "allocator created");

        Ok(Arc::new(allocator))
    }

    /// Create an allocator and register it under `config.name`.
    ///
    /// # Errors
    ///
    /// Construction errors as for [`FileMemAllocator::new`], or
    /// [`Error::AlreadyRegistered`] if the name is taken. The existing
    /// allocator stays registered in that case.
    pub fn install(config: FileMemConfig, registry: &AllocatorRegistry) -> Result<Arc<Self>> {
        let name = config.name.clone();
        let allocator = Self::new(config)?;
        registry.register(&name, Arc::clone(&allocator))?;
        Ok(allocator)
    }

    /// Allocate a block able to hold `size` bytes.
    ///
    /// The block's logical window starts at `params.prefix`; its full
    /// capacity is `size + prefix + padding` rounded up to the page size.
    ///
    /// # Errors
    ///
    /// - [`Error::OutOfSpace`] when the file has no room left
    /// - [`Error::Reservation`] when disk space cannot be reserved
    /// - [`Error::InvalidParams`] for a bad alignment or an overflowing size
    ///
    /// On error the allocator state is unchanged.
    pub fn alloc(self: &Arc<Self>, size: u64, params: &AllocationParams) -> Result<FileMemory> {
        let maxsize = params.maxsize(size, self.page_size())?;

        let committed = self.offsets.commit(maxsize, |offset, len| {
            if self.reserve_space {
                self.store.reserve(offset, len)
            } else {
                Ok(())
            }
        });

        let file_offset = match committed {
            Ok(offset) => offset,
            Err(e) => {
                self.counters
                    .failed_allocations
                    .fetch_add(1, Ordering::Relaxed);
                self.metrics.record_alloc_failure();
                trace_alloc_failure(&self.name, size, &e);
                return Err(e);
            }
        };

        self.counters.allocations.fetch_add(1, Ordering::Relaxed);
        self.counters.live_blocks.fetch_add(1, Ordering::Relaxed);
        self.metrics.record_alloc(maxsize, self.offsets.remaining());
        trace_alloc(&self.name, file_offset, size, maxsize);

        Ok(FileMemory::new_root(
            Arc::clone(self),
            file_offset,
            maxsize,
            params.align,
            params.prefix,
            size,
        ))
    }

    /// Release a handle to a block.
    ///
    /// Dropping the handle does the same; this only adds a log line. Once the
    /// last handle of a root block goes away its disk range is punched out
    /// (when supported), but the range is never allocated again.
    pub fn free(&self, mem: FileMemory) {
        debug!(
            allocator = %self.name,
            file_offset = mem.file_offset(),
            shared = mem.parent().is_some(),
            "freeing block"
        );
        drop(mem);
    }

    /// Map `len` bytes at `offset` of the backing file.
    pub(crate) fn map_range(&self, offset: u64, len: u64, mode: MapMode) -> Result<Mapping> {
        match Mapping::new(self.store.fd(), offset, len, mode) {
            Ok(mapping) => {
                self.metrics.record_map();
                Ok(mapping)
            }
            Err(e) => {
                self.metrics.record_map_failure();
                tracing::error!(allocator = %self.name, offset, len, "mmap() failed: {e}");
                Err(e)
            }
        }
    }

    /// Tear down a mapping, counting failures.
    pub(crate) fn unmap_range(&self, mapping: Mapping) -> Result<()> {
        mapping.unmap().inspect_err(|e| {
            self.metrics.record_map_failure();
            tracing::error!(allocator = %self.name, "munmap() failed: {e}");
        })
    }

    /// Called when the last handle of a root block is dropped.
    pub(crate) fn retire_block(&self, file_offset: u64, maxsize: u64) {
        self.counters.live_blocks.fetch_sub(1, Ordering::Relaxed);

        if !self.release_on_free {
            return;
        }
        match self.store.release(file_offset, maxsize) {
            Ok(()) => {
                self.counters
                    .bytes_released
                    .fetch_add(maxsize, Ordering::Relaxed);
                self.metrics.record_release(maxsize);
            }
            Err(e) => {
                self.counters
                    .release_failures
                    .fetch_add(1, Ordering::Relaxed);
                self.metrics.record_release_failure();
                warn!(
                    allocator = %self.name,
                    file_offset,
                    maxsize,
                    "could not release disk space: {e}"
                );
            }
        }
    }

    pub(crate) fn share_created(&self) {
        self.counters.live_shares.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn share_dropped(&self) {
        self.counters.live_shares.fetch_sub(1, Ordering::Relaxed);
    }

    /// Registration name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Backing-file size in bytes.
    #[inline]
    pub fn capacity(&self) -> u64 {
        self.store.capacity()
    }

    /// Platform page size.
    #[inline]
    pub fn page_size(&self) -> u64 {
        self.store.page_size()
    }

    /// Bytes handed out so far. Never decreases.
    #[inline]
    pub fn used(&self) -> u64 {
        self.offsets.next_offset()
    }

    /// Bytes still available for allocation.
    #[inline]
    pub fn remaining(&self) -> u64 {
        self.offsets.remaining()
    }

    /// Features probed on the backing file.
    #[inline]
    pub fn capabilities(&self) -> Capabilities {
        self.store.capabilities()
    }

    /// Whether new blocks get their disk space reserved.
    #[inline]
    pub fn reserves_space(&self) -> bool {
        self.reserve_space
    }

    /// Whether freed root blocks get their disk space punched out.
    #[inline]
    pub fn releases_on_free(&self) -> bool {
        self.release_on_free
    }

    /// Snapshot of the allocator's counters.
    pub fn stats(&self) -> AllocatorStats {
        let used = self.offsets.next_offset();
        AllocatorStats {
            capacity: self.capacity(),
            used,
            remaining: self.capacity() - used,
            allocations: self.counters.allocations.load(Ordering::Relaxed),
            failed_allocations: self.counters.failed_allocations.load(Ordering::Relaxed),
            live_blocks: self.counters.live_blocks.load(Ordering::Relaxed),
            live_shares: self.counters.live_shares.load(Ordering::Relaxed),
            bytes_released: self.counters.bytes_released.load(Ordering::Relaxed),
            release_failures: self.counters.release_failures.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for FileMemAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileMemAllocator")
            .field("name", &self.name)
            .field("store", &self.store)
            .field("next_offset", &self.offsets.next_offset())
            .field("reserve_space", &self.reserve_space)
            .field("release_on_free", &self.release_on_free)
            .finish()
    }
}
