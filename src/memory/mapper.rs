//! Mapping of file regions into the address space.

use crate::error::{Error, Result};
use rustix::fd::BorrowedFd;
use rustix::mm::{MapFlags, ProtFlags};
use std::ptr::NonNull;

/// Access requested when mapping a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapMode {
    /// Read-only access (PROT_READ).
    Read,
    /// Write access (PROT_READ | PROT_WRITE).
    ///
    /// Write implies read on every architecture we map on, and slices handed
    /// out for writing must be readable too.
    Write,
}

impl MapMode {
    /// Convert to mmap protection flags.
    pub fn to_prot_flags(self) -> ProtFlags {
        match self {
            MapMode::Read => ProtFlags::READ,
            MapMode::Write => ProtFlags::READ | ProtFlags::WRITE,
        }
    }

    /// Check if this mode allows writing.
    #[inline]
    pub fn can_write(self) -> bool {
        matches!(self, MapMode::Write)
    }
}

impl std::fmt::Display for MapMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MapMode::Read => write!(f, "r-"),
            MapMode::Write => write!(f, "rw"),
        }
    }
}

/// A live `MAP_SHARED` mapping of part of the backing file.
///
/// Not `Clone`: each mapping is torn down exactly once, either by
/// [`Mapping::unmap`] or on drop.
#[derive(Debug)]
pub struct Mapping {
    ptr: NonNull<u8>,
    len: usize,
}

impl Mapping {
    /// Map `len` bytes of `fd` starting at `offset`.
    ///
    /// `offset` must be page-aligned. The mapping is shared, so writes through
    /// one mapping are seen by every other mapping of the same range.
    pub fn new(fd: BorrowedFd<'_>, offset: u64, len: u64, mode: MapMode) -> Result<Self> {
        let len = usize::try_from(len)
            .map_err(|_| Error::InvalidParams(format!("mapping length {len} too large")))?;

        // SAFETY: we ask the kernel for a fresh address, so no existing
        // mapping is replaced; the region is only reachable through `Mapping`.
        let ptr = unsafe {
            rustix::mm::mmap(
                std::ptr::null_mut(),
                len,
                mode.to_prot_flags(),
                MapFlags::SHARED,
                fd,
                offset,
            )
        }
        .map_err(Error::Map)?;

        let ptr = NonNull::new(ptr.cast::<u8>()).ok_or(Error::Map(rustix::io::Errno::FAULT))?;

        Ok(Self { ptr, len })
    }

    /// Start of the mapped region.
    #[inline]
    pub fn as_ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    /// Length of the mapped region.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True for a zero-length mapping (never produced; blocks are at least a page).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Tear the mapping down, reporting failure.
    pub fn unmap(self) -> Result<()> {
        let this = std::mem::ManuallyDrop::new(self);
        // SAFETY: ptr/len describe a mapping we created and still own;
        // ManuallyDrop keeps Drop from unmapping it a second time.
        unsafe { rustix::mm::munmap(this.ptr.as_ptr().cast(), this.len) }.map_err(Error::Unmap)
    }
}

impl Drop for Mapping {
    fn drop(&mut self) {
        // SAFETY: ptr/len describe a mapping we created and still own.
        if let Err(e) = unsafe { rustix::mm::munmap(self.ptr.as_ptr().cast(), self.len) } {
            tracing::warn!("munmap of {} bytes at {:p} failed: {e}", self.len, self.ptr);
        }
    }
}

// SAFETY: Mapping is Send + Sync because:
// - It is only a pointer/length pair for a MAP_SHARED region
// - The kernel keeps the region valid until munmap, from any thread
unsafe impl Send for Mapping {}
unsafe impl Sync for Mapping {}
