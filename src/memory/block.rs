//! Blocks: file ranges with an optional live mapping.
//!
//! A [`FileMemory`] is a reference-counted handle to either a root block
//! (owns a range of the backing file) or a share (read-only view of a root
//! block's range). Shares hold a strong reference to their root, so the root
//! and its disk range outlive every share.
//!
//! # Mapping
//!
//! Each block has one mapping slot. [`FileMemory::map`] fills it,
//! [`FileMemory::unmap`] empties it; mapping twice without unmapping is an
//! error. [`FileMemory::map_readable`] and [`FileMemory::map_writable`] wrap
//! the pair in a view that unmaps on drop. While a view is alive the slot is
//! held by it: `map` and `unmap` on any handle of the block fail until the
//! view goes away.
//!
//! ```text
//!  root:   file_offset ──┬──────────── maxsize ────────────┐
//!                        │ prefix │  size   │ padding │ ... │
//!  share(1, 2):          │        │ .XX.    │         │     │  same file range
//! ```

use super::allocator::FileMemAllocator;
use super::mapper::{MapMode, Mapping};
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::ptr::NonNull;
use std::sync::Arc;
use tracing::{debug, warn};

/// Handle to a file-backed block.
///
/// Cheap to clone (an `Arc` increment). The block is destroyed when the last
/// handle is dropped.
#[derive(Clone)]
pub struct FileMemory {
    inner: Arc<BlockInner>,
}

struct BlockInner {
    allocator: Arc<FileMemAllocator>,
    /// Start of the storage in the backing file (shared with the root for shares).
    file_offset: u64,
    /// Page-aligned capacity.
    maxsize: u64,
    align: u64,
    /// Logical window `[offset, offset + size)` inside `[0, maxsize)`.
    offset: u64,
    size: u64,
    /// Root block this share views. `None` for roots.
    parent: Option<FileMemory>,
    read_only: bool,
    map: Mutex<MapSlot>,
}

#[derive(Default)]
struct MapSlot {
    mapping: Option<Mapping>,
    /// Mapping installed by `share`, adopted by the first `map(Read)`.
    eager: bool,
    /// The mapping is owned by a live `MappedRead`/`MappedWrite`.
    viewed: bool,
}

impl FileMemory {
    pub(crate) fn new_root(
        allocator: Arc<FileMemAllocator>,
        file_offset: u64,
        maxsize: u64,
        align: u64,
        offset: u64,
        size: u64,
    ) -> Self {
        Self {
            inner: Arc::new(BlockInner {
                allocator,
                file_offset,
                maxsize,
                align,
                offset,
                size,
                parent: None,
                read_only: false,
                map: Mutex::new(MapSlot::default()),
            }),
        }
    }

    /// Map the whole block and return a pointer to byte 0 of `maxsize`.
    ///
    /// The logical window starts `offset()` bytes in. The mapping stays until
    /// [`FileMemory::unmap`] or until the block is destroyed.
    ///
    /// # Errors
    ///
    /// - [`Error::ReadOnly`] for `Write` on a share
    /// - [`Error::AlreadyMapped`] if the block is mapped already
    /// - [`Error::Map`] if `mmap` fails; nothing is recorded
    pub fn map(&self, mode: MapMode) -> Result<NonNull<u8>> {
        self.map_slot(mode, false)
    }

    fn map_slot(&self, mode: MapMode, viewed: bool) -> Result<NonNull<u8>> {
        if mode.can_write() && self.inner.read_only {
            return Err(Error::ReadOnly);
        }

        let mut guard = self.inner.map.lock();
        let slot = &mut *guard;

        if let Some(mapping) = &slot.mapping {
            if slot.eager && !slot.viewed && mode == MapMode::Read {
                slot.eager = false;
                slot.viewed = viewed;
                return Ok(mapping.as_ptr());
            }
            return Err(Error::AlreadyMapped);
        }

        let mapping =
            self.inner
                .allocator
                .map_range(self.inner.file_offset, self.inner.maxsize, mode)?;
        let ptr = mapping.as_ptr();
        slot.mapping = Some(mapping);
        slot.viewed = viewed;

        debug!("{:p}: mapped {:p} ({mode})", Arc::as_ptr(&self.inner), ptr);
        Ok(ptr)
    }

    /// Tear down the block's mapping.
    ///
    /// The mapping record is cleared even if `munmap` fails; the block itself
    /// stays valid and can be mapped again.
    ///
    /// # Errors
    ///
    /// [`Error::NotMapped`] without a mapping, [`Error::MappingInUse`] while
    /// a [`MappedRead`] or [`MappedWrite`] holds it, [`Error::Unmap`] if
    /// `munmap` fails.
    pub fn unmap(&self) -> Result<()> {
        let mapping = {
            let mut slot = self.inner.map.lock();
            if slot.viewed {
                return Err(Error::MappingInUse);
            }
            slot.eager = false;
            slot.mapping.take()
        }
        .ok_or(Error::NotMapped)?;

        self.inner.allocator.unmap_range(mapping)?;
        debug!("{:p}: unmapped", Arc::as_ptr(&self.inner));
        Ok(())
    }

    /// Tear down the mapping a view created, and only that one.
    fn release_view(&self, ptr: NonNull<u8>) -> Result<()> {
        let mapping = {
            let mut slot = self.inner.map.lock();
            let owned = slot.viewed && slot.mapping.as_ref().is_some_and(|m| m.as_ptr() == ptr);
            if !owned {
                return Err(Error::NotMapped);
            }
            slot.viewed = false;
            slot.eager = false;
            slot.mapping.take()
        }
        .ok_or(Error::NotMapped)?;

        self.inner.allocator.unmap_range(mapping)?;
        debug!("{:p}: view unmapped", Arc::as_ptr(&self.inner));
        Ok(())
    }

    /// Map for reading and return a view of the logical window.
    ///
    /// The view holds the block's mapping slot until it is dropped or
    /// unmapped.
    pub fn map_readable(&self) -> Result<MappedRead<'_>> {
        let ptr = self.map_slot(MapMode::Read, true)?;
        Ok(MappedRead {
            mem: self,
            ptr,
            mapped: true,
        })
    }

    /// Map for writing and return a view of the logical window.
    pub fn map_writable(&self) -> Result<MappedWrite<'_>> {
        let ptr = self.map_slot(MapMode::Write, true)?;
        Ok(MappedWrite {
            mem: self,
            ptr,
            mapped: true,
        })
    }

    /// Create a read-only view of part of this block.
    ///
    /// `offset` is relative to this block's logical window and may be
    /// negative as long as the result stays inside `maxsize`. A `size` of
    /// `None` takes the rest of the window. The share points at the same file
    /// range, so no new space is consumed, and is mapped for reading before
    /// this returns.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidShare`] if the window leaves `[0, maxsize]`,
    /// [`Error::Map`] if the read-only mapping fails.
    pub fn share(&self, offset: i64, size: Option<u64>) -> Result<FileMemory> {
        let inner = &self.inner;
        let invalid = |size: u64| Error::InvalidShare {
            offset,
            size,
            maxsize: inner.maxsize,
        };

        let size = match size {
            Some(size) => size,
            None => {
                let rest = i128::from(inner.size) - i128::from(offset);
                u64::try_from(rest).map_err(|_| invalid(0))?
            }
        };

        let start = i128::from(inner.offset) + i128::from(offset);
        if start < 0 || start + i128::from(size) > i128::from(inner.maxsize) {
            return Err(invalid(size));
        }

        debug!("{:p}: share {offset} {size}", Arc::as_ptr(inner));

        // find the real parent
        let parent = match &inner.parent {
            Some(root) => root.clone(),
            None => self.clone(),
        };

        let mapping = inner
            .allocator
            .map_range(inner.file_offset, inner.maxsize, MapMode::Read)?;

        inner.allocator.share_created();
        Ok(FileMemory {
            inner: Arc::new(BlockInner {
                allocator: Arc::clone(&inner.allocator),
                file_offset: inner.file_offset,
                maxsize: inner.maxsize,
                align: inner.align,
                offset: start as u64,
                size,
                parent: Some(parent),
                read_only: true,
                map: Mutex::new(MapSlot {
                    mapping: Some(mapping),
                    eager: true,
                    viewed: false,
                }),
            }),
        })
    }

    /// Whether `other` starts exactly where this block ends in the same storage.
    ///
    /// Spans relate sibling shares only: a block is never a span with itself
    /// or with its parent. The check is directional; `a.is_span(&b)` does not
    /// imply `b.is_span(&a)`.
    pub fn is_span(&self, other: &FileMemory) -> bool {
        let (a, b) = (&self.inner, &other.inner);

        Arc::ptr_eq(&a.allocator, &b.allocator)
            && !Arc::ptr_eq(a, b)
            && !self.is_parent_of(other)
            && !other.is_parent_of(self)
            && a.file_offset == b.file_offset
            && a.offset + a.size == b.offset
    }

    /// Offset of this block inside its parent's window, if it spans `other`.
    ///
    /// Returns `None` when the blocks are not a span, or when this share
    /// starts before its parent's logical window.
    pub fn span_offset(&self, other: &FileMemory) -> Option<u64> {
        if !self.is_span(other) {
            return None;
        }
        // spans only form between shares, which always have a parent
        let parent = self.inner.parent.as_ref()?;
        self.inner.offset.checked_sub(parent.inner.offset)
    }

    fn is_parent_of(&self, other: &FileMemory) -> bool {
        other
            .inner
            .parent
            .as_ref()
            .is_some_and(|p| Arc::ptr_eq(&p.inner, &self.inner))
    }

    /// Logical size.
    #[inline]
    pub fn size(&self) -> u64 {
        self.inner.size
    }

    /// Start of the logical window inside the block.
    #[inline]
    pub fn offset(&self) -> u64 {
        self.inner.offset
    }

    /// Full page-aligned capacity.
    #[inline]
    pub fn maxsize(&self) -> u64 {
        self.inner.maxsize
    }

    /// `(size, offset, maxsize)` in one call.
    #[inline]
    pub fn sizes(&self) -> (u64, u64, u64) {
        (self.inner.size, self.inner.offset, self.inner.maxsize)
    }

    /// Start of the block's storage in the backing file.
    #[inline]
    pub fn file_offset(&self) -> u64 {
        self.inner.file_offset
    }

    /// Alignment requested at allocation.
    #[inline]
    pub fn align(&self) -> u64 {
        self.inner.align
    }

    /// The root block this share views, if any.
    #[inline]
    pub fn parent(&self) -> Option<&FileMemory> {
        self.inner.parent.as_ref()
    }

    /// True for shares.
    #[inline]
    pub fn is_read_only(&self) -> bool {
        self.inner.read_only
    }

    /// True while a mapping is live.
    pub fn is_mapped(&self) -> bool {
        self.inner.map.lock().mapping.is_some()
    }

    /// Pointer to byte 0 of the live mapping.
    pub fn data_ptr(&self) -> Option<NonNull<u8>> {
        self.inner.map.lock().mapping.as_ref().map(Mapping::as_ptr)
    }

    /// The allocator this block came from.
    #[inline]
    pub fn allocator(&self) -> &Arc<FileMemAllocator> {
        &self.inner.allocator
    }

    /// True if both handles refer to the same block.
    #[inline]
    pub fn ptr_eq(&self, other: &FileMemory) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for FileMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileMemory")
            .field("file_offset", &self.inner.file_offset)
            .field("maxsize", &self.inner.maxsize)
            .field("offset", &self.inner.offset)
            .field("size", &self.inner.size)
            .field("shared", &self.inner.parent.is_some())
            .field("mapped", &self.is_mapped())
            .finish()
    }
}

impl Drop for BlockInner {
    fn drop(&mut self) {
        if let Some(mapping) = self.map.get_mut().mapping.take() {
            if let Err(e) = self.allocator.unmap_range(mapping) {
                warn!("{:p}: unmap on free failed: {e}", self as *const Self);
            }
        }

        if self.parent.is_some() {
            self.allocator.share_dropped();
        } else {
            self.allocator.retire_block(self.file_offset, self.maxsize);
        }
        debug!("{:p}: freed", self as *const Self);
    }
}

/// Read view of a block's logical window. Unmaps on drop.
pub struct MappedRead<'a> {
    mem: &'a FileMemory,
    ptr: NonNull<u8>,
    mapped: bool,
}

impl MappedRead<'_> {
    /// The logical window.
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: the mapping covers [0, maxsize) and offset + size <= maxsize.
        // The slot is marked viewed, so no handle can unmap it before this
        // view releases it.
        unsafe {
            std::slice::from_raw_parts(
                self.ptr.as_ptr().add(self.mem.offset() as usize),
                self.mem.size() as usize,
            )
        }
    }

    /// The block being viewed.
    pub fn memory(&self) -> &FileMemory {
        self.mem
    }

    /// Unmap now and report failure.
    pub fn unmap(mut self) -> Result<()> {
        self.mapped = false;
        self.mem.release_view(self.ptr)
    }
}

impl Drop for MappedRead<'_> {
    fn drop(&mut self) {
        if self.mapped {
            if let Err(e) = self.mem.release_view(self.ptr) {
                warn!("unmap of read view failed: {e}");
            }
        }
    }
}

/// Write view of a block's logical window. Unmaps on drop.
///
/// Shares map the same file range, so they see writes made through this
/// view. Reading a share while this view writes is a data race; callers must
/// synchronize the two themselves. The view is `Send` but not `Sync`.
pub struct MappedWrite<'a> {
    mem: &'a FileMemory,
    ptr: NonNull<u8>,
    mapped: bool,
}

impl MappedWrite<'_> {
    /// The logical window.
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: see MappedRead::as_slice.
        unsafe {
            std::slice::from_raw_parts(
                self.ptr.as_ptr().add(self.mem.offset() as usize),
                self.mem.size() as usize,
            )
        }
    }

    /// The logical window, writable.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as above; the block's slot holds this one mapping and
        // &mut self gives exclusive access through it.
        unsafe {
            std::slice::from_raw_parts_mut(
                self.ptr.as_ptr().add(self.mem.offset() as usize),
                self.mem.size() as usize,
            )
        }
    }

    /// The block being viewed.
    pub fn memory(&self) -> &FileMemory {
        self.mem
    }

    /// Unmap now and report failure.
    pub fn unmap(mut self) -> Result<()> {
        self.mapped = false;
        self.mem.release_view(self.ptr)
    }
}

impl Drop for MappedWrite<'_> {
    fn drop(&mut self) {
        if self.mapped {
            if let Err(e) = self.mem.release_view(self.ptr) {
                warn!("unmap of write view failed: {e}");
            }
        }
    }
}

// SAFETY: the views only add a raw pointer into a MAP_SHARED region that the
// referenced block keeps mapped for the view's lifetime. A shared MappedRead
// only hands out `&[u8]`. MappedWrite is not Sync; readers of the same pages
// on other threads go through shares and must be synchronized by the caller.
unsafe impl Send for MappedRead<'_> {}
unsafe impl Sync for MappedRead<'_> {}
unsafe impl Send for MappedWrite<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{AllocationParams, FileMemConfig};

    fn allocator(dir: &tempfile::TempDir) -> Arc<FileMemAllocator> {
        FileMemAllocator::new(FileMemConfig::in_dir(dir.path())).unwrap()
    }

    fn filled(allocator: &Arc<FileMemAllocator>, data: &[u8]) -> FileMemory {
        let mem = allocator
            .alloc(data.len() as u64, &AllocationParams::default())
            .unwrap();
        let mut view = mem.map_writable().unwrap();
        view.as_mut_slice().copy_from_slice(data);
        view.unmap().unwrap();
        mem
    }

    #[test]
    fn test_map_unmap_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let allocator = allocator(&dir);
        let mem = allocator.alloc(16, &AllocationParams::default()).unwrap();

        assert!(!mem.is_mapped());
        let ptr = mem.map(MapMode::Write).unwrap();
        assert!(mem.is_mapped());
        assert_eq!(mem.data_ptr(), Some(ptr));

        mem.unmap().unwrap();
        assert!(!mem.is_mapped());
        assert!(mem.data_ptr().is_none());
    }

    #[test]
    fn test_double_map_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let allocator = allocator(&dir);
        let mem = allocator.alloc(16, &AllocationParams::default()).unwrap();

        mem.map(MapMode::Read).unwrap();
        assert!(matches!(mem.map(MapMode::Read), Err(Error::AlreadyMapped)));
        mem.unmap().unwrap();
        assert!(matches!(mem.unmap(), Err(Error::NotMapped)));
    }

    #[test]
    fn test_prefix_window_offset() {
        let dir = tempfile::tempdir().unwrap();
        let allocator = allocator(&dir);
        let params = AllocationParams::new().with_prefix(8);
        let mem = allocator.alloc(4, &params).unwrap();

        {
            let mut view = mem.map_writable().unwrap();
            view.as_mut_slice().copy_from_slice(&[1, 2, 3, 4]);
        }

        let ptr = mem.map(MapMode::Read).unwrap();
        let raw = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), 12) };
        assert_eq!(&raw[8..12], &[1, 2, 3, 4]);
        assert_eq!(&raw[..8], &[0; 8]);
        mem.unmap().unwrap();
    }

    #[test]
    fn test_share_sub_range() {
        let dir = tempfile::tempdir().unwrap();
        let allocator = allocator(&dir);
        let mem = filled(&allocator, &[0, 1, 2, 3]);

        let sub = mem.share(1, Some(2)).unwrap();
        assert_eq!(sub.size(), 2);
        assert_eq!(sub.offset(), 1);
        assert_eq!(sub.file_offset(), mem.file_offset());
        assert_eq!(sub.maxsize(), mem.maxsize());
        assert!(sub.is_read_only());
        assert!(sub.parent().unwrap().ptr_eq(&mem));

        // eagerly mapped
        assert!(sub.is_mapped());
        let view = sub.map_readable().unwrap();
        assert_eq!(view.as_slice(), &[1, 2]);
    }

    #[test]
    fn test_share_rest_and_empty() {
        let dir = tempfile::tempdir().unwrap();
        let allocator = allocator(&dir);
        let mem = filled(&allocator, &[0, 1, 2, 3]);

        let rest = mem.share(1, None).unwrap();
        assert_eq!(rest.size(), 3);
        assert_eq!(rest.map_readable().unwrap().as_slice(), &[1, 2, 3]);

        let empty = mem.share(1, Some(0)).unwrap();
        assert_eq!(empty.size(), 0);
        assert!(empty.map_readable().unwrap().as_slice().is_empty());

        let full = mem.share(0, Some(mem.size())).unwrap();
        assert_eq!(full.size(), mem.size());
    }

    #[test]
    fn test_share_flattens_to_root() {
        let dir = tempfile::tempdir().unwrap();
        let allocator = allocator(&dir);
        let mem = filled(&allocator, &[0, 1, 2, 3]);

        let sub = mem.share(1, Some(3)).unwrap();
        let subsub = sub.share(1, Some(1)).unwrap();

        assert!(subsub.parent().unwrap().ptr_eq(&mem));
        assert_eq!(subsub.offset(), 2);
        assert_eq!(subsub.map_readable().unwrap().as_slice(), &[2]);
    }

    #[test]
    fn test_share_is_read_only() {
        let dir = tempfile::tempdir().unwrap();
        let allocator = allocator(&dir);
        let mem = filled(&allocator, &[0, 1, 2, 3]);

        let sub = mem.share(0, None).unwrap();
        assert!(matches!(sub.map(MapMode::Write), Err(Error::ReadOnly)));
        assert!(matches!(sub.map_writable(), Err(Error::ReadOnly)));
    }

    #[test]
    fn test_share_out_of_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let allocator = allocator(&dir);
        let mem = filled(&allocator, &[0, 1, 2, 3]);

        assert!(matches!(
            mem.share(-1, Some(1)),
            Err(Error::InvalidShare { .. })
        ));
        assert!(matches!(mem.share(5, None), Err(Error::InvalidShare { .. })));
        assert!(matches!(
            mem.share(0, Some(mem.maxsize() + 1)),
            Err(Error::InvalidShare { .. })
        ));
        // the padding area up to maxsize is reachable
        assert!(mem.share(4, Some(mem.maxsize() - 4)).is_ok());
    }

    #[test]
    fn test_share_sees_parent_writes() {
        let dir = tempfile::tempdir().unwrap();
        let allocator = allocator(&dir);
        let mem = filled(&allocator, &[0, 0, 0, 0]);
        let sub = mem.share(2, Some(2)).unwrap();

        let mut view = mem.map_writable().unwrap();
        view.as_mut_slice()[3] = 42;

        let ptr = sub.data_ptr().unwrap();
        assert_eq!(unsafe { *ptr.as_ptr().add(3) }, 42);
        drop(view);
    }

    #[test]
    fn test_share_keeps_parent_alive() {
        let dir = tempfile::tempdir().unwrap();
        let allocator = allocator(&dir);
        let mem = filled(&allocator, &[5, 6, 7, 8]);

        let sub = mem.share(0, None).unwrap();
        drop(mem);
        assert_eq!(allocator.stats().live_blocks, 1);
        assert_eq!(allocator.stats().live_shares, 1);
        assert_eq!(sub.map_readable().unwrap().as_slice(), &[5, 6, 7, 8]);

        drop(sub);
        assert_eq!(allocator.stats().live_blocks, 0);
        assert_eq!(allocator.stats().live_shares, 0);
    }

    #[test]
    fn test_span_detection() {
        let dir = tempfile::tempdir().unwrap();
        let allocator = allocator(&dir);
        let mem = filled(&allocator, &[0, 1, 2, 3]);

        let a = mem.share(0, Some(2)).unwrap();
        let b = mem.share(2, Some(2)).unwrap();

        assert!(a.is_span(&b));
        assert_eq!(a.span_offset(&b), Some(0));
        // adjacency is directional
        assert!(!b.is_span(&a));
        assert_eq!(b.span_offset(&a), None);

        assert!(!a.is_span(&mem));
        assert!(!mem.is_span(&a));
        assert!(!mem.is_span(&b));
    }

    #[test]
    fn test_non_adjacent_shares_are_not_spans() {
        let dir = tempfile::tempdir().unwrap();
        let allocator = allocator(&dir);
        let mem = filled(&allocator, &[0, 1, 2, 3]);

        let a = mem.share(0, Some(1)).unwrap();
        let b = mem.share(2, Some(2)).unwrap();
        assert!(!a.is_span(&b));
        assert!(!b.is_span(&a));
    }

    #[test]
    fn test_empty_share_is_not_span_with_itself() {
        let dir = tempfile::tempdir().unwrap();
        let allocator = allocator(&dir);
        let mem = filled(&allocator, &[0, 1, 2, 3]);

        let empty = mem.share(2, Some(0)).unwrap();
        assert!(!empty.is_span(&empty));
        assert!(!empty.is_span(&empty.clone()));
    }

    #[test]
    fn test_blocks_of_different_storage_are_not_spans() {
        let dir = tempfile::tempdir().unwrap();
        let allocator = allocator(&dir);
        let first = filled(&allocator, &[0, 1]);
        let second = filled(&allocator, &[2, 3]);

        let a = first.share(0, Some(2)).unwrap();
        let b = second.share(0, Some(2)).unwrap();
        assert!(!a.is_span(&b));
    }

    #[test]
    fn test_span_offset_relative_to_parent_window() {
        let dir = tempfile::tempdir().unwrap();
        let allocator = allocator(&dir);
        let params = AllocationParams::new().with_prefix(16);
        let mem = allocator.alloc(8, &params).unwrap();

        let a = mem.share(2, Some(3)).unwrap();
        let b = mem.share(5, Some(3)).unwrap();
        assert!(a.is_span(&b));
        assert_eq!(a.span_offset(&b), Some(2));
    }

    #[test]
    fn test_drop_while_mapped_unmaps() {
        let dir = tempfile::tempdir().unwrap();
        let allocator = allocator(&dir);
        let mem = allocator.alloc(16, &AllocationParams::default()).unwrap();
        mem.map(MapMode::Write).unwrap();
        drop(mem);
        assert_eq!(allocator.stats().live_blocks, 0);
    }

    #[test]
    fn test_unmap_refused_while_view_alive() {
        let dir = tempfile::tempdir().unwrap();
        let allocator = allocator(&dir);
        let mem = filled(&allocator, &[9, 8, 7, 6]);
        let other = mem.clone();

        let view = mem.map_readable().unwrap();
        assert!(matches!(mem.unmap(), Err(Error::MappingInUse)));
        let from_thread = std::thread::scope(|s| s.spawn(|| other.unmap()).join().unwrap());
        assert!(matches!(from_thread, Err(Error::MappingInUse)));

        // the view still reads the live mapping
        assert!(mem.is_mapped());
        assert_eq!(view.as_slice(), &[9, 8, 7, 6]);

        view.unmap().unwrap();
        assert!(!mem.is_mapped());
        assert!(matches!(mem.unmap(), Err(Error::NotMapped)));
    }

    #[test]
    fn test_view_only_releases_its_own_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let allocator = allocator(&dir);
        let mem = filled(&allocator, &[1, 2, 3, 4]);

        let view = mem.map_readable().unwrap();
        assert!(matches!(mem.map(MapMode::Write), Err(Error::AlreadyMapped)));
        drop(view);

        // a mapping made with map() is not released by a stale view pointer
        let ptr = mem.map(MapMode::Write).unwrap();
        assert!(matches!(mem.release_view(ptr), Err(Error::NotMapped)));
        assert!(mem.is_mapped());
        assert_eq!(mem.data_ptr(), Some(ptr));
        mem.unmap().unwrap();
    }

    #[test]
    fn test_share_view_holds_eager_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let allocator = allocator(&dir);
        let mem = filled(&allocator, &[0, 1, 2, 3]);
        let sub = mem.share(1, Some(2)).unwrap();

        let view = sub.map_readable().unwrap();
        assert!(matches!(sub.unmap(), Err(Error::MappingInUse)));
        assert!(matches!(sub.map_readable(), Err(Error::AlreadyMapped)));
        assert_eq!(view.as_slice(), &[1, 2]);
        drop(view);

        assert!(!sub.is_mapped());
        assert_eq!(sub.map_readable().unwrap().as_slice(), &[1, 2]);
    }
}
