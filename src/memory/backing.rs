//! Backing store: one pre-sized, unlinked file.
//!
//! The file is created from an mkstemp-style template and unlinked straight
//! away, so nothing is left in the directory. Its storage lives as long as
//! the descriptor held by [`BackingStore`] and is reclaimed by the kernel when
//! the store is dropped.
//!
//! # Layout
//!
//! ```text
//! ┌──────────┬──────────┬──────────┬───────────────────────────┐
//! │ block 0  │ block 1  │ block 2  │       never handed out    │
//! └──────────┴──────────┴──────────┴───────────────────────────┘
//! 0                                ^ next_offset               ^ capacity
//! ```

use super::defaults;
use crate::error::{Error, Result};
use rustix::fd::{AsFd, BorrowedFd, OwnedFd};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Platform features, probed once when the store is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Files can be memory-mapped.
    pub mmap: bool,
    /// `fallocate` can reserve disk blocks ahead of use.
    pub reserve: bool,
    /// `fallocate` can punch holes to give disk blocks back.
    pub release: bool,
}

impl Capabilities {
    /// Capabilities with nothing but mapping.
    pub const fn mmap_only() -> Self {
        Self {
            mmap: cfg!(unix),
            reserve: false,
            release: false,
        }
    }
}

/// The file every block of one allocator lives in.
pub struct BackingStore {
    /// Descriptor of the unlinked file (sole owner).
    fd: OwnedFd,
    /// File length in bytes.
    capacity: u64,
    /// Platform page size.
    page_size: u64,
    /// Probed platform features.
    caps: Capabilities,
}

impl BackingStore {
    /// Create the backing file, unlink it and size it to `capacity` bytes.
    ///
    /// # Arguments
    ///
    /// * `capacity` - File length in bytes. Must be > 0.
    /// * `template` - Path whose file name ends in at least six `X`
    ///   characters, e.g. `/tmp/filemem-XXXXXX`. A bare file name is created
    ///   in the system temp directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Construction`] if the template is invalid or if
    /// creating, unlinking or resizing the file fails.
    pub fn create(capacity: u64, template: &Path) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::Construction("capacity must be > 0".into()));
        }
        if !Capabilities::mmap_only().mmap {
            return Err(Error::Construction(
                "memory mapping is not available on this platform".into(),
            ));
        }

        let (dir, prefix, random_len) = parse_template(template)?;

        let named = tempfile::Builder::new()
            .prefix(&prefix)
            .rand_bytes(random_len)
            .tempfile_in(&dir)
            .map_err(|e| {
                Error::Construction(format!("creating file in {}: {e}", dir.display()))
            })?;
        let (file, path) = named
            .keep()
            .map_err(|e| Error::Construction(format!("keeping temp file: {}", e.error)))?;

        rustix::fs::unlink(&path)
            .map_err(|e| Error::Construction(format!("unlink {}: {e}", path.display())))?;

        let fd = OwnedFd::from(file);
        rustix::fs::ftruncate(&fd, capacity)
            .map_err(|e| Error::Construction(format!("ftruncate to {capacity}: {e}")))?;

        let page_size = rustix::param::page_size() as u64;
        let caps = probe_capabilities(fd.as_fd(), page_size.min(capacity));

        info!(
            path = %path.display(),
            capacity,
            page_size,
            reserve = caps.reserve,
            release = caps.release,
            "backing store created"
        );

        Ok(Self {
            fd,
            capacity,
            page_size,
            caps,
        })
    }

    /// Reserve disk blocks for `[offset, offset + len)`.
    ///
    /// # Errors
    ///
    /// [`Error::Unsupported`] without the capability, [`Error::Reservation`]
    /// if the filesystem refuses.
    pub fn reserve(&self, offset: u64, len: u64) -> Result<()> {
        if !self.caps.reserve {
            return Err(Error::Unsupported("fallocate"));
        }
        falloc::reserve(self.fd.as_fd(), offset, len).map_err(Error::Reservation)
    }

    /// Give the disk blocks of `[offset, offset + len)` back to the filesystem.
    ///
    /// The file keeps its length; the range reads back as zeroes.
    pub fn release(&self, offset: u64, len: u64) -> Result<()> {
        if !self.caps.release {
            return Err(Error::Unsupported("fallocate punch hole"));
        }
        falloc::punch_hole(self.fd.as_fd(), offset, len)?;
        Ok(())
    }

    /// File length in bytes.
    #[inline]
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Platform page size.
    #[inline]
    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// Probed platform features.
    #[inline]
    pub fn capabilities(&self) -> Capabilities {
        self.caps
    }

    /// Borrow the backing descriptor.
    #[inline]
    pub fn fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

impl AsFd for BackingStore {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

impl Drop for BackingStore {
    fn drop(&mut self) {
        // fd is closed when OwnedFd is dropped
        info!(capacity = self.capacity, "backing store closed");
    }
}

impl std::fmt::Debug for BackingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackingStore")
            .field("capacity", &self.capacity)
            .field("page_size", &self.page_size)
            .field("caps", &self.caps)
            .finish()
    }
}

/// Split an mkstemp template into (directory, prefix, random length).
fn parse_template(template: &Path) -> Result<(PathBuf, String, usize)> {
    let name = template
        .file_name()
        .and_then(OsStr::to_str)
        .ok_or_else(|| {
            Error::Construction(format!("invalid template: {}", template.display()))
        })?;

    let random_len = name.chars().rev().take_while(|&c| c == 'X').count();
    if random_len < defaults::MIN_TEMPLATE_RANDOM {
        return Err(Error::Construction(format!(
            "template {} must end in at least {} 'X' characters",
            template.display(),
            defaults::MIN_TEMPLATE_RANDOM
        )));
    }

    let prefix = name[..name.len() - random_len].to_string();
    let dir = match template.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::temp_dir(),
    };

    Ok((dir, prefix, random_len))
}

fn probe_capabilities(fd: BorrowedFd<'_>, len: u64) -> Capabilities {
    let mut caps = Capabilities::mmap_only();

    match falloc::reserve(fd, 0, len) {
        Ok(()) => caps.reserve = true,
        Err(e) => debug!("disk space reservation unavailable: {e}"),
    }
    match falloc::punch_hole(fd, 0, len) {
        Ok(()) => caps.release = true,
        Err(e) => debug!("hole punching unavailable: {e}"),
    }

    caps
}

#[cfg(any(target_os = "linux", target_os = "android"))]
mod falloc {
    use rustix::fd::BorrowedFd;
    use rustix::fs::{FallocateFlags, fallocate};

    pub(super) fn reserve(fd: BorrowedFd<'_>, offset: u64, len: u64) -> rustix::io::Result<()> {
        fallocate(fd, FallocateFlags::KEEP_SIZE, offset, len)
    }

    pub(super) fn punch_hole(fd: BorrowedFd<'_>, offset: u64, len: u64) -> rustix::io::Result<()> {
        fallocate(
            fd,
            FallocateFlags::PUNCH_HOLE | FallocateFlags::KEEP_SIZE,
            offset,
            len,
        )
    }
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
mod falloc {
    use rustix::fd::BorrowedFd;
    use rustix::io::Errno;

    pub(super) fn reserve(_fd: BorrowedFd<'_>, _offset: u64, _len: u64) -> rustix::io::Result<()> {
        Err(Errno::OPNOTSUPP)
    }

    pub(super) fn punch_hole(
        _fd: BorrowedFd<'_>,
        _offset: u64,
        _len: u64,
    ) -> rustix::io::Result<()> {
        Err(Errno::OPNOTSUPP)
    }
}
