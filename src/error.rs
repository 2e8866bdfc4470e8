//! Error types for filemem.

use thiserror::Error;

/// Result type alias using filemem's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for allocator operations.
///
/// Capacity exhaustion ([`Error::OutOfSpace`], [`Error::Reservation`]) and
/// mapping failures ([`Error::Map`], [`Error::Unmap`]) are separate variants
/// so callers can decide whether to retry smaller, pick another allocator or
/// give up on the current operation.
#[derive(Error, Debug)]
pub enum Error {
    /// The backing store could not be set up. No allocator exists.
    #[error("backing store construction failed: {0}")]
    Construction(String),

    /// The bump cursor cannot fit the requested block.
    #[error("not enough space: requested {requested} bytes, {available} available")]
    OutOfSpace {
        /// Page-aligned size that was requested.
        requested: u64,
        /// Bytes left between the cursor and the end of the file.
        available: u64,
    },

    /// Disk space reservation failed for a new block.
    #[error("disk space reservation failed: {0}")]
    Reservation(rustix::io::Errno),

    /// `mmap` failed.
    #[error("mmap failed: {0}")]
    Map(rustix::io::Errno),

    /// `munmap` failed. The mapping record is dropped regardless.
    #[error("munmap failed: {0}")]
    Unmap(rustix::io::Errno),

    /// The platform lacks the named capability.
    #[error("unsupported on this platform: {0}")]
    Unsupported(&'static str),

    /// Allocation parameters are out of range.
    #[error("invalid allocation parameters: {0}")]
    InvalidParams(String),

    /// A share window falls outside the source block.
    #[error("invalid share: offset {offset} size {size} exceeds maxsize {maxsize}")]
    InvalidShare {
        /// Requested logical offset of the share.
        offset: i64,
        /// Resolved size of the share.
        size: u64,
        /// Capacity of the source block.
        maxsize: u64,
    },

    /// Write access requested on a read-only block.
    #[error("block is read-only")]
    ReadOnly,

    /// The block already holds a live mapping.
    #[error("block is already mapped")]
    AlreadyMapped,

    /// The block holds no mapping to tear down.
    #[error("block is not mapped")]
    NotMapped,

    /// The block's mapping is held by a live view and cannot be torn down.
    #[error("block mapping is in use by a view")]
    MappingInUse,

    /// An allocator is already registered under this name.
    #[error("allocator already registered: {0}")]
    AlreadyRegistered(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// System call error (via rustix).
    #[error("system error: {0}")]
    System(#[from] rustix::io::Errno),
}

impl Error {
    /// True for failures caused by the allocator running out of room.
    pub fn is_out_of_space(&self) -> bool {
        matches!(self, Error::OutOfSpace { .. } | Error::Reservation(_))
    }

    /// True for `mmap`/`munmap` failures.
    pub fn is_map_failure(&self) -> bool {
        matches!(self, Error::Map(_) | Error::Unmap(_))
    }
}
