//! Default sizes and names for file-backed allocators.
//!
//! # Usage
//!
//! ```rust,ignore
//! use filemem::memory::{FileMemConfig, defaults};
//!
//! let config = FileMemConfig::new(defaults::DEFAULT_TEMP_TEMPLATE)
//!     .capacity(defaults::capacity_for_blocks(1500, 64, 4096));
//! ```

// =============================================================================
// Capacities (bytes)
// =============================================================================

/// Default backing-file size (1 MiB).
pub const DEFAULT_CAPACITY: u64 = 1 << 20;

// =============================================================================
// Names
// =============================================================================

/// Default name under which an allocator is registered.
pub const DEFAULT_ALLOCATOR_NAME: &str = "FileMemory";

/// Template for the backing file, mkstemp style.
pub const DEFAULT_TEMP_TEMPLATE: &str = "/tmp/filemem-XXXXXX";

/// Minimum number of trailing `X` characters in a template.
pub const MIN_TEMPLATE_RANDOM: usize = 6;

// =============================================================================
// Convenience Functions
// =============================================================================

/// Capacity needed to hold `count` blocks of `block_size` bytes each once
/// every block is rounded up to `page_size`.
///
/// # Example
/// ```rust,ignore
/// let capacity = capacity_for_blocks(1500, 64, 4096); // 64 pages
/// ```
pub const fn capacity_for_blocks(block_size: u64, count: u64, page_size: u64) -> u64 {
    let per_block = if block_size == 0 {
        page_size
    } else {
        block_size.div_ceil(page_size) * page_size
    };
    per_block * count
}
