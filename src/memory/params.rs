//! Per-request allocation parameters and size rounding.

use crate::error::{Error, Result};

/// Extra layout requirements for a single allocation.
///
/// `prefix` and `padding` reserve room before and after the logical window
/// (headers, footers). The block's logical window starts at `prefix`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct AllocationParams {
    /// Required alignment. Zero or a power of two.
    pub align: u64,
    /// Bytes reserved in front of the logical window.
    pub prefix: u64,
    /// Bytes reserved after the logical window.
    pub padding: u64,
}

impl AllocationParams {
    /// Parameters with no alignment, prefix or padding.
    pub const fn new() -> Self {
        Self {
            align: 0,
            prefix: 0,
            padding: 0,
        }
    }

    /// Set the alignment.
    pub const fn with_align(mut self, align: u64) -> Self {
        self.align = align;
        self
    }

    /// Set the prefix.
    pub const fn with_prefix(mut self, prefix: u64) -> Self {
        self.prefix = prefix;
        self
    }

    /// Set the padding.
    pub const fn with_padding(mut self, padding: u64) -> Self {
        self.padding = padding;
        self
    }

    /// Full reserved size for a request of `size` bytes.
    ///
    /// `size + prefix + padding` rounded up to the larger of `page_size` and
    /// `align`. A request that sums to zero still takes one page so the
    /// block always has a mappable region.
    pub fn maxsize(&self, size: u64, page_size: u64) -> Result<u64> {
        if self.align != 0 && !self.align.is_power_of_two() {
            return Err(Error::InvalidParams(format!(
                "alignment {} is not a power of two",
                self.align
            )));
        }

        let total = size
            .checked_add(self.prefix)
            .and_then(|s| s.checked_add(self.padding))
            .ok_or_else(|| Error::InvalidParams("allocation size overflow".into()))?;

        let granule = page_size.max(self.align);
        let maxsize = align_size(total, granule)
            .ok_or_else(|| Error::InvalidParams("allocation size overflow".into()))?;

        Ok(if maxsize == 0 { page_size } else { maxsize })
    }
}

/// Round `size` up to a multiple of `alignment` (a power of two).
///
/// Returns `None` on overflow.
#[inline]
pub fn align_size(size: u64, alignment: u64) -> Option<u64> {
    debug_assert!(alignment.is_power_of_two());
    size.checked_add(alignment - 1).map(|s| s & !(alignment - 1))
}
