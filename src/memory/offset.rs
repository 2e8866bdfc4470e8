//! Bump allocation of file offsets.
//!
//! Offsets only ever move forward. A freed block's range is retired for good:
//! its disk blocks may be punched out, but the offsets are never handed out
//! again. This keeps every block disjoint without any free-list bookkeeping.

use crate::error::{Error, Result};
use parking_lot::Mutex;

/// Monotonic cursor over `[0, capacity)`.
#[derive(Debug)]
pub struct OffsetAllocator {
    /// Next free offset. Invariant: `next <= capacity`.
    next: Mutex<u64>,
    capacity: u64,
}

impl OffsetAllocator {
    /// Create a cursor at offset 0.
    pub fn new(capacity: u64) -> Self {
        Self {
            next: Mutex::new(0),
            capacity,
        }
    }

    /// Commit `maxsize` bytes and return their starting offset.
    ///
    /// `prepare` runs under the lock with the candidate range before the
    /// cursor moves; if it fails nothing changes. This is where disk space
    /// gets reserved.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfSpace`] if the range does not fit, or whatever
    /// `prepare` returns.
    pub fn commit<F>(&self, maxsize: u64, prepare: F) -> Result<u64>
    where
        F: FnOnce(u64, u64) -> Result<()>,
    {
        let mut next = self.next.lock();
        let offset = *next;

        let available = self.capacity - offset;
        if maxsize > available {
            return Err(Error::OutOfSpace {
                requested: maxsize,
                available,
            });
        }

        prepare(offset, maxsize)?;
        *next = offset + maxsize;

        Ok(offset)
    }

    /// Current cursor position (bytes handed out so far).
    #[inline]
    pub fn next_offset(&self) -> u64 {
        *self.next.lock()
    }

    /// Bytes still available.
    #[inline]
    pub fn remaining(&self) -> u64 {
        self.capacity - self.next_offset()
    }

    /// Total range size.
    #[inline]
    pub fn capacity(&self) -> u64 {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn no_prepare(_: u64, _: u64) -> Result<()> {
        Ok(())
    }

    #[test]
    fn test_commit_advances() {
        let offsets = OffsetAllocator::new(4 * 4096);
        assert_eq!(offsets.commit(4096, no_prepare).unwrap(), 0);
        assert_eq!(offsets.commit(8192, no_prepare).unwrap(), 4096);
        assert_eq!(offsets.next_offset(), 12288);
        assert_eq!(offsets.remaining(), 4096);
    }

    #[test]
    fn test_commit_exact_fit() {
        let offsets = OffsetAllocator::new(8192);
        assert_eq!(offsets.commit(8192, no_prepare).unwrap(), 0);
        assert_eq!(offsets.remaining(), 0);
    }

    #[test]
    fn test_commit_out_of_space() {
        let offsets = OffsetAllocator::new(8192);
        offsets.commit(4096, no_prepare).unwrap();

        let err = offsets.commit(8192, no_prepare).unwrap_err();
        assert!(matches!(
            err,
            Error::OutOfSpace {
                requested: 8192,
                available: 4096
            }
        ));
        assert_eq!(offsets.next_offset(), 4096);
    }

    #[test]
    fn test_failed_prepare_leaves_cursor() {
        let offsets = OffsetAllocator::new(8192);
        let result = offsets.commit(4096, |offset, len| {
            assert_eq!((offset, len), (0, 4096));
            Err(Error::Reservation(rustix::io::Errno::NOSPC))
        });
        assert!(matches!(result, Err(Error::Reservation(_))));
        assert_eq!(offsets.next_offset(), 0);

        assert_eq!(offsets.commit(4096, no_prepare).unwrap(), 0);
    }

    #[test]
    fn test_concurrent_commits_are_disjoint() {
        let offsets = Arc::new(OffsetAllocator::new(1024 * 4096));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let offsets = Arc::clone(&offsets);
                thread::spawn(move || {
                    (0..128)
                        .map(|_| offsets.commit(4096, no_prepare).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut all: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        all.dedup();

        assert_eq!(all.len(), 1024);
        assert!(offsets.commit(4096, no_prepare).is_err());
    }
}
