//! Bump allocation over the arena's data region.

use crate::error::{Result, ShmLogError};

/// Minimum region alignment (8 bytes, enough for a little-endian u64 cursor).
pub const REGION_ALIGNMENT: usize = 8;

/// A carved-out slice of the arena, identified by offset and length.
///
/// A `Region` is a handle, not a reference: every access goes back through
/// [`SharedArena::region`](super::SharedArena::region) or
/// [`SharedArena::region_mut`](super::SharedArena::region_mut), which bounds-
/// check against the live mapping. Regions are stable across processes
/// because the bump allocator is deterministic: the same allocation sequence
/// yields the same offsets in every attacher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    /// Byte offset from the start of the arena file.
    pub offset: usize,
    /// Length of the region in bytes.
    pub len: usize,
}

impl Region {
    /// End offset of the region (exclusive).
    #[must_use]
    pub fn end(&self) -> usize {
        self.offset + self.len
    }
}

/// Forward-only allocator carving aligned regions out of the data region.
///
/// There is no free. The arena uses this exactly twice: once for the length
/// cursor, once for the data buffer.
#[derive(Debug)]
pub struct BumpAllocator {
    /// Next unallocated offset from the start of the arena file.
    next: usize,
    /// End of the data region (exclusive).
    limit: usize,
}

impl BumpAllocator {
    /// Create an allocator over `[data_offset, data_offset + data_len)`.
    pub fn new(data_offset: usize, data_len: usize) -> Self {
        Self {
            next: data_offset,
            limit: data_offset + data_len,
        }
    }

    /// Carve the next `len` bytes, aligned to [`REGION_ALIGNMENT`].
    pub fn allocate(&mut self, len: usize) -> Result<Region> {
        let aligned = self
            .next
            .checked_add(REGION_ALIGNMENT - 1)
            .map(|n| n & !(REGION_ALIGNMENT - 1))
            .unwrap_or(usize::MAX);

        let end = aligned.saturating_add(len);
        if end > self.limit {
            return Err(ShmLogError::ArenaExhausted {
                requested: len,
                available: self.limit.saturating_sub(aligned.min(self.limit)),
            });
        }

        self.next = end;
        Ok(Region {
            offset: aligned,
            len,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocations_are_aligned_and_disjoint() {
        let mut bump = BumpAllocator::new(64, 1024);

        let cursor = bump.allocate(8).unwrap();
        assert_eq!(cursor.offset, 64);
        assert_eq!(cursor.len, 8);

        let buffer = bump.allocate(100).unwrap();
        assert_eq!(buffer.offset, 72);
        assert_eq!(buffer.offset % REGION_ALIGNMENT, 0);
        assert!(buffer.offset >= cursor.end());
    }

    #[test]
    fn unaligned_start_is_rounded_up() {
        let mut bump = BumpAllocator::new(65, 1024);
        let region = bump.allocate(8).unwrap();
        assert_eq!(region.offset, 72);
    }

    #[test]
    fn exhaustion_is_an_error() {
        let mut bump = BumpAllocator::new(0, 16);
        bump.allocate(8).unwrap();
        let err = bump.allocate(16).unwrap_err();
        assert_eq!(err.code(), "E004");
    }

    #[test]
    fn deterministic_across_instances() {
        // Two attachers replaying the same allocation sequence must agree.
        let mut a = BumpAllocator::new(64, 512);
        let mut b = BumpAllocator::new(64, 512);

        assert_eq!(a.allocate(8).unwrap(), b.allocate(8).unwrap());
        assert_eq!(a.allocate(256).unwrap(), b.allocate(256).unwrap());
    }
}
