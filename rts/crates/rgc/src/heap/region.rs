//! Region Descriptor - Per-Region Collector Metadata
//!
//! A region is a run of contiguous blocks. Its descriptor records how the
//! current collection treats every closure physically inside it:
//!
//! | Flag | Meaning |
//! |------|---------|
//! | `EVACUATED` | To-space: objects here were already copied this cycle |
//! | `LARGE` | One object per region; live iff the region is `EVACUATED` |
//! | `COMPACTED` | Marked in place; liveness lives in the mark bitmap |
//!
//! The flags are independent. The region a closure lives in, not the
//! closure's contents, decides which liveness rule applies.

use crate::marker::bitmap::MarkBitmap;
use crate::object::reference::WORD_SIZE;
use bitflags::bitflags;
use std::fmt;

/// Region identifier (index into the heap's region table)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionId(pub usize);

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "region#{}", self.0)
    }
}

bitflags! {
    /// RegionFlags - how the collector treats a region this cycle
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RegionFlags: u16 {
        const EVACUATED = 1 << 0;
        const LARGE = 1 << 1;
        const COMPACTED = 1 << 2;
    }
}

/// RegionDescriptor - metadata for one region
///
/// Allocation is a plain bump of `top`; the heap hands out regions and
/// closures only while it is exclusively borrowed.
#[derive(Debug, Clone)]
pub struct RegionDescriptor {
    id: RegionId,

    /// Start address of region
    start: usize,

    /// Region size in bytes (whole blocks)
    size: usize,

    flags: RegionFlags,

    /// Generation number (0 = youngest)
    generation: u16,

    /// Bump pointer for allocation
    top: usize,

    /// Mark bits consulted while `COMPACTED`
    mark_bitmap: MarkBitmap,
}

impl RegionDescriptor {
    pub(crate) fn new(
        id: RegionId,
        start: usize,
        size: usize,
        flags: RegionFlags,
        generation: u16,
    ) -> Self {
        Self {
            id,
            start,
            size,
            flags,
            generation,
            top: start,
            mark_bitmap: MarkBitmap::new(size, WORD_SIZE, start),
        }
    }

    pub fn id(&self) -> RegionId {
        self.id
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.start + self.size
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn flags(&self) -> RegionFlags {
        self.flags
    }

    pub fn generation(&self) -> u16 {
        self.generation
    }

    pub fn contains(&self, address: usize) -> bool {
        address >= self.start && address < self.end()
    }

    pub fn is_evacuated(&self) -> bool {
        self.flags.contains(RegionFlags::EVACUATED)
    }

    pub fn is_large(&self) -> bool {
        self.flags.contains(RegionFlags::LARGE)
    }

    pub fn is_compacted(&self) -> bool {
        self.flags.contains(RegionFlags::COMPACTED)
    }

    pub fn used(&self) -> usize {
        self.top - self.start
    }

    pub fn free(&self) -> usize {
        self.end() - self.top
    }

    pub fn mark_bitmap(&self) -> &MarkBitmap {
        &self.mark_bitmap
    }

    pub(crate) fn set_flags(&mut self, flags: RegionFlags) {
        self.flags.insert(flags);
    }

    pub(crate) fn clear_flags(&mut self, flags: RegionFlags) {
        self.flags.remove(flags);
    }

    /// Bump-allocate `size` bytes, returning the start address
    pub(crate) fn bump(&mut self, size: usize) -> Option<usize> {
        let new_top = self.top.checked_add(size)?;
        if new_top > self.end() {
            return None;
        }
        let address = self.top;
        self.top = new_top;
        Some(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_combine() {
        let mut flags = RegionFlags::LARGE;
        assert!(flags.contains(RegionFlags::LARGE));
        assert!(!flags.contains(RegionFlags::EVACUATED));

        flags |= RegionFlags::EVACUATED;
        assert!(flags.contains(RegionFlags::LARGE | RegionFlags::EVACUATED));

        flags.remove(RegionFlags::LARGE);
        assert_eq!(flags, RegionFlags::EVACUATED);
        assert!(RegionFlags::empty().is_empty());
    }

    #[test]
    fn test_descriptor_reads_combined_flags() {
        let region = RegionDescriptor::new(
            RegionId(0),
            0x4000_0000,
            64,
            RegionFlags::LARGE | RegionFlags::COMPACTED,
            0,
        );
        assert!(region.is_large());
        assert!(region.is_compacted());
        assert!(!region.is_evacuated());
    }

    #[test]
    fn test_bump_until_full() {
        let mut region =
            RegionDescriptor::new(RegionId(0), 0x4000_0000, 64, RegionFlags::empty(), 0);

        assert_eq!(region.bump(32), Some(0x4000_0000));
        assert_eq!(region.bump(32), Some(0x4000_0020));
        assert_eq!(region.bump(8), None);
        assert_eq!(region.free(), 0);
        assert_eq!(region.used(), 64);
    }

    #[test]
    fn test_contains() {
        let region =
            RegionDescriptor::new(RegionId(3), 0x4000_1000, 0x1000, RegionFlags::empty(), 1);
        assert!(region.contains(0x4000_1000));
        assert!(region.contains(0x4000_1FF8));
        assert!(!region.contains(0x4000_2000));
        assert!(!region.contains(0x4000_0FF8));
    }
}
