//! Mark Bitmap - Liveness Bits for Compacted Regions
//!
//! Regions collected by mark/compact do not move objects during marking,
//! so liveness is recorded here instead of by evacuation. One bit per
//! `granularity` bytes; with word granularity every closure start has its
//! own bit.
//!
//! ```text
//! Region: 16KB at 0x4000_0000, granularity 8
//! Bit count: 16384 / 8 = 2048 bits = 32 words
//!
//! Closure at 0x4000_0108:
//! - Offset: 0x108
//! - Bit index: 0x108 / 8 = 33
//! - Word index: 33 / 64 = 0, bit 33
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// MarkBitmap - mark bits for one region
///
/// Written by the compaction pass inside the stop-the-world window and
/// only read afterwards, so `Relaxed` ordering is enough.
pub struct MarkBitmap {
    /// 1 bit per `granularity` bytes
    bits: Vec<AtomicU64>,

    /// Size of the covered region in bytes
    region_size: usize,

    /// Bytes per bit
    granularity: usize,

    /// Start address of the covered region
    base_address: usize,
}

impl Clone for MarkBitmap {
    fn clone(&self) -> Self {
        let bits: Vec<AtomicU64> = self
            .bits
            .iter()
            .map(|atom| AtomicU64::new(atom.load(Ordering::Relaxed)))
            .collect();

        Self {
            bits,
            region_size: self.region_size,
            granularity: self.granularity,
            base_address: self.base_address,
        }
    }
}

impl std::fmt::Debug for MarkBitmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarkBitmap")
            .field("base_address", &format_args!("{:#x}", self.base_address))
            .field("region_size", &self.region_size)
            .field("marked", &self.count_marked())
            .finish()
    }
}

impl MarkBitmap {
    /// Create an empty bitmap covering `[base_address, base_address + region_size)`
    pub fn new(region_size: usize, granularity: usize, base_address: usize) -> Self {
        debug_assert!(granularity > 0, "granularity must be > 0");
        let bit_count = region_size.div_ceil(granularity);
        let word_count = bit_count.div_ceil(64);

        let bits = (0..word_count).map(|_| AtomicU64::new(0)).collect();

        Self {
            bits,
            region_size,
            granularity,
            base_address,
        }
    }

    /// Set the bit for `address`; addresses outside the region are ignored
    pub fn mark(&self, address: usize) {
        if let Some((word_index, bit_index)) = self.calculate_indices(address) {
            self.bits[word_index].fetch_or(1 << bit_index, Ordering::Relaxed);
        }
    }

    /// Clear the bit for `address`
    pub fn unmark(&self, address: usize) {
        if let Some((word_index, bit_index)) = self.calculate_indices(address) {
            self.bits[word_index].fetch_and(!(1 << bit_index), Ordering::Relaxed);
        }
    }

    /// Check whether `address` is marked; false outside the region
    pub fn is_marked(&self, address: usize) -> bool {
        match self.calculate_indices(address) {
            Some((word_index, bit_index)) => {
                (self.bits[word_index].load(Ordering::Relaxed) & (1 << bit_index)) != 0
            }
            None => false,
        }
    }

    /// Clear all bits
    pub fn clear(&self) {
        for word in &self.bits {
            word.store(0, Ordering::Relaxed);
        }
    }

    /// Number of set bits
    pub fn count_marked(&self) -> usize {
        self.bits
            .iter()
            .map(|word| word.load(Ordering::Relaxed).count_ones() as usize)
            .sum()
    }

    pub fn region_size(&self) -> usize {
        self.region_size
    }

    pub fn granularity(&self) -> usize {
        self.granularity
    }

    /// Word and bit index for `address`, or None outside the region
    fn calculate_indices(&self, address: usize) -> Option<(usize, usize)> {
        let offset = address.checked_sub(self.base_address)?;
        if offset >= self.region_size {
            return None;
        }
        let bit_index = offset / self.granularity;
        Some((bit_index / 64, bit_index % 64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_and_check() {
        let bitmap = MarkBitmap::new(16 * 1024, 8, 0x4000_0000);

        bitmap.mark(0x4000_0000);
        bitmap.mark(0x4000_0108);

        assert!(bitmap.is_marked(0x4000_0000));
        assert!(bitmap.is_marked(0x4000_0108));
        // Neighbouring word is a different closure
        assert!(!bitmap.is_marked(0x4000_0110));
        assert!(!bitmap.is_marked(0x4000_0100));
    }

    #[test]
    fn test_out_of_range_is_unmarked() {
        let bitmap = MarkBitmap::new(4096, 8, 0x4000_0000);

        bitmap.mark(0x3FFF_FFF8);
        bitmap.mark(0x4000_1000);

        assert!(!bitmap.is_marked(0x3FFF_FFF8));
        assert!(!bitmap.is_marked(0x4000_1000));
        assert_eq!(bitmap.count_marked(), 0);
    }

    #[test]
    fn test_unmark_and_clear() {
        let bitmap = MarkBitmap::new(4096, 8, 0x4000_0000);

        bitmap.mark(0x4000_0010);
        bitmap.mark(0x4000_0020);
        bitmap.unmark(0x4000_0010);
        assert!(!bitmap.is_marked(0x4000_0010));
        assert_eq!(bitmap.count_marked(), 1);

        bitmap.clear();
        assert_eq!(bitmap.count_marked(), 0);
    }

    #[test]
    fn test_clone_is_independent() {
        let bitmap = MarkBitmap::new(4096, 8, 0x4000_0000);
        bitmap.mark(0x4000_0008);

        let copy = bitmap.clone();
        bitmap.clear();

        assert!(copy.is_marked(0x4000_0008));
        assert!(!bitmap.is_marked(0x4000_0008));
    }
}
