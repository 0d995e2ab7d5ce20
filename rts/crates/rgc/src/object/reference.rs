//! Tagged Reference Implementation
//!
//! Closures are word aligned, so the low bits of every reference are free.
//! They carry a small tag describing the pointee (e.g. constructor number)
//! so that code can dispatch without reading the object.
//!
//! ```text
//! 64-bit Reference Layout:
//! ┌──────────────────────────────────────────────┬───────┐
//! │                 Address                       │  Tag  │
//! │                  63-3                         │  2-0  │
//! └──────────────────────────────────────────────┴───────┘
//! ```
//!
//! The tag is metadata about the reference, not the object. When the object
//! moves, the live reference keeps the tag it had.

use std::fmt;

/// Number of low bits reserved for the tag
pub const TAG_BITS: usize = 3;

/// Mask selecting the tag bits
pub const TAG_MASK: usize = (1 << TAG_BITS) - 1;

/// Machine word size; closures are aligned to it
pub const WORD_SIZE: usize = 1 << TAG_BITS;

/// Reference - a closure address with a tag packed into its low bits
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Reference {
    raw: usize,
}

impl Reference {
    /// Build a reference from an aligned address and a tag
    #[inline]
    pub fn new(address: usize, tag: usize) -> Self {
        debug_assert!(
            address & TAG_MASK == 0,
            "closure address {:#x} is not word aligned",
            address
        );
        debug_assert!(tag <= TAG_MASK, "tag {} does not fit in {} bits", tag, TAG_BITS);
        Self {
            raw: address | (tag & TAG_MASK),
        }
    }

    /// Untagged reference to `address`
    #[inline]
    pub fn untagged(address: usize) -> Self {
        Self::new(address, 0)
    }

    /// The null reference (no closure)
    #[inline]
    pub const fn null() -> Self {
        Self { raw: 0 }
    }

    #[inline]
    pub const fn from_raw(raw: usize) -> Self {
        Self { raw }
    }

    #[inline]
    pub const fn raw(&self) -> usize {
        self.raw
    }

    #[inline]
    pub const fn is_null(&self) -> bool {
        self.raw & !TAG_MASK == 0
    }

    /// Address of the closure with the tag stripped
    #[inline]
    pub const fn untag(&self) -> usize {
        self.raw & !TAG_MASK
    }

    /// Tag carried in the low bits
    #[inline]
    pub const fn tag(&self) -> usize {
        self.raw & TAG_MASK
    }

    /// Split into `(tag, address)`
    #[inline]
    pub const fn split(&self) -> (usize, usize) {
        (self.tag(), self.untag())
    }

    /// Same address, different tag
    #[inline]
    pub fn retag(&self, tag: usize) -> Self {
        Self::new(self.untag(), tag)
    }

    /// Same tag, different address
    ///
    /// Used when a closure has moved: the live reference keeps its tag.
    #[inline]
    pub fn with_address(&self, address: usize) -> Self {
        Self::new(address, self.tag())
    }
}

impl fmt::Debug for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Reference({:#x}/{})", self.untag(), self.tag())
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}/{}", self.untag(), self.tag())
    }
}

impl fmt::LowerHex for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.raw, f)
    }
}
