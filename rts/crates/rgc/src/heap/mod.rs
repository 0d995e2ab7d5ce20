//! Heap Module - Regions, Static Closures, and the Heap View
//!
//! The liveness oracle never touches memory directly. It asks the heap five
//! questions through [`HeapView`]:
//!
//! 1. Is this address collected at all? (`is_heap_allocated`)
//! 2. Which region descriptor covers it? (`region_of`)
//! 3. Is its mark bit set? (`is_marked`)
//! 4. What kind of closure lives there? (`closure_kind`)
//! 5. Where does it point? (`indirectee_of`, `evacuee_of`, `thread_relocation_link_of`)
//!
//! [`Heap`] is the in-process implementation: a region table carved from
//! `[HEAP_BASE, HEAP_LIMIT)`, and a static area below it for closures that
//! are never collected.
//!
//! ```text
//! 0x0010_0000          0x0030_0000      0x4000_0000                 0x8000_0000
//! ┌──────────────┬─────┬──────────┬ ... ┬──────────┬──────────┬ ... ┐
//! │ static data  │     │  CAFs    │     │ region 0 │ region 1 │     │
//! └──────────────┴─────┴──────────┴ ... ┴──────────┴──────────┴ ... ┘
//!   not collected                         collected
//! ```

pub mod region;

pub use region::{RegionDescriptor, RegionFlags, RegionId};

use crate::assert_context;
use crate::error::{Result, RgcError};
use crate::object::closure::{Closure, Payload, WhatNext};
use crate::object::info::ClosureKind;
use crate::object::reference::{Reference, WORD_SIZE};
use indexmap::IndexMap;

/// Region granularity in bytes
pub const BLOCK_SIZE: usize = 4096;

/// First address handed to regions
pub const HEAP_BASE: usize = 0x4000_0000;

/// End of the region address range
pub const HEAP_LIMIT: usize = 0x8000_0000;

/// Static data area (never collected)
pub const STATIC_BASE: usize = 0x0010_0000;
pub const STATIC_LIMIT: usize = 0x0020_0000;

/// Static area reserved for CAF cells
pub const CAF_AREA_BASE: usize = 0x0030_0000;
pub const CAF_AREA_LIMIT: usize = 0x0040_0000;

/// HeapView - what liveness needs to know about the heap
///
/// Implementations are read-only from the oracle's point of view. Queries
/// about an address that holds no closure, or about a field the closure
/// does not have, are heap corruption and must panic.
pub trait HeapView {
    /// True if `address` lies in collected memory
    fn is_heap_allocated(&self, address: usize) -> bool;

    /// Descriptor of the region containing `address`
    fn region_of(&self, address: usize) -> &RegionDescriptor;

    /// Mark bit of `address` in a compacted region
    fn is_marked(&self, address: usize, region: &RegionDescriptor) -> bool;

    fn closure_kind(&self, address: usize) -> ClosureKind;

    /// Target of an indirection-family closure
    fn indirectee_of(&self, address: usize) -> Reference;

    /// Copy destination recorded in an evacuated marker
    fn evacuee_of(&self, address: usize) -> Reference;

    /// Relocation target of a thread object, if it has been relocated
    fn thread_relocation_link_of(&self, address: usize) -> Option<Reference>;
}

impl<H: HeapView + ?Sized> HeapView for &H {
    fn is_heap_allocated(&self, address: usize) -> bool {
        (**self).is_heap_allocated(address)
    }

    fn region_of(&self, address: usize) -> &RegionDescriptor {
        (**self).region_of(address)
    }

    fn is_marked(&self, address: usize, region: &RegionDescriptor) -> bool {
        (**self).is_marked(address, region)
    }

    fn closure_kind(&self, address: usize) -> ClosureKind {
        (**self).closure_kind(address)
    }

    fn indirectee_of(&self, address: usize) -> Reference {
        (**self).indirectee_of(address)
    }

    fn evacuee_of(&self, address: usize) -> Reference {
        (**self).evacuee_of(address)
    }

    fn thread_relocation_link_of(&self, address: usize) -> Option<Reference> {
        (**self).thread_relocation_link_of(address)
    }
}

/// Heap - region table plus the closures stored in it
///
/// Mutation needs `&mut Heap`, which the collector only has inside the
/// stop-the-world window. After that the heap can be shared by reference
/// among any number of liveness readers.
#[derive(Debug)]
pub struct Heap {
    /// Regions in address order
    regions: Vec<RegionDescriptor>,

    /// Start of the next region
    next_region: usize,

    /// Collected closures by address
    objects: IndexMap<usize, Closure>,

    /// Static closures by address
    statics: IndexMap<usize, Closure>,

    /// Bump pointer of the static area
    static_top: usize,
}

impl Heap {
    pub fn new() -> Self {
        Self {
            regions: Vec::new(),
            next_region: HEAP_BASE,
            objects: IndexMap::new(),
            statics: IndexMap::new(),
            static_top: STATIC_BASE,
        }
    }

    /// Reserve a region of `blocks` blocks
    ///
    /// # Returns
    /// * `Ok(RegionId)` - New region, empty
    /// * `Err(RgcError::InvalidArgument)` - `blocks` is zero
    /// * `Err(RgcError::RegionAllocationFailed)` - Address range exhausted
    pub fn add_region(
        &mut self,
        blocks: usize,
        flags: RegionFlags,
        generation: u16,
    ) -> Result<RegionId> {
        if blocks == 0 {
            return Err(RgcError::InvalidArgument(
                "region must span at least one block".to_string(),
            ));
        }

        let size = blocks
            .checked_mul(BLOCK_SIZE)
            .ok_or_else(|| RgcError::RegionAllocationFailed {
                reason: format!("{} blocks overflow the address space", blocks),
            })?;
        let start = self.next_region;
        let end = start
            .checked_add(size)
            .filter(|end| *end <= HEAP_LIMIT)
            .ok_or_else(|| RgcError::RegionAllocationFailed {
                reason: format!(
                    "no room for {} bytes at {:#x} (limit {:#x})",
                    size, start, HEAP_LIMIT
                ),
            })?;

        let id = RegionId(self.regions.len());
        self.regions
            .push(RegionDescriptor::new(id, start, size, flags, generation));
        self.next_region = end;

        log::trace!("added {} at {:#x} ({} bytes, {:?})", id, start, size, flags);
        Ok(id)
    }

    /// Place `closure` in `region` and return an untagged reference to it
    pub fn allocate(&mut self, region: RegionId, closure: Closure) -> Result<Reference> {
        let size = closure.size_bytes();
        let descriptor = self
            .regions
            .get_mut(region.0)
            .ok_or_else(|| RgcError::InvalidArgument(format!("unknown {}", region)))?;

        let available = descriptor.free();
        let address = descriptor
            .bump(size)
            .ok_or(RgcError::OutOfMemory {
                requested: size,
                available,
            })?;

        self.objects.insert(address, closure);
        Ok(Reference::untagged(address))
    }

    /// Give `closure` a dedicated `LARGE` region
    pub fn allocate_large(
        &mut self,
        closure: Closure,
        generation: u16,
    ) -> Result<(RegionId, Reference)> {
        let blocks = closure.size_bytes().div_ceil(BLOCK_SIZE);
        let region = self.add_region(blocks, RegionFlags::LARGE, generation)?;
        let reference = self.allocate(region, closure)?;
        Ok((region, reference))
    }

    /// Place `closure` in the static area
    pub fn allocate_static(&mut self, closure: Closure) -> Result<Reference> {
        let size = closure.size_bytes();
        let new_top = self
            .static_top
            .checked_add(size)
            .filter(|top| *top <= STATIC_LIMIT)
            .ok_or(RgcError::OutOfMemory {
                requested: size,
                available: STATIC_LIMIT - self.static_top,
            })?;

        let address = self.static_top;
        self.static_top = new_top;
        self.statics.insert(address, closure);
        Ok(Reference::untagged(address))
    }

    pub fn region(&self, id: RegionId) -> Option<&RegionDescriptor> {
        self.regions.get(id.0)
    }

    pub fn regions(&self) -> impl Iterator<Item = &RegionDescriptor> {
        self.regions.iter()
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn static_count(&self) -> usize {
        self.statics.len()
    }

    pub fn set_flags(&mut self, id: RegionId, flags: RegionFlags) -> Result<()> {
        self.region_mut(id)?.set_flags(flags);
        Ok(())
    }

    pub fn clear_flags(&mut self, id: RegionId, flags: RegionFlags) -> Result<()> {
        self.region_mut(id)?.clear_flags(flags);
        Ok(())
    }

    /// Set the mark bit for `address`, as the compaction pass does
    ///
    /// The address must start a closure in a `COMPACTED` region.
    pub fn mark(&mut self, address: usize) -> Result<()> {
        let index = self
            .region_index(address)
            .ok_or(RgcError::InvalidPointer { address })?;
        let region = &self.regions[index];
        if !region.is_compacted() {
            return Err(RgcError::InvalidArgument(format!(
                "{} is not being compacted",
                region.id()
            )));
        }
        if !self.objects.contains_key(&address) {
            return Err(RgcError::InvalidPointer { address });
        }
        region.mark_bitmap().mark(address);
        Ok(())
    }

    /// Closure at `address`, collected or static
    pub fn closure(&self, address: usize) -> Option<&Closure> {
        self.objects
            .get(&address)
            .or_else(|| self.statics.get(&address))
    }

    pub fn closure_mut(&mut self, address: usize) -> Option<&mut Closure> {
        match self.objects.get_mut(&address) {
            Some(closure) => Some(closure),
            None => self.statics.get_mut(&address),
        }
    }

    /// Copy the closure behind `from` into `to_region` and leave a
    /// forwarding stub behind, as the copying pass does
    ///
    /// The returned reference keeps the tag of `from`.
    pub fn evacuate(&mut self, from: Reference, to_region: RegionId) -> Result<Reference> {
        let address = from.untag();
        let closure = self
            .objects
            .get(&address)
            .cloned()
            .ok_or(RgcError::InvalidPointer { address })?;

        let copy = self.allocate(to_region, closure)?;
        let to = from.with_address(copy.untag());
        self.install_forwarding(from, to)?;
        Ok(to)
    }

    /// Overwrite the closure behind `from` with an evacuated marker to `to`
    pub fn install_forwarding(&mut self, from: Reference, to: Reference) -> Result<()> {
        let address = from.untag();
        let slot = self
            .objects
            .get_mut(&address)
            .ok_or(RgcError::InvalidPointer { address })?;
        *slot = Closure::evacuated(to);
        Ok(())
    }

    /// Overwrite the closure at `at` with an indirection to `target`, as an
    /// update of an evaluated thunk does
    pub fn update_with_indirection(
        &mut self,
        at: Reference,
        kind: crate::object::info::IndirectionKind,
        target: Reference,
    ) -> Result<()> {
        let address = at.untag();
        let slot = self
            .closure_mut(address)
            .ok_or(RgcError::InvalidPointer { address })?;
        *slot = Closure::indirection(kind, target);
        Ok(())
    }

    /// Move a thread object into `to_region`, leaving the old object
    /// marked relocated with a link to the new one
    pub fn relocate_thread(&mut self, from: Reference, to_region: RegionId) -> Result<Reference> {
        let address = from.untag();
        let closure = self
            .objects
            .get(&address)
            .cloned()
            .ok_or(RgcError::InvalidPointer { address })?;

        let (what_next, link) = match closure.payload {
            Payload::Thread { what_next, link } => (what_next, link),
            _ => {
                return Err(RgcError::InvalidArgument(format!(
                    "closure at {:#x} is not a thread",
                    address
                )))
            }
        };
        if what_next == WhatNext::ThreadRelocated {
            return Err(RgcError::InvalidState {
                expected: "live thread".to_string(),
                actual: format!("thread at {:#x} already relocated", address),
            });
        }

        let moved = self.allocate(to_region, Closure::thread(what_next, link))?;
        let moved = from.with_address(moved.untag());
        if let Some(old) = self.objects.get_mut(&address) {
            *old = Closure::thread(WhatNext::ThreadRelocated, moved);
        }
        Ok(moved)
    }

    fn region_mut(&mut self, id: RegionId) -> Result<&mut RegionDescriptor> {
        self.regions
            .get_mut(id.0)
            .ok_or_else(|| RgcError::InvalidArgument(format!("unknown {}", id)))
    }

    /// Index of the region containing `address`
    fn region_index(&self, address: usize) -> Option<usize> {
        if !(HEAP_BASE..self.next_region).contains(&address) {
            return None;
        }
        let index = self.regions.partition_point(|r| r.start() <= address);
        let candidate = index.checked_sub(1)?;
        self.regions[candidate]
            .contains(address)
            .then_some(candidate)
    }

    fn closure_at(&self, address: usize) -> &Closure {
        match self.closure(address) {
            Some(closure) => closure,
            None => panic!(
                "address {:#x} does not look like a closure (heap corrupt)",
                address
            ),
        }
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

impl HeapView for Heap {
    fn is_heap_allocated(&self, address: usize) -> bool {
        self.region_index(address).is_some()
    }

    fn region_of(&self, address: usize) -> &RegionDescriptor {
        let index = self.region_index(address);
        assert_context!(
            index.is_some(),
            "no region descriptor for {:#x}",
            address
        );
        &self.regions[index.unwrap_or_default()]
    }

    fn is_marked(&self, address: usize, region: &RegionDescriptor) -> bool {
        debug_assert!(address % WORD_SIZE == 0);
        region.mark_bitmap().is_marked(address)
    }

    fn closure_kind(&self, address: usize) -> ClosureKind {
        self.closure_at(address).kind()
    }

    fn indirectee_of(&self, address: usize) -> Reference {
        let closure = self.closure_at(address);
        match closure.indirectee() {
            Some(target) => target,
            None => panic!(
                "{:?} at {:#x} has no indirectee",
                closure.closure_type(),
                address
            ),
        }
    }

    fn evacuee_of(&self, address: usize) -> Reference {
        let closure = self.closure_at(address);
        match closure.evacuee() {
            Some(target) => target,
            None => panic!(
                "{:?} at {:#x} is not an evacuated marker",
                closure.closure_type(),
                address
            ),
        }
    }

    fn thread_relocation_link_of(&self, address: usize) -> Option<Reference> {
        self.closure_at(address).relocation_link()
    }
}
