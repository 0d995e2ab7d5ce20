//! Test Utilities for the RGC Test Suite
//!
//! Heap fixtures with a from-space and a to-space, a `HeapView` wrapper
//! that counts how often the oracle touches the heap, and strict assertion
//! helpers.

#![allow(dead_code)]

use rgc::heap::{Heap, HeapView, RegionDescriptor, RegionFlags, RegionId};
use rgc::object::{Closure, ClosureKind, ClosureType, IndirectionKind, InfoPtr, Reference, WhatNext};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Blocks per fixture region (16KB)
pub const REGION_BLOCKS: usize = 4;

/// ============================================================================
/// HEAP FIXTURE
/// ============================================================================

/// Heap with one unflagged from-space region and one to-space region
pub struct HeapFixture {
    pub heap: Heap,
    pub from_space: RegionId,
    pub to_space: RegionId,
}

impl HeapFixture {
    pub fn new() -> Self {
        let mut heap = Heap::new();
        let from_space = heap
            .add_region(REGION_BLOCKS, RegionFlags::empty(), 0)
            .expect("from-space region should fit in the heap range");
        let to_space = heap
            .add_region(REGION_BLOCKS, RegionFlags::EVACUATED, 1)
            .expect("to-space region should fit in the heap range");

        Self {
            heap,
            from_space,
            to_space,
        }
    }

    /// Add a region being compacted in place
    pub fn compacted_region(&mut self) -> RegionId {
        self.heap
            .add_region(REGION_BLOCKS, RegionFlags::COMPACTED, 1)
            .expect("compacted region should fit in the heap range")
    }

    /// Two-field constructor in `region`, tagged `tag`
    pub fn con(&mut self, region: RegionId, tag: usize) -> Reference {
        let info = InfoPtr::new("Cons", ClosureType::Constr);
        self.heap
            .allocate(region, Closure::data(info, vec![Reference::null(); 2]))
            .expect("constructor allocation should succeed")
            .retag(tag)
    }

    /// Closure of an arbitrary non-forwarding type in `region`
    pub fn closure_of(&mut self, region: RegionId, closure_type: ClosureType) -> Reference {
        let info = InfoPtr::new(format!("{:?}", closure_type), closure_type);
        self.heap
            .allocate(region, Closure::data(info, vec![Reference::null()]))
            .expect("allocation should succeed")
    }

    /// Constructor in the static area
    pub fn static_con(&mut self, tag: usize) -> Reference {
        let info = InfoPtr::new("StaticCon", ClosureType::Constr);
        self.heap
            .allocate_static(Closure::data(info, vec![]))
            .expect("static allocation should succeed")
            .retag(tag)
    }

    /// Chain of `length` indirections in from-space ending at `target`
    ///
    /// Kinds cycle through every heap indirection variant.
    pub fn indirection_chain(&mut self, target: Reference, length: usize) -> Reference {
        const KINDS: [IndirectionKind; 5] = [
            IndirectionKind::Ind,
            IndirectionKind::IndPerm,
            IndirectionKind::IndOldGen,
            IndirectionKind::IndOldGenPerm,
            IndirectionKind::IndStatic,
        ];

        let mut head = target;
        for i in 0..length {
            head = self
                .heap
                .allocate(self.from_space, Closure::indirection(KINDS[i % KINDS.len()], head))
                .expect("indirection allocation should succeed");
        }
        head
    }

    /// Thread object in from-space
    pub fn thread(&mut self, what_next: WhatNext) -> Reference {
        self.heap
            .allocate(self.from_space, Closure::thread(what_next, Reference::null()))
            .expect("thread allocation should succeed")
    }

    /// Evacuate `r` to to-space, keeping its tag
    pub fn evacuate(&mut self, r: Reference) -> Reference {
        self.heap
            .evacuate(r, self.to_space)
            .expect("evacuation should succeed")
    }
}

impl Default for HeapFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Evacuator for CAF roots: copies from-space closures into `to`, follows
/// existing forwarding, and leaves everything else alone
pub fn copy_to(heap: &mut Heap, r: Reference, to: RegionId) -> Reference {
    match heap.closure(r.untag()).and_then(Closure::evacuee) {
        Some(moved) => moved.retag(r.tag()),
        None => heap.evacuate(r, to).unwrap_or(r),
    }
}

/// ============================================================================
/// COUNTING HEAP VIEW
/// ============================================================================

/// HeapView that forwards to a `Heap` and counts the oracle's questions
pub struct CountingHeap<'h> {
    inner: &'h Heap,
    region_lookups: AtomicUsize,
    closure_reads: AtomicUsize,
}

impl<'h> CountingHeap<'h> {
    pub fn new(inner: &'h Heap) -> Self {
        Self {
            inner,
            region_lookups: AtomicUsize::new(0),
            closure_reads: AtomicUsize::new(0),
        }
    }

    pub fn region_lookups(&self) -> usize {
        self.region_lookups.load(Ordering::Relaxed)
    }

    pub fn closure_reads(&self) -> usize {
        self.closure_reads.load(Ordering::Relaxed)
    }
}

impl HeapView for CountingHeap<'_> {
    fn is_heap_allocated(&self, address: usize) -> bool {
        self.inner.is_heap_allocated(address)
    }

    fn region_of(&self, address: usize) -> &RegionDescriptor {
        self.region_lookups.fetch_add(1, Ordering::Relaxed);
        self.inner.region_of(address)
    }

    fn is_marked(&self, address: usize, region: &RegionDescriptor) -> bool {
        self.inner.is_marked(address, region)
    }

    fn closure_kind(&self, address: usize) -> ClosureKind {
        self.closure_reads.fetch_add(1, Ordering::Relaxed);
        self.inner.closure_kind(address)
    }

    fn indirectee_of(&self, address: usize) -> Reference {
        self.closure_reads.fetch_add(1, Ordering::Relaxed);
        self.inner.indirectee_of(address)
    }

    fn evacuee_of(&self, address: usize) -> Reference {
        self.closure_reads.fetch_add(1, Ordering::Relaxed);
        self.inner.evacuee_of(address)
    }

    fn thread_relocation_link_of(&self, address: usize) -> Option<Reference> {
        self.closure_reads.fetch_add(1, Ordering::Relaxed);
        self.inner.thread_relocation_link_of(address)
    }
}

/// ============================================================================
/// STRICT ASSERTION HELPERS
/// ============================================================================

/// Assert that `answer` is `expected` bit for bit, tag included
#[track_caller]
pub fn assert_same_reference(answer: Option<Reference>, expected: Reference, context: &str) {
    match answer {
        Some(r) => assert_eq!(
            r.raw(),
            expected.raw(),
            "{}: got {}, expected {} - address or tag was rewritten",
            context,
            r,
            expected
        ),
        None => panic!("{}: {} reported dead", context, expected),
    }
}

/// Assert that `answer` is dead
#[track_caller]
pub fn assert_dead(answer: Option<Reference>, context: &str) {
    assert!(
        answer.is_none(),
        "{}: expected dead, got {:?} - garbage would be retained",
        context,
        answer
    );
}
