//! Liveness Oracle - Post-Evacuation Reachability Queries
//!
//! Answers "is this closure still alive, and where is it now?" for
//! references taken before evacuation finished. Used by the weak-pointer
//! and finalizer sweeps and by heap consistency checks.
//!
//! # Decision Order
//!
//! ```text
//!            ┌─────────────┐  no   ┌──────────────────────┐
//!  ref ─────▶│ heap alloc? │──────▶│ static: alive as-is  │
//!            └──────┬──────┘       └──────────────────────┘
//!                   │ yes
//!            ┌──────▼──────┐  EVACUATED ──▶ alive as-is
//!            │region flags │  LARGE     ──▶ dead
//!            └──────┬──────┘  COMPACTED ──▶ alive iff mark bit set
//!                   │ none of these
//!            ┌──────▼──────┐  Indirection     ──▶ follow indirectee, restart
//!            │closure kind │  EvacuatedMarker ──▶ alive at evacuee (same tag)
//!            └─────────────┘  Thread          ──▶ follow link if relocated, else dead
//!                             Other           ──▶ dead
//! ```
//!
//! The chase is a loop over a rebound local, never recursion, so long
//! indirection or relocation chains cost no stack.
//!
//! # Preconditions
//!
//! Only call after evacuation (and compaction marking) of the collected
//! generations has finished. Mid-evacuation answers are meaningless. Once
//! that holds, any number of threads may query the same heap concurrently.

use crate::assert_context;
use crate::heap::HeapView;
use crate::object::info::ClosureKind;
use crate::object::reference::Reference;
use crate::stats::{OracleStats, Verdict};

/// Default bound on hops per query in debug builds
pub const DEFAULT_MAX_CHASE_STEPS: usize = 1_000_000;

/// Check whether `reference` survived the collection
///
/// Returns the reference's current form (original tag, current address)
/// if the closure is reachable, `None` otherwise.
///
/// # Examples
///
/// ```rust
/// use rgc::heap::{Heap, RegionFlags};
/// use rgc::object::{Closure, ClosureType, InfoPtr, Reference};
///
/// let mut heap = Heap::new();
/// let to_space = heap.add_region(1, RegionFlags::EVACUATED, 0)?;
/// let info = InfoPtr::new("Nothing", ClosureType::Constr);
/// let x = heap.allocate(to_space, Closure::data(info, vec![]))?.retag(1);
///
/// assert_eq!(rgc::is_alive(&heap, x), Some(x));
/// # Ok::<(), rgc::RgcError>(())
/// ```
pub fn is_alive<H: HeapView + ?Sized>(heap: &H, reference: Reference) -> Option<Reference> {
    LivenessOracle::new(heap).is_alive(reference)
}

/// LivenessOracle - read-only liveness queries over a heap view
///
/// Holds no mutable state of its own; statistics, when attached, are
/// atomic counters.
pub struct LivenessOracle<'h, H: HeapView + ?Sized> {
    heap: &'h H,
    stats: Option<&'h OracleStats>,
    max_chase_steps: usize,
}

impl<'h, H: HeapView + ?Sized> LivenessOracle<'h, H> {
    pub fn new(heap: &'h H) -> Self {
        Self {
            heap,
            stats: None,
            max_chase_steps: DEFAULT_MAX_CHASE_STEPS,
        }
    }

    /// Count verdicts in `stats`
    pub fn with_stats(mut self, stats: &'h OracleStats) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Debug-build bound on hops per query; 0 disables it
    pub fn with_max_chase_steps(mut self, steps: usize) -> Self {
        self.max_chase_steps = steps;
        self
    }

    pub fn heap(&self) -> &'h H {
        self.heap
    }

    /// Current form of `reference` if alive, `None` if garbage
    pub fn is_alive(&self, reference: Reference) -> Option<Reference> {
        self.decide(reference).1
    }

    /// Which rule decides `reference`
    pub fn classify(&self, reference: Reference) -> Verdict {
        self.decide(reference).0
    }

    fn decide(&self, reference: Reference) -> (Verdict, Option<Reference>) {
        let mut p = reference;
        let mut hops: u64 = 0;

        let (verdict, answer) = loop {
            debug_assert!(!p.is_null(), "null reference reached liveness query");
            let (tag, q) = p.split();

            // Statics are handled by the static-object pass.
            if !self.heap.is_heap_allocated(q) {
                break (Verdict::Static, Some(p));
            }

            let region = self.heap.region_of(q);

            if region.is_evacuated() {
                break (Verdict::ToSpace, Some(p));
            }

            // Large objects are evacuated by flagging their region.
            if region.is_large() {
                break (Verdict::LargeDead, None);
            }

            if region.is_compacted() {
                if self.heap.is_marked(q, region) {
                    break (Verdict::CompactedLive, Some(p));
                }
                break (Verdict::CompactedDead, None);
            }

            match self.heap.closure_kind(q) {
                ClosureKind::Indirection(_) => {
                    p = self.heap.indirectee_of(q);
                    if let Some(stats) = self.stats {
                        stats.record_indirection();
                    }
                }
                ClosureKind::EvacuatedMarker => {
                    let evacuee = self.heap.evacuee_of(q);
                    break (Verdict::Forwarded, Some(evacuee.retag(tag)));
                }
                ClosureKind::Thread => match self.heap.thread_relocation_link_of(q) {
                    Some(link) => {
                        p = link;
                        if let Some(stats) = self.stats {
                            stats.record_thread_relocation();
                        }
                    }
                    None => break (Verdict::Dead, None),
                },
                ClosureKind::Other(_) => break (Verdict::Dead, None),
            }

            hops += 1;
            if cfg!(debug_assertions) && self.max_chase_steps != 0 {
                assert_context!(
                    hops <= self.max_chase_steps as u64,
                    "liveness chase from {} exceeded {} hops; indirection chain is cyclic",
                    reference,
                    self.max_chase_steps
                );
            }
        };

        if let Some(stats) = self.stats {
            stats.record(verdict, hops);
        }
        log::trace!(
            "is_alive({}) -> {:?} after {} hops ({:?})",
            reference,
            answer,
            hops,
            verdict
        );
        (verdict, answer)
    }
}
