//! Weak Pointers - Post-Evacuation Sweep
//!
//! A weak pointer holds a key without keeping it alive. Once evacuation
//! is over, the collector sweeps the weak list with the liveness oracle:
//!
//! - key alive: the weak pointer stays, its key, value and finalizer
//!   re-resolved to their current addresses
//! - key dead: the weak pointer is removed and its finalizer becomes due
//!
//! The copying collector evacuates a surviving weak pointer's value and
//! finalizer before the sweep; either still being dead then means the heap
//! is corrupt.
//!
//! The sweep only reads the heap, so large lists are swept in parallel
//! with rayon.

use crate::assert_context;
use crate::heap::HeapView;
use crate::liveness::LivenessOracle;
use crate::object::reference::Reference;
use rayon::prelude::*;

/// Weak pointer identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WeakId(pub u64);

/// WeakPtr - a key/value pair that does not keep its key alive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeakPtr {
    pub id: WeakId,
    pub key: Reference,
    pub value: Reference,
    /// Closure to run once the key is dead
    pub finalizer: Option<Reference>,
}

/// Result of one sweep
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepOutcome {
    /// Weak pointers whose keys survived, keys re-resolved
    pub live: Vec<WeakPtr>,
    /// Weak pointers whose keys died
    pub dead: Vec<WeakPtr>,
}

impl SweepOutcome {
    /// Finalizers that became due
    pub fn pending_finalizers(&self) -> impl Iterator<Item = Reference> + '_ {
        self.dead.iter().filter_map(|w| w.finalizer)
    }
}

/// WeakList - every weak pointer registered with the collector
#[derive(Debug, Default)]
pub struct WeakList {
    entries: Vec<WeakPtr>,
    next_id: u64,
}

impl WeakList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a weak pointer and return its id
    pub fn push(&mut self, key: Reference, value: Reference, finalizer: Option<Reference>) -> WeakId {
        let id = WeakId(self.next_id);
        self.next_id += 1;
        self.entries.push(WeakPtr {
            id,
            key,
            value,
            finalizer,
        });
        id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WeakPtr> {
        self.entries.iter()
    }

    pub fn get(&self, id: WeakId) -> Option<&WeakPtr> {
        self.entries.iter().find(|w| w.id == id)
    }

    /// Sweep on the calling thread
    ///
    /// Survivors stay on the list with updated references; the outcome
    /// holds a copy of both partitions.
    pub fn tidy<H: HeapView + ?Sized>(&mut self, oracle: &LivenessOracle<'_, H>) -> SweepOutcome {
        let resolved: Vec<Option<WeakPtr>> =
            self.entries.iter().map(|w| resolve(oracle, w)).collect();
        self.apply(resolved)
    }

    /// Sweep in parallel once the list reaches `threshold` entries
    ///
    /// Produces the same outcome as [`WeakList::tidy`].
    pub fn par_tidy<H: HeapView + Sync + ?Sized>(
        &mut self,
        oracle: &LivenessOracle<'_, H>,
        threshold: usize,
    ) -> SweepOutcome {
        if self.entries.len() < threshold {
            return self.tidy(oracle);
        }

        let resolved: Vec<Option<WeakPtr>> = self
            .entries
            .par_iter()
            .map(|w| resolve(oracle, w))
            .collect();
        self.apply(resolved)
    }

    fn apply(&mut self, resolved: Vec<Option<WeakPtr>>) -> SweepOutcome {
        let mut outcome = SweepOutcome::default();

        for (weak, survivor) in std::mem::take(&mut self.entries).into_iter().zip(resolved) {
            match survivor {
                Some(survivor) => outcome.live.push(survivor),
                None => outcome.dead.push(weak),
            }
        }

        self.entries = outcome.live.clone();
        log::debug!(
            "weak sweep: {} live, {} dead",
            outcome.live.len(),
            outcome.dead.len()
        );
        outcome
    }
}

/// Survivor with every reference at its current address, or None if the
/// key died
fn resolve<H: HeapView + ?Sized>(oracle: &LivenessOracle<'_, H>, weak: &WeakPtr) -> Option<WeakPtr> {
    let key = oracle.is_alive(weak.key)?;
    let value = oracle.is_alive(weak.value);
    assert_context!(
        value.is_some(),
        "weak pointer {:?} survived but its value {} is dead",
        weak.id,
        weak.value
    );
    let finalizer = weak.finalizer.map(|f| {
        let current = oracle.is_alive(f);
        assert_context!(
            current.is_some(),
            "weak pointer {:?} survived but its finalizer {} is dead",
            weak.id,
            f
        );
        current.unwrap_or(f)
    });

    Some(WeakPtr {
        id: weak.id,
        key,
        value: value.unwrap_or(weak.value),
        finalizer,
    })
}
