//! Stats Module - Liveness Query Statistics
//!
//! Counts how liveness queries were decided. Useful for:
//! - Spotting long indirection chains left by updates
//! - Checking that compacted regions are marked as expected
//! - Debugging premature-collection reports
//!
//! Counters are atomics with `Relaxed` ordering so that parallel sweep
//! threads can share one `OracleStats`.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Rule that decided a liveness query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Verdict {
    /// Not in collected memory
    Static,
    /// Region is to-space
    ToSpace,
    /// Large object whose region was not evacuated
    LargeDead,
    /// Mark bit set in a compacted region
    CompactedLive,
    /// Mark bit clear in a compacted region
    CompactedDead,
    /// Reached an evacuated marker
    Forwarded,
    /// Any other closure outside to-space
    Dead,
}

impl Verdict {
    pub fn is_alive(self) -> bool {
        matches!(
            self,
            Verdict::Static | Verdict::ToSpace | Verdict::CompactedLive | Verdict::Forwarded
        )
    }
}

/// OracleStats - counters shared by liveness queries
#[derive(Debug, Default)]
pub struct OracleStats {
    queries: AtomicU64,
    static_hits: AtomicU64,
    to_space_hits: AtomicU64,
    large_dead: AtomicU64,
    compacted_live: AtomicU64,
    compacted_dead: AtomicU64,
    forwarded: AtomicU64,
    dead: AtomicU64,
    indirections_followed: AtomicU64,
    thread_relocations_followed: AtomicU64,
    longest_chase: AtomicU64,
}

impl OracleStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finished query and the number of hops it took
    pub fn record(&self, verdict: Verdict, hops: u64) {
        self.queries.fetch_add(1, Ordering::Relaxed);
        self.longest_chase.fetch_max(hops, Ordering::Relaxed);

        let counter = match verdict {
            Verdict::Static => &self.static_hits,
            Verdict::ToSpace => &self.to_space_hits,
            Verdict::LargeDead => &self.large_dead,
            Verdict::CompactedLive => &self.compacted_live,
            Verdict::CompactedDead => &self.compacted_dead,
            Verdict::Forwarded => &self.forwarded,
            Verdict::Dead => &self.dead,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_indirection(&self) {
        self.indirections_followed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_thread_relocation(&self) {
        self.thread_relocations_followed
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn queries(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }

    /// Snapshot of all counters
    pub fn summary(&self) -> LivenessSummary {
        let alive = self.static_hits.load(Ordering::Relaxed)
            + self.to_space_hits.load(Ordering::Relaxed)
            + self.compacted_live.load(Ordering::Relaxed)
            + self.forwarded.load(Ordering::Relaxed);

        LivenessSummary {
            queries: self.queries.load(Ordering::Relaxed),
            alive,
            static_hits: self.static_hits.load(Ordering::Relaxed),
            to_space_hits: self.to_space_hits.load(Ordering::Relaxed),
            large_dead: self.large_dead.load(Ordering::Relaxed),
            compacted_live: self.compacted_live.load(Ordering::Relaxed),
            compacted_dead: self.compacted_dead.load(Ordering::Relaxed),
            forwarded: self.forwarded.load(Ordering::Relaxed),
            dead: self.dead.load(Ordering::Relaxed),
            indirections_followed: self.indirections_followed.load(Ordering::Relaxed),
            thread_relocations_followed: self
                .thread_relocations_followed
                .load(Ordering::Relaxed),
            longest_chase: self.longest_chase.load(Ordering::Relaxed),
        }
    }

    /// Reset statistics
    pub fn reset(&self) {
        for counter in [
            &self.queries,
            &self.static_hits,
            &self.to_space_hits,
            &self.large_dead,
            &self.compacted_live,
            &self.compacted_dead,
            &self.forwarded,
            &self.dead,
            &self.indirections_followed,
            &self.thread_relocations_followed,
            &self.longest_chase,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Summary statistics
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct LivenessSummary {
    pub queries: u64,
    pub alive: u64,
    pub static_hits: u64,
    pub to_space_hits: u64,
    pub large_dead: u64,
    pub compacted_live: u64,
    pub compacted_dead: u64,
    pub forwarded: u64,
    pub dead: u64,
    pub indirections_followed: u64,
    pub thread_relocations_followed: u64,
    /// Most hops taken by a single query
    pub longest_chase: u64,
}

impl LivenessSummary {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
