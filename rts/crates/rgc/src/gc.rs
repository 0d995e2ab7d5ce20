//! GC Context - Collection Cycle Bookkeeping
//!
//! Ties the heap, the CAF registry, the weak pointer list and the liveness
//! oracle to one collection cycle:
//!
//! ```text
//!   Mutator ──begin_collection──▶ Evacuating ──finish_evacuation──▶ PostEvacuation
//!      ▲                           mark_cafs                          is_alive
//!      │                                                              sweep_weak_pointers
//!      └──────────────────────────── end_collection ◀────────────────────┘
//!                                    (revert_cafs on major collections)
//! ```
//!
//! The copying itself belongs to the caller: during `Evacuating` it moves
//! closures with [`Heap::evacuate`] and friends, and hands CAF roots to
//! [`GcContext::mark_cafs`]. Liveness answers are only meaningful once
//! evacuation has finished.

use crate::caf::{CafId, CafMarkStats, CafRegistry, CafRetention};
use crate::config::RgcConfig;
use crate::error::{Result, RgcError};
use crate::heap::Heap;
use crate::liveness::LivenessOracle;
use crate::logging::{GcEvent, GcLogger, GcLoggerConfig, LogLevel};
use crate::object::info::InfoPtr;
use crate::object::reference::Reference;
use crate::object::weak::{SweepOutcome, WeakId, WeakList};
use crate::stats::{LivenessSummary, OracleStats};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Where the collector is in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GcPhase {
    /// No collection in progress
    Mutator,
    /// Live closures are being copied to to-space
    Evacuating,
    /// Copying done; liveness queries and the weak sweep run here
    PostEvacuation,
}

/// Generation being collected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GcGeneration {
    /// Nursery only (minor collection)
    Young,
    /// Old generation (major collection)
    Old,
    /// Whole heap (major collection)
    Full,
}

impl GcGeneration {
    /// Major collections revert revertible CAFs when they end
    pub fn is_major(self) -> bool {
        !matches!(self, GcGeneration::Young)
    }
}

impl fmt::Display for GcGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GcGeneration::Young => write!(f, "Young"),
            GcGeneration::Old => write!(f, "Old"),
            GcGeneration::Full => write!(f, "Full"),
        }
    }
}

/// What one collection cycle did
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleSummary {
    pub cycle: u64,
    pub generation: GcGeneration,
    pub cafs_retained: usize,
    pub cafs_revertible: usize,
    pub cafs_reverted: usize,
    pub weak_live: usize,
    pub weak_dead: usize,
    pub liveness: LivenessSummary,
    pub duration_ms: f64,
}

/// Per-cycle counters gathered between begin and end
#[derive(Debug, Default)]
struct CycleProgress {
    generation: Option<GcGeneration>,
    started: Option<Instant>,
    cafs: CafMarkStats,
    weak_live: usize,
    weak_dead: usize,
}

/// GcContext - the collector's view of one heap
///
/// Owns the heap and everything that hangs off it. Phase changes are
/// checked: calling an operation in the wrong phase is an
/// `RgcError::InvalidState`.
pub struct GcContext {
    config: RgcConfig,
    heap: Heap,
    cafs: CafRegistry,
    weaks: WeakList,
    stats: Arc<OracleStats>,
    logger: Arc<GcLogger>,
    sweep_pool: Option<rayon::ThreadPool>,
    phase: GcPhase,
    cycle: u64,
    progress: CycleProgress,
}

impl GcContext {
    /// Create a context with an empty heap
    ///
    /// # Returns
    /// * `Err(RgcError::Configuration)` - `config` failed validation
    /// * `Err(RgcError::Internal)` - the sweep thread pool could not start
    pub fn new(config: RgcConfig) -> Result<Self> {
        config.validate()?;

        let sweep_pool = match config.sweep_threads {
            Some(threads) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|i| format!("rgc-sweep-{}", i))
                    .build()
                    .map_err(|e| RgcError::Internal(format!("sweep pool: {}", e)))?,
            ),
            None => None,
        };

        let logger = GcLogger::new(GcLoggerConfig {
            level: if config.verbose {
                LogLevel::Trace
            } else {
                LogLevel::Info
            },
            console: config.verbose,
            json: config.log_json,
            timestamps: true,
        });

        log::debug!(
            "rgc context created (keep_cafs={}, sweep_threads={:?})",
            config.keep_cafs,
            config.sweep_threads
        );

        Ok(Self {
            cafs: CafRegistry::with_keep_cafs(config.keep_cafs),
            config,
            heap: Heap::new(),
            weaks: WeakList::new(),
            stats: Arc::new(OracleStats::new()),
            logger: Arc::new(logger),
            sweep_pool,
            phase: GcPhase::Mutator,
            cycle: 0,
            progress: CycleProgress::default(),
        })
    }

    pub fn config(&self) -> &RgcConfig {
        &self.config
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    pub fn cafs(&self) -> &CafRegistry {
        &self.cafs
    }

    pub fn weaks(&self) -> &WeakList {
        &self.weaks
    }

    pub fn stats(&self) -> Arc<OracleStats> {
        Arc::clone(&self.stats)
    }

    pub fn logger(&self) -> Arc<GcLogger> {
        Arc::clone(&self.logger)
    }

    pub fn phase(&self) -> GcPhase {
        self.phase
    }

    /// Number of collections started so far
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Oracle over the current heap, counting into this context's stats
    pub fn oracle(&self) -> LivenessOracle<'_, Heap> {
        let oracle =
            LivenessOracle::new(&self.heap).with_max_chase_steps(self.config.max_chase_steps);
        if self.config.stats_enabled {
            oracle.with_stats(&self.stats)
        } else {
            oracle
        }
    }

    /// Current form of `reference` if it survived, `None` if garbage
    pub fn is_alive(&self, reference: Reference) -> Option<Reference> {
        self.oracle().is_alive(reference)
    }

    /// Allocate an unevaluated CAF cell
    pub fn define_caf(&mut self, info: InfoPtr) -> Result<CafId> {
        self.cafs.define_caf(info)
    }

    /// Record the first evaluation of a CAF (the evaluator's hook)
    pub fn new_caf(&mut self, id: CafId, value: Reference, retention: CafRetention) -> Result<()> {
        self.expect_phase(GcPhase::Mutator)?;
        self.cafs.new_caf(id, value, retention)?;

        if let Some(caf) = self.cafs.caf(id) {
            self.logger.log(GcEvent::CafRegistered {
                address: caf.address(),
                revertible: retention == CafRetention::Revertible && !self.config.keep_cafs,
            });
        }
        Ok(())
    }

    /// Register a weak pointer
    pub fn new_weak(
        &mut self,
        key: Reference,
        value: Reference,
        finalizer: Option<Reference>,
    ) -> WeakId {
        self.weaks.push(key, value, finalizer)
    }

    /// Start a collection of `generation`
    pub fn begin_collection(&mut self, generation: GcGeneration) -> Result<u64> {
        self.expect_phase(GcPhase::Mutator)?;

        self.cycle += 1;
        self.phase = GcPhase::Evacuating;
        self.stats.reset();
        self.progress = CycleProgress {
            generation: Some(generation),
            started: Some(Instant::now()),
            ..CycleProgress::default()
        };

        self.logger.log(GcEvent::CycleStart {
            generation: generation.to_string(),
            cycle: self.cycle,
        });
        Ok(self.cycle)
    }

    /// Hand every listed CAF value to the evacuator as a root
    ///
    /// `evac` gets the heap and the current value and returns the value's
    /// new reference. Each CAF is visited exactly once.
    pub fn mark_cafs<F>(&mut self, evac: F) -> Result<CafMarkStats>
    where
        F: FnMut(&mut Heap, Reference) -> Reference,
    {
        self.expect_phase(GcPhase::Evacuating)?;

        let marked = self.cafs.mark_cafs(evac, &mut self.heap);
        self.progress.cafs = marked;

        self.logger.log(GcEvent::CafsMarked {
            retained: marked.retained,
            revertible: marked.revertible,
            cycle: self.cycle,
        });
        Ok(marked)
    }

    /// Copying is done; liveness queries become meaningful
    pub fn finish_evacuation(&mut self) -> Result<()> {
        self.expect_phase(GcPhase::Evacuating)?;
        self.phase = GcPhase::PostEvacuation;
        Ok(())
    }

    /// Drop weak pointers whose keys died and re-resolve the rest
    ///
    /// Runs on the sweep pool when the list is at least
    /// `parallel_sweep_threshold` long.
    pub fn sweep_weak_pointers(&mut self) -> Result<SweepOutcome> {
        self.expect_phase(GcPhase::PostEvacuation)?;

        let threshold = self.config.parallel_sweep_threshold;
        let stats = self.config.stats_enabled.then_some(&*self.stats);
        let mut oracle =
            LivenessOracle::new(&self.heap).with_max_chase_steps(self.config.max_chase_steps);
        if let Some(stats) = stats {
            oracle = oracle.with_stats(stats);
        }

        let weaks = &mut self.weaks;
        let outcome = match &self.sweep_pool {
            Some(pool) => pool.install(|| weaks.par_tidy(&oracle, threshold)),
            None => weaks.par_tidy(&oracle, threshold),
        };

        self.progress.weak_live = outcome.live.len();
        self.progress.weak_dead = outcome.dead.len();
        self.logger.log(GcEvent::WeakSweep {
            live: outcome.live.len(),
            dead: outcome.dead.len(),
            finalizers: outcome.pending_finalizers().count(),
            cycle: self.cycle,
        });
        Ok(outcome)
    }

    /// Finish the cycle and return to the mutator
    ///
    /// A major collection reverts every revertible CAF.
    pub fn end_collection(&mut self) -> Result<CycleSummary> {
        self.expect_phase(GcPhase::PostEvacuation)?;

        let progress = std::mem::take(&mut self.progress);
        let generation = progress.generation.ok_or_else(|| {
            RgcError::Internal("collection ended without a generation".to_string())
        })?;

        let cafs_reverted = if generation.is_major() {
            let count = self.cafs.revert_cafs();
            self.logger.log(GcEvent::CafsReverted {
                count,
                cycle: self.cycle,
            });
            count
        } else {
            0
        };

        let liveness = self.stats.summary();
        self.logger.log(GcEvent::LivenessSummary {
            cycle: self.cycle,
            summary: liveness.clone(),
        });

        let duration_ms = progress
            .started
            .map(|t| t.elapsed().as_secs_f64() * 1000.0)
            .unwrap_or_default();
        self.logger.log(GcEvent::CycleEnd {
            cycle: self.cycle,
            duration_ms,
            cafs_reverted,
        });

        self.phase = GcPhase::Mutator;
        Ok(CycleSummary {
            cycle: self.cycle,
            generation,
            cafs_retained: progress.cafs.retained,
            cafs_revertible: progress.cafs.revertible,
            cafs_reverted,
            weak_live: progress.weak_live,
            weak_dead: progress.weak_dead,
            liveness,
            duration_ms,
        })
    }

    fn expect_phase(&self, expected: GcPhase) -> Result<()> {
        if self.phase != expected {
            return Err(RgcError::InvalidState {
                expected: format!("{:?}", expected),
                actual: format!("{:?}", self.phase),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for GcContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GcContext")
            .field("phase", &self.phase)
            .field("cycle", &self.cycle)
            .field("regions", &self.heap.region_count())
            .field("cafs", &self.cafs.len())
            .field("weaks", &self.weaks.len())
            .finish()
    }
}
