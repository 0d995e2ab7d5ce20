//! Collection Cycle Integration Tests
//!
//! These tests drive `GcContext` through whole cycles and verify that:
//! - Phase order is enforced
//! - The weak sweep agrees with the liveness oracle, serial or parallel
//! - Concurrent liveness readers all see the same answers
//! - Statistics and events describe what happened

mod common;

use common::{copy_to, HeapFixture};
use rgc::gc::{GcContext, GcGeneration, GcPhase};
use rgc::logging::GcEvent;
use rgc::object::{Reference, WeakList};
use rgc::{LivenessOracle, RgcConfig, RgcError};
use rayon::prelude::*;
use std::sync::Arc;
use std::thread;

/// Context whose heap has a from-space and a to-space
fn context(config: RgcConfig) -> (GcContext, HeapFixture) {
    let mut gc = GcContext::new(config).expect("valid configuration");
    let mut fx = HeapFixture::new();
    std::mem::swap(gc.heap_mut(), &mut fx.heap);
    (gc, fx)
}

/// ============================================================================
/// PHASES
/// ============================================================================

#[test]
fn test_operations_out_of_phase_fail() {
    let (mut gc, _) = context(RgcConfig::default());

    assert!(matches!(
        gc.mark_cafs(|_, r| r),
        Err(RgcError::InvalidState { .. })
    ));
    assert!(gc.sweep_weak_pointers().is_err());

    gc.begin_collection(GcGeneration::Young).unwrap();
    assert!(gc.sweep_weak_pointers().is_err());
    assert!(gc.end_collection().is_err());

    gc.finish_evacuation().unwrap();
    assert!(gc.mark_cafs(|_, r| r).is_err());
    assert!(gc.finish_evacuation().is_err());

    gc.end_collection().unwrap();
    assert_eq!(gc.phase(), GcPhase::Mutator);
}

#[test]
fn test_cycle_counter_advances() {
    let (mut gc, _) = context(RgcConfig::default());
    for expected in 1..=3 {
        assert_eq!(gc.begin_collection(GcGeneration::Young).unwrap(), expected);
        gc.finish_evacuation().unwrap();
        let summary = gc.end_collection().unwrap();
        assert_eq!(summary.cycle, expected);
    }
    assert_eq!(gc.cycle(), 3);
}

/// ============================================================================
/// WEAK SWEEP
/// ============================================================================

/// **Invariant verified:** survivors keep their weak pointers with updated
/// keys; dead keys release their finalizers
#[test]
fn test_weak_sweep_follows_oracle() {
    let (mut gc, mut fx) = context(RgcConfig::default());
    let from_space = fx.from_space;
    let to_space = fx.to_space;

    std::mem::swap(gc.heap_mut(), &mut fx.heap);
    let survivor = fx.con(from_space, 1);
    let garbage = fx.con(from_space, 2);
    let stat = fx.static_con(3);
    let finalizer = fx.static_con(0);
    std::mem::swap(gc.heap_mut(), &mut fx.heap);

    gc.new_weak(survivor, Reference::null(), None);
    gc.new_weak(garbage, Reference::null(), Some(finalizer));
    gc.new_weak(stat, Reference::null(), None);

    gc.begin_collection(GcGeneration::Full).unwrap();
    let moved = gc.heap_mut().evacuate(survivor, to_space).unwrap();
    gc.finish_evacuation().unwrap();

    let outcome = gc.sweep_weak_pointers().unwrap();
    let keys: Vec<Reference> = outcome.live.iter().map(|w| w.key).collect();
    assert_eq!(keys, vec![moved, stat]);
    assert_eq!(outcome.dead.len(), 1);
    assert_eq!(outcome.pending_finalizers().collect::<Vec<_>>(), vec![finalizer]);
    assert_eq!(gc.weaks().len(), 2);

    let summary = gc.end_collection().unwrap();
    assert_eq!(summary.weak_live, 2);
    assert_eq!(summary.weak_dead, 1);
}

/// A surviving weak pointer's value and finalizer point at their copies
#[test]
fn test_weak_survivor_value_follows_evacuation() {
    let (mut gc, mut fx) = context(RgcConfig::default());
    let from_space = fx.from_space;
    let to_space = fx.to_space;

    std::mem::swap(gc.heap_mut(), &mut fx.heap);
    let key = fx.con(from_space, 0);
    let value = fx.con(from_space, 2);
    let finalizer = fx.con(from_space, 0);
    std::mem::swap(gc.heap_mut(), &mut fx.heap);

    let id = gc.new_weak(key, value, Some(finalizer));

    gc.begin_collection(GcGeneration::Full).unwrap();
    let new_key = gc.heap_mut().evacuate(key, to_space).unwrap();
    let new_value = gc.heap_mut().evacuate(value, to_space).unwrap();
    let new_finalizer = gc.heap_mut().evacuate(finalizer, to_space).unwrap();
    gc.finish_evacuation().unwrap();

    let outcome = gc.sweep_weak_pointers().unwrap();
    assert_eq!(outcome.live.len(), 1);
    let survivor = &outcome.live[0];
    assert_eq!(survivor.key, new_key);
    assert_eq!(survivor.value, new_value);
    assert_ne!(survivor.value, value);
    assert_eq!(survivor.finalizer, Some(new_finalizer));

    let kept = gc.weaks().get(id).unwrap();
    assert_eq!(kept.value, new_value);
    gc.end_collection().unwrap();
}

/// Lists above the threshold are swept on the pool with the same result
#[test]
fn test_parallel_sweep_above_threshold() {
    let config = RgcConfig {
        parallel_sweep_threshold: 64,
        sweep_threads: Some(4),
        ..RgcConfig::default()
    };
    let (mut gc, mut fx) = context(config);
    let from_space = fx.from_space;

    std::mem::swap(gc.heap_mut(), &mut fx.heap);
    let keys: Vec<Reference> = (0..256).map(|i| fx.con(from_space, i % 8)).collect();
    std::mem::swap(gc.heap_mut(), &mut fx.heap);
    for key in &keys {
        gc.new_weak(*key, Reference::null(), None);
    }

    gc.begin_collection(GcGeneration::Full).unwrap();
    let mut expected = Vec::new();
    for (i, key) in keys.iter().enumerate() {
        if i % 4 == 0 {
            expected.push(gc.heap_mut().evacuate(*key, fx.to_space).unwrap());
        }
    }
    gc.finish_evacuation().unwrap();

    let outcome = gc.sweep_weak_pointers().unwrap();
    let live: Vec<Reference> = outcome.live.iter().map(|w| w.key).collect();
    assert_eq!(live, expected);
    assert_eq!(outcome.dead.len(), 256 - expected.len());
}

/// A bare weak list can be swept against any heap
#[test]
fn test_weak_list_swept_without_context() {
    let mut fx = HeapFixture::new();
    let from_space = fx.from_space;
    let a = fx.con(from_space, 1);
    let b = fx.con(from_space, 2);
    fx.evacuate(a);

    let mut weaks = WeakList::new();
    weaks.push(a, Reference::null(), None);
    weaks.push(b, Reference::null(), None);

    let outcome = weaks.par_tidy(&LivenessOracle::new(&fx.heap), 1);
    assert_eq!(outcome.live.len(), 1);
    assert_eq!(outcome.dead.len(), 1);
    assert_eq!(outcome.dead[0].key, b);
}

/// ============================================================================
/// CONCURRENT READERS
/// ============================================================================

/// **Invariant verified:** any number of threads may query one heap after
/// evacuation and all see identical answers
#[test]
fn test_concurrent_readers_agree() {
    let mut fx = HeapFixture::new();
    let from_space = fx.from_space;

    let mut queries = Vec::new();
    for i in 0..64 {
        let x = fx.con(from_space, i % 8);
        if i % 2 == 0 {
            fx.evacuate(x);
        }
        queries.push(fx.indirection_chain(x, i % 5));
    }

    let heap = Arc::new(fx.heap);
    let expected: Vec<Option<Reference>> =
        queries.iter().map(|q| rgc::is_alive(&*heap, *q)).collect();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let heap = Arc::clone(&heap);
            let queries = queries.clone();
            thread::spawn(move || {
                queries
                    .iter()
                    .map(|q| rgc::is_alive(&*heap, *q))
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }

    let parallel: Vec<Option<Reference>> = queries
        .par_iter()
        .map(|q| rgc::is_alive(&*heap, *q))
        .collect();
    assert_eq!(parallel, expected);
}

/// Shared stats count every query from every thread
#[test]
fn test_shared_stats_across_threads() {
    let (mut gc, mut fx) = context(RgcConfig::default());
    let to_space = fx.to_space;

    std::mem::swap(gc.heap_mut(), &mut fx.heap);
    let x = fx.con(to_space, 1);
    std::mem::swap(gc.heap_mut(), &mut fx.heap);

    gc.begin_collection(GcGeneration::Young).unwrap();
    gc.finish_evacuation().unwrap();

    thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..100 {
                    assert_eq!(gc.is_alive(x), Some(x));
                }
            });
        }
    });

    let summary = gc.end_collection().unwrap();
    assert_eq!(summary.liveness.queries, 400);
    assert_eq!(summary.liveness.to_space_hits, 400);
}

/// ============================================================================
/// EVENTS
/// ============================================================================

#[test]
fn test_cycle_events_in_order() {
    let (mut gc, fx) = context(RgcConfig::default());
    let to_space = fx.to_space;

    gc.begin_collection(GcGeneration::Full).unwrap();
    gc.mark_cafs(|heap, r| copy_to(heap, r, to_space)).unwrap();
    gc.finish_evacuation().unwrap();
    gc.sweep_weak_pointers().unwrap();
    gc.end_collection().unwrap();

    let events: Vec<GcEvent> = gc
        .logger()
        .get_events()
        .into_iter()
        .map(|(_, event)| event)
        .collect();

    let names: Vec<&str> = events
        .iter()
        .map(|e| match e {
            GcEvent::CycleStart { .. } => "start",
            GcEvent::CafsReverted { .. } => "reverted",
            GcEvent::CycleEnd { .. } => "end",
            _ => "other",
        })
        .filter(|n| *n != "other")
        .collect();
    assert_eq!(names, vec!["start", "reverted", "end"]);
}

#[test]
fn test_cycle_summary_serializes() {
    let (mut gc, _) = context(RgcConfig::default());
    gc.begin_collection(GcGeneration::Old).unwrap();
    gc.finish_evacuation().unwrap();
    let summary = gc.end_collection().unwrap();

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["cycle"], 1);
    assert_eq!(json["generation"], "Old");
}
