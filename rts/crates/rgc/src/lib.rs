//! # RGC - Post-Evacuation Liveness and CAF Roots
//!
//! RGC is the part of a copying, generational collector for a lazy
//! functional runtime that answers one question once evacuation is done:
//! *did this closure survive, and if so, where is it now?* It also keeps
//! the registry of CAFs (top-level thunks) that act as extra roots.
//!
//! ## Overview
//!
//! - **Tagged References**: The low 3 bits of a reference carry a pointer
//!   tag that must survive every answer
//! - **Liveness Oracle**: Iterative walk through indirections, evacuated
//!   markers and relocated threads, ending in a decision per region kind
//! - **CAF Registry**: Two intrusive lists of evaluated CAFs; revertible
//!   ones return to their unevaluated form after a major collection
//! - **Weak Sweep**: Post-evacuation pass dropping weak pointers whose
//!   keys died, in parallel for long lists
//!
//! ## Quick Start
//!
//! ```rust
//! use rgc::heap::RegionFlags;
//! use rgc::object::{Closure, ClosureType, InfoPtr};
//! use rgc::{GcContext, GcGeneration, RgcConfig};
//!
//! fn main() -> Result<(), rgc::RgcError> {
//!     let mut gc = GcContext::new(RgcConfig::default())?;
//!
//!     let from_space = gc.heap_mut().add_region(1, RegionFlags::empty(), 0)?;
//!     let to_space = gc.heap_mut().add_region(1, RegionFlags::EVACUATED, 1)?;
//!     let info = InfoPtr::new("Just", ClosureType::Constr);
//!     let x = gc.heap_mut().allocate(from_space, Closure::data(info, vec![]))?.retag(2);
//!
//!     gc.begin_collection(GcGeneration::Young)?;
//!     let moved = gc.heap_mut().evacuate(x, to_space)?;
//!     gc.finish_evacuation()?;
//!
//!     // The old address answers with the new one, tag intact.
//!     assert_eq!(gc.is_alive(x), Some(moved));
//!     assert_eq!(moved.tag(), 2);
//!
//!     gc.end_collection()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Liveness Decision
//!
//! ```text
//! is_alive(p):
//!   loop
//!     q = untag(p)
//!     q not in collected memory         -> Some(p)
//!     region(q) EVACUATED               -> Some(p)
//!     region(q) LARGE                   -> None
//!     region(q) COMPACTED               -> marked(q) ? Some(p) : None
//!     closure(q) is an indirection      -> p = indirectee; continue
//!     closure(q) is an evacuated marker -> Some(retag(evacuee, tag(p)))
//!     closure(q) is a relocated thread  -> p = link; continue
//!     otherwise                         -> None
//! ```
//!
//! ## Thread Safety
//!
//! Liveness queries only read the heap. Once evacuation is over, any
//! number of threads may query the same `&Heap`. The CAF registry is only
//! touched inside the stop-the-world window and takes no locks.
//!
//! ## Modules
//!
//! - [`caf`]: CAF registration, root marking and reversion
//! - [`config`]: Configuration parameters and validation
//! - [`error`]: Error types for all RGC operations
//! - [`gc`]: Collection cycle bookkeeping
//! - [`heap`]: Regions, static closures and the heap view
//! - [`liveness`]: The liveness oracle
//! - [`logging`]: Collector event logging
//! - [`marker`]: Mark bitmaps for compacted regions
//! - [`object`]: References, descriptors, closures and weak pointers
//! - [`stats`]: Liveness query statistics

// Core modules
pub mod caf;
pub mod config;
pub mod error;
pub mod gc;
pub mod liveness;

// Heap and object model
pub mod heap;
pub mod marker;
pub mod object;

// Monitoring
pub mod logging;
pub mod stats;

// Re-export main types for convenience
pub use caf::{CafId, CafRegistry, CafRetention};
pub use config::{ConfigError, RgcConfig};
pub use error::{Result, RgcError};
pub use gc::{CycleSummary, GcContext, GcGeneration, GcPhase};
pub use heap::{Heap, HeapView};
pub use liveness::{is_alive, LivenessOracle};
pub use object::Reference;

/// RGC version string from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Create a collector context with default configuration
///
/// # Examples
///
/// ```rust
/// let gc = rgc::init()?;
/// assert_eq!(gc.cycle(), 0);
/// # Ok::<(), rgc::RgcError>(())
/// ```
pub fn init() -> Result<GcContext> {
    GcContext::new(RgcConfig::default())
}

/// Create a collector context with custom configuration
///
/// # Examples
///
/// ```rust
/// let config = rgc::RgcConfig {
///     keep_cafs: true,
///     ..Default::default()
/// };
///
/// let gc = rgc::init_with_config(config)?;
/// assert!(gc.cafs().keep_cafs());
/// # Ok::<(), rgc::RgcError>(())
/// ```
pub fn init_with_config(config: RgcConfig) -> Result<GcContext> {
    GcContext::new(config)
}

/// Create a collector context configured from `RGC_*` environment variables
pub fn init_from_env() -> Result<GcContext> {
    GcContext::new(RgcConfig::from_env())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_default() {
        let result = init();
        assert!(result.is_ok());
    }

    #[test]
    fn test_config_validation() {
        let config = RgcConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_version_not_empty() {
        assert!(!VERSION.is_empty());
    }
}
