//! Error Module - RGC Error Types
//!
//! Defines the error types returned by the construction and registration
//! APIs of RGC.
//!
//! The liveness query and the CAF root protocol never return errors: they
//! are total over a well-formed heap. Inconsistent heap state found by those
//! paths is a fatal corruption and aborts through [`assert_context!`].
//!
//! # Error Categories
//!
//! ## Heap Construction Errors
//! - `OutOfMemory` - Region has no room for the closure
//! - `RegionAllocationFailed` - Address space for a new region is exhausted
//! - `InvalidPointer` - Address does not belong to the expected area
//!
//! ## Protocol Errors
//! - `InvalidState` - CAF or collection phase in the wrong state
//! - `InvalidArgument` - Invalid function argument
//!
//! ## Configuration Errors
//! - `Configuration` - Invalid configuration

use crate::config::ConfigError;
use thiserror::Error;

/// Main error type for RGC operations
///
/// # Examples
///
/// ```rust
/// use rgc::error::RgcError;
///
/// fn handle_error(err: RgcError) {
///     match err {
///         RgcError::OutOfMemory { requested, available } => {
///             eprintln!("region full: requested {}, available {}", requested, available);
///         }
///         _ => {
///             eprintln!("other error: {}", err);
///         }
///     }
/// }
/// ```
#[derive(Debug, Error)]
pub enum RgcError {
    /// Region exhaustion
    ///
    /// **When returned:** A closure does not fit in the remaining space of
    /// the region it was allocated into.
    ///
    /// **Recovery strategy:** Allocate into a fresh region.
    #[error("Out of memory: requested {requested} bytes, available {available} bytes")]
    OutOfMemory { requested: usize, available: usize },

    /// Region allocation failed
    ///
    /// **When returned:** The heap cannot carve another region out of its
    /// address range.
    #[error("Region allocation failed: {reason}")]
    RegionAllocationFailed { reason: String },

    /// Invalid pointer address
    ///
    /// **When returned:** An address is outside the area the operation
    /// works on (e.g. marking a bit for an address outside any region).
    #[error("Invalid pointer address: {address:#x}")]
    InvalidPointer { address: usize },

    /// Invalid state
    ///
    /// **When returned:** A state machine was driven out of order, such as
    /// registering a CAF that is already evaluated.
    #[error("Invalid state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },

    /// Invalid argument
    ///
    /// **Example scenarios:**
    /// - Zero-sized region
    /// - Marking an address in a region that is not compacted
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Internal error - indicates a bug in RGC
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RgcError {
    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RgcError::OutOfMemory { .. } | RgcError::RegionAllocationFailed { .. }
        )
    }

    /// Check if this error indicates a bug in the code
    pub fn is_bug(&self) -> bool {
        matches!(self, RgcError::InvalidState { .. } | RgcError::Internal(_))
    }
}

/// Result type alias for RGC operations
pub type Result<T> = std::result::Result<T, RgcError>;

/// Macro for assertion with context
///
/// Used for heap invariants whose violation means the heap is corrupt.
#[macro_export]
macro_rules! assert_context {
    ($cond:expr, $context:expr) => {
        if !$cond {
            panic!("Assertion failed at {}: {}", stringify!($cond), $context);
        }
    };
    ($cond:expr, $context:expr, $($arg:tt)*) => {
        if !$cond {
            panic!("Assertion failed at {}: {}", stringify!($cond), format!($context, $($arg)*));
        }
    };
}
