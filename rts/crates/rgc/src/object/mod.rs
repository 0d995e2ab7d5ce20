//! Object Module - Closure Model
//!
//! Tagged references, info tables, closure layouts, and weak pointers as
//! seen by the collector.

pub mod closure;
pub mod info;
pub mod reference;
pub mod weak;

pub use closure::{Closure, Payload, WhatNext};
pub use info::{ClosureKind, ClosureType, IndirectionKind, InfoPtr, InfoTable};
pub use reference::{Reference, TAG_BITS, TAG_MASK, WORD_SIZE};
pub use weak::{SweepOutcome, WeakId, WeakList, WeakPtr};
