//! Marker Module - Mark-Bit Tables
//!
//! Regions collected by mark/compact record liveness in a bitmap instead of
//! by evacuation. The compaction pass writes the bits; the liveness oracle
//! only reads them.

pub mod bitmap;

pub use bitmap::MarkBitmap;
