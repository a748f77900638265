//! Reuse pool for live decoder pipelines.
//!
//! Restarting a compressed stream costs a full decode from byte zero,
//! while fast-forwarding a live decoder costs only the bytes discarded.
//! This crate caches positioned pipelines keyed by their offset in the
//! decompressed stream, so random-access reads into already-visited
//! regions resume an existing decoder instead of rebuilding one.

pub mod pool;

pub use pool::{Handle, StreamPool};
