//! Random access over multi-volume archives and the byte-stream plumbing
//! shared by the extraction pipeline.
//!
//! This crate provides:
//! - [`ReadAt`], the positional-read trait supplied per archive volume
//! - [`VolumeSet`], which merges an ordered list of volumes into one flat
//!   address space
//! - [`Volume`], a memory-mapped file volume with a seeking fallback
//! - The sequential stream traits ([`ReadClose`], [`SizedStream`]) and
//!   composition helpers (concatenation, tee, length cap, byte-at-a-time
//!   adaptation) used when assembling decoder pipelines

pub mod chain;
pub mod read_at;
pub mod stream;
pub mod volume;

pub use chain::{ChainMember, ChainStream};
pub use read_at::{ReadAt, TeeReadAt};
pub use stream::{ByteStream, LimitedStream, NopClose, ReadClose, SizedStream, TeeStream};
pub use volume::{Volume, VolumeSet, VolumeSource};
