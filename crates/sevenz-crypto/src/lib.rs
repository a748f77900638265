//! 7z AES-256 key derivation.
//!
//! This crate provides:
//! - The format's SHA-256 based key derivation function, bit-exact
//!   including the "no derivation" sentinel and the UTF-16LE password
//!   encoding
//! - [`KeyCache`], bounded per-reader memoization of derived keys

pub mod error;
pub mod kdf;

pub use error::{CryptoError, Result};
pub use kdf::{derive_key, KeyCache, DEFAULT_CACHE_SIZE, KEY_SIZE, RAW_KEY_CYCLES};
