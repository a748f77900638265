//! The 7z AES-256 key derivation function and its memoization cache.

use lru::LruCache;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use tracing::{debug, trace};

use crate::error::{CryptoError, Result};

/// Size of a derived key in bytes.
pub const KEY_SIZE: usize = 32;

/// Cycles value meaning "no derivation": the key is the raw salt/password
/// material itself.
pub const RAW_KEY_CYCLES: u8 = 0x3f;

/// Number of (password, cycles, salt) tuples a [`KeyCache`] holds by default.
pub const DEFAULT_CACHE_SIZE: usize = 10;

/// Derive the 32-byte AES key for `password` at the given iteration cost.
///
/// The password is encoded as UTF-16 little-endian code units without a
/// byte-order mark and appended to the salt. A `cycles` of
/// [`RAW_KEY_CYCLES`] short-circuits derivation: the key is that raw
/// material, truncated or right-padded with zeros to 32 bytes. Any other
/// value feeds `2^cycles` repetitions of the material, each followed by a
/// little-endian 64-bit round counter, through a single streaming SHA-256
/// whose final digest is the key.
///
/// # Errors
///
/// [`CryptoError::InvalidCycles`] if `cycles` exceeds 63. The value is
/// never clamped.
pub fn derive_key(password: &str, cycles: u8, salt: &[u8]) -> Result<[u8; KEY_SIZE]> {
    if cycles > RAW_KEY_CYCLES {
        return Err(CryptoError::InvalidCycles(cycles));
    }

    let mut material = salt.to_vec();
    material.extend(password.encode_utf16().flat_map(u16::to_le_bytes));

    let mut key = [0u8; KEY_SIZE];
    if cycles == RAW_KEY_CYCLES {
        let n = material.len().min(KEY_SIZE);
        key[..n].copy_from_slice(&material[..n]);
        return Ok(key);
    }

    debug!(
        "Deriving key: 2^{} rounds over {} bytes of material",
        cycles,
        material.len()
    );

    // The logical input is material repeated 2^cycles times; it must be
    // streamed, never materialized.
    let mut hasher = Sha256::new();
    for counter in 0..(1u64 << cycles) {
        hasher.update(&material);
        hasher.update(counter.to_le_bytes());
    }
    key.copy_from_slice(&hasher.finalize());

    Ok(key)
}

/// Cache key. Tuples compare by full value equality: password text, exact
/// cycles, exact salt bytes.
#[derive(Clone, PartialEq, Eq, Hash)]
struct KdfInput {
    password: String,
    cycles: u8,
    salt: Vec<u8>,
}

/// Bounded memoization of derived keys.
///
/// An archive typically reuses one password/salt/cost tuple across many
/// folders, and each miss costs up to `2^cycles` hash rounds. Every reader
/// constructs its own cache and threads it through to its decoder
/// pipelines; there is no process-wide instance.
pub struct KeyCache {
    keys: Mutex<LruCache<KdfInput, [u8; KEY_SIZE]>>,
}

impl KeyCache {
    /// Cache with the default capacity of [`DEFAULT_CACHE_SIZE`] entries.
    pub fn new() -> Self {
        Self::with_capacity(NonZeroUsize::new(DEFAULT_CACHE_SIZE).unwrap_or(NonZeroUsize::MIN))
    }

    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        Self {
            keys: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Derive the key for this tuple, or recall it if already derived.
    ///
    /// A hit returns bytes identical to a fresh computation. A miss
    /// computes outside the cache lock, so an expensive derivation never
    /// blocks hits on other tuples; two workers racing on the same tuple
    /// may both derive, which wastes work but stays coherent.
    pub fn derive(&self, password: &str, cycles: u8, salt: &[u8]) -> Result<[u8; KEY_SIZE]> {
        let input = KdfInput {
            password: password.to_owned(),
            cycles,
            salt: salt.to_vec(),
        };

        if let Some(key) = self.keys.lock().get(&input) {
            trace!("Key cache hit (cycles={}, salt={})", cycles, hex::encode(salt));
            return Ok(*key);
        }

        trace!("Key cache miss (cycles={}, salt={})", cycles, hex::encode(salt));
        let key = derive_key(password, cycles, salt)?;
        self.keys.lock().put(input, key);

        Ok(key)
    }

    /// Number of memoized keys.
    pub fn len(&self) -> usize {
        self.keys.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.lock().is_empty()
    }
}

impl Default for KeyCache {
    fn default() -> Self {
        Self::new()
    }
}
