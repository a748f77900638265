//! Bounded pool of positioned decoder pipelines.

use dashmap::DashMap;
use lru::LruCache;
use parking_lot::Mutex;
use sevenz_io::SizedStream;
use std::io;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::thread;
use tracing::{debug, warn};

/// A live decoder pipeline, owned by the pool while resident.
pub type Handle = Box<dyn SizedStream + Send>;

/// Bounded pool of live decoder pipelines keyed by logical stream offset.
///
/// Decoder pipelines are forward-only: a resident handle positioned at or
/// before the wanted offset can be fast-forwarded by reading and
/// discarding, while one positioned past it is useless without restarting
/// from byte zero. [`get`](Self::get) therefore prefers an exact hit and
/// falls back to the nearest preceding position.
///
/// Entries are checked out, not shared: a handle returned by `get` has
/// left the pool and belongs to exactly one caller until it is
/// [`add`](Self::add)ed back or dropped.
pub struct StreamPool {
    streams: Mutex<LruCache<u64, Handle>>,
    /// Per-offset construction gates for [`get_or_build`](Self::get_or_build).
    building: DashMap<u64, Arc<Mutex<()>>>,
    disabled: bool,
}

impl StreamPool {
    /// Pool sized to the host's available parallelism, one handle per
    /// extraction worker.
    pub fn new() -> Self {
        Self::with_capacity(thread::available_parallelism().unwrap_or(NonZeroUsize::MIN))
    }

    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        Self {
            streams: Mutex::new(LruCache::new(capacity)),
            building: DashMap::new(),
            disabled: false,
        }
    }

    /// A pool that never retains anything.
    ///
    /// For single-pass extraction: no offset is ever revisited, so keeping
    /// handles alive would only hold their resources open. `add` closes
    /// the handle immediately and `get` always misses.
    pub fn disabled() -> Self {
        Self {
            streams: Mutex::new(LruCache::new(NonZeroUsize::MIN)),
            building: DashMap::new(),
            disabled: true,
        }
    }

    /// Check out the handle at `offset`, or the nearest one before it.
    ///
    /// An exact hit wins; otherwise the resident handle with the greatest
    /// position strictly below `offset` is returned, since it discards the
    /// least output when fast-forwarded. The returned handle is no longer
    /// resident: a second `get` for the same position misses until
    /// something is added back.
    pub fn get(&self, offset: u64) -> Option<Handle> {
        if self.disabled {
            return None;
        }

        let mut streams = self.streams.lock();
        if let Some(handle) = streams.pop(&offset) {
            debug!("Stream pool hit at offset {}", offset);
            return Some(handle);
        }

        let nearest = streams
            .iter()
            .map(|(position, _)| *position)
            .filter(|position| *position < offset)
            .max()?;
        debug!(
            "Stream pool near hit: reusing offset {} for {}",
            nearest, offset
        );
        streams.pop(&nearest)
    }

    /// Return a handle positioned at `offset` to the pool.
    ///
    /// Reports `true` when the insert displaced a resident handle — the
    /// least-recently-used one at capacity, or a previous occupant of the
    /// same offset — which is then closed. A disabled pool closes the
    /// handle immediately and reports `false`.
    pub fn add(&self, offset: u64, handle: Handle) -> bool {
        if self.disabled {
            close_discarded(offset, handle);
            return false;
        }

        let displaced = {
            let mut streams = self.streams.lock();
            streams.push(offset, handle)
        };

        // The victim is closed only after the pool lock is released; a
        // close that re-enters the pool cannot deadlock.
        match displaced {
            Some((old_offset, old_handle)) => {
                close_discarded(old_offset, old_handle);
                true
            }
            None => false,
        }
    }

    /// Check out a handle for `offset`, running `build` when no resident
    /// handle qualifies.
    ///
    /// Concurrent misses on the same offset serialize on a per-offset
    /// gate: the first caller builds while the rest wait and then re-check
    /// the pool, so one position does not fan out into a pile of duplicate
    /// pipelines. `build` must not call back into this pool.
    ///
    /// The handle `build` returns starts wherever the factory starts it
    /// (normally byte zero); the caller fast-forwards to `offset` in
    /// either case.
    pub fn get_or_build<F>(&self, offset: u64, build: F) -> io::Result<Handle>
    where
        F: FnOnce() -> io::Result<Handle>,
    {
        if let Some(handle) = self.get(offset) {
            return Ok(handle);
        }

        let gate = Arc::clone(
            self.building
                .entry(offset)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        );

        let handle = {
            let _guard = gate.lock();
            // A racing builder may have finished and added while we waited.
            match self.get(offset) {
                Some(handle) => Ok(handle),
                None => build(),
            }
        };

        self.building.remove(&offset);
        handle
    }

    /// Number of resident handles.
    pub fn len(&self) -> usize {
        self.streams.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.lock().is_empty()
    }

    /// Close every resident handle and empty the pool.
    ///
    /// Close failures are logged and swallowed, like eviction.
    pub fn clear(&self) {
        let drained: Vec<(u64, Handle)> = {
            let mut streams = self.streams.lock();
            let mut drained = Vec::with_capacity(streams.len());
            while let Some(entry) = streams.pop_lru() {
                drained.push(entry);
            }
            drained
        };

        for (offset, handle) in drained {
            close_discarded(offset, handle);
        }
    }
}

impl Default for StreamPool {
    fn default() -> Self {
        Self::new()
    }
}

/// Release a handle the pool is discarding. A failed release only leaks
/// the resource; data already delivered through it is unaffected, so the
/// failure is logged rather than surfaced.
fn close_discarded(offset: u64, mut handle: Handle) {
    if let Err(e) = handle.close() {
        warn!("Failed to close discarded stream at offset {}: {}", offset, e);
    }
}
