//! Positional read access to archive volumes.

use parking_lot::Mutex;
use std::io::{self, Write};
use std::sync::Arc;

/// A randomly addressable byte source with a known total size.
///
/// `read_at` takes `&self`: implementations keep no shared read cursor, so
/// positional reads may be issued concurrently from multiple extraction
/// workers as long as the backing store tolerates it.
pub trait ReadAt {
    /// Read up to `buf.len()` bytes starting at `offset`.
    ///
    /// Returns `Ok(0)` when `offset` is at or past [`size`](Self::size) or
    /// when `buf` is empty; a request extending past the end delivers the
    /// remaining tail. A source that hands out fewer bytes than its
    /// declared size covers fails with [`io::ErrorKind::UnexpectedEof`],
    /// and a failing source propagates its error unchanged.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize>;

    /// Total number of addressable bytes.
    fn size(&self) -> u64;
}

impl ReadAt for [u8] {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        if offset >= self.len() as u64 {
            return Ok(0);
        }
        let start = offset as usize;
        let n = buf.len().min(self.len() - start);
        buf[..n].copy_from_slice(&self[start..start + n]);
        Ok(n)
    }

    fn size(&self) -> u64 {
        self.len() as u64
    }
}

impl ReadAt for Vec<u8> {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        self.as_slice().read_at(buf, offset)
    }

    fn size(&self) -> u64 {
        self.len() as u64
    }
}

impl<T: ReadAt + ?Sized> ReadAt for &T {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        (**self).read_at(buf, offset)
    }

    fn size(&self) -> u64 {
        (**self).size()
    }
}

impl<T: ReadAt + ?Sized> ReadAt for Box<T> {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        (**self).read_at(buf, offset)
    }

    fn size(&self) -> u64 {
        (**self).size()
    }
}

impl<T: ReadAt + ?Sized> ReadAt for Arc<T> {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        (**self).read_at(buf, offset)
    }

    fn size(&self) -> u64 {
        (**self).size()
    }
}

/// Mirrors every positional read into a side sink.
///
/// There is no internal buffering: the write completes before the read
/// returns, and a sink failure is reported as the read's failure. The sink
/// sits behind a mutex because positional reads take `&self`.
pub struct TeeReadAt<R, W> {
    source: R,
    sink: Mutex<W>,
}

impl<R: ReadAt, W: Write> TeeReadAt<R, W> {
    /// Create a tee that copies everything read from `source` into `sink`.
    pub fn new(source: R, sink: W) -> Self {
        Self {
            source,
            sink: Mutex::new(sink),
        }
    }

    /// Consume the tee, returning the source and the sink.
    pub fn into_inner(self) -> (R, W) {
        (self.source, self.sink.into_inner())
    }
}

impl<R: ReadAt, W: Write> ReadAt for TeeReadAt<R, W> {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let n = self.source.read_at(buf, offset)?;
        if n > 0 {
            self.sink.lock().write_all(&buf[..n])?;
        }
        Ok(n)
    }

    fn size(&self) -> u64 {
        self.source.size()
    }
}
