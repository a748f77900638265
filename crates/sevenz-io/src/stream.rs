//! Sequential stream traits and composition helpers.

use std::io::{self, Read, Seek, Write};

/// A byte stream that must be explicitly closed.
///
/// Close failures matter to the stream pool (an evicted handle's failed
/// close is logged and swallowed, a caller's is not), so releasing is an
/// explicit operation rather than a side effect of `Drop`.
pub trait ReadClose: Read {
    /// Release the underlying resource.
    fn close(&mut self) -> io::Result<()>;
}

impl<T: ReadClose + ?Sized> ReadClose for Box<T> {
    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

/// A seekable [`ReadClose`] with a known decompressed size.
///
/// This is the currency of the stream pool: a decoder pipeline positioned
/// somewhere inside a folder's decompressed stream. Forward motion is cheap
/// (read and discard); rewinding means rebuilding from byte zero.
pub trait SizedStream: ReadClose + Seek {
    /// Total number of bytes this stream will produce.
    fn size(&self) -> u64;
}

impl<T: SizedStream + ?Sized> SizedStream for Box<T> {
    fn size(&self) -> u64 {
        (**self).size()
    }
}

/// Wraps a plain reader with a no-op [`close`](ReadClose::close).
pub struct NopClose<R>(R);

impl<R: Read> NopClose<R> {
    pub fn new(inner: R) -> Self {
        Self(inner)
    }

    /// Consume the wrapper, returning the inner reader.
    pub fn into_inner(self) -> R {
        self.0
    }
}

impl<R: Read> Read for NopClose<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl<R: Read> ReadClose for NopClose<R> {
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Mirrors every byte read from a stream into a side sink.
///
/// There is no internal buffering: the write completes before the read
/// returns, and a sink failure is reported as a read failure. Closing
/// closes the source only; the sink stays with the caller.
pub struct TeeStream<R, W> {
    source: R,
    sink: W,
}

impl<R: ReadClose, W: Write> TeeStream<R, W> {
    pub fn new(source: R, sink: W) -> Self {
        Self { source, sink }
    }

    /// Consume the tee, returning the source and the sink.
    pub fn into_inner(self) -> (R, W) {
        (self.source, self.sink)
    }
}

impl<R: Read, W: Write> Read for TeeStream<R, W> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.source.read(buf)?;
        if n > 0 {
            self.sink.write_all(&buf[..n])?;
        }
        Ok(n)
    }
}

impl<R: ReadClose, W: Write> ReadClose for TeeStream<R, W> {
    fn close(&mut self) -> io::Result<()> {
        self.source.close()
    }
}

/// Caps a stream at a fixed byte budget.
///
/// Reads report end of data once the budget is spent, regardless of how
/// much the underlying stream still holds.
pub struct LimitedStream<R> {
    inner: R,
    remaining: u64,
}

impl<R: ReadClose> LimitedStream<R> {
    pub fn new(inner: R, limit: u64) -> Self {
        Self {
            inner,
            remaining: limit,
        }
    }

    /// Bytes left in the budget.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}

impl<R: Read> Read for LimitedStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 {
            return Ok(0);
        }
        let cap = buf.len().min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
        let n = self.inner.read(&mut buf[..cap])?;
        self.remaining -= n as u64;
        Ok(n)
    }
}

impl<R: ReadClose> ReadClose for LimitedStream<R> {
    fn close(&mut self) -> io::Result<()> {
        self.inner.close()
    }
}

/// Upper bound on interrupted read attempts for a single byte.
const MAX_STALLED_READS: usize = 100;

/// Byte-at-a-time adapter over a block-oriented stream.
///
/// Decoders that consume single bytes wrap their input once, at pipeline
/// construction, rather than probing the stream's capabilities per call.
pub struct ByteStream<R> {
    inner: R,
}

impl<R: Read> ByteStream<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Consume the adapter, returning the inner stream.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Read the next byte, or `Ok(None)` at end of data.
    ///
    /// A stream that keeps reporting interruption without ever delivering a
    /// byte is reported as making no progress instead of spinning forever.
    pub fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0u8; 1];
        for _ in 0..MAX_STALLED_READS {
            match self.inner.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(byte[0])),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Err(io::Error::other("byte stream is making no progress"))
    }
}

impl<R: Read> Read for ByteStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: ReadClose> ReadClose for ByteStream<R> {
    fn close(&mut self) -> io::Result<()> {
        self.inner.close()
    }
}
