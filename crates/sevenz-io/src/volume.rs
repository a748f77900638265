//! Single-file volumes and the merged multi-volume address space.

use crate::read_at::ReadAt;
use memmap2::MmapOptions;
use parking_lot::Mutex;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::debug;

/// Files at or above this size are not memory-mapped.
const MMAP_CEILING: u64 = 2_147_483_648;

enum Backing {
    Mapped(memmap2::Mmap),
    /// Fallback for oversized or unmappable files. Positional reads take
    /// `&self`, so the seeking handle lives behind a mutex.
    Seeking(Mutex<File>),
}

/// One archive volume backed by a file on disk.
///
/// Memory-mapped when the file is non-empty and small enough, otherwise
/// served through seek-and-read on a shared file handle.
pub struct Volume {
    backing: Backing,
    size: u64,
}

impl Volume {
    /// Open a volume file for positional reading.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();

        debug!("Opening volume: {:?} (size: {} bytes)", path, size);

        let backing = if size > 0 && size < MMAP_CEILING {
            match unsafe { MmapOptions::new().map(&file) } {
                Ok(mmap) => Backing::Mapped(mmap),
                Err(e) => {
                    debug!("Failed to memory-map volume, using file reader: {}", e);
                    Backing::Seeking(Mutex::new(file))
                }
            }
        } else {
            Backing::Seeking(Mutex::new(file))
        };

        Ok(Self { backing, size })
    }

    /// Check if memory mapping is in use.
    pub fn is_memory_mapped(&self) -> bool {
        matches!(self.backing, Backing::Mapped(_))
    }
}

impl ReadAt for Volume {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        if offset >= self.size || buf.is_empty() {
            return Ok(0);
        }
        let n = buf.len().min((self.size - offset) as usize);

        match &self.backing {
            Backing::Mapped(mmap) => {
                let start = offset as usize;
                buf[..n].copy_from_slice(&mmap[start..start + n]);
                Ok(n)
            }
            Backing::Seeking(file) => {
                let mut file = file.lock();
                file.seek(SeekFrom::Start(offset))?;

                let mut filled = 0;
                while filled < n {
                    match file.read(&mut buf[filled..n]) {
                        Ok(0) => {
                            // The file shrank below the size recorded at open.
                            return Err(io::Error::new(
                                io::ErrorKind::UnexpectedEof,
                                "volume shorter than its reported size",
                            ));
                        }
                        Ok(m) => filled += m,
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                        Err(e) => return Err(e),
                    }
                }
                Ok(filled)
            }
        }
    }

    fn size(&self) -> u64 {
        self.size
    }
}

/// A source contributing one contiguous range to a [`VolumeSet`].
pub type VolumeSource = Box<dyn ReadAt + Send + Sync>;

struct Segment {
    /// Logical offset of this segment's first byte.
    start: u64,
    source: VolumeSource,
}

impl Segment {
    fn end(&self) -> u64 {
        self.start + self.source.size()
    }
}

/// An ordered list of volumes merged into one flat address space.
///
/// Segment `i` begins exactly where segment `i - 1` ends; the layout is
/// fixed at construction. The set holds no read cursor of its own, so it is
/// itself a [`ReadAt`] and sets can nest.
pub struct VolumeSet {
    segments: Vec<Segment>,
    size: u64,
}

impl VolumeSet {
    /// Merge `sources`, in order, into one address space.
    pub fn new(sources: Vec<VolumeSource>) -> Self {
        let mut segments = Vec::with_capacity(sources.len());
        let mut start = 0u64;

        for source in sources {
            let len = source.size();
            segments.push(Segment { start, source });
            start += len;
        }

        debug!(
            "Merged {} volumes into a {} byte address space",
            segments.len(),
            start
        );

        Self {
            segments,
            size: start,
        }
    }

    /// Open each path as a [`Volume`] and merge them in the given order.
    pub fn open<P: AsRef<Path>>(paths: &[P]) -> io::Result<Self> {
        let mut sources: Vec<VolumeSource> = Vec::with_capacity(paths.len());
        for path in paths {
            sources.push(Box::new(Volume::open(path.as_ref())?));
        }
        Ok(Self::new(sources))
    }

    /// Number of merged volumes.
    pub fn volume_count(&self) -> usize {
        self.segments.len()
    }

    /// Index of the first segment whose end lies past `offset`.
    fn segment_index(&self, offset: u64) -> usize {
        self.segments.partition_point(|s| s.end() <= offset)
    }
}

impl ReadAt for VolumeSet {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        if offset >= self.size || buf.is_empty() {
            return Ok(0);
        }
        let want = buf.len().min((self.size - offset) as usize);

        let mut index = self.segment_index(offset);
        let mut local = offset - self.segments[index].start;
        let mut filled = 0;

        while filled < want && index < self.segments.len() {
            let segment = &self.segments[index];
            let len = segment.source.size();

            while filled < want && local < len {
                let chunk = (want - filled).min((len - local) as usize);
                let n = segment.source.read_at(&mut buf[filled..filled + chunk], local)?;
                if n == 0 {
                    // The segment claims more bytes than it produced.
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "volume delivered fewer bytes than its reported size",
                    ));
                }
                filled += n;
                local += n as u64;
            }

            index += 1;
            local = 0;
        }

        Ok(filled)
    }

    fn size(&self) -> u64 {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn set_of(parts: &[&[u8]]) -> VolumeSet {
        VolumeSet::new(
            parts
                .iter()
                .map(|p| Box::new(p.to_vec()) as VolumeSource)
                .collect(),
        )
    }

    #[test]
    fn sizes_accumulate() {
        let set = set_of(&[b"abc", b"", b"defgh"]);
        assert_eq!(set.size(), 8);
        assert_eq!(set.volume_count(), 3);
    }

    #[test]
    fn reads_cross_segment_boundaries() {
        let set = set_of(&[b"abc", b"def", b"ghi"]);
        let mut buf = [0u8; 5];

        assert_eq!(set.read_at(&mut buf, 2).unwrap(), 5);
        assert_eq!(&buf, b"cdefg");
    }

    #[test]
    fn read_spanning_every_segment() {
        let set = set_of(&[b"ab", b"cd", b"ef", b"gh"]);
        let mut buf = [0u8; 8];

        assert_eq!(set.read_at(&mut buf, 0).unwrap(), 8);
        assert_eq!(&buf, b"abcdefgh");
    }

    #[test]
    fn empty_segments_are_skipped() {
        let set = set_of(&[b"", b"ab", b"", b"", b"cd", b""]);
        let mut buf = [0u8; 4];

        assert_eq!(set.read_at(&mut buf, 0).unwrap(), 4);
        assert_eq!(&buf, b"abcd");
    }

    #[test]
    fn reads_at_or_past_the_end_are_clean_eof() {
        let set = set_of(&[b"abc", b"def"]);
        let mut buf = [0u8; 4];

        assert_eq!(set.read_at(&mut buf, 6).unwrap(), 0);
        assert_eq!(set.read_at(&mut buf, 7000).unwrap(), 0);
    }

    #[test]
    fn reads_straddling_the_end_truncate() {
        let set = set_of(&[b"abc", b"def"]);
        let mut buf = [0u8; 16];

        assert_eq!(set.read_at(&mut buf, 4).unwrap(), 2);
        assert_eq!(&buf[..2], b"ef");
    }

    #[test]
    fn nested_sets_read_like_flat_ones() {
        let inner = set_of(&[b"abc", b"def"]);
        let outer = VolumeSet::new(vec![
            Box::new(inner) as VolumeSource,
            Box::new(b"ghi".to_vec()) as VolumeSource,
        ]);
        let mut buf = [0u8; 9];

        assert_eq!(outer.size(), 9);
        assert_eq!(outer.read_at(&mut buf, 0).unwrap(), 9);
        assert_eq!(&buf, b"abcdefghi");
    }

    struct LyingSource {
        claimed: u64,
    }

    impl ReadAt for LyingSource {
        fn read_at(&self, _buf: &mut [u8], _offset: u64) -> io::Result<usize> {
            Ok(0)
        }

        fn size(&self) -> u64 {
            self.claimed
        }
    }

    #[test]
    fn under_delivering_segment_is_a_short_read_error() {
        let set = VolumeSet::new(vec![
            Box::new(b"ab".to_vec()) as VolumeSource,
            Box::new(LyingSource { claimed: 4 }) as VolumeSource,
        ]);
        let mut buf = [0u8; 6];

        let err = set.read_at(&mut buf, 0).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    struct BrokenSource;

    impl ReadAt for BrokenSource {
        fn read_at(&self, _buf: &mut [u8], _offset: u64) -> io::Result<usize> {
            Err(io::Error::other("disk on fire"))
        }

        fn size(&self) -> u64 {
            4
        }
    }

    #[test]
    fn segment_errors_propagate_verbatim() {
        let set = VolumeSet::new(vec![
            Box::new(b"ab".to_vec()) as VolumeSource,
            Box::new(BrokenSource) as VolumeSource,
        ]);
        let mut buf = [0u8; 6];

        let err = set.read_at(&mut buf, 0).unwrap_err();
        assert_eq!(err.to_string(), "disk on fire");
    }

    #[test]
    fn file_volume_round_trips() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"volume one contents").unwrap();
        file.flush().unwrap();

        let volume = Volume::open(file.path()).unwrap();
        assert_eq!(volume.size(), 19);
        assert!(volume.is_memory_mapped());

        let mut buf = [0u8; 3];
        assert_eq!(volume.read_at(&mut buf, 7).unwrap(), 3);
        assert_eq!(&buf, b"one");
        assert_eq!(volume.read_at(&mut buf, 19).unwrap(), 0);
    }

    #[test]
    fn empty_file_volume_reads_nothing() {
        let file = NamedTempFile::new().unwrap();
        let volume = Volume::open(file.path()).unwrap();

        assert_eq!(volume.size(), 0);
        assert!(!volume.is_memory_mapped());

        let mut buf = [0u8; 3];
        assert_eq!(volume.read_at(&mut buf, 0).unwrap(), 0);
    }

    #[test]
    fn multi_file_set_merges_parts() {
        let mut one = NamedTempFile::new().unwrap();
        one.write_all(b"split ").unwrap();
        let mut two = NamedTempFile::new().unwrap();
        two.write_all(b"archive").unwrap();

        let set = VolumeSet::open(&[one.path(), two.path()]).unwrap();
        assert_eq!(set.size(), 13);

        let mut buf = [0u8; 13];
        assert_eq!(set.read_at(&mut buf, 0).unwrap(), 13);
        assert_eq!(&buf, b"split archive");
    }
}
