//! Decompressing block stream for BGZF inputs.
//!
//! BGZF is a series of concatenated gzip members, so a multi-member gzip decoder reads it
//! sequentially. Random access uses BAI virtual offsets: the upper 48 bits give the
//! compressed offset of a block start, the lower 16 bits the offset inside that
//! block's uncompressed contents.

use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

/// A BAI virtual file offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VirtualOffset(u64);

impl VirtualOffset {
    pub const MIN: VirtualOffset = VirtualOffset(0);

    #[must_use]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub fn new(block_offset: u64, contents_offset: u16) -> Self {
        Self(block_offset << 16 | u64::from(contents_offset))
    }

    #[must_use]
    pub fn raw(self) -> u64 {
        self.0
    }

    /// Compressed offset of the containing block
    #[must_use]
    pub fn block_offset(self) -> u64 {
        self.0 >> 16
    }

    /// Offset into the block's uncompressed contents
    #[must_use]
    pub fn contents_offset(self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }
}

impl std::fmt::Display for VirtualOffset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.block_offset(), self.contents_offset())
    }
}

/// Persistent handle over a block-compressed input, opened once and read across many calls
pub struct BlockStream {
    inner: BufReader<MultiGzDecoder<Box<dyn Read>>>,
}

impl BlockStream {
    pub fn new(source: impl Read + 'static) -> Self {
        let source: Box<dyn Read> = Box::new(source);
        Self {
            inner: BufReader::new(MultiGzDecoder::new(source)),
        }
    }

    /// # Errors
    ///
    /// Returns the underlying I/O error if the file cannot be opened.
    pub fn open(path: &Path) -> io::Result<Self> {
        File::open(path).map(Self::new)
    }

    /// Open positioned at a virtual offset
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be opened or seeked, or if the target
    /// block holds fewer bytes than the contents offset.
    pub fn open_at(path: &Path, offset: VirtualOffset) -> io::Result<Self> {
        let mut file = File::open(path)?;
        file.seek(SeekFrom::Start(offset.block_offset()))?;
        let mut stream = Self::new(file);

        let skip = u64::from(offset.contents_offset());
        let skipped = io::copy(&mut (&mut stream.inner).take(skip), &mut io::sink())?;
        if skipped < skip {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("Virtual offset {offset} points past the end of its block"),
            ));
        }
        Ok(stream)
    }

    /// True once every block has been consumed
    ///
    /// # Errors
    ///
    /// Returns the decompression error if the next block is corrupt.
    pub fn at_end(&mut self) -> io::Result<bool> {
        Ok(self.inner.fill_buf()?.is_empty())
    }

    /// Fill as much of `buf` as the stream allows, returning the number of bytes read.
    ///
    /// Unlike `read_exact`, a short count tells a clean end of stream (0) apart from a
    /// truncated one (between 0 and `buf.len()`).
    ///
    /// # Errors
    ///
    /// Returns any I/O or decompression error other than `Interrupted`.
    pub fn read_fully(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

impl Read for BlockStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_virtual_offset_parts() {
        let offset = VirtualOffset::new(1234, 56);
        assert_eq!(offset.block_offset(), 1234);
        assert_eq!(offset.contents_offset(), 56);
        assert_eq!(VirtualOffset::from_raw(offset.raw()), offset);
        assert!(VirtualOffset::new(1, 0) > VirtualOffset::new(0, 65535));
    }

    #[test]
    fn test_reads_across_members() {
        let mut data = gzip(b"hello ");
        data.extend(gzip(b"world"));
        data.extend(gzip(b""));

        let mut stream = BlockStream::new(std::io::Cursor::new(data));
        let mut buf = [0u8; 11];
        assert_eq!(stream.read_fully(&mut buf).unwrap(), 11);
        assert_eq!(&buf, b"hello world");
        assert!(stream.at_end().unwrap());
    }

    #[test]
    fn test_short_read_reports_count() {
        let mut stream = BlockStream::new(std::io::Cursor::new(gzip(b"abc")));
        let mut buf = [0u8; 8];
        assert_eq!(stream.read_fully(&mut buf).unwrap(), 3);
        assert_eq!(stream.read_fully(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_plain_text_is_rejected() {
        let mut stream = BlockStream::new(std::io::Cursor::new(b"@HD\tVN:1.6\n".to_vec()));
        let mut buf = [0u8; 4];
        assert!(stream.read_fully(&mut buf).is_err());
    }

    #[test]
    fn test_open_at_virtual_offset() {
        let first = gzip(b"0123456789");
        let second = gzip(b"abcdefghij");
        let block_offset = first.len() as u64;
        let mut data = first;
        data.extend(second);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&data).unwrap();

        let mut stream = BlockStream::open_at(file.path(), VirtualOffset::new(block_offset, 3)).unwrap();
        let mut buf = [0u8; 7];
        assert_eq!(stream.read_fully(&mut buf).unwrap(), 7);
        assert_eq!(&buf, b"defghij");
    }
}
