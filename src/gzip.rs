//! Gzip member-per-record transport.
//!
//! A compressed ARC file is a sequence of independent gzip members, one per
//! record.  [`GzipEntrySource`] walks member boundaries over any `Read`,
//! handing out one decodable [`GzipEntry`] at a time together with its
//! compressed byte offset.  Decoding consumes exactly the member's
//! compressed bytes from the transport, so the next member starts where the
//! previous one ended.

use std::io::{self, BufRead, BufReader, Read};

use flate2::bufread::GzDecoder;

use crate::stream::ByteCountingReader;

/// Leading magic bytes of a gzip member.
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

pub fn is_gzip_magic(head: &[u8]) -> bool {
    head.len() >= 2 && head[0] == GZIP_MAGIC[0] && head[1] == GZIP_MAGIC[1]
}

/// Member-boundary walker over a compressed transport.
pub struct GzipEntrySource<R: Read> {
    reader: BufReader<ByteCountingReader<R>>,
}

impl<R: Read> GzipEntrySource<R> {
    pub fn new(source: ByteCountingReader<R>) -> Self {
        Self {
            reader: BufReader::new(source),
        }
    }

    pub fn with_capacity(capacity: usize, source: ByteCountingReader<R>) -> Self {
        Self {
            reader: BufReader::with_capacity(capacity, source),
        }
    }

    /// Compressed transport offset of the next unread byte.
    ///
    /// The buffered read-ahead is subtracted from the raw consumed count,
    /// so this is exact at member boundaries.
    pub fn offset(&self) -> u64 {
        self.reader.get_ref().consumed() - self.reader.buffer().len() as u64
    }

    /// Total bytes pulled from the underlying transport.
    pub fn consumed(&self) -> u64 {
        self.reader.get_ref().consumed()
    }

    /// Open the next gzip member, or `None` at end of stream.
    ///
    /// Returns `InvalidData` when the stream position does not hold a gzip
    /// magic; member-per-record files have no padding between members.
    pub fn next_entry(&mut self) -> io::Result<Option<GzipEntry<'_, R>>> {
        let head = self.reader.fill_buf()?;
        if head.is_empty() {
            return Ok(None);
        }
        if !is_gzip_magic(head) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "expected gzip member magic",
            ));
        }
        let start = self.offset();
        Ok(Some(GzipEntry {
            start,
            decoder: GzDecoder::new(&mut self.reader),
        }))
    }
}

/// One decodable gzip member.
///
/// Reading yields the member's uncompressed bytes; [`GzipEntry::drain`]
/// skips whatever the caller did not consume so the transport lands on the
/// next member boundary.
pub struct GzipEntry<'a, R: Read> {
    start:   u64,
    decoder: GzDecoder<&'a mut BufReader<ByteCountingReader<R>>>,
}

impl<R: Read> GzipEntry<'_, R> {
    /// Compressed offset where this member starts.
    pub fn start_offset(&self) -> u64 {
        self.start
    }

    /// Read the member to its end, returning the number of uncompressed
    /// bytes that were skipped.
    pub fn drain(&mut self) -> io::Result<u64> {
        let mut skipped = 0u64;
        let mut buf = [0u8; 4096];
        loop {
            match self.decoder.read(&mut buf)? {
                0 => return Ok(skipped),
                n => skipped += n as u64,
            }
        }
    }
}

impl<R: Read> Read for GzipEntry<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.decoder.read(buf)
    }
}
