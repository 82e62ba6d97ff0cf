//! Archive readers: uncompressed, compressed, and the facade.
//!
//! [`ArcReader`] is the entry point.  `open()` sniffs the stream head for
//! the gzip magic and selects the matching sequential variant;
//! `open_detached()` builds a random-access reader over a seekable source.
//! The two access styles never mix on one instance: driving a sequential
//! reader by explicit offsets (or vice versa) is a state fault.
//!
//! Record parsing itself is shared: both transports feed the same
//! line-tokenize/field-parse/payload/terminator pipeline, differing only in
//! where record boundaries and byte counters come from.

mod compressed;
mod uncompressed;

pub use compressed::CompressedReader;
pub use uncompressed::UncompressedReader;

use std::io::{Read, Seek, SeekFrom};

use log::debug;

use crate::diagnostics::{Diagnosis, DiagnosisType, Diagnostics};
use crate::digest::DigestConfig;
use crate::error::{ArcError, Result};
use crate::fields::FieldParsers;
use crate::gzip::{is_gzip_magic, GzipEntrySource};
use crate::header::RecordHeader;
use crate::record::{Payload, Record, RecordType};
use crate::stream::ByteCountingReader;
use crate::version::VersionHeader;

/// Diagnosis entity for whole-archive problems.
pub const ENTITY_ARC_FILE: &str = "ARC file";

const PAYLOAD_CHUNK: usize = 8 * 1024;

// ── Shared parse core ────────────────────────────────────────────────────────

/// Per-call parsing context handed down by the facade.
pub(crate) struct ParseCtx<'a> {
    pub parsers:             &'a FieldParsers,
    pub block_digest:        &'a DigestConfig,
    pub payload_digest:      &'a DigestConfig,
    /// Field-set version the version block declared (0 when unknown).
    pub expected_block_desc: u8,
    /// Whether a version header should be parsed out of a version block's
    /// payload (only ever true for the first record of a stream).
    pub parse_version_header: bool,
}

/// Parse one record from `src`, or `None` when the source is exhausted.
///
/// `start_offset`/`consumed` are filled from `src`'s counters; compressed
/// callers overwrite them with member-level values afterwards.
pub(crate) fn parse_record<S: Read>(
    src: &mut ByteCountingReader<S>,
    ctx: &ParseCtx<'_>,
) -> Result<Option<Record>> {
    // Locate the header line, tolerating leading blank lines (a previous
    // record's over-long terminator run, already diagnosed there).
    let (line, line_start) = loop {
        let start = src.consumed();
        match src.read_line()? {
            None => return Ok(None),
            Some(line) if line.is_empty() => continue,
            Some(line) => break (line, start),
        }
    };
    let line = String::from_utf8_lossy(&line).into_owned();
    let tokens: Vec<&str> = line.split_ascii_whitespace().collect();

    let record_type = match tokens.first() {
        Some(url) if url.starts_with("filedesc://") => RecordType::VersionBlock,
        _ => RecordType::ArcRecord,
    };

    let mut record = Record::new(record_type, line_start);
    let version =
        record
            .header
            .parse_tokens(&tokens, ctx.parsers, &mut record.diagnostics);

    if version == 0 {
        RecordHeader::add_missing_field_diagnoses(
            ctx.expected_block_desc,
            &mut record.diagnostics,
        );
        record.consumed = src.consumed() - line_start;
        return Ok(Some(record));
    }

    let declared = match record.header.declared_length() {
        Some(len) if len >= 0 => len as u64,
        Some(len) => {
            record.diagnostics.add_error(Diagnosis::new(
                DiagnosisType::Invalid,
                format!("'{}' value", crate::header::FN_ARCHIVE_LENGTH),
                &[&len.to_string()],
            ));
            record.consumed = src.consumed() - line_start;
            return Ok(Some(record));
        }
        // Unparseable length: no way to frame a payload.  The error is
        // already recorded; resume at the next line.
        None => {
            record.consumed = src.consumed() - line_start;
            return Ok(Some(record));
        }
    };

    read_payload(src, declared, ctx, &mut record)?;
    read_trailing_newlines(src, &mut record)?;
    record.consumed = src.consumed() - line_start;
    Ok(Some(record))
}

/// Stream `declared` payload bytes, updating digests chunk by chunk.
fn read_payload<S: Read>(
    src: &mut ByteCountingReader<S>,
    declared: u64,
    ctx: &ParseCtx<'_>,
    record: &mut Record,
) -> Result<()> {
    let mut block_digest = ctx.block_digest.start();
    let mut bytes = Vec::with_capacity(declared.min(1 << 20) as usize);
    let mut remaining = declared;
    let mut chunk = [0u8; PAYLOAD_CHUNK];
    while remaining > 0 {
        let want = remaining.min(PAYLOAD_CHUNK as u64) as usize;
        let n = src.read(&mut chunk[..want])?;
        if n == 0 {
            record.diagnostics.add_error(Diagnosis::new(
                DiagnosisType::InvalidData,
                "record payload",
                &[&declared.to_string(), &bytes.len().to_string()],
            ));
            break;
        }
        if let Some(digest) = block_digest.as_mut() {
            digest.update(&chunk[..n]);
        }
        bytes.extend_from_slice(&chunk[..n]);
        remaining -= n as u64;
    }

    if let Some(digest) = block_digest {
        record.computed_block_digest = Some(digest.finish(&mut record.diagnostics));
    }

    match record.record_type {
        RecordType::VersionBlock => {
            if ctx.parse_version_header {
                record.version_header = Some(VersionHeader::process_payload(
                    &bytes,
                    ctx.parsers,
                    &mut record.diagnostics,
                ));
            }
            record.payload = Some(Payload::new(bytes, 0));
        }
        RecordType::ArcRecord => {
            let sub_header_len = match record.header.url.as_ref().map(|u| u.scheme()) {
                Some("http") | Some("https") => Payload::find_http_sub_header(&bytes),
                _ => 0,
            };
            if let Some(mut digest) = ctx.payload_digest.start() {
                for chunk in bytes[sub_header_len..].chunks(PAYLOAD_CHUNK) {
                    digest.update(chunk);
                }
                record.computed_payload_digest =
                    Some(digest.finish(&mut record.diagnostics));
            }
            record.payload = Some(Payload::new(bytes, sub_header_len));
        }
    }
    Ok(())
}

/// Consume the record terminator run.  Exactly one newline is compliant; a
/// missing terminator is tolerated at end of stream only.
fn read_trailing_newlines<S: Read>(
    src: &mut ByteCountingReader<S>,
    record: &mut Record,
) -> Result<()> {
    let mut count = 0u32;
    let mut at_eof = false;
    loop {
        match src.read_byte()? {
            Some(b'\n') => count += 1,
            Some(other) => {
                src.unread(&[other]);
                break;
            }
            None => {
                at_eof = true;
                break;
            }
        }
    }
    record.trailing_newlines = count;
    if count > 1 || (count == 0 && !at_eof) {
        record.diagnostics.add_error(Diagnosis::new(
            DiagnosisType::InvalidExpected,
            "record terminator",
            &[&count.to_string(), "1"],
        ));
    }
    Ok(())
}

// ── Facade ───────────────────────────────────────────────────────────────────

enum ReaderVariant<R: Read> {
    Uncompressed(UncompressedReader<R>),
    Compressed(CompressedReader<R>),
    /// Random-access mode: the raw seekable source, driven per call.
    Detached { source: R, compressed: bool },
    Closed,
}

/// Unified reader over both transports, selected by auto-detection.
pub struct ArcReader<R: Read> {
    variant:  ReaderVariant<R>,
    parsers:  FieldParsers,
    block_digest:   DigestConfig,
    payload_digest: DigestConfig,

    diagnostics:         Diagnostics,
    records_read:        u64,
    expected_block_desc: u8,
    records_compliant:   bool,
    iterator_fault:      Option<ArcError>,

    // Detached-mode position bookkeeping.
    detached_start:    u64,
    detached_offset:   u64,
    detached_consumed: u64,
}

impl<R: Read> ArcReader<R> {
    /// Open a sequential reader, auto-detecting the transport from the
    /// stream's first two bytes.
    pub fn open(source: R) -> Result<Self> {
        let mut counting = ByteCountingReader::new(source);
        let mut head = [0u8; 2];
        let got = read_head(&mut counting, &mut head)?;
        counting.unread(&head[..got]);
        let compressed = is_gzip_magic(&head[..got]);
        debug!(
            "opening {} ARC stream",
            if compressed { "compressed" } else { "uncompressed" }
        );
        let variant = if compressed {
            ReaderVariant::Compressed(CompressedReader::new(GzipEntrySource::new(counting)))
        } else {
            ReaderVariant::Uncompressed(UncompressedReader::new(counting))
        };
        Ok(Self::with_variant(variant))
    }

    fn with_variant(variant: ReaderVariant<R>) -> Self {
        Self {
            variant,
            parsers: FieldParsers,
            block_digest: DigestConfig::default(),
            payload_digest: DigestConfig::default(),
            diagnostics: Diagnostics::new(),
            records_read: 0,
            expected_block_desc: 0,
            records_compliant: true,
            iterator_fault: None,
            detached_start: 0,
            detached_offset: 0,
            detached_consumed: 0,
        }
    }

    // ── Digest configuration ────────────────────────────────────────────────

    pub fn set_block_digest_algorithm(&mut self, name: Option<&str>) -> Result<()> {
        self.block_digest.set_algorithm(name)
    }

    pub fn set_block_digest_encoding(&mut self, encoding: &str) {
        self.block_digest.set_encoding(encoding);
    }

    pub fn set_payload_digest_algorithm(&mut self, name: Option<&str>) -> Result<()> {
        self.payload_digest.set_algorithm(name)
    }

    pub fn set_payload_digest_encoding(&mut self, encoding: &str) {
        self.payload_digest.set_encoding(encoding);
    }

    // ── Sequential access ───────────────────────────────────────────────────

    /// Pull the next record, or `None` at end of stream.
    pub fn next_record(&mut self) -> Result<Option<Record>> {
        let ctx = ParseCtx {
            parsers:              &self.parsers,
            block_digest:         &self.block_digest,
            payload_digest:       &self.payload_digest,
            expected_block_desc:  self.expected_block_desc,
            parse_version_header: self.records_read == 0,
        };
        let record = match &mut self.variant {
            ReaderVariant::Uncompressed(reader) => reader.next_record(&ctx)?,
            ReaderVariant::Compressed(reader) => reader.next_record(&ctx)?,
            ReaderVariant::Detached { .. } => {
                return Err(ArcError::InvalidState {
                    operation: "next_record",
                    state:     "detached (random access) reader",
                })
            }
            ReaderVariant::Closed => {
                return Err(ArcError::InvalidState {
                    operation: "next_record",
                    state:     "closed reader",
                })
            }
        };
        Ok(record.map(|record| self.account(record)))
    }

    /// Fail-safe iterator over the remaining records.
    ///
    /// A fault raised while producing the next record is captured into the
    /// reader's fault slot and iteration ends; the fault stays inspectable
    /// via [`iterator_fault`](Self::iterator_fault).
    pub fn records(&mut self) -> RecordIter<'_, R> {
        RecordIter { reader: self }
    }

    /// The fault captured by the iterator adapter, if any.
    pub fn iterator_fault(&self) -> Option<&ArcError> {
        self.iterator_fault.as_ref()
    }

    // ── Shared record accounting ────────────────────────────────────────────

    fn account(&mut self, record: Record) -> Record {
        match (self.records_read, record.record_type) {
            (0, RecordType::ArcRecord) => {
                self.diagnostics.add_error(Diagnosis::new(
                    DiagnosisType::ErrorExpected,
                    ENTITY_ARC_FILE,
                    &[
                        RecordType::VersionBlock.as_str(),
                        RecordType::ArcRecord.as_str(),
                    ],
                ));
            }
            (n, RecordType::VersionBlock) if n > 0 => {
                self.diagnostics.add_error(Diagnosis::new(
                    DiagnosisType::ErrorExpected,
                    ENTITY_ARC_FILE,
                    &[
                        RecordType::ArcRecord.as_str(),
                        RecordType::VersionBlock.as_str(),
                    ],
                ));
            }
            _ => {}
        }
        self.records_read += 1;
        if let Some(version_header) = &record.version_header {
            if version_header.block_desc_version != 0 {
                self.expected_block_desc = version_header.block_desc_version;
            }
        }
        if record.diagnostics.has_errors() {
            self.records_compliant = false;
        }
        record
    }

    // ── Compliance, positions, lifecycle ────────────────────────────────────

    /// Reader-level diagnoses (record-type ordering and the like).
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// True iff neither the reader nor any record produced so far has
    /// accumulated an error.  Warnings do not affect compliance.
    pub fn is_compliant(&self) -> bool {
        !self.diagnostics.has_errors() && self.records_compliant
    }

    /// Transport offset where the most recent record starts.
    pub fn start_offset(&self) -> u64 {
        match &self.variant {
            ReaderVariant::Uncompressed(reader) => reader.start_offset(),
            ReaderVariant::Compressed(reader) => reader.start_offset(),
            _ => self.detached_start,
        }
    }

    /// Current transport offset.
    pub fn offset(&self) -> u64 {
        match &self.variant {
            ReaderVariant::Uncompressed(reader) => reader.offset(),
            ReaderVariant::Compressed(reader) => reader.offset(),
            _ => self.detached_offset,
        }
    }

    /// Total bytes consumed from the transport.
    pub fn consumed(&self) -> u64 {
        match &self.variant {
            ReaderVariant::Uncompressed(reader) => reader.consumed(),
            ReaderVariant::Compressed(reader) => reader.consumed(),
            _ => self.detached_consumed,
        }
    }

    /// Release the underlying transport.  Safe to call any number of
    /// times; only the first has any effect.
    pub fn close(&mut self) {
        if !matches!(self.variant, ReaderVariant::Closed) {
            self.variant = ReaderVariant::Closed;
        }
    }
}

impl<R: Read + Seek> ArcReader<R> {
    /// Open a random-access reader over a seekable source.
    ///
    /// Detached readers carry no sequential state: records are fetched with
    /// [`next_record_from`](Self::next_record_from), and the sequential
    /// [`next_record`](Self::next_record) is a state fault.
    pub fn open_detached(mut source: R) -> Result<Self> {
        source.seek(SeekFrom::Start(0))?;
        let mut head = [0u8; 2];
        let mut counting = ByteCountingReader::new(&mut source);
        let got = read_head(&mut counting, &mut head)?;
        let compressed = is_gzip_magic(&head[..got]);
        source.seek(SeekFrom::Start(0))?;
        debug!(
            "opening detached {} ARC reader",
            if compressed { "compressed" } else { "uncompressed" }
        );
        Ok(Self::with_variant(ReaderVariant::Detached { source, compressed }))
    }

    /// Decode one record starting at `offset`.
    pub fn next_record_from(&mut self, offset: u64) -> Result<Option<Record>> {
        self.next_record_from_inner(offset, None)
    }

    /// Decode one record starting at `offset`, with an explicit transport
    /// buffer size for the compressed path.
    pub fn next_record_from_buffered(
        &mut self,
        offset: u64,
        buffer_size: usize,
    ) -> Result<Option<Record>> {
        if buffer_size == 0 {
            return Err(ArcError::InvalidArgument {
                context: "next_record_from_buffered",
                reason:  "buffer size must be non-zero".to_string(),
            });
        }
        self.next_record_from_inner(offset, Some(buffer_size))
    }

    fn next_record_from_inner(
        &mut self,
        offset: u64,
        buffer_size: Option<usize>,
    ) -> Result<Option<Record>> {
        let ctx = ParseCtx {
            parsers:              &self.parsers,
            block_digest:         &self.block_digest,
            payload_digest:       &self.payload_digest,
            expected_block_desc:  self.expected_block_desc,
            parse_version_header: self.records_read == 0,
        };
        let (source, compressed) = match &mut self.variant {
            ReaderVariant::Detached { source, compressed } => (source, *compressed),
            ReaderVariant::Closed => {
                return Err(ArcError::InvalidState {
                    operation: "next_record_from",
                    state:     "closed reader",
                })
            }
            _ => {
                return Err(ArcError::InvalidState {
                    operation: "next_record_from",
                    state:     "sequential reader",
                })
            }
        };

        source.seek(SeekFrom::Start(offset))?;
        let record = if compressed {
            compressed::read_record_from_member(source, ctx, buffer_size)?
        } else {
            let mut counting = ByteCountingReader::new(source);
            parse_record(&mut counting, &ctx)?
        };

        Ok(record.map(|mut record| {
            // Positions inside the call are relative to the seek target.
            record.start_offset += offset;
            self.detached_start = offset;
            self.detached_offset = offset + record.consumed;
            self.detached_consumed += record.consumed;
            self.account(record)
        }))
    }
}

fn read_head<S: Read>(src: &mut S, head: &mut [u8; 2]) -> Result<usize> {
    let mut got = 0;
    while got < head.len() {
        let n = src.read(&mut head[got..])?;
        if n == 0 {
            break;
        }
        got += n;
    }
    Ok(got)
}

// ── Iterator adapter ─────────────────────────────────────────────────────────

/// Fail-safe record iterator; see [`ArcReader::records`].
pub struct RecordIter<'a, R: Read> {
    reader: &'a mut ArcReader<R>,
}

impl<R: Read> Iterator for RecordIter<'_, R> {
    type Item = Record;

    fn next(&mut self) -> Option<Self::Item> {
        if self.reader.iterator_fault.is_some() {
            return None;
        }
        match self.reader.next_record() {
            Ok(record) => record,
            Err(fault) => {
                self.reader.iterator_fault = Some(fault);
                None
            }
        }
    }
}
