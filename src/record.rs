//! One parsed archive record: header, payload, diagnoses, positions.

use crate::diagnostics::Diagnostics;
use crate::digest::DigestValue;
use crate::header::RecordHeader;
use crate::version::VersionHeader;

/// The two record kinds an ARC stream carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    /// The mandatory first record (`filedesc://` URL); its payload is the
    /// version header plus optional metadata.
    VersionBlock,
    /// Any captured document record.
    ArcRecord,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::VersionBlock => "version block",
            RecordType::ArcRecord => "arc record",
        }
    }
}

/// Payload bytes of one record, with an optional embedded sub-header.
///
/// When a captured `http(s)` document starts with an HTTP status line, the
/// response header bytes up to and including the blank separator line form
/// the sub-header.  The block digest covers every payload byte; the payload
/// digest skips the sub-header.
#[derive(Debug, Clone)]
pub struct Payload {
    bytes:          Vec<u8>,
    sub_header_len: usize,
}

impl Payload {
    pub fn new(bytes: Vec<u8>, sub_header_len: usize) -> Self {
        debug_assert!(sub_header_len <= bytes.len());
        Self {
            bytes,
            sub_header_len,
        }
    }

    /// Every payload byte, sub-header included.
    pub fn block_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Bytes after the sub-header.
    pub fn payload_bytes(&self) -> &[u8] {
        &self.bytes[self.sub_header_len..]
    }

    /// The embedded sub-header bytes, empty when none was detected.
    pub fn sub_header(&self) -> &[u8] {
        &self.bytes[..self.sub_header_len]
    }

    pub fn has_sub_header(&self) -> bool {
        self.sub_header_len > 0
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Locate an embedded HTTP response header: payload must open with
    /// `HTTP/` and contain a blank-line separator.  Returns the sub-header
    /// length, 0 when none applies.
    pub fn find_http_sub_header(bytes: &[u8]) -> usize {
        if !bytes.starts_with(b"HTTP/") {
            return 0;
        }
        if let Some(idx) = find(bytes, b"\r\n\r\n") {
            return idx + 4;
        }
        if let Some(idx) = find(bytes, b"\n\n") {
            return idx + 2;
        }
        0
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// One record pulled from an ARC stream.
///
/// Constructed by a reader once the header line tokenizes, even when
/// individual field values are invalid; those problems live in
/// `diagnostics`.  Immutable once returned to the caller.
#[derive(Debug, Clone)]
pub struct Record {
    pub record_type:    RecordType,
    pub header:         RecordHeader,
    /// Present only on the first (version-block) record.
    pub version_header: Option<VersionHeader>,
    pub payload:        Option<Payload>,
    pub diagnostics:    Diagnostics,

    /// Transport offset where this record starts: the header-line byte
    /// offset in uncompressed mode, the gzip member offset in compressed
    /// mode.
    pub start_offset: u64,
    /// Transport bytes this record consumed.
    pub consumed:     u64,
    /// Newlines consumed after the payload; exactly one is compliant.
    pub trailing_newlines: u32,

    pub computed_block_digest:   Option<DigestValue>,
    pub computed_payload_digest: Option<DigestValue>,
}

impl Record {
    pub fn new(record_type: RecordType, start_offset: u64) -> Self {
        Self {
            record_type,
            header: RecordHeader::new(),
            version_header: None,
            payload: None,
            diagnostics: Diagnostics::new(),
            start_offset,
            consumed: 0,
            trailing_newlines: 0,
            computed_block_digest: None,
            computed_payload_digest: None,
        }
    }

    /// Zero errors recorded against this record (warnings permitted).
    pub fn is_compliant(&self) -> bool {
        !self.diagnostics.has_errors()
    }
}
