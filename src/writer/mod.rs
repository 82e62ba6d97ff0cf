//! Record writer: a small state machine over a plain or gzip sink.
//!
//! One record is written as header line, payload bytes, terminator.  The
//! lifecycle is `Init → HeaderWritten → PayloadWritten → RecordClosed`,
//! returning to `HeaderWritten` on the next header write; a header write
//! directly on top of another header write is a state fault, as is any
//! payload write outside an open record.  In compressed mode every record
//! becomes its own gzip member, finished when the record closes.

mod multifile;

pub use multifile::{DefaultNamingStrategy, MultiFileConfig, MultiFileWriter, NamingStrategy};

use std::io::{Read, Write};

use flate2::write::GzEncoder;
use flate2::Compression;
use log::debug;

use crate::diagnostics::{Diagnosis, DiagnosisType, Diagnostics};
use crate::digest::{DigestComputation, DigestConfig, DigestValue};
use crate::error::{ArcError, Result};
use crate::record::Record;
use crate::header::RecordHeader;
use crate::stream::CountingWriter;

const STREAM_COPY_CHUNK: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Init,
    HeaderWritten,
    PayloadWritten,
    RecordClosed,
}

impl WriterState {
    fn name(self) -> &'static str {
        match self {
            WriterState::Init => "Init",
            WriterState::HeaderWritten => "HeaderWritten",
            WriterState::PayloadWritten => "PayloadWritten",
            WriterState::RecordClosed => "RecordClosed",
        }
    }
}

enum Sink<W: Write> {
    Plain(CountingWriter<W>),
    Gzip {
        /// Present between records; taken while a member is open.
        out:    Option<CountingWriter<W>>,
        member: Option<GzEncoder<CountingWriter<W>>>,
    },
    Closed,
}

/// Serializes records into a sink, one at a time.
pub struct ArcWriter<W: Write> {
    sink:  Sink<W>,
    state: WriterState,

    declared_length: Option<i64>,
    payload_written: u64,
    exceptions_on_length_mismatch: bool,

    block_digest:      DigestConfig,
    current_digest:    Option<DigestComputation>,
    last_block_digest: Option<DigestValue>,

    diagnostics:   Diagnostics,
    final_written: u64,
}

impl<W: Write> ArcWriter<W> {
    /// Writer producing a plain (uncompressed) stream.
    pub fn new(sink: W) -> Self {
        Self::with_sink(Sink::Plain(CountingWriter::new(sink)))
    }

    /// Writer producing one gzip member per record.
    pub fn new_compressed(sink: W) -> Self {
        Self::with_sink(Sink::Gzip {
            out:    Some(CountingWriter::new(sink)),
            member: None,
        })
    }

    fn with_sink(sink: Sink<W>) -> Self {
        Self {
            sink,
            state: WriterState::Init,
            declared_length: None,
            payload_written: 0,
            exceptions_on_length_mismatch: true,
            block_digest: DigestConfig::default(),
            current_digest: None,
            last_block_digest: None,
            diagnostics: Diagnostics::new(),
            final_written: 0,
        }
    }

    /// When disabled, a declared-vs-streamed length mismatch is recorded as
    /// a diagnosis instead of raising a fault.  Enabled by default.
    pub fn set_exceptions_on_content_length_mismatch(&mut self, enabled: bool) {
        self.exceptions_on_length_mismatch = enabled;
    }

    pub fn set_block_digest_algorithm(&mut self, name: Option<&str>) -> Result<()> {
        self.block_digest.set_algorithm(name)
    }

    pub fn set_block_digest_encoding(&mut self, encoding: &str) {
        self.block_digest.set_encoding(encoding);
    }

    /// Block digest of the most recently closed record.
    pub fn computed_block_digest(&self) -> Option<&DigestValue> {
        self.last_block_digest.as_ref()
    }

    /// Diagnoses recorded against this writer (suppressed length
    /// mismatches and the like).
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Bytes pushed into the underlying sink so far (compressed bytes in
    /// gzip mode).
    pub fn bytes_written(&self) -> u64 {
        match &self.sink {
            Sink::Plain(out) => out.written(),
            Sink::Gzip { out: Some(out), .. } => out.written(),
            Sink::Gzip { member: Some(member), .. } => member.get_ref().written(),
            Sink::Gzip { .. } => 0,
            Sink::Closed => self.final_written,
        }
    }

    // ── Record lifecycle ────────────────────────────────────────────────────

    /// Serialize `header` and open a new record.
    ///
    /// Legal from `Init` and `RecordClosed`; a `PayloadWritten` record is
    /// closed implicitly first.  A second header write with no payload or
    /// close in between is a state fault.
    pub fn write_header(&mut self, header: &RecordHeader) -> Result<usize> {
        let line = header.header_line()?;
        self.open_record("write_header", &line, header.declared_length())
    }

    /// Write pre-serialized header bytes, bypassing the header model but
    /// obeying the same state transitions.
    pub fn write_raw_header(
        &mut self,
        header_bytes: &[u8],
        declared_length: Option<i64>,
    ) -> Result<usize> {
        if header_bytes.is_empty() || *header_bytes.last().unwrap_or(&0) != b'\n' {
            return Err(ArcError::InvalidArgument {
                context: "write_raw_header",
                reason:  "header bytes must be newline-terminated".to_string(),
            });
        }
        self.open_record("write_raw_header", header_bytes, declared_length)
    }

    fn open_record(
        &mut self,
        operation: &'static str,
        line: &[u8],
        declared_length: Option<i64>,
    ) -> Result<usize> {
        match self.state {
            WriterState::Init | WriterState::RecordClosed => {}
            WriterState::PayloadWritten => self.close_record()?,
            WriterState::HeaderWritten => {
                return Err(ArcError::InvalidState {
                    operation,
                    state: self.state.name(),
                })
            }
        }
        self.begin_member()?;
        self.sink_write(line)?;
        self.declared_length = declared_length;
        self.payload_written = 0;
        self.current_digest = self.block_digest.start();
        self.state = WriterState::HeaderWritten;
        Ok(line.len())
    }

    /// Append payload bytes to the open record.  Repeated writes
    /// accumulate and update the running length counter.
    pub fn write_payload(&mut self, bytes: &[u8]) -> Result<usize> {
        match self.state {
            WriterState::HeaderWritten | WriterState::PayloadWritten => {}
            _ => {
                return Err(ArcError::InvalidState {
                    operation: "write_payload",
                    state:     self.state.name(),
                })
            }
        }
        self.sink_write(bytes)?;
        if let Some(digest) = self.current_digest.as_mut() {
            digest.update(bytes);
        }
        self.payload_written += bytes.len() as u64;
        self.state = WriterState::PayloadWritten;
        Ok(bytes.len())
    }

    /// Copy `source` to the open record until end of stream.
    pub fn stream_payload(&mut self, source: &mut impl Read) -> Result<u64> {
        match self.state {
            WriterState::HeaderWritten | WriterState::PayloadWritten => {}
            _ => {
                return Err(ArcError::InvalidState {
                    operation: "stream_payload",
                    state:     self.state.name(),
                })
            }
        }
        let mut copied = 0u64;
        let mut chunk = [0u8; STREAM_COPY_CHUNK];
        loop {
            let n = source.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            self.write_payload(&chunk[..n])?;
            copied += n as u64;
        }
        // Zero-byte sources still count as a payload write.
        self.state = WriterState::PayloadWritten;
        Ok(copied)
    }

    /// Terminate the open record and validate its length.
    ///
    /// Idempotent; a repeated call is a no-op.  Unless suppressed, a
    /// mismatch between streamed bytes and the declared Archive-length is a
    /// fault (the record is still terminated and the writer stays usable).
    pub fn close_record(&mut self) -> Result<()> {
        match self.state {
            WriterState::RecordClosed => return Ok(()),
            WriterState::Init => {
                return Err(ArcError::InvalidState {
                    operation: "close_record",
                    state:     self.state.name(),
                })
            }
            WriterState::HeaderWritten | WriterState::PayloadWritten => {}
        }
        self.sink_write(b"\n")?;
        self.end_member()?;
        self.state = WriterState::RecordClosed;

        if let Some(digest) = self.current_digest.take() {
            self.last_block_digest = Some(digest.finish(&mut self.diagnostics));
        }

        let declared = self.declared_length.take();
        let streamed = self.payload_written;
        if let Some(declared) = declared {
            if declared < 0 || declared as u64 != streamed {
                self.diagnostics.add_error(Diagnosis::new(
                    DiagnosisType::InvalidData,
                    "record payload",
                    &[&declared.to_string(), &streamed.to_string()],
                ));
                if self.exceptions_on_length_mismatch {
                    return Err(ArcError::ContentLengthMismatch { declared, streamed });
                }
            }
        }
        Ok(())
    }

    /// Serialize a whole record: header, payload bytes, terminator.
    pub fn write_record(&mut self, record: &Record) -> Result<()> {
        self.write_header(&record.header)?;
        if let Some(payload) = &record.payload {
            self.write_payload(payload.block_bytes())?;
        }
        self.close_record()
    }

    /// Close any open record, then the sink.  Safe to call any number of
    /// times; only the first has any effect.
    pub fn close(&mut self) -> Result<()> {
        if matches!(self.sink, Sink::Closed) {
            return Ok(());
        }
        if matches!(
            self.state,
            WriterState::HeaderWritten | WriterState::PayloadWritten
        ) {
            self.close_record()?;
        }
        self.final_written = self.bytes_written();
        match std::mem::replace(&mut self.sink, Sink::Closed) {
            Sink::Plain(mut out) => out.flush()?,
            Sink::Gzip { out: Some(mut out), .. } => out.flush()?,
            _ => {}
        }
        debug!("writer closed, {} bytes written", self.final_written);
        Ok(())
    }

    /// Hand back the underlying sink, closing any open record first.
    pub fn into_inner(mut self) -> Result<W> {
        if matches!(
            self.state,
            WriterState::HeaderWritten | WriterState::PayloadWritten
        ) {
            self.close_record()?;
        }
        match std::mem::replace(&mut self.sink, Sink::Closed) {
            Sink::Plain(mut out) => {
                out.flush()?;
                Ok(out.into_inner())
            }
            Sink::Gzip { out: Some(mut out), .. } => {
                out.flush()?;
                Ok(out.into_inner())
            }
            _ => Err(ArcError::InvalidState {
                operation: "into_inner",
                state:     "closed writer",
            }),
        }
    }

    // ── Sink plumbing ───────────────────────────────────────────────────────

    fn begin_member(&mut self) -> Result<()> {
        if let Sink::Gzip { out, member } = &mut self.sink {
            match out.take() {
                Some(out) => *member = Some(GzEncoder::new(out, Compression::default())),
                None => {
                    return Err(ArcError::InvalidState {
                        operation: "write_header",
                        state:     "open gzip member",
                    })
                }
            }
        }
        Ok(())
    }

    fn end_member(&mut self) -> Result<()> {
        if let Sink::Gzip { out, member } = &mut self.sink {
            if let Some(encoder) = member.take() {
                *out = Some(encoder.finish()?);
            }
        }
        Ok(())
    }

    fn sink_write(&mut self, bytes: &[u8]) -> Result<()> {
        match &mut self.sink {
            Sink::Plain(out) => out.write_all(bytes)?,
            Sink::Gzip { member: Some(member), .. } => member.write_all(bytes)?,
            Sink::Gzip { .. } => {
                return Err(ArcError::InvalidState {
                    operation: "write",
                    state:     "no open gzip member",
                })
            }
            Sink::Closed => {
                return Err(ArcError::InvalidState {
                    operation: "write",
                    state:     "closed writer",
                })
            }
        }
        Ok(())
    }
}
