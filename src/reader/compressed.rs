//! Sequential reader over a gzip member-per-record transport.

use std::io::{Read, Seek};

use log::debug;

use crate::diagnostics::{Diagnosis, DiagnosisType};
use crate::error::Result;
use crate::gzip::GzipEntrySource;
use crate::record::Record;
use crate::stream::ByteCountingReader;

use super::{parse_record, ParseCtx};

/// Sequential record reader over a compressed transport.
///
/// Byte counting is member-bounded: each record's `start_offset` and
/// `consumed` are compressed-stream values for its enclosing gzip member,
/// and the uncompressed counter resets at every member boundary.
pub struct CompressedReader<R: Read> {
    source:     GzipEntrySource<R>,
    last_start: u64,
}

impl<R: Read> CompressedReader<R> {
    pub fn new(source: GzipEntrySource<R>) -> Self {
        Self {
            source,
            last_start: 0,
        }
    }

    pub(crate) fn next_record(&mut self, ctx: &ParseCtx<'_>) -> Result<Option<Record>> {
        loop {
            let entry = match self.source.next_entry()? {
                Some(entry) => entry,
                None => return Ok(None),
            };
            let member_start = entry.start_offset();
            let mut member = ByteCountingReader::new(entry);
            let parsed = parse_record(&mut member, ctx)?;
            let mut entry = member.into_inner();
            let skipped = entry.drain()?;
            drop(entry);
            let member_end = self.source.offset();

            match parsed {
                // An empty member frames no record; move on.
                None => continue,
                Some(mut record) => {
                    record.start_offset = member_start;
                    record.consumed = member_end - member_start;
                    if skipped > 0 {
                        record.diagnostics.add_warning(Diagnosis::new(
                            DiagnosisType::UndesiredData,
                            "gzip entry trailing data",
                            &[&skipped.to_string()],
                        ));
                    }
                    self.last_start = member_start;
                    debug!(
                        "record member at {member_start}, {} compressed bytes",
                        record.consumed
                    );
                    return Ok(Some(record));
                }
            }
        }
    }

    pub fn start_offset(&self) -> u64 {
        self.last_start
    }

    pub fn offset(&self) -> u64 {
        self.source.offset()
    }

    pub fn consumed(&self) -> u64 {
        self.source.consumed()
    }
}

/// Decode one record from the gzip member starting at the source's current
/// position.  Used by the detached (random access) path.
pub(crate) fn read_record_from_member<R: Read + Seek>(
    source: &mut R,
    ctx: ParseCtx<'_>,
    buffer_size: Option<usize>,
) -> Result<Option<Record>> {
    let counting = ByteCountingReader::new(source);
    let mut entries = match buffer_size {
        Some(capacity) => GzipEntrySource::with_capacity(capacity, counting),
        None => GzipEntrySource::new(counting),
    };
    let entry = match entries.next_entry()? {
        Some(entry) => entry,
        None => return Ok(None),
    };
    let member_start = entry.start_offset();
    let mut member = ByteCountingReader::new(entry);
    let parsed = parse_record(&mut member, &ctx)?;
    let mut entry = member.into_inner();
    let skipped = entry.drain()?;
    drop(entry);
    let member_end = entries.offset();

    Ok(parsed.map(|mut record| {
        record.start_offset = member_start;
        record.consumed = member_end - member_start;
        if skipped > 0 {
            record.diagnostics.add_warning(Diagnosis::new(
                DiagnosisType::UndesiredData,
                "gzip entry trailing data",
                &[&skipped.to_string()],
            ));
        }
        record
    }))
}
