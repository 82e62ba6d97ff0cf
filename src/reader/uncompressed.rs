//! Sequential reader over a plain byte stream.

use std::io::Read;

use crate::error::Result;
use crate::record::Record;
use crate::stream::ByteCountingReader;

use super::{parse_record, ParseCtx};

/// Sequential record reader over an uncompressed transport.
///
/// One running byte counter covers the whole stream; record start offsets
/// are plain positions within it.
pub struct UncompressedReader<R: Read> {
    source:     ByteCountingReader<R>,
    last_start: u64,
}

impl<R: Read> UncompressedReader<R> {
    pub fn new(source: ByteCountingReader<R>) -> Self {
        Self {
            source,
            last_start: 0,
        }
    }

    pub(crate) fn next_record(&mut self, ctx: &ParseCtx<'_>) -> Result<Option<Record>> {
        match parse_record(&mut self.source, ctx)? {
            Some(record) => {
                self.last_start = record.start_offset;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    pub fn start_offset(&self) -> u64 {
        self.last_start
    }

    pub fn offset(&self) -> u64 {
        self.source.consumed()
    }

    pub fn consumed(&self) -> u64 {
        self.source.consumed()
    }
}
